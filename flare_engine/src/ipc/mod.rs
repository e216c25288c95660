//! Headless presentation protocol and transport

pub mod message;
pub mod events;
pub mod pipe;
pub mod headless_logger;

pub use message::{
    Message, MessageType, Header, Decoded, MessageDecoder, ProfileScope, ProfileFrame,
    HEADER_SIZE, PROFILE_NAME_MAX, PROFILE_FRAME_MAX,
};
pub use events::{HeadlessEvent, MouseButtons, KeyboardState};
pub use pipe::{HeadlessPipe, MessageQueue, socket_path};
pub use headless_logger::HeadlessLogger;
