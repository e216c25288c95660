/// Headless transport over a Unix domain socket
///
/// The engine connects to a socket the host listens on under the temp
/// directory. The first message the host sends carries the frame size.
/// Incoming messages are polled without blocking; outgoing ones are queued
/// from any thread and flushed once per [`HeadlessPipe::update`].

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use glam::IVec2;
use parking_lot::Mutex;
use crate::error::Result;
use crate::frame::FrameSink;
use crate::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};
use super::events::HeadlessEvent;
use super::message::{Decoded, Header, Message, MessageDecoder, MessageType, ProfileScope, HEADER_SIZE};

const READ_CHUNK: usize = 64 * 1024;

/// Payload of the initial size message, one `IVec2`
const SIZE_PAYLOAD: usize = std::mem::size_of::<IVec2>();

/// Outgoing messages shared between the pipe and its producers
#[derive(Clone, Default)]
pub struct MessageQueue {
    inner: Arc<Mutex<Vec<Message>>>,
}

impl MessageQueue {
    pub fn push(&self, message: Message) {
        self.inner.lock().push(message);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.inner.lock())
    }
}

struct Link {
    stream: UnixStream,
    decoder: MessageDecoder,
    connected: bool,
    close_requested: bool,
    unlocked: bool,
}

struct FrameSlot {
    width: u32,
    height: u32,
    pixels: Option<Vec<u8>>,
    prev: Instant,
    delta: f64,
    time: f64,
}

pub struct HeadlessPipe {
    link: Mutex<Link>,
    slot: Mutex<FrameSlot>,
    queue: MessageQueue,
}

/// Socket path for a pipe name
pub fn socket_path(pipe_name: &str) -> PathBuf {
    std::env::temp_dir().join(pipe_name)
}

fn size_from(size: IVec2) -> Result<(u32, u32)> {
    match (u32::try_from(size.x), u32::try_from(size.y)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => engine_bail!("flare::ipc", Protocol: "negative frame size {}x{}", size.x, size.y),
    }
}

impl HeadlessPipe {
    /// Connect to the host socket named `pipe_name` and wait for the frame size
    pub fn connect(pipe_name: &str) -> Result<Self> {
        let path = socket_path(pipe_name);
        let stream = match UnixStream::connect(&path) {
            Ok(stream) => stream,
            Err(e) => engine_bail!("flare::ipc", Io: "failed to connect to {}: {}", path.display(), e),
        };
        engine_info!("flare::ipc", "Connected to {}", path.display());
        Self::from_stream(stream)
    }

    /// Wrap an already connected stream; blocks until the size message arrives
    pub fn from_stream(mut stream: UnixStream) -> Result<Self> {
        let mut header = [0u8; HEADER_SIZE];
        if let Err(e) = stream.read_exact(&mut header) {
            engine_bail!("flare::ipc", Protocol: "no size message from host: {}", e);
        }
        let header = Header::decode(&header);
        if header.length as usize > SIZE_PAYLOAD {
            engine_bail!("flare::ipc", Protocol:
                "size message carries {} byte(s), at most {} expected", header.length, SIZE_PAYLOAD);
        }
        let mut payload = vec![0u8; header.length as usize];
        if let Err(e) = stream.read_exact(&mut payload) {
            engine_bail!("flare::ipc", Protocol: "truncated size message: {}", e);
        }

        // The first message is read for its size whatever its type field says
        let size = Message { ty: MessageType::Resize, payload: Some(payload) }.read_ivec2()?;
        let (width, height) = size_from(size)?;
        engine_debug!("flare::ipc", "Initial frame size {}x{}", width, height);

        Ok(Self {
            link: Mutex::new(Link {
                stream,
                decoder: MessageDecoder::new(),
                connected: true,
                close_requested: false,
                unlocked: false,
            }),
            slot: Mutex::new(FrameSlot {
                width,
                height,
                pixels: None,
                prev: Instant::now(),
                delta: 0.0,
                time: 0.0,
            }),
            queue: MessageQueue::default(),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        let slot = self.slot.lock();
        (slot.width, slot.height)
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().connected
    }

    pub fn close_requested(&self) -> bool {
        self.link.lock().close_requested
    }

    /// Seconds between the last two updates and since the first one
    pub fn timing(&self) -> (f64, f64) {
        let slot = self.slot.lock();
        (slot.delta, slot.time)
    }

    /// Handle for producers that queue messages from other threads
    pub fn queue(&self) -> MessageQueue {
        self.queue.clone()
    }

    pub fn queue_message(&self, message: Message) {
        self.queue.push(message);
    }

    pub fn queue_profile_scope(&self, scope: &ProfileScope) {
        self.queue.push(Message::profile_scope(scope));
    }

    /// Read everything pending on the socket and decode it
    pub fn poll(&self) -> Vec<HeadlessEvent> {
        let mut link = self.link.lock();
        if !link.connected {
            return Vec::new();
        }

        Self::read_pending(&mut link);

        let mut events = Vec::new();
        while let Some(decoded) = link.decoder.next_message() {
            match decoded {
                Decoded::Message(message) => {
                    if let Some(event) = self.apply(&mut link, message) {
                        events.push(event);
                    }
                }
                Decoded::Unknown { ty, length } => {
                    engine_error!("flare::ipc", "Invalid pipe message type {} ({} bytes)", ty, length);
                }
            }
        }

        if !link.connected && link.decoder.pending() > 0 {
            engine_error!("flare::ipc", "Dropping truncated message: {} bytes", link.decoder.pending());
            link.decoder.clear();
        }

        events
    }

    fn read_pending(link: &mut Link) {
        if let Err(e) = link.stream.set_nonblocking(true) {
            engine_error!("flare::ipc", "Failed to poll socket: {}", e);
            link.connected = false;
            return;
        }

        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match link.stream.read(&mut chunk) {
                Ok(0) => {
                    engine_info!("flare::ipc", "Host closed the connection");
                    link.connected = false;
                    break;
                }
                Ok(n) => link.decoder.push(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    engine_error!("flare::ipc", "Socket read failed: {}", e);
                    link.connected = false;
                    break;
                }
            }
        }

        if link.connected {
            if let Err(e) = link.stream.set_nonblocking(false) {
                engine_error!("flare::ipc", "Failed to restore blocking socket: {}", e);
                link.connected = false;
            }
        }
    }

    fn apply(&self, link: &mut Link, message: Message) -> Option<HeadlessEvent> {
        match message.ty {
            MessageType::Close => {
                link.close_requested = true;
                Some(HeadlessEvent::Close)
            }
            MessageType::UnlockFrame => {
                link.unlocked = true;
                Some(HeadlessEvent::UnlockFrame)
            }
            MessageType::Resize => {
                let size = message.read_ivec2().ok()?;
                let (width, height) = size_from(size).ok()?;
                let mut slot = self.slot.lock();
                slot.width = width;
                slot.height = height;
                slot.pixels = None;
                Some(HeadlessEvent::Resize(size))
            }
            MessageType::CursorPos => message.read_vec2().ok().map(HeadlessEvent::CursorPos),
            MessageType::MouseState => message.read_mouse_state().ok().map(HeadlessEvent::MouseState),
            MessageType::KeyboardState => message.read_keyboard_state().ok().map(HeadlessEvent::KeyboardState),
            MessageType::Null => {
                engine_warn!("flare::ipc", "Null message");
                None
            }
            other => {
                engine_error!("flare::ipc", "Invalid pipe message {:?}", other);
                None
            }
        }
    }

    /// Poll, advance the clock, send timing and the stored frame once
    /// unlocked, then flush the queue
    pub fn update(&self) -> Vec<HeadlessEvent> {
        let events = self.poll();
        if !self.is_connected() {
            return events;
        }

        let (update, frame) = {
            let mut link = self.link.lock();
            let mut slot = self.slot.lock();

            let now = Instant::now();
            slot.delta = now.duration_since(slot.prev).as_secs_f64();
            slot.time += slot.delta;
            slot.prev = now;

            let frame = match (&slot.pixels, link.unlocked) {
                (Some(pixels), true) => {
                    link.unlocked = false;
                    Some(Message::push_frame(pixels.clone()))
                }
                _ => None,
            };
            (Message::update_data(slot.delta, slot.time), frame)
        };

        let mut outgoing = vec![update];
        outgoing.extend(frame);
        outgoing.extend(self.queue.take());
        self.send_all(&outgoing);

        events
    }

    /// Send queued messages now
    pub fn flush(&self) {
        let outgoing = self.queue.take();
        self.send_all(&outgoing);
    }

    fn send_all(&self, messages: &[Message]) {
        let mut link = self.link.lock();
        if !link.connected {
            return;
        }
        for message in messages {
            let bytes = match message.encode() {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            if let Err(e) = link.stream.write_all(&bytes) {
                engine_error!("flare::ipc", "Socket write failed: {}", e);
                link.connected = false;
                return;
            }
        }
    }
}

impl FrameSink for HeadlessPipe {
    /// Queue the frame timing and keep the pixels for the next unlocked
    /// update. Frames whose size no longer matches are not stored.
    fn push_frame(&self, width: u32, height: u32, pixels: Vec<u8>) -> Result<()> {
        let mut slot = self.slot.lock();
        self.queue.push(Message::frame_data(slot.delta, slot.time));
        if slot.width == width && slot.height == height {
            slot.pixels = Some(pixels);
        } else {
            engine_debug!("flare::ipc", "Frame {}x{} does not match pipe size {}x{}",
                width, height, slot.width, slot.height);
        }
        Ok(())
    }
}

impl Drop for HeadlessPipe {
    fn drop(&mut self) {
        let mut outgoing = self.queue.take();
        outgoing.push(Message::empty(MessageType::Close));
        self.send_all(&outgoing);
    }
}

#[cfg(test)]
#[path = "pipe_tests.rs"]
mod tests;
