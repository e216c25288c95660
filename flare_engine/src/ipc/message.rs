/// Headless protocol wire format
///
/// Every message is an 8-byte header `{type: u32 LE, length: u32 LE}`
/// followed by `length` payload bytes. A zero length carries no payload.

use glam::{DVec2, IVec2, Vec2};
use crate::error::Result;
use crate::log::LogSeverity;
use crate::engine_err;
use super::events::{KeyboardState, MouseButtons};

pub const HEADER_SIZE: usize = 8;

/// Longest profile scope or frame name, including the terminating zero
pub const PROFILE_NAME_MAX: usize = 64;
/// Frames carried by one profile scope message
pub const PROFILE_FRAME_MAX: usize = 64;

const PROFILE_FRAME_SIZE: usize = PROFILE_NAME_MAX + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    Null = 0,
    Close = 1,
    Resize = 2,
    FrameData = 3,
    UpdateData = 4,
    UnlockFrame = 5,
    PushFrame = 6,
    Message = 7,
    EndStream = 8,
    CursorPos = 9,
    MouseState = 10,
    KeyboardState = 11,
    ProfileScope = 12,
}

impl MessageType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => MessageType::Null,
            1 => MessageType::Close,
            2 => MessageType::Resize,
            3 => MessageType::FrameData,
            4 => MessageType::UpdateData,
            5 => MessageType::UnlockFrame,
            6 => MessageType::PushFrame,
            7 => MessageType::Message,
            8 => MessageType::EndStream,
            9 => MessageType::CursorPos,
            10 => MessageType::MouseState,
            11 => MessageType::KeyboardState,
            12 => MessageType::ProfileScope,
            _ => return None,
        })
    }

    pub fn raw(self) -> u32 {
        self as u32
    }
}

// ===== HEADER =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub ty: u32,
    pub length: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.ty.to_le_bytes());
        bytes[4..].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            ty: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

// ===== PROFILE SCOPE =====

/// One timed section inside a profiled scope
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileFrame {
    pub name: String,
    pub stack: u32,
    pub seconds: f32,
}

/// A named scope and the frames recorded under it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileScope {
    pub name: String,
    pub frames: Vec<ProfileFrame>,
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    // Cut on a char boundary so the stored prefix stays valid UTF-8
    let mut len = name.len().min(PROFILE_NAME_MAX - 1);
    while !name.is_char_boundary(len) {
        len -= 1;
    }
    let start = out.len();
    out.extend_from_slice(&name.as_bytes()[..len]);
    out.resize(start + PROFILE_NAME_MAX, 0);
}

fn read_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// ===== MESSAGE =====

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub ty: MessageType,
    /// `None` when the header length is zero
    pub payload: Option<Vec<u8>>,
}

impl Message {
    pub fn new(ty: MessageType, payload: Vec<u8>) -> Self {
        let payload = if payload.is_empty() { None } else { Some(payload) };
        Self { ty, payload }
    }

    pub fn empty(ty: MessageType) -> Self {
        Self { ty, payload: None }
    }

    pub fn len(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn header(&self) -> Result<Header> {
        let length = match u32::try_from(self.len()) {
            Ok(length) => length,
            Err(_) => return Err(engine_err!("flare::ipc",
                Protocol: "{:?} payload of {} bytes exceeds the header length field", self.ty, self.len())),
        };
        Ok(Header { ty: self.ty.raw(), length })
    }

    /// Header followed by the payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = self.header()?;
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.len());
        bytes.extend_from_slice(&header.encode());
        if let Some(payload) = &self.payload {
            bytes.extend_from_slice(payload);
        }
        Ok(bytes)
    }

    // ===== TYPED CONSTRUCTORS =====

    pub fn resize(size: IVec2) -> Self {
        Self::new(MessageType::Resize, bytemuck::bytes_of(&size).to_vec())
    }

    pub fn update_data(delta: f64, time: f64) -> Self {
        Self::new(MessageType::UpdateData, bytemuck::bytes_of(&DVec2::new(delta, time)).to_vec())
    }

    pub fn frame_data(delta: f64, time: f64) -> Self {
        Self::new(MessageType::FrameData, bytemuck::bytes_of(&DVec2::new(delta, time)).to_vec())
    }

    pub fn cursor_pos(pos: Vec2) -> Self {
        Self::new(MessageType::CursorPos, bytemuck::bytes_of(&pos).to_vec())
    }

    pub fn mouse_state(buttons: MouseButtons) -> Self {
        Self::new(MessageType::MouseState, vec![buttons.bits()])
    }

    pub fn keyboard_state(state: &KeyboardState) -> Self {
        Self::new(MessageType::KeyboardState, state.as_bytes().to_vec())
    }

    /// RGBA8 pixels, `width * height * 4` bytes
    pub fn push_frame(pixels: Vec<u8>) -> Self {
        Self::new(MessageType::PushFrame, pixels)
    }

    /// Log line: u32 message kind then the UTF-8 text
    pub fn log(severity: LogSeverity, text: &str) -> Self {
        let kind: u32 = match severity {
            LogSeverity::Trace | LogSeverity::Debug | LogSeverity::Info => 0,
            LogSeverity::Warn => 1,
            LogSeverity::Error => 2,
        };
        let mut payload = Vec::with_capacity(4 + text.len());
        payload.extend_from_slice(&kind.to_le_bytes());
        payload.extend_from_slice(text.as_bytes());
        Self::new(MessageType::Message, payload)
    }

    /// Names are cut to fit their fixed field; frames past the limit are dropped
    pub fn profile_scope(scope: &ProfileScope) -> Self {
        let count = scope.frames.len().min(PROFILE_FRAME_MAX);
        let mut payload = Vec::with_capacity(PROFILE_NAME_MAX + 2 + count * PROFILE_FRAME_SIZE);
        write_name(&mut payload, &scope.name);
        payload.extend_from_slice(&(count as u16).to_le_bytes());
        for frame in &scope.frames[..count] {
            write_name(&mut payload, &frame.name);
            payload.extend_from_slice(&frame.stack.to_le_bytes());
            payload.extend_from_slice(&frame.seconds.to_le_bytes());
        }
        Self::new(MessageType::ProfileScope, payload)
    }

    // ===== TYPED READERS =====

    fn exact_payload(&self, size: usize) -> Result<&[u8]> {
        match &self.payload {
            Some(bytes) if bytes.len() >= size => Ok(&bytes[..size]),
            _ => Err(engine_err!("flare::ipc",
                Protocol: "{:?} payload holds {} bytes, expected {}", self.ty, self.len(), size)),
        }
    }

    pub fn read_ivec2(&self) -> Result<IVec2> {
        let bytes = self.exact_payload(std::mem::size_of::<IVec2>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn read_dvec2(&self) -> Result<DVec2> {
        let bytes = self.exact_payload(std::mem::size_of::<DVec2>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn read_vec2(&self) -> Result<Vec2> {
        let bytes = self.exact_payload(std::mem::size_of::<Vec2>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn read_mouse_state(&self) -> Result<MouseButtons> {
        let bytes = self.exact_payload(1)?;
        Ok(MouseButtons::from_bits_truncate(bytes[0]))
    }

    pub fn read_keyboard_state(&self) -> Result<KeyboardState> {
        Ok(KeyboardState::from_bytes(self.payload.as_deref().unwrap_or(&[])))
    }

    pub fn read_log(&self) -> Result<(u32, String)> {
        let kind = self.exact_payload(4)?;
        let kind = u32::from_le_bytes([kind[0], kind[1], kind[2], kind[3]]);
        let text = match &self.payload {
            Some(bytes) => String::from_utf8_lossy(&bytes[4..]).into_owned(),
            None => String::new(),
        };
        Ok((kind, text))
    }

    pub fn read_profile_scope(&self) -> Result<ProfileScope> {
        let head = self.exact_payload(PROFILE_NAME_MAX + 2)?;
        let name = read_name(&head[..PROFILE_NAME_MAX]);
        let count = u16::from_le_bytes([head[PROFILE_NAME_MAX], head[PROFILE_NAME_MAX + 1]]) as usize;

        let bytes = self.exact_payload(PROFILE_NAME_MAX + 2 + count * PROFILE_FRAME_SIZE)?;
        let frames = bytes[PROFILE_NAME_MAX + 2..]
            .chunks_exact(PROFILE_FRAME_SIZE)
            .map(|chunk| {
                let tail = &chunk[PROFILE_NAME_MAX..];
                ProfileFrame {
                    name: read_name(&chunk[..PROFILE_NAME_MAX]),
                    stack: u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]),
                    seconds: f32::from_le_bytes([tail[4], tail[5], tail[6], tail[7]]),
                }
            })
            .collect();

        Ok(ProfileScope { name, frames })
    }
}

// ===== STREAM DECODER =====

/// Result of pulling one message out of the byte stream
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Message(Message),
    /// Header with a type value outside the known set; its payload was skipped
    Unknown { ty: u32, length: u32 },
}

/// Reassembles messages from arbitrarily split reads
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buffer: Vec<u8>,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes received but not yet consumed by a complete message
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Next complete message, or `None` until more bytes arrive
    pub fn next_message(&mut self) -> Option<Decoded> {
        let header_bytes: &[u8; HEADER_SIZE] = self.buffer.get(..HEADER_SIZE)?.try_into().ok()?;
        let header = Header::decode(header_bytes);
        let total = HEADER_SIZE + header.length as usize;
        if self.buffer.len() < total {
            return None;
        }

        let payload: Vec<u8> = self.buffer.drain(..total).skip(HEADER_SIZE).collect();
        Some(match MessageType::from_raw(header.ty) {
            Some(ty) => Decoded::Message(Message::new(ty, payload)),
            None => Decoded::Unknown { ty: header.ty, length: header.length },
        })
    }
}

/// Decode exactly one message from a complete buffer
pub fn decode(bytes: &[u8]) -> Result<Decoded> {
    let mut decoder = MessageDecoder::new();
    decoder.push(bytes);
    match decoder.next_message() {
        Some(decoded) if decoder.pending() == 0 => Ok(decoded),
        Some(_) => Err(engine_err!("flare::ipc",
            Protocol: "{} trailing bytes after message", decoder.pending())),
        None => Err(engine_err!("flare::ipc",
            Protocol: "truncated message: {} bytes", bytes.len())),
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
