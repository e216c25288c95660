//! Input and control events received from the headless host

use bitflags::bitflags;
use glam::{IVec2, Vec2};

bitflags! {
    /// Mouse button state, one bit per button
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        const LEFT = 1 << 0;
        const MIDDLE = 1 << 1;
        const RIGHT = 1 << 2;
    }
}

/// Keyboard state as a bitset indexed by key code
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyboardState {
    bits: Vec<u8>,
}

impl KeyboardState {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { bits: bytes.to_vec() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Codes past the received bitset read as released
    pub fn is_key_down(&self, code: u32) -> bool {
        let byte = (code / 8) as usize;
        self.bits.get(byte).is_some_and(|b| b & (1 << (code % 8)) != 0)
    }

    pub fn set_key(&mut self, code: u32, down: bool) {
        let byte = (code / 8) as usize;
        if byte >= self.bits.len() {
            if !down {
                return;
            }
            self.bits.resize(byte + 1, 0);
        }
        let mask = 1u8 << (code % 8);
        if down {
            self.bits[byte] |= mask;
        } else {
            self.bits[byte] &= !mask;
        }
    }
}

/// Decoded host message the engine acts on
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessEvent {
    /// Host asked the engine to shut down
    Close,
    /// Host is ready for the next pushed frame
    UnlockFrame,
    /// Frame size changed; any stored frame is dropped
    Resize(IVec2),
    CursorPos(Vec2),
    MouseState(MouseButtons),
    KeyboardState(KeyboardState),
}
