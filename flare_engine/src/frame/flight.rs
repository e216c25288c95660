/// Frame-in-flight bookkeeping.
///
/// Two indices rotate with different moduli:
///
/// - `current_frame` (mod `max_flight_frames`) selects the sync set: the
///   image-available semaphore, the in-flight fence and the chain of
///   inter-list semaphores.
/// - `current_flight_frame` (mod `max_flight_frames + 1`) selects the
///   command lists and push pools.
///
/// The flight pool is one slot larger so the pools being recycled always
/// belong to a frame older than the one whose fence was just waited.
/// Submissions complete in order, so that frame is finished too.

use crate::error::Result;
use crate::renderer::{Renderer, Semaphore, Fence};

/// Sync objects of one frame slot
pub struct FrameSync {
    pub image_available: Semaphore,
    pub in_flight: Fence,
    /// Inter-list semaphores; grows on demand, never shrinks
    chain: Vec<Semaphore>,
}

impl FrameSync {
    fn new(renderer: &dyn Renderer) -> Result<Self> {
        Ok(Self {
            image_available: renderer.create_semaphore()?,
            in_flight: renderer.create_fence(true)?,
            chain: Vec::new(),
        })
    }

    /// Make room for `count` chained submissions
    pub fn ensure_chain(&mut self, renderer: &dyn Renderer, count: usize) -> Result<()> {
        let before = self.chain.len();
        while self.chain.len() < count {
            self.chain.push(renderer.create_semaphore()?);
        }
        debug_assert!(self.chain.len() >= before);
        Ok(())
    }

    pub fn chain(&self) -> &[Semaphore] {
        &self.chain
    }
}

pub struct FlightState {
    syncs: Vec<FrameSync>,
    /// Frame that last submitted with each sync slot
    sync_frames: Vec<Option<u64>>,
    /// Frame that last recorded into each flight slot
    flight_frames: Vec<Option<u64>>,
    current_frame: usize,
    current_flight_frame: usize,
    frame_counter: u64,
    /// Render attempts started, failed ones included
    attempts: u64,
}

impl FlightState {
    pub fn new(renderer: &dyn Renderer, max_flight_frames: usize) -> Result<Self> {
        let mut syncs = Vec::with_capacity(max_flight_frames);
        for _ in 0..max_flight_frames {
            syncs.push(FrameSync::new(renderer)?);
        }
        Ok(Self {
            syncs,
            sync_frames: vec![None; max_flight_frames],
            flight_frames: vec![None; max_flight_frames + 1],
            current_frame: 0,
            current_flight_frame: 0,
            frame_counter: 0,
            attempts: 0,
        })
    }

    pub fn max_flight_frames(&self) -> usize {
        self.syncs.len()
    }

    /// Number of command list / push pool slots
    pub fn flight_pool_size(&self) -> usize {
        self.flight_frames.len()
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn current_flight_frame(&self) -> usize {
        self.current_flight_frame
    }

    /// Frames submitted so far
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Token of a new render attempt. Unlike the frame counter it also
    /// moves when a frame fails before submission.
    pub fn begin_attempt(&mut self) -> u64 {
        self.attempts += 1;
        self.attempts
    }

    pub fn sync(&self) -> &FrameSync {
        &self.syncs[self.current_frame]
    }

    pub fn sync_mut(&mut self) -> &mut FrameSync {
        &mut self.syncs[self.current_frame]
    }

    /// Wait until the GPU is done with the current sync slot and the
    /// current flight slot
    pub fn wait_slot(&self, renderer: &dyn Renderer) -> Result<()> {
        renderer.wait_fence(self.sync().in_flight)?;
        debug_assert!(
            match (self.flight_frames[self.current_flight_frame], self.sync_frames[self.current_frame]) {
                (Some(recorded), Some(completed)) => recorded < completed,
                (Some(_), None) => false,
                (None, _) => true,
            },
            "flight slot recycled before its frame completed"
        );
        Ok(())
    }

    /// Frame that last recorded into the current flight slot
    pub fn flight_slot_owner(&self) -> Option<u64> {
        self.flight_frames[self.current_flight_frame]
    }

    /// Record the submitted frame and rotate both indices
    pub fn advance(&mut self) {
        self.sync_frames[self.current_frame] = Some(self.frame_counter);
        self.flight_frames[self.current_flight_frame] = Some(self.frame_counter);
        self.current_frame = (self.current_frame + 1) % self.syncs.len();
        self.current_flight_frame = (self.current_flight_frame + 1) % self.flight_frames.len();
        self.frame_counter += 1;
    }
}

#[cfg(test)]
#[path = "flight_tests.rs"]
mod tests;
