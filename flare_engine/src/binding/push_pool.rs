/// Per-flight-frame pools of push binding sets.
///
/// Every push binding of a program gets one backend pool per flight
/// frame. A flight frame's pools are reset by the first bind of a render
/// attempt and then hand out at most `capacity` sets each until the next frame
/// using that flight slot. Running out is an error: the frame is aborted
/// rather than drawn with stale bindings.

use std::sync::Arc;
use crate::error::Result;
use crate::engine_bail;
use crate::renderer::{Renderer, BindingLayout, BindingPool, BindingSet};

struct FramePools {
    pools: Vec<Box<dyn BindingPool>>,
    used: Vec<u32>,
    /// Render attempt that last reset these pools
    reset_attempt: Option<u64>,
}

pub struct PushPools {
    frames: Vec<FramePools>,
    capacity: u32,
}

impl PushPools {
    /// Create `flight_count` pool groups, one pool per layout in each
    ///
    /// # Arguments
    ///
    /// * `renderer` - Backend creating the pools
    /// * `layouts` - One layout per push binding, in push binding order
    /// * `flight_count` - Number of flight frames
    /// * `capacity` - Sets per pool per flight frame
    pub fn new(
        renderer: &dyn Renderer,
        layouts: &[Arc<dyn BindingLayout>],
        flight_count: usize,
        capacity: u32,
    ) -> Result<Self> {
        if capacity == 0 {
            engine_bail!("flare::PushPools", InitializationFailed: "push pool capacity must be at least 1");
        }

        let mut frames = Vec::with_capacity(flight_count);
        for _ in 0..flight_count {
            let mut pools = Vec::with_capacity(layouts.len());
            for layout in layouts {
                pools.push(renderer.create_binding_pool(layout, capacity)?);
            }
            frames.push(FramePools {
                pools,
                used: vec![0; layouts.len()],
                reset_attempt: None,
            });
        }

        Ok(Self { frames, capacity })
    }

    fn frame_mut(&mut self, flight: usize) -> Result<&mut FramePools> {
        let count = self.frames.len();
        match self.frames.get_mut(flight) {
            Some(frame) => Ok(frame),
            None => engine_bail!("flare::PushPools",
                InvalidResource: "flight frame {} out of range ({} flight frames)", flight, count),
        }
    }

    /// Reset the pools of `flight` unless `attempt` already did.
    ///
    /// A failed attempt reuses its flight slot on the next one, so the key
    /// must change per attempt and not per submitted frame.
    pub fn begin_frame(&mut self, flight: usize, attempt: u64) -> Result<()> {
        let pools = self.frame_mut(flight)?;
        if pools.reset_attempt == Some(attempt) {
            return Ok(());
        }

        for pool in &pools.pools {
            pool.reset()?;
        }
        pools.used.iter_mut().for_each(|u| *u = 0);
        pools.reset_attempt = Some(attempt);
        Ok(())
    }

    /// Allocate one set for push binding `index`
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` once `capacity` sets were handed out for that
    /// binding since the last reset.
    pub fn allocate(&mut self, flight: usize, index: usize) -> Result<Arc<dyn BindingSet>> {
        let capacity = self.capacity;
        let pools = self.frame_mut(flight)?;

        let (Some(pool), Some(used)) = (pools.pools.get(index), pools.used.get_mut(index)) else {
            engine_bail!("flare::PushPools",
                BindingNotFound: "push binding {} does not exist", index);
        };
        if *used >= capacity {
            engine_bail!("flare::PushPools",
                ResourceExhausted: "push binding {} used all {} sets of flight frame {}; raise push_pool_capacity",
                index, capacity, flight);
        }

        let set = pool.allocate()?;
        *used += 1;
        Ok(set)
    }

    /// Sets handed out for push binding `index` of `flight` since its last reset
    pub fn used(&self, flight: usize, index: usize) -> u32 {
        self.frames.get(flight)
            .and_then(|f| f.used.get(index).copied())
            .unwrap_or(0)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn flight_count(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
#[path = "push_pool_tests.rs"]
mod tests;
