/// Semaphores and fences behind the engine's opaque ids
///
/// Ids are slotmap keys in their FFI form, so a stale id from a destroyed
/// renderer never aliases a live object.

use ash::vk;
use parking_lot::Mutex;
use slotmap::{DefaultKey, Key, KeyData, SlotMap};
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{Fence, Semaphore};
use flare_engine::engine_err;

use crate::vulkan_context::GpuContext;

pub struct SyncObjects {
    ctx: Arc<GpuContext>,
    semaphores: Mutex<SlotMap<DefaultKey, vk::Semaphore>>,
    fences: Mutex<SlotMap<DefaultKey, vk::Fence>>,
}

fn key_of(id: u64) -> DefaultKey {
    KeyData::from_ffi(id).into()
}

impl SyncObjects {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            semaphores: Mutex::new(SlotMap::new()),
            fences: Mutex::new(SlotMap::new()),
        }
    }

    pub fn create_semaphore(&self) -> Result<Semaphore> {
        let semaphore = unsafe {
            self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to create semaphore: {:?}", e))?
        };
        let key = self.semaphores.lock().insert(semaphore);
        Ok(Semaphore(key.data().as_ffi()))
    }

    pub fn create_fence(&self, signaled: bool) -> Result<Fence> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe {
            self.ctx.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to create fence: {:?}", e))?
        };
        let key = self.fences.lock().insert(fence);
        Ok(Fence(key.data().as_ffi()))
    }

    pub fn semaphore(&self, id: Semaphore) -> Result<vk::Semaphore> {
        self.semaphores.lock().get(key_of(id.0)).copied()
            .ok_or_else(|| engine_err!("flare::vulkan", InvalidHandle: "Unknown semaphore {:?}", id))
    }

    pub fn fence(&self, id: Fence) -> Result<vk::Fence> {
        self.fences.lock().get(key_of(id.0)).copied()
            .ok_or_else(|| engine_err!("flare::vulkan", InvalidHandle: "Unknown fence {:?}", id))
    }

    pub fn wait_fence(&self, id: Fence) -> Result<()> {
        let fence = self.fence(id)?;
        unsafe {
            self.ctx.device.wait_for_fences(&[fence], true, u64::MAX)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to wait for fence: {:?}", e))
        }
    }

    pub fn reset_fence(&self, id: Fence) -> Result<()> {
        let fence = self.fence(id)?;
        unsafe {
            self.ctx.device.reset_fences(&[fence])
                .map_err(|e| engine_err!("flare::vulkan", "Failed to reset fence: {:?}", e))
        }
    }
}

impl Drop for SyncObjects {
    fn drop(&mut self) {
        unsafe {
            for (_, semaphore) in self.semaphores.get_mut().drain() {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            for (_, fence) in self.fences.get_mut().drain() {
                self.ctx.device.destroy_fence(fence, None);
            }
        }
    }
}
