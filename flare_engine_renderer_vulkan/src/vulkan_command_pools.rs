/// Command pools per flight frame
///
/// Every command list gets its own pool, so worker threads record in
/// parallel without sharing a pool. Pools are recycled once the flight
/// frame's fence has signaled, and so are the resources the flight
/// frame's lists bound.

use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::BoundResource;
use flare_engine::engine_err;

use crate::vulkan_context::GpuContext;

#[derive(Default)]
struct FlightPools {
    free: Vec<(vk::CommandPool, vk::CommandBuffer)>,
    in_use: Vec<(vk::CommandPool, vk::CommandBuffer)>,
    /// Resources recorded lists read on the GPU
    retained: Vec<BoundResource>,
}

pub struct CommandPools {
    ctx: Arc<GpuContext>,
    flights: Mutex<Vec<FlightPools>>,
}

impl CommandPools {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx, flights: Mutex::new(Vec::new()) }
    }

    fn flight_mut(flights: &mut Vec<FlightPools>, flight_frame: usize) -> &mut FlightPools {
        if flights.len() <= flight_frame {
            flights.resize_with(flight_frame + 1, FlightPools::default);
        }
        &mut flights[flight_frame]
    }

    /// A reset command buffer for `flight_frame`
    pub fn acquire(&self, flight_frame: usize) -> Result<vk::CommandBuffer> {
        let mut flights = self.flights.lock();
        let flight = Self::flight_mut(&mut flights, flight_frame);

        let entry = match flight.free.pop() {
            Some(entry) => entry,
            None => self.create_pool()?,
        };
        flight.in_use.push(entry);
        Ok(entry.1)
    }

    /// Keep `resources` alive until `flight_frame` is reset
    pub fn retain(&self, flight_frame: usize, resources: &mut Vec<BoundResource>) {
        let mut flights = self.flights.lock();
        Self::flight_mut(&mut flights, flight_frame).retained.append(resources);
    }

    /// Reset every pool handed out for `flight_frame` and release what its
    /// lists bound
    pub fn reset(&self, flight_frame: usize) -> Result<()> {
        let mut flights = self.flights.lock();
        let Some(flight) = flights.get_mut(flight_frame) else {
            return Ok(());
        };
        let released = std::mem::take(&mut flight.retained);

        let mut result = Ok(());
        while let Some(entry) = flight.in_use.pop() {
            let reset = unsafe { self.ctx.device.reset_command_pool(entry.0, vk::CommandPoolResetFlags::empty()) };
            flight.free.push(entry);
            if let Err(e) = reset {
                result = Err(engine_err!("flare::vulkan", "Failed to reset command pool: {:?}", e));
                break;
            }
        }
        drop(flights);
        drop(released);
        result
    }

    fn create_pool(&self) -> Result<(vk::CommandPool, vk::CommandBuffer)> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.ctx.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);

        unsafe {
            let pool = self.ctx.device.create_command_pool(&pool_info, None)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to create command pool: {:?}", e))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            match self.ctx.device.allocate_command_buffers(&alloc_info) {
                Ok(buffers) => Ok((pool, buffers[0])),
                Err(e) => {
                    self.ctx.device.destroy_command_pool(pool, None);
                    Err(engine_err!("flare::vulkan", "Failed to allocate command buffer: {:?}", e))
                }
            }
        }
    }
}

impl Drop for CommandPools {
    fn drop(&mut self) {
        unsafe {
            for mut flight in self.flights.get_mut().drain(..) {
                flight.retained.clear();
                for (pool, _) in flight.free.into_iter().chain(flight.in_use) {
                    self.ctx.device.destroy_command_pool(pool, None);
                }
            }
        }
    }
}
