//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! Semaphores order GPU work against other GPU work (acquire before render,
//! render before present). Fences let the host know when the GPU is done with
//! a frame slot so its command buffer can be re-recorded.
//!
//! [`FrameSynchronizer`] provisions N parallel slots of these objects plus a
//! command buffer each, giving N frames in flight.

use ash::{vk, Device};

use crate::render::backends::vulkan::{CommandPool, VulkanError, VulkanResult};

/// Default number of frame slots
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Upper bound accepted from configuration
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device.create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device.create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Wait for fence
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device.wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset fence
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device.reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Resources for one frame slot
pub struct FrameSync {
    /// Command buffer re-recorded every time this slot is used
    pub command_buffer: vk::CommandBuffer,
    /// Semaphore signaled when swapchain image becomes available
    pub image_available: Semaphore,
    /// Semaphore signaled when frame rendering is complete
    pub render_finished: Semaphore,
    /// Fence signaled when the GPU finishes this slot's submission
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization objects around an allocated command buffer
    pub fn new(device: Device, command_buffer: vk::CommandBuffer) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        // Signaled so the first use of each slot does not block
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// Owns N frame slots and the pool their command buffers come from
///
/// The slots are declared before the pool so they drop first.
pub struct FrameSynchronizer {
    frames: Vec<FrameSync>,
    _command_pool: CommandPool,
}

impl FrameSynchronizer {
    /// Provision `frames_in_flight` slots against the graphics queue family
    pub fn new(device: &Device, queue_family: u32, frames_in_flight: usize) -> VulkanResult<Self> {
        if frames_in_flight == 0 || frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(VulkanError::InvalidOperation {
                reason: format!("frames in flight must be in 1..={MAX_FRAMES_IN_FLIGHT}, got {frames_in_flight}"),
            });
        }

        let command_pool = CommandPool::new(device.clone(), queue_family)?;
        let command_buffers = command_pool.allocate_command_buffers(frames_in_flight as u32)?;

        let frames = command_buffers
            .into_iter()
            .map(|command_buffer| FrameSync::new(device.clone(), command_buffer))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!(
            "FrameSynchronizer created: {} slots, {} semaphores, {} fences",
            frames.len(),
            frames.len() * 2,
            frames.len()
        );
        Ok(Self {
            frames,
            _command_pool: command_pool,
        })
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Resources for slot `index`
    pub fn frame(&self, index: usize) -> VulkanResult<&FrameSync> {
        self.frames.get(index).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("frame slot {index} out of range (have {})", self.frames.len()),
        })
    }
}
