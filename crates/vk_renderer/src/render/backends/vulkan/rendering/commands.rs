//! Command buffer management
//!
//! Recording goes through the [`CommandEncoder`] trait so the frame's command
//! stream can be checked without a device. [`CommandRecorder`] and
//! [`ActiveRenderPass`] enforce pairing: a render pass is ended when its guard
//! drops, and a command buffer is only ended by consuming the recorder.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device.create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device.allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // Frees every buffer allocated from the pool; owners drain the device first
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Parameters for beginning a render pass
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBegin {
    /// Render pass to begin
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the acquired swapchain image
    pub framebuffer: vk::Framebuffer,
    /// Area covered by the pass
    pub render_area: vk::Rect2D,
    /// Clear color for the single color attachment
    pub clear_color: [f32; 4],
}

/// Sink for the commands of one frame
pub trait CommandEncoder {
    /// Reset and begin the command buffer
    fn begin(&mut self) -> VulkanResult<()>;
    /// End the command buffer
    fn end(&mut self) -> VulkanResult<()>;
    /// Begin a render pass with inline contents
    fn begin_render_pass(&mut self, begin: &RenderPassBegin);
    /// End the current render pass
    fn end_render_pass(&mut self);
    /// Bind a graphics pipeline
    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline);
    /// Set dynamic viewport 0
    fn set_viewport(&mut self, viewport: vk::Viewport);
    /// Set dynamic scissor 0
    fn set_scissor(&mut self, scissor: vk::Rect2D);
    /// Non-indexed draw
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
}

/// Encoder that writes into a real command buffer
pub struct DeviceCommandEncoder<'d> {
    device: &'d Device,
    command_buffer: vk::CommandBuffer,
}

impl<'d> DeviceCommandEncoder<'d> {
    /// Wrap a command buffer allocated from a resettable pool
    pub fn new(device: &'d Device, command_buffer: vk::CommandBuffer) -> Self {
        Self { device, command_buffer }
    }
}

impl CommandEncoder for DeviceCommandEncoder<'_> {
    fn begin(&mut self) -> VulkanResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)
        }
    }

    fn end(&mut self) -> VulkanResult<()> {
        unsafe {
            self.device.end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)
        }
    }

    fn begin_render_pass(&mut self, begin: &RenderPassBegin) {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: begin.clear_color },
        }];

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(begin.render_area)
            .clear_values(&clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }
    }

    fn end_render_pass(&mut self) {
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
    }

    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
        }
    }

    fn set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe {
            self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device.cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
    }
}

/// Records into an encoder between `begin` and `end`
pub struct CommandRecorder<'e, E: CommandEncoder> {
    encoder: &'e mut E,
}

impl<'e, E: CommandEncoder> CommandRecorder<'e, E> {
    /// Begin command recording
    pub fn begin(encoder: &'e mut E) -> VulkanResult<Self> {
        encoder.begin()?;
        Ok(Self { encoder })
    }

    /// Begin a render pass; it ends when the returned guard drops
    pub fn begin_render_pass(&mut self, begin: &RenderPassBegin) -> ActiveRenderPass<'_, E> {
        self.encoder.begin_render_pass(begin);
        ActiveRenderPass { encoder: self.encoder }
    }

    /// End command recording
    pub fn end(self) -> VulkanResult<()> {
        self.encoder.end()
    }
}

/// Render pass in progress
pub struct ActiveRenderPass<'a, E: CommandEncoder> {
    encoder: &'a mut E,
}

impl<E: CommandEncoder> ActiveRenderPass<'_, E> {
    /// Bind graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.encoder.bind_graphics_pipeline(pipeline);
    }

    /// Set viewport
    pub fn set_viewport(&mut self, viewport: vk::Viewport) {
        self.encoder.set_viewport(viewport);
    }

    /// Set scissor
    pub fn set_scissor(&mut self, scissor: vk::Rect2D) {
        self.encoder.set_scissor(scissor);
    }

    /// Draw non-indexed
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.encoder.draw(vertex_count, instance_count, first_vertex, first_instance);
    }
}

impl<E: CommandEncoder> Drop for ActiveRenderPass<'_, E> {
    fn drop(&mut self) {
        self.encoder.end_render_pass();
    }
}

/// Everything needed to record the triangle for one swapchain image
#[derive(Debug, Clone, Copy)]
pub struct FrameTarget {
    /// Render pass
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the acquired image
    pub framebuffer: vk::Framebuffer,
    /// Graphics pipeline
    pub pipeline: vk::Pipeline,
    /// Swapchain extent
    pub extent: vk::Extent2D,
    /// Clear color
    pub clear_color: [f32; 4],
}

/// Number of vertices the vertex shader generates
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// Viewport covering the whole extent with the full depth range
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor rectangle covering the whole extent
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Record the complete frame: clear, bind, set dynamic state, draw
pub fn record_triangle<E: CommandEncoder>(encoder: &mut E, target: &FrameTarget) -> VulkanResult<()> {
    let render_area = full_scissor(target.extent);
    let mut recorder = CommandRecorder::begin(encoder)?;
    {
        let mut pass = recorder.begin_render_pass(&RenderPassBegin {
            render_pass: target.render_pass,
            framebuffer: target.framebuffer,
            render_area,
            clear_color: target.clear_color,
        });
        pass.bind_pipeline(target.pipeline);
        pass.set_viewport(full_viewport(target.extent));
        pass.set_scissor(render_area);
        pass.draw(TRIANGLE_VERTEX_COUNT, 1, 0, 0);
    }
    recorder.end()
}
