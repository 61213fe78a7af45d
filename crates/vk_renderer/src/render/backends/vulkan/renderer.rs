//! Vulkan renderer
//!
//! Builds every GPU object the triangle needs, in dependency order, and
//! implements [`FrameBackend`] on top of them. Fields are declared in reverse
//! creation order so that dropping the renderer tears down per-frame
//! resources first and the graphics context last.

use ash::vk;
use std::path::Path;

use crate::config::RendererConfig;
use crate::render::backends::vulkan::rendering::commands::record_triangle;
use crate::render::backends::vulkan::{
    DeviceCommandEncoder, FrameSynchronizer, FrameTarget, GraphicsContext, GraphicsPipeline, RenderPass, Swapchain,
    SwapchainFramebuffers, VulkanError, VulkanResult, Window,
};
use crate::render::frame_loop::FrameBackend;

/// Owns the full Vulkan object graph for the triangle
pub struct VulkanRenderer {
    frames: FrameSynchronizer,
    framebuffers: SwapchainFramebuffers,
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    swapchain: Swapchain,
    context: GraphicsContext,
    clear_color: [f32; 4],
}

impl VulkanRenderer {
    /// Initialize all stages against the window
    ///
    /// If any stage fails, everything created before it is destroyed in
    /// reverse order before the error is returned.
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let context = GraphicsContext::new(window, &config.application_name, config.validation_requested())?;

        let swapchain = Swapchain::new(&context, window.drawable_size())?;
        let render_pass = RenderPass::new(context.raw_device(), swapchain.format().format)?;
        let pipeline = GraphicsPipeline::from_shader_files(
            context.raw_device(),
            render_pass.handle(),
            Path::new(&config.shaders.vertex_shader_path),
            Path::new(&config.shaders.fragment_shader_path),
        )?;
        let framebuffers = SwapchainFramebuffers::new(context.device(), &swapchain, &render_pass)?;
        let frames = FrameSynchronizer::new(context.device(), context.queue_family(), config.effective_frames_in_flight())?;

        log::info!(
            "Renderer ready: {}x{} {:?} {:?}, {} images, {} frames in flight",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.format().format,
            swapchain.present_mode(),
            swapchain.image_count(),
            frames.frames_in_flight()
        );

        Ok(Self {
            frames,
            framebuffers,
            pipeline,
            render_pass,
            swapchain,
            context,
            clear_color: config.clear_color,
        })
    }
}

impl FrameBackend for VulkanRenderer {
    fn frames_in_flight(&self) -> usize {
        self.frames.frames_in_flight()
    }

    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
        let frame = self.frames.frame(slot)?;
        frame.in_flight.wait(u64::MAX)?;
        frame.in_flight.reset()
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<u32> {
        let frame = self.frames.frame(slot)?;
        self.swapchain.acquire_next_image(frame.image_available.handle())
    }

    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let frame = self.frames.frame(slot)?;
        let target = FrameTarget {
            render_pass: self.render_pass.handle(),
            framebuffer: self.framebuffers.get(image_index)?,
            pipeline: self.pipeline.handle(),
            extent: self.swapchain.extent(),
            clear_color: self.clear_color,
        };

        let mut encoder = DeviceCommandEncoder::new(self.context.device(), frame.command_buffer);
        record_triangle(&mut encoder, &target)
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let frame = self.frames.frame(slot)?;

        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context
                .device()
                .queue_submit(self.context.queue(), &[submit_info], frame.in_flight.handle())
                .map_err(VulkanError::Api)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let frame = self.frames.frame(slot)?;
        self.swapchain
            .present(self.context.queue(), image_index, frame.render_finished.handle())
    }

    fn wait_idle(&mut self) -> VulkanResult<()> {
        self.context.wait_idle()
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::warn!("Device wait idle failed during renderer teardown: {e}");
        }
        log::debug!("Destroying renderer resources");
    }
}
