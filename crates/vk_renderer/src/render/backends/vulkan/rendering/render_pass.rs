//! Render pass management
//!
//! A single-subpass pass with one color attachment that is cleared on load and
//! left in `PRESENT_SRC_KHR` for the presentation engine.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Create the presentation render pass for a swapchain color format
    pub fn new(device: Device, color_format: vk::Format) -> VulkanResult<Self> {
        let attachments = [color_attachment(color_format)];

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = [color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)
            .build();

        let subpasses = [subpass];
        let dependencies = [acquire_dependency()];

        let render_pass_create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device.create_render_pass(&render_pass_create_info, None)
                .map_err(VulkanError::Api)?
        };

        log::debug!("Render pass created for {color_format:?}");
        Ok(Self { device, render_pass })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// The swapchain color attachment
pub fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build()
}

/// External dependency so the layout transition waits for image acquisition
///
/// The acquire semaphore is waited at `COLOR_ATTACHMENT_OUTPUT`, so the
/// subpass must not write the attachment before that stage.
pub fn acquire_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build()
}
