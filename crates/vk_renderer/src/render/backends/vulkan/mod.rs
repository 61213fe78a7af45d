//! Vulkan backend implementation
//!
//! Organized into initialization, rendering and state modules, plus the
//! renderer that ties them into a frame backend.

/// Vulkan initialization types (window, instance, surface, device selection)
pub mod initialization;

/// Vulkan rendering operations (shaders, pipelines, render passes, commands)
pub mod rendering;

/// Vulkan state management (swapchain, framebuffers, frame synchronization)
pub mod state;

/// Main Vulkan renderer implementation
pub mod renderer;

// Re-export main renderer
pub use renderer::VulkanRenderer;

// Re-export core initialization types
pub use initialization::context::{GraphicsContext, LogicalDevice, VulkanError, VulkanInstance, VulkanResult};
pub use initialization::device_selection::{DeviceSelector, PhysicalDeviceInfo};
pub use initialization::surface::SurfaceContext;
pub use initialization::window::{Window, WindowError, WindowResult};

// Re-export rendering types
pub use rendering::commands::{
    ActiveRenderPass, CommandEncoder, CommandPool, CommandRecorder, DeviceCommandEncoder, FrameTarget,
};
pub use rendering::render_pass::RenderPass;
pub use rendering::shader::{GraphicsPipeline, ShaderModule};

// Re-export state types
pub use state::framebuffer::{Framebuffer, SwapchainFramebuffers};
pub use state::swapchain::{Swapchain, SwapchainSettings, SwapchainSupport};
pub use state::sync::{Fence, FrameSync, FrameSynchronizer, Semaphore};
