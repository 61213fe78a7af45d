//! Rendering
//!
//! [`frame_loop`] holds the backend-agnostic frame state machine and
//! [`backends::vulkan`] the Vulkan objects it drives.

/// Backend implementations
pub mod backends;

/// Frame state machine and slot cursor
pub mod frame_loop;

pub use backends::vulkan::{GraphicsContext, VulkanError, VulkanRenderer, VulkanResult};
pub use frame_loop::{FrameBackend, FrameCursor, FrameLoop, FrameStage};
