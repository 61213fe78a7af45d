//! # Vk Renderer
//!
//! A minimal Vulkan renderer that draws one triangle with two frames in flight.
//!
//! ## Initialization stages
//!
//! - **Window**: GLFW window without a client API
//! - **Graphics context**: instance, surface, device selection, logical device
//! - **Swapchain**: format, present mode, extent and image count negotiation
//! - **Pipeline**: render pass, fixed-function pipeline, framebuffers
//! - **Frame synchronization**: command buffer, semaphores and fence per slot
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vk_renderer::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     let config = EngineConfig::default();
//!     vk_renderer::foundation::logging::init(config.log_level);
//!     let mut engine = Engine::new(&config)?;
//!     engine.run()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

mod engine;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, EngineConfig, LogLevel, RendererConfig, ShaderConfig, WindowConfig},
        render::{FrameBackend, FrameLoop, FrameStage, VulkanError, VulkanResult},
        Engine, EngineError,
    };
}
