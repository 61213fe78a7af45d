//! Core engine implementation

use thiserror::Error;

use crate::config::{ConfigError, EngineConfig};
use crate::render::backends::vulkan::{VulkanError, VulkanRenderer, Window, WindowError};
use crate::render::frame_loop::FrameLoop;

/// Main engine struct
///
/// Owns the window and the renderer driven by a frame loop. The frame loop is
/// declared first so every GPU object is destroyed while the window still
/// exists.
pub struct Engine {
    frame_loop: FrameLoop<VulkanRenderer>,
    window: Window,
}

impl Engine {
    /// Create the window and initialize the renderer
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");

        let mut window = Window::new(&config.window)?;
        let renderer = VulkanRenderer::new(&mut window, &config.renderer).map_err(EngineError::Initialization)?;

        Ok(Self {
            frame_loop: FrameLoop::new(renderer),
            window,
        })
    }

    /// Draw frames until the window asks to quit
    ///
    /// The device is idle when this returns, whether or not a frame failed.
    pub fn run(&mut self) -> Result<(), EngineError> {
        log::info!("Starting main loop...");

        let Self { frame_loop, window } = self;
        frame_loop
            .run(|| window.poll_quit_requested())
            .map_err(EngineError::Runtime)?;

        log::info!("Engine shutdown complete");
        Ok(())
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Startup could not complete; nothing is rendered
    #[error("Initialization failed: {0}")]
    Initialization(#[source] VulkanError),

    /// A frame failed after startup
    #[error("Runtime error: {0}")]
    Runtime(#[source] VulkanError),

    /// The windowing system failed
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// The configuration file could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::frame_loop::FrameStage;
    use ash::vk;

    #[test]
    fn test_error_messages_name_the_phase() {
        let init = EngineError::Initialization(VulkanError::NoSuitableDevice);
        assert!(init.to_string().starts_with("Initialization failed"));

        let runtime = EngineError::Runtime(VulkanError::FrameFailed {
            stage: FrameStage::Acquire,
            result: vk::Result::ERROR_OUT_OF_DATE_KHR,
        });
        let message = runtime.to_string();
        assert!(message.starts_with("Runtime error"));
        assert!(message.contains("acquire"));
    }

    #[test]
    fn test_window_error_converts() {
        let err: EngineError = WindowError::CreationFailed.into();
        assert!(matches!(err, EngineError::Window(WindowError::CreationFailed)));
    }
}
