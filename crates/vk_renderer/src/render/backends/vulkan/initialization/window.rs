//! Window management using GLFW
//!
//! The windowing service: creates the native window, reports the drawable
//! size and required instance extensions, creates the Vulkan surface and
//! turns OS events into a quit request.

use thiserror::Error;

use crate::config::WindowConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// GLFW does not support Vulkan on this system
    #[error("Vulkan is not supported by the windowing system")]
    VulkanUnsupported,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a window without a client API, sized and titled from config
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        // The swapchain is built once; a fixed-size window keeps it valid
        glfw.window_hint(glfw::WindowHint::Resizable(false));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);

        log::info!("Created window '{}' ({}x{})", config.title, config.width, config.height);
        Ok(Self { glfw, window, events })
    }

    /// Poll OS events and report whether the user asked to quit
    pub fn poll_quit_requested(&mut self) -> bool {
        self.glfw.poll_events();

        let mut quit = self.window.should_close();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::Close
                | glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    quit = true;
                }
                _ => {}
            }
        }

        if quit {
            self.window.set_should_close(true);
        }
        quit
    }

    /// Drawable size in pixels
    pub fn drawable_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0).unsigned_abs(), height.max(0).unsigned_abs())
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {result:?}")))
        }
    }
}
