//! Vulkan context management
//!
//! Owns the API instance, the presentation surface and the logical device.
//! Everything else in the backend borrows from a [`GraphicsContext`], which is
//! created once at startup and destroyed last, in reverse dependency order.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use thiserror::Error;

use super::device_selection::{DeviceSelector, PhysicalDeviceInfo};
use super::surface::SurfaceContext;
use super::window::Window;
use crate::render::frame_loop::FrameStage;

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// The instance reported no physical devices at all
    #[error("Failed to find a GPU with Vulkan support")]
    NoSuitableDevice,

    /// The selected device has no queue family with graphics support
    #[error("Failed to find a graphics queue family")]
    NoGraphicsQueueFamily,

    /// A required device extension is not exposed by the selected device
    #[error("Required device extension not supported: {0}")]
    MissingDeviceExtension(String),

    /// The graphics queue family cannot present to the window surface
    #[error("Graphics queue family {family} cannot present to the window surface")]
    PresentationUnsupported {
        /// Queue family that was checked
        family: u32,
    },

    /// The surface reported no formats or no present modes
    #[error("Surface formats or present modes empty")]
    EmptySurfaceSupport,

    /// Shader bytecode could not be read from disk
    #[error("Failed to read shader {path:?}: {source}")]
    ShaderLoad {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Shader bytecode is not a valid SPIR-V word stream
    #[error("Invalid SPIR-V in {path:?}: {source}")]
    InvalidShaderCode {
        /// Path the bytecode came from
        path: PathBuf,
        /// Decoding error
        source: std::io::Error,
    },

    /// A per-frame API call returned a non-success code
    #[error("Frame failed during {stage}: {result:?}")]
    FrameFailed {
        /// Frame loop stage that failed
        stage: FrameStage,
        /// Result code returned by the driver
        result: vk::Result,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    validation_enabled: bool,
}

impl VulkanInstance {
    /// Create a new Vulkan instance enabling the window's required extensions
    pub fn new(required_extensions: &[String], app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {e}")))?;
        let engine_name_cstr = CString::new("vk_renderer")
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid extension name: {e}")))?;

        let mut extensions: Vec<*const c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let validation_enabled = enable_validation && Self::validation_layer_available(&entry)?;
        if validation_enabled {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names: Vec<*const c_char> = if validation_enabled {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        log::debug!(
            "Creating Vulkan instance with extensions {:?} (validation: {})",
            required_extensions,
            validation_enabled
        );

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe {
            entry.create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug_utils = if validation_enabled {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            validation_enabled,
        })
    }

    /// Whether the validation layer was actually enabled on this instance
    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;

        let available = layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER
        });

        if !available {
            log::warn!("Validation requested but {:?} is not installed; continuing without it", VALIDATION_LAYER);
        }
        Ok(available)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::trace!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Logical device wrapper with RAII cleanup
///
/// A single queue serves both graphics and presentation.
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics + present queue
    pub queue: vk::Queue,
    /// Index of the queue family the queue was taken from
    pub queue_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a logical device with one queue from the selected family
    pub fn new(instance: &VulkanInstance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let priorities = [1.0_f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(physical_device.queue_family)
            .queue_priorities(&priorities)
            .build()];

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance.instance.create_device(physical_device.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let queue = unsafe { device.get_device_queue(physical_device.queue_family, 0) };
        let swapchain_loader = SwapchainLoader::new(&instance.instance, &device);

        log::debug!("Logical device created on queue family {}", physical_device.queue_family);
        Ok(Self {
            device,
            queue,
            queue_family: physical_device.queue_family,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            // Ensure device is idle before destruction
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Umbrella context owning the instance, surface and device
///
/// Fields drop in declaration order, which is the reverse of creation order:
/// device, then surface, then instance.
pub struct GraphicsContext {
    device: LogicalDevice,
    surface: SurfaceContext,
    physical_device: PhysicalDeviceInfo,
    instance: VulkanInstance,
}

impl GraphicsContext {
    /// Create the instance, surface and device for the window
    pub fn new(window: &mut Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}")))?;

        let instance = VulkanInstance::new(&required_extensions, app_name, enable_validation)?;

        let surface_handle = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;
        let surface = SurfaceContext::new(&instance, surface_handle);

        let physical_device = DeviceSelector::select(&instance.instance, &surface)?;
        let device = LogicalDevice::new(&instance, &physical_device)?;

        log::info!("Graphics context initialized");
        Ok(Self {
            device,
            surface,
            physical_device,
            instance,
        })
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the presentation surface
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Get the selected physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Get the raw Device handle
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Borrow the logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Get the graphics + present queue
    pub fn queue(&self) -> vk::Queue {
        self.device.queue
    }

    /// Get the graphics queue family index
    pub fn queue_family(&self) -> u32 {
        self.device.queue_family
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device.device.device_wait_idle()
                .map_err(VulkanError::Api)
        }
    }
}
