//! Physical device and queue family selection
//!
//! The first discrete GPU wins, otherwise device 0 is used. The decision
//! logic lives in free functions over plain property data.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Instance};
use std::ffi::CStr;

use super::context::{VulkanError, VulkanResult};
use super::surface::SurfaceContext;

/// Physical device chosen for rendering
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics (and present) queue family
    pub queue_family: u32,
}

impl PhysicalDeviceInfo {
    /// Human readable device name
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Picks the device, queue family and verifies required extensions
pub struct DeviceSelector;

impl DeviceSelector {
    /// Enumerate devices and select one capable of graphics and presentation
    pub fn select(instance: &Instance, surface: &SurfaceContext) -> VulkanResult<PhysicalDeviceInfo> {
        let devices = unsafe {
            instance.enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let properties: Vec<vk::PhysicalDeviceProperties> = devices
            .iter()
            .map(|&device| unsafe { instance.get_physical_device_properties(device) })
            .collect();

        let device_types: Vec<vk::PhysicalDeviceType> = properties.iter().map(|p| p.device_type).collect();
        let index = select_device_index(&device_types).ok_or(VulkanError::NoSuitableDevice)?;
        let device = devices[index];

        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let queue_family = select_graphics_queue_family(&queue_families)
            .ok_or(VulkanError::NoGraphicsQueueFamily)?;

        if !surface.supports_present(device, queue_family)? {
            return Err(VulkanError::PresentationUnsupported { family: queue_family });
        }

        let extensions = unsafe {
            instance.enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let required = SwapchainLoader::name();
        if !supports_extension(&extensions, required) {
            return Err(VulkanError::MissingDeviceExtension(required.to_string_lossy().into_owned()));
        }

        let info = PhysicalDeviceInfo {
            device,
            properties: properties[index],
            queue_family,
        };

        let api = info.properties.api_version;
        log::info!(
            "Selected GPU {} of {}: {} ({:?}, Vulkan {}.{}.{})",
            index,
            devices.len(),
            info.name(),
            info.properties.device_type,
            vk::api_version_major(api),
            vk::api_version_minor(api),
            vk::api_version_patch(api),
        );

        Ok(info)
    }
}

/// Index of the first discrete GPU, falling back to index 0
///
/// Returns `None` only when no devices exist.
pub fn select_device_index(device_types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    if device_types.is_empty() {
        return None;
    }
    Some(
        device_types
            .iter()
            .position(|&ty| ty == vk::PhysicalDeviceType::DISCRETE_GPU)
            .unwrap_or(0),
    )
}

/// Lowest-indexed queue family whose flags include graphics
pub fn select_graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .and_then(|index| u32::try_from(index).ok())
}

/// True iff some enumerated extension's name exactly equals `required`
pub fn supports_extension(available: &[vk::ExtensionProperties], required: &CStr) -> bool {
    available.iter().any(|extension| {
        let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
        name == required
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::raw::c_char;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn extension(name: &str) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props.extension_name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn test_first_discrete_gpu_is_selected() {
        let types = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        assert_eq!(select_device_index(&types), Some(1));
    }

    #[test]
    fn test_falls_back_to_index_zero_without_discrete_gpu() {
        let types = [
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::VIRTUAL_GPU,
        ];
        assert_eq!(select_device_index(&types), Some(0));
    }

    #[test]
    fn test_no_devices_selects_nothing() {
        assert_eq!(select_device_index(&[]), None);
    }

    #[test]
    fn test_lowest_graphics_family_is_selected() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(select_graphics_queue_family(&families), Some(2));
    }

    #[test]
    fn test_missing_graphics_family_fails() {
        let families = [family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::TRANSFER)];
        assert_eq!(select_graphics_queue_family(&families), None);
        assert_eq!(select_graphics_queue_family(&[]), None);
    }

    #[test]
    fn test_extension_match_is_affirmative() {
        let available = [extension("VK_KHR_maintenance1"), extension("VK_KHR_swapchain")];
        assert!(supports_extension(&available, SwapchainLoader::name()));
    }

    #[test]
    fn test_extension_absent_or_prefix_only_is_unsupported() {
        let available = [extension("VK_KHR_maintenance1"), extension("VK_KHR_swapchain_mutable_format")];
        assert!(!supports_extension(&available, SwapchainLoader::name()));
        assert!(!supports_extension(&[], SwapchainLoader::name()));
    }
}
