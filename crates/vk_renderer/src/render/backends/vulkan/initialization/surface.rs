//! Vulkan surface management
//!
//! Wraps the window surface created by the windowing service and exposes the
//! queries needed for device selection and swapchain negotiation.

use ash::{extensions::khr, vk};

use super::context::{VulkanError, VulkanInstance, VulkanResult};

/// Presentation surface bound to the window; must outlive the swapchain
pub struct SurfaceContext {
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl SurfaceContext {
    /// Take ownership of a surface created against `instance`
    pub fn new(instance: &VulkanInstance, surface: vk::SurfaceKHR) -> Self {
        let surface_loader = khr::Surface::new(&instance.entry, &instance.instance);
        Self { surface_loader, surface }
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Get surface formats for a physical device
    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Get surface present modes for a physical device
    pub fn present_modes(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Check if a queue family supports presentation to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> VulkanResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for SurfaceContext {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
