//! Vulkan swapchain management
//!
//! Negotiation is split from construction: [`SwapchainSupport`] holds what
//! the surface reports, [`SwapchainSupport::negotiate`] turns it into
//! immutable [`SwapchainSettings`], and [`Swapchain::new`] builds the images
//! and views from those settings.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::render::backends::vulkan::{GraphicsContext, VulkanError, VulkanResult};

/// Width reported in `current_extent` when the surface lets the swapchain pick
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Everything the surface reports for a physical device
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    /// Surface capabilities
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported (format, color space) pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Negotiated swapchain parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainSettings {
    /// Color format and color space
    pub format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Requested minimum image count
    pub image_count: u32,
    /// Surface transform to apply
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainSupport {
    /// Query the surface of the context's selected device
    pub fn query(context: &GraphicsContext) -> VulkanResult<Self> {
        let physical_device = context.physical_device().device;
        let surface = context.surface();

        Ok(Self {
            capabilities: surface.capabilities(physical_device)?,
            formats: surface.formats(physical_device)?,
            present_modes: surface.present_modes(physical_device)?,
        })
    }

    /// Choose format, present mode, extent and image count
    pub fn negotiate(&self, drawable_size: (u32, u32)) -> VulkanResult<SwapchainSettings> {
        if self.present_modes.is_empty() {
            return Err(VulkanError::EmptySurfaceSupport);
        }
        let format = choose_surface_format(&self.formats).ok_or(VulkanError::EmptySurfaceSupport)?;

        Ok(SwapchainSettings {
            format,
            present_mode: choose_present_mode(&self.present_modes),
            extent: choose_extent(&self.capabilities, drawable_size),
            image_count: choose_image_count(&self.capabilities),
            pre_transform: self.capabilities.current_transform,
        })
    }
}

/// Prefer BGRA8 sRGB with the non-linear sRGB color space, else the first pair
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

/// Prefer mailbox, else FIFO (which every implementation must support)
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the surface's current extent, or clamp the drawable size when undefined
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, drawable_size: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != UNDEFINED_EXTENT {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: drawable_size.0.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: drawable_size.1.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, clamped to the maximum when it is bounded
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    settings: SwapchainSettings,
}

impl Swapchain {
    /// Negotiate settings with the surface and create the swapchain
    pub fn new(context: &GraphicsContext, drawable_size: (u32, u32)) -> VulkanResult<Self> {
        let support = SwapchainSupport::query(context)?;
        let settings = support.negotiate(drawable_size)?;
        Self::with_settings(context, settings)
    }

    /// Create the swapchain, its images and one view per image
    pub fn with_settings(context: &GraphicsContext, settings: SwapchainSettings) -> VulkanResult<Self> {
        let device = context.raw_device();
        let swapchain_loader = context.swapchain_loader().clone();

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface().handle())
            .min_image_count(settings.image_count)
            .image_format(settings.format.format)
            .image_color_space(settings.format.color_space)
            .image_extent(settings.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(settings.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(settings.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        // Build the wrapper first so a failed view creation still cleans up
        let mut result = Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views: Vec::new(),
            settings,
        };

        for &image in &result.images {
            let view = Self::create_color_view(&result.device, image, settings.format.format)?;
            result.image_views.push(view);
        }

        log::info!(
            "Swapchain created: {} images, {}x{}, {:?} / {:?}, {:?}",
            result.images.len(),
            settings.extent.width,
            settings.extent.height,
            settings.format.format,
            settings.format.color_space,
            settings.present_mode,
        );
        Ok(result)
    }

    fn create_color_view(device: &Device, image: vk::Image, format: vk::Format) -> VulkanResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            device.create_image_view(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.settings.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.settings.format
    }

    /// Get chosen present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.settings.present_mode
    }

    /// Get image views, one per presentable image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of presentable images actually created
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Acquire the next presentable image, signaling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<u32> {
        let (image_index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
                .map_err(VulkanError::Api)?
        };
        if suboptimal {
            log::debug!("Swapchain is suboptimal for the surface (image {image_index})");
        }
        Ok(image_index)
    }

    /// Queue presentation of `image_index` once `wait_semaphore` is signaled
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait_semaphore: vk::Semaphore) -> VulkanResult<()> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe {
            self.swapchain_loader
                .queue_present(queue, &present_info)
                .map_err(VulkanError::Api)?
        };
        if suboptimal {
            log::debug!("Presented to a suboptimal swapchain (image {image_index})");
        }
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: vk::Extent2D { width: UNDEFINED_EXTENT, height: UNDEFINED_EXTENT },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn test_preferred_srgb_format_is_chosen() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[2]));
    }

    #[test]
    fn test_first_format_is_fallback() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[0]));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_mailbox_preferred_over_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_fifo_fallback() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_from_drawable_size_within_bounds() {
        let caps = capabilities((1, 1), (4096, 4096));
        assert_eq!(choose_extent(&caps, (1600, 900)), vk::Extent2D { width: 1600, height: 900 });
    }

    #[test]
    fn test_extent_clamps_to_max() {
        let caps = capabilities((1, 1), (4096, 4096));
        assert_eq!(choose_extent(&caps, (8000, 8000)), vk::Extent2D { width: 4096, height: 4096 });
    }

    #[test]
    fn test_extent_axes_clamp_independently() {
        let caps = capabilities((64, 64), (4096, 2048));
        assert_eq!(choose_extent(&caps, (10, 3000)), vk::Extent2D { width: 64, height: 2048 });
    }

    #[test]
    fn test_defined_current_extent_used_verbatim() {
        let mut caps = capabilities((1, 1), (4096, 4096));
        caps.current_extent = vk::Extent2D { width: 1280, height: 720 };
        assert_eq!(choose_extent(&caps, (1600, 900)), vk::Extent2D { width: 1280, height: 720 });
    }

    #[test]
    fn test_image_count_is_min_plus_one() {
        let caps = capabilities((1, 1), (16, 16));
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_image_count_clamped_to_max() {
        let mut caps = capabilities((1, 1), (16, 16));
        caps.min_image_count = 3;
        caps.max_image_count = 3;
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_image_count_unbounded_max() {
        let mut caps = capabilities((1, 1), (16, 16));
        caps.min_image_count = 4;
        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps), 5);
    }

    #[test]
    fn test_negotiate_combines_choices() {
        let support = SwapchainSupport {
            capabilities: capabilities((1, 1), (4096, 4096)),
            formats: vec![format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        let settings = support.negotiate((1600, 900)).unwrap();
        assert_eq!(settings.format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(settings.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(settings.extent, vk::Extent2D { width: 1600, height: 900 });
        assert_eq!(settings.image_count, 3);
    }

    #[test]
    fn test_negotiate_fails_on_empty_support() {
        let no_formats = SwapchainSupport {
            capabilities: capabilities((1, 1), (4096, 4096)),
            formats: Vec::new(),
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(matches!(no_formats.negotiate((800, 600)), Err(VulkanError::EmptySurfaceSupport)));

        let no_modes = SwapchainSupport {
            capabilities: capabilities((1, 1), (4096, 4096)),
            formats: vec![format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            present_modes: Vec::new(),
        };
        assert!(matches!(no_modes.negotiate((800, 600)), Err(VulkanError::EmptySurfaceSupport)));
    }
}
