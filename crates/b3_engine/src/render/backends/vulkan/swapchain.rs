//! Swapchain creation, acquisition and presentation

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::context::VulkanContext;
use super::image::full_range;
use super::{VulkanError, VulkanResult};

/// Result of an acquire or present call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus<T> {
    /// The operation succeeded and the swapchain still matches the surface
    Optimal(T),
    /// The operation succeeded but the swapchain should be recreated
    Suboptimal(T),
    /// The swapchain no longer matches the surface; nothing happened
    OutOfDate,
}

/// Swapchain with its image views
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the context's surface.
    ///
    /// `requested` is used when the surface leaves the extent to the
    /// application. Passing the previous swapchain as `old` lets the driver
    /// hand its resources over.
    pub fn new(context: &VulkanContext, requested: vk::Extent2D, old: Option<&Swapchain>) -> VulkanResult<Self> {
        let physical_device = context.physical_device().device;
        let surface = context.surface();
        let surface_loader = context.surface_loader();

        let caps = context.surface_capabilities()?;

        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let format = surface_formats
            .iter()
            .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .or_else(|| surface_formats.first())
            .copied()
            .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no formats".to_string()))?;

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_mode = present_modes
            .iter()
            .copied()
            .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO);

        let extent = choose_extent(&caps, requested);

        let image_count = if caps.max_image_count > 0 {
            (caps.min_image_count + 1).min(caps.max_image_count)
        } else {
            caps.min_image_count + 1
        };

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), Swapchain::handle));

        let loader = context.swapchain_loader().clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None).map_err(VulkanError::Api)? };

        let mut this = Self {
            device: context.device().clone(),
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            extent,
        };

        this.images = unsafe { this.loader.get_swapchain_images(swapchain).map_err(VulkanError::Api)? };
        for &image in &this.images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(full_range(vk::ImageAspectFlags::COLOR));
            let view = unsafe { this.device.create_image_view(&view_info, None).map_err(VulkanError::Api)? };
            this.image_views.push(view);
        }

        log::debug!(
            "Created swapchain {}x{} with {} images ({:?}, {:?})",
            extent.width,
            extent.height,
            this.images.len(),
            format.format,
            present_mode
        );

        Ok(this)
    }

    /// Acquire the next image, signaling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<SurfaceStatus<u32>> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        match result {
            Ok((index, false)) => Ok(SurfaceStatus::Optimal(index)),
            Ok((index, true)) => Ok(SurfaceStatus::Suboptimal(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::OutOfDate),
            Err(error) => Err(VulkanError::Api(error)),
        }
    }

    /// Queue image `index` for presentation once `wait` is signaled
    pub fn present(&self, queue: vk::Queue, index: u32, wait: vk::Semaphore) -> VulkanResult<SurfaceStatus<()>> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(SurfaceStatus::Optimal(())),
            Ok(true) => Ok(SurfaceStatus::Suboptimal(())),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::OutOfDate),
            Err(error) => Err(VulkanError::Api(error)),
        }
    }

    /// Swapchain image `index`
    pub fn image(&self, index: usize) -> Option<vk::Image> {
        self.images.get(index).copied()
    }

    /// View of swapchain image `index`
    pub fn image_view(&self, index: usize) -> Option<vk::ImageView> {
        self.image_views.get(index).copied()
    }

    /// Number of images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Image size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Image format
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    /// Swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// The surface's fixed extent, or `requested` clamped to the surface limits
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: requested
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: requested
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_surface_extent_wins() {
        let extent = choose_extent(&caps((800, 600)), vk::Extent2D { width: 1024, height: 768 });
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_requested_extent_is_clamped() {
        let extent = choose_extent(&caps((u32::MAX, u32::MAX)), vk::Extent2D { width: 8000, height: 0 });
        assert_eq!((extent.width, extent.height), (4096, 1));
    }
}
