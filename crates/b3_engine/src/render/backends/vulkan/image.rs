//! Device-local images, views and samplers
//!
//! Covers the four kinds of image the renderer uses: the shadow depth map,
//! the multisampled color and depth targets of the color pass, and sampled
//! textures uploaded through a staging buffer.

use ash::{vk, Device};

use crate::assets::Texture;

use super::buffer::Buffer;
use super::commands::CommandPool;
use super::context::VulkanContext;
use super::{VulkanError, VulkanResult};

/// Depth format of the shadow map and the color pass depth target
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Subresource range covering the single mip level and layer of `aspect`
pub fn full_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// One stage/access pair of a layout transition
#[derive(Debug, Clone, Copy)]
pub struct Access {
    /// Pipeline stages
    pub stage: vk::PipelineStageFlags2,
    /// Memory access
    pub access: vk::AccessFlags2,
}

impl Access {
    /// Pair `stage` with `access`
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self { stage, access }
    }
}

/// Synchronization2 layout transition of a whole single-level image
pub fn layout_barrier(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src: Access,
    dst: Access,
) -> vk::ImageMemoryBarrier2 {
    vk::ImageMemoryBarrier2::builder()
        .src_stage_mask(src.stage)
        .src_access_mask(src.access)
        .dst_stage_mask(dst.stage)
        .dst_access_mask(dst.access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(full_range(aspect))
        .build()
}

/// Record `barriers` as one dependency
pub fn cmd_barriers(device: &Device, command_buffer: vk::CommandBuffer, barriers: &[vk::ImageMemoryBarrier2]) {
    let dependency = vk::DependencyInfo::builder().image_memory_barriers(barriers);
    unsafe { device.cmd_pipeline_barrier2(command_buffer, &dependency) };
}

/// 2D image with its memory and a view
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl Image {
    /// Create an uninitialized device-local image and its view
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        samples: vk::SampleCountFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let device = context.device().clone();

        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(samples);

        let image = unsafe { device.create_image(&create_info, None).map_err(VulkanError::Api)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = context
            .find_memory_type(requirements.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .and_then(|memory_type_index| {
                let alloc_info = vk::MemoryAllocateInfo::builder()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                unsafe { device.allocate_memory(&alloc_info, None).map_err(VulkanError::Api) }
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(error) => {
                unsafe { device.destroy_image(image, None) };
                return Err(error);
            }
        };

        let mut this = Self {
            device,
            image,
            memory,
            view: vk::ImageView::null(),
        };

        unsafe {
            this.device
                .bind_image_memory(image, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(full_range(aspect));
        this.view = unsafe { this.device.create_image_view(&view_info, None).map_err(VulkanError::Api)? };

        Ok(this)
    }

    /// Square depth image rendered by the shadow pass and sampled by the
    /// color pass
    pub fn shadow_map(context: &VulkanContext, size: u32) -> VulkanResult<Self> {
        Self::new(
            context,
            vk::Extent2D { width: size, height: size },
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageAspectFlags::DEPTH,
        )
    }

    /// Depth target of the color pass
    pub fn depth_target(context: &VulkanContext, extent: vk::Extent2D, samples: vk::SampleCountFlags) -> VulkanResult<Self> {
        Self::new(
            context,
            extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            samples,
            vk::ImageAspectFlags::DEPTH,
        )
    }

    /// Multisampled color target resolved into the swapchain image
    pub fn color_target(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        Self::new(
            context,
            extent,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            samples,
            vk::ImageAspectFlags::COLOR,
        )
    }

    /// Upload an RGBA8 texture and leave it in the shader-read layout
    pub fn texture(context: &VulkanContext, pool: &CommandPool, texture: &Texture) -> VulkanResult<Self> {
        let format = if texture.is_srgb() {
            vk::Format::R8G8B8A8_SRGB
        } else {
            vk::Format::R8G8B8A8_UNORM
        };
        let extent = vk::Extent2D {
            width: texture.width(),
            height: texture.height(),
        };

        let staging = Buffer::with_data(context, vk::BufferUsageFlags::TRANSFER_SRC, texture.pixels())?;
        let image = Self::new(
            context,
            extent,
            format,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageAspectFlags::COLOR,
        )?;

        pool.submit_and_wait(context.graphics_queue(), |device, command_buffer| {
            let to_transfer = layout_barrier(
                image.image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                Access::new(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE),
                Access::new(vk::PipelineStageFlags2::COPY, vk::AccessFlags2::TRANSFER_WRITE),
            );
            cmd_barriers(device, command_buffer, &[to_transfer]);

            let region = vk::BufferImageCopy::builder()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .build();
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging.handle(),
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }

            let to_shader_read = layout_barrier(
                image.image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                Access::new(vk::PipelineStageFlags2::COPY, vk::AccessFlags2::TRANSFER_WRITE),
                Access::new(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ),
            );
            cmd_barriers(device, command_buffer, &[to_shader_read]);
        })?;

        log::debug!("Uploaded {}x{} texture ({:?})", extent.width, extent.height, format);
        Ok(image)
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View over the whole image
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
            }
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Sampler with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear, repeating, anisotropic sampler for surface textures
    pub fn texture(context: &VulkanContext) -> VulkanResult<Self> {
        let max_anisotropy = context.physical_device().properties.limits.max_sampler_anisotropy.min(16.0);
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);
        Self::new(context.device().clone(), &info)
    }

    /// Clamped sampler for reading raw depth out of the shadow map
    pub fn shadow(context: &VulkanContext) -> VulkanResult<Self> {
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .max_anisotropy(1.0)
            .min_lod(0.0)
            .max_lod(1.0);
        Self::new(context.device().clone(), &info)
    }

    fn new(device: Device, info: &vk::SamplerCreateInfo) -> VulkanResult<Self> {
        let sampler = unsafe { device.create_sampler(info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, sampler })
    }

    /// Sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
