//! Descriptor set layouts, pools and the bindless texture array
//!
//! Scene pipeline sets:
//!
//! | set | binding | contents |
//! |---|---|---|
//! | 0 | 0 | scene vertex uniforms |
//! | 0 | 1 | scene fragment uniforms |
//! | 0 | 2 | shadow map sampler |
//! | 1 | 0 | per-node model uniforms, dynamic offset |
//! | 2 | 0 | texture sampler |
//! | 2 | 1 | texture array, variable count |
//!
//! The shadow pipeline has a single set with the per-node light-space
//! matrices at a dynamic offset.

use ash::{vk, Device};

use super::image::{Image, Sampler};
use super::{VulkanError, VulkanResult};

/// Descriptor set layout with RAII cleanup
pub struct DescriptorSetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Create a layout from `bindings`
    pub fn new(device: Device, bindings: &[vk::DescriptorSetLayoutBinding]) -> VulkanResult<Self> {
        let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, layout })
    }

    /// Create an update-after-bind layout with per-binding flags
    pub fn with_binding_flags(
        device: Device,
        bindings: &[vk::DescriptorSetLayoutBinding],
        binding_flags: &[vk::DescriptorBindingFlags],
    ) -> VulkanResult<Self> {
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::builder().binding_flags(binding_flags);
        let info = vk::DescriptorSetLayoutCreateInfo::builder()
            .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            .bindings(bindings)
            .push_next(&mut flags_info);
        let layout = unsafe { device.create_descriptor_set_layout(&info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, layout })
    }

    /// Layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

fn binding(index: u32, ty: vk::DescriptorType, count: u32, stages: vk::ShaderStageFlags) -> vk::DescriptorSetLayoutBinding {
    vk::DescriptorSetLayoutBinding::builder()
        .binding(index)
        .descriptor_type(ty)
        .descriptor_count(count)
        .stage_flags(stages)
        .build()
}

/// Every set layout the two pipelines use
pub struct DescriptorLayouts {
    /// Set 0 of the scene pipeline
    pub scene: DescriptorSetLayout,
    /// Set 1 of the scene pipeline
    pub model: DescriptorSetLayout,
    /// Set 2 of the scene pipeline
    pub textures: DescriptorSetLayout,
    /// Set 0 of the shadow pipeline
    pub shadow: DescriptorSetLayout,
    max_textures: u32,
}

impl DescriptorLayouts {
    /// Create the layouts, sizing the texture array binding for `max_textures`
    pub fn new(device: &Device, max_textures: u32) -> VulkanResult<Self> {
        let scene = DescriptorSetLayout::new(
            device.clone(),
            &[
                binding(0, vk::DescriptorType::UNIFORM_BUFFER, 1, vk::ShaderStageFlags::VERTEX),
                binding(1, vk::DescriptorType::UNIFORM_BUFFER, 1, vk::ShaderStageFlags::FRAGMENT),
                binding(2, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT),
            ],
        )?;

        let model = DescriptorSetLayout::new(
            device.clone(),
            &[binding(0, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 1, vk::ShaderStageFlags::VERTEX)],
        )?;

        let textures = DescriptorSetLayout::with_binding_flags(
            device.clone(),
            &[
                binding(0, vk::DescriptorType::SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT),
                binding(1, vk::DescriptorType::SAMPLED_IMAGE, max_textures, vk::ShaderStageFlags::FRAGMENT),
            ],
            &[
                vk::DescriptorBindingFlags::empty(),
                vk::DescriptorBindingFlags::PARTIALLY_BOUND
                    | vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT
                    | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
                    | vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING,
            ],
        )?;

        let shadow = DescriptorSetLayout::new(
            device.clone(),
            &[binding(0, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 1, vk::ShaderStageFlags::VERTEX)],
        )?;

        Ok(Self {
            scene,
            model,
            textures,
            shadow,
            max_textures,
        })
    }

    /// Capacity of the texture array
    pub fn max_textures(&self) -> u32 {
        self.max_textures
    }
}

/// Descriptor pool with RAII cleanup
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool for `max_sets` sets drawing from `sizes`
    pub fn new(
        device: Device,
        max_sets: u32,
        sizes: &[vk::DescriptorPoolSize],
        flags: vk::DescriptorPoolCreateFlags,
    ) -> VulkanResult<Self> {
        let info = vk::DescriptorPoolCreateInfo::builder()
            .flags(flags)
            .max_sets(max_sets)
            .pool_sizes(sizes);
        let pool = unsafe { device.create_descriptor_pool(&info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, pool })
    }

    /// Pool for `frames` copies of the scene, model and shadow sets
    pub fn for_frames(device: Device, frames: u32) -> VulkanResult<Self> {
        let frames = frames.max(1);
        Self::new(
            device,
            3 * frames,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: 2 * frames,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: frames,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                    descriptor_count: 2 * frames,
                },
            ],
            vk::DescriptorPoolCreateFlags::empty(),
        )
    }

    /// Allocate one set of `layout`
    pub fn allocate(&self, layout: &DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        Self::first(unsafe { self.device.allocate_descriptor_sets(&info).map_err(VulkanError::Api)? })
    }

    /// Allocate one set whose last binding holds `count` descriptors
    pub fn allocate_variable(&self, layout: &DescriptorSetLayout, count: u32) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let counts = [count];
        let mut variable = vk::DescriptorSetVariableDescriptorCountAllocateInfo::builder().descriptor_counts(&counts);
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts)
            .push_next(&mut variable);
        Self::first(unsafe { self.device.allocate_descriptor_sets(&info).map_err(VulkanError::Api)? })
    }

    fn first(sets: Vec<vk::DescriptorSet>) -> VulkanResult<vk::DescriptorSet> {
        sets.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Driver returned no descriptor set".to_string(),
        })
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Point a uniform buffer binding at `range` bytes of `buffer` from `offset`
pub fn write_uniform_buffer(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    ty: vk::DescriptorType,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) {
    let buffer_info = [vk::DescriptorBufferInfo {
        buffer,
        offset,
        range,
    }];
    let write = vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(ty)
        .buffer_info(&buffer_info)
        .build();
    unsafe { device.update_descriptor_sets(&[write], &[]) };
}

/// Point a combined image sampler binding at `view` in the shader-read layout
pub fn write_combined_image(device: &Device, set: vk::DescriptorSet, binding: u32, view: vk::ImageView, sampler: vk::Sampler) {
    let image_info = [vk::DescriptorImageInfo {
        sampler,
        image_view: view,
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }];
    let write = vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&image_info)
        .build();
    unsafe { device.update_descriptor_sets(&[write], &[]) };
}

/// GPU copies of uploaded textures and the set that indexes them.
///
/// Slots are assigned densely from zero by the resource registry. Slots that
/// were never written stay unbound, which the partially bound binding allows.
pub struct TextureArray {
    device: Device,
    images: Vec<Option<Image>>,
    _sampler: Sampler,
    set: vk::DescriptorSet,
    capacity: u32,
    _pool: DescriptorPool,
}

impl TextureArray {
    /// Allocate the texture set from its own update-after-bind pool
    pub fn new(device: Device, layouts: &DescriptorLayouts, sampler: Sampler) -> VulkanResult<Self> {
        let capacity = layouts.max_textures();
        let pool = DescriptorPool::new(
            device.clone(),
            1,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLER,
                    descriptor_count: 1,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLED_IMAGE,
                    descriptor_count: capacity,
                },
            ],
            vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND,
        )?;
        let set = pool.allocate_variable(&layouts.textures, capacity)?;

        let sampler_info = [vk::DescriptorImageInfo {
            sampler: sampler.handle(),
            image_view: vk::ImageView::null(),
            image_layout: vk::ImageLayout::UNDEFINED,
        }];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::SAMPLER)
            .image_info(&sampler_info)
            .build();
        unsafe { device.update_descriptor_sets(&[write], &[]) };

        Ok(Self {
            device,
            images: Vec::new(),
            _sampler: sampler,
            set,
            capacity,
            _pool: pool,
        })
    }

    /// Store `image` in `slot` and write it into the array binding
    pub fn insert(&mut self, slot: u32, image: Image) -> VulkanResult<()> {
        if slot >= self.capacity {
            return Err(VulkanError::ResourceNotFound { id: u64::from(slot) });
        }
        let index = slot as usize;

        // A replaced image may still be read by frames in flight
        if self.images.get(index).is_some_and(Option::is_some) {
            unsafe { self.device.device_wait_idle().map_err(VulkanError::Api)? };
        }

        let image_info = [vk::DescriptorImageInfo {
            sampler: vk::Sampler::null(),
            image_view: image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(self.set)
            .dst_binding(1)
            .dst_array_element(slot)
            .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
            .image_info(&image_info)
            .build();
        unsafe { self.device.update_descriptor_sets(&[write], &[]) };

        if self.images.len() <= index {
            self.images.resize_with(index + 1, || None);
        }
        self.images[index] = Some(image);
        Ok(())
    }

    /// Descriptor set bound as set 2 of the scene pipeline
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}
