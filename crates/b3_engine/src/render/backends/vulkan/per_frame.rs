//! Per-frame-slot GPU state
//!
//! Each swapchain image has one [`FrameResources`]: a command pool and buffer,
//! its synchronization objects, and its own uniform buffers and descriptor
//! sets, so writing uniforms for one frame never touches memory a frame
//! still in flight is reading.

use std::mem::size_of;

use ash::vk;

use crate::render::uniforms::{pack_strided, uniform_stride, FrameUniforms, ModelUbo, SceneUboFs, SceneUboVs, ShadowUbo};

use super::buffer::Buffer;
use super::commands::CommandPool;
use super::context::VulkanContext;
use super::descriptors::{write_combined_image, write_uniform_buffer, DescriptorLayouts, DescriptorPool};
use super::sync::{Fence, Semaphore};
use super::{VulkanError, VulkanResult};

/// Strides and offsets of the uniform blocks for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLayout {
    /// Offset of the fragment block in the scene buffer
    pub scene_fs_offset: u64,
    /// Distance between consecutive model blocks
    pub model_stride: u64,
    /// Distance between consecutive shadow blocks
    pub shadow_stride: u64,
    /// Per-node blocks each buffer holds
    pub capacity: usize,
}

impl UniformLayout {
    /// Layout for `capacity` nodes at the device's offset alignment
    pub fn new(alignment: u64, capacity: usize) -> Self {
        Self {
            scene_fs_offset: uniform_stride(size_of::<SceneUboVs>() as u64, alignment),
            model_stride: uniform_stride(size_of::<ModelUbo>() as u64, alignment),
            shadow_stride: uniform_stride(size_of::<ShadowUbo>() as u64, alignment),
            capacity: capacity.max(1),
        }
    }

    /// Size of the scene buffer holding both scene blocks
    pub fn scene_size(&self) -> u64 {
        self.scene_fs_offset + size_of::<SceneUboFs>() as u64
    }
}

/// GPU state owned by one frame slot
pub struct FrameResources {
    command_buffer: vk::CommandBuffer,
    command_pool: CommandPool,
    image_acquired: Option<Semaphore>,
    render_finished: Semaphore,
    in_flight: Fence,
    scene_uniforms: Buffer,
    model_uniforms: Buffer,
    shadow_uniforms: Buffer,
    scene_set: vk::DescriptorSet,
    model_set: vk::DescriptorSet,
    shadow_set: vk::DescriptorSet,
    layout: UniformLayout,
}

impl FrameResources {
    /// Create a slot's objects and point its descriptor sets at its buffers
    /// and the shared shadow map
    pub fn new(
        context: &VulkanContext,
        pool: &DescriptorPool,
        layouts: &DescriptorLayouts,
        layout: UniformLayout,
        shadow_map: vk::ImageView,
        shadow_sampler: vk::Sampler,
    ) -> VulkanResult<Self> {
        let device = context.device();

        let command_pool = CommandPool::new(device.clone(), context.graphics_family(), true)?;
        let command_buffer = command_pool.allocate()?;

        let scene_uniforms = Buffer::new(context, layout.scene_size(), vk::BufferUsageFlags::UNIFORM_BUFFER)?;
        let model_uniforms = Buffer::new(
            context,
            layout.model_stride * layout.capacity as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;
        let shadow_uniforms = Buffer::new(
            context,
            layout.shadow_stride * layout.capacity as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        let scene_set = pool.allocate(&layouts.scene)?;
        write_uniform_buffer(
            device,
            scene_set,
            0,
            vk::DescriptorType::UNIFORM_BUFFER,
            scene_uniforms.handle(),
            0,
            size_of::<SceneUboVs>() as u64,
        );
        write_uniform_buffer(
            device,
            scene_set,
            1,
            vk::DescriptorType::UNIFORM_BUFFER,
            scene_uniforms.handle(),
            layout.scene_fs_offset,
            size_of::<SceneUboFs>() as u64,
        );
        write_combined_image(device, scene_set, 2, shadow_map, shadow_sampler);

        let model_set = pool.allocate(&layouts.model)?;
        write_uniform_buffer(
            device,
            model_set,
            0,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            model_uniforms.handle(),
            0,
            size_of::<ModelUbo>() as u64,
        );

        let shadow_set = pool.allocate(&layouts.shadow)?;
        write_uniform_buffer(
            device,
            shadow_set,
            0,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            shadow_uniforms.handle(),
            0,
            size_of::<ShadowUbo>() as u64,
        );

        Ok(Self {
            command_buffer,
            command_pool,
            image_acquired: None,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
            scene_uniforms,
            model_uniforms,
            shadow_uniforms,
            scene_set,
            model_set,
            shadow_set,
            layout,
        })
    }

    /// Block until the slot's last submission has finished
    pub fn wait(&self) -> VulkanResult<()> {
        self.in_flight.wait(u64::MAX)
    }

    /// Install the semaphore the next submission waits on, returning the one
    /// it replaces
    pub fn swap_acquire_semaphore(&mut self, semaphore: Semaphore) -> Option<Semaphore> {
        self.image_acquired.replace(semaphore)
    }

    /// Remove the acquire semaphore, e.g. when the acquired image was never
    /// submitted and the semaphore is still signaled
    pub fn take_acquire_semaphore(&mut self) -> Option<Semaphore> {
        self.image_acquired.take()
    }

    /// Copy a frame's uniforms into the slot's buffers
    pub fn write_uniforms(&self, uniforms: &FrameUniforms) -> VulkanResult<()> {
        self.scene_uniforms.write(0, bytemuck::bytes_of(&uniforms.scene_vs))?;
        self.scene_uniforms
            .write(self.layout.scene_fs_offset, bytemuck::bytes_of(&uniforms.scene_fs))?;
        self.model_uniforms
            .write(0, &pack_strided(&uniforms.models, self.layout.model_stride as usize))?;
        self.shadow_uniforms
            .write(0, &pack_strided(&uniforms.shadows, self.layout.shadow_stride as usize))
    }

    /// Reset the command pool and begin recording
    pub fn begin(&self, device: &ash::Device) -> VulkanResult<vk::CommandBuffer> {
        self.command_pool.reset()?;
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(self.command_buffer)
    }

    /// Submit the recorded command buffer.
    ///
    /// Waits on the acquire semaphore before color output, signals the
    /// release semaphore for presentation and the fence for the CPU.
    pub fn submit(&self, device: &ash::Device, queue: vk::Queue) -> VulkanResult<()> {
        unsafe {
            device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }

        let acquired = self.image_acquired.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Frame submitted without an acquired image".to_string(),
        })?;

        let waits = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(acquired.handle())
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .build()];
        let signals = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(self.render_finished.handle())
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .build()];
        let command_buffers = [vk::CommandBufferSubmitInfo::builder()
            .command_buffer(self.command_buffer)
            .build()];
        let submit = vk::SubmitInfo2::builder()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals);

        // Unsignaled only from here until the submission below signals it
        self.in_flight.reset()?;
        unsafe {
            device
                .queue_submit2(queue, &[submit.build()], self.in_flight.handle())
                .map_err(VulkanError::Api)
        }
    }

    /// Semaphore presentation waits on
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }

    /// Set 0 of the scene pipeline
    pub fn scene_set(&self) -> vk::DescriptorSet {
        self.scene_set
    }

    /// Set 1 of the scene pipeline
    pub fn model_set(&self) -> vk::DescriptorSet {
        self.model_set
    }

    /// Set 0 of the shadow pipeline
    pub fn shadow_set(&self) -> vk::DescriptorSet {
        self.shadow_set
    }

    /// Uniform strides and capacity
    pub fn layout(&self) -> UniformLayout {
        self.layout
    }
}
