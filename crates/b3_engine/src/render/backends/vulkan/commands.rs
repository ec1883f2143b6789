//! Command pools and one-time submissions

use ash::{vk, Device};

use super::sync::Fence;
use super::{VulkanError, VulkanResult};

/// Command pool with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool for `queue_family_index`.
    ///
    /// `transient` pools are reset as a whole each frame instead of per buffer.
    pub fn new(device: Device, queue_family_index: u32, transient: bool) -> VulkanResult<Self> {
        let flags = if transient {
            vk::CommandPoolCreateFlags::TRANSIENT
        } else {
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
        };
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, command_pool })
    }

    /// Allocate one primary command buffer
    pub fn allocate(&self) -> VulkanResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?
        };
        buffers.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Driver returned no command buffer".to_string(),
        })
    }

    /// Reset every buffer allocated from the pool
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    /// Record `record` into a fresh command buffer, submit it to `queue`, and
    /// wait for it to complete
    pub fn submit_and_wait<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffer = self.allocate()?;
        let result = self.record_and_submit(queue, command_buffer, record);
        unsafe {
            self.device.free_command_buffers(self.command_pool, &[command_buffer]);
        }
        result
    }

    fn record_and_submit<F>(&self, queue: vk::Queue, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        record(&self.device, command_buffer);

        unsafe {
            self.device.end_command_buffer(command_buffer).map_err(VulkanError::Api)?;
        }

        let fence = Fence::new(self.device.clone(), false)?;
        let command_infos = [vk::CommandBufferSubmitInfo::builder()
            .command_buffer(command_buffer)
            .build()];
        let submit = vk::SubmitInfo2::builder().command_buffer_infos(&command_infos);
        unsafe {
            self.device
                .queue_submit2(queue, &[submit.build()], fence.handle())
                .map_err(VulkanError::Api)?;
        }
        fence.wait(u64::MAX)
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
