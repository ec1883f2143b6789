//! Semaphore and fence wrappers

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// Binary semaphore for GPU-GPU ordering
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence for CPU-GPU ordering
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, fence })
    }

    /// Block until signaled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Return to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]).map_err(VulkanError::Api) }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Semaphores for image acquisition.
///
/// The image index is unknown until acquisition returns, so acquisition
/// signals a spare semaphore that is then swapped into the acquired frame
/// slot. The semaphore it replaces was last waited on by that slot's previous
/// submission, which has completed once the slot's fence is waited on.
pub struct SemaphorePool {
    device: Device,
    spare: Vec<Semaphore>,
}

impl SemaphorePool {
    /// Create an empty pool
    pub fn new(device: Device) -> Self {
        Self { device, spare: Vec::new() }
    }

    /// Take a spare semaphore, creating one if none is left
    pub fn take(&mut self) -> VulkanResult<Semaphore> {
        match self.spare.pop() {
            Some(semaphore) => Ok(semaphore),
            None => Semaphore::new(self.device.clone()),
        }
    }

    /// Return an unsignaled semaphore
    pub fn recycle(&mut self, semaphore: Semaphore) {
        self.spare.push(semaphore);
    }
}
