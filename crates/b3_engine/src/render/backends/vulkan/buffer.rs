//! Host-visible buffers for vertices, indices, uniforms and staging

use ash::{vk, Device};

use super::context::VulkanContext;
use super::{VulkanError, VulkanResult};

/// Buffer with its own memory allocation
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a host-visible, coherent buffer of `size` bytes
    pub fn new(context: &VulkanContext, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot create an empty buffer".to_string(),
            });
        }

        let device = context.device().clone();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).map_err(VulkanError::Api)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = match context.find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(index) => index,
            Err(error) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(error);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(result) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(result));
            }
        };

        let this = Self {
            device,
            buffer,
            memory,
            size,
        };
        unsafe {
            this.device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::Api)?;
        }
        Ok(this)
    }

    /// Create a buffer holding `bytes`
    pub fn with_data(context: &VulkanContext, usage: vk::BufferUsageFlags, bytes: &[u8]) -> VulkanResult<Self> {
        let buffer = Self::new(context, bytes.len() as vk::DeviceSize, usage)?;
        buffer.write(0, bytes)?;
        Ok(buffer)
    }

    /// Copy `bytes` into the buffer at `offset`
    pub fn write(&self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        let end = offset + bytes.len() as vk::DeviceSize;
        if end > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Write of {} bytes at {} overruns a {} byte buffer", bytes.len(), offset, self.size),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, offset, bytes.len() as vk::DeviceSize, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Vertex and index buffers of one uploaded mesh
pub struct GpuMesh {
    vertices: Buffer,
    indices: Buffer,
}

impl GpuMesh {
    /// Upload vertex and index bytes
    pub fn new(context: &VulkanContext, vertex_bytes: &[u8], index_bytes: &[u8]) -> VulkanResult<Self> {
        let vertices = Buffer::with_data(context, vk::BufferUsageFlags::VERTEX_BUFFER, vertex_bytes)?;
        // A mesh without triangles still binds a valid index buffer
        let indices = if index_bytes.is_empty() {
            Buffer::new(context, 4, vk::BufferUsageFlags::INDEX_BUFFER)?
        } else {
            Buffer::with_data(context, vk::BufferUsageFlags::INDEX_BUFFER, index_bytes)?
        };
        Ok(Self { vertices, indices })
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertices.handle()
    }

    /// Index buffer handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.indices.handle()
    }
}
