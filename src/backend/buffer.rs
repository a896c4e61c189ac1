// Buffers for vertex, index, uniform and staging data
//
// Each Buffer owns its VkBuffer and a dedicated VkDeviceMemory allocation.

use anyhow::{Context, Result};
use ash::vk;
use bytemuck::Pod;
use std::sync::Arc;

use super::command::CommandPool;
use super::VulkanDevice;

/// Mappable memory that needs no explicit flushes
pub const HOST_MEMORY: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

pub struct Buffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    device: Arc<VulkanDevice>,
}

impl Buffer {
    /// Create a buffer with specified usage and memory properties
    pub fn new(
        device: &Arc<VulkanDevice>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        if size == 0 {
            anyhow::bail!("Cannot create an empty buffer ({:?})", usage);
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.device.create_buffer(&buffer_info, None) }
            .context("vkCreateBuffer")?;

        match Self::allocate_and_bind(device, buffer, memory_properties) {
            Ok(memory) => Ok(Self {
                buffer,
                memory,
                size,
                device: Arc::clone(device),
            }),
            Err(e) => {
                unsafe { device.device.destroy_buffer(buffer, None) };
                Err(e)
            }
        }
    }

    fn allocate_and_bind(
        device: &VulkanDevice,
        buffer: vk::Buffer,
        memory_properties: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory> {
        let requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };
        let memory_type_index =
            device.find_memory_type(requirements.memory_type_bits, memory_properties)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.device.allocate_memory(&alloc_info, None) }
            .context("vkAllocateMemory")?;

        if let Err(e) = unsafe { device.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe { device.device.free_memory(memory, None) };
            return Err(e).context("vkBindBufferMemory");
        }

        Ok(memory)
    }

    /// Host-visible buffer filled with `data`
    pub fn host_visible_with_data<T: Pod>(
        device: &Arc<VulkanDevice>,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self> {
        let buffer = Self::new(device, byte_size(data), usage, HOST_MEMORY)?;
        buffer.upload(data)?;
        Ok(buffer)
    }

    /// Device-local buffer filled through a temporary staging buffer
    pub fn device_local_with_data<T: Pod>(
        pool: &CommandPool,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self> {
        let device = pool.device();
        let size = byte_size(data);

        let staging = Self::host_visible_with_data(device, vk::BufferUsageFlags::TRANSFER_SRC, data)?;

        let buffer = Self::new(
            device,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        pool.one_time_submit(|device, cmd| buffer.copy_from(device, cmd, &staging, size))?;

        Ok(buffer)
    }

    /// Copy `data` into host-visible memory
    pub fn upload<T: Pod>(&self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let len = bytes.len() as vk::DeviceSize;

        if len > self.size {
            anyhow::bail!("Upload of {} bytes exceeds buffer size {}", len, self.size);
        }
        if len == 0 {
            return Ok(());
        }

        unsafe {
            let ptr = self
                .device
                .device
                .map_memory(self.memory, 0, len, vk::MemoryMapFlags::empty())
                .context("vkMapMemory")? as *mut u8;

            ptr.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
            self.device.device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Record a copy of the first `size` bytes of `source` into this buffer
    pub fn copy_from(&self, device: &ash::Device, cmd: vk::CommandBuffer, source: &Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };

        unsafe {
            device.cmd_copy_buffer(cmd, source.buffer, self.buffer, &[region]);
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_buffer(self.buffer, None);
            self.device.device.free_memory(self.memory, None);
        }
    }
}

/// Size of a slice in bytes, as Vulkan wants it
pub fn byte_size<T>(data: &[T]) -> vk::DeviceSize {
    std::mem::size_of_val(data) as vk::DeviceSize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_counts_elements() {
        assert_eq!(byte_size(&[0u16; 6]), 12);
        assert_eq!(byte_size(&[[0f32; 5]; 3]), 60);
        assert_eq!(byte_size::<u32>(&[]), 0);
    }

    #[test]
    fn host_memory_is_visible_and_coherent() {
        assert!(HOST_MEMORY.contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
        assert!(HOST_MEMORY.contains(vk::MemoryPropertyFlags::HOST_COHERENT));
        assert!(!HOST_MEMORY.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL));
    }
}
