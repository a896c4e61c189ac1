// Descriptor set layouts, pools and sets
//
// Descriptor sets bind buffers and images to the slots declared in the
// shaders (`layout(binding = N)`). Sets are freed together with their pool.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;

/// One binding slot within a descriptor set layout
#[derive(Debug, Clone, Copy)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub stage_flags: vk::ShaderStageFlags,
}

impl DescriptorBinding {
    pub const fn uniform_buffer(binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            stage_flags,
        }
    }

    pub const fn combined_image_sampler(binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags,
        }
    }

    fn to_vk(self) -> vk::DescriptorSetLayoutBinding {
        vk::DescriptorSetLayoutBinding::builder()
            .binding(self.binding)
            .descriptor_type(self.descriptor_type)
            .descriptor_count(1)
            .stage_flags(self.stage_flags)
            .build()
    }
}

pub struct DescriptorSetLayout {
    pub layout: vk::DescriptorSetLayout,
    pub bindings: Vec<DescriptorBinding>,
    device: Arc<VulkanDevice>,
}

impl DescriptorSetLayout {
    pub fn new(device: &Arc<VulkanDevice>, bindings: &[DescriptorBinding]) -> Result<Self> {
        let vk_bindings: Vec<_> = bindings.iter().map(|b| b.to_vk()).collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&vk_bindings);

        let layout = unsafe { device.device.create_descriptor_set_layout(&create_info, None) }
            .context("vkCreateDescriptorSetLayout")?;

        Ok(Self {
            layout,
            bindings: bindings.to_vec(),
            device: Arc::clone(device),
        })
    }

    /// Pool sizes needed to allocate `set_count` sets of this layout
    pub fn pool_sizes(&self, set_count: u32) -> Vec<vk::DescriptorPoolSize> {
        pool_sizes(&self.bindings, set_count)
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .device
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Sum descriptor counts per type across bindings, times `set_count`
pub fn pool_sizes(bindings: &[DescriptorBinding], set_count: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();

    for binding in bindings {
        match sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += set_count,
            None => sizes.push(vk::DescriptorPoolSize {
                ty: binding.descriptor_type,
                descriptor_count: set_count,
            }),
        }
    }

    sizes
}

pub struct DescriptorPool {
    pub pool: vk::DescriptorPool,
    device: Arc<VulkanDevice>,
}

impl DescriptorPool {
    pub fn new(
        device: &Arc<VulkanDevice>,
        pool_sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
    ) -> Result<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(pool_sizes)
            .max_sets(max_sets);

        let pool = unsafe { device.device.create_descriptor_pool(&create_info, None) }
            .context("vkCreateDescriptorPool")?;

        Ok(Self {
            pool,
            device: Arc::clone(device),
        })
    }

    /// A pool sized for exactly `set_count` sets of `layout`
    pub fn for_layout(device: &Arc<VulkanDevice>, layout: &DescriptorSetLayout, set_count: u32) -> Result<Self> {
        Self::new(device, &layout.pool_sizes(set_count), set_count)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Descriptor sets allocated from one pool with one layout
pub struct DescriptorSetGroup {
    pub sets: Vec<vk::DescriptorSet>,
    device: Arc<VulkanDevice>,
}

impl DescriptorSetGroup {
    pub fn allocate(
        device: &Arc<VulkanDevice>,
        pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> Result<Self> {
        let layouts = vec![layout.layout; count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool.pool)
            .set_layouts(&layouts);

        let sets = unsafe { device.device.allocate_descriptor_sets(&alloc_info) }
            .context("vkAllocateDescriptorSets")?;

        Ok(Self {
            sets,
            device: Arc::clone(device),
        })
    }

    /// Point `binding` of set `index` at a uniform buffer
    pub fn attach_uniform_buffer(
        &self,
        index: usize,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) {
        let buffer_info = [vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range,
        }];

        let write = vk::WriteDescriptorSet::builder()
            .dst_set(self.sets[index])
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info)
            .build();

        unsafe {
            self.device.device.update_descriptor_sets(&[write], &[]);
        }
    }

    /// Point `binding` of set `index` at a sampled image
    pub fn attach_combined_image_sampler(
        &self,
        index: usize,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
    ) {
        let image_info = [vk::DescriptorImageInfo {
            sampler,
            image_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];

        let write = vk::WriteDescriptorSet::builder()
            .dst_set(self.sets[index])
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info)
            .build();

        unsafe {
            self.device.device.update_descriptor_sets(&[write], &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_merge_same_type() {
        let bindings = [
            DescriptorBinding::uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
            DescriptorBinding::combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT),
            DescriptorBinding::uniform_buffer(2, vk::ShaderStageFlags::FRAGMENT),
        ];

        let sizes = pool_sizes(&bindings, 3);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 6);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 3);
    }

    #[test]
    fn pool_sizes_empty_for_no_bindings() {
        assert!(pool_sizes(&[], 4).is_empty());
    }

    #[test]
    fn binding_converts_with_single_descriptor() {
        let vk_binding = DescriptorBinding::uniform_buffer(0, vk::ShaderStageFlags::VERTEX).to_vk();
        assert_eq!(vk_binding.binding, 0);
        assert_eq!(vk_binding.descriptor_count, 1);
        assert_eq!(vk_binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(vk_binding.stage_flags, vk::ShaderStageFlags::VERTEX);
    }
}
