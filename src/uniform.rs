// Per-frame transform data for uniform.vert / textured.vert
//
// Each swapchain image gets its own uniform buffer and descriptor set, so
// writing the buffer for one image never races a frame still reading another.

use anyhow::{Context, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::sync::Arc;

use crate::backend::buffer::HOST_MEMORY;
use crate::backend::{
    Buffer, DescriptorBinding, DescriptorPool, DescriptorSetGroup, DescriptorSetLayout,
    TextureImage, VulkanDevice,
};

pub const UNIFORM_BINDING: u32 = 0;
pub const SAMPLER_BINDING: u32 = 1;

/// Layout matches `layout(binding = 0) uniform UniformBufferObject` (std140:
/// three column-major mat4s, no padding).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

const DEGREES_PER_SECOND: f32 = 90.0;
const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 10.0;

impl UniformBufferObject {
    /// Quad spinning around Z, seen from (2, 2, 2)
    pub fn spinning(elapsed_secs: f32, extent: vk::Extent2D) -> Self {
        let model = Mat4::from_rotation_z((elapsed_secs * DEGREES_PER_SECOND).to_radians());
        let view = Mat4::look_at_rh(Vec3::splat(2.0), Vec3::ZERO, Vec3::Z);

        let mut projection = Mat4::perspective_rh(
            FIELD_OF_VIEW_DEGREES.to_radians(),
            aspect_ratio(extent),
            Z_NEAR,
            Z_FAR,
        );
        // Vulkan clip space has Y pointing down
        projection.y_axis.y *= -1.0;

        Self {
            model,
            view,
            projection,
        }
    }
}

/// Descriptor layout for the transform UBO, optionally with a texture
pub fn descriptor_bindings(textured: bool) -> Vec<DescriptorBinding> {
    let mut bindings = vec![DescriptorBinding::uniform_buffer(
        UNIFORM_BINDING,
        vk::ShaderStageFlags::VERTEX,
    )];
    if textured {
        bindings.push(DescriptorBinding::combined_image_sampler(
            SAMPLER_BINDING,
            vk::ShaderStageFlags::FRAGMENT,
        ));
    }
    bindings
}

/// One uniform buffer + descriptor set per swapchain image.
///
/// Sets are freed with the pool; the buffers go last.
pub struct UniformBindings {
    sets: DescriptorSetGroup,
    _pool: DescriptorPool,
    buffers: Vec<Buffer>,
}

impl UniformBindings {
    pub fn new(
        device: &Arc<VulkanDevice>,
        layout: &DescriptorSetLayout,
        image_count: usize,
        texture: Option<&TextureImage>,
    ) -> Result<Self> {
        let size = std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize;

        let buffers = (0..image_count)
            .map(|_| Buffer::new(device, size, vk::BufferUsageFlags::UNIFORM_BUFFER, HOST_MEMORY))
            .collect::<Result<Vec<_>>>()?;

        let pool = DescriptorPool::for_layout(device, layout, image_count as u32)?;
        let sets = DescriptorSetGroup::allocate(device, &pool, layout, image_count)?;

        for (index, buffer) in buffers.iter().enumerate() {
            sets.attach_uniform_buffer(index, UNIFORM_BINDING, buffer.buffer, size);
            if let Some(texture) = texture {
                sets.attach_combined_image_sampler(index, SAMPLER_BINDING, texture.view, texture.sampler);
            }
        }

        log::debug!("Created {} uniform buffers of {} bytes", image_count, size);

        Ok(Self {
            sets,
            _pool: pool,
            buffers,
        })
    }

    pub fn descriptor_set(&self, image_index: usize) -> vk::DescriptorSet {
        self.sets.sets[image_index]
    }

    pub fn write(&self, image_index: usize, ubo: &UniformBufferObject) -> Result<()> {
        self.buffers
            .get(image_index)
            .with_context(|| format!("No uniform buffer for image {}", image_index))?
            .upload(std::slice::from_ref(ubo))
    }
}

pub fn aspect_ratio(extent: vk::Extent2D) -> f32 {
    if extent.height == 0 {
        1.0
    } else {
        extent.width as f32 / extent.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn size_is_three_matrices() {
        assert_eq!(std::mem::size_of::<UniformBufferObject>(), 192);
    }

    #[test]
    fn model_is_identity_at_start() {
        let ubo = UniformBufferObject::spinning(0.0, extent(800, 600));
        assert!(ubo.model.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn rotates_a_quarter_turn_per_second() {
        let ubo = UniformBufferObject::spinning(1.0, extent(800, 600));
        let rotated = ubo.model * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(rotated.abs_diff_eq(Vec4::new(0.0, 1.0, 0.0, 1.0), 1e-5));
    }

    #[test]
    fn projection_flips_y() {
        let ubo = UniformBufferObject::spinning(0.0, extent(800, 600));
        assert!(ubo.projection.y_axis.y < 0.0);
        assert!(ubo.projection.x_axis.x > 0.0);
    }

    #[test]
    fn origin_is_in_front_of_camera() {
        let ubo = UniformBufferObject::spinning(0.0, extent(800, 600));
        let clip = ubo.projection * ubo.view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let depth = clip.z / clip.w;
        assert!(clip.w > 0.0);
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn textured_layout_adds_sampler() {
        assert_eq!(descriptor_bindings(false).len(), 1);

        let bindings = descriptor_bindings(true);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(bindings[1].binding, SAMPLER_BINDING);
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        assert_eq!(aspect_ratio(extent(800, 0)), 1.0);
        let ubo = UniformBufferObject::spinning(0.5, extent(800, 0));
        assert!(ubo.projection.is_finite());
    }
}
