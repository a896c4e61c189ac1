// Vertex formats and the meshes drawn by the tutorial parts

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::mem::{offset_of, size_of};

use crate::backend::VertexLayout;

/// Position + colour, as read by `vertex_color.vert` and `uniform.vert`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec2,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(position: [f32; 2], color: [f32; 3]) -> Self {
        Self {
            position: Vec2::from_array(position),
            color: Vec3::from_array(color),
        }
    }
}

impl VertexLayout for Vertex {
    fn binding_description() -> vk::VertexInputBindingDescription {
        per_vertex_binding(size_of::<Self>())
    }

    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            attribute(0, vk::Format::R32G32_SFLOAT, offset_of!(Self, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, color)),
        ]
    }
}

/// Position + colour + texture coordinate, for `textured.vert`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: Vec2,
    pub color: Vec3,
    pub tex_coord: Vec2,
}

impl TexturedVertex {
    pub const fn new(position: [f32; 2], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position: Vec2::from_array(position),
            color: Vec3::from_array(color),
            tex_coord: Vec2::from_array(tex_coord),
        }
    }
}

impl VertexLayout for TexturedVertex {
    fn binding_description() -> vk::VertexInputBindingDescription {
        per_vertex_binding(size_of::<Self>())
    }

    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            attribute(0, vk::Format::R32G32_SFLOAT, offset_of!(Self, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, color)),
            attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Self, tex_coord)),
        ]
    }
}

fn per_vertex_binding(stride: usize) -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: stride as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

fn attribute(location: u32, format: vk::Format, offset: usize) -> vk::VertexInputAttributeDescription {
    vk::VertexInputAttributeDescription {
        location,
        binding: 0,
        format,
        offset: offset as u32,
    }
}

/// Clockwise triangle in clip space: red top, green bottom right, blue bottom left
pub const TRIANGLE: [Vertex; 3] = [
    Vertex::new([0.0, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 1.0, 0.0]),
    Vertex::new([-0.5, 0.5], [0.0, 0.0, 1.0]),
];

pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, -0.5], [0.0, 1.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
    Vertex::new([-0.5, 0.5], [1.0, 1.0, 1.0]),
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

pub const TEXTURED_QUAD: [TexturedVertex; 4] = [
    TexturedVertex::new([-0.5, -0.5], [1.0, 0.0, 0.0], [1.0, 0.0]),
    TexturedVertex::new([0.5, -0.5], [0.0, 1.0, 0.0], [0.0, 0.0]),
    TexturedVertex::new([0.5, 0.5], [0.0, 0.0, 1.0], [0.0, 1.0]),
    TexturedVertex::new([-0.5, 0.5], [1.0, 1.0, 1.0], [1.0, 1.0]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(size_of::<Vertex>(), 20);
        assert_eq!(Vertex::binding_description().stride, 20);

        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 8);
        assert_eq!(attrs[1].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn textured_vertex_layout() {
        assert_eq!(TexturedVertex::binding_description().stride, 28);

        let attrs = TexturedVertex::attribute_descriptions();
        let locations: Vec<u32> = attrs.iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(attrs[2].offset, 20);
        assert!(attrs.iter().all(|a| a.binding == 0));
    }

    #[test]
    fn quad_indices_stay_in_range() {
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < TEXTURED_QUAD.len()));
    }

    #[test]
    fn vertices_cast_to_bytes() {
        let bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE);
        assert_eq!(bytes.len(), 60);
    }
}
