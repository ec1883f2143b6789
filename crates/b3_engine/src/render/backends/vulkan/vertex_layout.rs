//! Vertex input state for [`Vertex`]
//!
//! Kept out of `assets::mesh` so meshes stay backend-agnostic.

use std::mem::{offset_of, size_of};

use ash::vk;

use crate::assets::Vertex;

/// Single interleaved binding at index 0
pub fn binding_description() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

/// Position, normal and texture coordinate at locations 0, 1 and 2
pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
    [
        vk::VertexInputAttributeDescription {
            binding: 0,
            location: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, position) as u32,
        },
        vk::VertexInputAttributeDescription {
            binding: 0,
            location: 1,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, normal) as u32,
        },
        vk::VertexInputAttributeDescription {
            binding: 0,
            location: 2,
            format: vk::Format::R32G32_SFLOAT,
            offset: offset_of!(Vertex, tex_coord) as u32,
        },
    ]
}

/// Attributes the depth-only shadow pass reads
pub fn position_attribute() -> [vk::VertexInputAttributeDescription; 1] {
    let [position, _, _] = attribute_descriptions();
    [position]
}
