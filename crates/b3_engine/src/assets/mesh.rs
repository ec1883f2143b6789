//! Mesh representation for 3D models
//!
//! Pure CPU-side geometry: an ordered vertex list and a 32-bit triangle index
//! list. Nothing here knows about GPU buffers; the Vulkan vertex input layout
//! lives with the backend in `render::backends::vulkan::vertex_layout`.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec3;

/// 3D vertex data structure for rendering
///
/// `#[repr(C)]` keeps the field order and offsets stable so vertex slices can be
/// copied straight into GPU buffers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in object space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// Position as a math vector
    pub fn position_vec(&self) -> Vec3 {
        Vec3::from(self.position)
    }
}

/// 3D mesh containing vertices and indices for rendering
///
/// Meshes are shared between scene nodes through `Arc<Mesh>`; the renderer
/// uploads each distinct `Arc` once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Index data for triangles
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from existing vertex and index data
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Append a vertex and return its index
    pub fn add_vertex(&mut self, position: Vec3, normal: Vec3, tex_coord: [f32; 2]) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices
            .push(Vertex::new(position.into(), normal.into(), tex_coord));
        index
    }

    /// Append one index
    pub fn add_index(&mut self, index: u32) {
        self.indices.push(index);
    }

    /// Append a triangle
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Number of indices, which is what an indexed draw consumes
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Vertex positions in order
    pub fn positions(&self) -> Vec<Vec3> {
        self.vertices.iter().map(Vertex::position_vec).collect()
    }

    /// Vertex data as raw bytes for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes for upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 12);
        assert_eq!(std::mem::offset_of!(Vertex, tex_coord), 24);
    }

    #[test]
    fn test_add_vertex_returns_sequential_indices() {
        let mut mesh = Mesh::default();
        let a = mesh.add_vertex(Vec3::zeros(), Vec3::z(), [0.0, 0.0]);
        let b = mesh.add_vertex(Vec3::x(), Vec3::z(), [1.0, 0.0]);
        let c = mesh.add_vertex(Vec3::y(), Vec3::z(), [0.0, 1.0]);
        mesh.add_triangle(a, b, c);
        mesh.add_index(a);

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(mesh.indices, vec![0, 1, 2, 0]);
        assert_eq!(mesh.index_count(), 4);
        assert_eq!(mesh.positions()[1], Vec3::x());
    }

    #[test]
    fn test_byte_views_cover_all_data() {
        let mut mesh = Mesh::default();
        mesh.add_vertex(Vec3::zeros(), Vec3::z(), [0.0, 0.0]);
        mesh.add_index(0);

        assert_eq!(mesh.vertex_bytes().len(), 32);
        assert_eq!(mesh.index_bytes().len(), 4);
    }
}
