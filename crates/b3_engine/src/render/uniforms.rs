//! Uniform buffer layouts and per-frame uniform data
//!
//! Every struct here mirrors a std140 uniform block in the shaders, padded by
//! hand so the Rust and GLSL layouts agree byte for byte.
//!
//! | Block | Set / binding | Contents |
//! |---|---|---|
//! | [`SceneUboVs`] | scene set, binding 0 | camera view, projection, light position |
//! | [`SceneUboFs`] | scene set, binding 1 | light color, intensity, ambient |
//! | [`ModelUbo`] | model set, dynamic | model matrix, shadow matrix, texture index |
//! | [`ShadowUbo`] | shadow set, dynamic | light-space MVP |
//!
//! Per-node blocks are packed into one buffer per frame slot, one block every
//! [`uniform_stride`] bytes, and selected with a dynamic offset at draw time.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Vec3};
use crate::scene::{Light, Node, SceneGraph};

/// Maps light clip space `[-1, 1]` to shadow map texture space `[0, 1]`.
///
/// Stored column by column, matching the in-memory layout of [`Mat4`].
pub const SHADOW_BIAS: [[f32; 4]; 4] = [
    [0.5, 0.0, 0.0, 0.0],
    [0.0, 0.5, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.5, 0.5, 0.0, 1.0],
];

/// [`SHADOW_BIAS`] as a matrix
pub fn shadow_bias_matrix() -> Mat4 {
    Mat4::from(SHADOW_BIAS)
}

/// Scene data read by the vertex shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUboVs {
    /// Camera view matrix
    pub view: [[f32; 4]; 4],
    /// Camera projection matrix
    pub proj: [[f32; 4]; 4],
    /// Light position in world space
    pub light_pos: [f32; 3],
    _padding: f32,
}

impl SceneUboVs {
    /// Pack camera and light data
    pub fn new(view: &Mat4, projection: &Mat4, light_pos: Vec3) -> Self {
        Self {
            view: (*view).into(),
            proj: (*projection).into(),
            light_pos: light_pos.into(),
            _padding: 0.0,
        }
    }
}

/// Scene data read by the fragment shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUboFs {
    /// Linear RGB light color
    pub light_color: [f32; 3],
    /// Light intensity
    pub intensity: f32,
    /// Ambient factor
    pub ambient: f32,
    _padding: [f32; 3],
}

impl SceneUboFs {
    /// Pack lighting parameters
    pub fn new(light: &Light) -> Self {
        Self {
            light_color: light.color.into(),
            intensity: light.intensity,
            ambient: light.ambient,
            _padding: [0.0; 3],
        }
    }
}

/// Per-node data for the color pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelUbo {
    /// Object-to-world transform
    pub model: [[f32; 4]; 4],
    /// Object to shadow map texture space, `SHADOW_BIAS * light_vp * model`
    pub shadow_matrix: [[f32; 4]; 4],
    /// Slot of the node's texture in the texture array
    pub texture_index: u32,
    _padding: [u32; 3],
}

/// Per-node data for the shadow pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadowUbo {
    /// Object to light clip space
    pub depth_mvp: [[f32; 4]; 4],
}

/// Round `size` up to the next multiple of `alignment`.
///
/// `alignment` must be zero or a power of two, as Vulkan guarantees for
/// `minUniformBufferOffsetAlignment`. Zero means no alignment requirement.
pub fn uniform_stride(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return size;
    }
    debug_assert!(alignment.is_power_of_two());
    (size + alignment - 1) & !(alignment - 1)
}

/// Lay `items` out one per `stride` bytes, zero-filling the gaps
pub fn pack_strided<T: Pod>(items: &[T], stride: usize) -> Vec<u8> {
    let size = std::mem::size_of::<T>();
    debug_assert!(stride >= size);

    let mut bytes = vec![0u8; items.len() * stride];
    for (chunk, item) in bytes.chunks_exact_mut(stride).zip(items) {
        chunk[..size].copy_from_slice(bytemuck::bytes_of(item));
    }
    bytes
}

/// Everything written into a frame slot's uniform buffers
#[derive(Debug, Clone)]
pub struct FrameUniforms {
    /// Vertex-stage scene block
    pub scene_vs: SceneUboVs,
    /// Fragment-stage scene block
    pub scene_fs: SceneUboFs,
    /// One block per node, in scene order
    pub models: Vec<ModelUbo>,
    /// One block per node, in scene order
    pub shadows: Vec<ShadowUbo>,
}

impl FrameUniforms {
    /// Compute uniforms for every node in the scene.
    ///
    /// `texture_slot` maps a node to the array slot of its texture.
    pub fn build(
        scene: &SceneGraph,
        view: &Mat4,
        projection: &Mat4,
        light: &Light,
        texture_slot: impl Fn(&Node) -> u32,
    ) -> Self {
        let light_vp = light.view_projection();
        let bias = shadow_bias_matrix();

        let mut models = Vec::with_capacity(scene.len());
        let mut shadows = Vec::with_capacity(scene.len());

        for (handle, node) in scene.iter() {
            let model = scene.world_matrix(handle).unwrap_or_else(|| node.local_matrix());
            let depth_mvp = light_vp * model;

            shadows.push(ShadowUbo {
                depth_mvp: depth_mvp.into(),
            });
            models.push(ModelUbo {
                model: model.into(),
                shadow_matrix: (bias * depth_mvp).into(),
                texture_index: texture_slot(node),
                _padding: [0; 3],
            });
        }

        Self {
            scene_vs: SceneUboVs::new(view, projection, light.position),
            scene_fs: SceneUboFs::new(light),
            models,
            shadows,
        }
    }

    /// Number of per-node blocks
    pub fn node_count(&self) -> usize {
        self.models.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::primitives::cube_mesh;
    use crate::assets::texture::{RgbaColor, Texture};
    use crate::foundation::math::{Mat4Ext, Vec4};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_block_sizes_match_std140() {
        assert_eq!(std::mem::size_of::<SceneUboVs>(), 144);
        assert_eq!(std::mem::size_of::<SceneUboFs>(), 32);
        assert_eq!(std::mem::size_of::<ModelUbo>(), 144);
        assert_eq!(std::mem::size_of::<ShadowUbo>(), 64);
        assert_eq!(std::mem::offset_of!(ModelUbo, texture_index), 128);
    }

    #[test]
    fn test_stride_is_smallest_aligned_multiple() {
        for alignment in [1u64, 4, 16, 64, 256] {
            for size in [1u64, 63, 64, 65, 144, 255, 256, 257] {
                let stride = uniform_stride(size, alignment);
                assert_eq!(stride % alignment, 0);
                assert!(stride >= size);
                assert!(stride < size + alignment);
            }
        }
        assert_eq!(uniform_stride(144, 256), 256);
        assert_eq!(uniform_stride(144, 64), 192);
        assert_eq!(uniform_stride(144, 0), 144);
    }

    #[test]
    fn test_bias_maps_clip_corners_to_texture_corners() {
        let bias = shadow_bias_matrix();

        let low = bias * Vec4::new(-1.0, -1.0, 0.25, 1.0);
        let high = bias * Vec4::new(1.0, 1.0, 0.75, 1.0);

        assert_relative_eq!(low, Vec4::new(0.0, 0.0, 0.25, 1.0), epsilon = EPSILON);
        assert_relative_eq!(high, Vec4::new(1.0, 1.0, 0.75, 1.0), epsilon = EPSILON);
        assert_relative_eq!(bias[(0, 3)], 0.5, epsilon = EPSILON);
        assert_relative_eq!(bias[(3, 0)], 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_pack_strided_places_blocks_at_offsets() {
        let blocks = [
            ShadowUbo { depth_mvp: Mat4::identity().into() },
            ShadowUbo { depth_mvp: Mat4::new_scaling(2.0).into() },
        ];
        let bytes = pack_strided(&blocks, 256);

        assert_eq!(bytes.len(), 512);
        let second: ShadowUbo = bytemuck::pod_read_unaligned(&bytes[256..320]);
        assert_eq!(second, blocks[1]);
        assert!(bytes[64..256].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_build_composes_node_matrices() {
        let mut scene = SceneGraph::new();
        let texture = Arc::new(Texture::solid_color(RgbaColor::new(1.0, 1.0, 1.0, 1.0)));
        let mesh = Arc::new(cube_mesh(1.0, 1.0, 1.0, 1, 1));
        scene.add_node(Node::new(mesh.clone(), texture.clone()).unwrap());
        scene.add_node(Node::new(mesh, texture).unwrap().with_position(Vec3::new(-1.0, 0.0, 0.0)));

        let light = Light::default();
        let view = Mat4::look_at(&Vec3::new(1.7, 1.7, 1.0), &Vec3::zeros(), &Vec3::z());
        let projection = Mat4::vulkan_perspective(1.0, 4.0 / 3.0, 0.1, 10.0);

        let uniforms = FrameUniforms::build(&scene, &view, &projection, &light, |_| 7);

        assert_eq!(uniforms.node_count(), 2);
        let model = Mat4::from(uniforms.models[1].model);
        assert_relative_eq!(model, Mat4::new_translation(&Vec3::new(-1.0, 0.0, 0.0)), epsilon = EPSILON);

        let depth_mvp = Mat4::from(uniforms.shadows[1].depth_mvp);
        assert_relative_eq!(depth_mvp, light.view_projection() * model, epsilon = EPSILON);
        assert_relative_eq!(
            Mat4::from(uniforms.models[1].shadow_matrix),
            shadow_bias_matrix() * depth_mvp,
            epsilon = EPSILON
        );
        assert_eq!(uniforms.models[0].texture_index, 7);
        assert_eq!(uniforms.scene_vs.light_pos, [0.0, 5.0, 5.0]);
        assert_eq!(uniforms.scene_fs.ambient, 0.1);
    }
}
