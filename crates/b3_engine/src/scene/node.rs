//! Scene nodes
//!
//! A node is a rigid transform plus the mesh and texture it draws. Meshes and
//! textures are shared through `Arc`, so several nodes can reference the same
//! geometry and the renderer uploads it once.

use std::sync::Arc;

use crate::assets::{Mesh, Texture};
use crate::foundation::collections::NodeHandle;
use crate::foundation::math::{quat_from_euler, Mat4, Quat, Vec3};

use super::bounds::{BoundingSphere, CullingError};

/// Drawable scene node
#[derive(Debug, Clone)]
pub struct Node {
    position: Vec3,
    rotation: Quat,
    mesh: Arc<Mesh>,
    texture: Arc<Texture>,
    pub(super) parent: Option<NodeHandle>,
    bounding_sphere: BoundingSphere,
}

impl Node {
    /// Create a node at the origin with no rotation.
    ///
    /// Fails when the mesh has no vertices, since it cannot be bounded.
    pub fn new(mesh: Arc<Mesh>, texture: Arc<Texture>) -> Result<Self, CullingError> {
        let bounding_sphere = BoundingSphere::from_points(&mesh.positions())?;
        Ok(Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            mesh,
            texture,
            parent: None,
            bounding_sphere,
        })
    }

    /// Builder-style position setter
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Position relative to the parent
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Set the position relative to the parent
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Orientation relative to the parent
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Set the orientation relative to the parent
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    /// Set the orientation from XYZ euler angles in radians
    pub fn set_euler_angles(&mut self, angles: Vec3) {
        self.rotation = quat_from_euler(angles);
    }

    /// Orientation as XYZ euler angles in radians
    pub fn euler_angles(&self) -> Vec3 {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        Vec3::new(roll, pitch, yaw)
    }

    /// Mesh drawn by this node
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Replace the mesh and recompute the bounding sphere.
    ///
    /// On error the node keeps its previous mesh.
    pub fn set_mesh(&mut self, mesh: Arc<Mesh>) -> Result<(), CullingError> {
        self.bounding_sphere = BoundingSphere::from_points(&mesh.positions())?;
        self.mesh = mesh;
        Ok(())
    }

    /// Texture sampled by this node
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    /// Replace the texture
    pub fn set_texture(&mut self, texture: Arc<Texture>) {
        self.texture = texture;
    }

    /// Parent handle, which may refer to a node that no longer exists
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Bounding sphere of the mesh in object space
    pub fn object_bounding_sphere(&self) -> &BoundingSphere {
        &self.bounding_sphere
    }

    /// Rotation followed by translation
    pub fn local_matrix(&self) -> Mat4 {
        let mut local = self.rotation.to_homogeneous();
        local.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.position);
        local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::primitives::{cube_mesh, sphere_mesh};
    use crate::assets::texture::RgbaColor;
    use crate::foundation::math::{Point3, Vec4};
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn white() -> Arc<Texture> {
        Arc::new(Texture::solid_color(RgbaColor::new(1.0, 1.0, 1.0, 1.0)))
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let result = Node::new(Arc::new(Mesh::default()), white());
        assert_eq!(result.err(), Some(CullingError::EmptyVertexSet));
    }

    #[test]
    fn test_local_matrix_rotates_then_translates() {
        let mut node = Node::new(Arc::new(cube_mesh(1.0, 1.0, 1.0, 1, 1)), white()).unwrap();
        node.set_position(Vec3::new(1.0, 2.0, 3.0));
        node.set_euler_angles(Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2));

        let local = node.local_matrix();
        let moved = local.transform_point(&Point3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(moved, Point3::new(1.0, 3.0, 3.0), epsilon = EPSILON);
        assert_relative_eq!(local.row(3).transpose(), Vec4::new(0.0, 0.0, 0.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_set_mesh_recomputes_sphere() {
        let mut node = Node::new(Arc::new(sphere_mesh(0.5, 16, 16)), white()).unwrap();
        assert_relative_eq!(node.object_bounding_sphere().radius, 0.5, epsilon = 1e-3);

        node.set_mesh(Arc::new(sphere_mesh(2.0, 16, 16))).unwrap();
        assert_relative_eq!(node.object_bounding_sphere().radius, 2.0, epsilon = 1e-2);
    }

    #[test]
    fn test_failed_set_mesh_keeps_previous_mesh() {
        let mesh = Arc::new(sphere_mesh(0.5, 8, 8));
        let mut node = Node::new(mesh.clone(), white()).unwrap();

        assert!(node.set_mesh(Arc::new(Mesh::default())).is_err());
        assert!(Arc::ptr_eq(node.mesh(), &mesh));
    }

    #[test]
    fn test_euler_angles_round_trip() {
        let mut node = Node::new(Arc::new(sphere_mesh(0.5, 4, 4)), white()).unwrap();
        let angles = Vec3::new(0.1, -0.2, 0.3);
        node.set_euler_angles(angles);
        assert_relative_eq!(node.euler_angles(), angles, epsilon = EPSILON);
    }
}
