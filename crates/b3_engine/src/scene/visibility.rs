//! Per-frame visibility flags
//!
//! Two independent classifications per node: seen by the camera, and seen by
//! the light (so it casts into the shadow map). Flags are indexed like
//! [`SceneGraph::iter`] and rebuilt from scratch every frame.

use super::culling::Frustum;
use super::graph::SceneGraph;

/// Camera and shadow-caster flags for every node in the scene
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityFlags {
    visible: Vec<bool>,
    casts_shadow: Vec<bool>,
}

impl VisibilityFlags {
    /// Create empty flags
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute both flag sets, resizing them to the current node count
    pub fn update(&mut self, scene: &SceneGraph, camera_frustum: &Frustum, light_frustum: &Frustum) {
        self.visible.clear();
        self.casts_shadow.clear();
        self.visible.reserve(scene.len());
        self.casts_shadow.reserve(scene.len());

        for (handle, _) in scene.iter() {
            let (visible, casts_shadow) = match scene.world_bounding_sphere(handle) {
                Some(sphere) => (
                    camera_frustum.intersects_sphere(&sphere),
                    light_frustum.intersects_sphere(&sphere),
                ),
                None => (false, false),
            };
            self.visible.push(visible);
            self.casts_shadow.push(casts_shadow);
        }

        log::trace!(
            "Visibility: {}/{} visible, {}/{} shadow casters",
            self.visible_count(),
            self.len(),
            self.shadow_caster_count(),
            self.len()
        );
    }

    /// Whether the node at `index` is inside the camera frustum
    pub fn is_visible(&self, index: usize) -> bool {
        self.visible.get(index).copied().unwrap_or(false)
    }

    /// Whether the node at `index` is inside the light frustum
    pub fn casts_shadow(&self, index: usize) -> bool {
        self.casts_shadow.get(index).copied().unwrap_or(false)
    }

    /// Camera flags in node order
    pub fn visible(&self) -> &[bool] {
        &self.visible
    }

    /// Shadow-caster flags in node order
    pub fn shadow_casters(&self) -> &[bool] {
        &self.casts_shadow
    }

    /// Number of nodes classified
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    /// Whether no nodes were classified
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    fn visible_count(&self) -> usize {
        self.visible.iter().filter(|&&v| v).count()
    }

    fn shadow_caster_count(&self) -> usize {
        self.casts_shadow.iter().filter(|&&v| v).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::primitives::sphere_mesh;
    use crate::assets::texture::{RgbaColor, Texture};
    use crate::foundation::math::{Mat4, Vec3};
    use crate::scene::node::Node;
    use std::sync::Arc;

    /// Covers [-10, 10] on every axis
    fn box_frustum() -> Frustum {
        Frustum::from_view_projection(&Mat4::new_scaling(0.1))
    }

    fn sphere_node(position: Vec3) -> Node {
        let texture = Arc::new(Texture::solid_color(RgbaColor::new(0.0, 1.0, 0.0, 1.0)));
        Node::new(Arc::new(sphere_mesh(0.5, 16, 16)), texture)
            .unwrap()
            .with_position(position)
    }

    #[test]
    fn test_sphere_at_origin_is_visible() {
        let mut scene = SceneGraph::new();
        scene.add_node(sphere_node(Vec3::zeros()));

        let mut flags = VisibilityFlags::new();
        flags.update(&scene, &box_frustum(), &box_frustum());

        assert!(flags.is_visible(0));
        assert!(flags.casts_shadow(0));
    }

    #[test]
    fn test_moved_sphere_is_culled() {
        let mut scene = SceneGraph::new();
        let handle = scene.add_node(sphere_node(Vec3::zeros()));
        scene.get_mut(handle).unwrap().set_position(Vec3::new(1000.0, 0.0, 0.0));

        let mut flags = VisibilityFlags::new();
        flags.update(&scene, &box_frustum(), &box_frustum());

        assert!(!flags.is_visible(0));
        assert!(!flags.casts_shadow(0));
    }

    #[test]
    fn test_camera_and_light_are_independent() {
        let mut scene = SceneGraph::new();
        scene.add_node(sphere_node(Vec3::zeros()));
        scene.add_node(sphere_node(Vec3::new(0.0, 0.0, 30.0)));

        // Light box reaches z = 40, camera box only z = 10
        let light = Frustum::from_view_projection(&Mat4::new_nonuniform_scaling(&Vec3::new(0.1, 0.1, 0.025)));

        let mut flags = VisibilityFlags::new();
        flags.update(&scene, &box_frustum(), &light);

        assert_eq!(flags.visible(), &[true, false]);
        assert_eq!(flags.shadow_casters(), &[true, true]);
    }

    #[test]
    fn test_flags_track_node_count() {
        let mut scene = SceneGraph::new();
        let mut flags = VisibilityFlags::new();
        flags.update(&scene, &box_frustum(), &box_frustum());
        assert!(flags.is_empty());

        let first = scene.add_node(sphere_node(Vec3::zeros()));
        scene.add_node(sphere_node(Vec3::zeros()));
        flags.update(&scene, &box_frustum(), &box_frustum());
        assert_eq!(flags.len(), 2);

        scene.remove_node(first);
        flags.update(&scene, &box_frustum(), &box_frustum());
        assert_eq!(flags.len(), 1);
        assert!(!flags.is_visible(1));
    }
}
