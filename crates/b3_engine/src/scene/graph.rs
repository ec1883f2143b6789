//! Scene graph
//!
//! Nodes live in a slotmap arena and refer to their parent by handle. A handle
//! whose node has been removed simply stops resolving, so a child of a removed
//! node behaves as a root. World matrices are recomputed on every query.

use thiserror::Error;

use crate::foundation::collections::{NodeArena, NodeHandle};
use crate::foundation::math::Mat4;

use super::bounds::BoundingSphere;
use super::node::Node;

/// Scene graph errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The handle does not refer to a live node
    #[error("Node handle {0:?} is not in the scene")]
    StaleHandle(NodeHandle),

    /// Linking the nodes would make a node its own ancestor
    #[error("Parenting {child:?} under {parent:?} would create a cycle")]
    ParentCycle {
        /// Node being re-parented
        child: NodeHandle,
        /// Requested parent
        parent: NodeHandle,
    },
}

/// Arena of scene nodes with a stable iteration order
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: NodeArena<Node>,
    order: Vec<NodeHandle>,
}

impl SceneGraph {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its handle
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.order.push(handle);
        log::debug!("Added node {:?} ({} total)", handle, self.order.len());
        handle
    }

    /// Remove a node. Its children keep the dangling handle and act as roots.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Option<Node> {
        let node = self.nodes.remove(handle)?;
        self.order.retain(|&h| h != handle);
        Some(node)
    }

    /// Attach `child` under `parent`, or detach it with `None`
    pub fn set_parent(&mut self, child: NodeHandle, parent: Option<NodeHandle>) -> Result<(), SceneError> {
        if !self.nodes.contains_key(child) {
            return Err(SceneError::StaleHandle(child));
        }

        if let Some(parent) = parent {
            if !self.nodes.contains_key(parent) {
                return Err(SceneError::StaleHandle(parent));
            }
            if self.ancestors(parent).any(|ancestor| ancestor == child) {
                return Err(SceneError::ParentCycle { child, parent });
            }
        }

        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = parent;
        }
        Ok(())
    }

    /// Live parent of a node, if any
    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes
            .get(handle)?
            .parent
            .filter(|parent| self.nodes.contains_key(*parent))
    }

    /// The node itself followed by each live ancestor up to the root
    fn ancestors(&self, handle: NodeHandle) -> impl Iterator<Item = NodeHandle> + '_ {
        std::iter::successors(
            self.nodes.contains_key(handle).then_some(handle),
            move |&current| self.parent(current),
        )
    }

    /// Borrow a node
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    /// Mutably borrow a node
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    /// Parent world matrix times local matrix, up to the first node without a live parent
    pub fn world_matrix(&self, handle: NodeHandle) -> Option<Mat4> {
        let node = self.nodes.get(handle)?;
        let local = node.local_matrix();

        Some(match self.parent(handle) {
            Some(parent) => self.world_matrix(parent).unwrap_or_else(Mat4::identity) * local,
            None => local,
        })
    }

    /// The node's bounding sphere moved into world space
    pub fn world_bounding_sphere(&self, handle: NodeHandle) -> Option<BoundingSphere> {
        let node = self.nodes.get(handle)?;
        let world = self.world_matrix(handle)?;
        Some(node.object_bounding_sphere().transformed(&world))
    }

    /// Nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &Node)> + '_ {
        self.order
            .iter()
            .filter_map(move |&handle| self.nodes.get(handle).map(|node| (handle, node)))
    }

    /// Node handles in insertion order
    pub fn handles(&self) -> &[NodeHandle] {
        &self.order
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the scene has no nodes
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::primitives::{cube_mesh, sphere_mesh};
    use crate::assets::texture::{RgbaColor, Texture};
    use crate::foundation::math::{Point3, Vec3};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    const EPSILON: f32 = 1e-5;

    fn node_at(position: Vec3) -> Node {
        let texture = Arc::new(Texture::solid_color(RgbaColor::new(1.0, 1.0, 1.0, 1.0)));
        Node::new(Arc::new(cube_mesh(1.0, 1.0, 1.0, 1, 1)), texture)
            .unwrap()
            .with_position(position)
    }

    #[test]
    fn test_child_world_is_parent_world_times_local() {
        let mut scene = SceneGraph::new();
        let mut parent = node_at(Vec3::new(2.0, 0.0, 0.0));
        parent.set_euler_angles(Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2));
        let parent = scene.add_node(parent);
        let child = scene.add_node(node_at(Vec3::new(1.0, 0.0, 0.5)));
        scene.set_parent(child, Some(parent)).unwrap();

        let expected = scene.world_matrix(parent).unwrap() * scene.get(child).unwrap().local_matrix();
        let world = scene.world_matrix(child).unwrap();
        assert_relative_eq!(world, expected, epsilon = EPSILON);

        // Child origin: rotate (1, 0, 0.5) by 90° about Z, then offset by the parent
        let point = world.transform_point(&Point3::origin());
        assert_relative_eq!(point, Point3::new(2.0, 1.0, 0.5), epsilon = EPSILON);
    }

    #[test]
    fn test_three_levels_compose() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node(node_at(Vec3::new(1.0, 0.0, 0.0)));
        let b = scene.add_node(node_at(Vec3::new(0.0, 1.0, 0.0)));
        let c = scene.add_node(node_at(Vec3::new(0.0, 0.0, 1.0)));
        scene.set_parent(b, Some(a)).unwrap();
        scene.set_parent(c, Some(b)).unwrap();

        let origin = scene.world_matrix(c).unwrap().transform_point(&Point3::origin());
        assert_relative_eq!(origin, Point3::new(1.0, 1.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_removed_parent_degrades_to_root() {
        let mut scene = SceneGraph::new();
        let parent = scene.add_node(node_at(Vec3::new(5.0, 0.0, 0.0)));
        let child = scene.add_node(node_at(Vec3::new(1.0, 0.0, 0.0)));
        scene.set_parent(child, Some(parent)).unwrap();

        scene.remove_node(parent);

        assert_eq!(scene.parent(child), None);
        assert_eq!(scene.get(child).unwrap().parent(), Some(parent));
        assert_relative_eq!(
            scene.world_matrix(child).unwrap(),
            scene.get(child).unwrap().local_matrix(),
            epsilon = EPSILON
        );
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node(node_at(Vec3::zeros()));
        let b = scene.add_node(node_at(Vec3::zeros()));
        scene.set_parent(b, Some(a)).unwrap();

        assert_eq!(scene.set_parent(a, Some(b)), Err(SceneError::ParentCycle { child: a, parent: b }));
        assert_eq!(scene.set_parent(a, Some(a)), Err(SceneError::ParentCycle { child: a, parent: a }));
    }

    #[test]
    fn test_stale_handles_are_rejected() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node(node_at(Vec3::zeros()));
        let b = scene.add_node(node_at(Vec3::zeros()));
        scene.remove_node(b);

        assert_eq!(scene.set_parent(a, Some(b)), Err(SceneError::StaleHandle(b)));
        assert_eq!(scene.set_parent(b, None), Err(SceneError::StaleHandle(b)));
        assert!(scene.world_matrix(b).is_none());
    }

    #[test]
    fn test_world_bounding_sphere_follows_node() {
        let mut scene = SceneGraph::new();
        let texture = Arc::new(Texture::solid_color(RgbaColor::new(0.0, 1.0, 0.0, 1.0)));
        let node = Node::new(Arc::new(sphere_mesh(0.5, 16, 16)), texture)
            .unwrap()
            .with_position(Vec3::new(1000.0, 0.0, 0.0));
        let handle = scene.add_node(node);

        let sphere = scene.world_bounding_sphere(handle).unwrap();
        assert_relative_eq!(sphere.center, Vec3::new(1000.0, 0.0, 0.0), epsilon = 1e-3);
        assert_relative_eq!(sphere.radius, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_iteration_keeps_insertion_order() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node(node_at(Vec3::zeros()));
        let b = scene.add_node(node_at(Vec3::zeros()));
        let c = scene.add_node(node_at(Vec3::zeros()));
        scene.remove_node(b);

        let handles: Vec<_> = scene.iter().map(|(handle, _)| handle).collect();
        assert_eq!(handles, vec![a, c]);
    }
}
