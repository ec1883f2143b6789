//! Scene management system
//!
//! The scene is a flat arena of [`Node`]s with optional parent links, plus the
//! camera and light that view it. Each frame the renderer asks the scene for
//! world matrices and world-space bounding spheres, and classifies every node
//! against the camera and light frusta.
//!
//! ```text
//! Node transforms ──▶ world matrices ──▶ frustum tests ──▶ VisibilityFlags
//! ```

pub mod bounds;
pub mod camera;
pub mod culling;
pub mod graph;
pub mod light;
pub mod node;
pub mod visibility;

pub use bounds::{BoundingSphere, CullingError};
pub use camera::{Camera, MovementInput};
pub use culling::{Frustum, FrustumSide, Plane};
pub use graph::{SceneError, SceneGraph};
pub use light::Light;
pub use node::Node;
pub use visibility::VisibilityFlags;

pub use crate::foundation::collections::NodeHandle;
