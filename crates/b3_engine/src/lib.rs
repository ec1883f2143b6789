//! # b3 engine
//!
//! A small Vulkan scene renderer: a flat list of textured mesh nodes, one
//! light, shadow mapping with percentage-closer filtering, and frustum culling
//! against both the camera and the light.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use b3_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut engine = Engine::new(&config)?;
//!
//!     let texture = Arc::new(Texture::solid_color(RgbaColor::new(0.0, 1.0, 0.0, 1.0)));
//!     let sphere = Node::new(Arc::new(sphere_mesh(0.5, 32, 32)), texture)?;
//!     engine.scene_mut().add_node(sphere);
//!
//!     engine.run()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod core;
pub mod engine;
pub mod foundation;
pub mod render;
pub mod scene;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{cube_mesh, plane_mesh, sphere_mesh, Mesh, RgbaColor, Texture, UpAxis, UvMap, Vertex},
        config::Config,
        core::config::EngineConfig,
        foundation::math::{Mat4, Quat, Vec3},
        scene::{Camera, Light, Node, NodeHandle, SceneGraph},
        Engine, EngineError,
    };
}
