//! Asset providers
//!
//! CPU-side geometry and pixel data consumed by the renderer, plus generators
//! for the primitive shapes used by the demo scene.

pub mod mesh;
pub mod primitives;
pub mod texture;

pub use mesh::{Mesh, Vertex};
pub use primitives::{cube_mesh, plane_mesh, sphere_mesh, UpAxis, UvMap};
pub use texture::{RgbaColor, Texture, TextureError};
