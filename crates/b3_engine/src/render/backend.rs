//! Backend abstraction for the frame orchestrator
//!
//! [`RenderBackend`] is the GPU command submission substrate: it owns the
//! device, swapchain, per-frame slots and GPU copies of meshes and textures,
//! and it replays a [`CommandList`] into real command buffers. The
//! orchestrator in [`super::frame`] only sequences calls on this trait.

use thiserror::Error;

use crate::assets::{Mesh, Texture};

use super::backends::vulkan::VulkanError;
use super::commands::CommandList;
use super::resources::MeshId;
use super::uniforms::FrameUniforms;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend failures
#[derive(Error, Debug)]
pub enum BackendError {
    /// Vulkan API failure
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    /// A command referenced a mesh that was never uploaded
    #[error("Mesh {0:?} has not been uploaded")]
    UnknownMesh(MeshId),

    /// A frame slot index outside `0..count`
    #[error("Frame slot {slot} out of range ({count} slots)")]
    InvalidSlot {
        /// Requested slot
        slot: usize,
        /// Number of slots
        count: usize,
    },

    /// More per-node blocks than the uniform buffers hold
    #[error("{nodes} nodes exceed the uniform buffer capacity of {capacity}")]
    UniformCapacityExceeded {
        /// Blocks requested
        nodes: usize,
        /// Blocks available
        capacity: usize,
    },
}

/// Result of asking for the next swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready; its frame slot has finished all earlier GPU work
    Ready(usize),
    /// The surface is out of date or suboptimal and must be rebuilt
    Stale,
}

/// Result of presenting a rendered image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Queued for presentation
    Presented,
    /// Presented or dropped, and the surface must be rebuilt
    Stale,
}

/// GPU command submission substrate
pub trait RenderBackend {
    /// Number of frame slots, equal to the swapchain image count
    fn frame_slot_count(&self) -> usize;

    /// Minimum dynamic uniform buffer offset alignment, a power of two
    fn min_uniform_alignment(&self) -> u64;

    /// Current surface size in pixels
    fn surface_extent(&self) -> (u32, u32);

    /// Upload vertex and index buffers for a mesh
    fn upload_mesh(&mut self, id: MeshId, mesh: &Mesh) -> BackendResult<()>;

    /// Upload a texture into slot `slot` of the texture array
    fn upload_texture(&mut self, slot: u32, texture: &Texture) -> BackendResult<()>;

    /// Acquire the next image.
    ///
    /// Blocks until the returned slot's previous submission has completed, so
    /// its uniform buffers and command buffer may be overwritten.
    fn acquire_next_image(&mut self) -> BackendResult<AcquireOutcome>;

    /// Recreate size-dependent resources. Returns `false` when nothing was
    /// rebuilt, for example because the window is minimized.
    fn rebuild_surface(&mut self) -> BackendResult<bool>;

    /// Write scene and per-node uniforms into a slot's buffers
    fn write_uniforms(&mut self, slot: usize, uniforms: &FrameUniforms) -> BackendResult<()>;

    /// Record and submit a slot's commands, waiting on its acquire signal and
    /// signaling its release signal and fence
    fn submit(&mut self, slot: usize, commands: &CommandList) -> BackendResult<()>;

    /// Present a slot's image once its release signal fires
    fn present(&mut self, slot: usize) -> BackendResult<PresentOutcome>;

    /// Wait for the graphics queue to drain
    fn wait_queue_idle(&mut self) -> BackendResult<()>;

    /// Wait for all device work to finish
    fn wait_device_idle(&self) -> BackendResult<()>;
}
