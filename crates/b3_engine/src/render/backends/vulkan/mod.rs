//! Vulkan backend
//!
//! Implements [`RenderBackend`](crate::render::backend::RenderBackend) on
//! Vulkan 1.3 through `ash`. Passes use dynamic rendering, barriers use
//! synchronization2, and cull mode and depth bias are dynamic state, so
//! one pipeline per pass serves every frame.
//!
//! Every object wrapper here owns its handle and destroys it on drop.

use ash::vk;
use thiserror::Error;

pub mod backend;
pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptors;
pub mod image;
pub mod per_frame;
pub mod pipeline;
pub mod replay;
pub mod swapchain;
pub mod sync;
pub mod vertex_layout;
pub mod window;

pub use backend::VulkanBackend;
pub use context::VulkanContext;
pub use window::{Window, WindowError};

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Resource with specified ID could not be found
    #[error("Resource not found: {id}")]
    ResourceNotFound {
        /// The identifier of the resource
        id: u64,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
