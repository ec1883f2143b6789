//! # Rendering
//!
//! Frame sequencing is kept apart from the graphics API:
//!
//! - [`frame`]: the [`FrameOrchestrator`] runs one frame end to end
//! - [`commands`]: backend-neutral [`CommandList`] recorded each frame
//! - [`uniforms`]: GPU uniform block layouts and their per-frame contents
//! - [`resources`]: one upload per shared mesh or texture
//! - [`frame_slots`]: lifecycle of per-frame resource slots
//! - [`backend`]: the [`RenderBackend`] trait the orchestrator drives
//! - [`backends`]: the Vulkan implementation

pub mod backend;
pub mod backends;
pub mod commands;
pub mod frame;
pub mod frame_slots;
pub mod resources;
pub mod uniforms;

pub use backend::{AcquireOutcome, BackendError, BackendResult, PresentOutcome, RenderBackend};
pub use commands::{CommandList, CullMode, PassKind, PipelineKind, RenderCommand};
pub use frame::{FrameError, FrameOrchestrator, FrameOutcome, FrameResult, FrameSettings};
pub use frame_slots::{FrameSlotError, FrameSlots, SlotState};
pub use resources::{GpuResources, MeshId, ResourceError, UploadStats};
pub use uniforms::FrameUniforms;
