//! In-memory backend for headless tests
//!
//! Logs every call, keeps submitted command lists and the last uniforms, and
//! replays scripted acquire and present outcomes. Without a script, acquire
//! hands out slots round-robin and present always succeeds.

use std::collections::VecDeque;

use crate::assets::{Mesh, Texture};
use crate::render::backend::{AcquireOutcome, BackendError, BackendResult, PresentOutcome, RenderBackend};
use crate::render::backends::vulkan::VulkanError;
use crate::render::commands::CommandList;
use crate::render::resources::MeshId;
use crate::render::uniforms::FrameUniforms;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// `upload_mesh`
    UploadMesh(MeshId),
    /// `upload_texture`
    UploadTexture(u32),
    /// `acquire_next_image`
    Acquire,
    /// `rebuild_surface`
    Rebuild,
    /// `write_uniforms`
    WriteUniforms {
        /// Slot written
        slot: usize,
        /// Per-node blocks written
        nodes: usize,
    },
    /// `submit`
    Submit(usize),
    /// `present`
    Present(usize),
    /// `wait_queue_idle`
    WaitQueueIdle,
}

/// Backend that records instead of rendering
#[derive(Debug)]
pub struct RecordingBackend {
    slot_count: usize,
    slot_count_after_rebuild: usize,
    alignment: u64,
    extent: (u32, u32),
    next_slot: usize,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    fail_submit: bool,
    events: Vec<BackendEvent>,
    submitted: Vec<CommandList>,
    last_uniforms: Option<FrameUniforms>,
}

impl RecordingBackend {
    /// Backend with `slot_count` slots, a 1024×768 surface and 64-byte alignment
    pub fn new(slot_count: usize) -> Self {
        Self {
            slot_count,
            slot_count_after_rebuild: slot_count,
            alignment: 64,
            extent: (1024, 768),
            next_slot: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fail_submit: false,
            events: Vec::new(),
            submitted: Vec::new(),
            last_uniforms: None,
        }
    }

    /// Use a different uniform offset alignment
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Return `outcome` from an upcoming acquire
    pub fn queue_acquire(&mut self, outcome: AcquireOutcome) {
        self.acquire_script.push_back(outcome);
    }

    /// Return `outcome` from an upcoming present
    pub fn queue_present(&mut self, outcome: PresentOutcome) {
        self.present_script.push_back(outcome);
    }

    /// Slot count reported after the next rebuild
    pub fn set_slot_count_after_rebuild(&mut self, count: usize) {
        self.slot_count_after_rebuild = count;
    }

    /// Make the next submit fail
    pub fn fail_next_submit(&mut self) {
        self.fail_submit = true;
    }

    /// Every call so far
    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    /// Number of times `event` was recorded
    pub fn count(&self, event: &BackendEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    /// Command lists passed to `submit`, in order
    pub fn submitted(&self) -> &[CommandList] {
        &self.submitted
    }

    /// Uniforms from the most recent `write_uniforms`
    pub fn last_uniforms(&self) -> Option<&FrameUniforms> {
        self.last_uniforms.as_ref()
    }

    fn check_slot(&self, slot: usize) -> BackendResult<()> {
        if slot < self.slot_count {
            Ok(())
        } else {
            Err(BackendError::InvalidSlot {
                slot,
                count: self.slot_count,
            })
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn frame_slot_count(&self) -> usize {
        self.slot_count
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.alignment
    }

    fn surface_extent(&self) -> (u32, u32) {
        self.extent
    }

    fn upload_mesh(&mut self, id: MeshId, _mesh: &Mesh) -> BackendResult<()> {
        self.events.push(BackendEvent::UploadMesh(id));
        Ok(())
    }

    fn upload_texture(&mut self, slot: u32, _texture: &Texture) -> BackendResult<()> {
        self.events.push(BackendEvent::UploadTexture(slot));
        Ok(())
    }

    fn acquire_next_image(&mut self) -> BackendResult<AcquireOutcome> {
        self.events.push(BackendEvent::Acquire);
        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let slot = self.next_slot % self.slot_count;
        self.next_slot += 1;
        Ok(AcquireOutcome::Ready(slot))
    }

    fn rebuild_surface(&mut self) -> BackendResult<bool> {
        self.events.push(BackendEvent::Rebuild);
        self.slot_count = self.slot_count_after_rebuild;
        self.next_slot = 0;
        Ok(true)
    }

    fn write_uniforms(&mut self, slot: usize, uniforms: &FrameUniforms) -> BackendResult<()> {
        self.check_slot(slot)?;
        self.events.push(BackendEvent::WriteUniforms {
            slot,
            nodes: uniforms.node_count(),
        });
        self.last_uniforms = Some(uniforms.clone());
        Ok(())
    }

    fn submit(&mut self, slot: usize, commands: &CommandList) -> BackendResult<()> {
        self.check_slot(slot)?;
        if std::mem::take(&mut self.fail_submit) {
            return Err(VulkanError::Api(ash::vk::Result::ERROR_DEVICE_LOST).into());
        }
        self.events.push(BackendEvent::Submit(slot));
        self.submitted.push(commands.clone());
        Ok(())
    }

    fn present(&mut self, slot: usize) -> BackendResult<PresentOutcome> {
        self.check_slot(slot)?;
        self.events.push(BackendEvent::Present(slot));
        Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn wait_queue_idle(&mut self) -> BackendResult<()> {
        self.events.push(BackendEvent::WaitQueueIdle);
        Ok(())
    }

    fn wait_device_idle(&self) -> BackendResult<()> {
        Ok(())
    }
}
