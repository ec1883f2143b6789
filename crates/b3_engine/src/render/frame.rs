//! Frame orchestrator
//!
//! One call to [`FrameOrchestrator::render_frame`] runs a whole frame on the
//! CPU side:
//!
//! 1. upload meshes and textures that are new to the renderer
//! 2. acquire an image; a stale surface is rebuilt and acquisition retried once
//! 3. classify nodes against the camera and light frusta
//! 4. write scene, model and shadow uniforms into the acquired slot
//! 5. record the shadow pass (casters only), the shadow map barrier, and the
//!    color pass (visible nodes only)
//! 6. submit, then present; a stale present triggers a rebuild
//!
//! The shadow map is rewritten every frame, so it is returned to the
//! attachment layout at the end of the command list.

use thiserror::Error;

use crate::core::config::EngineConfig;
use crate::scene::{Camera, Frustum, Light, SceneGraph, VisibilityFlags};

use super::backend::{AcquireOutcome, BackendError, PresentOutcome, RenderBackend};
use super::commands::{
    CommandList, CullMode, PassKind, PipelineKind, RenderCommand, ShadowMapTransition,
    SwapchainTransition,
};
use super::frame_slots::{FrameSlotError, FrameSlots};
use super::resources::{GpuResources, ResourceError, UploadStats};
use super::uniforms::{uniform_stride, FrameUniforms, ModelUbo, ShadowUbo};

/// Result type for frame operations
pub type FrameResult<T> = Result<T, FrameError>;

/// Errors that drop a frame
#[derive(Error, Debug)]
pub enum FrameError {
    /// The backend failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Uploading scene resources failed
    #[error(transparent)]
    Resources(#[from] ResourceError),

    /// Slot lifecycle violation
    #[error(transparent)]
    Slot(#[from] FrameSlotError),

    /// The scene has more nodes than the per-node uniform buffers hold
    #[error("Scene has {nodes} nodes, the renderer supports {capacity}")]
    NodeCapacityExceeded {
        /// Nodes in the scene
        nodes: usize,
        /// Configured maximum
        capacity: usize,
    },
}

/// What happened to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and handed to presentation
    Presented {
        /// Frame slot used
        slot: usize,
        /// Whether the surface was rebuilt during the frame
        rebuilt: bool,
    },
    /// The surface stayed stale after a rebuild; nothing was rendered
    Skipped,
}

/// Fixed per-frame parameters taken from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSettings {
    /// Shadow map edge length
    pub shadow_map_size: u32,
    /// Constant depth bias for the shadow pass
    pub depth_bias_constant: f32,
    /// Slope-scaled depth bias for the shadow pass
    pub depth_bias_slope: f32,
    /// Color pass clear color
    pub clear_color: [f32; 4],
    /// Per-node uniform capacity
    pub max_nodes: usize,
    /// Texture array capacity
    pub max_textures: u32,
}

impl From<&EngineConfig> for FrameSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            shadow_map_size: config.shadow.map_size,
            depth_bias_constant: config.shadow.depth_bias_constant,
            depth_bias_slope: config.shadow.depth_bias_slope,
            clear_color: config.renderer.clear_color,
            max_nodes: config.renderer.max_nodes as usize,
            max_textures: config.renderer.max_textures,
        }
    }
}

/// Sequences one frame of work on a [`RenderBackend`]
#[derive(Debug)]
pub struct FrameOrchestrator {
    settings: FrameSettings,
    resources: GpuResources,
    slots: FrameSlots,
    visibility: VisibilityFlags,
}

impl FrameOrchestrator {
    /// Create an orchestrator for a backend with `slot_count` frame slots
    pub fn new(settings: FrameSettings, slot_count: usize) -> Self {
        Self {
            resources: GpuResources::new(settings.max_textures),
            slots: FrameSlots::new(slot_count),
            visibility: VisibilityFlags::new(),
            settings,
        }
    }

    /// Upload the scene's new meshes and textures ahead of the first frame
    pub fn prepare<B>(&mut self, backend: &mut B, scene: &SceneGraph) -> FrameResult<UploadStats>
    where
        B: RenderBackend + ?Sized,
    {
        Ok(self.resources.upload_new(scene, backend)?)
    }

    /// Render and present one frame
    pub fn render_frame<B>(
        &mut self,
        backend: &mut B,
        scene: &SceneGraph,
        camera: &Camera,
        light: &Light,
    ) -> FrameResult<FrameOutcome>
    where
        B: RenderBackend + ?Sized,
    {
        if scene.len() > self.settings.max_nodes {
            return Err(FrameError::NodeCapacityExceeded {
                nodes: scene.len(),
                capacity: self.settings.max_nodes,
            });
        }

        self.resources.upload_new(scene, backend)?;

        let mut rebuilt = false;
        let slot = match backend.acquire_next_image()? {
            AcquireOutcome::Ready(slot) => slot,
            AcquireOutcome::Stale => {
                rebuilt = self.rebuild_surface(backend)?;
                match backend.acquire_next_image()? {
                    AcquireOutcome::Ready(slot) => slot,
                    AcquireOutcome::Stale => {
                        log::warn!("Surface still stale after rebuild, skipping frame");
                        backend.wait_queue_idle()?;
                        return Ok(FrameOutcome::Skipped);
                    }
                }
            }
        };

        self.slots.begin_recording(slot)?;
        let commands = match self.prepare_slot(backend, slot, scene, camera, light) {
            Ok(commands) => commands,
            Err(error) => {
                self.slots.abandon(slot);
                return Err(error);
            }
        };

        if let Err(error) = backend.submit(slot, &commands) {
            self.slots.abandon(slot);
            return Err(error.into());
        }
        let frame = self.slots.mark_submitted(slot)?;
        log::trace!("Submitted frame {} in slot {}", frame, slot);

        if backend.present(slot)? == PresentOutcome::Stale {
            // The presented swapchain is gone after a rebuild; the next frame
            // acquires from the new one.
            rebuilt |= self.rebuild_surface(backend)?;
        }

        Ok(FrameOutcome::Presented { slot, rebuilt })
    }

    /// Visibility, uniforms and command recording for an acquired slot
    fn prepare_slot<B>(
        &mut self,
        backend: &mut B,
        slot: usize,
        scene: &SceneGraph,
        camera: &Camera,
        light: &Light,
    ) -> FrameResult<CommandList>
    where
        B: RenderBackend + ?Sized,
    {
        let (width, height) = backend.surface_extent();
        let aspect = width.max(1) as f32 / height.max(1) as f32;

        let view = camera.view_matrix();
        let projection = camera.projection(aspect);
        let camera_frustum = Frustum::from_view_projection(&(projection * view));
        let light_frustum = Frustum::from_view_projection(&light.view_projection());

        self.visibility.update(scene, &camera_frustum, &light_frustum);

        let resources = &self.resources;
        let uniforms = FrameUniforms::build(scene, &view, &projection, light, |node| {
            resources.texture_slot(node.texture()).unwrap_or(0)
        });
        backend.write_uniforms(slot, &uniforms)?;

        Ok(self.record_commands(scene, backend.min_uniform_alignment()))
    }

    /// Record both passes and the barriers around them
    fn record_commands(&self, scene: &SceneGraph, alignment: u64) -> CommandList {
        let model_stride = uniform_stride(std::mem::size_of::<ModelUbo>() as u64, alignment);
        let shadow_stride = uniform_stride(std::mem::size_of::<ShadowUbo>() as u64, alignment);

        let mut list = CommandList::new();

        list.push(RenderCommand::TransitionShadowMap(ShadowMapTransition::UndefinedToAttachment));
        list.push(RenderCommand::BeginShadowPass {
            size: self.settings.shadow_map_size,
        });
        list.push(RenderCommand::BindPipeline(PipelineKind::Shadow));
        list.push(RenderCommand::SetCullMode(CullMode::Front));
        list.push(RenderCommand::SetDepthBias {
            constant: self.settings.depth_bias_constant,
            slope: self.settings.depth_bias_slope,
        });
        self.record_draws(&mut list, scene, PassKind::Shadow, shadow_stride, |i| {
            self.visibility.casts_shadow(i)
        });
        list.push(RenderCommand::EndPass);

        list.push(RenderCommand::TransitionShadowMap(ShadowMapTransition::AttachmentToShaderRead));
        list.push(RenderCommand::TransitionSwapchain(SwapchainTransition::ToColorAttachment));

        list.push(RenderCommand::BeginColorPass {
            clear_color: self.settings.clear_color,
        });
        list.push(RenderCommand::BindPipeline(PipelineKind::Scene));
        list.push(RenderCommand::SetCullMode(CullMode::Back));
        list.push(RenderCommand::BindSceneDescriptors);
        self.record_draws(&mut list, scene, PassKind::Color, model_stride, |i| {
            self.visibility.is_visible(i)
        });
        list.push(RenderCommand::EndPass);

        list.push(RenderCommand::TransitionSwapchain(SwapchainTransition::ToPresent));
        list.push(RenderCommand::TransitionShadowMap(ShadowMapTransition::ShaderReadToAttachment));

        list
    }

    fn record_draws(
        &self,
        list: &mut CommandList,
        scene: &SceneGraph,
        pass: PassKind,
        stride: u64,
        include: impl Fn(usize) -> bool,
    ) {
        for (node_index, (_, node)) in scene.iter().enumerate() {
            if !include(node_index) {
                continue;
            }
            let (Some(mesh_id), Some(index_count)) = (
                self.resources.mesh_id(node.mesh()),
                self.resources.index_count(node.mesh()),
            ) else {
                continue;
            };

            list.push(RenderCommand::BindMesh(mesh_id));
            list.push(RenderCommand::BindNodeUniforms {
                pass,
                node_index,
                dynamic_offset: (node_index as u64 * stride) as u32,
            });
            list.push(RenderCommand::DrawIndexed { index_count });
        }
    }

    fn rebuild_surface<B>(&mut self, backend: &mut B) -> FrameResult<bool>
    where
        B: RenderBackend + ?Sized,
    {
        if !backend.rebuild_surface()? {
            return Ok(false);
        }

        let (width, height) = backend.surface_extent();
        log::info!(
            "Rebuilt surface at {}x{} with {} frame slots",
            width,
            height,
            backend.frame_slot_count()
        );
        self.slots.reset(backend.frame_slot_count());
        Ok(true)
    }

    /// Flags computed for the most recent frame
    pub fn visibility(&self) -> &VisibilityFlags {
        &self.visibility
    }

    /// Frame slot states
    pub fn slots(&self) -> &FrameSlots {
        &self.slots
    }

    /// Uploaded resources
    pub fn resources(&self) -> &GpuResources {
        &self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::primitives::{cube_mesh, plane_mesh, sphere_mesh, UpAxis, UvMap};
    use crate::assets::texture::{RgbaColor, Texture};
    use crate::foundation::math::Vec3;
    use crate::render::backends::recording::{BackendEvent, RecordingBackend};
    use crate::render::frame_slots::SlotState;
    use crate::scene::Node;
    use std::sync::Arc;

    fn texture(r: f32, g: f32, b: f32) -> Arc<Texture> {
        Arc::new(Texture::solid_color(RgbaColor::new(r, g, b, 1.0)))
    }

    fn orchestrator(slot_count: usize) -> FrameOrchestrator {
        FrameOrchestrator::new(FrameSettings::from(&EngineConfig::default()), slot_count)
    }

    fn camera() -> Camera {
        Camera::look_at(Vec3::new(1.7, 1.7, 1.0), Vec3::zeros())
    }

    /// Floor and sphere in view; a cube behind the camera that the light still sees
    fn three_node_scene() -> SceneGraph {
        let mut scene = SceneGraph::new();
        let floor = plane_mesh(6.0, 6.0, UpAxis::Z, 1, 1, UvMap::default());
        scene.add_node(
            Node::new(Arc::new(floor), texture(0.5, 0.5, 0.5))
                .unwrap()
                .with_position(Vec3::new(0.0, 0.0, -0.5)),
        );
        scene.add_node(Node::new(Arc::new(sphere_mesh(0.5, 16, 16)), texture(0.0, 1.0, 0.0)).unwrap());
        scene.add_node(
            Node::new(Arc::new(cube_mesh(0.5, 0.5, 0.5, 1, 1)), texture(0.0, 0.0, 1.0))
                .unwrap()
                .with_position(Vec3::new(2.5, 2.5, 0.5)),
        );
        scene
    }

    #[test]
    fn test_shadow_pass_draws_caster_outside_camera() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        let mut frames = orchestrator(2);

        let outcome = frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented { slot: 0, rebuilt: false });

        assert!(!frames.visibility().is_visible(2));
        assert!(frames.visibility().casts_shadow(2));

        let commands = backend.submitted().last().unwrap();
        assert!(commands.drawn_nodes(PassKind::Shadow).contains(&2));
        assert!(!commands.drawn_nodes(PassKind::Color).contains(&2));
        assert!(commands.drawn_nodes(PassKind::Color).contains(&1));
    }

    #[test]
    fn test_pass_order_and_barriers() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        let mut frames = orchestrator(2);
        frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();

        let commands = backend.submitted().last().unwrap();
        let at = |command: RenderCommand| commands.position(&command).unwrap();

        let to_attachment = at(RenderCommand::TransitionShadowMap(ShadowMapTransition::UndefinedToAttachment));
        let shadow_pass = at(RenderCommand::BeginShadowPass { size: 2048 });
        let to_read = at(RenderCommand::TransitionShadowMap(ShadowMapTransition::AttachmentToShaderRead));
        let color_pass = at(RenderCommand::BeginColorPass { clear_color: [0.01, 0.01, 0.033, 1.0] });
        let to_present = at(RenderCommand::TransitionSwapchain(SwapchainTransition::ToPresent));
        let back = at(RenderCommand::TransitionShadowMap(ShadowMapTransition::ShaderReadToAttachment));

        assert!(to_attachment < shadow_pass);
        assert!(shadow_pass < to_read);
        assert!(to_read < color_pass);
        assert!(color_pass < to_present);
        assert!(to_present < back);

        assert!(commands.commands().contains(&RenderCommand::SetDepthBias { constant: 1.25, slope: 1.75 }));
    }

    #[test]
    fn test_dynamic_offsets_use_aligned_stride() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2).with_alignment(256);
        let mut frames = orchestrator(2);
        frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();

        let commands = backend.submitted().last().unwrap();
        for command in commands {
            if let RenderCommand::BindNodeUniforms { node_index, dynamic_offset, .. } = command {
                assert_eq!(*dynamic_offset as usize, node_index * 256);
            }
        }
    }

    #[test]
    fn test_frame_sequence_order() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        let mut frames = orchestrator(2);
        frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();

        let sequence: Vec<_> = backend
            .events()
            .iter()
            .filter(|e| !matches!(e, BackendEvent::UploadMesh(_) | BackendEvent::UploadTexture(_)))
            .cloned()
            .collect();
        assert_eq!(
            sequence,
            vec![
                BackendEvent::Acquire,
                BackendEvent::WriteUniforms { slot: 0, nodes: 3 },
                BackendEvent::Submit(0),
                BackendEvent::Present(0),
            ]
        );
        assert_eq!(frames.slots().state(0), Some(SlotState::InFlight { frame: 0 }));
    }

    #[test]
    fn test_stale_acquire_rebuilds_and_retries_once() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        backend.queue_acquire(AcquireOutcome::Stale);
        backend.set_slot_count_after_rebuild(3);
        let mut frames = orchestrator(2);

        let outcome = frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { slot: 0, rebuilt: true });
        assert_eq!(backend.count(&BackendEvent::Acquire), 2);
        assert_eq!(backend.count(&BackendEvent::Rebuild), 1);
        assert_eq!(frames.slots().len(), 3);
    }

    #[test]
    fn test_stale_after_retry_skips_frame() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        backend.queue_acquire(AcquireOutcome::Stale);
        backend.queue_acquire(AcquireOutcome::Stale);
        let mut frames = orchestrator(2);

        let outcome = frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();

        assert_eq!(outcome, FrameOutcome::Skipped);
        assert_eq!(backend.count(&BackendEvent::WaitQueueIdle), 1);
        assert!(backend.submitted().is_empty());
    }

    #[test]
    fn test_stale_present_rebuilds_without_representing() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        backend.queue_present(PresentOutcome::Stale);
        let mut frames = orchestrator(2);

        let outcome = frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { slot: 0, rebuilt: true });
        assert_eq!(backend.count(&BackendEvent::Present(0)), 1);
        assert_eq!(backend.count(&BackendEvent::Rebuild), 1);
    }

    #[test]
    fn test_failed_submit_abandons_slot() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        backend.fail_next_submit();
        let mut frames = orchestrator(2);

        let result = frames.render_frame(&mut backend, &scene, &camera(), &Light::default());

        assert!(matches!(result, Err(FrameError::Backend(_))));
        assert_eq!(frames.slots().state(0), Some(SlotState::Idle));

        // The next frame proceeds normally
        let outcome = frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
    }

    #[test]
    fn test_slots_rotate_across_frames() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        let mut frames = orchestrator(2);

        for expected in [0, 1, 0] {
            let outcome = frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();
            assert_eq!(outcome, FrameOutcome::Presented { slot: expected, rebuilt: false });
        }
        assert_eq!(frames.slots().frames_submitted(), 3);
    }

    #[test]
    fn test_too_many_nodes_is_rejected_before_acquire() {
        let mut settings = FrameSettings::from(&EngineConfig::default());
        settings.max_nodes = 2;
        let mut frames = FrameOrchestrator::new(settings, 2);
        let mut backend = RecordingBackend::new(2);

        let result = frames.render_frame(&mut backend, &three_node_scene(), &camera(), &Light::default());

        assert!(matches!(result, Err(FrameError::NodeCapacityExceeded { nodes: 3, capacity: 2 })));
        assert_eq!(backend.count(&BackendEvent::Acquire), 0);
    }

    #[test]
    fn test_shared_texture_uses_one_slot() {
        let mut scene = SceneGraph::new();
        let shared = texture(1.0, 1.0, 1.0);
        let mesh = Arc::new(sphere_mesh(0.25, 8, 8));
        scene.add_node(Node::new(mesh.clone(), shared.clone()).unwrap());
        scene.add_node(Node::new(mesh, shared).unwrap().with_position(Vec3::new(0.0, 0.5, 0.0)));

        let mut backend = RecordingBackend::new(2);
        let mut frames = orchestrator(2);
        frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();

        let uniforms = backend.last_uniforms().unwrap();
        assert_eq!(uniforms.models[0].texture_index, 0);
        assert_eq!(uniforms.models[1].texture_index, 0);
        assert_eq!(frames.resources().texture_count(), 1);
    }

    #[test]
    fn test_prepare_uploads_before_first_frame() {
        let scene = three_node_scene();
        let mut backend = RecordingBackend::new(2);
        let mut frames = orchestrator(2);

        let stats = frames.prepare(&mut backend, &scene).unwrap();
        assert_eq!(stats.meshes, 3);
        assert_eq!(stats.textures, 3);
        assert_eq!(backend.count(&BackendEvent::Acquire), 0);

        frames.render_frame(&mut backend, &scene, &camera(), &Light::default()).unwrap();
        let uploads = backend
            .events()
            .iter()
            .filter(|e| matches!(e, BackendEvent::UploadMesh(_)))
            .count();
        assert_eq!(uploads, 3);
    }
}
