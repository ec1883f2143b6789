//! Translation of a [`CommandList`] into Vulkan commands

use std::collections::HashMap;

use ash::{vk, Device};

use crate::render::backend::{BackendError, BackendResult};
use crate::render::commands::{CommandList, CullMode, PassKind, PipelineKind, RenderCommand, ShadowMapTransition, SwapchainTransition};
use crate::render::resources::MeshId;

use super::buffer::GpuMesh;
use super::image::{cmd_barriers, layout_barrier, Access, Image};
use super::per_frame::FrameResources;
use super::pipeline::GraphicsPipeline;

const DEPTH_TESTS: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
);
const DEPTH_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw() | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
);

/// Images one frame renders to
pub struct FrameTargets<'a> {
    /// Acquired swapchain image
    pub swapchain_image: vk::Image,
    /// View of the acquired swapchain image
    pub swapchain_view: vk::ImageView,
    /// Multisampled color target; `None` renders straight into the swapchain
    pub color_target: Option<&'a Image>,
    /// Depth target of the color pass
    pub depth_target: &'a Image,
    /// Shadow depth map
    pub shadow_map: &'a Image,
    /// Swapchain extent
    pub extent: vk::Extent2D,
}

/// Pipelines and descriptor sets the commands refer to
pub struct FrameBindings<'a> {
    /// Depth-only pipeline
    pub shadow_pipeline: &'a GraphicsPipeline,
    /// Color pass pipeline
    pub scene_pipeline: &'a GraphicsPipeline,
    /// The slot's sets and buffers
    pub frame: &'a FrameResources,
    /// Texture array set
    pub texture_set: vk::DescriptorSet,
    /// Uploaded meshes
    pub meshes: &'a HashMap<MeshId, GpuMesh>,
}

/// Records a command list into one command buffer
pub struct Replay<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
    targets: FrameTargets<'a>,
    bindings: FrameBindings<'a>,
}

impl<'a> Replay<'a> {
    /// Prepare to record into `command_buffer`, which must be recording
    pub fn new(device: &'a Device, command_buffer: vk::CommandBuffer, targets: FrameTargets<'a>, bindings: FrameBindings<'a>) -> Self {
        Self {
            device,
            command_buffer,
            targets,
            bindings,
        }
    }

    /// Record every command in order
    pub fn record(&self, commands: &CommandList) -> BackendResult<()> {
        for command in commands {
            self.record_one(command)?;
        }
        Ok(())
    }

    fn record_one(&self, command: &RenderCommand) -> BackendResult<()> {
        let cmd = self.command_buffer;
        match *command {
            RenderCommand::TransitionShadowMap(transition) => self.transition_shadow_map(transition),
            RenderCommand::TransitionSwapchain(transition) => self.transition_swapchain(transition),
            RenderCommand::BeginShadowPass { size } => self.begin_shadow_pass(size),
            RenderCommand::BeginColorPass { clear_color } => self.begin_color_pass(clear_color),
            RenderCommand::EndPass => unsafe { self.device.cmd_end_rendering(cmd) },
            RenderCommand::BindPipeline(kind) => unsafe {
                self.device
                    .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline(kind).handle());
            },
            RenderCommand::SetCullMode(mode) => unsafe {
                self.device.cmd_set_cull_mode(cmd, cull_flags(mode));
            },
            RenderCommand::SetDepthBias { constant, slope } => unsafe {
                self.device.cmd_set_depth_bias(cmd, constant, 0.0, slope);
            },
            RenderCommand::BindSceneDescriptors => unsafe {
                let layout = self.bindings.scene_pipeline.layout();
                self.device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    0,
                    &[self.bindings.frame.scene_set()],
                    &[],
                );
                self.device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    2,
                    &[self.bindings.texture_set],
                    &[],
                );
            },
            RenderCommand::BindMesh(id) => {
                let mesh = self.bindings.meshes.get(&id).ok_or(BackendError::UnknownMesh(id))?;
                unsafe {
                    self.device.cmd_bind_vertex_buffers(cmd, 0, &[mesh.vertex_buffer()], &[0]);
                    self.device
                        .cmd_bind_index_buffer(cmd, mesh.index_buffer(), 0, vk::IndexType::UINT32);
                }
            }
            RenderCommand::BindNodeUniforms {
                pass, dynamic_offset, ..
            } => {
                let (layout, first_set, set) = match pass {
                    PassKind::Shadow => (self.bindings.shadow_pipeline.layout(), 0, self.bindings.frame.shadow_set()),
                    PassKind::Color => (self.bindings.scene_pipeline.layout(), 1, self.bindings.frame.model_set()),
                };
                unsafe {
                    self.device.cmd_bind_descriptor_sets(
                        cmd,
                        vk::PipelineBindPoint::GRAPHICS,
                        layout,
                        first_set,
                        &[set],
                        &[dynamic_offset],
                    );
                }
            }
            RenderCommand::DrawIndexed { index_count } => unsafe {
                self.device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0);
            },
        }
        Ok(())
    }

    fn pipeline(&self, kind: PipelineKind) -> &GraphicsPipeline {
        match kind {
            PipelineKind::Shadow => self.bindings.shadow_pipeline,
            PipelineKind::Scene => self.bindings.scene_pipeline,
        }
    }

    fn transition_shadow_map(&self, transition: ShadowMapTransition) {
        let image = self.targets.shadow_map.handle();
        let fragment_read = Access::new(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ);
        let depth_write = Access::new(DEPTH_TESTS, DEPTH_ACCESS);

        let barrier = match transition {
            // The previous frame's color pass may still be sampling the map
            ShadowMapTransition::UndefinedToAttachment => layout_barrier(
                image,
                vk::ImageAspectFlags::DEPTH,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                Access::new(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::NONE),
                depth_write,
            ),
            ShadowMapTransition::AttachmentToShaderRead => layout_barrier(
                image,
                vk::ImageAspectFlags::DEPTH,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                Access::new(
                    vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                ),
                fragment_read,
            ),
            ShadowMapTransition::ShaderReadToAttachment => layout_barrier(
                image,
                vk::ImageAspectFlags::DEPTH,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                fragment_read,
                depth_write,
            ),
        };
        cmd_barriers(self.device, self.command_buffer, &[barrier]);
    }

    fn transition_swapchain(&self, transition: SwapchainTransition) {
        let color_output = vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT;
        let color_write = Access::new(color_output, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);

        match transition {
            SwapchainTransition::ToColorAttachment => {
                // The source stage matches the acquire semaphore's wait stage
                let mut barriers = vec![layout_barrier(
                    self.targets.swapchain_image,
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    Access::new(color_output, vk::AccessFlags2::NONE),
                    color_write,
                )];
                if let Some(target) = self.targets.color_target {
                    barriers.push(layout_barrier(
                        target.handle(),
                        vk::ImageAspectFlags::COLOR,
                        vk::ImageLayout::UNDEFINED,
                        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                        color_write,
                        color_write,
                    ));
                }
                barriers.push(layout_barrier(
                    self.targets.depth_target.handle(),
                    vk::ImageAspectFlags::DEPTH,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                    Access::new(DEPTH_TESTS, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE),
                    Access::new(DEPTH_TESTS, DEPTH_ACCESS),
                ));
                cmd_barriers(self.device, self.command_buffer, &barriers);
            }
            SwapchainTransition::ToPresent => {
                let barrier = layout_barrier(
                    self.targets.swapchain_image,
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::ImageLayout::PRESENT_SRC_KHR,
                    color_write,
                    Access::new(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE),
                );
                cmd_barriers(self.device, self.command_buffer, &[barrier]);
            }
        }
    }

    fn begin_shadow_pass(&self, size: u32) {
        let extent = vk::Extent2D { width: size, height: size };
        let depth = vk::RenderingAttachmentInfo::builder()
            .image_view(self.targets.shadow_map.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(depth_clear());
        let rendering = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .depth_attachment(&depth);

        unsafe { self.device.cmd_begin_rendering(self.command_buffer, &rendering) };
        self.set_viewport(extent);
    }

    fn begin_color_pass(&self, clear_color: [f32; 4]) {
        let extent = self.targets.extent;
        let clear = vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        };

        let color = match self.targets.color_target {
            Some(target) => vk::RenderingAttachmentInfo::builder()
                .image_view(target.view())
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .clear_value(clear)
                .resolve_mode(vk::ResolveModeFlags::AVERAGE)
                .resolve_image_view(self.targets.swapchain_view)
                .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .build(),
            None => vk::RenderingAttachmentInfo::builder()
                .image_view(self.targets.swapchain_view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(clear)
                .build(),
        };
        let depth = vk::RenderingAttachmentInfo::builder()
            .image_view(self.targets.depth_target.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(depth_clear());

        let color_attachments = [color];
        let rendering = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth);

        unsafe { self.device.cmd_begin_rendering(self.command_buffer, &rendering) };
        self.set_viewport(extent);
    }

    fn set_viewport(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }
}

fn depth_clear() -> vk::ClearValue {
    vk::ClearValue {
        depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
    }
}

/// Vulkan cull flags for a [`CullMode`]
pub fn cull_flags(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_flags() {
        assert_eq!(cull_flags(CullMode::None), vk::CullModeFlags::NONE);
        assert_eq!(cull_flags(CullMode::Front), vk::CullModeFlags::FRONT);
        assert_eq!(cull_flags(CullMode::Back), vk::CullModeFlags::BACK);
    }

    #[test]
    fn test_depth_stage_masks_cover_both_test_stages() {
        assert!(DEPTH_TESTS.contains(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS));
        assert!(DEPTH_TESTS.contains(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS));
        assert!(DEPTH_ACCESS.contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE));
    }
}
