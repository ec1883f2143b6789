//! Shader modules and the two graphics pipelines
//!
//! Both pipelines render with dynamic rendering, so they are created against
//! attachment formats rather than a render pass. Viewport, scissor and cull
//! mode are dynamic; the shadow pipeline also takes its depth bias
//! dynamically.

use std::fs::File;
use std::path::Path;

use ash::{vk, Device};

use super::descriptors::DescriptorLayouts;
use super::image::DEPTH_FORMAT;
use super::vertex_layout;
use super::{VulkanError, VulkanResult};

const ENTRY_POINT: &std::ffi::CStr = c"main";

/// Shader module with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Load a SPIR-V file
    pub fn from_file(device: Device, path: &Path) -> VulkanResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to open shader {}: {}", path.display(), e))
        })?;
        let code = ash::util::read_spv(&mut file).map_err(|e| {
            VulkanError::InitializationFailed(format!("Invalid SPIR-V in {}: {}", path.display(), e))
        })?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self { device, module })
    }

    fn stage(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Graphics pipeline and its layout
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Depth-only pipeline rendering into the shadow map.
    ///
    /// Reads positions only and uses the single dynamic-offset set holding
    /// each node's light-space matrix.
    pub fn shadow(device: &Device, shader_dir: &Path, layouts: &DescriptorLayouts) -> VulkanResult<Self> {
        let vertex = ShaderModule::from_file(device.clone(), &shader_dir.join("shadow.vert.spv"))?;
        let fragment = ShaderModule::from_file(device.clone(), &shader_dir.join("shadow.frag.spv"))?;

        let bindings = [vertex_layout::binding_description()];
        let attributes = vertex_layout::position_attribute();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let set_layouts = [layouts.shadow.handle()];
        let mut rendering = vk::PipelineRenderingCreateInfo::builder().depth_attachment_format(DEPTH_FORMAT);

        Self::build(
            device,
            &[vertex.stage(vk::ShaderStageFlags::VERTEX), fragment.stage(vk::ShaderStageFlags::FRAGMENT)],
            &vertex_input,
            &set_layouts,
            &mut rendering,
            vk::SampleCountFlags::TYPE_1,
            true,
            &[],
        )
    }

    /// Lit, textured, shadowed pipeline for the color pass
    pub fn scene(
        device: &Device,
        shader_dir: &Path,
        layouts: &DescriptorLayouts,
        color_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        let vertex = ShaderModule::from_file(device.clone(), &shader_dir.join("scene.vert.spv"))?;
        let fragment = ShaderModule::from_file(device.clone(), &shader_dir.join("scene.frag.spv"))?;

        let bindings = [vertex_layout::binding_description()];
        let attributes = vertex_layout::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let set_layouts = [
            layouts.scene.handle(),
            layouts.model.handle(),
            layouts.textures.handle(),
        ];
        let color_formats = [color_format];
        let mut rendering = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(DEPTH_FORMAT);

        let blend = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];

        Self::build(
            device,
            &[vertex.stage(vk::ShaderStageFlags::VERTEX), fragment.stage(vk::ShaderStageFlags::FRAGMENT)],
            &vertex_input,
            &set_layouts,
            &mut rendering,
            samples,
            false,
            &blend,
        )
    }

    fn build(
        device: &Device,
        stages: &[vk::PipelineShaderStageCreateInfo],
        vertex_input: &vk::PipelineVertexInputStateCreateInfo,
        set_layouts: &[vk::DescriptorSetLayout],
        rendering: &mut vk::PipelineRenderingCreateInfo,
        samples: vk::SampleCountFlags,
        depth_bias: bool,
        blend_attachments: &[vk::PipelineColorBlendAttachmentState],
    ) -> VulkanResult<Self> {
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(depth_bias);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(samples);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(blend_attachments);

        let mut dynamic_states = vec![
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::CULL_MODE,
        ];
        if depth_bias {
            dynamic_states.push(vk::DynamicState::DEPTH_BIAS);
        }
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None).map_err(VulkanError::Api)? };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(rendering);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_, result)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(result));
            }
        };
        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(VulkanError::InvalidOperation {
                reason: "Driver returned no pipeline".to_string(),
            });
        };

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
        })
    }

    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
