//! [`RenderBackend`] implementation on Vulkan
//!
//! Frame slots map one-to-one onto swapchain images: the slot for image `i`
//! owns the command buffer, fence, release semaphore and uniform buffers used
//! to render into image `i`. Acquire semaphores cannot be tied to an image
//! before the image index is known, so they come from a [`SemaphorePool`] and
//! are swapped into the slot after acquisition.

use std::collections::HashMap;

use ash::vk;

use crate::assets::{Mesh, Texture};
use crate::core::config::EngineConfig;
use crate::render::backend::{AcquireOutcome, BackendError, BackendResult, PresentOutcome, RenderBackend};
use crate::render::commands::CommandList;
use crate::render::resources::MeshId;
use crate::render::uniforms::FrameUniforms;

use super::buffer::GpuMesh;
use super::commands::CommandPool;
use super::context::VulkanContext;
use super::descriptors::{DescriptorLayouts, DescriptorPool, TextureArray};
use super::image::{Image, Sampler};
use super::per_frame::{FrameResources, UniformLayout};
use super::pipeline::GraphicsPipeline;
use super::replay::{FrameBindings, FrameTargets, Replay};
use super::swapchain::{SurfaceStatus, Swapchain};
use super::sync::{Semaphore, SemaphorePool};
use super::window::Window;
use super::{VulkanError, VulkanResult};

/// Size-dependent attachments of the color pass
struct RenderTargets {
    color: Option<Image>,
    depth: Image,
}

impl RenderTargets {
    fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        let color = if samples == vk::SampleCountFlags::TYPE_1 {
            None
        } else {
            Some(Image::color_target(context, extent, format, samples)?)
        };
        Ok(Self {
            color,
            depth: Image::depth_target(context, extent, samples)?,
        })
    }
}

/// Vulkan renderer state
///
/// Field order is drop order: everything created from the device goes
/// before the swapchain, and the context goes last.
pub struct VulkanBackend {
    frames: Vec<FrameResources>,
    semaphores: SemaphorePool,
    retired_semaphores: Vec<Semaphore>,
    targets: RenderTargets,
    frame_descriptors: DescriptorPool,
    textures: TextureArray,
    meshes: HashMap<MeshId, GpuMesh>,
    shadow_map: Image,
    shadow_sampler: Sampler,
    shadow_pipeline: GraphicsPipeline,
    scene_pipeline: GraphicsPipeline,
    layouts: DescriptorLayouts,
    upload_pool: CommandPool,
    swapchain: Swapchain,
    uniform_layout: UniformLayout,
    samples: vk::SampleCountFlags,
    shader_dir: std::path::PathBuf,
    requested_extent: vk::Extent2D,
    out_of_date: bool,
    unsubmitted_slot: Option<usize>,
    context: VulkanContext,
}

impl VulkanBackend {
    /// Create the device, swapchain, pipelines and one frame slot per
    /// swapchain image
    pub fn new(window: &Window, config: &EngineConfig) -> BackendResult<Self> {
        let renderer = &config.renderer;
        let context = VulkanContext::new(window, &renderer.application_name, renderer.validation_enabled())?;
        let device = context.device().clone();

        let (width, height) = window.framebuffer_size();
        let requested_extent = vk::Extent2D { width, height };
        let swapchain = Swapchain::new(&context, requested_extent, None)?;

        let samples = context.physical_device().msaa_samples(renderer.max_msaa_samples);
        let layouts = DescriptorLayouts::new(&device, renderer.max_textures)?;
        let shadow_pipeline = GraphicsPipeline::shadow(&device, &renderer.shader_dir, &layouts)?;
        let scene_pipeline =
            GraphicsPipeline::scene(&device, &renderer.shader_dir, &layouts, swapchain.format(), samples)?;

        let shadow_map = Image::shadow_map(&context, config.shadow.map_size)?;
        let shadow_sampler = Sampler::shadow(&context)?;
        let textures = TextureArray::new(device.clone(), &layouts, Sampler::texture(&context)?)?;
        let upload_pool = CommandPool::new(device.clone(), context.graphics_family(), true)?;

        let uniform_layout = UniformLayout::new(
            context.physical_device().min_uniform_alignment(),
            renderer.max_nodes as usize,
        );
        let frame_descriptors = DescriptorPool::for_frames(device.clone(), swapchain.image_count() as u32)?;
        let frames = create_frames(
            &context,
            &frame_descriptors,
            &layouts,
            uniform_layout,
            &shadow_map,
            &shadow_sampler,
            swapchain.image_count(),
        )?;
        let targets = RenderTargets::new(&context, swapchain.extent(), swapchain.format(), samples)?;

        log::info!(
            "Vulkan backend ready on {} ({} frame slots, {:?} MSAA)",
            context.physical_device().name(),
            frames.len(),
            samples
        );

        Ok(Self {
            frames,
            semaphores: SemaphorePool::new(device),
            retired_semaphores: Vec::new(),
            targets,
            frame_descriptors,
            textures,
            meshes: HashMap::new(),
            shadow_map,
            shadow_sampler,
            shadow_pipeline,
            scene_pipeline,
            layouts,
            upload_pool,
            swapchain,
            uniform_layout,
            samples,
            shader_dir: renderer.shader_dir.clone(),
            requested_extent,
            out_of_date: false,
            unsubmitted_slot: None,
            context,
        })
    }

    /// Record the window's new framebuffer size; the next rebuild uses it
    pub fn set_framebuffer_size(&mut self, width: u32, height: u32) {
        let extent = vk::Extent2D { width, height };
        if extent != self.requested_extent {
            self.requested_extent = extent;
            self.out_of_date = true;
        }
    }

    fn frame(&self, slot: usize) -> BackendResult<&FrameResources> {
        self.frames.get(slot).ok_or(BackendError::InvalidSlot {
            slot,
            count: self.frames.len(),
        })
    }

    /// A slot acquired but never submitted still holds a signaled acquire
    /// semaphore that no submission will wait on
    fn retire_unsubmitted(&mut self) {
        if let Some(slot) = self.unsubmitted_slot.take() {
            if let Some(semaphore) = self.frames.get_mut(slot).and_then(FrameResources::take_acquire_semaphore) {
                log::debug!("Retiring acquire semaphore of unsubmitted slot {}", slot);
                self.retired_semaphores.push(semaphore);
            }
        }
    }
}

fn create_frames(
    context: &VulkanContext,
    pool: &DescriptorPool,
    layouts: &DescriptorLayouts,
    layout: UniformLayout,
    shadow_map: &Image,
    shadow_sampler: &Sampler,
    count: usize,
) -> VulkanResult<Vec<FrameResources>> {
    (0..count)
        .map(|_| FrameResources::new(context, pool, layouts, layout, shadow_map.view(), shadow_sampler.handle()))
        .collect()
}

impl RenderBackend for VulkanBackend {
    fn frame_slot_count(&self) -> usize {
        self.frames.len()
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.context.physical_device().min_uniform_alignment()
    }

    fn surface_extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }

    fn upload_mesh(&mut self, id: MeshId, mesh: &Mesh) -> BackendResult<()> {
        let gpu_mesh = GpuMesh::new(&self.context, mesh.vertex_bytes(), mesh.index_bytes())?;
        if self.meshes.contains_key(&id) {
            self.context.wait_idle()?;
        }
        self.meshes.insert(id, gpu_mesh);
        log::trace!("Uploaded mesh {:?} ({} indices)", id, mesh.index_count());
        Ok(())
    }

    fn upload_texture(&mut self, slot: u32, texture: &Texture) -> BackendResult<()> {
        let image = Image::texture(&self.context, &self.upload_pool, texture)?;
        self.textures.insert(slot, image)?;
        log::trace!("Uploaded {}x{} texture to slot {}", texture.width(), texture.height(), slot);
        Ok(())
    }

    fn acquire_next_image(&mut self) -> BackendResult<AcquireOutcome> {
        self.retire_unsubmitted();

        let semaphore = self.semaphores.take()?;
        match self.swapchain.acquire_next_image(semaphore.handle())? {
            SurfaceStatus::Optimal(index) => {
                let slot = index as usize;
                let count = self.frames.len();
                let frame = self
                    .frames
                    .get_mut(slot)
                    .ok_or(BackendError::InvalidSlot { slot, count })?;
                frame.wait()?;
                // The slot's fence has signaled, so its previous acquire
                // semaphore has been waited on and can be reused
                if let Some(previous) = frame.swap_acquire_semaphore(semaphore) {
                    self.semaphores.recycle(previous);
                }
                self.unsubmitted_slot = Some(slot);
                Ok(AcquireOutcome::Ready(slot))
            }
            SurfaceStatus::Suboptimal(_) => {
                // Signaled with nothing to wait on it; dropped after the rebuild's idle wait
                self.retired_semaphores.push(semaphore);
                self.out_of_date = true;
                Ok(AcquireOutcome::Stale)
            }
            SurfaceStatus::OutOfDate => {
                self.semaphores.recycle(semaphore);
                self.out_of_date = true;
                Ok(AcquireOutcome::Stale)
            }
        }
    }

    fn rebuild_surface(&mut self) -> BackendResult<bool> {
        let requested = self.requested_extent;
        if requested.width == 0 || requested.height == 0 {
            log::debug!("Surface has zero area, not rebuilding");
            return Ok(false);
        }
        if !self.out_of_date && requested == self.swapchain.extent() {
            return Ok(false);
        }

        self.context.wait_idle()?;
        self.unsubmitted_slot = None;

        let swapchain = Swapchain::new(&self.context, requested, Some(&self.swapchain))?;
        let format_changed = swapchain.format() != self.swapchain.format();
        self.frames.clear();
        self.swapchain = swapchain;

        let device = self.context.device().clone();
        self.frame_descriptors = DescriptorPool::for_frames(device.clone(), self.swapchain.image_count() as u32)?;
        self.frames = create_frames(
            &self.context,
            &self.frame_descriptors,
            &self.layouts,
            self.uniform_layout,
            &self.shadow_map,
            &self.shadow_sampler,
            self.swapchain.image_count(),
        )?;
        self.targets = RenderTargets::new(
            &self.context,
            self.swapchain.extent(),
            self.swapchain.format(),
            self.samples,
        )?;

        if format_changed {
            log::info!("Swapchain format changed to {:?}, recreating scene pipeline", self.swapchain.format());
            self.scene_pipeline = GraphicsPipeline::scene(
                &device,
                &self.shader_dir,
                &self.layouts,
                self.swapchain.format(),
                self.samples,
            )?;
        }

        self.retired_semaphores.clear();
        self.out_of_date = false;
        Ok(true)
    }

    fn write_uniforms(&mut self, slot: usize, uniforms: &FrameUniforms) -> BackendResult<()> {
        let frame = self.frame(slot)?;
        let capacity = frame.layout().capacity;
        if uniforms.node_count() > capacity {
            return Err(BackendError::UniformCapacityExceeded {
                nodes: uniforms.node_count(),
                capacity,
            });
        }
        frame.write_uniforms(uniforms)?;
        Ok(())
    }

    fn submit(&mut self, slot: usize, commands: &CommandList) -> BackendResult<()> {
        let frame = self.frame(slot)?;
        let device = self.context.device();

        let swapchain_image = self
            .swapchain
            .image(slot)
            .ok_or(VulkanError::ResourceNotFound { id: slot as u64 })?;
        let swapchain_view = self
            .swapchain
            .image_view(slot)
            .ok_or(VulkanError::ResourceNotFound { id: slot as u64 })?;

        let command_buffer = frame.begin(device)?;
        let replay = Replay::new(
            device,
            command_buffer,
            FrameTargets {
                swapchain_image,
                swapchain_view,
                color_target: self.targets.color.as_ref(),
                depth_target: &self.targets.depth,
                shadow_map: &self.shadow_map,
                extent: self.swapchain.extent(),
            },
            FrameBindings {
                shadow_pipeline: &self.shadow_pipeline,
                scene_pipeline: &self.scene_pipeline,
                frame,
                texture_set: self.textures.set(),
                meshes: &self.meshes,
            },
        );
        replay.record(commands)?;
        frame.submit(device, self.context.graphics_queue())?;

        self.unsubmitted_slot = None;
        Ok(())
    }

    fn present(&mut self, slot: usize) -> BackendResult<PresentOutcome> {
        let wait = self.frame(slot)?.render_finished();
        match self
            .swapchain
            .present(self.context.present_queue(), slot as u32, wait)?
        {
            SurfaceStatus::Optimal(()) => Ok(PresentOutcome::Presented),
            SurfaceStatus::Suboptimal(()) | SurfaceStatus::OutOfDate => {
                self.out_of_date = true;
                Ok(PresentOutcome::Stale)
            }
        }
    }

    fn wait_queue_idle(&mut self) -> BackendResult<()> {
        unsafe {
            self.context
                .device()
                .queue_wait_idle(self.context.graphics_queue())
                .map_err(VulkanError::Api)?;
        }
        Ok(())
    }

    fn wait_device_idle(&self) -> BackendResult<()> {
        self.context.wait_idle()?;
        Ok(())
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::error!("Failed to wait for device idle during shutdown: {}", e);
        }
    }
}
