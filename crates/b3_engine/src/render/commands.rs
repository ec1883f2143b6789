//! Rendering command pattern
//!
//! The frame orchestrator records one [`CommandList`] per frame in a
//! backend-neutral form, and the backend translates it to API calls when the
//! frame is submitted. Keeping the list as plain data means the ordering of
//! passes, barriers and draws can be checked without a GPU.

use super::resources::MeshId;

/// Layout changes of the shadow depth image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMapTransition {
    /// Discard previous contents and prepare for depth writes
    UndefinedToAttachment,
    /// Depth writes finished, make the map readable by the fragment shader
    AttachmentToShaderRead,
    /// Sampling finished, hand the map back for next frame's depth writes
    ShaderReadToAttachment,
}

/// Layout changes of the color targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainTransition {
    /// Prepare the multisampled target and the swapchain image for rendering
    ToColorAttachment,
    /// Rendering finished, prepare the swapchain image for presentation
    ToPresent,
}

/// Graphics pipelines the engine draws with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Depth-only pass from the light
    Shadow,
    /// Lit, textured, shadowed color pass
    Scene,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// Cull nothing
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Render pass a per-node binding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Shadow map pass
    Shadow,
    /// Color pass
    Color,
}

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Shadow image barrier
    TransitionShadowMap(ShadowMapTransition),
    /// Color target barrier
    TransitionSwapchain(SwapchainTransition),
    /// Begin depth-only rendering into the `size × size` shadow map
    BeginShadowPass {
        /// Shadow map edge length in texels
        size: u32,
    },
    /// Begin color rendering at the surface resolution
    BeginColorPass {
        /// Clear color for the color target
        clear_color: [f32; 4],
    },
    /// End the current pass
    EndPass,
    /// Bind a graphics pipeline
    BindPipeline(PipelineKind),
    /// Set the dynamic cull mode
    SetCullMode(CullMode),
    /// Set the dynamic depth bias
    SetDepthBias {
        /// Constant factor
        constant: f32,
        /// Slope-scaled factor
        slope: f32,
    },
    /// Bind the per-frame scene set and the texture array
    BindSceneDescriptors,
    /// Bind a mesh's vertex and index buffers
    BindMesh(MeshId),
    /// Bind one node's per-node uniform block
    BindNodeUniforms {
        /// Pass the block belongs to
        pass: PassKind,
        /// Index of the node in scene order
        node_index: usize,
        /// Byte offset of the block in the pass's uniform buffer
        dynamic_offset: u32,
    },
    /// Indexed draw of the bound mesh
    DrawIndexed {
        /// Number of indices
        index_count: u32,
    },
}

/// Ordered commands for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<RenderCommand>,
}

impl CommandList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    /// Recorded commands in order
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Iterate over the commands
    pub fn iter(&self) -> std::slice::Iter<'_, RenderCommand> {
        self.commands.iter()
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Nodes drawn in `pass`, in draw order
    pub fn drawn_nodes(&self, pass: PassKind) -> Vec<usize> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RenderCommand::BindNodeUniforms { pass: p, node_index, .. } if *p == pass => Some(*node_index),
                _ => None,
            })
            .collect()
    }

    /// Position of the first command equal to `command`
    pub fn position(&self, command: &RenderCommand) -> Option<usize> {
        self.commands.iter().position(|c| c == command)
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a RenderCommand;
    type IntoIter = std::slice::Iter<'a, RenderCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
