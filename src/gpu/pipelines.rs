use super::backend::BackendId;
use super::error::{invalid, Result};
use super::framebuffer::{FramebufferFormat, FramebufferFormatInfo};
use super::resources::VertexFormat;
use super::structs::{DynamicStates, RenderState, ShaderStages};
use super::variables::{BindingType, VariableLevel, VARIABLE_LEVELS};
use crate::utils::Handle;

/// One binding a shader expects inside a uniform set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderBinding {
    pub binding: u32,
    pub ty: BindingType,
    /// Array length; 1 for a single resource.
    pub count: u32,
    /// The shader may write through this binding.
    pub writable: bool,
}

impl ShaderBinding {
    pub fn new(binding: u32, ty: BindingType) -> Self {
        Self {
            binding,
            ty,
            count: 1,
            writable: false,
        }
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }
}

/// Interface of a compiled shader as seen by the device.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ShaderLayout {
    pub stages: ShaderStages,
    /// Expected uniform-set layout per variable level.
    pub levels: [Option<Vec<ShaderBinding>>; VARIABLE_LEVELS],
    /// Bit `n` set when vertex input location `n` is consumed.
    pub vertex_input_mask: u64,
    pub push_constant_size: u32,
}

impl ShaderLayout {
    pub fn new(stages: ShaderStages) -> Self {
        Self {
            stages,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: VariableLevel, bindings: Vec<ShaderBinding>) -> Self {
        self.levels[level as usize] = Some(bindings);
        self
    }

    pub fn with_vertex_inputs(mut self, mask: u64) -> Self {
        self.vertex_input_mask = mask;
        self
    }

    pub fn with_push_constants(mut self, size: u32) -> Self {
        self.push_constant_size = size;
        self
    }

    pub fn level(&self, level: VariableLevel) -> Option<&[ShaderBinding]> {
        self.levels[level as usize].as_deref()
    }

    /// Levels the shader needs a uniform set for.
    pub fn expected_levels(&self) -> impl Iterator<Item = VariableLevel> + '_ {
        VariableLevel::ALL
            .into_iter()
            .filter(move |l| self.levels[*l as usize].is_some())
    }

    pub(crate) fn validate(&self, max_push_constants: u64) -> Result<()> {
        if self.stages.is_empty() {
            return Err(invalid("shader has no stages"));
        }
        if self.stages.contains(ShaderStages::COMPUTE) && self.stages != ShaderStages::COMPUTE {
            return Err(invalid("compute cannot be mixed with graphics stages"));
        }
        if self.push_constant_size % 4 != 0 || self.push_constant_size as u64 > max_push_constants {
            return Err(invalid(format!("push constant size {}", self.push_constant_size)));
        }
        for bindings in self.levels.iter().flatten() {
            for (n, b) in bindings.iter().enumerate() {
                if b.count == 0 {
                    return Err(invalid(format!("binding {} has zero count", b.binding)));
                }
                if bindings[..n].iter().any(|o| o.binding == b.binding) {
                    return Err(invalid(format!("binding {} declared twice", b.binding)));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderInfo<'a> {
    pub debug_name: &'a str,
    pub layout: ShaderLayout,
    /// Backend-specific compiled code.
    pub bytecode: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct Shader {
    pub(crate) raw: BackendId,
    pub name: String,
    pub layout: ShaderLayout,
}

#[derive(Debug, Clone)]
pub struct RenderPipelineInfo<'a> {
    pub debug_name: &'a str,
    pub shader: Handle<Shader>,
    pub framebuffer_format: Handle<FramebufferFormat>,
    pub vertex_format: Option<Handle<VertexFormat>>,
    /// Pass of the framebuffer format this pipeline draws in.
    pub pass: u32,
    pub state: RenderState,
}

impl<'a> Default for RenderPipelineInfo<'a> {
    fn default() -> Self {
        Self {
            debug_name: "",
            shader: Handle::default(),
            framebuffer_format: Handle::default(),
            vertex_format: None,
            pass: 0,
            state: RenderState::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderPipeline {
    pub(crate) raw: BackendId,
    pub name: String,
    pub layout: ShaderLayout,
    pub framebuffer_format: FramebufferFormatInfo,
    pub vertex_format: Option<VertexFormat>,
    pub pass: u32,
    pub dynamic_states: DynamicStates,
}

impl RenderPipeline {
    /// True when the pipeline may draw in `pass` of a framebuffer built
    /// from `format`.
    pub fn is_compatible(&self, format: &FramebufferFormat, pass: u32) -> bool {
        self.pass == pass && self.framebuffer_format == format.info
    }
}

#[derive(Debug, Clone)]
pub struct ComputePipeline {
    pub(crate) raw: BackendId,
    pub name: String,
    pub layout: ShaderLayout,
}

pub(crate) fn validate_render_pipeline(
    layout: &ShaderLayout,
    format: &FramebufferFormat,
    vertex: Option<&VertexFormat>,
    pass: u32,
    state: &RenderState,
) -> Result<()> {
    if !layout.stages.contains(ShaderStages::VERTEX) || layout.stages.contains(ShaderStages::COMPUTE) {
        return Err(invalid("render pipelines need a vertex stage"));
    }
    let pass_info = format
        .pass(pass)
        .ok_or_else(|| invalid(format!("pass {} out of range", pass)))?;
    if !state.blend.is_empty() && state.blend.len() != pass_info.color_attachments.len() {
        return Err(invalid(format!(
            "{} blend attachments for {} color attachments",
            state.blend.len(),
            pass_info.color_attachments.len()
        )));
    }
    if state.multisample.samples != format.texture_samples(pass)? {
        return Err(invalid("multisample count differs from the pass"));
    }
    let provided = vertex.map(VertexFormat::location_mask).unwrap_or(0);
    if layout.vertex_input_mask & !provided != 0 {
        return Err(invalid(format!(
            "vertex inputs {:#x} not provided by the vertex format",
            layout.vertex_input_mask & !provided
        )));
    }
    Ok(())
}

pub(crate) fn validate_compute_pipeline(layout: &ShaderLayout) -> Result<()> {
    if layout.stages != ShaderStages::COMPUTE {
        return Err(invalid("compute pipelines need a compute-only shader"));
    }
    Ok(())
}
