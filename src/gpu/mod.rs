//! Device core: resource records, the device context and its command
//! lists, and the backend boundary they sit on.

pub mod arena;
pub mod backend;
pub mod cmd;
pub mod device;
pub mod error;
pub mod frame;
pub mod framebuffer;
pub mod pipelines;
pub mod resources;
pub mod structs;
pub mod variables;

pub use arena::{Resource, ResourceKind};
pub use backend::{Backend, BackendId, FenceId, NullBackend, NullProbe, SubmissionStats};
pub use cmd::{CommandListId, ComputeList, CopyRegion, DrawList, Frame, FrameEnded, FrameStart};
pub use device::{ContextInfo, Device, DeviceFlavor, DEFAULT_FRAME_DELAY, MAX_FRAME_DELAY};
pub use error::{GPUError, Result};
pub use framebuffer::{AttachmentFormat, Framebuffer, FramebufferFormat, FramebufferFormatInfo, FramebufferPass};
pub use pipelines::{
    ComputePipeline, RenderPipeline, RenderPipelineInfo, Shader, ShaderBinding, ShaderInfo, ShaderLayout,
};
pub use resources::{Buffer, IndexArray, Sampler, Texture, VertexArray, VertexFormat};
pub use structs::*;
pub use variables::{BindingType, UniformBinding, UniformSet, Variable, VariableLevel, VARIABLE_LEVELS};
