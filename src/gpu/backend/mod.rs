//! Boundary between the device core and a graphics API.
//!
//! The core owns every bookkeeping structure: handles, hazard state, list
//! state. A [`Backend`] only creates and destroys native objects, replays
//! recorded [`CommandEncoder`] streams and reports fence completion.

use std::collections::HashMap;

use super::arena::ResourceKind;
use super::error::Result;
use super::framebuffer::FramebufferFormatInfo;
use super::pipelines::ShaderInfo;
use super::resources::{Buffer, IndexArray, VertexArray};
use super::structs::{
    AdapterInfo, BufferInfo, Filter, Format, IndexType, Limit, MemoryType, RenderState, SamplerInfo,
    ScreenInfo, TextureInfo, TextureSlice, TextureUsage, TextureView, VertexAttribute,
};
use super::variables::VariableLevel;
use crate::driver::command::CommandEncoder;
use crate::utils::{Handle, RawHandle};

pub mod null;

pub use null::{NullBackend, NullProbe, SubmissionStats};

/// Native object id handed out by a backend.
pub type BackendId = u64;
/// Completion token of one submission.
pub type FenceId = u64;

pub struct SharedTextureDesc {
    pub view: TextureView,
    pub slice: Option<TextureSlice>,
}

pub struct FramebufferDesc<'a> {
    pub render_pass: BackendId,
    pub textures: &'a [BackendId],
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

pub struct RenderPipelineDesc<'a> {
    pub shader: BackendId,
    pub render_pass: BackendId,
    pub pass: u32,
    pub vertex_attributes: &'a [VertexAttribute],
    pub state: &'a RenderState,
}

/// One bound slot of a uniform set, resolved to native objects.
pub struct UniformSetEntry {
    pub binding: u32,
    pub objects: Vec<BackendId>,
}

/// Native objects behind every handle a submission refers to.
///
/// Recorded commands name arena handles; by the time a backend replays
/// them some handles may already be released on the core side, so the
/// device snapshots the translation while recording.
#[derive(Default, Debug, Clone)]
pub struct ObjectTable {
    objects: HashMap<RawHandle, BackendId>,
    vertex_arrays: HashMap<Handle<VertexArray>, Vec<(BackendId, u32)>>,
    index_arrays: HashMap<Handle<IndexArray>, (BackendId, IndexType, u32)>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raw: RawHandle, id: BackendId) {
        self.objects.insert(raw, id);
    }

    pub fn get(&self, raw: RawHandle) -> Option<BackendId> {
        self.objects.get(&raw).copied()
    }

    pub fn buffer(&self, buffer: Handle<Buffer>) -> Option<BackendId> {
        self.get(buffer.raw())
    }

    pub fn insert_vertex_array(&mut self, array: Handle<VertexArray>, buffers: Vec<(BackendId, u32)>) {
        self.vertex_arrays.insert(array, buffers);
    }

    /// Buffers and byte offsets behind a vertex array.
    pub fn vertex_array(&self, array: Handle<VertexArray>) -> Option<&[(BackendId, u32)]> {
        self.vertex_arrays.get(&array).map(Vec::as_slice)
    }

    pub fn insert_index_array(&mut self, array: Handle<IndexArray>, buffer: BackendId, ty: IndexType, first: u32) {
        self.index_arrays.insert(array, (buffer, ty, first));
    }

    pub fn index_array(&self, array: Handle<IndexArray>) -> Option<(BackendId, IndexType, u32)> {
        self.index_arrays.get(&array).copied()
    }

    pub fn extend(&mut self, other: ObjectTable) {
        self.objects.extend(other.objects);
        self.vertex_arrays.extend(other.vertex_arrays);
        self.index_arrays.extend(other.index_arrays);
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.vertex_arrays.clear();
        self.index_arrays.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.vertex_arrays.is_empty() && self.index_arrays.is_empty()
    }
}

/// Native graphics API as seen by a [`crate::Device`].
///
/// Implementations report allocation failure as `OutOfMemory`, a lost
/// device as `DeviceLost`, and never retry on their own.
pub trait Backend: Send {
    fn adapter(&self) -> AdapterInfo;
    fn limit(&self, limit: Limit) -> u64;
    fn memory_usage(&self, ty: MemoryType) -> u64;
    fn format_supported(&self, format: Format, usage: TextureUsage) -> bool;
    fn filter_supported(&self, format: Format, filter: Filter) -> bool;
    /// Description of an attached screen, if there is one at `index`.
    fn screen(&self, index: u32) -> Option<ScreenInfo>;

    fn create_buffer(&mut self, info: &BufferInfo) -> Result<BackendId>;
    fn create_texture(&mut self, info: &TextureInfo) -> Result<BackendId>;
    fn create_shared_texture(&mut self, source: BackendId, desc: &SharedTextureDesc) -> Result<BackendId>;
    fn create_sampler(&mut self, info: &SamplerInfo) -> Result<BackendId>;
    fn create_shader(&mut self, info: &ShaderInfo) -> Result<BackendId>;
    fn create_render_pass(&mut self, info: &FramebufferFormatInfo) -> Result<BackendId>;
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<BackendId>;
    fn create_render_pipeline(&mut self, desc: &RenderPipelineDesc) -> Result<BackendId>;
    fn create_compute_pipeline(&mut self, shader: BackendId) -> Result<BackendId>;
    fn create_uniform_set(
        &mut self,
        shader: BackendId,
        level: VariableLevel,
        entries: &[UniformSetEntry],
    ) -> Result<BackendId>;
    fn destroy(&mut self, kind: ResourceKind, id: BackendId);

    fn write_buffer(&mut self, buffer: BackendId, offset: u32, data: &[u8]) -> Result<()>;
    fn read_buffer(&mut self, buffer: BackendId, offset: u32, len: u32) -> Result<Vec<u8>>;

    /// Replay `work` in order and hand it to the GPU.
    fn submit(&mut self, work: &[CommandEncoder], objects: &ObjectTable) -> Result<FenceId>;
    /// Block until `fence` has retired.
    fn wait(&mut self, fence: FenceId) -> Result<()>;

    /// Backend for a screenless device sharing this adapter.
    fn create_local(&self) -> Result<Box<dyn Backend>>;
}
