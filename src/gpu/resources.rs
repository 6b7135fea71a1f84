use super::backend::BackendId;
use super::structs::{
    BufferKind, BufferUsage, Format, IndexType, SampleCount, SamplerInfo, TextureSlice, TextureType,
    TextureUsage, TextureView, VertexAttribute,
};
use crate::utils::Handle;

#[derive(Debug, Clone)]
pub struct Buffer {
    pub(crate) raw: BackendId,
    pub name: String,
    pub size: u32,
    pub kind: BufferKind,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub(crate) raw: BackendId,
    pub name: String,
    pub texture_type: TextureType,
    pub format: Format,
    pub dim: [u32; 3],
    pub layers: u32,
    pub mip_levels: u32,
    pub samples: SampleCount,
    pub usage: TextureUsage,
    pub shareable_formats: Vec<Format>,
    /// Texture this one is a shared view of.
    pub source: Option<Handle<Texture>>,
    /// Texture that owns the storage, for views of views.
    pub(crate) root: Option<Handle<Texture>>,
    pub view: TextureView,
    pub slice: Option<TextureSlice>,
}

impl Texture {
    /// Handle of the texture owning the memory behind `me`.
    pub fn storage(&self, me: Handle<Texture>) -> Handle<Texture> {
        self.root.unwrap_or(me)
    }

    pub fn is_shared(&self) -> bool {
        self.source.is_some()
    }

    /// Format the texture is accessed with, after any view override.
    pub fn view_format(&self) -> Format {
        self.view.format_override.unwrap_or(self.format)
    }

    pub fn accessible_layers(&self) -> u32 {
        self.slice.map(|s| s.layer_count).unwrap_or(self.layers)
    }

    pub fn accessible_mips(&self) -> u32 {
        self.slice.map(|s| s.mip_count).unwrap_or(self.mip_levels)
    }
}

#[derive(Debug, Clone)]
pub struct Sampler {
    pub(crate) raw: BackendId,
    pub info: SamplerInfo,
}

/// Layout of vertex attributes, shared by vertex arrays and pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexFormat {
    pub attributes: Vec<VertexAttribute>,
}

impl VertexFormat {
    /// Bit `n` is set when some attribute feeds location `n`.
    pub fn location_mask(&self) -> u64 {
        self.attributes
            .iter()
            .filter(|a| a.location < 64)
            .fold(0u64, |mask, a| mask | 1 << a.location)
    }
}

/// Vertex buffers bound together, one per attribute of the format.
#[derive(Debug, Clone)]
pub struct VertexArray {
    pub format: Handle<VertexFormat>,
    pub vertex_count: u32,
    pub buffers: Vec<Handle<Buffer>>,
    pub offsets: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct IndexArray {
    pub buffer: Handle<Buffer>,
    pub index_type: IndexType,
    pub first_index: u32,
    pub index_count: u32,
}
