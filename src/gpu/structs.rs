use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Format {
    R8Unorm,
    R8Uint,
    R8Sint,
    RG8Unorm,
    #[default]
    RGBA8Unorm,
    RGBA8Srgb,
    BGRA8Unorm,
    BGRA8Srgb,
    R16F,
    RG16F,
    RGBA16F,
    R32Uint,
    R32F,
    RG32F,
    RGB32F,
    RGBA32F,
    A2B10G10R10Unorm,
    D16,
    D24S8,
    D32F,
    D32FS8,
}

impl Format {
    pub fn is_depth(self) -> bool {
        matches!(self, Format::D16 | Format::D24S8 | Format::D32F | Format::D32FS8)
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Format::D24S8 | Format::D32FS8)
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Format::R8Unorm | Format::R8Uint | Format::R8Sint => 1,
            Format::RG8Unorm | Format::R16F | Format::D16 => 2,
            Format::RGBA8Unorm
            | Format::RGBA8Srgb
            | Format::BGRA8Unorm
            | Format::BGRA8Srgb
            | Format::RG16F
            | Format::R32Uint
            | Format::R32F
            | Format::A2B10G10R10Unorm
            | Format::D24S8
            | Format::D32F => 4,
            Format::RGBA16F | Format::RG32F | Format::D32FS8 => 8,
            Format::RGB32F => 12,
            Format::RGBA32F => 16,
        }
    }
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SampleCount {
    #[default]
    S1,
    S2,
    S4,
    S8,
    S16,
    S32,
    S64,
}

impl SampleCount {
    pub fn count(self) -> u32 {
        1 << self as u32
    }

    pub fn from_count(count: u32) -> Option<Self> {
        Some(match count {
            1 => SampleCount::S1,
            2 => SampleCount::S2,
            4 => SampleCount::S4,
            8 => SampleCount::S8,
            16 => SampleCount::S16,
            32 => SampleCount::S32,
            64 => SampleCount::S64,
            _ => return None,
        })
    }
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TextureType {
    D1,
    #[default]
    D2,
    D3,
    Cube,
    D1Array,
    D2Array,
    CubeArray,
}

impl TextureType {
    pub fn is_array(self) -> bool {
        matches!(self, TextureType::D1Array | TextureType::D2Array | TextureType::CubeArray)
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLING = 1 << 0;
        const COLOR_ATTACHMENT = 1 << 1;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        const STORAGE = 1 << 3;
        const STORAGE_ATOMIC = 1 << 4;
        const CPU_READ = 1 << 5;
        const CAN_UPDATE = 1 << 6;
        const CAN_COPY_FROM = 1 << 7;
        const CAN_COPY_INTO = 1 << 8;
        const INPUT_ATTACHMENT = 1 << 9;
    }
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Swizzle {
    #[default]
    Identity,
    Zero,
    One,
    R,
    G,
    B,
    A,
}

/// How a shared texture reinterprets its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TextureView {
    pub format_override: Option<Format>,
    pub swizzle: [Swizzle; 4],
}

/// Sub-range of a texture addressed by a shared view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureSlice {
    pub base_layer: u32,
    pub layer_count: u32,
    pub base_mip: u32,
    pub mip_count: u32,
}

#[derive(Debug, Clone)]
pub struct TextureInfo<'a> {
    pub debug_name: &'a str,
    pub texture_type: TextureType,
    pub format: Format,
    pub dim: [u32; 3],
    pub layers: u32,
    pub mip_levels: u32,
    pub samples: SampleCount,
    pub usage: TextureUsage,
    /// Formats a shared view may reinterpret this texture as.
    pub shareable_formats: &'a [Format],
    /// One entry per array layer, or empty.
    pub initial_data: &'a [&'a [u8]],
}

impl<'a> Default for TextureInfo<'a> {
    fn default() -> Self {
        Self {
            debug_name: "",
            texture_type: TextureType::D2,
            format: Format::RGBA8Unorm,
            dim: [1280, 1024, 1],
            layers: 1,
            mip_levels: 1,
            samples: SampleCount::S1,
            usage: TextureUsage::SAMPLING,
            shareable_formats: &[],
            initial_data: &[],
        }
    }
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IndexType {
    #[default]
    U16,
    U32,
}

impl IndexType {
    pub fn size(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BufferKind {
    #[default]
    Vertex,
    Index(IndexType),
    Uniform,
    Storage,
    /// Texel buffer read through a sampler.
    Texel(Format),
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const DISPATCH_INDIRECT = 1 << 0;
        const CPU_READ = 1 << 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct BufferInfo<'a> {
    pub debug_name: &'a str,
    pub byte_size: u32,
    pub kind: BufferKind,
    pub usage: BufferUsage,
    pub initial_data: Option<&'a [u8]>,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SamplerAddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
    MirrorClampToEdge,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BorderColor {
    #[default]
    FloatTransparentBlack,
    IntTransparentBlack,
    FloatOpaqueBlack,
    IntOpaqueBlack,
    FloatOpaqueWhite,
    IntOpaqueWhite,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    #[default]
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SamplerInfo {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mip_filter: Filter,
    pub address_mode_u: SamplerAddressMode,
    pub address_mode_v: SamplerAddressMode,
    pub address_mode_w: SamplerAddressMode,
    pub lod_bias: f32,
    pub anisotropy: Option<f32>,
    pub compare: Option<CompareOp>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: BorderColor,
    pub unnormalized_uvw: bool,
}

impl Default for SamplerInfo {
    fn default() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mip_filter: Filter::Linear,
            address_mode_u: SamplerAddressMode::Repeat,
            address_mode_v: SamplerAddressMode::Repeat,
            address_mode_w: SamplerAddressMode::Repeat,
            lod_bias: 0.0,
            anisotropy: None,
            compare: None,
            min_lod: 0.0,
            max_lod: 1e20,
            border_color: BorderColor::FloatTransparentBlack,
            unnormalized_uvw: false,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect2D {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect2D {
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// True when the rect lies fully inside a `width` x `height` target.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.w as u64 <= width as u64 && self.y as u64 + self.h as u64 <= height as u64
    }
}

/// Clear values used by `Clear`/`ClearRegion` start actions.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ClearValues {
    /// One entry per color attachment, in attachment order.
    pub colors: Vec<[f32; 4]>,
    pub depth: f32,
    pub stencil: u32,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Limit {
    MaxBoundUniformSets,
    MaxFramebufferColorAttachments,
    MaxTexturesPerUniformSet,
    MaxUniformBufferSize,
    MaxStorageBufferSize,
    MaxPushConstantSize,
    MaxTextureSize1D,
    MaxTextureSize2D,
    MaxTextureSize3D,
    MaxTextureSizeCube,
    MaxTextureArrayLayers,
    MaxVertexInputAttributes,
    MaxComputeWorkgroupCountX,
    MaxComputeWorkgroupCountY,
    MaxComputeWorkgroupCountZ,
    MaxComputeWorkgroupInvocations,
    MaxViewportDimensionsX,
    MaxViewportDimensionsY,
    MaxSamplerAnisotropy,
    MaxMultiviewViewCount,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MemoryType {
    Textures,
    Buffers,
    Total,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VertexFrequency {
    #[default]
    Vertex,
    Instance,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexAttribute {
    pub location: u32,
    pub format: Format,
    pub offset: u32,
    pub stride: u32,
    pub frequency: VertexFrequency,
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const TESSELATION_CONTROL = 1 << 2;
        const TESSELATION_EVALUATION = 1 << 3;
        const COMPUTE = 1 << 4;
    }
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrontFace {
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RasterState {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_clamp: bool,
    pub discard: bool,
    pub line_width: f32,
    pub depth_bias: Option<[f32; 3]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MultisampleState {
    pub samples: SampleCount,
    pub sample_shading: Option<f32>,
    pub alpha_to_coverage: bool,
    pub alpha_to_one: bool,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StencilFace {
    pub fail: StencilOp,
    pub pass: StencilOp,
    pub depth_fail: StencilOp,
    pub compare: CompareOp,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub depth_range: Option<[f32; 2]>,
    pub stencil: Option<[StencilFace; 2]>,
}

#[derive(Hash, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlendFactor {
    One,
    Zero,
    SrcColor,
    InvSrcColor,
    #[default]
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    DstColor,
    InvDstColor,
    BlendFactor,
}

#[derive(Hash, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    InvSubtract,
    Min,
    Max,
}

#[derive(Hash, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColorBlendAttachment {
    pub enable: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
    pub write_mask: u8,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            enable: false,
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::InvSrcAlpha,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
            write_mask: 0xF,
        }
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DynamicStates: u32 {
        const LINE_WIDTH = 1 << 0;
        const DEPTH_BIAS = 1 << 1;
        const BLEND_CONSTANTS = 1 << 2;
        const DEPTH_BOUNDS = 1 << 3;
        const STENCIL_COMPARE_MASK = 1 << 4;
        const STENCIL_WRITE_MASK = 1 << 5;
        const STENCIL_REFERENCE = 1 << 6;
    }
}

/// Fixed-function state of a render pipeline.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct RenderState {
    pub primitive: PrimitiveType,
    pub raster: RasterState,
    pub multisample: MultisampleState,
    pub depth_stencil: DepthStencilState,
    /// One entry per color attachment of the pass, or empty for defaults.
    pub blend: Vec<ColorBlendAttachment>,
    pub dynamic_states: DynamicStates,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub format: Format,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: String,
    pub device_id: u32,
    pub driver_version: u32,
}
