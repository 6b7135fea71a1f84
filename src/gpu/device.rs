use std::collections::{HashMap, HashSet};

use log::{debug, error, info, warn};
use uuid::Uuid;

use super::arena::{Resource, ResourceArena, ResourceKind};
use super::backend::{
    Backend, FramebufferDesc, NullBackend, RenderPipelineDesc, SharedTextureDesc, UniformSetEntry,
};
use super::cmd::{ActiveList, ScreenTarget};
use super::error::{invalid, GPUError, Result};
use super::frame::{InFlight, Recording};
use super::framebuffer::{
    validate_format, validate_framebuffer, AttachmentFormat, Framebuffer, FramebufferFormat,
    FramebufferFormatInfo,
};
use super::pipelines::{
    validate_compute_pipeline, validate_render_pipeline, ComputePipeline, RenderPipeline,
    RenderPipelineInfo, Shader, ShaderInfo,
};
use super::resources::{Buffer, IndexArray, Sampler, Texture, VertexArray, VertexFormat};
use super::structs::{
    BufferInfo, BufferKind, BufferUsage, Filter, Format, IndexType, Limit, MemoryType, SamplerInfo,
    TextureInfo, TextureSlice, TextureType, TextureUsage, TextureView, VertexAttribute,
    VertexFrequency,
};
use super::variables::{resolve_bindings, UniformBinding, UniformSet, VariableLevel};
use crate::sync::{Access, Layout, Stage, StateTracker};
use crate::utils::{Handle, PerFrame, RawHandle};

pub const DEFAULT_FRAME_DELAY: usize = 2;
pub const MAX_FRAME_DELAY: usize = 4;

/// Device configuration.
///
/// `Default` honours `RENDEV_VALIDATION=1` and `RENDEV_FRAME_DELAY=<n>`.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    pub debug_name: String,
    /// Frames the CPU may run ahead of the GPU on a primary device.
    pub frame_delay: usize,
    /// Fail instead of deferring when freeing resources used by
    /// unretired work.
    pub validation: bool,
}

impl Default for ContextInfo {
    fn default() -> Self {
        let validation = std::env::var("RENDEV_VALIDATION")
            .map(|v| v == "1")
            .unwrap_or(false);
        let frame_delay = std::env::var("RENDEV_FRAME_DELAY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_FRAME_DELAY)
            .clamp(1, MAX_FRAME_DELAY);
        Self {
            debug_name: "rendev".to_string(),
            frame_delay,
            validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFlavor {
    /// Renders to screens, paced by `swap_buffers`.
    Primary,
    /// Screenless, driven with explicit `submit`/`sync`.
    Local,
}

/// Explicit device context. Owns every resource created through it, the
/// hazard tracker and the in-flight frame ring.
///
/// Not internally synchronised: one thread drives a device at a time.
pub struct Device {
    pub(crate) name: String,
    pub(crate) flavor: DeviceFlavor,
    pub(crate) validation: bool,
    pub(crate) backend: Box<dyn Backend>,
    pub(crate) arena: ResourceArena,
    pub(crate) tracker: StateTracker,
    pub(crate) recording: Recording,
    pub(crate) frames: PerFrame<InFlight>,
    pub(crate) list: Option<ActiveList>,
    pub(crate) next_list: u64,
    pub(crate) submit_serial: u64,
    /// Attachments whose last draw list ended with `Suspend`.
    pub(crate) suspended: HashSet<Handle<Texture>>,
    pub(crate) screens: HashMap<u32, ScreenTarget>,
    destroyed: bool,
}

impl Device {
    /// Primary device on top of `backend`.
    pub fn new(info: &ContextInfo, backend: Box<dyn Backend>) -> Result<Self> {
        let delay = info.frame_delay.clamp(1, MAX_FRAME_DELAY);
        let device = Self::with_flavor(
            &info.debug_name,
            DeviceFlavor::Primary,
            delay,
            info.validation,
            backend,
        );
        info!(
            "created device '{}' on {} (frame delay {}, validation {})",
            device.name,
            device.device_name(),
            delay,
            device.validation
        );
        Ok(device)
    }

    /// Primary device without a GPU, backed by [`NullBackend`].
    pub fn headless(info: &ContextInfo) -> Result<Self> {
        Self::new(info, Box::new(NullBackend::new()))
    }

    fn with_flavor(
        name: &str,
        flavor: DeviceFlavor,
        frame_delay: usize,
        validation: bool,
        backend: Box<dyn Backend>,
    ) -> Self {
        Self {
            name: name.to_string(),
            flavor,
            validation,
            backend,
            arena: ResourceArena::new(),
            tracker: StateTracker::new(),
            recording: Recording::default(),
            frames: PerFrame::new(frame_delay),
            list: None,
            next_list: 1,
            submit_serial: 0,
            suspended: HashSet::new(),
            screens: HashMap::new(),
            destroyed: false,
        }
    }

    /// Screenless device sharing this device's adapter. Its frame delay
    /// is 1 and work is pushed with [`Device::submit`]/[`Device::sync`].
    pub fn local_device(&self) -> Result<Device> {
        if self.flavor != DeviceFlavor::Primary {
            return Err(GPUError::PrimaryDeviceOnly);
        }
        let backend = self.backend.create_local()?;
        let name = format!("{}-local", self.name);
        info!("created local device '{}'", name);
        Ok(Self::with_flavor(&name, DeviceFlavor::Local, 1, self.validation, backend))
    }

    pub fn flavor(&self) -> DeviceFlavor {
        self.flavor
    }

    pub fn is_local(&self) -> bool {
        self.flavor == DeviceFlavor::Local
    }

    //===------------------------------------------------------------------===//
    // Introspection
    //===------------------------------------------------------------------===//

    pub fn device_name(&self) -> String {
        self.backend.adapter().name
    }

    pub fn device_vendor(&self) -> String {
        self.backend.adapter().vendor
    }

    /// Opaque key for an on-disk pipeline cache, stable for one GPU model
    /// and driver version.
    pub fn pipeline_cache_id(&self) -> String {
        let adapter = self.backend.adapter();
        let key = format!(
            "{}/{}/{}/{}",
            adapter.vendor, adapter.name, adapter.device_id, adapter.driver_version
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
    }

    pub fn limit(&self, limit: Limit) -> u64 {
        self.backend.limit(limit)
    }

    pub fn memory_usage(&self, ty: MemoryType) -> u64 {
        self.backend.memory_usage(ty)
    }

    pub fn frame_delay(&self) -> usize {
        self.frames.len()
    }

    pub fn texture_format_supported_for_usage(&self, format: Format, usage: TextureUsage) -> bool {
        self.backend.format_supported(format, usage)
    }

    pub fn sampler_filter_supported(&self, format: Format, filter: Filter) -> bool {
        self.backend.filter_supported(format, filter)
    }

    /// True while `handle` names a live resource of this device. Never
    /// changes any state.
    pub fn is_valid<T: Resource>(&self, handle: Handle<T>) -> bool {
        self.arena.contains(handle)
    }

    pub fn is_valid_raw(&self, raw: RawHandle) -> bool {
        self.arena.contains_raw(raw)
    }

    pub fn get<T: Resource>(&self, handle: Handle<T>) -> Result<&T> {
        self.arena.get(handle)
    }

    pub fn resource_count<T: Resource>(&self) -> usize {
        self.arena.len::<T>()
    }

    /// Last recorded hazard state of a buffer.
    pub fn buffer_state(&self, buffer: Handle<Buffer>) -> Option<crate::sync::ResState> {
        self.tracker.buffer_state(buffer)
    }

    /// Last recorded hazard state of a texture's storage.
    pub fn texture_state(&self, texture: Handle<Texture>) -> Option<crate::sync::ResState> {
        let root = self.arena.get(texture).ok()?.storage(texture);
        self.tracker.texture_state(root)
    }

    //===------------------------------------------------------------------===//
    // Buffers
    //===------------------------------------------------------------------===//

    pub fn make_buffer(&mut self, info: &BufferInfo) -> Result<Handle<Buffer>> {
        if info.byte_size == 0 {
            return Err(invalid("buffer size is zero"));
        }
        if info.initial_data.map(|d| d.len() > info.byte_size as usize).unwrap_or(false) {
            return Err(invalid("initial data larger than buffer"));
        }
        let size = info.byte_size as u64;
        match info.kind {
            BufferKind::Uniform if size > self.limit(Limit::MaxUniformBufferSize) => {
                return Err(invalid(format!("uniform buffer of {} bytes exceeds limit", size)))
            }
            BufferKind::Storage if size > self.limit(Limit::MaxStorageBufferSize) => {
                return Err(invalid(format!("storage buffer of {} bytes exceeds limit", size)))
            }
            BufferKind::Index(ty) if info.byte_size % ty.size() != 0 => {
                return Err(invalid("index buffer size is not a multiple of the index size"))
            }
            BufferKind::Texel(format) if !self.backend.format_supported(format, TextureUsage::SAMPLING) => {
                return Err(GPUError::UnsupportedFormat(format))
            }
            _ => {}
        }
        if info.usage.contains(BufferUsage::DISPATCH_INDIRECT) && info.kind != BufferKind::Storage {
            return Err(invalid("dispatch-indirect usage needs a storage buffer"));
        }

        let raw = self.backend.create_buffer(info)?;
        let handle = self.arena.insert(Buffer {
            raw,
            name: info.debug_name.to_string(),
            size: info.byte_size,
            kind: info.kind,
            usage: info.usage,
        });
        if info.initial_data.is_some() {
            self.tracker.record_buffer_state(handle, Stage::TRANSFER, Access::TRANSFER_WRITE);
        }
        Ok(handle)
    }

    pub fn make_vertex_buffer(&mut self, byte_size: u32, data: Option<&[u8]>) -> Result<Handle<Buffer>> {
        self.make_buffer(&BufferInfo {
            debug_name: "vertex buffer",
            byte_size,
            kind: BufferKind::Vertex,
            initial_data: data,
            ..Default::default()
        })
    }

    pub fn make_index_buffer(
        &mut self,
        index_count: u32,
        index_type: IndexType,
        data: Option<&[u8]>,
    ) -> Result<Handle<Buffer>> {
        let byte_size = index_count
            .checked_mul(index_type.size())
            .ok_or_else(|| invalid("index buffer too large"))?;
        self.make_buffer(&BufferInfo {
            debug_name: "index buffer",
            byte_size,
            kind: BufferKind::Index(index_type),
            initial_data: data,
            ..Default::default()
        })
    }

    pub fn make_uniform_buffer(&mut self, byte_size: u32, data: Option<&[u8]>) -> Result<Handle<Buffer>> {
        self.make_buffer(&BufferInfo {
            debug_name: "uniform buffer",
            byte_size,
            kind: BufferKind::Uniform,
            initial_data: data,
            ..Default::default()
        })
    }

    pub fn make_storage_buffer(
        &mut self,
        byte_size: u32,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<Handle<Buffer>> {
        self.make_buffer(&BufferInfo {
            debug_name: "storage buffer",
            byte_size,
            kind: BufferKind::Storage,
            usage,
            initial_data: data,
        })
    }

    pub fn make_texture_buffer(
        &mut self,
        format: Format,
        texel_count: u32,
        data: Option<&[u8]>,
    ) -> Result<Handle<Buffer>> {
        let byte_size = texel_count
            .checked_mul(format.bytes_per_pixel())
            .ok_or_else(|| invalid("texture buffer too large"))?;
        self.make_buffer(&BufferInfo {
            debug_name: "texture buffer",
            byte_size,
            kind: BufferKind::Texel(format),
            initial_data: data,
            ..Default::default()
        })
    }

    //===------------------------------------------------------------------===//
    // Textures and samplers
    //===------------------------------------------------------------------===//

    fn check_texture_info(&self, info: &TextureInfo) -> Result<()> {
        let [w, h, d] = info.dim;
        if w == 0 || h == 0 || d == 0 || info.layers == 0 || info.mip_levels == 0 {
            return Err(invalid("texture extents must be non-zero"));
        }
        if info.usage.is_empty() {
            return Err(invalid("texture has no usage"));
        }
        let (max, shape_ok) = match info.texture_type {
            TextureType::D1 | TextureType::D1Array => (Limit::MaxTextureSize1D, h == 1 && d == 1),
            TextureType::D2 | TextureType::D2Array => (Limit::MaxTextureSize2D, d == 1),
            TextureType::D3 => (Limit::MaxTextureSize3D, true),
            TextureType::Cube | TextureType::CubeArray => {
                (Limit::MaxTextureSizeCube, d == 1 && w == h && info.layers % 6 == 0)
            }
        };
        if !shape_ok {
            return Err(invalid(format!("bad extents for {:?} texture", info.texture_type)));
        }
        let single_layer = matches!(info.texture_type, TextureType::D1 | TextureType::D2 | TextureType::D3);
        if single_layer && info.layers != 1 {
            return Err(invalid("non-array textures have one layer"));
        }
        if info.texture_type == TextureType::Cube && info.layers != 6 {
            return Err(invalid("cube textures have six layers"));
        }
        let limit = self.limit(max);
        if [w, h, d].iter().any(|e| *e as u64 > limit) {
            return Err(invalid(format!("texture extent exceeds {:?}", max)));
        }
        if info.layers as u64 > self.limit(Limit::MaxTextureArrayLayers) {
            return Err(invalid("too many texture layers"));
        }
        let max_mips = 32 - w.max(h).max(d).leading_zeros();
        if info.mip_levels > max_mips {
            return Err(invalid(format!("{} mip levels, at most {}", info.mip_levels, max_mips)));
        }
        if info.samples.count() > 1
            && (!matches!(info.texture_type, TextureType::D2 | TextureType::D2Array) || info.mip_levels != 1)
        {
            return Err(invalid("multisampled textures are single-mip 2D"));
        }
        if info.format.is_depth() && info.usage.contains(TextureUsage::COLOR_ATTACHMENT) {
            return Err(invalid("depth formats cannot be color attachments"));
        }
        if !info.format.is_depth() && info.usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
            return Err(invalid("color formats cannot be depth attachments"));
        }
        if !self.backend.format_supported(info.format, info.usage) {
            return Err(GPUError::UnsupportedFormat(info.format));
        }
        for f in info.shareable_formats {
            if f.bytes_per_pixel() != info.format.bytes_per_pixel() {
                return Err(invalid(format!("shareable format {:?} has a different texel size", f)));
            }
        }

        if !info.initial_data.is_empty() {
            if info.initial_data.len() != info.layers as usize {
                return Err(invalid("initial data needs one entry per layer"));
            }
            let bpp = info.format.bytes_per_pixel() as usize;
            let expected: usize = (0..info.mip_levels)
                .map(|m| ((w >> m).max(1) * (h >> m).max(1) * (d >> m).max(1)) as usize * bpp)
                .sum();
            if let Some(bad) = info.initial_data.iter().position(|l| l.len() != expected) {
                return Err(invalid(format!("layer {} initial data is not {} bytes", bad, expected)));
            }
        }
        Ok(())
    }

    pub fn make_texture(&mut self, info: &TextureInfo) -> Result<Handle<Texture>> {
        self.check_texture_info(info)?;
        let raw = self.backend.create_texture(info)?;
        let handle = self.arena.insert(Texture {
            raw,
            name: info.debug_name.to_string(),
            texture_type: info.texture_type,
            format: info.format,
            dim: info.dim,
            layers: info.layers,
            mip_levels: info.mip_levels,
            samples: info.samples,
            usage: info.usage,
            shareable_formats: info.shareable_formats.to_vec(),
            source: None,
            root: None,
            view: TextureView::default(),
            slice: None,
        });
        if !info.initial_data.is_empty() {
            self.tracker
                .record_texture_state(handle, Stage::TRANSFER, Access::TRANSFER_WRITE, Layout::TransferDst);
        }
        Ok(handle)
    }

    /// A texture viewing the storage of `source`, optionally reinterpreted
    /// with another format and limited to a layer/mip slice.
    pub fn make_shared_texture(
        &mut self,
        source: Handle<Texture>,
        view: TextureView,
        slice: Option<TextureSlice>,
    ) -> Result<Handle<Texture>> {
        let src = self.arena.get(source)?;
        if let Some(format) = view.format_override {
            let root_formats = match src.root {
                Some(root) => self.arena.get(root)?.shareable_formats.clone(),
                None => src.shareable_formats.clone(),
            };
            if format != src.format && !root_formats.contains(&format) {
                return Err(invalid(format!("{:?} is not a shareable format of the source", format)));
            }
        }

        let (base_layer, base_mip) = src.slice.map(|s| (s.base_layer, s.base_mip)).unwrap_or((0, 0));
        let absolute = match slice {
            Some(s) => {
                if s.layer_count == 0
                    || s.mip_count == 0
                    || s.base_layer + s.layer_count > src.accessible_layers()
                    || s.base_mip + s.mip_count > src.accessible_mips()
                {
                    return Err(invalid("shared texture slice outside the source"));
                }
                Some(TextureSlice {
                    base_layer: base_layer + s.base_layer,
                    layer_count: s.layer_count,
                    base_mip: base_mip + s.base_mip,
                    mip_count: s.mip_count,
                })
            }
            None => src.slice,
        };

        let shift = slice.map(|s| s.base_mip).unwrap_or(0);
        let texture = Texture {
            raw: 0,
            name: format!("{} (shared)", src.name),
            texture_type: src.texture_type,
            format: src.format,
            dim: src.dim.map(|e| (e >> shift).max(1)),
            layers: slice.map(|s| s.layer_count).unwrap_or(src.layers),
            mip_levels: slice.map(|s| s.mip_count).unwrap_or(src.mip_levels),
            samples: src.samples,
            usage: src.usage,
            shareable_formats: Vec::new(),
            source: Some(source),
            root: Some(src.storage(source)),
            view,
            slice: absolute,
        };
        let src_raw = src.raw;
        let raw = self
            .backend
            .create_shared_texture(src_raw, &SharedTextureDesc { view, slice: absolute })?;
        Ok(self.arena.insert(Texture { raw, ..texture }))
    }

    pub fn make_sampler(&mut self, info: &SamplerInfo) -> Result<Handle<Sampler>> {
        if let Some(aniso) = info.anisotropy {
            if aniso < 1.0 || aniso as u64 > self.limit(Limit::MaxSamplerAnisotropy) {
                return Err(invalid(format!("anisotropy {} out of range", aniso)));
            }
        }
        if info.min_lod > info.max_lod {
            return Err(invalid("sampler min lod above max lod"));
        }
        let raw = self.backend.create_sampler(info)?;
        Ok(self.arena.insert(Sampler { raw, info: *info }))
    }

    //===------------------------------------------------------------------===//
    // Shaders, vertex input
    //===------------------------------------------------------------------===//

    pub fn make_shader(&mut self, info: &ShaderInfo) -> Result<Handle<Shader>> {
        info.layout.validate(self.limit(Limit::MaxPushConstantSize))?;
        let max_sets = self.limit(Limit::MaxBoundUniformSets);
        if let Some(level) = info.layout.expected_levels().find(|l| *l as u64 >= max_sets) {
            return Err(invalid(format!("uniform set level {:?} exceeds the bound set limit", level)));
        }
        let max_inputs = self.limit(Limit::MaxVertexInputAttributes).min(64);
        if max_inputs < 64 && info.layout.vertex_input_mask >> max_inputs != 0 {
            return Err(invalid("vertex input location exceeds the attribute limit"));
        }
        let raw = self.backend.create_shader(info)?;
        Ok(self.arena.insert(Shader {
            raw,
            name: info.debug_name.to_string(),
            layout: info.layout.clone(),
        }))
    }

    pub fn make_vertex_format(&mut self, attributes: &[VertexAttribute]) -> Result<Handle<VertexFormat>> {
        if attributes.len() as u64 > self.limit(Limit::MaxVertexInputAttributes) {
            return Err(invalid("too many vertex attributes"));
        }
        for (i, attr) in attributes.iter().enumerate() {
            if attributes[..i].iter().any(|a| a.location == attr.location) {
                return Err(invalid(format!("vertex location {} used twice", attr.location)));
            }
            if attr.stride != 0 && attr.offset + attr.format.bytes_per_pixel() > attr.stride {
                return Err(invalid(format!("vertex location {} overruns its stride", attr.location)));
            }
        }
        Ok(self.arena.insert(VertexFormat {
            attributes: attributes.to_vec(),
        }))
    }

    /// Bind one buffer per attribute of `format`. `offsets` is empty or has
    /// one byte offset per buffer.
    pub fn make_vertex_array(
        &mut self,
        format: Handle<VertexFormat>,
        vertex_count: u32,
        buffers: &[Handle<Buffer>],
        offsets: &[u32],
    ) -> Result<Handle<VertexArray>> {
        let fmt = self.arena.get(format)?;
        if buffers.len() != fmt.attributes.len() {
            return Err(invalid(format!(
                "{} buffers for {} attributes",
                buffers.len(),
                fmt.attributes.len()
            )));
        }
        if !offsets.is_empty() && offsets.len() != buffers.len() {
            return Err(invalid("one offset per vertex buffer"));
        }
        if vertex_count == 0 {
            return Err(invalid("vertex array without vertices"));
        }
        for (i, (buf, attr)) in buffers.iter().zip(&fmt.attributes).enumerate() {
            let buffer = self.arena.get(*buf)?;
            if buffer.kind != BufferKind::Vertex {
                return Err(invalid(format!("buffer {} is not a vertex buffer", i)));
            }
            if attr.frequency == VertexFrequency::Vertex {
                let stride = attr.stride.max(attr.format.bytes_per_pixel()) as u64;
                let needed = offsets.get(i).copied().unwrap_or(0) as u64
                    + attr.offset as u64
                    + stride * (vertex_count as u64 - 1)
                    + attr.format.bytes_per_pixel() as u64;
                if needed > buffer.size as u64 {
                    return Err(invalid(format!("vertex buffer {} too small for {} vertices", i, vertex_count)));
                }
            }
        }
        let offsets = if offsets.is_empty() {
            vec![0; buffers.len()]
        } else {
            offsets.to_vec()
        };
        Ok(self.arena.insert(VertexArray {
            format,
            vertex_count,
            buffers: buffers.to_vec(),
            offsets,
        }))
    }

    /// `index_count` of zero uses every index after `first_index`.
    pub fn make_index_array(
        &mut self,
        buffer: Handle<Buffer>,
        first_index: u32,
        index_count: u32,
    ) -> Result<Handle<IndexArray>> {
        let buf = self.arena.get(buffer)?;
        let BufferKind::Index(index_type) = buf.kind else {
            return Err(invalid("index arrays need an index buffer"));
        };
        let available = buf.size / index_type.size();
        if first_index >= available {
            return Err(invalid("first index past the end of the buffer"));
        }
        let count = if index_count == 0 {
            available - first_index
        } else {
            index_count
        };
        if first_index as u64 + count as u64 > available as u64 {
            return Err(invalid("index range past the end of the buffer"));
        }
        Ok(self.arena.insert(IndexArray {
            buffer,
            index_type,
            first_index,
            index_count: count,
        }))
    }

    //===------------------------------------------------------------------===//
    // Framebuffers and pipelines
    //===------------------------------------------------------------------===//

    pub fn make_framebuffer_format(&mut self, info: &FramebufferFormatInfo) -> Result<Handle<FramebufferFormat>> {
        let max_views = if info.view_count > 1 {
            self.limit(Limit::MaxMultiviewViewCount) as u32
        } else {
            1
        };
        let info = validate_format(info, self.limit(Limit::MaxFramebufferColorAttachments) as u32, max_views)?;
        if let Some(att) = info
            .attachments
            .iter()
            .find(|a| !self.backend.format_supported(a.format, a.usage))
        {
            return Err(GPUError::UnsupportedFormat(att.format));
        }
        let raw = self.backend.create_render_pass(&info)?;
        Ok(self.arena.insert(FramebufferFormat { raw, info }))
    }

    /// Framebuffer format matching `textures` with a single default pass.
    pub fn make_framebuffer_format_for(&mut self, textures: &[Handle<Texture>]) -> Result<Handle<FramebufferFormat>> {
        let mut attachments = Vec::with_capacity(textures.len());
        for t in textures {
            let tex = self.arena.get(*t)?;
            let role = if tex.view_format().is_depth() {
                AttachmentFormat::depth(tex.view_format())
            } else {
                AttachmentFormat::color(tex.view_format())
            };
            attachments.push(role.with_samples(tex.samples));
        }
        self.make_framebuffer_format(&FramebufferFormatInfo {
            attachments,
            ..Default::default()
        })
    }

    pub fn make_framebuffer(
        &mut self,
        format: Handle<FramebufferFormat>,
        textures: &[Handle<Texture>],
    ) -> Result<Handle<Framebuffer>> {
        let fmt = self.arena.get(format)?;
        let mut records = Vec::with_capacity(textures.len());
        for t in textures {
            records.push(self.arena.get(*t)?);
        }
        let (width, height) = validate_framebuffer(&fmt.info, &records)?;
        let ids: Vec<_> = records.iter().map(|t| t.raw).collect();
        let desc = FramebufferDesc {
            render_pass: fmt.raw,
            textures: &ids,
            width,
            height,
            layers: fmt.view_count(),
        };
        let raw = self.backend.create_framebuffer(&desc)?;
        Ok(self.arena.insert(Framebuffer {
            raw,
            format,
            textures: textures.to_vec(),
            width,
            height,
        }))
    }

    pub fn make_render_pipeline(&mut self, info: &RenderPipelineInfo) -> Result<Handle<RenderPipeline>> {
        let shader = self.arena.get(info.shader)?;
        let format = self.arena.get(info.framebuffer_format)?;
        let vertex = match info.vertex_format {
            Some(v) => Some(self.arena.get(v)?),
            None => None,
        };
        validate_render_pipeline(&shader.layout, format, vertex, info.pass, &info.state)?;

        let no_attributes: &[VertexAttribute] = &[];
        let desc = RenderPipelineDesc {
            shader: shader.raw,
            render_pass: format.raw,
            pass: info.pass,
            vertex_attributes: vertex.map(|v| v.attributes.as_slice()).unwrap_or(no_attributes),
            state: &info.state,
        };
        let record = RenderPipeline {
            raw: 0,
            name: info.debug_name.to_string(),
            layout: shader.layout.clone(),
            framebuffer_format: format.info.clone(),
            vertex_format: vertex.cloned(),
            pass: info.pass,
            dynamic_states: info.state.dynamic_states,
        };
        let raw = self.backend.create_render_pipeline(&desc)?;
        Ok(self.arena.insert(RenderPipeline { raw, ..record }))
    }

    pub fn make_compute_pipeline(&mut self, shader: Handle<Shader>) -> Result<Handle<ComputePipeline>> {
        let sh = self.arena.get(shader)?;
        validate_compute_pipeline(&sh.layout)?;
        let (name, layout, shader_raw) = (sh.name.clone(), sh.layout.clone(), sh.raw);
        let raw = self.backend.create_compute_pipeline(shader_raw)?;
        Ok(self.arena.insert(ComputePipeline { raw, name, layout }))
    }

    /// Bundle `bindings` for `level` of `shader`. Every binding the shader
    /// expects at that level must be supplied, with nothing extra.
    pub fn make_uniform_set(
        &mut self,
        shader: Handle<Shader>,
        level: VariableLevel,
        bindings: &[UniformBinding],
    ) -> Result<Handle<UniformSet>> {
        let sh = self.arena.get(shader)?;
        let layout = sh
            .layout
            .level(level)
            .ok_or_else(|| GPUError::InvalidBinding(format!("shader uses no uniform set at {:?}", level)))?
            .to_vec();
        let accesses = resolve_bindings(&self.arena, &layout, bindings)?;
        let textures = bindings
            .iter()
            .flat_map(|b| b.variables.iter())
            .flat_map(|v| v.resources())
            .filter(|r| r.tag == ResourceKind::Texture as u16)
            .count();
        if textures as u64 > self.limit(Limit::MaxTexturesPerUniformSet) {
            return Err(GPUError::InvalidBinding(format!("{} textures exceed the per-set limit", textures)));
        }

        let entries: Vec<UniformSetEntry> = bindings
            .iter()
            .map(|b| UniformSetEntry {
                binding: b.binding,
                objects: b
                    .variables
                    .iter()
                    .flat_map(|v| v.resources())
                    .filter_map(|r| self.arena.backend_object_raw(r))
                    .collect(),
            })
            .collect();
        let shader_raw = sh.raw;
        let raw = self.backend.create_uniform_set(shader_raw, level, &entries)?;
        Ok(self.arena.insert(UniformSet {
            raw,
            shader,
            level,
            layout,
            bindings: bindings.to_vec(),
            accesses,
        }))
    }

    //===------------------------------------------------------------------===//
    // Freeing and lifetimes
    //===------------------------------------------------------------------===//

    /// Release a resource.
    ///
    /// Fails with `ResourceInUse` while the open command list, a suspended
    /// attachment or a shared view refers to it. Work already recorded or
    /// submitted keeps the native object alive until it retires, unless
    /// validation is on, in which case that also fails.
    pub fn free<T: Resource>(&mut self, handle: Handle<T>) -> Result<()> {
        self.free_raw(handle.raw())
    }

    pub fn free_raw(&mut self, raw: RawHandle) -> Result<()> {
        if !self.arena.contains_raw(raw) {
            return Err(GPUError::InvalidHandle);
        }
        if self.arena.is_pinned(raw) || self.arena.has_dependents(raw) {
            warn!("free of {:?} refused: resource in use", raw);
            return Err(GPUError::ResourceInUse);
        }
        let recorded = self.recording.refs.contains(&raw);
        let newest_in_flight = self
            .frames
            .iter()
            .filter(|f| f.fence.is_some() && f.refs.contains(&raw))
            .map(|f| f.serial)
            .max();
        if self.validation && (recorded || newest_in_flight.is_some()) {
            error!("free of {:?} while referenced by unretired work", raw);
            return Err(GPUError::ResourceInUse);
        }

        let released = self.arena.remove_raw(raw)?;
        if let Some(buffer) = Handle::<Buffer>::from_raw(raw) {
            self.tracker.forget_buffer(buffer);
        }
        if let Some(texture) = Handle::<Texture>::from_raw(raw) {
            self.tracker.forget_texture(texture);
        }
        self.screens.retain(|_, s| !s.references(raw));

        let Some(id) = released.backend else {
            return Ok(());
        };
        if recorded {
            debug!("deferring destroy of {:?} until recorded work retires", raw);
            self.recording.frees.push((released.kind, id));
        } else if let Some(serial) = newest_in_flight {
            debug!("deferring destroy of {:?} until frame {} retires", raw, serial);
            self.frames.for_each_mut(|f| {
                if f.fence.is_some() && f.serial == serial {
                    f.frees.push((released.kind, id));
                }
            });
        } else {
            self.backend.destroy(released.kind, id);
        }
        Ok(())
    }

    /// Open a lifetime scope: every resource created until the matching
    /// [`Device::pop_lifetime`] is released by it.
    pub fn push_lifetime(&mut self) {
        self.arena.push_scope();
    }

    /// Release everything created since the matching push, newest first.
    /// Resources already freed by hand are skipped; the first failure is
    /// reported after the rest of the scope was released.
    pub fn pop_lifetime(&mut self) -> Result<()> {
        let scope = self
            .arena
            .pop_scope()
            .ok_or_else(|| invalid("no lifetime scope is open"))?;
        let mut first_err = None;
        for raw in scope {
            if !self.arena.contains_raw(raw) {
                continue;
            }
            if let Err(e) = self.free_raw(raw) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Run `f` inside a lifetime scope.
    pub fn lifetime<R>(&mut self, f: impl FnOnce(&mut Device) -> Result<R>) -> Result<R> {
        self.push_lifetime();
        let out = f(self);
        let popped = self.pop_lifetime();
        let value = out?;
        popped?;
        Ok(value)
    }

    //===------------------------------------------------------------------===//
    // Teardown
    //===------------------------------------------------------------------===//

    /// Wait for the GPU, then release every resource.
    pub fn destroy(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.destroyed, true) {
            return Ok(());
        }
        if let Some(list) = self.list.take() {
            warn!("device '{}' destroyed with list {} open", self.name, list.id);
        }
        let delay = self.frames.len();
        let mut frames = std::mem::replace(&mut self.frames, PerFrame::new(delay));
        let mut first_err = None;
        frames.for_each_mut(|frame| {
            if let Err(e) = self.retire(frame) {
                first_err.get_or_insert(e);
            }
        });
        for (kind, id) in std::mem::take(&mut self.recording.frees) {
            self.backend.destroy(kind, id);
        }
        self.recording = Recording::default();
        self.suspended.clear();
        self.screens.clear();

        self.arena.clear_pins();
        let all = self.arena.all_raw();
        let count = all.len();
        for raw in all {
            match self.arena.remove_raw(raw) {
                Ok(released) => {
                    if let Some(id) = released.backend {
                        self.backend.destroy(released.kind, id);
                    }
                }
                Err(e) => warn!("could not release {:?} on teardown: {}", raw, e),
            }
        }
        info!("destroyed device '{}' ({} resources released)", self.name, count);
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("device '{}' teardown failed: {}", self.name, e);
        }
    }
}
