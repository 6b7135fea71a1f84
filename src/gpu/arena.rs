use std::collections::HashMap;

use log::debug;

use super::backend::BackendId;
use super::error::{GPUError, Result};
use super::framebuffer::{Framebuffer, FramebufferFormat};
use super::pipelines::{ComputePipeline, RenderPipeline, Shader};
use super::resources::{Buffer, IndexArray, Sampler, Texture, VertexArray, VertexFormat};
use super::variables::UniformSet;
use crate::utils::{Handle, Pool, RawHandle, Tagged};

/// Kind tag carried by every handle.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer = 1,
    Texture = 2,
    Sampler = 3,
    Shader = 4,
    VertexFormat = 5,
    VertexArray = 6,
    IndexArray = 7,
    FramebufferFormat = 8,
    Framebuffer = 9,
    RenderPipeline = 10,
    ComputePipeline = 11,
    UniformSet = 12,
}

impl ResourceKind {
    pub fn from_tag(tag: u16) -> Option<Self> {
        Some(match tag {
            1 => ResourceKind::Buffer,
            2 => ResourceKind::Texture,
            3 => ResourceKind::Sampler,
            4 => ResourceKind::Shader,
            5 => ResourceKind::VertexFormat,
            6 => ResourceKind::VertexArray,
            7 => ResourceKind::IndexArray,
            8 => ResourceKind::FramebufferFormat,
            9 => ResourceKind::Framebuffer,
            10 => ResourceKind::RenderPipeline,
            11 => ResourceKind::ComputePipeline,
            12 => ResourceKind::UniformSet,
            _ => return None,
        })
    }
}

/// A record the arena can own.
pub trait Resource: Tagged + Sized {
    const KIND: ResourceKind;

    fn pool(arena: &ResourceArena) -> &Pool<Self>;
    fn pool_mut(arena: &mut ResourceArena) -> &mut Pool<Self>;

    /// Backend object to destroy once the record is released.
    fn backend_object(&self) -> Option<BackendId> {
        None
    }

    /// Resource this one keeps alive for as long as it exists.
    fn depends_on(&self) -> Option<RawHandle> {
        None
    }
}

macro_rules! arena_resource {
    ($ty:ident, $field:ident, raw: |$r:ident| $raw:expr, dep: |$d:ident| $dep:expr) => {
        impl Tagged for $ty {
            const TAG: u16 = ResourceKind::$ty as u16;
        }

        impl Resource for $ty {
            const KIND: ResourceKind = ResourceKind::$ty;

            fn pool(arena: &ResourceArena) -> &Pool<Self> {
                &arena.$field
            }

            fn pool_mut(arena: &mut ResourceArena) -> &mut Pool<Self> {
                &mut arena.$field
            }

            fn backend_object(&self) -> Option<BackendId> {
                let $r = self;
                $raw
            }

            fn depends_on(&self) -> Option<RawHandle> {
                let $d = self;
                $dep
            }
        }
    };
}

arena_resource!(Buffer, buffers, raw: |r| Some(r.raw), dep: |_d| None);
arena_resource!(Texture, textures, raw: |r| Some(r.raw), dep: |d| d.source.map(|h| h.raw()));
arena_resource!(Sampler, samplers, raw: |r| Some(r.raw), dep: |_d| None);
arena_resource!(Shader, shaders, raw: |r| Some(r.raw), dep: |_d| None);
arena_resource!(VertexFormat, vertex_formats, raw: |_r| None, dep: |_d| None);
arena_resource!(VertexArray, vertex_arrays, raw: |_r| None, dep: |_d| None);
arena_resource!(IndexArray, index_arrays, raw: |_r| None, dep: |_d| None);
arena_resource!(FramebufferFormat, framebuffer_formats, raw: |r| Some(r.raw), dep: |_d| None);
arena_resource!(Framebuffer, framebuffers, raw: |r| Some(r.raw), dep: |_d| None);
arena_resource!(RenderPipeline, render_pipelines, raw: |r| Some(r.raw), dep: |_d| None);
arena_resource!(ComputePipeline, compute_pipelines, raw: |r| Some(r.raw), dep: |_d| None);
arena_resource!(UniformSet, uniform_sets, raw: |r| Some(r.raw), dep: |_d| None);

/// What is left of a record once it leaves the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    pub kind: ResourceKind,
    pub backend: Option<BackendId>,
}

/// Owner of every resource record created on a device.
///
/// Records are reached through generational handles. Lifetime scopes
/// collect what was created while they were open so it can be released in
/// bulk. Pins mark records referenced by the open command list; a pinned
/// record, or one that still has dependents, cannot be removed.
#[derive(Default)]
pub struct ResourceArena {
    buffers: Pool<Buffer>,
    textures: Pool<Texture>,
    samplers: Pool<Sampler>,
    shaders: Pool<Shader>,
    vertex_formats: Pool<VertexFormat>,
    vertex_arrays: Pool<VertexArray>,
    index_arrays: Pool<IndexArray>,
    framebuffer_formats: Pool<FramebufferFormat>,
    framebuffers: Pool<Framebuffer>,
    render_pipelines: Pool<RenderPipeline>,
    compute_pipelines: Pool<ComputePipeline>,
    uniform_sets: Pool<UniformSet>,
    scopes: Vec<Vec<RawHandle>>,
    pins: HashMap<RawHandle, u32>,
    dependents: HashMap<RawHandle, u32>,
}

impl ResourceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Resource>(&mut self, item: T) -> Handle<T> {
        let dependency = item.depends_on();
        let handle = T::pool_mut(self).insert(item);
        if let Some(dep) = dependency {
            *self.dependents.entry(dep).or_insert(0) += 1;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(handle.raw());
        }
        debug!("created {:?} {:?}", T::KIND, handle);
        handle
    }

    pub fn get<T: Resource>(&self, handle: Handle<T>) -> Result<&T> {
        T::pool(self).get_ref(handle).ok_or(GPUError::InvalidHandle)
    }

    pub fn contains<T: Resource>(&self, handle: Handle<T>) -> bool {
        handle.tag() == T::TAG && T::pool(self).contains(handle)
    }

    pub fn contains_raw(&self, raw: RawHandle) -> bool {
        macro_rules! check {
            ($($kind:ident => $ty:ty),*) => {
                match ResourceKind::from_tag(raw.tag) {
                    $(Some(ResourceKind::$kind) => Handle::<$ty>::from_raw(raw)
                        .map(|h| self.contains(h))
                        .unwrap_or(false),)*
                    None => false,
                }
            };
        }
        check!(
            Buffer => Buffer, Texture => Texture, Sampler => Sampler, Shader => Shader,
            VertexFormat => VertexFormat, VertexArray => VertexArray, IndexArray => IndexArray,
            FramebufferFormat => FramebufferFormat, Framebuffer => Framebuffer,
            RenderPipeline => RenderPipeline, ComputePipeline => ComputePipeline,
            UniformSet => UniformSet
        )
    }

    /// Native object behind `raw`, when it is alive and has one.
    pub fn backend_object_raw(&self, raw: RawHandle) -> Option<BackendId> {
        macro_rules! lookup {
            ($($kind:ident => $ty:ty),*) => {
                match ResourceKind::from_tag(raw.tag)? {
                    $(ResourceKind::$kind => Handle::<$ty>::from_raw(raw)
                        .and_then(|h| self.get(h).ok())
                        .and_then(|r| r.backend_object()),)*
                }
            };
        }
        lookup!(
            Buffer => Buffer, Texture => Texture, Sampler => Sampler, Shader => Shader,
            VertexFormat => VertexFormat, VertexArray => VertexArray, IndexArray => IndexArray,
            FramebufferFormat => FramebufferFormat, Framebuffer => Framebuffer,
            RenderPipeline => RenderPipeline, ComputePipeline => ComputePipeline,
            UniformSet => UniformSet
        )
    }

    pub fn len<T: Resource>(&self) -> usize {
        T::pool(self).len()
    }

    pub fn handles<T: Resource>(&self) -> Vec<Handle<T>> {
        T::pool(self).handles()
    }

    pub fn pin(&mut self, raw: RawHandle) {
        *self.pins.entry(raw).or_insert(0) += 1;
    }

    pub fn unpin(&mut self, raw: RawHandle) {
        if let Some(count) = self.pins.get_mut(&raw) {
            *count -= 1;
            if *count == 0 {
                self.pins.remove(&raw);
            }
        }
    }

    pub fn is_pinned(&self, raw: RawHandle) -> bool {
        self.pins.contains_key(&raw)
    }

    pub fn has_dependents(&self, raw: RawHandle) -> bool {
        self.dependents.get(&raw).copied().unwrap_or(0) > 0
    }

    /// Remove a record. Fails with `ResourceInUse` while it is pinned or
    /// other records depend on it.
    pub fn remove<T: Resource>(&mut self, handle: Handle<T>) -> Result<T> {
        if !self.contains(handle) {
            return Err(GPUError::InvalidHandle);
        }
        let raw = handle.raw();
        if self.is_pinned(raw) || self.has_dependents(raw) {
            return Err(GPUError::ResourceInUse);
        }
        let item = T::pool_mut(self).release(handle).ok_or(GPUError::InvalidHandle)?;
        if let Some(dep) = item.depends_on() {
            if let Some(count) = self.dependents.get_mut(&dep) {
                *count -= 1;
                if *count == 0 {
                    self.dependents.remove(&dep);
                }
            }
        }
        debug!("released {:?} {:?}", T::KIND, handle);
        Ok(item)
    }

    /// Type-erased [`ResourceArena::remove`].
    pub fn remove_raw(&mut self, raw: RawHandle) -> Result<Released> {
        macro_rules! release {
            ($($kind:ident => $ty:ty),*) => {
                match ResourceKind::from_tag(raw.tag) {
                    $(Some(ResourceKind::$kind) => {
                        let handle = Handle::<$ty>::from_raw(raw).ok_or(GPUError::InvalidHandle)?;
                        let item = self.remove(handle)?;
                        Released { kind: ResourceKind::$kind, backend: item.backend_object() }
                    })*
                    None => return Err(GPUError::InvalidHandle),
                }
            };
        }
        Ok(release!(
            Buffer => Buffer, Texture => Texture, Sampler => Sampler, Shader => Shader,
            VertexFormat => VertexFormat, VertexArray => VertexArray, IndexArray => IndexArray,
            FramebufferFormat => FramebufferFormat, Framebuffer => Framebuffer,
            RenderPipeline => RenderPipeline, ComputePipeline => ComputePipeline,
            UniformSet => UniformSet
        ))
    }

    /// Open a lifetime scope. Everything inserted until the matching
    /// [`ResourceArena::pop_scope`] is recorded in it.
    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Close the innermost scope and return its records, newest first.
    pub fn pop_scope(&mut self) -> Option<Vec<RawHandle>> {
        let mut scope = self.scopes.pop()?;
        scope.reverse();
        Some(scope)
    }

    /// Every live record, dependents before what they depend on.
    pub fn all_raw(&self) -> Vec<RawHandle> {
        let mut out: Vec<RawHandle> = Vec::new();
        out.extend(self.uniform_sets.handles().iter().map(|h| h.raw()));
        out.extend(self.render_pipelines.handles().iter().map(|h| h.raw()));
        out.extend(self.compute_pipelines.handles().iter().map(|h| h.raw()));
        out.extend(self.framebuffers.handles().iter().map(|h| h.raw()));
        out.extend(self.framebuffer_formats.handles().iter().map(|h| h.raw()));
        out.extend(self.vertex_arrays.handles().iter().map(|h| h.raw()));
        out.extend(self.index_arrays.handles().iter().map(|h| h.raw()));
        out.extend(self.vertex_formats.handles().iter().map(|h| h.raw()));
        out.extend(self.shaders.handles().iter().map(|h| h.raw()));
        out.extend(self.samplers.handles().iter().map(|h| h.raw()));
        out.extend(self.buffers.handles().iter().map(|h| h.raw()));
        let mut textures = self.textures.handles();
        // Views first so their sources are free of dependents when reached.
        textures.sort_by_key(|h| {
            self.textures
                .get_ref(*h)
                .map(|t| !t.is_shared())
                .unwrap_or(true)
        });
        out.extend(textures.iter().map(|h| h.raw()));
        out
    }

    pub(crate) fn clear_pins(&mut self) {
        self.pins.clear();
    }
}
