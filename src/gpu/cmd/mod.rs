//! Draw and compute command lists.
//!
//! At most one list is open per device. A list is named by a
//! [`CommandListId`]; once it ends the id is dead and every call with it
//! fails with `ListClosed`. Everything a list names is pinned while it is
//! open, so it cannot be freed from under it.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, error};

use super::arena::{Resource, ResourceArena};
use super::backend::ObjectTable;
use super::device::Device;
use super::error::{invalid, GPUError, Result};
use super::framebuffer::{Framebuffer, FramebufferFormat};
use super::pipelines::{ComputePipeline, RenderPipeline};
use super::resources::{IndexArray, Texture, VertexArray};
use super::variables::{UniformSet, VARIABLE_LEVELS};
use crate::driver::command::{CommandEncoder, EncoderKind};
use crate::sync::{BarrierMask, ResState};
use crate::utils::{Handle, RawHandle};

pub mod compute;
pub mod draw;
pub mod transfer;

pub use compute::ComputeList;
pub use draw::{DrawList, Frame, FrameEnded, FrameStart};
pub use transfer::CopyRegion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandListId(u64);

impl CommandListId {
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct DrawState {
    pub framebuffer: Handle<Framebuffer>,
    pub format: Handle<FramebufferFormat>,
    /// Storage owners of the framebuffer attachments.
    pub attachments: Vec<Handle<Texture>>,
    pub ends: Vec<FrameEnded>,
    pub width: u32,
    pub height: u32,
    pub pass: u32,
    pub pipeline: Option<Handle<RenderPipeline>>,
    pub sets: [Option<Handle<UniformSet>>; VARIABLE_LEVELS],
    pub vertex_array: Option<Handle<VertexArray>>,
    pub index_array: Option<Handle<IndexArray>>,
    pub push_constant_size: Option<u32>,
    /// What bindings of this list did to each buffer and texture so far.
    pub accessed: HashMap<RawHandle, ResState>,
}

#[derive(Default)]
pub(crate) struct ComputeState {
    pub pipeline: Option<Handle<ComputePipeline>>,
    pub sets: [Option<(Handle<UniformSet>, BarrierMask)>; VARIABLE_LEVELS],
    pub push_constant_size: Option<u32>,
    pub dispatches: u32,
}

pub(crate) enum ListKind {
    Draw(Box<DrawState>),
    Compute(ComputeState),
}

pub(crate) struct ActiveList {
    pub id: CommandListId,
    pub kind: ListKind,
    /// Barriers that must run before the list starts.
    pub pre: CommandEncoder,
    pub enc: CommandEncoder,
    pub refs: HashSet<RawHandle>,
    pub objects: ObjectTable,
}

impl ActiveList {
    fn new(id: CommandListId, kind: ListKind) -> Self {
        let enc_kind = match kind {
            ListKind::Draw(_) => EncoderKind::Draw,
            ListKind::Compute(_) => EncoderKind::Compute,
        };
        Self {
            id,
            kind,
            pre: CommandEncoder::with_kind(EncoderKind::Transfer),
            enc: CommandEncoder::with_kind(enc_kind),
            refs: HashSet::new(),
            objects: ObjectTable::new(),
        }
    }

    /// Pin `raw` for the rest of the list and note its native object.
    pub fn track(&mut self, arena: &mut ResourceArena, raw: RawHandle) {
        if self.refs.insert(raw) {
            arena.pin(raw);
            if let Some(id) = arena.backend_object_raw(raw) {
                self.objects.insert(raw, id);
            }
        }
    }

    pub fn track_handle<T: Resource>(&mut self, arena: &mut ResourceArena, handle: Handle<T>) {
        self.track(arena, handle.raw());
    }

    pub fn draw(&mut self) -> Result<&mut DrawState> {
        match &mut self.kind {
            ListKind::Draw(state) => Ok(&mut **state),
            ListKind::Compute(_) => Err(invalid(format!("list {} is a compute list", self.id))),
        }
    }

    pub fn compute(&mut self) -> Result<&mut ComputeState> {
        match &mut self.kind {
            ListKind::Compute(state) => Ok(state),
            ListKind::Draw(_) => Err(invalid(format!("list {} is a draw list", self.id))),
        }
    }
}

/// The open list if `id` names it.
pub(crate) fn active(list: &mut Option<ActiveList>, next_list: u64, id: CommandListId) -> Result<&mut ActiveList> {
    match list {
        Some(l) if l.id == id => Ok(l),
        _ if id.0 < next_list => Err(GPUError::ListClosed),
        _ => Err(GPUError::ListInactive),
    }
}

/// Lazily built render target for one screen of a primary device.
pub(crate) struct ScreenTarget {
    pub format: Handle<FramebufferFormat>,
    pub texture: Handle<Texture>,
    pub framebuffer: Handle<Framebuffer>,
    pub drawn: bool,
}

impl ScreenTarget {
    pub fn references(&self, raw: RawHandle) -> bool {
        raw == self.format.raw() || raw == self.texture.raw() || raw == self.framebuffer.raw()
    }
}

impl Device {
    pub(crate) fn open_list(&mut self, kind: ListKind) -> Result<CommandListId> {
        if let Some(list) = &self.list {
            error!("cannot open a list while list {} is open", list.id);
            return Err(GPUError::ListAlreadyActive);
        }
        let id = CommandListId(self.next_list);
        self.next_list += 1;
        self.list = Some(ActiveList::new(id, kind));
        Ok(id)
    }

    /// Close the open list: release its pins and queue its commands.
    pub(crate) fn close_list(&mut self, id: CommandListId) -> Result<ActiveList> {
        active(&mut self.list, self.next_list, id)?;
        let Some(mut list) = self.list.take() else {
            return Err(GPUError::ListInactive);
        };
        for raw in &list.refs {
            self.arena.unpin(*raw);
        }
        let pre = std::mem::take(&mut list.pre);
        if !pre.is_empty() {
            self.recording.encoders.push(pre);
        }
        self.recording.encoders.push(std::mem::take(&mut list.enc));
        self.recording.refs.extend(list.refs.iter().copied());
        self.recording.objects.extend(std::mem::take(&mut list.objects));
        debug!("closed list {}", id);
        Ok(list)
    }

    /// The list currently open, if any.
    pub fn active_list(&self) -> Option<CommandListId> {
        self.list.as_ref().map(|l| l.id)
    }

    pub fn list_debug_label(&mut self, id: CommandListId, name: &str, color: [f32; 4]) -> Result<()> {
        active(&mut self.list, self.next_list, id)?.enc.debug_label(name, color);
        Ok(())
    }

    pub fn list_debug_block_begin(&mut self, id: CommandListId, name: &str, color: [f32; 4]) -> Result<()> {
        active(&mut self.list, self.next_list, id)?.enc.debug_block_begin(name, color);
        Ok(())
    }

    pub fn list_debug_block_end(&mut self, id: CommandListId) -> Result<()> {
        active(&mut self.list, self.next_list, id)?.enc.debug_block_end();
        Ok(())
    }
}
