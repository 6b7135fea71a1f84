use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::trace;

use super::state::{Access, Layout, ResState, Stage};
use crate::driver::command::{BufferBarrier, TextureBarrier};
use crate::gpu::{Buffer, Texture};
use crate::utils::Handle;

/// Per-resource record of the last access, used to decide when a barrier
/// has to precede a new one.
///
/// A barrier is needed when either access writes, or when a texture's
/// layout changes. Consecutive reads in the same layout merge into one
/// record so a later write waits for all of them. A global barrier marks
/// recorded accesses visible to its destination stages; later reads fully
/// inside those stages need nothing more.
#[derive(Default)]
pub struct StateTracker {
    textures: HashMap<Handle<Texture>, ResState>,
    buffers: HashMap<Handle<Buffer>, ResState>,
}

enum Decision {
    Barrier,
    Merge,
}

fn decide(prev: &ResState, next: &ResState) -> Decision {
    if prev.layout != next.layout {
        return Decision::Barrier;
    }
    let hazard = prev.access.is_write() || next.access.is_write();
    if !hazard {
        return Decision::Merge;
    }
    if !next.access.is_write() && prev.visible.contains(next.stages) && !next.stages.is_empty() {
        return Decision::Merge;
    }
    Decision::Barrier
}

fn merge(prev: &mut ResState, next: &ResState) {
    prev.stages |= next.stages;
    prev.access |= next.access;
}

fn record<K>(entry: Entry<'_, K, ResState>, next: ResState) {
    match entry {
        Entry::Occupied(mut slot) => {
            let prev = slot.get_mut();
            if prev.layout == next.layout && !prev.access.is_write() && !next.access.is_write() {
                merge(prev, &next);
            } else {
                *prev = next;
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(next);
        }
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_buffer_state(
        &mut self,
        buffer: Handle<Buffer>,
        stages: Stage,
        access: Access,
    ) -> Option<BufferBarrier> {
        let next = ResState::new(stages, access, Layout::Undefined);
        let Some(prev) = self.buffers.get_mut(&buffer) else {
            self.buffers.insert(buffer, next);
            return None;
        };

        match decide(prev, &next) {
            Decision::Merge => {
                merge(prev, &next);
                None
            }
            Decision::Barrier => {
                let barrier = BufferBarrier {
                    buffer,
                    src_stages: prev.stages,
                    dst_stages: stages,
                    src_access: prev.access,
                    dst_access: access,
                };
                trace!("buffer barrier {:?}: {:?} -> {:?}", buffer, prev.stages, stages);
                *prev = next;
                Some(barrier)
            }
        }
    }

    pub fn request_texture_state(
        &mut self,
        texture: Handle<Texture>,
        stages: Stage,
        access: Access,
        layout: Layout,
    ) -> Option<TextureBarrier> {
        let next = ResState::new(stages, access, layout);
        let prev = self
            .textures
            .entry(texture)
            .or_insert_with(|| ResState::new(Stage::empty(), Access::empty(), Layout::Undefined));

        if prev.layout == Layout::Undefined && prev.access.is_empty() && layout == Layout::Undefined {
            *prev = next;
            return None;
        }

        match decide(prev, &next) {
            Decision::Merge => {
                merge(prev, &next);
                None
            }
            Decision::Barrier => {
                let barrier = TextureBarrier {
                    texture,
                    src_stages: prev.stages,
                    dst_stages: stages,
                    src_access: prev.access,
                    dst_access: access,
                    old_layout: prev.layout as u32,
                    new_layout: layout as u32,
                };
                trace!(
                    "texture barrier {:?}: {:?}/{:?} -> {:?}/{:?}",
                    texture,
                    prev.stages,
                    prev.layout,
                    stages,
                    layout
                );
                *prev = next;
                Some(barrier)
            }
        }
    }

    /// Record an access without producing a barrier. Used when the caller
    /// turned automatic insertion off. Reads in the same layout join the
    /// earlier readers; anything else replaces them.
    pub fn record_buffer_state(&mut self, buffer: Handle<Buffer>, stages: Stage, access: Access) {
        record(self.buffers.entry(buffer), ResState::new(stages, access, Layout::Undefined));
    }

    pub fn record_texture_state(
        &mut self,
        texture: Handle<Texture>,
        stages: Stage,
        access: Access,
        layout: Layout,
    ) {
        record(self.textures.entry(texture), ResState::new(stages, access, layout));
    }

    /// A barrier from `src` to `dst` stages was recorded. Every access that
    /// happened entirely within `src` becomes visible to `dst`.
    pub fn global_barrier(&mut self, src: Stage, dst: Stage) {
        for state in self.buffers.values_mut().chain(self.textures.values_mut()) {
            if src.contains(state.stages) {
                state.visible |= dst;
            }
        }
    }

    pub fn buffer_state(&self, buffer: Handle<Buffer>) -> Option<ResState> {
        self.buffers.get(&buffer).copied()
    }

    pub fn texture_state(&self, texture: Handle<Texture>) -> Option<ResState> {
        self.textures.get(&texture).copied()
    }

    pub fn forget_buffer(&mut self, buffer: Handle<Buffer>) {
        self.buffers.remove(&buffer);
    }

    pub fn forget_texture(&mut self, texture: Handle<Texture>) {
        self.textures.remove(&texture);
    }
}
