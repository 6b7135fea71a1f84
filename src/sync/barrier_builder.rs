use smallvec::SmallVec;

use super::state::{Access, Layout, Stage};
use super::tracker::StateTracker;
use crate::driver::command::{BufferBarrier, CommandEncoder, TextureBarrier};
use crate::gpu::{Buffer, Texture};
use crate::utils::Handle;

/// Collects the barriers one command needs, then writes them ahead of it.
///
/// With `record_only` the tracker still learns about every access but no
/// barrier is produced.
pub struct BarrierBuilder<'a> {
    tracker: &'a mut StateTracker,
    record_only: bool,
    textures: SmallVec<[TextureBarrier; 4]>,
    buffers: SmallVec<[BufferBarrier; 4]>,
}

impl<'a> BarrierBuilder<'a> {
    pub fn new(tracker: &'a mut StateTracker) -> Self {
        Self {
            tracker,
            record_only: false,
            textures: SmallVec::new(),
            buffers: SmallVec::new(),
        }
    }

    pub fn record_only(tracker: &'a mut StateTracker) -> Self {
        Self {
            record_only: true,
            ..Self::new(tracker)
        }
    }

    pub fn buffer(&mut self, buffer: Handle<Buffer>, stages: Stage, access: Access) {
        if self.record_only {
            self.tracker.record_buffer_state(buffer, stages, access);
        } else if let Some(bar) = self.tracker.request_buffer_state(buffer, stages, access) {
            self.buffers.push(bar);
        }
    }

    pub fn texture(&mut self, texture: Handle<Texture>, stages: Stage, access: Access, layout: Layout) {
        if self.record_only {
            self.tracker.record_texture_state(texture, stages, access, layout);
        } else if let Some(bar) = self.tracker.request_texture_state(texture, stages, access, layout) {
            self.textures.push(bar);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.buffers.is_empty()
    }

    /// Union of the source and destination stages of everything collected.
    pub fn mask(&self) -> Stage {
        self.textures
            .iter()
            .map(|b| b.mask())
            .chain(self.buffers.iter().map(|b| b.mask()))
            .fold(Stage::empty(), |acc, m| acc | m)
    }

    /// Write the collected barriers into `enc` and return how many there were.
    pub fn emit(self, enc: &mut CommandEncoder) -> usize {
        let count = self.textures.len() + self.buffers.len();
        for bar in &self.buffers {
            enc.buffer_barrier(bar);
        }
        for bar in &self.textures {
            enc.texture_barrier(bar);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::command::Op;

    #[test]
    fn emits_only_hazards() {
        let mut tracker = StateTracker::new();
        let buf = Handle::<Buffer>::new(0, 1);
        let tex = Handle::<Texture>::new(0, 1);
        tracker.request_buffer_state(buf, Stage::COMPUTE, Access::SHADER_WRITE);

        let mut enc = CommandEncoder::new();
        let mut builder = BarrierBuilder::new(&mut tracker);
        builder.buffer(buf, Stage::FRAGMENT, Access::SHADER_READ);
        builder.texture(tex, Stage::FRAGMENT, Access::SHADER_READ, Layout::ShaderReadOnly);
        assert_eq!(builder.mask(), Stage::COMPUTE | Stage::FRAGMENT);
        assert_eq!(builder.emit(&mut enc), 2);

        let ops: Vec<Op> = enc.iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![Op::BufferBarrier, Op::TextureBarrier]);
    }

    #[test]
    fn record_only_updates_without_emitting() {
        let mut tracker = StateTracker::new();
        let buf = Handle::<Buffer>::new(0, 1);
        tracker.request_buffer_state(buf, Stage::COMPUTE, Access::SHADER_WRITE);

        let mut enc = CommandEncoder::new();
        let mut builder = BarrierBuilder::record_only(&mut tracker);
        builder.buffer(buf, Stage::FRAGMENT, Access::SHADER_READ);
        assert!(builder.is_empty());
        assert_eq!(builder.emit(&mut enc), 0);
        assert_eq!(tracker.buffer_state(buf).map(|s| s.stages), Some(Stage::FRAGMENT));
    }
}
