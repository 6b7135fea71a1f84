use log::{debug, trace};

use super::{active, CommandListId, ComputeState, ListKind};
use crate::gpu::device::Device;
use crate::gpu::error::{invalid, GPUError, Result};
use crate::gpu::pipelines::ComputePipeline;
use crate::gpu::structs::Limit;
use crate::gpu::variables::{binding_stages, ResourceAccess, UniformSet};
use crate::sync::{BarrierBuilder, BarrierMask, Stage};
use crate::utils::Handle;

impl Device {
    pub fn compute_list_begin(&mut self) -> Result<CommandListId> {
        let id = self.open_list(ListKind::Compute(ComputeState::default()))?;
        active(&mut self.list, self.next_list, id)?.enc.begin_compute_list();
        debug!("began compute list {}", id);
        Ok(id)
    }

    pub fn compute_list_bind_compute_pipeline(
        &mut self,
        id: CommandListId,
        pipeline: Handle<ComputePipeline>,
    ) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.compute()?;
        self.arena.get(pipeline)?;
        state.pipeline = Some(pipeline);
        state.push_constant_size = None;
        list.track_handle(&mut self.arena, pipeline);
        list.enc.bind_compute_pipeline(pipeline);
        Ok(())
    }

    /// Bind `set` at its variable level. Barriers for the resources it
    /// references are placed in front of each dispatch that uses it,
    /// unless `mask` disables them; the accesses are still recorded.
    pub fn compute_list_bind_uniform_set(
        &mut self,
        id: CommandListId,
        set: Handle<UniformSet>,
        mask: BarrierMask,
    ) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let uniform = self.arena.get(set)?;
        if !uniform.is_valid(&self.arena) {
            return Err(GPUError::InvalidHandle);
        }
        if uniform.input_attachments().next().is_some() {
            return Err(GPUError::InvalidBinding("input attachments need a draw list".into()));
        }
        let level = uniform.level;
        let resources: Vec<_> = uniform.resources().chain(uniform.textures().map(|t| t.raw())).collect();
        list.compute()?.sets[level as usize] = Some((set, mask));

        list.track_handle(&mut self.arena, set);
        for raw in resources {
            list.track(&mut self.arena, raw);
        }
        list.enc.bind_uniform_set(set, level as u32);
        Ok(())
    }

    pub fn compute_list_set_push_constant(&mut self, id: CommandListId, data: &[u8]) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.compute()?;
        let pipeline = state.pipeline.ok_or(GPUError::NoPipelineBound)?;
        let expected = self.arena.get(pipeline)?.layout.push_constant_size;
        if data.len() as u32 != expected {
            return Err(invalid(format!("push constant of {} bytes, pipeline expects {}", data.len(), expected)));
        }
        state.push_constant_size = Some(expected);
        list.enc.push_constant(data);
        Ok(())
    }

    pub fn compute_list_dispatch(&mut self, id: CommandListId, x: u32, y: u32, z: u32) -> Result<()> {
        let limits = [
            (x, self.limit(Limit::MaxComputeWorkgroupCountX)),
            (y, self.limit(Limit::MaxComputeWorkgroupCountY)),
            (z, self.limit(Limit::MaxComputeWorkgroupCountZ)),
        ];
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.compute()?;
        let pipeline = self.arena.get(state.pipeline.ok_or(GPUError::NoPipelineBound)?)?;

        let mut used = Vec::new();
        for level in pipeline.layout.expected_levels() {
            let (set, mask) = state.sets[level as usize].ok_or(GPUError::MissingUniformSet(level as u32))?;
            let uniform = self.arena.get(set)?;
            if uniform.layout.as_slice() != pipeline.layout.level(level).unwrap_or(&[]) {
                return Err(GPUError::MissingUniformSet(level as u32));
            }
            used.push((uniform.accesses.clone(), mask));
        }
        if pipeline.layout.push_constant_size > 0 && state.push_constant_size.is_none() {
            return Err(invalid("pipeline expects push constants"));
        }
        if let Some((groups, max)) = limits.iter().find(|(g, max)| *g == 0 || *g as u64 > *max) {
            return Err(invalid(format!("{} workgroups, allowed 1..={}", groups, max)));
        }
        state.dispatches += 1;

        let stages = binding_stages(true);
        let mut emitted = 0;
        for (accesses, mask) in used {
            let mut builder = if mask.is_disabled() {
                BarrierBuilder::record_only(&mut self.tracker)
            } else {
                BarrierBuilder::new(&mut self.tracker)
            };
            for access in accesses {
                match access {
                    ResourceAccess::Buffer(buffer, a) => builder.buffer(buffer, stages, a),
                    ResourceAccess::Texture(texture, a, layout) => builder.texture(texture, stages, a, layout),
                }
            }
            emitted += builder.emit(&mut list.enc);
        }
        trace!("dispatch {}x{}x{} in list {} after {} barriers", x, y, z, id, emitted);
        list.enc.dispatch(x, y, z);
        Ok(())
    }

    /// Make everything earlier dispatches wrote visible to later ones.
    pub fn compute_list_add_barrier(&mut self, id: CommandListId) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        list.compute()?;
        list.enc.global_barrier(Stage::COMPUTE, Stage::COMPUTE);
        self.tracker.global_barrier(Stage::COMPUTE, Stage::COMPUTE);
        Ok(())
    }

    pub fn compute_list_end(&mut self, id: CommandListId, mask: BarrierMask) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let dispatches = list.compute()?.dispatches;
        let stages = if mask.is_disabled() {
            Stage::empty()
        } else {
            mask.stages()
        };
        list.enc.end_compute_list(stages);
        self.close_list(id)?;
        if !stages.is_empty() {
            self.tracker.global_barrier(Stage::COMPUTE, stages);
        }
        debug!("ended compute list {} after {} dispatches", id, dispatches);
        Ok(())
    }

    /// Record a compute list inside `f`. The list is closed with a full
    /// post-barrier when `f` returns, also when it fails.
    pub fn compute<R>(&mut self, f: impl FnOnce(&mut ComputeList<'_>) -> Result<R>) -> Result<R> {
        let id = self.compute_list_begin()?;
        let out = f(&mut ComputeList { device: self, id });
        let ended = self.compute_list_end(id, BarrierMask::default());
        let value = out?;
        ended?;
        Ok(value)
    }
}

/// Compute list borrowed for the duration of [`Device::compute`].
pub struct ComputeList<'a> {
    device: &'a mut Device,
    id: CommandListId,
}

impl ComputeList<'_> {
    pub fn id(&self) -> CommandListId {
        self.id
    }

    pub fn bind_pipeline(&mut self, pipeline: Handle<ComputePipeline>) -> Result<()> {
        self.device.compute_list_bind_compute_pipeline(self.id, pipeline)
    }

    pub fn bind_uniform_set(&mut self, set: Handle<UniformSet>) -> Result<()> {
        self.device.compute_list_bind_uniform_set(self.id, set, BarrierMask::default())
    }

    pub fn bind_uniform_set_with(&mut self, set: Handle<UniformSet>, mask: BarrierMask) -> Result<()> {
        self.device.compute_list_bind_uniform_set(self.id, set, mask)
    }

    pub fn set_push_constant(&mut self, data: &[u8]) -> Result<()> {
        self.device.compute_list_set_push_constant(self.id, data)
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.device.compute_list_dispatch(self.id, x, y, z)
    }

    pub fn add_barrier(&mut self) -> Result<()> {
        self.device.compute_list_add_barrier(self.id)
    }

    pub fn debug_label(&mut self, name: &str, color: [f32; 4]) -> Result<()> {
        self.device.list_debug_label(self.id, name, color)
    }
}
