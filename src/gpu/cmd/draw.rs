use std::collections::HashMap;

use log::{debug, warn};

use super::{active, CommandListId, DrawState, ListKind};
use crate::driver::command::{AttachmentOps, BeginDrawList, MAX_ATTACHMENTS};
use crate::gpu::device::Device;
use crate::gpu::error::{invalid, GPUError, Result};
use crate::gpu::framebuffer::{Framebuffer, FramebufferFormat};
use crate::gpu::pipelines::RenderPipeline;
use crate::gpu::resources::{IndexArray, Texture, VertexArray};
use crate::gpu::structs::{ClearValues, Rect2D, TextureInfo, TextureUsage};
use crate::gpu::variables::{binding_stages, ResourceAccess, UniformSet, VARIABLE_LEVELS};
use crate::sync::{Access, BarrierBuilder, BarrierMask, Layout, ResState, Stage};
use crate::utils::{Handle, RawHandle};

/// What happens to an attachment's contents when a draw list starts.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameStart {
    /// Clear the whole attachment.
    #[default]
    Clear,
    /// Clear only the frame's region, keep the rest.
    ClearRegion,
    /// Like `ClearRegion`, continuing a suspended attachment.
    ClearRegionResume,
    /// Keep the previous contents.
    Keep,
    /// Contents are undefined; every texel will be overwritten.
    Write,
    /// Continue a suspended attachment as is.
    Resume,
}

impl FrameStart {
    fn resumes(self) -> bool {
        matches!(self, FrameStart::Resume | FrameStart::ClearRegionResume)
    }

    fn clears(self) -> bool {
        matches!(
            self,
            FrameStart::Clear | FrameStart::ClearRegion | FrameStart::ClearRegionResume
        )
    }

    fn needs_region(self) -> bool {
        matches!(self, FrameStart::ClearRegion | FrameStart::ClearRegionResume)
    }

    /// True when previous contents survive the start of the list.
    fn loads(self) -> bool {
        !matches!(self, FrameStart::Clear | FrameStart::Write)
    }
}

/// What happens to an attachment's contents when a draw list ends.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameEnded {
    /// Store for later reads.
    #[default]
    Read,
    /// Discard.
    Drop,
    /// Store and keep the attachment reserved for a later `Resume`.
    Suspend,
}

/// Target of a draw list: a framebuffer plus what to do with each
/// attachment at the start and end of the list.
#[derive(Debug, Clone)]
pub struct Frame {
    pub framebuffer: Handle<Framebuffer>,
    pub start: FrameStart,
    pub end: FrameEnded,
    /// Per-attachment exceptions to `start`/`end`.
    pub overrides: Vec<(u32, FrameStart, FrameEnded)>,
    pub clear: ClearValues,
    pub region: Option<Rect2D>,
    /// Storage textures the fragment stage reads and writes.
    pub storage_textures: Vec<Handle<Texture>>,
}

impl Frame {
    pub fn new(framebuffer: Handle<Framebuffer>) -> Self {
        Self {
            framebuffer,
            start: FrameStart::default(),
            end: FrameEnded::default(),
            overrides: Vec::new(),
            clear: ClearValues {
                colors: Vec::new(),
                depth: 1.0,
                stencil: 0,
            },
            region: None,
            storage_textures: Vec::new(),
        }
    }

    pub fn start(mut self, start: FrameStart) -> Self {
        self.start = start;
        self
    }

    pub fn end(mut self, end: FrameEnded) -> Self {
        self.end = end;
        self
    }

    pub fn attachment(mut self, index: u32, start: FrameStart, end: FrameEnded) -> Self {
        self.overrides.retain(|(i, _, _)| *i != index);
        self.overrides.push((index, start, end));
        self
    }

    /// Append the clear color of the next color attachment.
    pub fn clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear.colors.push(color);
        self
    }

    pub fn clear_depth(mut self, depth: f32, stencil: u32) -> Self {
        self.clear.depth = depth;
        self.clear.stencil = stencil;
        self
    }

    pub fn region(mut self, region: Rect2D) -> Self {
        self.region = Some(region);
        self
    }

    pub fn storage(mut self, texture: Handle<Texture>) -> Self {
        self.storage_textures.push(texture);
        self
    }

    pub fn actions(&self, attachment: u32) -> (FrameStart, FrameEnded) {
        self.overrides
            .iter()
            .find(|(i, _, _)| *i == attachment)
            .map(|(_, s, e)| (*s, *e))
            .unwrap_or((self.start, self.end))
    }
}

fn bad_action(msg: String) -> GPUError {
    GPUError::InvalidFrameAction(msg)
}

fn access_state(access: &ResourceAccess, stages: Stage) -> (RawHandle, ResState) {
    match *access {
        ResourceAccess::Buffer(buffer, a) => (buffer.raw(), ResState::new(stages, a, Layout::Undefined)),
        ResourceAccess::Texture(texture, a, layout) => (texture.raw(), ResState::new(stages, a, layout)),
    }
}

/// Checks `accesses` against what the list already did to the same
/// resources and returns the ones the tracker still has to see.
///
/// No barrier can be placed between two draws of one list, so a hazard
/// against an earlier access of the same list fails with `ResourceInUse`;
/// the work has to be split over two lists. Repeating an access exactly
/// needs nothing new.
fn first_accesses(
    seen: &mut HashMap<RawHandle, ResState>,
    accesses: &[ResourceAccess],
    stages: Stage,
    id: CommandListId,
) -> Result<Vec<ResourceAccess>> {
    let mut next_seen = seen.clone();
    let mut fresh = Vec::with_capacity(accesses.len());
    for access in accesses {
        let (raw, next) = access_state(access, stages);
        match next_seen.get_mut(&raw) {
            Some(prev) if prev.stages == next.stages && prev.access == next.access && prev.layout == next.layout => {}
            Some(prev) if prev.layout != next.layout || prev.access.is_write() || next.access.is_write() => {
                warn!("{:?} is used again in list {} with a hazard; split the list", raw, id);
                return Err(GPUError::ResourceInUse);
            }
            Some(prev) => {
                prev.stages |= next.stages;
                prev.access |= next.access;
                fresh.push(*access);
            }
            None => {
                next_seen.insert(raw, next);
                fresh.push(*access);
            }
        }
    }
    *seen = next_seen;
    Ok(fresh)
}

struct AttachmentPlan {
    texture: Handle<Texture>,
    root: Handle<Texture>,
    depth: bool,
    start: FrameStart,
    end: FrameEnded,
}

impl Device {
    /// Open a draw list rendering into `frame`.
    pub fn draw_list_begin(&mut self, frame: &Frame) -> Result<CommandListId> {
        if self.list.is_some() {
            return Err(GPUError::ListAlreadyActive);
        }
        let fb = self.arena.get(frame.framebuffer)?.clone();
        self.arena.get(fb.format)?;
        if fb.textures.len() > MAX_ATTACHMENTS {
            return Err(invalid(format!("{} attachments, at most {}", fb.textures.len(), MAX_ATTACHMENTS)));
        }
        if let Some((i, _, _)) = frame.overrides.iter().find(|(i, _, _)| *i as usize >= fb.textures.len()) {
            return Err(bad_action(format!("attachment {} does not exist", i)));
        }

        let mut plan = Vec::with_capacity(fb.textures.len());
        for (i, texture) in fb.textures.iter().enumerate() {
            let tex = self.arena.get(*texture)?;
            let (start, end) = frame.actions(i as u32);
            plan.push(AttachmentPlan {
                texture: *texture,
                root: tex.storage(*texture),
                depth: tex.view_format().is_depth(),
                start,
                end,
            });
        }

        let color_count = plan.iter().filter(|a| !a.depth).count();
        if plan.iter().any(|a| !a.depth && a.start.clears()) && frame.clear.colors.len() != color_count {
            return Err(bad_action(format!(
                "{} clear colors for {} color attachments",
                frame.clear.colors.len(),
                color_count
            )));
        }
        for (i, a) in plan.iter().enumerate() {
            let suspended = self.suspended.contains(&a.root);
            if a.start.resumes() && !suspended {
                return Err(bad_action(format!("attachment {} resumes but was not suspended", i)));
            }
            if suspended && !a.start.resumes() {
                return Err(bad_action(format!("attachment {} is suspended and must be resumed", i)));
            }
            if a.start.needs_region() && frame.region.is_none() {
                return Err(bad_action(format!("attachment {}: {:?} needs a region", i, a.start)));
            }
        }
        let region = match frame.region {
            Some(r) if r.is_empty() || !r.fits(fb.width, fb.height) => {
                return Err(bad_action(format!("region {:?} outside the framebuffer", r)))
            }
            Some(r) => r,
            None => Rect2D {
                x: 0,
                y: 0,
                w: fb.width,
                h: fb.height,
            },
        };

        let mut storage = Vec::with_capacity(frame.storage_textures.len());
        for texture in &frame.storage_textures {
            let tex = self.arena.get(*texture)?;
            if !tex.usage.contains(TextureUsage::STORAGE) {
                return Err(invalid("frame storage texture lacks storage usage"));
            }
            let root = tex.storage(*texture);
            if plan.iter().any(|a| a.root == root) {
                return Err(invalid("a framebuffer attachment cannot also be a storage texture"));
            }
            storage.push((*texture, root));
        }

        let state = DrawState {
            framebuffer: frame.framebuffer,
            format: fb.format,
            attachments: plan.iter().map(|a| a.root).collect(),
            ends: plan.iter().map(|a| a.end).collect(),
            width: fb.width,
            height: fb.height,
            pass: 0,
            pipeline: None,
            sets: [None; VARIABLE_LEVELS],
            vertex_array: None,
            index_array: None,
            push_constant_size: None,
            accessed: HashMap::new(),
        };
        let id = self.open_list(ListKind::Draw(Box::new(state)))?;
        let list = active(&mut self.list, self.next_list, id)?;

        let mut builder = BarrierBuilder::new(&mut self.tracker);
        for a in plan.iter().filter(|a| !a.start.resumes()) {
            if a.depth {
                let access = Access::DEPTH_STENCIL_ATTACHMENT_READ | Access::DEPTH_STENCIL_ATTACHMENT_WRITE;
                builder.texture(a.root, Stage::FRAGMENT, access, Layout::DepthStencilAttachment);
            } else {
                let mut access = Access::COLOR_ATTACHMENT_WRITE;
                if a.start.loads() {
                    access |= Access::COLOR_ATTACHMENT_READ;
                }
                builder.texture(a.root, Stage::FRAGMENT, access, Layout::ColorAttachment);
            }
        }
        for (_, root) in &storage {
            builder.texture(*root, Stage::FRAGMENT, Access::SHADER_READ | Access::SHADER_WRITE, Layout::General);
        }
        let barriers = builder.emit(&mut list.pre);

        let mut ops = [AttachmentOps {
            start: 0,
            end: 0,
            clear: [0.0; 4],
        }; MAX_ATTACHMENTS];
        let mut colors = frame.clear.colors.iter();
        for (op, a) in ops.iter_mut().zip(&plan) {
            op.start = a.start as u32;
            op.end = a.end as u32;
            if !a.depth {
                op.clear = colors.next().copied().unwrap_or([0.0; 4]);
            }
        }

        list.track_handle(&mut self.arena, frame.framebuffer);
        list.track_handle(&mut self.arena, fb.format);
        for a in &plan {
            list.track_handle(&mut self.arena, a.texture);
            list.track_handle(&mut self.arena, a.root);
            if a.start.resumes() && self.suspended.remove(&a.root) {
                self.arena.unpin(a.root.raw());
            }
        }
        for (texture, root) in &storage {
            list.track_handle(&mut self.arena, *texture);
            list.track_handle(&mut self.arena, *root);
        }

        list.enc.begin_draw_list(&BeginDrawList {
            framebuffer: frame.framebuffer,
            region,
            attachment_count: plan.len() as u32,
            attachments: ops,
            clear_depth: frame.clear.depth,
            clear_stencil: frame.clear.stencil,
        });
        debug!(
            "began draw list {} on {:?} ({} attachments, {} barriers)",
            id,
            frame.framebuffer,
            plan.len(),
            barriers
        );
        Ok(id)
    }

    /// Draw list over the screen's render target, cleared to `clear_color`.
    pub fn draw_list_begin_for_screen(&mut self, screen: u32, clear_color: [f32; 4]) -> Result<CommandListId> {
        let (_, framebuffer) = self.screen_target(screen)?;
        let frame = Frame::new(framebuffer).clear_color(clear_color);
        self.draw_list_begin(&frame)
    }

    /// Framebuffer format of the screen's render target, for building
    /// pipelines that draw to it.
    pub fn screen_framebuffer_format(&mut self, screen: u32) -> Result<Handle<FramebufferFormat>> {
        self.screen_target(screen).map(|(format, _)| format)
    }

    fn screen_target(&mut self, screen: u32) -> Result<(Handle<FramebufferFormat>, Handle<Framebuffer>)> {
        if self.is_local() {
            return Err(GPUError::NoScreen);
        }
        let info = self.backend.screen(screen).ok_or(GPUError::NoScreen)?;
        if !self.screens.contains_key(&screen) {
            let texture = self.make_texture(&TextureInfo {
                debug_name: "screen",
                format: info.format,
                dim: [info.width, info.height, 1],
                usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::CAN_COPY_FROM,
                ..Default::default()
            })?;
            let format = self.make_framebuffer_format_for(&[texture])?;
            let framebuffer = self.make_framebuffer(format, &[texture])?;
            debug!("built render target for screen {} ({}x{})", screen, info.width, info.height);
            self.screens.insert(
                screen,
                super::ScreenTarget {
                    format,
                    texture,
                    framebuffer,
                    drawn: false,
                },
            );
        }
        self.screens
            .get(&screen)
            .map(|s| (s.format, s.framebuffer))
            .ok_or(GPUError::NoScreen)
    }

    pub fn draw_list_bind_render_pipeline(
        &mut self,
        id: CommandListId,
        pipeline: Handle<RenderPipeline>,
    ) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.draw()?;
        let format = self.arena.get(state.format)?;
        if !self.arena.get(pipeline)?.is_compatible(format, state.pass) {
            warn!("pipeline {:?} does not match pass {} of list {}", pipeline, state.pass, id);
            return Err(GPUError::IncompatiblePipeline);
        }
        state.pipeline = Some(pipeline);
        state.push_constant_size = None;
        list.track_handle(&mut self.arena, pipeline);
        list.enc.bind_render_pipeline(pipeline);
        Ok(())
    }

    /// Bind `set` at its variable level. Hazards on the resources it
    /// references are resolved before the list starts unless `mask`
    /// disables automatic barriers. A hazard against another binding of
    /// this list fails with `ResourceInUse`.
    pub fn draw_list_bind_uniform_set(
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
        let state = list.draw()?;
        for texture in uniform.textures() {
            if state.attachments.contains(&texture) {
                warn!("set {:?} samples an attachment of list {}", set, id);
                return Err(GPUError::ResourceInUse);
            }
        }
        for texture in uniform.input_attachments() {
            let root = self.arena.get(texture)?.storage(texture);
            if !state.attachments.contains(&root) {
                return Err(GPUError::InvalidBinding(format!(
                    "input attachment {:?} is not part of the framebuffer",
                    texture
                )));
            }
        }
        let level = uniform.level;
        let accesses = uniform.accesses.clone();
        let resources: Vec<_> = uniform.resources().collect();
        let stages = binding_stages(false);
        let fresh = first_accesses(&mut state.accessed, &accesses, stages, id)?;
        state.sets[level as usize] = Some(set);

        let mut builder = if mask.is_disabled() {
            BarrierBuilder::record_only(&mut self.tracker)
        } else {
            BarrierBuilder::new(&mut self.tracker)
        };
        for access in &fresh {
            match *access {
                ResourceAccess::Buffer(buffer, a) => builder.buffer(buffer, stages, a),
                ResourceAccess::Texture(texture, a, layout) => builder.texture(texture, stages, a, layout),
            }
        }
        builder.emit(&mut list.pre);

        list.track_handle(&mut self.arena, set);
        for raw in resources {
            list.track(&mut self.arena, raw);
        }
        for access in &accesses {
            if let ResourceAccess::Texture(root, _, _) = access {
                list.track_handle(&mut self.arena, *root);
            }
        }
        list.enc.bind_uniform_set(set, level as u32);
        Ok(())
    }

    pub fn draw_list_bind_vertex_array(&mut self, id: CommandListId, array: Handle<VertexArray>) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        list.draw()?;
        let va = self.arena.get(array)?.clone();
        let mut ids = Vec::with_capacity(va.buffers.len());
        for (buffer, offset) in va.buffers.iter().zip(&va.offsets) {
            ids.push((self.arena.get(*buffer)?.raw, *offset));
        }

        let wanted: Vec<_> = va
            .buffers
            .iter()
            .map(|b| ResourceAccess::Buffer(*b, Access::VERTEX_ATTRIBUTE_READ))
            .collect();
        let fresh = first_accesses(&mut list.draw()?.accessed, &wanted, Stage::VERTEX, id)?;

        let mut builder = BarrierBuilder::new(&mut self.tracker);
        for access in fresh {
            if let ResourceAccess::Buffer(buffer, a) = access {
                builder.buffer(buffer, Stage::VERTEX, a);
            }
        }
        builder.emit(&mut list.pre);

        list.draw()?.vertex_array = Some(array);
        list.track_handle(&mut self.arena, array);
        list.track_handle(&mut self.arena, va.format);
        for buffer in &va.buffers {
            list.track_handle(&mut self.arena, *buffer);
        }
        list.objects.insert_vertex_array(array, ids);
        list.enc.bind_vertex_array(array);
        Ok(())
    }

    pub fn draw_list_bind_index_array(&mut self, id: CommandListId, array: Handle<IndexArray>) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        list.draw()?;
        let ia = self.arena.get(array)?.clone();
        let buffer_id = self.arena.get(ia.buffer)?.raw;

        let wanted = [ResourceAccess::Buffer(ia.buffer, Access::INDEX_READ)];
        let fresh = first_accesses(&mut list.draw()?.accessed, &wanted, Stage::VERTEX, id)?;

        let mut builder = BarrierBuilder::new(&mut self.tracker);
        if !fresh.is_empty() {
            builder.buffer(ia.buffer, Stage::VERTEX, Access::INDEX_READ);
        }
        builder.emit(&mut list.pre);

        list.draw()?.index_array = Some(array);
        list.track_handle(&mut self.arena, array);
        list.track_handle(&mut self.arena, ia.buffer);
        list.objects.insert_index_array(array, buffer_id, ia.index_type, ia.first_index);
        list.enc.bind_index_array(array);
        Ok(())
    }

    /// Set the push constant block of the bound pipeline. `data` must be
    /// exactly the size the shader declares.
    pub fn draw_list_set_push_constant(&mut self, id: CommandListId, data: &[u8]) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.draw()?;
        let pipeline = state.pipeline.ok_or(GPUError::NoPipelineBound)?;
        let expected = self.arena.get(pipeline)?.layout.push_constant_size;
        if data.len() as u32 != expected {
            return Err(invalid(format!("push constant of {} bytes, pipeline expects {}", data.len(), expected)));
        }
        state.push_constant_size = Some(expected);
        list.enc.push_constant(data);
        Ok(())
    }

    /// Limit drawing to `rect`, or lift the limit with `None`.
    pub fn draw_list_set_scissor(&mut self, id: CommandListId, rect: Option<Rect2D>) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.draw()?;
        if let Some(r) = rect {
            if !r.fits(state.width, state.height) {
                return Err(invalid(format!("scissor {:?} outside the framebuffer", r)));
            }
        }
        list.enc.set_scissor(rect);
        Ok(())
    }

    pub fn draw_list_set_blend_constant(&mut self, id: CommandListId, color: [f32; 4]) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        list.draw()?;
        list.enc.set_blend_constant(color);
        Ok(())
    }

    /// Draw with everything bound so far. A `count` of zero draws the
    /// whole bound vertex or index array.
    pub fn draw_list_draw(&mut self, id: CommandListId, use_indices: bool, instances: u32, count: u32) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.draw()?;
        let pipeline = self.arena.get(state.pipeline.ok_or(GPUError::NoPipelineBound)?)?;

        for level in pipeline.layout.expected_levels() {
            let bound = match state.sets[level as usize] {
                Some(set) => self.arena.get(set)?.layout.as_slice() == pipeline.layout.level(level).unwrap_or(&[]),
                None => false,
            };
            if !bound {
                return Err(GPUError::MissingUniformSet(level as u32));
            }
        }
        if pipeline.layout.push_constant_size > 0 && state.push_constant_size.is_none() {
            return Err(invalid("pipeline expects push constants"));
        }
        if instances == 0 {
            return Err(invalid("draw with zero instances"));
        }

        let vertex_array = match state.vertex_array {
            Some(va) => Some(self.arena.get(va)?),
            None => None,
        };
        if pipeline.layout.vertex_input_mask != 0 {
            let va = vertex_array.ok_or(GPUError::MissingVertexArray)?;
            if pipeline.vertex_format.as_ref() != Some(self.arena.get(va.format)?) {
                return Err(invalid("bound vertex array does not match the pipeline's vertex format"));
            }
        }

        if use_indices {
            let ia = self.arena.get(state.index_array.ok_or(GPUError::MissingIndexArray)?)?;
            let count = if count == 0 { ia.index_count } else { count };
            if count > ia.index_count {
                return Err(invalid(format!("{} indices, array holds {}", count, ia.index_count)));
            }
            list.enc.draw_indexed(count, instances, ia.first_index);
        } else {
            let count = match (count, vertex_array) {
                (0, Some(va)) => va.vertex_count,
                (0, None) => return Err(invalid("vertex count required without a vertex array")),
                (n, _) => n,
            };
            list.enc.draw(count, instances);
        }
        Ok(())
    }

    /// Advance to the next pass of the framebuffer format. Pipeline,
    /// uniform sets and push constants must be bound again; vertex and
    /// index arrays stay bound.
    pub fn draw_list_switch_to_next_pass(&mut self, id: CommandListId) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.draw()?;
        let passes = self.arena.get(state.format)?.pass_count();
        if state.pass + 1 >= passes {
            return Err(GPUError::NoMorePasses);
        }
        state.pass += 1;
        state.pipeline = None;
        state.sets = [None; VARIABLE_LEVELS];
        state.push_constant_size = None;
        let pass = state.pass;
        list.enc.next_pass(pass);
        Ok(())
    }

    /// Close the draw list. Unless `mask` disables it, the stages in
    /// `mask` wait for everything the list rendered.
    pub fn draw_list_end(&mut self, id: CommandListId, mask: BarrierMask) -> Result<()> {
        let list = active(&mut self.list, self.next_list, id)?;
        let state = list.draw()?;
        let framebuffer = state.framebuffer;
        let suspends: Vec<_> = state
            .attachments
            .iter()
            .zip(&state.ends)
            .filter(|(_, end)| **end == FrameEnded::Suspend)
            .map(|(root, _)| *root)
            .collect();
        let stages = if mask.is_disabled() {
            Stage::empty()
        } else {
            mask.stages()
        };
        list.enc.end_draw_list(stages);
        self.close_list(id)?;

        if !stages.is_empty() {
            self.tracker.global_barrier(Stage::RASTER, stages);
        }
        for root in suspends {
            if self.suspended.insert(root) {
                self.arena.pin(root.raw());
            }
        }
        for screen in self.screens.values_mut() {
            if screen.framebuffer == framebuffer {
                screen.drawn = true;
            }
        }
        Ok(())
    }

    /// Record a draw list inside `f`. The list is closed with a full
    /// post-barrier when `f` returns, also when it fails.
    pub fn drawing<R>(&mut self, frame: &Frame, f: impl FnOnce(&mut DrawList<'_>) -> Result<R>) -> Result<R> {
        let id = self.draw_list_begin(frame)?;
        let out = f(&mut DrawList { device: self, id });
        let ended = self.draw_list_end(id, BarrierMask::default());
        let value = out?;
        ended?;
        Ok(value)
    }
}

/// Draw list borrowed for the duration of [`Device::drawing`].
pub struct DrawList<'a> {
    device: &'a mut Device,
    id: CommandListId,
}

impl DrawList<'_> {
    pub fn id(&self) -> CommandListId {
        self.id
    }

    pub fn bind_pipeline(&mut self, pipeline: Handle<RenderPipeline>) -> Result<()> {
        self.device.draw_list_bind_render_pipeline(self.id, pipeline)
    }

    pub fn bind_uniform_set(&mut self, set: Handle<UniformSet>) -> Result<()> {
        self.device.draw_list_bind_uniform_set(self.id, set, BarrierMask::default())
    }

    pub fn bind_uniform_set_with(&mut self, set: Handle<UniformSet>, mask: BarrierMask) -> Result<()> {
        self.device.draw_list_bind_uniform_set(self.id, set, mask)
    }

    pub fn bind_vertex_array(&mut self, array: Handle<VertexArray>) -> Result<()> {
        self.device.draw_list_bind_vertex_array(self.id, array)
    }

    pub fn bind_index_array(&mut self, array: Handle<IndexArray>) -> Result<()> {
        self.device.draw_list_bind_index_array(self.id, array)
    }

    pub fn set_push_constant(&mut self, data: &[u8]) -> Result<()> {
        self.device.draw_list_set_push_constant(self.id, data)
    }

    pub fn set_scissor(&mut self, rect: Option<Rect2D>) -> Result<()> {
        self.device.draw_list_set_scissor(self.id, rect)
    }

    pub fn set_blend_constant(&mut self, color: [f32; 4]) -> Result<()> {
        self.device.draw_list_set_blend_constant(self.id, color)
    }

    pub fn draw(&mut self, vertex_count: u32, instances: u32) -> Result<()> {
        self.device.draw_list_draw(self.id, false, instances, vertex_count)
    }

    pub fn draw_indexed(&mut self, index_count: u32, instances: u32) -> Result<()> {
        self.device.draw_list_draw(self.id, true, instances, index_count)
    }

    pub fn next_pass(&mut self) -> Result<()> {
        self.device.draw_list_switch_to_next_pass(self.id)
    }

    pub fn debug_label(&mut self, name: &str, color: [f32; 4]) -> Result<()> {
        self.device.list_debug_label(self.id, name, color)
    }
}
