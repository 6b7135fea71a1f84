//! Device-level transfer work, recorded in order between command lists.

use log::{trace, warn};

use crate::driver::command::{ClearTexture, CopyTexture};
use crate::gpu::device::Device;
use crate::gpu::error::{invalid, GPUError, Result};
use crate::gpu::resources::{Buffer, Texture};
use crate::gpu::structs::TextureUsage;
use crate::sync::{Access, BarrierBuilder, BarrierMask, Layout, Stage};
use crate::utils::{Handle, RawHandle};

/// Texel region of a texture-to-texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    pub src_offset: [u32; 3],
    pub dst_offset: [u32; 3],
    pub size: [u32; 3],
    pub src_mip: u32,
    pub dst_mip: u32,
    pub src_layer: u32,
    pub dst_layer: u32,
    pub layer_count: u32,
}

impl CopyRegion {
    /// Whole top mip of the first layer.
    pub fn full(size: [u32; 3]) -> Self {
        Self {
            src_offset: [0; 3],
            dst_offset: [0; 3],
            size,
            src_mip: 0,
            dst_mip: 0,
            src_layer: 0,
            dst_layer: 0,
            layer_count: 1,
        }
    }
}

fn mip_extent(tex: &Texture, mip: u32) -> [u32; 3] {
    tex.dim.map(|e| (e >> mip).max(1))
}

fn fits(offset: [u32; 3], size: [u32; 3], extent: [u32; 3]) -> bool {
    (0..3).all(|i| offset[i] as u64 + size[i] as u64 <= extent[i] as u64)
}

impl Device {
    fn check_transferable(&self, raw: RawHandle) -> Result<()> {
        if self.arena.is_pinned(raw) {
            warn!("transfer on {:?} refused: used by an open or suspended draw", raw);
            return Err(GPUError::ResourceInUse);
        }
        Ok(())
    }

    fn texture_for_transfer(
        &self,
        texture: Handle<Texture>,
        usage: TextureUsage,
    ) -> Result<(Texture, Handle<Texture>)> {
        let tex = self.arena.get(texture)?;
        if !tex.usage.contains(usage) {
            return Err(invalid(format!("texture {:?} lacks {:?} usage", texture, usage)));
        }
        let root = tex.storage(texture);
        self.check_transferable(texture.raw())?;
        self.check_transferable(root.raw())?;
        Ok((tex.clone(), root))
    }

    fn record_ref(&mut self, raw: RawHandle) {
        let id = self.arena.backend_object_raw(raw);
        self.recording.track(raw, id);
    }

    fn transfer_post_barrier(&mut self, mask: BarrierMask) {
        if mask.is_disabled() {
            return;
        }
        let dst = mask.stages();
        self.recording.transfer().global_barrier(Stage::TRANSFER, dst);
        self.tracker.global_barrier(Stage::TRANSFER, dst);
    }

    pub fn texture_copy(
        &mut self,
        src: Handle<Texture>,
        dst: Handle<Texture>,
        region: &CopyRegion,
        mask: BarrierMask,
    ) -> Result<()> {
        if src == dst {
            return Err(invalid("copy source and destination are the same texture"));
        }
        let (s, src_root) = self.texture_for_transfer(src, TextureUsage::CAN_COPY_FROM)?;
        let (d, dst_root) = self.texture_for_transfer(dst, TextureUsage::CAN_COPY_INTO)?;
        if s.view_format().bytes_per_pixel() != d.view_format().bytes_per_pixel() || s.samples != d.samples {
            return Err(invalid("copy between incompatible texture formats"));
        }
        if region.size.contains(&0) || region.layer_count == 0 {
            return Err(invalid("empty copy region"));
        }
        if region.src_mip >= s.accessible_mips() || region.dst_mip >= d.accessible_mips() {
            return Err(invalid("copy mip level out of range"));
        }
        if region.src_layer + region.layer_count > s.accessible_layers()
            || region.dst_layer + region.layer_count > d.accessible_layers()
        {
            return Err(invalid("copy layers out of range"));
        }
        if !fits(region.src_offset, region.size, mip_extent(&s, region.src_mip))
            || !fits(region.dst_offset, region.size, mip_extent(&d, region.dst_mip))
        {
            return Err(invalid("copy region outside the texture"));
        }

        let mut builder = BarrierBuilder::new(&mut self.tracker);
        builder.texture(src_root, Stage::TRANSFER, Access::TRANSFER_READ, Layout::TransferSrc);
        builder.texture(dst_root, Stage::TRANSFER, Access::TRANSFER_WRITE, Layout::TransferDst);
        let enc = self.recording.transfer();
        builder.emit(enc);
        enc.copy_texture(&CopyTexture {
            src,
            dst,
            src_offset: region.src_offset,
            dst_offset: region.dst_offset,
            size: region.size,
            src_mip: region.src_mip,
            dst_mip: region.dst_mip,
            src_layer: region.src_layer,
            dst_layer: region.dst_layer,
            layer_count: region.layer_count,
        });
        for raw in [src.raw(), dst.raw(), src_root.raw(), dst_root.raw()] {
            self.record_ref(raw);
        }
        self.transfer_post_barrier(mask);
        trace!("copy {:?} -> {:?}", src, dst);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn texture_clear(
        &mut self,
        texture: Handle<Texture>,
        color: [f32; 4],
        base_mip: u32,
        mip_count: u32,
        base_layer: u32,
        layer_count: u32,
        mask: BarrierMask,
    ) -> Result<()> {
        let (tex, root) = self.texture_for_transfer(texture, TextureUsage::CAN_COPY_INTO)?;
        if tex.view_format().is_depth() {
            return Err(invalid("only color textures can be cleared"));
        }
        if mip_count == 0 || layer_count == 0 {
            return Err(invalid("empty clear range"));
        }
        if base_mip + mip_count > tex.accessible_mips() || base_layer + layer_count > tex.accessible_layers() {
            return Err(invalid("clear range outside the texture"));
        }

        let mut builder = BarrierBuilder::new(&mut self.tracker);
        builder.texture(root, Stage::TRANSFER, Access::TRANSFER_WRITE, Layout::TransferDst);
        let enc = self.recording.transfer();
        builder.emit(enc);
        enc.clear_texture(&ClearTexture {
            texture,
            color,
            base_mip,
            mip_count,
            base_layer,
            layer_count,
        });
        self.record_ref(texture.raw());
        self.record_ref(root.raw());
        self.transfer_post_barrier(mask);
        Ok(())
    }

    /// Resolve a multisampled texture into a single-sampled one of the same
    /// format and size.
    pub fn texture_resolve_multisample(
        &mut self,
        src: Handle<Texture>,
        dst: Handle<Texture>,
        mask: BarrierMask,
    ) -> Result<()> {
        let (s, src_root) = self.texture_for_transfer(src, TextureUsage::CAN_COPY_FROM)?;
        let (d, dst_root) = self.texture_for_transfer(dst, TextureUsage::CAN_COPY_INTO)?;
        if s.samples.count() < 2 || d.samples.count() != 1 {
            return Err(invalid("resolve needs a multisampled source and a single-sampled destination"));
        }
        if s.view_format() != d.view_format() || s.dim != d.dim {
            return Err(invalid("resolve textures differ in format or size"));
        }

        let mut builder = BarrierBuilder::new(&mut self.tracker);
        builder.texture(src_root, Stage::TRANSFER, Access::TRANSFER_READ, Layout::TransferSrc);
        builder.texture(dst_root, Stage::TRANSFER, Access::TRANSFER_WRITE, Layout::TransferDst);
        let enc = self.recording.transfer();
        builder.emit(enc);
        enc.resolve_texture(src, dst);
        for raw in [src.raw(), dst.raw(), src_root.raw(), dst_root.raw()] {
            self.record_ref(raw);
        }
        self.transfer_post_barrier(mask);
        Ok(())
    }

    /// Write `data` at `offset`. The write happens on the GPU timeline, in
    /// order with the surrounding recorded work.
    pub fn buffer_update(&mut self, buffer: Handle<Buffer>, offset: u32, data: &[u8], mask: BarrierMask) -> Result<()> {
        let size = self.arena.get(buffer)?.size;
        self.check_transferable(buffer.raw())?;
        if data.is_empty() {
            return Err(invalid("buffer update without data"));
        }
        if offset as u64 + data.len() as u64 > size as u64 {
            return Err(invalid(format!("update of {} bytes at {} overruns {} bytes", data.len(), offset, size)));
        }

        let mut builder = BarrierBuilder::new(&mut self.tracker);
        builder.buffer(buffer, Stage::TRANSFER, Access::TRANSFER_WRITE);
        let enc = self.recording.transfer();
        builder.emit(enc);
        enc.update_buffer(buffer, offset, data);
        self.record_ref(buffer.raw());
        self.transfer_post_barrier(mask);
        Ok(())
    }

    /// Zero `size` bytes at `offset`; both must be multiples of four.
    pub fn buffer_clear(&mut self, buffer: Handle<Buffer>, offset: u32, size: u32, mask: BarrierMask) -> Result<()> {
        let total = self.arena.get(buffer)?.size;
        self.check_transferable(buffer.raw())?;
        if offset % 4 != 0 || size % 4 != 0 || size == 0 {
            return Err(invalid("buffer clears need a non-zero size and offset aligned to 4"));
        }
        if offset as u64 + size as u64 > total as u64 {
            return Err(invalid(format!("clear of {} bytes at {} overruns {} bytes", size, offset, total)));
        }

        let mut builder = BarrierBuilder::new(&mut self.tracker);
        builder.buffer(buffer, Stage::TRANSFER, Access::TRANSFER_WRITE);
        let enc = self.recording.transfer();
        builder.emit(enc);
        enc.clear_buffer(buffer, offset, size);
        self.record_ref(buffer.raw());
        self.transfer_post_barrier(mask);
        Ok(())
    }

    /// Current contents of `buffer` as the GPU holds them. Work that was
    /// recorded but not yet submitted is not reflected.
    pub fn buffer_get_data(&mut self, buffer: Handle<Buffer>) -> Result<Vec<u8>> {
        let buf = self.arena.get(buffer)?;
        let (raw, size) = (buf.raw, buf.size);
        self.backend.read_buffer(raw, 0, size)
    }

    /// Manual barrier between stage sets. Synchronises unrelated work too;
    /// meant for debugging. Refused while a list is open, since it would
    /// run ahead of that list; use `compute_list_add_barrier` inside one.
    pub fn barrier(&mut self, from: Stage, to: Stage) -> Result<()> {
        self.check_no_list()?;
        warn!("manual barrier {:?} -> {:?}", from, to);
        self.recording.transfer().global_barrier(from, to);
        self.tracker.global_barrier(from, to);
        Ok(())
    }

    /// Barrier from every stage to every stage. Debugging only.
    pub fn full_barrier(&mut self) -> Result<()> {
        self.check_no_list()?;
        warn!("full barrier requested");
        let all = Stage::all();
        self.recording.transfer().global_barrier(all, all);
        self.tracker.global_barrier(all, all);
        Ok(())
    }

    fn check_no_list(&self) -> Result<()> {
        match &self.list {
            Some(list) => {
                warn!("manual barrier refused while list {} is open", list.id);
                Err(GPUError::ListAlreadyActive)
            }
            None => Ok(()),
        }
    }
}
