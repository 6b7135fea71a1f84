use std::collections::HashSet;

use log::{debug, trace};

use super::arena::ResourceKind;
use super::backend::{BackendId, FenceId, ObjectTable};
use super::device::{Device, DeviceFlavor};
use super::error::{GPUError, Result};
use crate::driver::command::{CommandEncoder, EncoderKind};
use crate::sync::{Access, BarrierBuilder, Layout, Stage};
use crate::utils::RawHandle;

/// Work recorded since the last submission.
#[derive(Default)]
pub(crate) struct Recording {
    pub encoders: Vec<CommandEncoder>,
    /// Every resource the recorded commands name.
    pub refs: HashSet<RawHandle>,
    pub objects: ObjectTable,
    /// Native objects freed while recorded commands still named them.
    pub frees: Vec<(ResourceKind, BackendId)>,
}

impl Recording {
    pub fn is_empty(&self) -> bool {
        self.encoders.iter().all(CommandEncoder::is_empty)
    }

    /// Encoder for device-level transfer work. Consecutive transfer ops
    /// share one encoder; a closed list in between starts a new one.
    pub fn transfer(&mut self) -> &mut CommandEncoder {
        let reuse = matches!(self.encoders.last(), Some(e) if e.kind() == EncoderKind::Transfer);
        if !reuse {
            self.encoders.push(CommandEncoder::with_kind(EncoderKind::Transfer));
        }
        let last = self.encoders.len() - 1;
        &mut self.encoders[last]
    }

    pub fn track(&mut self, raw: RawHandle, id: Option<BackendId>) {
        self.refs.insert(raw);
        if let Some(id) = id {
            self.objects.insert(raw, id);
        }
    }
}

/// One slot of the frame ring: a submission the GPU may still be running.
#[derive(Default)]
pub(crate) struct InFlight {
    pub fence: Option<FenceId>,
    pub serial: u64,
    pub refs: HashSet<RawHandle>,
    pub frees: Vec<(ResourceKind, BackendId)>,
}

impl Device {
    /// Frames presented so far on a primary device, submissions synced on
    /// a local one.
    pub fn frame_number(&self) -> u64 {
        self.frames.frame_number()
    }

    /// Submit the current frame and move to the next slot of the ring,
    /// waiting for the work that last used it.
    pub fn swap_buffers(&mut self) -> Result<()> {
        if self.flavor != DeviceFlavor::Primary {
            return Err(GPUError::PrimaryDeviceOnly);
        }
        if self.list.is_some() {
            return Err(GPUError::ListAlreadyActive);
        }
        self.present_screens();

        let submitted = self.submit_recording()?;
        *self.frames.curr_mut() = submitted;
        self.frames.advance_next_frame();

        let mut next = std::mem::take(self.frames.curr_mut());
        let retired = self.retire(&mut next);
        trace!("frame {} begins in slot {}", self.frames.frame_number(), self.frames.curr_idx());
        retired
    }

    /// Hand everything recorded since the last submit to the GPU. Local
    /// devices only; pair with [`Device::sync`].
    pub fn submit(&mut self) -> Result<()> {
        if self.flavor != DeviceFlavor::Local {
            return Err(GPUError::LocalDeviceOnly);
        }
        if self.list.is_some() {
            return Err(GPUError::ListAlreadyActive);
        }
        if self.frames.curr().fence.is_some() {
            return Err(GPUError::AlreadySubmitted);
        }
        if self.recording.is_empty() {
            return Err(GPUError::NothingRecorded);
        }
        let submitted = self.submit_recording()?;
        *self.frames.curr_mut() = submitted;
        Ok(())
    }

    /// Block until the last [`Device::submit`] retired.
    pub fn sync(&mut self) -> Result<()> {
        if self.flavor != DeviceFlavor::Local {
            return Err(GPUError::LocalDeviceOnly);
        }
        if self.frames.curr().fence.is_none() {
            return Err(GPUError::NothingSubmitted);
        }
        let mut done = std::mem::take(self.frames.curr_mut());
        self.retire(&mut done)?;
        self.frames.advance_next_frame();
        Ok(())
    }

    /// Move the recording into a new in-flight slot, submitting it when
    /// there is anything to run.
    fn submit_recording(&mut self) -> Result<InFlight> {
        let recording = std::mem::take(&mut self.recording);
        self.submit_serial += 1;
        let serial = self.submit_serial;

        if recording.is_empty() {
            for (kind, id) in recording.frees {
                self.backend.destroy(kind, id);
            }
            return Ok(InFlight {
                serial,
                ..Default::default()
            });
        }

        let fence = self.backend.submit(&recording.encoders, &recording.objects)?;
        debug!(
            "submitted {} encoders ({} resources) as fence {}",
            recording.encoders.len(),
            recording.refs.len(),
            fence
        );
        Ok(InFlight {
            fence: Some(fence),
            serial,
            refs: recording.refs,
            frees: recording.frees,
        })
    }

    /// Wait for the slot's fence and destroy what was deferred behind it.
    pub(crate) fn retire(&mut self, frame: &mut InFlight) -> Result<()> {
        let waited = match frame.fence.take() {
            Some(fence) => self.backend.wait(fence),
            None => Ok(()),
        };
        for (kind, id) in frame.frees.drain(..) {
            self.backend.destroy(kind, id);
        }
        frame.refs.clear();
        waited
    }

    /// Transition every screen drawn this frame for presentation.
    fn present_screens(&mut self) {
        let drawn: Vec<_> = self
            .screens
            .values_mut()
            .filter_map(|s| std::mem::take(&mut s.drawn).then_some(s.texture))
            .collect();
        if drawn.is_empty() {
            return;
        }
        let mut builder = BarrierBuilder::new(&mut self.tracker);
        for texture in &drawn {
            builder.texture(*texture, Stage::FRAGMENT, Access::empty(), Layout::Present);
        }
        let enc = self.recording.transfer();
        builder.emit(enc);
        for texture in drawn {
            let id = self.arena.backend_object_raw(texture.raw());
            self.recording.track(texture.raw(), id);
        }
    }
}
