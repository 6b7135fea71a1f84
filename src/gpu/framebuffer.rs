use super::backend::BackendId;
use super::error::{GPUError, Result};
use super::resources::Texture;
use super::structs::{Format, SampleCount, TextureType, TextureUsage};
use crate::driver::command::MAX_ATTACHMENTS;
use crate::utils::Handle;

/// Format, sample count and role of one framebuffer attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttachmentFormat {
    pub format: Format,
    pub samples: SampleCount,
    pub usage: TextureUsage,
}

impl AttachmentFormat {
    pub fn color(format: Format) -> Self {
        Self {
            format,
            samples: SampleCount::S1,
            usage: TextureUsage::COLOR_ATTACHMENT,
        }
    }

    pub fn depth(format: Format) -> Self {
        Self {
            format,
            samples: SampleCount::S1,
            usage: TextureUsage::DEPTH_STENCIL_ATTACHMENT,
        }
    }

    pub fn with_samples(mut self, samples: SampleCount) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage |= usage;
        self
    }
}

/// Attachment indices one pass reads and writes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct FramebufferPass {
    pub color_attachments: Vec<u32>,
    pub depth_attachment: Option<u32>,
    pub input_attachments: Vec<u32>,
    pub preserve_attachments: Vec<u32>,
    /// Empty, or one resolve target per color attachment.
    pub resolve_attachments: Vec<u32>,
}

impl FramebufferPass {
    /// Indices this pass writes as render targets.
    pub fn written(&self) -> impl Iterator<Item = u32> + '_ {
        self.color_attachments
            .iter()
            .chain(self.depth_attachment.iter())
            .chain(self.resolve_attachments.iter())
            .copied()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct FramebufferFormatInfo {
    pub attachments: Vec<AttachmentFormat>,
    /// Leave empty for a single pass using every attachment.
    pub passes: Vec<FramebufferPass>,
    /// Multiview view count; 0 and 1 both mean a single view.
    pub view_count: u32,
}

/// Validated attachment layout plus pass list. Framebuffers and pipelines
/// built against equal formats are interchangeable.
#[derive(Debug, Clone)]
pub struct FramebufferFormat {
    pub(crate) raw: BackendId,
    pub info: FramebufferFormatInfo,
}

impl FramebufferFormat {
    pub fn pass_count(&self) -> u32 {
        self.info.passes.len() as u32
    }

    pub fn pass(&self, pass: u32) -> Option<&FramebufferPass> {
        self.info.passes.get(pass as usize)
    }

    pub fn view_count(&self) -> u32 {
        self.info.view_count
    }

    /// Sample count of the render targets of `pass`.
    pub fn texture_samples(&self, pass: u32) -> Result<SampleCount> {
        let pass = self.pass(pass).ok_or(GPUError::NoMorePasses)?;
        Ok(pass
            .color_attachments
            .iter()
            .chain(pass.depth_attachment.iter())
            .map(|i| self.info.attachments[*i as usize].samples)
            .next()
            .unwrap_or(SampleCount::S1))
    }

    pub fn is_compatible(&self, other: &FramebufferFormat) -> bool {
        self.info == other.info
    }
}

fn bad_format(msg: impl Into<String>) -> GPUError {
    GPUError::InvalidFramebufferFormat(msg.into())
}

fn default_pass(attachments: &[AttachmentFormat]) -> FramebufferPass {
    let mut pass = FramebufferPass::default();
    for (i, att) in attachments.iter().enumerate() {
        if att.format.is_depth() {
            if pass.depth_attachment.is_none() {
                pass.depth_attachment = Some(i as u32);
            }
        } else if att.usage.contains(TextureUsage::COLOR_ATTACHMENT) {
            pass.color_attachments.push(i as u32);
        }
    }
    pass
}

/// Check a framebuffer format description and fill in defaults.
///
/// `max_color` caps color attachments per pass; `max_views` is the largest
/// multiview view count the backend accepts.
pub fn validate_format(
    info: &FramebufferFormatInfo,
    max_color: u32,
    max_views: u32,
) -> Result<FramebufferFormatInfo> {
    let mut info = info.clone();
    if info.attachments.is_empty() {
        return Err(bad_format("no attachments"));
    }
    if info.attachments.len() > MAX_ATTACHMENTS {
        return Err(bad_format(format!("more than {} attachments", MAX_ATTACHMENTS)));
    }
    info.view_count = info.view_count.max(1);
    if info.passes.is_empty() {
        info.passes.push(default_pass(&info.attachments));
    }

    let count = info.attachments.len() as u32;
    for (p, pass) in info.passes.iter().enumerate() {
        let in_range = |i: &u32| *i < count;
        let mut all = pass
            .written()
            .chain(pass.input_attachments.iter().copied())
            .chain(pass.preserve_attachments.iter().copied());
        if let Some(i) = all.find(|i| !in_range(i)) {
            return Err(bad_format(format!("pass {}: attachment {} out of range", p, i)));
        }
        if pass.color_attachments.len() as u32 > max_color {
            return Err(bad_format(format!("pass {}: too many color attachments", p)));
        }

        let mut samples = None;
        for (n, &i) in pass.color_attachments.iter().enumerate() {
            let att = &info.attachments[i as usize];
            if att.format.is_depth() || !att.usage.contains(TextureUsage::COLOR_ATTACHMENT) {
                return Err(bad_format(format!("pass {}: attachment {} is not a color target", p, i)));
            }
            if pass.color_attachments[..n].contains(&i) {
                return Err(bad_format(format!("pass {}: color attachment {} listed twice", p, i)));
            }
            if *samples.get_or_insert(att.samples) != att.samples {
                return Err(bad_format(format!("pass {}: mixed sample counts", p)));
            }
        }

        if let Some(d) = pass.depth_attachment {
            let att = &info.attachments[d as usize];
            if !att.format.is_depth() || !att.usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
                return Err(bad_format(format!("pass {}: attachment {} is not a depth target", p, d)));
            }
            if pass.color_attachments.contains(&d) {
                return Err(bad_format(format!("pass {}: attachment {} is color and depth", p, d)));
            }
            if *samples.get_or_insert(att.samples) != att.samples {
                return Err(bad_format(format!("pass {}: depth sample count differs", p)));
            }
        }

        for &i in &pass.input_attachments {
            let att = &info.attachments[i as usize];
            if !att.usage.contains(TextureUsage::INPUT_ATTACHMENT) {
                return Err(bad_format(format!("pass {}: attachment {} lacks input usage", p, i)));
            }
            if pass.color_attachments.contains(&i) || pass.depth_attachment == Some(i) {
                return Err(bad_format(format!("pass {}: attachment {} read and written", p, i)));
            }
        }

        if !pass.resolve_attachments.is_empty() {
            if info.view_count > 1 {
                return Err(GPUError::UnsupportedMultiview);
            }
            if pass.resolve_attachments.len() != pass.color_attachments.len() {
                return Err(bad_format(format!("pass {}: one resolve target per color attachment", p)));
            }
            for (&r, &c) in pass.resolve_attachments.iter().zip(&pass.color_attachments) {
                let target = &info.attachments[r as usize];
                let source = &info.attachments[c as usize];
                if pass.color_attachments.contains(&r) || pass.depth_attachment == Some(r) {
                    return Err(bad_format(format!("pass {}: resolve target {} is also drawn to", p, r)));
                }
                if target.samples != SampleCount::S1 || source.samples == SampleCount::S1 {
                    return Err(bad_format(format!("pass {}: resolve needs multisample into single sample", p)));
                }
                if target.format != source.format || !target.usage.contains(TextureUsage::COLOR_ATTACHMENT) {
                    return Err(bad_format(format!("pass {}: resolve target {} mismatches", p, r)));
                }
            }
        }

        for &i in &pass.preserve_attachments {
            if pass.written().any(|w| w == i) || pass.input_attachments.contains(&i) {
                return Err(bad_format(format!("pass {}: attachment {} preserved and used", p, i)));
            }
        }
    }

    if info.view_count > 1 && info.view_count > max_views {
        return Err(GPUError::UnsupportedMultiview);
    }

    Ok(info)
}

/// Set of textures matching a [`FramebufferFormat`].
#[derive(Debug, Clone)]
pub struct Framebuffer {
    pub(crate) raw: BackendId,
    pub format: Handle<FramebufferFormat>,
    pub textures: Vec<Handle<Texture>>,
    pub width: u32,
    pub height: u32,
}

/// Check `textures` against `format`, returning the framebuffer size.
pub fn validate_framebuffer(format: &FramebufferFormatInfo, textures: &[&Texture]) -> Result<(u32, u32)> {
    let bad = |msg: String| GPUError::InvalidFramebuffer(msg);
    if textures.len() != format.attachments.len() {
        return Err(bad(format!(
            "{} textures for {} attachments",
            textures.len(),
            format.attachments.len()
        )));
    }

    let mut size = None;
    for (i, (tex, att)) in textures.iter().zip(&format.attachments).enumerate() {
        if tex.view_format() != att.format {
            return Err(bad(format!("attachment {}: format {:?} != {:?}", i, tex.view_format(), att.format)));
        }
        if tex.samples != att.samples {
            return Err(bad(format!("attachment {}: sample count mismatch", i)));
        }
        if !tex.usage.contains(att.usage) {
            return Err(bad(format!("attachment {}: texture lacks usage {:?}", i, att.usage)));
        }
        if format.view_count > 1
            && (tex.texture_type != TextureType::D2Array || tex.accessible_layers() < format.view_count)
        {
            return Err(bad(format!("attachment {}: multiview needs a 2D array of {} layers", i, format.view_count)));
        }
        let dims = (tex.dim[0], tex.dim[1]);
        if *size.get_or_insert(dims) != dims {
            return Err(bad(format!("attachment {}: size differs", i)));
        }
    }

    size.ok_or_else(|| bad("no attachments".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba() -> AttachmentFormat {
        AttachmentFormat::color(Format::RGBA8Unorm)
    }

    #[test]
    fn default_pass_collects_color_and_depth() {
        let info = FramebufferFormatInfo {
            attachments: vec![rgba(), AttachmentFormat::depth(Format::D32F), rgba()],
            ..Default::default()
        };
        let info = validate_format(&info, 8, 1).expect("valid");
        assert_eq!(info.passes.len(), 1);
        assert_eq!(info.passes[0].color_attachments, vec![0, 2]);
        assert_eq!(info.passes[0].depth_attachment, Some(1));
        assert_eq!(info.view_count, 1);
    }

    #[test]
    fn out_of_range_attachment_is_rejected() {
        let info = FramebufferFormatInfo {
            attachments: vec![rgba()],
            passes: vec![FramebufferPass {
                color_attachments: vec![3],
                ..Default::default()
            }],
            view_count: 1,
        };
        assert!(matches!(
            validate_format(&info, 8, 1),
            Err(GPUError::InvalidFramebufferFormat(_))
        ));
    }

    #[test]
    fn resolve_requires_multisample_source() {
        let info = FramebufferFormatInfo {
            attachments: vec![rgba(), rgba()],
            passes: vec![FramebufferPass {
                color_attachments: vec![0],
                resolve_attachments: vec![1],
                ..Default::default()
            }],
            view_count: 1,
        };
        assert!(validate_format(&info, 8, 1).is_err());

        let mut ok = info.clone();
        ok.attachments[0] = rgba().with_samples(SampleCount::S4);
        assert!(validate_format(&ok, 8, 1).is_ok());
    }

    #[test]
    fn preserved_attachment_cannot_be_written() {
        let info = FramebufferFormatInfo {
            attachments: vec![rgba()],
            passes: vec![FramebufferPass {
                color_attachments: vec![0],
                preserve_attachments: vec![0],
                ..Default::default()
            }],
            view_count: 1,
        };
        assert!(validate_format(&info, 8, 1).is_err());
    }

    #[test]
    fn multiview_limits() {
        let info = FramebufferFormatInfo {
            attachments: vec![rgba()],
            passes: vec![],
            view_count: 4,
        };
        assert_eq!(validate_format(&info, 8, 2).err(), Some(GPUError::UnsupportedMultiview));
        assert!(validate_format(&info, 8, 6).is_ok());

        let resolve = FramebufferFormatInfo {
            attachments: vec![rgba().with_samples(SampleCount::S4), rgba()],
            passes: vec![FramebufferPass {
                color_attachments: vec![0],
                resolve_attachments: vec![1],
                ..Default::default()
            }],
            view_count: 2,
        };
        assert_eq!(validate_format(&resolve, 8, 6).err(), Some(GPUError::UnsupportedMultiview));
    }
}
