use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

bitflags! {
    /// Pipeline stages the hazard tracker reasons about.
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Stage: u32 {
        const VERTEX = 1 << 0;
        const COMPUTE = 1 << 1;
        const TRANSFER = 1 << 2;
        const FRAGMENT = 1 << 3;
        const RASTER = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}
unsafe impl Zeroable for Stage {}
unsafe impl Pod for Stage {}

bitflags! {
    /// Post-barrier mask accepted by list `end` calls and transfer
    /// operations. `DISABLE` turns automatic insertion off for that call.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BarrierMask: u32 {
        const VERTEX = 1 << 0;
        const COMPUTE = 1 << 1;
        const TRANSFER = 1 << 2;
        const FRAGMENT = 1 << 3;
        const RASTER = Self::VERTEX.bits() | Self::FRAGMENT.bits();
        const ALL = 0x7FFF;
        const DISABLE = 0x8000;
    }
}

impl Default for BarrierMask {
    fn default() -> Self {
        BarrierMask::ALL
    }
}

impl BarrierMask {
    pub fn is_disabled(self) -> bool {
        self.contains(BarrierMask::DISABLE)
    }

    pub fn stages(self) -> Stage {
        Stage::from_bits_truncate(self.bits())
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u32 {
        const INDIRECT_COMMAND_READ = 1 << 0;
        const INDEX_READ = 1 << 1;
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        const UNIFORM_READ = 1 << 3;
        const INPUT_ATTACHMENT_READ = 1 << 4;
        const SHADER_READ = 1 << 5;
        const SHADER_WRITE = 1 << 6;
        const COLOR_ATTACHMENT_READ = 1 << 7;
        const COLOR_ATTACHMENT_WRITE = 1 << 8;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 9;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 10;
        const TRANSFER_READ = 1 << 11;
        const TRANSFER_WRITE = 1 << 12;
        const HOST_READ = 1 << 13;
        const HOST_WRITE = 1 << 14;

        const WRITES = Self::SHADER_WRITE.bits()
            | Self::COLOR_ATTACHMENT_WRITE.bits()
            | Self::DEPTH_STENCIL_ATTACHMENT_WRITE.bits()
            | Self::TRANSFER_WRITE.bits()
            | Self::HOST_WRITE.bits();
    }
}
unsafe impl Zeroable for Access {}
unsafe impl Pod for Access {}

impl Access {
    pub fn is_write(self) -> bool {
        self.intersects(Access::WRITES)
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Layout {
    #[default]
    Undefined = 0,
    General = 1,
    ShaderReadOnly = 2,
    ColorAttachment = 3,
    DepthStencilAttachment = 4,
    DepthStencilReadOnly = 5,
    TransferSrc = 6,
    TransferDst = 7,
    Present = 8,
}

impl Layout {
    pub fn from_raw(v: u32) -> Self {
        match v {
            1 => Layout::General,
            2 => Layout::ShaderReadOnly,
            3 => Layout::ColorAttachment,
            4 => Layout::DepthStencilAttachment,
            5 => Layout::DepthStencilReadOnly,
            6 => Layout::TransferSrc,
            7 => Layout::TransferDst,
            8 => Layout::Present,
            _ => Layout::Undefined,
        }
    }
}

/// Last recorded access of a resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ResState {
    pub stages: Stage,
    pub access: Access,
    pub layout: Layout,
    /// Stages a later global barrier already made this access visible to.
    pub visible: Stage,
}

impl ResState {
    pub fn new(stages: Stage, access: Access, layout: Layout) -> Self {
        Self {
            stages,
            access,
            layout,
            visible: Stage::empty(),
        }
    }
}

#[cfg(feature = "vulkan")]
pub mod vulkan {
    use super::*;
    use ash::vk;

    impl From<Stage> for vk::PipelineStageFlags2 {
        fn from(stage: Stage) -> Self {
            let mut out = vk::PipelineStageFlags2::empty();
            if stage.contains(Stage::VERTEX) {
                out |= vk::PipelineStageFlags2::VERTEX_INPUT | vk::PipelineStageFlags2::VERTEX_SHADER;
            }
            if stage.contains(Stage::FRAGMENT) {
                out |= vk::PipelineStageFlags2::FRAGMENT_SHADER
                    | vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT;
            }
            if stage.contains(Stage::COMPUTE) {
                out |= vk::PipelineStageFlags2::COMPUTE_SHADER;
            }
            if stage.contains(Stage::TRANSFER) {
                out |= vk::PipelineStageFlags2::TRANSFER;
            }
            if out.is_empty() {
                out = vk::PipelineStageFlags2::TOP_OF_PIPE;
            }
            out
        }
    }

    const ACCESS_TABLE: &[(Access, vk::AccessFlags2)] = &[
        (Access::INDIRECT_COMMAND_READ, vk::AccessFlags2::INDIRECT_COMMAND_READ),
        (Access::INDEX_READ, vk::AccessFlags2::INDEX_READ),
        (Access::VERTEX_ATTRIBUTE_READ, vk::AccessFlags2::VERTEX_ATTRIBUTE_READ),
        (Access::UNIFORM_READ, vk::AccessFlags2::UNIFORM_READ),
        (Access::INPUT_ATTACHMENT_READ, vk::AccessFlags2::INPUT_ATTACHMENT_READ),
        (Access::SHADER_READ, vk::AccessFlags2::SHADER_READ),
        (Access::SHADER_WRITE, vk::AccessFlags2::SHADER_WRITE),
        (Access::COLOR_ATTACHMENT_READ, vk::AccessFlags2::COLOR_ATTACHMENT_READ),
        (Access::COLOR_ATTACHMENT_WRITE, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        (Access::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ),
        (Access::DEPTH_STENCIL_ATTACHMENT_WRITE, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (Access::TRANSFER_READ, vk::AccessFlags2::TRANSFER_READ),
        (Access::TRANSFER_WRITE, vk::AccessFlags2::TRANSFER_WRITE),
        (Access::HOST_READ, vk::AccessFlags2::HOST_READ),
        (Access::HOST_WRITE, vk::AccessFlags2::HOST_WRITE),
    ];

    impl From<Access> for vk::AccessFlags2 {
        fn from(acc: Access) -> Self {
            ACCESS_TABLE
                .iter()
                .filter(|(ours, _)| acc.contains(*ours))
                .fold(vk::AccessFlags2::empty(), |out, (_, vk)| out | *vk)
        }
    }

    impl From<Layout> for vk::ImageLayout {
        fn from(layout: Layout) -> Self {
            match layout {
                Layout::Undefined => vk::ImageLayout::UNDEFINED,
                Layout::General => vk::ImageLayout::GENERAL,
                Layout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                Layout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                Layout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                Layout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
                Layout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                Layout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                Layout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrier_mask_bits_match_stage_bits() {
        assert_eq!(BarrierMask::RASTER.stages(), Stage::RASTER);
        assert_eq!(BarrierMask::ALL.stages(), Stage::all());
        assert!(BarrierMask::DISABLE.is_disabled());
        assert!((BarrierMask::COMPUTE | BarrierMask::DISABLE).stages() == Stage::COMPUTE);
    }

    #[test]
    fn write_detection() {
        assert!(Access::SHADER_WRITE.is_write());
        assert!((Access::SHADER_READ | Access::TRANSFER_WRITE).is_write());
        assert!(!(Access::SHADER_READ | Access::UNIFORM_READ).is_write());
    }
}
