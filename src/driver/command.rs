use bytemuck::{bytes_of, pod_read_unaligned, Pod, Zeroable};

use crate::gpu::{
    Buffer, ComputePipeline, Framebuffer, IndexArray, Rect2D, RenderPipeline, Texture, UniformSet,
    VertexArray,
};
use crate::sync::state::{Access, Stage};
use crate::utils::Handle;

/// Most attachments a single framebuffer may carry.
pub const MAX_ATTACHMENTS: usize = 8;

const MAX_LABEL_BYTES: usize = 1024;

//===----------------------------------------------------------------------===//
// Command definitions
//===----------------------------------------------------------------------===//

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Op {
    BeginDrawList = 0,
    NextPass = 1,
    EndDrawList = 2,
    BindRenderPipeline = 3,
    BindComputePipeline = 4,
    BindUniformSet = 5,
    BindVertexArray = 6,
    BindIndexArray = 7,
    PushConstant = 8,
    SetScissor = 9,
    SetBlendConstant = 10,
    Draw = 11,
    DrawIndexed = 12,
    BeginComputeList = 13,
    EndComputeList = 14,
    Dispatch = 15,
    BufferBarrier = 16,
    TextureBarrier = 17,
    GlobalBarrier = 18,
    CopyTexture = 19,
    ClearTexture = 20,
    ResolveTexture = 21,
    UpdateBuffer = 22,
    ClearBuffer = 23,
    DebugLabel = 24,
    DebugBlockBegin = 25,
    DebugBlockEnd = 26,
}

impl Op {
    const ALL: [Op; 27] = [
        Op::BeginDrawList,
        Op::NextPass,
        Op::EndDrawList,
        Op::BindRenderPipeline,
        Op::BindComputePipeline,
        Op::BindUniformSet,
        Op::BindVertexArray,
        Op::BindIndexArray,
        Op::PushConstant,
        Op::SetScissor,
        Op::SetBlendConstant,
        Op::Draw,
        Op::DrawIndexed,
        Op::BeginComputeList,
        Op::EndComputeList,
        Op::Dispatch,
        Op::BufferBarrier,
        Op::TextureBarrier,
        Op::GlobalBarrier,
        Op::CopyTexture,
        Op::ClearTexture,
        Op::ResolveTexture,
        Op::UpdateBuffer,
        Op::ClearBuffer,
        Op::DebugLabel,
        Op::DebugBlockBegin,
        Op::DebugBlockEnd,
    ];

    fn from_u16(v: u16) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }
}

/// Start/end action pair and clear color of one attachment.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct AttachmentOps {
    pub start: u32,
    pub end: u32,
    pub clear: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct BeginDrawList {
    pub framebuffer: Handle<Framebuffer>,
    pub region: Rect2D,
    pub attachment_count: u32,
    pub attachments: [AttachmentOps; MAX_ATTACHMENTS],
    pub clear_depth: f32,
    pub clear_stencil: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct NextPass {
    pub pass: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct EndList {
    pub post_barrier: Stage,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct BindRenderPipeline {
    pub pipeline: Handle<RenderPipeline>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct BindComputePipeline {
    pub pipeline: Handle<ComputePipeline>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct BindUniformSet {
    pub set: Handle<UniformSet>,
    pub level: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct BindVertexArray {
    pub array: Handle<VertexArray>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct BindIndexArray {
    pub array: Handle<IndexArray>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct SetScissor {
    pub rect: Rect2D,
    pub enabled: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct SetBlendConstant {
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct Draw {
    pub vertex_count: u32,
    pub instance_count: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct BeginComputeList {}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct Dispatch {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: Handle<Buffer>,
    pub src_stages: Stage,
    pub dst_stages: Stage,
    pub src_access: Access,
    pub dst_access: Access,
}

impl BufferBarrier {
    pub fn mask(&self) -> Stage {
        self.src_stages | self.dst_stages
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct TextureBarrier {
    pub texture: Handle<Texture>,
    pub src_stages: Stage,
    pub dst_stages: Stage,
    pub src_access: Access,
    pub dst_access: Access,
    pub old_layout: u32,
    pub new_layout: u32,
}

impl TextureBarrier {
    pub fn mask(&self) -> Stage {
        self.src_stages | self.dst_stages
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct GlobalBarrier {
    pub src: Stage,
    pub dst: Stage,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct CopyTexture {
    pub src: Handle<Texture>,
    pub dst: Handle<Texture>,
    pub src_offset: [u32; 3],
    pub dst_offset: [u32; 3],
    pub size: [u32; 3],
    pub src_mip: u32,
    pub dst_mip: u32,
    pub src_layer: u32,
    pub dst_layer: u32,
    pub layer_count: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct ClearTexture {
    pub texture: Handle<Texture>,
    pub color: [f32; 4],
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct ResolveTexture {
    pub src: Handle<Texture>,
    pub dst: Handle<Texture>,
}

/// Fixed part of an `UpdateBuffer` command; the data follows it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct UpdateBuffer {
    pub buffer: Handle<Buffer>,
    pub offset: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct ClearBuffer {
    pub buffer: Handle<Buffer>,
    pub offset: u32,
    pub size: u32,
}

/// Fixed part of a debug label; the UTF-8 name follows it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct DebugLabel {
    pub color: [f32; 4],
}

//===----------------------------------------------------------------------===//
// Command encoder & stream
//===----------------------------------------------------------------------===//

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CmdHeader {
    op: u16,
    size: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EncoderKind {
    Draw,
    Compute,
    #[default]
    Transfer,
}

/// Compact byte stream of recorded commands.
///
/// Each command is a header followed by a `Pod` payload, optionally
/// followed by trailing bytes. The backend walks the stream with
/// [`CommandEncoder::replay`].
#[derive(Clone, Debug, Default)]
pub struct CommandEncoder {
    kind: EncoderKind,
    data: Vec<u8>,
    count: usize,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::with_kind(EncoderKind::Transfer)
    }

    pub fn with_kind(kind: EncoderKind) -> Self {
        Self {
            kind,
            data: Vec::with_capacity(1024),
            count: 0,
        }
    }

    pub fn kind(&self) -> EncoderKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline(always)]
    fn push<T: Pod>(&mut self, op: Op, payload: &T) {
        self.push_with_bytes(op, payload, &[]);
    }

    fn push_with_bytes<T: Pod>(&mut self, op: Op, payload: &T, tail: &[u8]) {
        let size = core::mem::size_of::<T>() + tail.len();
        let header = CmdHeader {
            op: op as u16,
            size: size as u16,
        };
        self.data.extend_from_slice(bytes_of(&header));
        self.data.extend_from_slice(bytes_of(payload));
        self.data.extend_from_slice(tail);
        self.count += 1;
    }

    pub fn begin_draw_list(&mut self, cmd: &BeginDrawList) {
        self.push(Op::BeginDrawList, cmd);
    }

    pub fn next_pass(&mut self, pass: u32) {
        self.push(Op::NextPass, &NextPass { pass });
    }

    pub fn end_draw_list(&mut self, post_barrier: Stage) {
        self.push(Op::EndDrawList, &EndList { post_barrier });
    }

    pub fn bind_render_pipeline(&mut self, pipeline: Handle<RenderPipeline>) {
        self.push(Op::BindRenderPipeline, &BindRenderPipeline { pipeline });
    }

    pub fn bind_compute_pipeline(&mut self, pipeline: Handle<ComputePipeline>) {
        self.push(Op::BindComputePipeline, &BindComputePipeline { pipeline });
    }

    pub fn bind_uniform_set(&mut self, set: Handle<UniformSet>, level: u32) {
        self.push(Op::BindUniformSet, &BindUniformSet { set, level });
    }

    pub fn bind_vertex_array(&mut self, array: Handle<VertexArray>) {
        self.push(Op::BindVertexArray, &BindVertexArray { array });
    }

    pub fn bind_index_array(&mut self, array: Handle<IndexArray>) {
        self.push(Op::BindIndexArray, &BindIndexArray { array });
    }

    pub fn push_constant(&mut self, data: &[u8]) {
        self.push_with_bytes(Op::PushConstant, &(), data);
    }

    pub fn set_scissor(&mut self, rect: Option<Rect2D>) {
        let cmd = SetScissor {
            rect: rect.unwrap_or_default(),
            enabled: rect.is_some() as u32,
        };
        self.push(Op::SetScissor, &cmd);
    }

    pub fn set_blend_constant(&mut self, color: [f32; 4]) {
        self.push(Op::SetBlendConstant, &SetBlendConstant { color });
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.push(Op::Draw, &Draw { vertex_count, instance_count });
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32) {
        let cmd = DrawIndexed {
            index_count,
            instance_count,
            first_index,
        };
        self.push(Op::DrawIndexed, &cmd);
    }

    pub fn begin_compute_list(&mut self) {
        self.push(Op::BeginComputeList, &BeginComputeList {});
    }

    pub fn end_compute_list(&mut self, post_barrier: Stage) {
        self.push(Op::EndComputeList, &EndList { post_barrier });
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(Op::Dispatch, &Dispatch { x, y, z });
    }

    pub fn buffer_barrier(&mut self, cmd: &BufferBarrier) {
        self.push(Op::BufferBarrier, cmd);
    }

    pub fn texture_barrier(&mut self, cmd: &TextureBarrier) {
        self.push(Op::TextureBarrier, cmd);
    }

    pub fn global_barrier(&mut self, src: Stage, dst: Stage) {
        self.push(Op::GlobalBarrier, &GlobalBarrier { src, dst });
    }

    pub fn copy_texture(&mut self, cmd: &CopyTexture) {
        self.push(Op::CopyTexture, cmd);
    }

    pub fn clear_texture(&mut self, cmd: &ClearTexture) {
        self.push(Op::ClearTexture, cmd);
    }

    pub fn resolve_texture(&mut self, src: Handle<Texture>, dst: Handle<Texture>) {
        self.push(Op::ResolveTexture, &ResolveTexture { src, dst });
    }

    /// Record a buffer update. Large updates are split so each command
    /// fits the header's size field.
    pub fn update_buffer(&mut self, buffer: Handle<Buffer>, offset: u32, data: &[u8]) {
        const CHUNK: usize = u16::MAX as usize - core::mem::size_of::<UpdateBuffer>();
        for (i, chunk) in data.chunks(CHUNK).enumerate() {
            let cmd = UpdateBuffer {
                buffer,
                offset: offset + (i * CHUNK) as u32,
            };
            self.push_with_bytes(Op::UpdateBuffer, &cmd, chunk);
        }
    }

    pub fn clear_buffer(&mut self, buffer: Handle<Buffer>, offset: u32, size: u32) {
        self.push(Op::ClearBuffer, &ClearBuffer { buffer, offset, size });
    }

    pub fn debug_label(&mut self, name: &str, color: [f32; 4]) {
        let name = truncate_label(name);
        self.push_with_bytes(Op::DebugLabel, &DebugLabel { color }, name.as_bytes());
    }

    pub fn debug_block_begin(&mut self, name: &str, color: [f32; 4]) {
        let name = truncate_label(name);
        self.push_with_bytes(Op::DebugBlockBegin, &DebugLabel { color }, name.as_bytes());
    }

    pub fn debug_block_end(&mut self) {
        self.push(Op::DebugBlockEnd, &());
    }

    /// Hand every recorded command to `sink`, in recording order.
    pub fn replay<S: CommandSink + ?Sized>(&self, sink: &mut S) {
        for cmd in self.iter() {
            match cmd.op {
                Op::BeginDrawList => sink.begin_draw_list(&cmd.payload()),
                Op::NextPass => sink.next_pass(&cmd.payload()),
                Op::EndDrawList => sink.end_draw_list(&cmd.payload()),
                Op::BindRenderPipeline => sink.bind_render_pipeline(&cmd.payload()),
                Op::BindComputePipeline => sink.bind_compute_pipeline(&cmd.payload()),
                Op::BindUniformSet => sink.bind_uniform_set(&cmd.payload()),
                Op::BindVertexArray => sink.bind_vertex_array(&cmd.payload()),
                Op::BindIndexArray => sink.bind_index_array(&cmd.payload()),
                Op::PushConstant => sink.push_constant(cmd.bytes),
                Op::SetScissor => sink.set_scissor(&cmd.payload()),
                Op::SetBlendConstant => sink.set_blend_constant(&cmd.payload()),
                Op::Draw => sink.draw(&cmd.payload()),
                Op::DrawIndexed => sink.draw_indexed(&cmd.payload()),
                Op::BeginComputeList => sink.begin_compute_list(),
                Op::EndComputeList => sink.end_compute_list(&cmd.payload()),
                Op::Dispatch => sink.dispatch(&cmd.payload()),
                Op::BufferBarrier => sink.buffer_barrier(&cmd.payload()),
                Op::TextureBarrier => sink.texture_barrier(&cmd.payload()),
                Op::GlobalBarrier => sink.global_barrier(&cmd.payload()),
                Op::CopyTexture => sink.copy_texture(&cmd.payload()),
                Op::ClearTexture => sink.clear_texture(&cmd.payload()),
                Op::ResolveTexture => sink.resolve_texture(&cmd.payload()),
                Op::UpdateBuffer => {
                    let (head, data) = cmd.split::<UpdateBuffer>();
                    sink.update_buffer(&head, data);
                }
                Op::ClearBuffer => sink.clear_buffer(&cmd.payload()),
                Op::DebugLabel => {
                    let (head, name) = cmd.split::<DebugLabel>();
                    sink.debug_label(&head, &String::from_utf8_lossy(name));
                }
                Op::DebugBlockBegin => {
                    let (head, name) = cmd.split::<DebugLabel>();
                    sink.debug_block_begin(&head, &String::from_utf8_lossy(name));
                }
                Op::DebugBlockEnd => sink.debug_block_end(),
            }
        }
    }

    /// Iterate over recorded commands.
    pub fn iter(&self) -> CommandIter<'_> {
        CommandIter { data: &self.data }
    }
}

fn truncate_label(name: &str) -> &str {
    if name.len() <= MAX_LABEL_BYTES {
        return name;
    }
    let mut end = MAX_LABEL_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Receiver of a replayed command stream. Backends implement this to turn
/// recorded work into API calls.
pub trait CommandSink {
    fn begin_draw_list(&mut self, cmd: &BeginDrawList);
    fn next_pass(&mut self, cmd: &NextPass);
    fn end_draw_list(&mut self, cmd: &EndList);
    fn bind_render_pipeline(&mut self, cmd: &BindRenderPipeline);
    fn bind_compute_pipeline(&mut self, cmd: &BindComputePipeline);
    fn bind_uniform_set(&mut self, cmd: &BindUniformSet);
    fn bind_vertex_array(&mut self, cmd: &BindVertexArray);
    fn bind_index_array(&mut self, cmd: &BindIndexArray);
    fn push_constant(&mut self, data: &[u8]);
    fn set_scissor(&mut self, cmd: &SetScissor);
    fn set_blend_constant(&mut self, cmd: &SetBlendConstant);
    fn draw(&mut self, cmd: &Draw);
    fn draw_indexed(&mut self, cmd: &DrawIndexed);
    fn begin_compute_list(&mut self);
    fn end_compute_list(&mut self, cmd: &EndList);
    fn dispatch(&mut self, cmd: &Dispatch);
    fn buffer_barrier(&mut self, cmd: &BufferBarrier);
    fn texture_barrier(&mut self, cmd: &TextureBarrier);
    fn global_barrier(&mut self, cmd: &GlobalBarrier);
    fn copy_texture(&mut self, cmd: &CopyTexture);
    fn clear_texture(&mut self, cmd: &ClearTexture);
    fn resolve_texture(&mut self, cmd: &ResolveTexture);
    fn update_buffer(&mut self, cmd: &UpdateBuffer, data: &[u8]);
    fn clear_buffer(&mut self, cmd: &ClearBuffer);
    fn debug_label(&mut self, _cmd: &DebugLabel, _name: &str) {}
    fn debug_block_begin(&mut self, _cmd: &DebugLabel, _name: &str) {}
    fn debug_block_end(&mut self) {}
}

//===----------------------------------------------------------------------===//
// Iteration
//===----------------------------------------------------------------------===//

pub struct Command<'a> {
    pub op: Op,
    bytes: &'a [u8],
}

impl<'a> Command<'a> {
    pub fn payload<T: Pod>(&self) -> T {
        pod_read_unaligned(&self.bytes[..core::mem::size_of::<T>()])
    }

    /// Fixed payload plus whatever trails it.
    pub fn split<T: Pod>(&self) -> (T, &'a [u8]) {
        let (head, tail) = self.bytes.split_at(core::mem::size_of::<T>());
        (pod_read_unaligned(head), tail)
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

pub struct CommandIter<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for CommandIter<'a> {
    type Item = Command<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        use core::mem::size_of;
        if self.data.len() < size_of::<CmdHeader>() {
            return None;
        }
        let (head_bytes, rest) = self.data.split_at(size_of::<CmdHeader>());
        let header: CmdHeader = pod_read_unaligned(head_bytes);
        if rest.len() < header.size as usize {
            return None;
        }
        let (payload, remaining) = rest.split_at(header.size as usize);
        self.data = remaining;
        Some(Command {
            op: Op::from_u16(header.op)?,
            bytes: payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        draws: Vec<Draw>,
        pushes: Vec<Vec<u8>>,
        updates: Vec<(u32, usize)>,
        labels: Vec<String>,
        barriers: usize,
    }

    impl CommandSink for Recorder {
        fn begin_draw_list(&mut self, _cmd: &BeginDrawList) {}
        fn next_pass(&mut self, _cmd: &NextPass) {}
        fn end_draw_list(&mut self, _cmd: &EndList) {}
        fn bind_render_pipeline(&mut self, _cmd: &BindRenderPipeline) {}
        fn bind_compute_pipeline(&mut self, _cmd: &BindComputePipeline) {}
        fn bind_uniform_set(&mut self, _cmd: &BindUniformSet) {}
        fn bind_vertex_array(&mut self, _cmd: &BindVertexArray) {}
        fn bind_index_array(&mut self, _cmd: &BindIndexArray) {}
        fn push_constant(&mut self, data: &[u8]) {
            self.pushes.push(data.to_vec());
        }
        fn set_scissor(&mut self, _cmd: &SetScissor) {}
        fn set_blend_constant(&mut self, _cmd: &SetBlendConstant) {}
        fn draw(&mut self, cmd: &Draw) {
            self.draws.push(*cmd);
        }
        fn draw_indexed(&mut self, _cmd: &DrawIndexed) {}
        fn begin_compute_list(&mut self) {}
        fn end_compute_list(&mut self, _cmd: &EndList) {}
        fn dispatch(&mut self, _cmd: &Dispatch) {}
        fn buffer_barrier(&mut self, _cmd: &BufferBarrier) {
            self.barriers += 1;
        }
        fn texture_barrier(&mut self, _cmd: &TextureBarrier) {
            self.barriers += 1;
        }
        fn global_barrier(&mut self, _cmd: &GlobalBarrier) {
            self.barriers += 1;
        }
        fn copy_texture(&mut self, _cmd: &CopyTexture) {}
        fn clear_texture(&mut self, _cmd: &ClearTexture) {}
        fn resolve_texture(&mut self, _cmd: &ResolveTexture) {}
        fn update_buffer(&mut self, cmd: &UpdateBuffer, data: &[u8]) {
            self.updates.push((cmd.offset, data.len()));
        }
        fn clear_buffer(&mut self, _cmd: &ClearBuffer) {}
        fn debug_label(&mut self, _cmd: &DebugLabel, name: &str) {
            self.labels.push(name.to_string());
        }
    }

    #[test]
    fn replay_preserves_order_and_payloads() {
        let mut enc = CommandEncoder::with_kind(EncoderKind::Draw);
        enc.global_barrier(Stage::COMPUTE, Stage::FRAGMENT);
        enc.push_constant(&[1, 2, 3, 4, 5]);
        enc.draw(3, 1);
        enc.debug_label("shadow pass", [1.0; 4]);
        enc.draw(6, 2);
        assert_eq!(enc.len(), 5);

        let mut rec = Recorder::default();
        enc.replay(&mut rec);
        assert_eq!(rec.barriers, 1);
        assert_eq!(rec.pushes, vec![vec![1, 2, 3, 4, 5]]);
        assert_eq!(rec.labels, vec!["shadow pass".to_string()]);
        assert_eq!(
            rec.draws,
            vec![
                Draw { vertex_count: 3, instance_count: 1 },
                Draw { vertex_count: 6, instance_count: 2 }
            ]
        );
    }

    #[test]
    fn large_updates_are_chunked() {
        let mut enc = CommandEncoder::new();
        let data = vec![7u8; 200_000];
        enc.update_buffer(Handle::new(0, 1), 16, &data);
        assert!(enc.len() > 1);

        let mut rec = Recorder::default();
        enc.replay(&mut rec);
        let total: usize = rec.updates.iter().map(|(_, n)| n).sum();
        assert_eq!(total, data.len());
        assert_eq!(rec.updates[0].0, 16);
    }

    #[test]
    fn scissor_none_disables() {
        let mut enc = CommandEncoder::new();
        enc.set_scissor(None);
        let cmd = enc.iter().next().expect("one command");
        assert_eq!(cmd.op, Op::SetScissor);
        assert_eq!(cmd.payload::<SetScissor>().enabled, 0);
    }
}
