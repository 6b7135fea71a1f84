mod common;

use rendev::driver::Op;
use rendev::{
    Access, AttachmentFormat, BarrierMask, Buffer, BufferUsage, Device, Format, Frame, FrameEnded, FrameStart,
    FramebufferFormatInfo, FramebufferPass, GPUError, Handle, Layout, Rect2D, RenderPipeline, RenderPipelineInfo,
    ShaderStages, Stage, UniformBinding, UniformSet, Variable, VariableLevel,
};

/// Pipeline drawing into `t` plus a set binding `buffer` as storage.
fn storage_draw(
    device: &mut Device,
    t: &common::Target,
    buffer: Handle<Buffer>,
    writes: bool,
) -> (Handle<RenderPipeline>, Handle<UniformSet>) {
    let layout = common::storage_layout(ShaderStages::VERTEX | ShaderStages::FRAGMENT, writes);
    let shader = common::graphics_shader(device, layout);
    let pipeline = device
        .make_render_pipeline(&RenderPipelineInfo {
            shader,
            framebuffer_format: t.format,
            ..Default::default()
        })
        .unwrap();
    let set = device
        .make_uniform_set(shader, VariableLevel::Frame, &[UniformBinding::new(0, Variable::Buffer(buffer))])
        .unwrap();
    (pipeline, set)
}

#[test]
fn clear_then_draw_leaves_attachment_color_written() {
    let (mut device, probe) = common::device();
    let t = common::simple_target(&mut device, 256);

    let frame = Frame::new(t.framebuffer)
        .start(FrameStart::Clear)
        .end(FrameEnded::Read)
        .clear_color([0.0, 0.0, 0.0, 1.0]);
    let list = device.draw_list_begin(&frame).unwrap();
    device.draw_list_bind_render_pipeline(list, t.pipeline).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();

    let state = device.texture_state(t.texture).expect("tracked");
    assert_eq!(state.stages, Stage::FRAGMENT);
    assert_eq!(state.access, Access::COLOR_ATTACHMENT_WRITE);
    assert_eq!(state.layout, Layout::ColorAttachment);

    device.swap_buffers().unwrap();
    let stats = probe.last_submission().expect("submitted");
    assert_eq!(stats.lists, 1);
    assert_eq!(stats.count(Op::Draw), 1);
    assert_eq!(stats.count(Op::TextureBarrier), 1);
    assert_eq!(stats.unresolved, 0);
}

#[test]
fn one_list_at_a_time() {
    let (mut device, _probe) = common::device();
    let t = common::simple_target(&mut device, 64);
    let frame = Frame::new(t.framebuffer).clear_color([0.0; 4]);

    let list = device.draw_list_begin(&frame).unwrap();
    assert_eq!(device.draw_list_begin(&frame), Err(GPUError::ListAlreadyActive));
    assert_eq!(device.compute_list_begin(), Err(GPUError::ListAlreadyActive));
    assert_eq!(device.swap_buffers(), Err(GPUError::ListAlreadyActive));
    assert_eq!(device.active_list(), Some(list));
    device.draw_list_end(list, BarrierMask::default()).unwrap();
    assert_eq!(device.active_list(), None);
}

#[test]
fn ended_and_foreign_list_ids_are_rejected() {
    let (mut device, _probe) = common::device();
    let (mut other, _other_probe) = common::device();
    let t = common::simple_target(&mut device, 64);
    let o = common::simple_target(&mut other, 64);

    let foreign = other.draw_list_begin(&Frame::new(o.framebuffer).clear_color([0.0; 4])).unwrap();
    assert_eq!(device.draw_list_draw(foreign, false, 1, 3), Err(GPUError::ListInactive));

    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();
    assert_eq!(device.draw_list_bind_render_pipeline(list, t.pipeline), Err(GPUError::ListClosed));
    assert_eq!(device.draw_list_end(list, BarrierMask::default()), Err(GPUError::ListClosed));
}

#[test]
fn draw_needs_pipeline_and_instances() {
    let (mut device, _probe) = common::device();
    let t = common::simple_target(&mut device, 64);
    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();

    assert_eq!(device.draw_list_draw(list, false, 1, 3), Err(GPUError::NoPipelineBound));
    device.draw_list_bind_render_pipeline(list, t.pipeline).unwrap();
    assert!(matches!(
        device.draw_list_draw(list, false, 0, 3),
        Err(GPUError::InvalidParameter(_))
    ));
    assert_eq!(device.draw_list_draw(list, true, 1, 3), Err(GPUError::MissingIndexArray));
    device.draw_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn single_pass_format_has_no_next_pass() {
    let (mut device, _probe) = common::device();
    let t = common::simple_target(&mut device, 64);
    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();
    assert_eq!(device.draw_list_switch_to_next_pass(list), Err(GPUError::NoMorePasses));
    device.draw_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn pipelines_bind_only_in_their_pass() {
    let (mut device, _probe) = common::device();
    let first = common::color_texture(&mut device, 64);
    let second = common::color_texture(&mut device, 64);
    let format = device
        .make_framebuffer_format(&FramebufferFormatInfo {
            attachments: vec![
                AttachmentFormat::color(Format::RGBA8Unorm),
                AttachmentFormat::color(Format::RGBA8Unorm),
            ],
            passes: vec![
                FramebufferPass {
                    color_attachments: vec![0],
                    ..Default::default()
                },
                FramebufferPass {
                    color_attachments: vec![1],
                    ..Default::default()
                },
            ],
            view_count: 1,
        })
        .unwrap();
    let framebuffer = device.make_framebuffer(format, &[first, second]).unwrap();
    let shader = common::graphics_shader(
        &mut device,
        rendev::ShaderLayout::new(ShaderStages::VERTEX | ShaderStages::FRAGMENT),
    );
    let second_pass = device
        .make_render_pipeline(&RenderPipelineInfo {
            shader,
            framebuffer_format: format,
            pass: 1,
            ..Default::default()
        })
        .unwrap();

    let frame = Frame::new(framebuffer).clear_color([0.0; 4]).clear_color([1.0; 4]);
    let list = device.draw_list_begin(&frame).unwrap();
    assert_eq!(
        device.draw_list_bind_render_pipeline(list, second_pass),
        Err(GPUError::IncompatiblePipeline)
    );
    device.draw_list_switch_to_next_pass(list).unwrap();
    device.draw_list_bind_render_pipeline(list, second_pass).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    assert_eq!(device.draw_list_switch_to_next_pass(list), Err(GPUError::NoMorePasses));
    device.draw_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn pipeline_levels_need_a_bound_set() {
    let (mut device, _probe) = common::device();
    let t = common::target(&mut device, 64, common::ubo_layout(ShaderStages::VERTEX | ShaderStages::FRAGMENT));
    let ubo = device.make_uniform_buffer(64, None).unwrap();
    let set = device
        .make_uniform_set(t.shader, VariableLevel::Frame, &[UniformBinding::new(0, Variable::Buffer(ubo))])
        .unwrap();

    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();
    device.draw_list_bind_render_pipeline(list, t.pipeline).unwrap();
    assert_eq!(device.draw_list_draw(list, false, 1, 3), Err(GPUError::MissingUniformSet(0)));
    device.draw_list_bind_uniform_set(list, set, BarrierMask::default()).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn bound_buffer_cannot_be_freed_while_list_is_open() {
    let (mut device, probe) = common::device();
    let t = common::target(&mut device, 64, common::ubo_layout(ShaderStages::VERTEX | ShaderStages::FRAGMENT));
    let ubo = device.make_uniform_buffer(64, None).unwrap();
    let set = device
        .make_uniform_set(t.shader, VariableLevel::Frame, &[UniformBinding::new(0, Variable::Buffer(ubo))])
        .unwrap();

    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();
    device.draw_list_bind_uniform_set(list, set, BarrierMask::default()).unwrap();
    assert_eq!(device.free(ubo), Err(GPUError::ResourceInUse));
    assert!(device.is_valid(ubo));
    device.draw_list_end(list, BarrierMask::default()).unwrap();

    device.free(set).unwrap();
    device.free(ubo).unwrap();
    assert!(!device.is_valid(ubo));
    assert!(probe.destroyed().is_empty(), "destroy waits for the recorded work");
}

#[test]
fn attachments_cannot_be_sampled_by_the_same_list() {
    let (mut device, _probe) = common::device();
    let layout = rendev::ShaderLayout::new(ShaderStages::VERTEX | ShaderStages::FRAGMENT).with_level(
        VariableLevel::Material,
        vec![rendev::ShaderBinding::new(0, rendev::BindingType::SampledTexture)],
    );
    let t = common::target(&mut device, 64, layout);
    let set = device
        .make_uniform_set(
            t.shader,
            VariableLevel::Material,
            &[UniformBinding::new(0, Variable::Texture(t.texture))],
        )
        .unwrap();

    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();
    assert_eq!(
        device.draw_list_bind_uniform_set(list, set, BarrierMask::default()),
        Err(GPUError::ResourceInUse)
    );
    device.draw_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn suspended_attachment_must_be_resumed() {
    let (mut device, _probe) = common::device();
    let t = common::simple_target(&mut device, 64);

    let resume = Frame::new(t.framebuffer).start(FrameStart::Resume);
    assert!(matches!(
        device.draw_list_begin(&resume),
        Err(GPUError::InvalidFrameAction(_))
    ));

    let list = device
        .draw_list_begin(&Frame::new(t.framebuffer).end(FrameEnded::Suspend).clear_color([0.0; 4]))
        .unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();

    assert_eq!(device.free(t.texture), Err(GPUError::ResourceInUse));
    let restart = Frame::new(t.framebuffer).clear_color([0.0; 4]);
    assert!(matches!(
        device.draw_list_begin(&restart),
        Err(GPUError::InvalidFrameAction(_))
    ));

    let list = device.draw_list_begin(&resume).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();
    let list = device.draw_list_begin(&restart).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn frame_actions_are_validated() {
    let (mut device, _probe) = common::device();
    let t = common::simple_target(&mut device, 64);

    let no_colors = Frame::new(t.framebuffer);
    assert!(matches!(
        device.draw_list_begin(&no_colors),
        Err(GPUError::InvalidFrameAction(_))
    ));

    let no_region = Frame::new(t.framebuffer).start(FrameStart::ClearRegion).clear_color([0.0; 4]);
    assert!(matches!(
        device.draw_list_begin(&no_region),
        Err(GPUError::InvalidFrameAction(_))
    ));

    let outside = no_region.clone().region(Rect2D { x: 32, y: 32, w: 64, h: 64 });
    assert!(matches!(
        device.draw_list_begin(&outside),
        Err(GPUError::InvalidFrameAction(_))
    ));

    let missing = Frame::new(t.framebuffer).attachment(3, FrameStart::Keep, FrameEnded::Read);
    assert!(matches!(
        device.draw_list_begin(&missing),
        Err(GPUError::InvalidFrameAction(_))
    ));

    let keep = Frame::new(t.framebuffer).start(FrameStart::Keep);
    let list = device.draw_list_begin(&keep).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();
    let state = device.texture_state(t.texture).expect("tracked");
    assert!(state.access.contains(Access::COLOR_ATTACHMENT_READ | Access::COLOR_ATTACHMENT_WRITE));
}

#[test]
fn scoped_drawing_closes_the_list() {
    let (mut device, probe) = common::device();
    let t = common::simple_target(&mut device, 64);

    let frame = Frame::new(t.framebuffer).clear_color([0.2, 0.2, 0.2, 1.0]);
    let result = device.drawing(&frame, |d| {
        d.bind_pipeline(t.pipeline)?;
        d.set_scissor(Some(Rect2D { x: 0, y: 0, w: 32, h: 32 }))?;
        d.draw(3, 1)?;
        d.draw_indexed(3, 1)
    });
    assert_eq!(result, Err(GPUError::MissingIndexArray));
    assert_eq!(device.active_list(), None);

    device
        .drawing(&frame, |d| {
            d.bind_pipeline(t.pipeline)?;
            d.debug_label("triangle", [1.0, 0.0, 0.0, 1.0])?;
            d.draw(3, 2)
        })
        .unwrap();
    device.swap_buffers().unwrap();
    let stats = probe.last_submission().expect("submitted");
    assert_eq!(stats.lists, 2);
    assert_eq!(stats.count(Op::Draw), 2);
    assert_eq!(stats.count(Op::SetScissor), 1);
    assert_eq!(stats.count(Op::DebugLabel), 1);
}

#[test]
fn indexed_draws_use_the_bound_arrays() {
    let (mut device, probe) = common::device();
    let layout = rendev::ShaderLayout::new(ShaderStages::VERTEX | ShaderStages::FRAGMENT).with_vertex_inputs(0b1);
    let texture = common::color_texture(&mut device, 64);
    let format = device.make_framebuffer_format_for(&[texture]).unwrap();
    let framebuffer = device.make_framebuffer(format, &[texture]).unwrap();
    let vertex_format = device
        .make_vertex_format(&[rendev::VertexAttribute {
            location: 0,
            format: Format::RGB32F,
            offset: 0,
            stride: 12,
            ..Default::default()
        }])
        .unwrap();
    let shader = common::graphics_shader(&mut device, layout);
    let pipeline = device
        .make_render_pipeline(&RenderPipelineInfo {
            shader,
            framebuffer_format: format,
            vertex_format: Some(vertex_format),
            ..Default::default()
        })
        .unwrap();

    let positions: Vec<u8> = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect();
    let vertices = device.make_vertex_buffer(36, Some(positions.as_slice())).unwrap();
    let indices = device
        .make_index_buffer(3, rendev::IndexType::U16, Some(&[0u8, 0, 1, 0, 2, 0][..]))
        .unwrap();
    let vertex_array = device.make_vertex_array(vertex_format, 3, &[vertices], &[]).unwrap();
    let index_array = device.make_index_array(indices, 0, 0).unwrap();
    assert_eq!(device.get(index_array).unwrap().index_count, 3);

    let list = device.draw_list_begin(&Frame::new(framebuffer).clear_color([0.0; 4])).unwrap();
    device.draw_list_bind_render_pipeline(list, pipeline).unwrap();
    assert_eq!(device.draw_list_draw(list, false, 1, 0), Err(GPUError::MissingVertexArray));
    device.draw_list_bind_vertex_array(list, vertex_array).unwrap();
    device.draw_list_bind_index_array(list, index_array).unwrap();
    device.draw_list_draw(list, true, 1, 0).unwrap();
    device.draw_list_draw(list, false, 1, 0).unwrap();
    assert!(device.draw_list_draw(list, true, 1, 4).is_err());
    device.draw_list_end(list, BarrierMask::default()).unwrap();

    device.swap_buffers().unwrap();
    let stats = probe.last_submission().expect("submitted");
    assert_eq!(stats.count(Op::DrawIndexed), 1);
    assert_eq!(stats.count(Op::BindVertexArray), 1);
    assert_eq!(stats.unresolved, 0);
    assert_eq!(
        device.buffer_state(vertices).map(|s| s.access),
        Some(Access::VERTEX_ATTRIBUTE_READ)
    );
}

#[test]
fn next_pass_drops_pipeline_and_sets_but_keeps_arrays() {
    let (mut device, _probe) = common::device();
    let first = common::color_texture(&mut device, 64);
    let second = common::color_texture(&mut device, 64);
    let format = device
        .make_framebuffer_format(&FramebufferFormatInfo {
            attachments: vec![
                AttachmentFormat::color(Format::RGBA8Unorm),
                AttachmentFormat::color(Format::RGBA8Unorm),
            ],
            passes: vec![
                FramebufferPass {
                    color_attachments: vec![0],
                    ..Default::default()
                },
                FramebufferPass {
                    color_attachments: vec![1],
                    ..Default::default()
                },
            ],
            view_count: 1,
        })
        .unwrap();
    let framebuffer = device.make_framebuffer(format, &[first, second]).unwrap();
    let vertex_format = device
        .make_vertex_format(&[rendev::VertexAttribute {
            location: 0,
            format: Format::RGB32F,
            offset: 0,
            stride: 12,
            ..Default::default()
        }])
        .unwrap();
    let layout = common::ubo_layout(ShaderStages::VERTEX | ShaderStages::FRAGMENT).with_vertex_inputs(0b1);
    let shader = common::graphics_shader(&mut device, layout);
    let pipelines: Vec<_> = (0..2)
        .map(|pass| {
            device
                .make_render_pipeline(&RenderPipelineInfo {
                    shader,
                    framebuffer_format: format,
                    vertex_format: Some(vertex_format),
                    pass,
                    ..Default::default()
                })
                .unwrap()
        })
        .collect();
    let ubo = device.make_uniform_buffer(64, None).unwrap();
    let set = device
        .make_uniform_set(shader, VariableLevel::Frame, &[UniformBinding::new(0, Variable::Buffer(ubo))])
        .unwrap();
    let vertices = device.make_vertex_buffer(36, None).unwrap();
    let indices = device
        .make_index_buffer(3, rendev::IndexType::U16, Some(&[0u8, 0, 1, 0, 2, 0][..]))
        .unwrap();
    let vertex_array = device.make_vertex_array(vertex_format, 3, &[vertices], &[]).unwrap();
    let index_array = device.make_index_array(indices, 0, 0).unwrap();

    let frame = Frame::new(framebuffer).clear_color([0.0; 4]).clear_color([1.0; 4]);
    let list = device.draw_list_begin(&frame).unwrap();
    device.draw_list_bind_render_pipeline(list, pipelines[0]).unwrap();
    device.draw_list_bind_uniform_set(list, set, BarrierMask::default()).unwrap();
    device.draw_list_bind_vertex_array(list, vertex_array).unwrap();
    device.draw_list_bind_index_array(list, index_array).unwrap();
    device.draw_list_draw(list, false, 1, 0).unwrap();

    device.draw_list_switch_to_next_pass(list).unwrap();
    assert_eq!(device.draw_list_draw(list, false, 1, 0), Err(GPUError::NoPipelineBound));
    device.draw_list_bind_render_pipeline(list, pipelines[1]).unwrap();
    assert_eq!(device.draw_list_draw(list, false, 1, 0), Err(GPUError::MissingUniformSet(0)));
    device.draw_list_bind_uniform_set(list, set, BarrierMask::default()).unwrap();
    device.draw_list_draw(list, false, 1, 0).unwrap();
    device.draw_list_draw(list, true, 1, 0).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn write_then_read_in_one_draw_list_is_refused() {
    let (mut device, probe) = common::device();
    let t = common::simple_target(&mut device, 64);
    let data = device.make_storage_buffer(256, None, BufferUsage::empty()).unwrap();
    let (writer, writes) = storage_draw(&mut device, &t, data, true);
    let (reader, reads) = storage_draw(&mut device, &t, data, false);

    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();
    device.draw_list_bind_render_pipeline(list, writer).unwrap();
    device.draw_list_bind_uniform_set(list, writes, BarrierMask::default()).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    device.draw_list_bind_render_pipeline(list, reader).unwrap();
    assert_eq!(
        device.draw_list_bind_uniform_set(list, reads, BarrierMask::default()),
        Err(GPUError::ResourceInUse)
    );
    device.draw_list_bind_render_pipeline(list, writer).unwrap();
    device.draw_list_bind_uniform_set(list, writes, BarrierMask::default()).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    device.draw_list_end(list, BarrierMask::DISABLE).unwrap();

    let list = device.draw_list_begin(&Frame::new(t.framebuffer).start(FrameStart::Keep)).unwrap();
    device.draw_list_bind_render_pipeline(list, reader).unwrap();
    device.draw_list_bind_uniform_set(list, reads, BarrierMask::default()).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();

    device.swap_buffers().unwrap();
    let ops = probe.last_submission().expect("submitted").ops;
    assert_eq!(ops.iter().filter(|op| **op == Op::BufferBarrier).count(), 1);
    let first_end = ops.iter().position(|op| *op == Op::EndDrawList).unwrap();
    let barrier = ops.iter().position(|op| *op == Op::BufferBarrier).unwrap();
    let second_begin = ops.iter().rposition(|op| *op == Op::BeginDrawList).unwrap();
    assert!(first_end < barrier && barrier < second_begin, "{:?}", ops);
}

