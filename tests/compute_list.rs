mod common;

use rendev::driver::Op;
use rendev::{
    Access, BarrierMask, BindingType, Buffer, BufferUsage, ComputePipeline, Device, Frame, GPUError, Handle, Limit,
    RenderPipelineInfo, ShaderBinding, ShaderLayout, ShaderStages, Stage, UniformBinding, UniformSet, Variable,
    VariableLevel,
};

struct Kernel {
    pipeline: Handle<ComputePipeline>,
    set: Handle<UniformSet>,
}

fn kernel(device: &mut Device, buffer: Handle<Buffer>, writes: bool, push_constants: u32) -> Kernel {
    let mut binding = ShaderBinding::new(0, BindingType::StorageBuffer);
    if writes {
        binding = binding.writable();
    }
    let layout = ShaderLayout::new(ShaderStages::COMPUTE)
        .with_level(VariableLevel::Frame, vec![binding])
        .with_push_constants(push_constants);
    let shader = common::compute_shader(device, layout);
    let pipeline = device.make_compute_pipeline(shader).unwrap();
    let set = device
        .make_uniform_set(shader, VariableLevel::Frame, &[UniformBinding::new(0, Variable::Buffer(buffer))])
        .unwrap();
    Kernel { pipeline, set }
}

fn run(device: &mut Device, kernels: &[&Kernel], barrier_between: bool) {
    let list = device.compute_list_begin().unwrap();
    for (i, k) in kernels.iter().enumerate() {
        if i > 0 && barrier_between {
            device.compute_list_add_barrier(list).unwrap();
        }
        device.compute_list_bind_compute_pipeline(list, k.pipeline).unwrap();
        device.compute_list_bind_uniform_set(list, k.set, BarrierMask::default()).unwrap();
        device.compute_list_dispatch(list, 4, 1, 1).unwrap();
    }
    device.compute_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn read_after_write_gets_a_buffer_barrier() {
    let (mut device, probe) = common::device();
    let data = device.make_storage_buffer(256, None, BufferUsage::empty()).unwrap();
    let writer = kernel(&mut device, data, true, 0);
    let reader = kernel(&mut device, data, false, 0);

    run(&mut device, &[&writer, &reader], false);
    device.swap_buffers().unwrap();
    let stats = probe.last_submission().expect("submitted");
    assert_eq!(stats.count(Op::Dispatch), 2);
    assert_eq!(stats.count(Op::BufferBarrier), 1);
    assert_eq!(stats.unresolved, 0);
}

#[test]
fn explicit_barrier_covers_following_reads() {
    let (mut device, probe) = common::device();
    let data = device.make_storage_buffer(256, None, BufferUsage::empty()).unwrap();
    let writer = kernel(&mut device, data, true, 0);
    let reader = kernel(&mut device, data, false, 0);

    run(&mut device, &[&writer, &reader], true);
    device.swap_buffers().unwrap();
    let stats = probe.last_submission().expect("submitted");
    assert_eq!(stats.count(Op::BufferBarrier), 0);
    assert_eq!(stats.count(Op::GlobalBarrier), 1);
}

#[test]
fn consecutive_reads_need_no_barrier() {
    let (mut device, probe) = common::device();
    let data = device.make_storage_buffer(256, None, BufferUsage::empty()).unwrap();
    let reader = kernel(&mut device, data, false, 0);

    run(&mut device, &[&reader, &reader, &reader], false);
    device.swap_buffers().unwrap();
    let stats = probe.last_submission().expect("submitted");
    assert_eq!(stats.count(Op::Dispatch), 3);
    assert_eq!(stats.barriers(), 0);
    let state = device.buffer_state(data).expect("tracked");
    assert_eq!(state.stages, Stage::COMPUTE);
    assert_eq!(state.access, Access::SHADER_READ);
}

#[test]
fn disabled_mask_records_without_barriers() {
    let (mut device, probe) = common::device();
    let data = device.make_storage_buffer(256, None, BufferUsage::empty()).unwrap();
    let writer = kernel(&mut device, data, true, 0);

    let list = device.compute_list_begin().unwrap();
    device.compute_list_bind_compute_pipeline(list, writer.pipeline).unwrap();
    device.compute_list_bind_uniform_set(list, writer.set, BarrierMask::DISABLE).unwrap();
    device.compute_list_dispatch(list, 1, 1, 1).unwrap();
    device.compute_list_dispatch(list, 1, 1, 1).unwrap();
    device.compute_list_end(list, BarrierMask::DISABLE).unwrap();

    device.swap_buffers().unwrap();
    assert_eq!(probe.last_submission().expect("submitted").barriers(), 0);
    assert_eq!(
        device.buffer_state(data).map(|s| s.access),
        Some(Access::SHADER_READ | Access::SHADER_WRITE)
    );
}

#[test]
fn dispatch_validates_bindings_and_limits() {
    let (mut device, probe) = common::device();
    let data = device.make_storage_buffer(256, None, BufferUsage::empty()).unwrap();
    let k = kernel(&mut device, data, true, 16);
    probe.set_limit(Limit::MaxComputeWorkgroupCountX, 8);

    let list = device.compute_list_begin().unwrap();
    assert_eq!(device.compute_list_dispatch(list, 1, 1, 1), Err(GPUError::NoPipelineBound));
    device.compute_list_bind_compute_pipeline(list, k.pipeline).unwrap();
    assert_eq!(device.compute_list_dispatch(list, 1, 1, 1), Err(GPUError::MissingUniformSet(0)));
    device.compute_list_bind_uniform_set(list, k.set, BarrierMask::default()).unwrap();
    assert!(device.compute_list_dispatch(list, 1, 1, 1).is_err(), "push constants missing");
    assert!(device.compute_list_set_push_constant(list, &[0; 8]).is_err());
    device.compute_list_set_push_constant(list, &[0; 16]).unwrap();

    assert!(matches!(
        device.compute_list_dispatch(list, 9, 1, 1),
        Err(GPUError::InvalidParameter(_))
    ));
    assert!(device.compute_list_dispatch(list, 1, 0, 1).is_err());
    device.compute_list_dispatch(list, 8, 1, 1).unwrap();
    device.compute_list_end(list, BarrierMask::default()).unwrap();
}

#[test]
fn draw_calls_are_rejected_on_compute_lists() {
    let (mut device, _probe) = common::device();
    let list = device.compute_list_begin().unwrap();
    assert!(matches!(
        device.draw_list_set_blend_constant(list, [0.0; 4]),
        Err(GPUError::InvalidParameter(_))
    ));
    device.compute_list_end(list, BarrierMask::default()).unwrap();
    assert_eq!(device.compute_list_add_barrier(list), Err(GPUError::ListClosed));
}

#[test]
fn scoped_compute_ends_on_error() {
    let (mut device, _probe) = common::device();
    let data = device.make_storage_buffer(64, None, BufferUsage::empty()).unwrap();
    let k = kernel(&mut device, data, true, 0);

    let failed = device.compute(|c| c.dispatch(1, 1, 1));
    assert_eq!(failed, Err(GPUError::NoPipelineBound));
    assert_eq!(device.active_list(), None);

    device
        .compute(|c| {
            c.bind_pipeline(k.pipeline)?;
            c.bind_uniform_set(k.set)?;
            c.dispatch(2, 2, 1)?;
            c.add_barrier()?;
            c.dispatch(2, 2, 1)
        })
        .unwrap();
}

#[test]
fn manual_barriers_wait_until_the_list_ends() {
    let (mut device, probe) = common::device();
    let data = device.make_storage_buffer(256, None, BufferUsage::empty()).unwrap();
    let writer = kernel(&mut device, data, true, 0);
    let reader = kernel(&mut device, data, false, 0);

    let list = device.compute_list_begin().unwrap();
    device.compute_list_bind_compute_pipeline(list, writer.pipeline).unwrap();
    device.compute_list_bind_uniform_set(list, writer.set, BarrierMask::default()).unwrap();
    device.compute_list_dispatch(list, 1, 1, 1).unwrap();
    assert_eq!(device.full_barrier(), Err(GPUError::ListAlreadyActive));
    assert_eq!(
        device.barrier(Stage::COMPUTE, Stage::COMPUTE),
        Err(GPUError::ListAlreadyActive)
    );
    device.compute_list_bind_compute_pipeline(list, reader.pipeline).unwrap();
    device.compute_list_bind_uniform_set(list, reader.set, BarrierMask::default()).unwrap();
    device.compute_list_dispatch(list, 1, 1, 1).unwrap();
    device.compute_list_end(list, BarrierMask::default()).unwrap();
    device.full_barrier().unwrap();

    device.swap_buffers().unwrap();
    let ops = probe.last_submission().expect("submitted").ops;
    let dispatches: Vec<_> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| **op == Op::Dispatch)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(dispatches.len(), 2);
    let barrier = ops.iter().position(|op| *op == Op::BufferBarrier).expect("read waits for the write");
    assert!(dispatches[0] < barrier && barrier < dispatches[1], "{:?}", ops);
    assert_eq!(ops.last(), Some(&Op::GlobalBarrier), "full barrier recorded after the list");
}

#[test]
fn reads_without_barriers_keep_earlier_readers() {
    let (mut device, _probe) = common::device();
    let data = device.make_storage_buffer(256, None, BufferUsage::empty()).unwrap();
    let reader = kernel(&mut device, data, false, 0);
    run(&mut device, &[&reader], false);

    let t = common::simple_target(&mut device, 64);
    let layout = common::storage_layout(ShaderStages::VERTEX | ShaderStages::FRAGMENT, false);
    let shader = common::graphics_shader(&mut device, layout);
    let pipeline = device
        .make_render_pipeline(&RenderPipelineInfo {
            shader,
            framebuffer_format: t.format,
            ..Default::default()
        })
        .unwrap();
    let set = device
        .make_uniform_set(shader, VariableLevel::Frame, &[UniformBinding::new(0, Variable::Buffer(data))])
        .unwrap();

    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();
    device.draw_list_bind_render_pipeline(list, pipeline).unwrap();
    device.draw_list_bind_uniform_set(list, set, BarrierMask::DISABLE).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    device.draw_list_end(list, BarrierMask::DISABLE).unwrap();

    let state = device.buffer_state(data).expect("tracked");
    assert_eq!(state.stages, Stage::COMPUTE | Stage::VERTEX | Stage::FRAGMENT);
    assert_eq!(state.access, Access::SHADER_READ);
}
