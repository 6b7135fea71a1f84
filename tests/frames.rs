mod common;

use rstest::rstest;
use rendev::driver::Op;
use rendev::{
    AdapterInfo, BarrierMask, BufferUsage, ContextInfo, Device, DeviceFlavor, Format, Frame, GPUError, NullBackend,
    RenderPipelineInfo, ResourceKind, ScreenInfo, ShaderLayout, ShaderStages, MAX_FRAME_DELAY,
};

fn touch(device: &mut Device, buffer: rendev::Handle<rendev::Buffer>) {
    device
        .buffer_update(buffer, 0, &[1, 2, 3, 4], BarrierMask::default())
        .unwrap();
}

#[test]
fn swap_buffers_waits_frame_delay_behind() {
    let (mut device, probe) = common::device();
    assert_eq!(device.frame_delay(), 2);
    let buffer = device.make_storage_buffer(16, None, BufferUsage::empty()).unwrap();

    for frame in 1..=5u64 {
        touch(&mut device, buffer);
        device.swap_buffers().unwrap();
        assert_eq!(device.frame_number(), frame);
        assert_eq!(probe.retired_fence(), frame - 1);
    }
    assert_eq!(probe.submissions().len(), 5);
}

#[test]
fn empty_frames_submit_nothing() {
    let (mut device, probe) = common::device();
    device.swap_buffers().unwrap();
    device.swap_buffers().unwrap();
    assert!(probe.submissions().is_empty());
    assert_eq!(device.frame_number(), 2);
}

#[rstest]
#[case(0, 1)]
#[case(1, 1)]
#[case(3, 3)]
#[case(9, MAX_FRAME_DELAY)]
fn frame_delay_is_configurable_and_clamped(#[case] requested: usize, #[case] expected: usize) {
    let (device, _probe) = common::device_with(ContextInfo {
        frame_delay: requested,
        validation: false,
        ..Default::default()
    });
    assert_eq!(device.frame_delay(), expected);
}

#[test]
fn destroy_waits_for_the_frame_using_the_resource() {
    let (mut device, probe) = common::device();
    let buffer = device.make_storage_buffer(16, None, BufferUsage::empty()).unwrap();
    touch(&mut device, buffer);
    device.free(buffer).unwrap();
    assert!(!device.is_valid(buffer));
    assert_eq!(probe.live_of(ResourceKind::Buffer), 1);

    device.swap_buffers().unwrap();
    assert_eq!(probe.live_of(ResourceKind::Buffer), 1, "still in flight");
    device.swap_buffers().unwrap();
    assert_eq!(probe.live_of(ResourceKind::Buffer), 0);
    assert_eq!(probe.destroyed().len(), 1);
    assert_eq!(probe.invalid_destroys(), 0);
}

#[test]
fn validation_refuses_to_free_unretired_resources() {
    let (mut device, probe) = common::validating_device();
    let buffer = device.make_storage_buffer(16, None, BufferUsage::empty()).unwrap();
    touch(&mut device, buffer);
    assert_eq!(device.free(buffer), Err(GPUError::ResourceInUse));

    device.swap_buffers().unwrap();
    assert_eq!(device.free(buffer), Err(GPUError::ResourceInUse));
    device.swap_buffers().unwrap();
    device.free(buffer).unwrap();
    assert_eq!(probe.live_of(ResourceKind::Buffer), 0);
}

#[test]
fn local_device_submits_and_syncs() {
    let (mut device, probe) = common::device();
    let mut local = device.local_device().unwrap();
    assert_eq!(local.flavor(), DeviceFlavor::Local);
    assert_eq!(local.frame_delay(), 1);
    assert!(matches!(local.local_device(), Err(GPUError::PrimaryDeviceOnly)));
    assert_eq!(local.swap_buffers(), Err(GPUError::PrimaryDeviceOnly));
    assert_eq!(device.submit(), Err(GPUError::LocalDeviceOnly));
    assert_eq!(device.sync(), Err(GPUError::LocalDeviceOnly));

    assert_eq!(local.sync(), Err(GPUError::NothingSubmitted));
    assert_eq!(local.submit(), Err(GPUError::NothingRecorded));

    let buffer = local.make_storage_buffer(16, None, BufferUsage::CPU_READ).unwrap();
    touch(&mut local, buffer);
    assert_eq!(local.buffer_get_data(buffer).unwrap(), vec![0; 16], "not submitted yet");
    local.submit().unwrap();
    assert_eq!(local.submit(), Err(GPUError::AlreadySubmitted));
    local.sync().unwrap();
    assert_eq!(local.frame_number(), 1);
    assert_eq!(probe.retired_fence(), 1);
    assert_eq!(&local.buffer_get_data(buffer).unwrap()[..4], &[1, 2, 3, 4]);
    assert_eq!(local.sync(), Err(GPUError::NothingSubmitted));
}

#[test]
fn screens_need_a_primary_device_with_a_surface() {
    common::init();
    let backend = NullBackend::new().with_screen(ScreenInfo {
        width: 320,
        height: 240,
        format: Format::BGRA8Unorm,
    });
    let probe = backend.probe();
    let mut device = Device::new(&ContextInfo::default(), Box::new(backend)).unwrap();
    assert_eq!(device.draw_list_begin_for_screen(1, [0.0; 4]), Err(GPUError::NoScreen));

    let format = device.screen_framebuffer_format(0).unwrap();
    let shader = common::graphics_shader(&mut device, ShaderLayout::new(ShaderStages::VERTEX | ShaderStages::FRAGMENT));
    let pipeline = device
        .make_render_pipeline(&RenderPipelineInfo {
            shader,
            framebuffer_format: format,
            ..Default::default()
        })
        .unwrap();

    let list = device.draw_list_begin_for_screen(0, [0.1, 0.1, 0.1, 1.0]).unwrap();
    device.draw_list_bind_render_pipeline(list, pipeline).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();
    device.swap_buffers().unwrap();

    let stats = probe.last_submission().expect("submitted");
    assert_eq!(stats.count(Op::TextureBarrier), 2, "to attachment, then to present");
    assert_eq!(stats.unresolved, 0);
    assert_eq!(device.screen_framebuffer_format(0).unwrap(), format);

    let mut local = device.local_device().unwrap();
    assert_eq!(local.screen_framebuffer_format(0), Err(GPUError::NoScreen));
}

#[test]
fn headless_device_has_no_screen() {
    common::init();
    let mut device = Device::headless(&ContextInfo::default()).unwrap();
    assert_eq!(device.flavor(), DeviceFlavor::Primary);
    assert_eq!(device.draw_list_begin_for_screen(0, [0.0; 4]), Err(GPUError::NoScreen));
}

#[test]
fn pipeline_cache_id_follows_the_adapter() {
    let (a, _) = common::device();
    let (b, _) = common::device();
    assert_eq!(a.pipeline_cache_id(), b.pipeline_cache_id());
    assert_eq!(a.device_name(), "Null Device");

    let other = NullBackend::with_adapter(AdapterInfo {
        name: "Null Device".to_string(),
        vendor: "rendev".to_string(),
        device_id: 0,
        driver_version: 2,
    });
    let c = Device::new(&ContextInfo::default(), Box::new(other)).unwrap();
    assert_ne!(a.pipeline_cache_id(), c.pipeline_cache_id());
}

#[test]
fn lost_device_fails_submission() {
    let (mut device, probe) = common::device();
    let buffer = device.make_storage_buffer(16, None, BufferUsage::empty()).unwrap();
    touch(&mut device, buffer);
    probe.lose_device();
    assert_eq!(device.swap_buffers(), Err(GPUError::DeviceLost));
    assert_eq!(device.make_vertex_buffer(16, None), Err(GPUError::DeviceLost));
}

#[test]
fn destroy_releases_every_native_object() {
    let (mut device, probe) = common::device();
    let t = common::simple_target(&mut device, 64);
    let view = device
        .make_shared_texture(t.texture, rendev::TextureView::default(), None)
        .unwrap();
    let buffer = device.make_storage_buffer(16, None, BufferUsage::empty()).unwrap();
    touch(&mut device, buffer);
    device.free(buffer).unwrap();

    let list = device.draw_list_begin(&Frame::new(t.framebuffer).clear_color([0.0; 4])).unwrap();
    device.draw_list_bind_render_pipeline(list, t.pipeline).unwrap();
    device.draw_list_draw(list, false, 1, 3).unwrap();
    device.draw_list_end(list, BarrierMask::default()).unwrap();
    device.swap_buffers().unwrap();
    assert!(device.is_valid(view));

    device.destroy().unwrap();
    assert_eq!(probe.live_objects(), 0);
    assert_eq!(probe.invalid_destroys(), 0);
}
