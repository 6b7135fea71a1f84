#![allow(dead_code)]

use rendev::{
    AttachmentFormat, BindingType, ContextInfo, Device, Format, FramebufferFormatInfo, Handle, NullBackend,
    NullProbe, RenderPipeline, RenderPipelineInfo, Shader, ShaderBinding, ShaderInfo, ShaderLayout, ShaderStages,
    Texture, TextureInfo, TextureUsage, VariableLevel,
};
use rendev::{Framebuffer, FramebufferFormat};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Headless primary device plus a probe into its null backend.
pub fn device() -> (Device, NullProbe) {
    device_with(ContextInfo {
        validation: false,
        ..Default::default()
    })
}

pub fn validating_device() -> (Device, NullProbe) {
    device_with(ContextInfo {
        validation: true,
        ..Default::default()
    })
}

pub fn device_with(info: ContextInfo) -> (Device, NullProbe) {
    init();
    let backend = NullBackend::new();
    let probe = backend.probe();
    let device = Device::new(&info, Box::new(backend)).expect("null device");
    (device, probe)
}

pub fn color_texture(device: &mut Device, size: u32) -> Handle<Texture> {
    device
        .make_texture(&TextureInfo {
            debug_name: "color",
            format: Format::RGBA8Unorm,
            dim: [size, size, 1],
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLING | TextureUsage::CAN_COPY_FROM,
            ..Default::default()
        })
        .expect("color texture")
}

pub fn graphics_shader(device: &mut Device, layout: ShaderLayout) -> Handle<Shader> {
    device
        .make_shader(&ShaderInfo {
            debug_name: "graphics",
            layout,
            bytecode: &[0; 16],
        })
        .expect("graphics shader")
}

pub fn compute_shader(device: &mut Device, layout: ShaderLayout) -> Handle<Shader> {
    device
        .make_shader(&ShaderInfo {
            debug_name: "compute",
            layout,
            bytecode: &[0; 16],
        })
        .expect("compute shader")
}

/// Layout with one uniform buffer at the frame level.
pub fn ubo_layout(stages: ShaderStages) -> ShaderLayout {
    ShaderLayout::new(stages).with_level(
        VariableLevel::Frame,
        vec![ShaderBinding::new(0, BindingType::UniformBuffer)],
    )
}

/// Layout reading, or also writing, one storage buffer at the frame level.
pub fn storage_layout(stages: ShaderStages, writes: bool) -> ShaderLayout {
    let mut binding = ShaderBinding::new(0, BindingType::StorageBuffer);
    if writes {
        binding = binding.writable();
    }
    ShaderLayout::new(stages).with_level(VariableLevel::Frame, vec![binding])
}

/// A single color target with everything needed to draw into it.
pub struct Target {
    pub texture: Handle<Texture>,
    pub format: Handle<FramebufferFormat>,
    pub framebuffer: Handle<Framebuffer>,
    pub shader: Handle<Shader>,
    pub pipeline: Handle<RenderPipeline>,
}

pub fn target(device: &mut Device, size: u32, layout: ShaderLayout) -> Target {
    let texture = color_texture(device, size);
    let format = device
        .make_framebuffer_format(&FramebufferFormatInfo {
            attachments: vec![AttachmentFormat::color(Format::RGBA8Unorm)],
            ..Default::default()
        })
        .expect("framebuffer format");
    let framebuffer = device.make_framebuffer(format, &[texture]).expect("framebuffer");
    let shader = graphics_shader(device, layout);
    let pipeline = device
        .make_render_pipeline(&RenderPipelineInfo {
            debug_name: "triangle",
            shader,
            framebuffer_format: format,
            ..Default::default()
        })
        .expect("pipeline");
    Target {
        texture,
        format,
        framebuffer,
        shader,
        pipeline,
    }
}

pub fn simple_target(device: &mut Device, size: u32) -> Target {
    target(device, size, ShaderLayout::new(ShaderStages::VERTEX | ShaderStages::FRAGMENT))
}
