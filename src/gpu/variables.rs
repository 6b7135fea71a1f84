use super::arena::ResourceArena;
use super::backend::BackendId;
use super::error::{GPUError, Result};
use super::pipelines::{Shader, ShaderBinding};
use super::resources::{Buffer, Sampler, Texture};
use super::structs::{BufferKind, TextureUsage};
use crate::sync::state::{Access, Layout, Stage};
use crate::utils::{Handle, RawHandle};

pub const VARIABLE_LEVELS: usize = 4;

/// How often the values of a uniform set change, which decides its bind
/// slot.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableLevel {
    Frame = 0,
    Shader = 1,
    Material = 2,
    Instance = 3,
}

impl VariableLevel {
    pub const ALL: [VariableLevel; VARIABLE_LEVELS] = [
        VariableLevel::Frame,
        VariableLevel::Shader,
        VariableLevel::Material,
        VariableLevel::Instance,
    ];
}

/// Kind of resource a shader binding expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer,
    Sampler,
    SampledTexture,
    StorageTexture,
    SamplerWithTexture,
    SamplerWithTextureBuffer,
    InputAttachment,
}

/// A resource bound to one slot of a uniform set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variable {
    /// Uniform or storage buffer, decided by the buffer's kind.
    Buffer(Handle<Buffer>),
    /// Sampled or storage texture, decided by the binding.
    Texture(Handle<Texture>),
    Sampler(Handle<Sampler>),
    SamplerWithTexture(Handle<Sampler>, Handle<Texture>),
    SamplerWithTextureBuffer(Handle<Sampler>, Handle<Buffer>),
    InputAttachment(Handle<Texture>),
}

impl Variable {
    pub fn resources(&self) -> impl Iterator<Item = RawHandle> {
        let (a, b) = match *self {
            Variable::Buffer(b) => (b.raw(), None),
            Variable::Texture(t) | Variable::InputAttachment(t) => (t.raw(), None),
            Variable::Sampler(s) => (s.raw(), None),
            Variable::SamplerWithTexture(s, t) => (s.raw(), Some(t.raw())),
            Variable::SamplerWithTextureBuffer(s, b) => (s.raw(), Some(b.raw())),
        };
        std::iter::once(a).chain(b)
    }
}

/// One entry of a uniform set: binding slot plus resources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformBinding {
    pub binding: u32,
    pub variables: Vec<Variable>,
}

impl UniformBinding {
    pub fn new(binding: u32, variable: Variable) -> Self {
        Self {
            binding,
            variables: vec![variable],
        }
    }

    pub fn array(binding: u32, variables: Vec<Variable>) -> Self {
        Self { binding, variables }
    }
}

/// A memory access a bound resource will perform when the set is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceAccess {
    Buffer(Handle<Buffer>, Access),
    Texture(Handle<Texture>, Access, Layout),
}

/// Resources bound together for one variable level of a shader.
#[derive(Debug, Clone)]
pub struct UniformSet {
    pub(crate) raw: BackendId,
    pub shader: Handle<Shader>,
    pub level: VariableLevel,
    pub layout: Vec<ShaderBinding>,
    pub bindings: Vec<UniformBinding>,
    /// Resolved accesses, textures already mapped to their storage owner.
    pub(crate) accesses: Vec<ResourceAccess>,
}

impl UniformSet {
    pub fn resources(&self) -> impl Iterator<Item = RawHandle> + '_ {
        self.bindings
            .iter()
            .flat_map(|b| b.variables.iter())
            .flat_map(|v| v.resources())
    }

    /// True when every bound resource is still alive.
    pub fn is_valid(&self, arena: &ResourceArena) -> bool {
        self.resources().all(|r| arena.contains_raw(r))
    }

    /// Texture views read as input attachments, which the render pass
    /// itself synchronises.
    pub fn input_attachments(&self) -> impl Iterator<Item = Handle<Texture>> + '_ {
        self.bindings
            .iter()
            .flat_map(|b| b.variables.iter())
            .filter_map(|v| match v {
                Variable::InputAttachment(t) => Some(*t),
                _ => None,
            })
    }

    /// Textures sampled or written by this set, excluding input attachments.
    pub fn textures(&self) -> impl Iterator<Item = Handle<Texture>> + '_ {
        self.accesses.iter().filter_map(|a| match a {
            ResourceAccess::Texture(t, _, _) => Some(*t),
            _ => None,
        })
    }
}

fn bad(msg: String) -> GPUError {
    GPUError::InvalidBinding(msg)
}

fn texture_access(writable: bool) -> (Access, Layout) {
    if writable {
        (Access::SHADER_READ | Access::SHADER_WRITE, Layout::General)
    } else {
        (Access::SHADER_READ, Layout::ShaderReadOnly)
    }
}

fn check_buffer(
    arena: &ResourceArena,
    handle: Handle<Buffer>,
    binding: &ShaderBinding,
    out: &mut Vec<ResourceAccess>,
) -> Result<()> {
    let buffer = arena.get(handle)?;
    let access = match (binding.ty, buffer.kind) {
        (BindingType::UniformBuffer, BufferKind::Uniform) => Access::UNIFORM_READ,
        (BindingType::StorageBuffer, BufferKind::Storage) if binding.writable => {
            Access::SHADER_READ | Access::SHADER_WRITE
        }
        (BindingType::StorageBuffer, BufferKind::Storage) => Access::SHADER_READ,
        (BindingType::SamplerWithTextureBuffer, BufferKind::Texel(_)) => Access::SHADER_READ,
        (ty, kind) => {
            return Err(bad(format!(
                "binding {}: {:?} buffer cannot back {:?}",
                binding.binding, kind, ty
            )))
        }
    };
    out.push(ResourceAccess::Buffer(handle, access));
    Ok(())
}

fn check_texture(
    arena: &ResourceArena,
    handle: Handle<Texture>,
    binding: &ShaderBinding,
    required: TextureUsage,
    out: &mut Vec<ResourceAccess>,
) -> Result<()> {
    let texture = arena.get(handle)?;
    if !texture.usage.contains(required) {
        return Err(bad(format!(
            "binding {}: texture lacks {:?} usage",
            binding.binding, required
        )));
    }
    if binding.ty != BindingType::InputAttachment {
        let (access, layout) = texture_access(binding.writable && required == TextureUsage::STORAGE);
        out.push(ResourceAccess::Texture(texture.storage(handle), access, layout));
    }
    Ok(())
}

/// Match `bindings` against the layout a shader expects for one level.
///
/// Every expected binding must be supplied with the right kind and count;
/// extra bindings are rejected.
pub(crate) fn resolve_bindings(
    arena: &ResourceArena,
    layout: &[ShaderBinding],
    bindings: &[UniformBinding],
) -> Result<Vec<ResourceAccess>> {
    let mut accesses = Vec::new();
    for b in bindings {
        if !layout.iter().any(|l| l.binding == b.binding) {
            return Err(bad(format!("binding {} is not used by the shader", b.binding)));
        }
    }

    for expected in layout {
        let supplied = bindings
            .iter()
            .find(|b| b.binding == expected.binding)
            .ok_or_else(|| bad(format!("binding {} missing", expected.binding)))?;
        if supplied.variables.len() as u32 != expected.count {
            return Err(bad(format!(
                "binding {}: {} resources for an array of {}",
                expected.binding,
                supplied.variables.len(),
                expected.count
            )));
        }

        for variable in &supplied.variables {
            match (expected.ty, *variable) {
                (BindingType::UniformBuffer | BindingType::StorageBuffer, Variable::Buffer(b)) => {
                    check_buffer(arena, b, expected, &mut accesses)?
                }
                (BindingType::Sampler, Variable::Sampler(s)) => {
                    arena.get(s)?;
                }
                (BindingType::SampledTexture, Variable::Texture(t)) => {
                    check_texture(arena, t, expected, TextureUsage::SAMPLING, &mut accesses)?
                }
                (BindingType::StorageTexture, Variable::Texture(t)) => {
                    check_texture(arena, t, expected, TextureUsage::STORAGE, &mut accesses)?
                }
                (BindingType::SamplerWithTexture, Variable::SamplerWithTexture(s, t)) => {
                    arena.get(s)?;
                    check_texture(arena, t, expected, TextureUsage::SAMPLING, &mut accesses)?
                }
                (BindingType::SamplerWithTextureBuffer, Variable::SamplerWithTextureBuffer(s, b)) => {
                    arena.get(s)?;
                    check_buffer(arena, b, expected, &mut accesses)?
                }
                (BindingType::InputAttachment, Variable::InputAttachment(t)) => {
                    check_texture(arena, t, expected, TextureUsage::INPUT_ATTACHMENT, &mut accesses)?
                }
                (ty, v) => {
                    return Err(bad(format!(
                        "binding {}: {:?} cannot be bound as {:?}",
                        expected.binding, v, ty
                    )))
                }
            }
        }
    }
    Ok(accesses)
}

/// Stage mask a list of the given kind reads bound resources at.
pub(crate) fn binding_stages(compute: bool) -> Stage {
    if compute {
        Stage::COMPUTE
    } else {
        Stage::RASTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::structs::BufferUsage;

    fn uniform(arena: &mut ResourceArena, kind: BufferKind) -> Handle<Buffer> {
        arena.insert(Buffer {
            raw: 1,
            name: String::new(),
            size: 64,
            kind,
            usage: BufferUsage::empty(),
        })
    }

    #[test]
    fn bindings_must_match_layout() {
        let mut arena = ResourceArena::new();
        let ubo = uniform(&mut arena, BufferKind::Uniform);
        let ssbo = uniform(&mut arena, BufferKind::Storage);
        let layout = vec![
            ShaderBinding::new(0, BindingType::UniformBuffer),
            ShaderBinding::new(1, BindingType::StorageBuffer).writable(),
        ];

        let good = vec![
            UniformBinding::new(0, Variable::Buffer(ubo)),
            UniformBinding::new(1, Variable::Buffer(ssbo)),
        ];
        let accesses = resolve_bindings(&arena, &layout, &good).expect("valid");
        assert_eq!(
            accesses,
            vec![
                ResourceAccess::Buffer(ubo, Access::UNIFORM_READ),
                ResourceAccess::Buffer(ssbo, Access::SHADER_READ | Access::SHADER_WRITE),
            ]
        );

        let missing = vec![UniformBinding::new(0, Variable::Buffer(ubo))];
        assert!(matches!(
            resolve_bindings(&arena, &layout, &missing),
            Err(GPUError::InvalidBinding(_))
        ));

        let swapped = vec![
            UniformBinding::new(0, Variable::Buffer(ssbo)),
            UniformBinding::new(1, Variable::Buffer(ubo)),
        ];
        assert!(resolve_bindings(&arena, &layout, &swapped).is_err());
    }

    #[test]
    fn stale_resource_is_invalid_handle() {
        let mut arena = ResourceArena::new();
        let ubo = uniform(&mut arena, BufferKind::Uniform);
        arena.remove(ubo).expect("removed");
        let layout = vec![ShaderBinding::new(0, BindingType::UniformBuffer)];
        let bindings = vec![UniformBinding::new(0, Variable::Buffer(ubo))];
        assert_eq!(
            resolve_bindings(&arena, &layout, &bindings).err(),
            Some(GPUError::InvalidHandle)
        );
    }
}
