use thiserror::Error;

use super::structs::Format;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GPUError {
    #[error("handle is stale, freed or of the wrong kind")]
    InvalidHandle,
    #[error("resource is referenced by recorded or in-flight work")]
    ResourceInUse,
    #[error("a command list is already active")]
    ListAlreadyActive,
    #[error("command list has already been closed")]
    ListClosed,
    #[error("command list was never begun")]
    ListInactive,
    #[error("no pipeline is bound")]
    NoPipelineBound,
    #[error("pipeline expects a uniform set at level {0}")]
    MissingUniformSet(u32),
    #[error("no vertex array is bound")]
    MissingVertexArray,
    #[error("no index array is bound")]
    MissingIndexArray,
    #[error("invalid frame action: {0}")]
    InvalidFrameAction(String),
    #[error("framebuffer format has no more passes")]
    NoMorePasses,
    #[error("pipeline is incompatible with the current framebuffer pass")]
    IncompatiblePipeline,
    #[error("multiview configuration is not supported")]
    UnsupportedMultiview,
    #[error("nothing was recorded since the last submit")]
    NothingRecorded,
    #[error("nothing has been submitted")]
    NothingSubmitted,
    #[error("previous submission has not been synced")]
    AlreadySubmitted,
    #[error("only local devices can submit and sync")]
    LocalDeviceOnly,
    #[error("only the primary device can do this")]
    PrimaryDeviceOnly,
    #[error("no screen available")]
    NoScreen,
    #[error("unsupported format {0:?}")]
    UnsupportedFormat(Format),
    #[error("invalid framebuffer format: {0}")]
    InvalidFramebufferFormat(String),
    #[error("invalid framebuffer: {0}")]
    InvalidFramebuffer(String),
    #[error("invalid binding: {0}")]
    InvalidBinding(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("device lost")]
    DeviceLost,
    #[error("out of memory")]
    OutOfMemory,
}

/// Convenient crate-wide result type.
pub type Result<T, E = GPUError> = std::result::Result<T, E>;

pub(crate) fn invalid(msg: impl Into<String>) -> GPUError {
    GPUError::InvalidParameter(msg.into())
}
