use thiserror::Error;

/// Errors raised by the GPU layer and the render core.
///
/// Initialization variants (`NoAdapter`, `MissingProgram`, `PipelineRejected`, ...)
/// are unrecoverable misconfiguration. `NotReady` reports a resource used before
/// its lifecycle reached `Ready`.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("failed to create wgpu surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported color formats")]
    NoSurfaceFormat,

    #[error("surface has zero size ({width}x{height})")]
    ZeroSizedSurface { width: u32, height: u32 },

    #[error("shader program '{name}' not found in library")]
    MissingProgram { name: String },

    #[error("pipeline '{label}' rejected: {reason}")]
    PipelineRejected { label: String, reason: String },

    #[error("{resource} is not ready (stage: {stage})")]
    NotReady {
        resource: &'static str,
        stage: &'static str,
    },

    #[error("unknown {kind} {id}")]
    UnknownResource { kind: &'static str, id: u64 },

    #[error("surface acquisition failed fatally: {0}")]
    SurfaceLost(#[from] wgpu::SurfaceError),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}
