use super::PixelFormat;

/// Initialization parameters for the GPU layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// Off by default: the harness renders into a plain 8-bit normalized target.
    pub prefer_srgb: bool,

    /// Drawables are render targets only (no CPU readback or copies out).
    pub framebuffer_only: bool,

    /// Depth attachment format; `None` disables the depth attachment.
    pub depth_format: Option<PixelFormat>,

    /// Stencil attachment format; `None` disables the stencil attachment.
    pub stencil_format: Option<PixelFormat>,

    /// Sample count used by the pipeline and the attachments.
    pub sample_count: u32,

    /// Present mode (swap behavior).
    ///
    /// FIFO waits for vertical blank, which is what paces the frame driver.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface.
    ///
    /// This value is a hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,

    /// Upper bound on committed command buffers the GPU has not finished yet.
    pub max_frames_in_flight: usize,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            framebuffer_only: true,
            depth_format: Some(PixelFormat::Depth32Float),
            stencil_format: None,
            sample_count: 1,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            max_frames_in_flight: 2,
        }
    }
}
