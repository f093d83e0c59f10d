//! Render core.
//!
//! Backend-neutral pieces of a frame: pass configuration, the depth/stencil
//! target cache, the uniform buffer updater, the pipeline builder and the
//! primitive encoders. Everything here talks to the GPU through
//! `device::GpuDevice`.

mod lifecycle;
mod pass;
mod pipeline;
mod primitive;
mod target_cache;
mod uniforms;

pub use lifecycle::Lifecycle;
pub use pass::{
    ColorAttachment, DepthAttachment, LoadAction, RenderPassConfig, StencilAttachment, StoreAction,
};
pub use pipeline::{
    build_pipeline, passthrough_depth_state, PipelineConfig, PipelineDescriptor, PipelineState,
    ShaderLibrary, ShaderProgram, VertexAttribute, VertexFormat, VertexLayout,
};
pub use primitive::{PrimitiveEncoder, QuadEncoder, QuadVertex, QUAD_VERTICES};
pub use target_cache::{is_compatible, RenderTargetCache};
pub use uniforms::{TransformUniform, UniformBufferUpdater, SCALAR_STEP, UNIFORM_SLOT};
