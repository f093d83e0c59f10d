//! GPU device + surface management.
//!
//! This module is responsible for:
//! - the backend-neutral runtime traits the render core records against
//! - creating the wgpu Instance/Adapter/Device/Queue and configuring the Surface
//! - mapping resource ids to wgpu objects and presenting drawables after submit

mod command;
mod conversions;
mod error;
mod gpu;
mod init;
mod registry;
mod surface;
mod traits;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{GpuError, SurfaceErrorAction};
pub use gpu::Gpu;
pub use init::GpuInit;
pub use traits::{CommandBuffer, CompletedHandler, GpuDevice, RenderCommandEncoder};
pub use types::{
    BufferDescriptor, BufferId, BufferUsage, ByteRange, CommandBufferStatus, CompareFunction,
    DepthStencilDescriptor, DepthStencilStateId, Drawable, DrawableId, FrameRect, PipelineId,
    PixelFormat, StorageMode, SurfaceState, TextureDescriptor, TextureHandle, TextureId,
    TextureInfo, Winding,
};
