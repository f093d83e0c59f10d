//! The GPU runtime surface the render core is written against.
//!
//! `Gpu` implements these traits on top of wgpu; tests implement them with a
//! recording backend. All methods take `&self`/`&mut self` on objects the core
//! owns, so the core never depends on a concrete backend type.

use super::{
    BufferDescriptor, BufferId, ByteRange, CommandBufferStatus, DepthStencilDescriptor,
    DepthStencilStateId, Drawable, GpuError, PipelineId, SurfaceState, TextureDescriptor,
    TextureHandle, Winding,
};
use crate::render::{PipelineDescriptor, RenderPassConfig};

/// Callback invoked once the GPU finished (or abandoned) a command buffer.
pub type CompletedHandler = Box<dyn FnOnce(CommandBufferStatus) + Send + 'static>;

/// Device and presentable surface.
pub trait GpuDevice {
    /// Human-readable adapter/device name.
    fn name(&self) -> &str;

    /// Current surface configuration.
    fn surface(&self) -> SurfaceState;

    /// Allocates an uninitialized buffer.
    fn create_buffer(&self, desc: &BufferDescriptor<'_>) -> Result<BufferId, GpuError>;

    /// Allocates a buffer initialized with `contents`.
    fn create_buffer_init(
        &self,
        desc: &BufferDescriptor<'_>,
        contents: &[u8],
    ) -> Result<BufferId, GpuError>;

    /// Copies `data` into the CPU-visible memory of a managed buffer.
    ///
    /// The GPU does not observe the write until `did_modify_range` covers it.
    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError>;

    /// Publishes a CPU-modified range of a managed buffer to the GPU.
    fn did_modify_range(&self, buffer: BufferId, range: ByteRange) -> Result<(), GpuError>;

    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<TextureHandle, GpuError>;

    /// Releases an owned texture. Unknown ids are ignored.
    fn release_texture(&self, texture: TextureHandle);

    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilDescriptor,
    ) -> Result<DepthStencilStateId, GpuError>;

    /// Compiles a render pipeline. Rejection is reported as
    /// `GpuError::PipelineRejected`.
    fn create_render_pipeline(
        &self,
        desc: &PipelineDescriptor<'_>,
    ) -> Result<PipelineId, GpuError>;

    /// Acquires the next drawable, or `Ok(None)` when the surface is not ready.
    fn next_drawable(&self) -> Result<Option<Drawable>, GpuError>;

    /// Drops a drawable without presenting it.
    fn discard_drawable(&self, drawable: Drawable);

    /// Reconfigures the surface for a new frame size in physical pixels.
    ///
    /// A zero dimension only records the size; drawables are unavailable
    /// until a non-zero size arrives.
    fn resize_surface(&mut self, width: u32, height: u32);

    fn make_command_buffer(&self, label: &str) -> Box<dyn CommandBuffer + '_>;

    /// Processes completed GPU work and runs pending completion handlers.
    ///
    /// With `block = true` the call waits for some progress before returning.
    fn poll_completions(&self, block: bool);
}

/// One frame's worth of recorded GPU commands.
pub trait CommandBuffer {
    /// Opens a render encoder scoped to `pass`. Only one may be open at a time.
    fn render_command_encoder<'a>(
        &'a mut self,
        pass: &RenderPassConfig,
    ) -> Result<Box<dyn RenderCommandEncoder + 'a>, GpuError>;

    /// Schedules `drawable` for presentation once the buffer executes.
    fn present(&mut self, drawable: Drawable);

    fn add_completed_handler(&mut self, handler: CompletedHandler);

    /// Hands the buffer to the GPU for asynchronous execution.
    fn commit(self: Box<Self>);
}

/// Records draw commands for a single render pass.
pub trait RenderCommandEncoder {
    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId);

    fn set_render_pipeline(&mut self, pipeline: PipelineId);

    fn set_front_facing_winding(&mut self, winding: Winding);

    fn set_vertex_buffer(&mut self, buffer: BufferId, offset: u64, slot: u32);

    /// Binds a uniform buffer visible to the vertex stage at `slot`.
    fn set_uniform_buffer(&mut self, buffer: BufferId, slot: u32);

    fn push_debug_group(&mut self, label: &str);

    fn pop_debug_group(&mut self);

    fn draw_primitives(&mut self, vertex_start: u32, vertex_count: u32, instance_count: u32);

    /// Closes the encoder. Consumes it so nothing can be recorded afterwards.
    fn end_encoding(self: Box<Self>);
}
