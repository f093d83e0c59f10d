//! Recording GPU backend for tests.
//!
//! Implements the device traits without a GPU and records every call in order,
//! so tests can assert on allocation counts and command ordering.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ops::Range;

use super::{
    BufferDescriptor, BufferId, BufferUsage, CommandBuffer, CommandBufferStatus, CompletedHandler,
    DepthStencilDescriptor, DepthStencilStateId, Drawable, DrawableId, FrameRect, GpuDevice,
    GpuError, PipelineId, PixelFormat, RenderCommandEncoder, StorageMode, SurfaceState,
    TextureDescriptor, TextureHandle, TextureId, TextureInfo, Winding,
};
use crate::render::{PipelineDescriptor, RenderPassConfig};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateBuffer {
        id: BufferId,
        size: u64,
        usage: BufferUsage,
        storage: StorageMode,
    },
    WriteBuffer {
        id: BufferId,
        offset: u64,
        len: usize,
    },
    DidModifyRange {
        id: BufferId,
        range: Range<u64>,
    },
    CreateTexture {
        id: TextureId,
        width: u32,
        height: u32,
        sample_count: u32,
        format: PixelFormat,
    },
    ReleaseTexture(TextureId),
    CreateDepthStencilState(DepthStencilDescriptor),
    CreatePipeline {
        id: PipelineId,
        label: String,
    },
    NextDrawable(Option<DrawableId>),
    DiscardDrawable(DrawableId),
    ResizeSurface {
        width: u32,
        height: u32,
    },
    MakeCommandBuffer(String),
    BeginRenderPass {
        color: Option<TextureId>,
        depth: Option<TextureId>,
        stencil: Option<TextureId>,
    },
    SetDepthStencilState(DepthStencilStateId),
    SetPipeline(PipelineId),
    SetFrontFace(Winding),
    SetVertexBuffer {
        buffer: BufferId,
        offset: u64,
        slot: u32,
    },
    SetUniformBuffer {
        buffer: BufferId,
        slot: u32,
    },
    PushDebugGroup(String),
    PopDebugGroup,
    Draw {
        vertex_start: u32,
        vertex_count: u32,
        instance_count: u32,
    },
    EndEncoding,
    Present(DrawableId),
    AddCompletedHandler,
    Commit,
    Poll {
        block: bool,
    },
}

struct State {
    next_id: u64,
    calls: Vec<Call>,
    surface: SurfaceState,
    /// Scripted drawable availability; empty means always available.
    drawable_script: VecDeque<bool>,
    live_drawable: Option<DrawableId>,
    /// CPU-visible buffer memory.
    cpu: HashMap<BufferId, Vec<u8>>,
    /// What the GPU observes.
    gpu: HashMap<BufferId, Vec<u8>>,
    pending: Vec<CompletedHandler>,
    auto_complete: bool,
    reject_pipelines: bool,
    fail_render_passes: bool,
}

pub(crate) struct RecordingDevice {
    state: RefCell<State>,
}

impl RecordingDevice {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            state: RefCell::new(State {
                next_id: 1,
                calls: Vec::new(),
                surface: SurfaceState {
                    pixel_format: PixelFormat::Bgra8Unorm,
                    framebuffer_only: true,
                    frame: FrameRect::from_size(width, height),
                },
                drawable_script: VecDeque::new(),
                live_drawable: None,
                cpu: HashMap::new(),
                gpu: HashMap::new(),
                pending: Vec::new(),
                auto_complete: true,
                reject_pipelines: false,
                fail_render_passes: false,
            }),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Queues drawable availability for the next acquisitions.
    pub(crate) fn script_drawables(&self, availability: &[bool]) {
        self.state
            .borrow_mut()
            .drawable_script
            .extend(availability.iter().copied());
    }

    /// When off, completion handlers wait for `poll_completions`.
    pub(crate) fn set_auto_complete(&self, on: bool) {
        self.state.borrow_mut().auto_complete = on;
    }

    pub(crate) fn reject_pipelines(&self) {
        self.state.borrow_mut().reject_pipelines = true;
    }

    /// Makes every later `render_command_encoder` call fail.
    pub(crate) fn fail_render_passes(&self) {
        self.state.borrow_mut().fail_render_passes = true;
    }

    pub(crate) fn pending_completions(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub(crate) fn has_live_drawable(&self) -> bool {
        self.state.borrow().live_drawable.is_some()
    }

    /// Bytes of `buffer` as last published to the GPU.
    pub(crate) fn buffer_contents(&self, buffer: BufferId) -> Vec<u8> {
        self.state
            .borrow()
            .gpu
            .get(&buffer)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn next_id(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    fn run_pending(&self, status: CommandBufferStatus) {
        let pending = std::mem::take(&mut self.state.borrow_mut().pending);
        for handler in pending {
            handler(status);
        }
    }
}

impl GpuDevice for RecordingDevice {
    fn name(&self) -> &str {
        "recording device"
    }

    fn surface(&self) -> SurfaceState {
        self.state.borrow().surface
    }

    fn create_buffer(&self, desc: &BufferDescriptor<'_>) -> Result<BufferId, GpuError> {
        let id = BufferId(self.next_id());
        let mut state = self.state.borrow_mut();
        state.cpu.insert(id, vec![0; desc.size as usize]);
        state.gpu.insert(id, vec![0; desc.size as usize]);
        state.calls.push(Call::CreateBuffer {
            id,
            size: desc.size,
            usage: desc.usage,
            storage: desc.storage,
        });
        Ok(id)
    }

    fn create_buffer_init(
        &self,
        desc: &BufferDescriptor<'_>,
        contents: &[u8],
    ) -> Result<BufferId, GpuError> {
        let id = self.create_buffer(desc)?;
        let mut state = self.state.borrow_mut();
        state.cpu.insert(id, contents.to_vec());
        state.gpu.insert(id, contents.to_vec());
        Ok(id)
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        let mem = state.cpu.get_mut(&buffer).ok_or(GpuError::UnknownResource {
            kind: "buffer",
            id: buffer.raw(),
        })?;
        let start = offset as usize;
        mem[start..start + data.len()].copy_from_slice(data);
        state.calls.push(Call::WriteBuffer {
            id: buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn did_modify_range(&self, buffer: BufferId, range: Range<u64>) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        let cpu = state.cpu.get(&buffer).cloned().ok_or(GpuError::UnknownResource {
            kind: "buffer",
            id: buffer.raw(),
        })?;
        let (start, end) = (range.start as usize, range.end as usize);
        if let Some(gpu) = state.gpu.get_mut(&buffer) {
            gpu[start..end].copy_from_slice(&cpu[start..end]);
        }
        state.calls.push(Call::DidModifyRange { id: buffer, range });
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<TextureHandle, GpuError> {
        let id = TextureId(self.next_id());
        self.record(Call::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
            sample_count: desc.sample_count,
            format: desc.format,
        });
        Ok(TextureHandle {
            id,
            info: TextureInfo {
                width: desc.width,
                height: desc.height,
                sample_count: desc.sample_count,
                format: desc.format,
            },
        })
    }

    fn release_texture(&self, texture: TextureHandle) {
        self.record(Call::ReleaseTexture(texture.id));
    }

    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilDescriptor,
    ) -> Result<DepthStencilStateId, GpuError> {
        let id = DepthStencilStateId(self.next_id());
        self.record(Call::CreateDepthStencilState(*desc));
        Ok(id)
    }

    fn create_render_pipeline(
        &self,
        desc: &PipelineDescriptor<'_>,
    ) -> Result<PipelineId, GpuError> {
        desc.validate(&self.surface())?;
        if self.state.borrow().reject_pipelines {
            return Err(GpuError::PipelineRejected {
                label: desc.label.to_string(),
                reason: "rejected by test device".into(),
            });
        }
        let id = PipelineId(self.next_id());
        self.record(Call::CreatePipeline {
            id,
            label: desc.label.to_string(),
        });
        Ok(id)
    }

    fn next_drawable(&self) -> Result<Option<Drawable>, GpuError> {
        let available = self.state.borrow_mut().drawable_script.pop_front().unwrap_or(true);
        if !available || self.state.borrow().surface.frame.is_empty() {
            self.record(Call::NextDrawable(None));
            return Ok(None);
        }

        assert!(
            !self.has_live_drawable(),
            "drawable acquired while another is still live"
        );

        let id = DrawableId(self.next_id());
        let texture = TextureId(self.next_id());
        let mut state = self.state.borrow_mut();
        state.live_drawable = Some(id);
        state.calls.push(Call::NextDrawable(Some(id)));
        let frame = state.surface.frame;
        Ok(Some(Drawable {
            id,
            texture: TextureHandle {
                id: texture,
                info: TextureInfo {
                    width: frame.width,
                    height: frame.height,
                    sample_count: 1,
                    format: state.surface.pixel_format,
                },
            },
        }))
    }

    fn discard_drawable(&self, drawable: Drawable) {
        let mut state = self.state.borrow_mut();
        if state.live_drawable == Some(drawable.id) {
            state.live_drawable = None;
        }
        state.calls.push(Call::DiscardDrawable(drawable.id));
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        state.surface.frame.width = width;
        state.surface.frame.height = height;
        state.calls.push(Call::ResizeSurface { width, height });
    }

    fn make_command_buffer(&self, label: &str) -> Box<dyn CommandBuffer + '_> {
        self.record(Call::MakeCommandBuffer(label.to_string()));
        Box::new(RecordingCommandBuffer {
            device: self,
            handlers: Vec::new(),
            drawables: Vec::new(),
            committed: false,
        })
    }

    fn poll_completions(&self, block: bool) {
        self.record(Call::Poll { block });
        self.run_pending(CommandBufferStatus::Completed);
    }
}

struct RecordingCommandBuffer<'a> {
    device: &'a RecordingDevice,
    handlers: Vec<CompletedHandler>,
    drawables: Vec<DrawableId>,
    committed: bool,
}

impl CommandBuffer for RecordingCommandBuffer<'_> {
    fn render_command_encoder<'a>(
        &'a mut self,
        pass: &RenderPassConfig,
    ) -> Result<Box<dyn RenderCommandEncoder + 'a>, GpuError> {
        if self.device.state.borrow().fail_render_passes {
            return Err(GpuError::Unsupported("render pass refused by test device".into()));
        }
        self.device.record(Call::BeginRenderPass {
            color: pass.color.texture.map(|t| t.id),
            depth: pass.depth.as_ref().map(|d| d.texture.id),
            stencil: pass.stencil.as_ref().map(|s| s.texture.id),
        });
        Ok(Box::new(RecordingEncoder {
            device: self.device,
        }))
    }

    fn present(&mut self, drawable: Drawable) {
        self.device.record(Call::Present(drawable.id));
        self.drawables.push(drawable.id);
    }

    fn add_completed_handler(&mut self, handler: CompletedHandler) {
        self.device.record(Call::AddCompletedHandler);
        self.handlers.push(handler);
    }

    fn commit(mut self: Box<Self>) {
        let device = self.device;
        self.committed = true;
        device.record(Call::Commit);
        {
            let mut state = device.state.borrow_mut();
            for id in self.drawables.drain(..) {
                if state.live_drawable == Some(id) {
                    state.live_drawable = None;
                }
            }
            state.pending.append(&mut self.handlers);
        }
        let auto_complete = device.state.borrow().auto_complete;
        if auto_complete {
            device.run_pending(CommandBufferStatus::Completed);
        }
    }
}

impl Drop for RecordingCommandBuffer<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for handler in self.handlers.drain(..) {
            handler(CommandBufferStatus::Abandoned);
        }
        let device = self.device;
        let mut state = device.state.borrow_mut();
        for id in self.drawables.drain(..) {
            if state.live_drawable == Some(id) {
                state.live_drawable = None;
            }
        }
    }
}

struct RecordingEncoder<'a> {
    device: &'a RecordingDevice,
}

impl RenderCommandEncoder for RecordingEncoder<'_> {
    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId) {
        self.device.record(Call::SetDepthStencilState(state));
    }

    fn set_render_pipeline(&mut self, pipeline: PipelineId) {
        self.device.record(Call::SetPipeline(pipeline));
    }

    fn set_front_facing_winding(&mut self, winding: Winding) {
        self.device.record(Call::SetFrontFace(winding));
    }

    fn set_vertex_buffer(&mut self, buffer: BufferId, offset: u64, slot: u32) {
        self.device.record(Call::SetVertexBuffer {
            buffer,
            offset,
            slot,
        });
    }

    fn set_uniform_buffer(&mut self, buffer: BufferId, slot: u32) {
        self.device.record(Call::SetUniformBuffer { buffer, slot });
    }

    fn push_debug_group(&mut self, label: &str) {
        self.device.record(Call::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.device.record(Call::PopDebugGroup);
    }

    fn draw_primitives(&mut self, vertex_start: u32, vertex_count: u32, instance_count: u32) {
        self.device.record(Call::Draw {
            vertex_start,
            vertex_count,
            instance_count,
        });
    }

    fn end_encoding(self: Box<Self>) {
        self.device.record(Call::EndEncoding);
    }
}
