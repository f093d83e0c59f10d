use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use super::command::WgpuCommandBuffer;
use super::registry::{BufferEntry, DrawableEntry, PipelineEntry, Registry, TextureEntry};
use super::{
    conversions, surface, BufferDescriptor, BufferId, BufferUsage, ByteRange, CommandBuffer,
    DepthStencilDescriptor, DepthStencilStateId, Drawable, DrawableId, FrameRect, GpuDevice,
    GpuError, GpuInit, PipelineId, StorageMode, SurfaceErrorAction, SurfaceState,
    TextureDescriptor, TextureHandle, TextureId, TextureInfo,
};
use crate::render::PipelineDescriptor;

/// Owns wgpu core objects and the surface configuration.
///
/// This type is the device/surface manager:
/// - creates and stores Instance/Adapter/Device/Queue
/// - creates and configures the Surface bound to the window
/// - owns every GPU object the render core refers to by id
pub struct Gpu<'w> {
    /// wgpu instance used to create the adapter and surface.
    _instance: wgpu::Instance,

    /// Surface bound to the window.
    ///
    /// Surface lifetime is tied to the window; architecture must ensure the window
    /// outlives the `Gpu` instance.
    surface: wgpu::Surface<'w>,

    /// Selected adapter.
    _adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Observable surface state (format, framebuffer-only flag, frame rect).
    state: SurfaceState,

    registry: Registry,

    adapter_name: String,
}

impl<'w> Gpu<'w> {
    /// Creates a GPU context bound to a window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self, GpuError> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(GpuError::ZeroSizedSurface {
                width: size.width,
                height: size.height,
            });
        }

        // Use all backends to allow wgpu to select the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Surface lifetime is tied to `window` via `'w`.
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tracer device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&surface_caps, init.prefer_srgb)
            .ok_or(GpuError::NoSurfaceFormat)?;
        let pixel_format = conversions::pixel_format(format).ok_or(GpuError::NoSurfaceFormat)?;

        let alpha_mode = surface::choose_alpha_mode(&surface_caps, init.alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: surface::drawable_usage(init.framebuffer_only),
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };

        surface.configure(&device, &config);

        let adapter_name = adapter.get_info().name;
        log::info!(
            "GPU ready: {adapter_name} ({:?}), surface {}x{} {format:?}",
            adapter.get_info().backend,
            size.width,
            size.height
        );

        Ok(Self {
            _instance: instance,
            surface,
            _adapter: adapter,
            device,
            queue,
            config,
            state: SurfaceState {
                pixel_format,
                framebuffer_only: init.framebuffer_only,
                frame: FrameRect::from_size(size.width, size.height),
            },
            registry: Registry::default(),
            adapter_name,
        })
    }

    fn next_id(&self) -> u64 {
        self.registry.next_id()
    }

    fn buffer_usage(desc: &BufferDescriptor<'_>) -> wgpu::BufferUsages {
        let base = match desc.usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
        };
        match desc.storage {
            StorageMode::Managed => base | wgpu::BufferUsages::COPY_DST,
            StorageMode::Shared | StorageMode::Private => base,
        }
    }

    fn shader_module(
        &self,
        cache: &mut HashMap<*const u8, wgpu::ShaderModule>,
        label: &str,
        source: &Arc<str>,
    ) -> wgpu::ShaderModule {
        cache
            .entry(source.as_ptr())
            .or_insert_with(|| {
                self.device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(label),
                        source: wgpu::ShaderSource::Wgsl(source.as_ref().into()),
                    })
            })
            .clone()
    }
}

impl GpuDevice for Gpu<'_> {
    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn surface(&self) -> SurfaceState {
        self.state
    }

    fn create_buffer(&self, desc: &BufferDescriptor<'_>) -> Result<BufferId, GpuError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.size,
            usage: Self::buffer_usage(desc),
            mapped_at_creation: false,
        });
        let shadow = (desc.storage == StorageMode::Managed).then(|| vec![0u8; desc.size as usize]);

        let id = BufferId(self.next_id());
        self.registry
            .lock()
            .buffers
            .insert(id, BufferEntry { buffer, shadow });
        Ok(id)
    }

    fn create_buffer_init(
        &self,
        desc: &BufferDescriptor<'_>,
        contents: &[u8],
    ) -> Result<BufferId, GpuError> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents,
                usage: Self::buffer_usage(desc),
            });
        let shadow = (desc.storage == StorageMode::Managed).then(|| contents.to_vec());

        let id = BufferId(self.next_id());
        self.registry
            .lock()
            .buffers
            .insert(id, BufferEntry { buffer, shadow });
        Ok(id)
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        let mut tables = self.registry.lock();
        let entry = tables.buffers.get_mut(&buffer).ok_or(GpuError::UnknownResource {
            kind: "buffer",
            id: buffer.raw(),
        })?;
        let shadow = entry.shadow.as_mut().ok_or_else(|| {
            GpuError::Unsupported(format!("{buffer} is not CPU-writable (not managed)"))
        })?;

        let start = offset as usize;
        let end = start + data.len();
        if end > shadow.len() {
            return Err(GpuError::Unsupported(format!(
                "write of {} bytes at {offset} overflows {buffer} ({} bytes)",
                data.len(),
                shadow.len()
            )));
        }
        shadow[start..end].copy_from_slice(data);
        Ok(())
    }

    fn did_modify_range(&self, buffer: BufferId, range: ByteRange) -> Result<(), GpuError> {
        let tables = self.registry.lock();
        let entry = tables.buffer(buffer)?;
        let Some(shadow) = entry.shadow.as_ref() else {
            return Err(GpuError::Unsupported(format!("{buffer} is not managed")));
        };
        let (start, end) = (range.start as usize, range.end as usize);
        if start > end || end > shadow.len() {
            return Err(GpuError::Unsupported(format!(
                "modified range {range:?} outside {buffer}"
            )));
        }
        self.queue
            .write_buffer(&entry.buffer, range.start, &shadow[start..end]);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<TextureHandle, GpuError> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: desc.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: conversions::texture_format(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let info = TextureInfo {
            width: desc.width,
            height: desc.height,
            sample_count: desc.sample_count,
            format: desc.format,
        };

        let id = TextureId(self.next_id());
        self.registry.lock().textures.insert(
            id,
            TextureEntry {
                texture: Some(texture),
                view,
                info,
            },
        );
        Ok(TextureHandle { id, info })
    }

    fn release_texture(&self, texture: TextureHandle) {
        let entry = self.registry.lock().textures.remove(&texture.id);
        if let Some(TextureEntry {
            texture: Some(t), ..
        }) = entry
        {
            t.destroy();
        }
    }

    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilDescriptor,
    ) -> Result<DepthStencilStateId, GpuError> {
        let id = DepthStencilStateId(self.next_id());
        self.registry.lock().depth_states.insert(id, *desc);
        Ok(id)
    }

    fn create_render_pipeline(
        &self,
        desc: &PipelineDescriptor<'_>,
    ) -> Result<PipelineId, GpuError> {
        desc.validate(&self.state)?;
        if desc.depth_format.is_some() && desc.stencil_format.is_some() {
            return Err(GpuError::PipelineRejected {
                label: desc.label.to_string(),
                reason: "separate depth and stencil attachments; use a combined depth format"
                    .into(),
            });
        }

        // Shader and pipeline validation errors are captured here instead of
        // reaching the device's uncaptured error handler.
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut modules = HashMap::new();
        let vs = self.shader_module(&mut modules, &desc.vertex.name, &desc.vertex.source);
        let fs = self.shader_module(&mut modules, &desc.fragment.name, &desc.fragment.source);

        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("tracer uniform bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: desc.uniform_slot,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("tracer pipeline layout"),
                bind_group_layouts: &[&uniform_layout],
                immediate_size: 0,
            });

        let attributes: Vec<wgpu::VertexAttribute> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: conversions::vertex_format(a.format),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        let depth_stencil_format = desc.depth_format.or(desc.stencil_format);
        let depth_stencil = depth_stencil_format.map(|format| wgpu::DepthStencilState {
            format: conversions::texture_format(format),
            depth_write_enabled: format.has_depth() && desc.depth_stencil.depth_write_enabled,
            depth_compare: if format.has_depth() {
                conversions::compare_function(desc.depth_stencil.depth_compare)
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &vs,
                    entry_point: Some(desc.vertex.entry_point.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: desc.vertex_layout.stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fs,
                    entry_point: Some(desc.fragment.entry_point.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: conversions::texture_format(desc.color_format),
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: conversions::front_face(desc.front_face),
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState {
                    count: desc.sample_count,
                    ..Default::default()
                },
                multiview_mask: None,
                cache: None,
            });

        if let Some(error) = pollster::block_on(scope.pop()) {
            log::error!("pipeline '{}' rejected by the device: {error}", desc.label);
            return Err(GpuError::PipelineRejected {
                label: desc.label.to_string(),
                reason: error.to_string(),
            });
        }

        let id = PipelineId(self.next_id());
        self.registry.lock().pipelines.insert(
            id,
            PipelineEntry {
                pipeline,
                uniform_layout,
                uniform_slot: desc.uniform_slot,
                depth_stencil: desc.depth_stencil,
                front_face: desc.front_face,
            },
        );
        Ok(id)
    }

    fn next_drawable(&self) -> Result<Option<Drawable>, GpuError> {
        if self.state.frame.is_empty() {
            return Ok(None);
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(st) => st,
            Err(err) => {
                return match surface::map_surface_error(
                    &self.surface,
                    &self.device,
                    &self.config,
                    &err,
                ) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("drawable unavailable: {err}");
                        Ok(None)
                    }
                    SurfaceErrorAction::Fatal => Err(GpuError::SurfaceLost(err)),
                };
            }
        };
        if surface_texture.suboptimal {
            log::trace!("acquired suboptimal drawable");
        }

        let texture = &surface_texture.texture;
        let info = TextureInfo {
            width: texture.width(),
            height: texture.height(),
            sample_count: texture.sample_count(),
            format: self.state.pixel_format,
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let texture_id = TextureId(self.next_id());
        let id = DrawableId(self.next_id());
        let mut tables = self.registry.lock();
        tables.textures.insert(
            texture_id,
            TextureEntry {
                texture: None,
                view,
                info,
            },
        );
        tables.drawables.insert(
            id,
            DrawableEntry {
                surface_texture,
                texture: texture_id,
            },
        );

        Ok(Some(Drawable {
            id,
            texture: TextureHandle {
                id: texture_id,
                info,
            },
        }))
    }

    fn discard_drawable(&self, drawable: Drawable) {
        // Dropping an unpresented SurfaceTexture returns it to the swapchain.
        drop(self.registry.lock().take_drawable(drawable.id));
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.state.frame.width = width;
        self.state.frame.height = height;

        // wgpu does not support configuring a surface with a 0x0 size; in that case,
        // only internal state is updated and configuration is deferred.
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    fn make_command_buffer(&self, label: &str) -> Box<dyn CommandBuffer + '_> {
        Box::new(WgpuCommandBuffer::new(
            &self.device,
            &self.queue,
            &self.registry,
            label,
        ))
    }

    fn poll_completions(&self, block: bool) {
        if let Err(e) = self.device.poll(poll_type(block)) {
            log::warn!("device poll failed: {e:?}");
        }
    }
}

/// Blocking polls wait for the most recent submission; otherwise the device
/// is checked once.
fn poll_type(block: bool) -> wgpu::PollType {
    if block {
        wgpu::PollType::wait_indefinitely()
    } else {
        wgpu::PollType::Poll
    }
}
