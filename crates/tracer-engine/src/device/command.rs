use super::conversions;
use super::registry::Registry;
use super::{
    BufferId, CommandBuffer, CommandBufferStatus, CompletedHandler, DepthStencilStateId, Drawable,
    DrawableId, GpuError, PipelineId, RenderCommandEncoder, Winding,
};
use crate::render::RenderPassConfig;

/// wgpu command buffer: a command encoder plus deferred presentation.
///
/// wgpu presents after submission, so drawables handed to `present` are held
/// until `commit` has submitted the encoded work.
pub(crate) struct WgpuCommandBuffer<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    registry: &'a Registry,
    encoder: Option<wgpu::CommandEncoder>,
    drawables: Vec<DrawableId>,
    handlers: Vec<CompletedHandler>,
}

impl<'a> WgpuCommandBuffer<'a> {
    pub(crate) fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        registry: &'a Registry,
        label: &str,
    ) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(label),
        });
        Self {
            device,
            queue,
            registry,
            encoder: Some(encoder),
            drawables: Vec::new(),
            handlers: Vec::new(),
        }
    }
}

impl CommandBuffer for WgpuCommandBuffer<'_> {
    fn render_command_encoder<'e>(
        &'e mut self,
        pass: &RenderPassConfig,
    ) -> Result<Box<dyn RenderCommandEncoder + 'e>, GpuError> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or(GpuError::Unsupported("command buffer already committed".into()))?;

        let (color_view, depth_view) = {
            let tables = self.registry.lock();
            let color = pass
                .color
                .texture
                .ok_or(GpuError::Unsupported("render pass has no color target".into()))?;
            let color_view = tables.view(color.id)?.clone();

            // wgpu has a single depth-stencil attachment.
            let depth_id = pass.depth.as_ref().map(|d| d.texture.id);
            let stencil_id = pass.stencil.as_ref().map(|s| s.texture.id);
            let ds_id = match (depth_id, stencil_id) {
                (Some(d), Some(s)) if d != s => {
                    return Err(GpuError::Unsupported(
                        "separate depth and stencil textures".into(),
                    ));
                }
                (d, s) => d.or(s),
            };
            let depth_view = ds_id.map(|id| tables.view(id).cloned()).transpose()?;
            (color_view, depth_view)
        };

        let [r, g, b, a] = pass.color.clear_color;
        let color_attachment = wgpu::RenderPassColorAttachment {
            view: &color_view,
            resolve_target: None,
            ops: conversions::operations(
                pass.color.load,
                pass.color.store,
                wgpu::Color { r, g, b, a },
            ),
            depth_slice: None,
        };

        let depth_stencil_attachment =
            depth_view
                .as_ref()
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: pass
                        .depth
                        .as_ref()
                        .map(|d| conversions::operations(d.load, d.store, d.clear_depth)),
                    stencil_ops: pass
                        .stencil
                        .as_ref()
                        .map(|s| conversions::operations(s.load, s.store, s.clear_stencil)),
                });

        let rpass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tracer frame pass"),
                color_attachments: &[Some(color_attachment)],
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();

        Ok(Box::new(WgpuRenderEncoder {
            device: self.device,
            registry: self.registry,
            pass: rpass,
            pipeline: None,
            depth_state: None,
            winding: None,
            uniforms: Vec::new(),
        }))
    }

    fn present(&mut self, drawable: Drawable) {
        self.drawables.push(drawable.id);
    }

    fn add_completed_handler(&mut self, handler: CompletedHandler) {
        self.handlers.push(handler);
    }

    fn commit(mut self: Box<Self>) {
        let Some(encoder) = self.encoder.take() else {
            return;
        };

        self.queue.submit(std::iter::once(encoder.finish()));

        let handlers = std::mem::take(&mut self.handlers);
        if !handlers.is_empty() {
            self.queue.on_submitted_work_done(move || {
                for handler in handlers {
                    handler(CommandBufferStatus::Completed);
                }
            });
        }

        let mut tables = self.registry.lock();
        for id in self.drawables.drain(..) {
            match tables.take_drawable(id) {
                Some(surface_texture) => surface_texture.present(),
                None => log::warn!("present: unknown drawable {id}"),
            }
        }
    }
}

impl Drop for WgpuCommandBuffer<'_> {
    fn drop(&mut self) {
        // Uncommitted: nothing reached the GPU and nothing is presented.
        for handler in self.handlers.drain(..) {
            handler(CommandBufferStatus::Abandoned);
        }
        if !self.drawables.is_empty() {
            let mut tables = self.registry.lock();
            for id in self.drawables.drain(..) {
                drop(tables.take_drawable(id));
            }
        }
    }
}

/// Render encoder backed by a wgpu render pass.
///
/// Depth-stencil state and winding are part of the wgpu pipeline; binding them
/// here checks that the bound pipeline was built with the same values.
pub(crate) struct WgpuRenderEncoder<'a> {
    device: &'a wgpu::Device,
    registry: &'a Registry,
    pass: wgpu::RenderPass<'static>,
    pipeline: Option<PipelineId>,
    depth_state: Option<DepthStencilStateId>,
    winding: Option<Winding>,
    uniforms: Vec<(BufferId, u32)>,
}

impl WgpuRenderEncoder<'_> {
    fn check_fixed_function(&self) {
        let Some(pipeline) = self.pipeline else { return };
        let tables = self.registry.lock();
        let Some(entry) = tables.pipelines.get(&pipeline) else { return };

        if let Some(state) = self.depth_state {
            if tables.depth_states.get(&state) != Some(&entry.depth_stencil) {
                log::warn!("depth-stencil state {state} differs from the one baked into {pipeline}");
            }
        }
        if let Some(winding) = self.winding {
            if winding != entry.front_face {
                log::warn!("front face {winding:?} differs from {pipeline} ({:?})", entry.front_face);
            }
        }
    }

    fn bind_uniforms(&mut self) {
        let Some(pipeline) = self.pipeline else {
            if !self.uniforms.is_empty() {
                log::warn!("uniform buffers bound without a pipeline; ignored");
            }
            return;
        };

        let mut tables = self.registry.lock();
        for (buffer, slot) in self.uniforms.drain(..) {
            let Some(entry) = tables.pipelines.get(&pipeline) else { return };
            if entry.uniform_slot != slot {
                log::warn!("{pipeline} has no uniform binding at slot {slot}");
                continue;
            }
            let layout = entry.uniform_layout.clone();

            let bind_group = match tables.bind_groups.get(&(pipeline, buffer)) {
                Some(bg) => bg.clone(),
                None => {
                    let Some(buf) = tables.buffers.get(&buffer) else {
                        log::warn!("unknown uniform buffer {buffer}");
                        continue;
                    };
                    let bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("tracer uniform bind group"),
                        layout: &layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: slot,
                            resource: buf.buffer.as_entire_binding(),
                        }],
                    });
                    tables.bind_groups.insert((pipeline, buffer), bg.clone());
                    bg
                }
            };
            self.pass.set_bind_group(0, &bind_group, &[]);
        }
    }
}

impl RenderCommandEncoder for WgpuRenderEncoder<'_> {
    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId) {
        self.depth_state = Some(state);
    }

    fn set_render_pipeline(&mut self, pipeline: PipelineId) {
        let found = self
            .registry
            .lock()
            .pipelines
            .get(&pipeline)
            .map(|e| e.pipeline.clone());
        match found {
            Some(p) => {
                self.pass.set_pipeline(&p);
                self.pipeline = Some(pipeline);
            }
            None => log::warn!("set_render_pipeline: unknown {pipeline}"),
        }
    }

    fn set_front_facing_winding(&mut self, winding: Winding) {
        self.winding = Some(winding);
    }

    fn set_vertex_buffer(&mut self, buffer: BufferId, offset: u64, slot: u32) {
        let found = self
            .registry
            .lock()
            .buffers
            .get(&buffer)
            .map(|e| e.buffer.clone());
        match found {
            Some(b) => self.pass.set_vertex_buffer(slot, b.slice(offset..)),
            None => log::warn!("set_vertex_buffer: unknown {buffer}"),
        }
    }

    fn set_uniform_buffer(&mut self, buffer: BufferId, slot: u32) {
        self.uniforms.push((buffer, slot));
    }

    fn push_debug_group(&mut self, label: &str) {
        self.pass.push_debug_group(label);
    }

    fn pop_debug_group(&mut self) {
        self.pass.pop_debug_group();
    }

    fn draw_primitives(&mut self, vertex_start: u32, vertex_count: u32, instance_count: u32) {
        self.check_fixed_function();
        self.bind_uniforms();
        self.pass
            .draw(vertex_start..vertex_start + vertex_count, 0..instance_count);
    }

    fn end_encoding(self: Box<Self>) {
        // Dropping the pass ends it.
        drop(self);
    }
}
