use crate::device::{Drawable, GpuDevice, GpuError, GpuInit, PixelFormat, Winding};
use crate::render::{
    build_pipeline, Lifecycle, PipelineConfig, PipelineState, PrimitiveEncoder, QuadEncoder,
    RenderPassConfig, RenderTargetCache, ShaderLibrary, UniformBufferUpdater, UNIFORM_SLOT,
};
use crate::time::FrameTime;

use super::gate::{FramePermit, InFlightGate};

/// Static configuration of a frame context.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    pub pipeline_label: String,
    pub vertex_program: String,
    pub fragment_program: String,
    pub depth_format: Option<PixelFormat>,
    pub stencil_format: Option<PixelFormat>,
    pub sample_count: u32,
    pub max_frames_in_flight: usize,
    /// Clear color of the drawable, RGBA.
    pub clear_color: [f64; 4],
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::from(&GpuInit::default())
    }
}

impl From<&GpuInit> for FrameConfig {
    fn from(init: &GpuInit) -> Self {
        Self {
            pipeline_label: "tracer pipeline".to_string(),
            vertex_program: "vertex".to_string(),
            fragment_program: "fragment".to_string(),
            depth_format: init.depth_format,
            stencil_format: init.stencil_format,
            sample_count: init.sample_count,
            max_frames_in_flight: init.max_frames_in_flight,
            clear_color: [0.0, 1.0, 0.0, 1.0],
        }
    }
}

/// Result of one `render` call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    /// Commands were committed and the drawable scheduled for presentation.
    Presented { frame_index: u64 },
    /// No drawable was available; nothing was encoded.
    Skipped,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct FrameStats {
    pub presented: u64,
    pub skipped: u64,
    pub resizes: u64,
}

/// Everything one frame needs, owned by whoever drives rendering.
///
/// Built in two steps: `new` records configuration, `prepare` creates the
/// device resources. `render` before `prepare` fails with `GpuError::NotReady`.
pub struct FrameContext {
    pipeline: Lifecycle<FrameConfig, PipelineState>,
    library: ShaderLibrary,
    targets: RenderTargetCache,
    uniforms: UniformBufferUpdater,
    primitive: Box<dyn PrimitiveEncoder>,
    pass: RenderPassConfig,
    drawable: Option<Drawable>,
    gate: InFlightGate,
    stats: FrameStats,
}

impl FrameContext {
    /// Context drawing the default quad.
    pub fn new(config: FrameConfig) -> Self {
        Self::with_encoder(config, Box::new(QuadEncoder::new()))
    }

    pub fn with_encoder(config: FrameConfig, primitive: Box<dyn PrimitiveEncoder>) -> Self {
        let targets = RenderTargetCache::new(config.depth_format, config.stencil_format);
        let pass = RenderPassConfig::new(config.clear_color);
        let gate = InFlightGate::new(config.max_frames_in_flight);

        let mut pipeline = Lifecycle::default();
        pipeline.configure(config);

        Self {
            pipeline,
            library: ShaderLibrary::default_library(),
            targets,
            uniforms: UniformBufferUpdater::new(),
            primitive,
            pass,
            drawable: None,
            gate,
            stats: FrameStats::default(),
        }
    }

    /// Replaces the program library. Only meaningful before `prepare`.
    pub fn with_library(mut self, library: ShaderLibrary) -> Self {
        self.library = library;
        self
    }

    /// Allocates the uniform buffer and builds the pipeline against the
    /// device's surface format.
    ///
    /// Failures here are fatal for the context: a missing program or a
    /// rejected descriptor will not succeed on retry.
    pub fn prepare(&mut self, device: &dyn GpuDevice) -> Result<(), GpuError> {
        self.uniforms.prepare(device)?;

        let color_format = device.surface().pixel_format;
        let vertex_layout = self.primitive.vertex_layout();
        let library = &self.library;

        let state = self.pipeline.get_or_build("render pipeline", |config| {
            build_pipeline(
                device,
                library,
                &PipelineConfig {
                    label: config.pipeline_label.clone(),
                    vertex_program: config.vertex_program.clone(),
                    fragment_program: config.fragment_program.clone(),
                    color_format,
                    depth_format: config.depth_format,
                    stencil_format: config.stencil_format,
                    sample_count: config.sample_count,
                    vertex_layout,
                    uniform_slot: UNIFORM_SLOT,
                },
            )
        })?;

        log::info!(
            "frame context ready on {}: color={:?} depth={:?} stencil={:?}",
            device.name(),
            state.color_format,
            state.depth_format,
            state.stencil_format
        );
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_ready()
    }

    pub fn pipeline(&self) -> Result<&PipelineState, GpuError> {
        self.pipeline.ready("render pipeline")
    }

    pub fn targets(&self) -> &RenderTargetCache {
        &self.targets
    }

    pub fn uniforms(&self) -> &UniformBufferUpdater {
        &self.uniforms
    }

    pub fn pass(&self) -> &RenderPassConfig {
        &self.pass
    }

    pub fn gate(&self) -> &InFlightGate {
        &self.gate
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// True while an acquired drawable has not been presented or discarded.
    pub fn holds_drawable(&self) -> bool {
        self.drawable.is_some()
    }

    /// Records and commits one frame.
    ///
    /// Order: permit, drawable, attachments, open pass, uniform update,
    /// encode, present, completion handler, commit. When no drawable is
    /// available the frame is skipped before anything is encoded. A pass that
    /// fails to open leaves the uniform untouched; a failing primitive encode
    /// still counts as one uniform step.
    pub fn render(
        &mut self,
        device: &dyn GpuDevice,
        time: &FrameTime,
    ) -> Result<FrameOutcome, GpuError> {
        let pipeline = self.pipeline.ready("render pipeline")?.clone();
        let uniform_buffer = self.uniforms.buffer()?;
        let frame_index = time.frame_index;

        let permit = self.acquire_permit(device);

        if self.drawable.is_none() {
            self.drawable = device.next_drawable()?;
        }
        let Some(color) = self.drawable.as_ref().map(|d| d.texture) else {
            log::warn!("frame {frame_index}: no drawable available, skipping");
            self.stats.skipped += 1;
            return Ok(FrameOutcome::Skipped);
        };

        self.pass.set_color_target(color);
        if self.targets.ensure_attachments(device, &color, &mut self.pass)? {
            log::debug!(
                "frame {frame_index}: attachments reallocated for {}x{}",
                color.width(),
                color.height()
            );
        }

        let mut commands = device.make_command_buffer("tracer frame");
        {
            let mut encoder = commands.render_command_encoder(&self.pass)?;
            encoder.set_depth_stencil_state(pipeline.depth_stencil);
            encoder.set_render_pipeline(pipeline.pipeline);
            encoder.set_front_facing_winding(Winding::CounterClockwise);
            // The scalar only advances once the pass is open, and is published
            // before the buffer is bound.
            self.uniforms.update(device, frame_index)?;
            encoder.set_uniform_buffer(uniform_buffer, UNIFORM_SLOT);
            self.primitive.encode(device, encoder)?;
        }

        if let Some(drawable) = self.drawable.take() {
            commands.present(drawable);
        }
        commands.add_completed_handler(Box::new(move |status| {
            log::trace!("frame {frame_index} finished on the GPU: {status:?}");
            drop(permit);
        }));
        commands.commit();

        self.pass.clear_color_target();
        self.stats.presented += 1;
        log::trace!("frame {frame_index} committed (dt {:.4}s)", time.dt);

        Ok(FrameOutcome::Presented { frame_index })
    }

    /// Frame size changed: drain, drop any unpresented drawable, resize.
    ///
    /// Attachments are not touched here; the next frame reallocates them when
    /// they no longer match the drawable.
    pub fn surface_resized(&mut self, device: &mut dyn GpuDevice, width: u32, height: u32) {
        self.drain(device);
        self.discard_drawable(device);

        device.resize_surface(width, height);
        self.stats.resizes += 1;
        log::debug!("surface resized to {width}x{height}");
    }

    /// The surface is going away: drain, drop the drawable, release attachments.
    pub fn surface_closing(&mut self, device: &dyn GpuDevice) {
        self.drain(device);
        self.discard_drawable(device);
        self.targets.release(device, &mut self.pass);
        log::debug!(
            "frame context closed after {} presented / {} skipped frames",
            self.stats.presented,
            self.stats.skipped
        );
    }

    /// Waits until every committed frame has completed.
    pub fn drain(&self, device: &dyn GpuDevice) {
        while !self.gate.is_idle() {
            device.poll_completions(true);
        }
    }

    fn acquire_permit(&self, device: &dyn GpuDevice) -> FramePermit {
        loop {
            if let Some(permit) = self.gate.try_acquire() {
                return permit;
            }
            log::trace!("{} frames in flight, waiting for the GPU", self.gate.in_flight());
            device.poll_completions(true);
        }
    }

    fn discard_drawable(&mut self, device: &dyn GpuDevice) {
        if let Some(drawable) = self.drawable.take() {
            device.discard_drawable(drawable);
        }
        self.pass.clear_color_target();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::device::mock::{Call, RecordingDevice};
    use crate::device::{BufferId, RenderCommandEncoder};
    use crate::render::{QuadEncoder, VertexAttribute, VertexFormat, VertexLayout, SCALAR_STEP};

    fn at(frame_index: u64) -> FrameTime {
        FrameTime {
            dt: 1.0 / 60.0,
            now: Instant::now(),
            frame_index,
        }
    }

    fn ready(device: &RecordingDevice) -> FrameContext {
        let mut frame = FrameContext::new(FrameConfig::default());
        frame.prepare(device).unwrap();
        device.clear_calls();
        frame
    }

    fn position(calls: &[Call], pred: impl Fn(&Call) -> bool) -> usize {
        calls.iter().position(pred).expect("call not recorded")
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn render_before_prepare_is_not_ready() {
        let device = RecordingDevice::new(512, 512);
        let mut frame = FrameContext::new(FrameConfig::default());
        let err = frame.render(&device, &at(0)).unwrap_err();
        assert!(matches!(err, GpuError::NotReady { stage: "configured", .. }));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn missing_fragment_program_fails_prepare() {
        let device = RecordingDevice::new(512, 512);
        let source = ShaderLibrary::default_library()
            .function("vertex")
            .unwrap()
            .source
            .clone();
        let mut library = ShaderLibrary::new();
        library.insert("vertex", source, "vs_main");
        let mut frame = FrameContext::new(FrameConfig::default()).with_library(library);

        let err = frame.prepare(&device).unwrap_err();
        assert!(matches!(err, GpuError::MissingProgram { ref name } if name == "fragment"));
        assert!(!frame.is_ready());
    }

    #[test]
    fn rejected_pipeline_fails_prepare() {
        let device = RecordingDevice::new(512, 512);
        device.reject_pipelines();
        let mut frame = FrameContext::new(FrameConfig::default());

        let err = frame.prepare(&device).unwrap_err();
        assert!(matches!(err, GpuError::PipelineRejected { .. }));
        assert!(matches!(
            frame.render(&device, &at(0)),
            Err(GpuError::NotReady { .. })
        ));
    }

    // ── submission ────────────────────────────────────────────────────────

    #[test]
    fn first_frame_allocates_depth_and_draws_quad() {
        let device = RecordingDevice::new(512, 512);
        let mut frame = ready(&device);

        let outcome = frame.render(&device, &at(0)).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented { frame_index: 0 });

        let depth = device.count(|c| {
            matches!(
                c,
                Call::CreateTexture {
                    width: 512,
                    height: 512,
                    sample_count: 1,
                    format: PixelFormat::Depth32Float,
                    ..
                }
            )
        });
        assert_eq!(depth, 1);
        assert_eq!(device.count(|c| matches!(c, Call::CreateTexture { .. })), 1);
        assert_eq!(
            device.count(|c| matches!(
                c,
                Call::Draw {
                    vertex_start: 0,
                    vertex_count: 6,
                    instance_count: 1
                }
            )),
            1
        );

        device.clear_calls();
        frame.render(&device, &at(1)).unwrap();
        assert_eq!(device.count(|c| matches!(c, Call::CreateTexture { .. })), 0);
        assert_eq!(device.count(|c| matches!(c, Call::CreateBuffer { .. })), 0);
    }

    #[test]
    fn frame_binds_state_in_order_then_presents_and_commits() {
        let device = RecordingDevice::new(256, 256);
        let mut frame = ready(&device);
        let pipeline = frame.pipeline().unwrap().clone();
        let uniform = frame.uniforms().buffer().unwrap();

        frame.render(&device, &at(0)).unwrap();
        let calls = device.calls();

        let begin = position(&calls, |c| matches!(c, Call::BeginRenderPass { .. }));
        let depth_state = position(&calls, |c| *c == Call::SetDepthStencilState(pipeline.depth_stencil));
        let set_pipeline = position(&calls, |c| *c == Call::SetPipeline(pipeline.pipeline));
        let winding = position(&calls, |c| *c == Call::SetFrontFace(Winding::CounterClockwise));
        let bind = position(&calls, |c| {
            *c == Call::SetUniformBuffer {
                buffer: uniform,
                slot: UNIFORM_SLOT,
            }
        });
        let draw = position(&calls, |c| matches!(c, Call::Draw { .. }));
        let present = position(&calls, |c| matches!(c, Call::Present(_)));
        let handler = position(&calls, |c| *c == Call::AddCompletedHandler);
        let commit = position(&calls, |c| *c == Call::Commit);

        assert!(begin < depth_state);
        assert!(depth_state < set_pipeline);
        assert!(set_pipeline < winding);
        assert!(winding < bind);
        assert!(bind < draw);
        assert!(draw < present);
        assert!(present < handler);
        assert!(handler < commit);
        assert!(!frame.holds_drawable());
        assert!(frame.pass().color.texture.is_none());
    }

    #[test]
    fn uniform_is_published_before_bind_and_draw() {
        let device = RecordingDevice::new(128, 128);
        let mut frame = ready(&device);
        let uniform = frame.uniforms().buffer().unwrap();

        for index in 0..3 {
            device.clear_calls();
            frame.render(&device, &at(index)).unwrap();
            let calls = device.calls();

            let publish = position(&calls, |c| {
                *c == Call::DidModifyRange {
                    id: uniform,
                    range: 0..64,
                }
            });
            let bind = position(&calls, |c| matches!(c, Call::SetUniformBuffer { .. }));
            let draw = position(&calls, |c| matches!(c, Call::Draw { .. }));
            assert!(publish < bind);
            assert!(publish < draw);
        }
    }

    #[test]
    fn one_acquire_and_one_present_per_frame() {
        let device = RecordingDevice::new(64, 64);
        let mut frame = ready(&device);

        frame.render(&device, &at(0)).unwrap();

        assert_eq!(device.count(|c| matches!(c, Call::NextDrawable(Some(_)))), 1);
        assert_eq!(device.count(|c| matches!(c, Call::Present(_))), 1);
        assert_eq!(frame.stats().presented, 1);
    }

    #[test]
    fn failed_pass_leaves_uniform_unpublished() {
        let device = RecordingDevice::new(64, 64);
        let mut frame = ready(&device);
        let before = frame.uniforms().tracked_scalar();
        device.fail_render_passes();

        assert!(matches!(
            frame.render(&device, &at(0)),
            Err(GpuError::Unsupported(_))
        ));

        assert_eq!(frame.uniforms().tracked_scalar(), before);
        assert_eq!(frame.uniforms().updates(), 0);
        assert_eq!(device.count(|c| matches!(c, Call::DidModifyRange { .. })), 0);
        assert_eq!(device.count(|c| matches!(c, Call::Commit)), 0);
        assert_eq!(frame.stats().presented, 0);
        assert!(frame.gate().is_idle());
    }

    #[test]
    fn missing_drawable_skips_without_drawing() {
        let device = RecordingDevice::new(64, 64);
        let mut frame = ready(&device);
        device.script_drawables(&[false]);

        let outcome = frame.render(&device, &at(0)).unwrap();

        assert_eq!(outcome, FrameOutcome::Skipped);
        assert_eq!(device.count(|c| matches!(c, Call::Draw { .. })), 0);
        assert_eq!(device.count(|c| matches!(c, Call::Present(_))), 0);
        assert_eq!(device.count(|c| matches!(c, Call::Commit)), 0);
        assert_eq!(device.count(|c| matches!(c, Call::DidModifyRange { .. })), 0);
        assert_eq!(frame.stats().skipped, 1);
        assert!(frame.gate().is_idle());

        // Next frame recovers.
        let outcome = frame.render(&device, &at(1)).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented { frame_index: 1 });
    }

    #[test]
    fn empty_surface_skips_frame() {
        let mut device = RecordingDevice::new(64, 64);
        let mut frame = ready(&device);
        frame.surface_resized(&mut device, 0, 0);

        assert_eq!(frame.render(&device, &at(0)).unwrap(), FrameOutcome::Skipped);
    }

    // ── frames in flight ──────────────────────────────────────────────────

    #[test]
    fn submission_waits_for_gpu_when_gate_is_full() {
        let device = RecordingDevice::new(64, 64);
        device.set_auto_complete(false);
        let mut frame = FrameContext::new(FrameConfig {
            max_frames_in_flight: 2,
            ..FrameConfig::default()
        });
        frame.prepare(&device).unwrap();

        frame.render(&device, &at(0)).unwrap();
        frame.render(&device, &at(1)).unwrap();
        assert_eq!(frame.gate().in_flight(), 2);
        assert_eq!(device.count(|c| matches!(c, Call::Poll { .. })), 0);

        frame.render(&device, &at(2)).unwrap();
        // The third frame had to poll; polling completed the first two.
        assert_eq!(device.count(|c| *c == Call::Poll { block: true }), 1);
        assert_eq!(frame.gate().in_flight(), 1);
        assert_eq!(device.pending_completions(), 1);
    }

    #[test]
    fn skipped_frame_returns_its_permit() {
        let device = RecordingDevice::new(64, 64);
        device.set_auto_complete(false);
        let mut frame = ready(&device);
        device.script_drawables(&[false, false, false]);

        for index in 0..3 {
            assert_eq!(frame.render(&device, &at(index)).unwrap(), FrameOutcome::Skipped);
        }
        assert!(frame.gate().is_idle());
    }

    // ── resize and close ──────────────────────────────────────────────────

    #[test]
    fn resize_drains_then_reallocates_on_next_frame() {
        let mut device = RecordingDevice::new(512, 512);
        device.set_auto_complete(false);
        let mut frame = ready(&device);

        frame.render(&device, &at(0)).unwrap();
        assert_eq!(frame.gate().in_flight(), 1);
        let old_depth = frame.targets().depth_texture().copied().unwrap();

        device.clear_calls();
        frame.surface_resized(&mut device, 800, 600);
        let calls = device.calls();
        let poll = position(&calls, |c| *c == Call::Poll { block: true });
        let resize = position(&calls, |c| {
            *c == Call::ResizeSurface {
                width: 800,
                height: 600,
            }
        });
        assert!(poll < resize);
        assert!(frame.gate().is_idle());
        // No eager reallocation.
        assert_eq!(device.count(|c| matches!(c, Call::CreateTexture { .. })), 0);

        device.clear_calls();
        frame.render(&device, &at(1)).unwrap();
        assert_eq!(
            device.count(|c| matches!(
                c,
                Call::CreateTexture {
                    width: 800,
                    height: 600,
                    ..
                }
            )),
            1
        );
        assert_eq!(device.count(|c| *c == Call::ReleaseTexture(old_depth.id)), 1);
        assert_eq!(frame.stats().resizes, 1);
    }

    #[test]
    fn closing_drains_and_releases_attachments() {
        let device = RecordingDevice::new(64, 64);
        device.set_auto_complete(false);
        let mut frame = ready(&device);
        frame.render(&device, &at(0)).unwrap();
        let depth = frame.targets().depth_texture().copied().unwrap();

        frame.surface_closing(&device);

        assert!(frame.gate().is_idle());
        assert_eq!(device.pending_completions(), 0);
        assert!(frame.targets().depth_texture().is_none());
        assert!(frame.pass().depth.is_none());
        assert_eq!(device.count(|c| *c == Call::ReleaseTexture(depth.id)), 1);
    }

    // ── uniform progression ───────────────────────────────────────────────

    #[test]
    fn scalar_advances_once_per_presented_frame() {
        let device = RecordingDevice::new(64, 64);
        let mut frame = ready(&device);

        frame.render(&device, &at(0)).unwrap();
        frame.render(&device, &at(1)).unwrap();

        assert_eq!(frame.uniforms().tracked_scalar(), 2.0 * SCALAR_STEP);
        let published = device.buffer_contents(frame.uniforms().buffer().unwrap());
        assert_eq!(&published[..4], &(2.0 * SCALAR_STEP).to_ne_bytes()[..]);
    }

    // ── encoder substitution ──────────────────────────────────────────────

    /// Draws a single triangle without a vertex buffer of its own.
    struct TriangleEncoder {
        encoded: u32,
    }

    impl PrimitiveEncoder for TriangleEncoder {
        fn vertex_layout(&self) -> VertexLayout {
            VertexLayout {
                stride: 16,
                attributes: vec![VertexAttribute {
                    format: VertexFormat::Float32x4,
                    offset: 0,
                    location: 0,
                }],
            }
        }

        fn encode(
            &mut self,
            _device: &dyn GpuDevice,
            mut encoder: Box<dyn RenderCommandEncoder + '_>,
        ) -> Result<(), GpuError> {
            self.encoded += 1;
            encoder.set_vertex_buffer(BufferId(999), 0, 0);
            encoder.draw_primitives(0, 3, 1);
            encoder.end_encoding();
            Ok(())
        }
    }

    #[test]
    fn substituted_encoder_replaces_quad() {
        let device = RecordingDevice::new(64, 64);
        let mut frame = FrameContext::with_encoder(
            FrameConfig::default(),
            Box::new(TriangleEncoder { encoded: 0 }),
        );
        frame.prepare(&device).unwrap();
        frame.render(&device, &at(0)).unwrap();

        assert_eq!(
            device.count(|c| matches!(c, Call::Draw { vertex_count: 3, .. })),
            1
        );
        assert_eq!(
            device.count(|c| matches!(c, Call::PushDebugGroup(label) if label == QuadEncoder::DEBUG_GROUP)),
            0
        );
        assert_eq!(device.count(|c| matches!(c, Call::Present(_))), 1);
    }
}
