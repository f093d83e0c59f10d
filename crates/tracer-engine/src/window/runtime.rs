use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::device::{Gpu, GpuInit};
use crate::frame::{FrameConfig, FrameContext, FrameDriver, Renderer};
use crate::render::PrimitiveEncoder;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "tracer".to_string(),
            initial_size: LogicalSize::new(1024.0, 1024.0),
        }
    }
}

/// Builds the primitive encoder for a new window.
pub type EncoderFactory = Box<dyn Fn() -> Box<dyn PrimitiveEncoder>>;

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and renders into it until it is closed.
    pub fn run(config: RuntimeConfig, gpu_init: GpuInit, encoder: EncoderFactory) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, encoder);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

type WindowRenderer<'w> = Renderer<Gpu<'w>>;

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    driver: FrameDriver<WindowRenderer<'this>>,
}

struct AppState {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    encoder: EncoderFactory,

    window: Option<(WindowId, WindowEntry)>,
    failure: Option<anyhow::Error>,
    exit_requested: bool,
}

impl AppState {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, encoder: EncoderFactory) -> Self {
        Self {
            config,
            gpu_init,
            encoder,
            window: None,
            failure: None,
            exit_requested: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.failure = Some(error);
        self.close(event_loop);
    }

    /// Stops and unregisters the driver before the window is dropped, then exits.
    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if let Some((_, mut entry)) = self.window.take() {
            entry.with_driver_mut(|driver| {
                driver.stop();
                drop(driver.unregister());
            });
        }
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<WindowId> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        let id = window.id();

        let gpu_init = self.gpu_init.clone();
        let frame = FrameContext::with_encoder(FrameConfig::from(&gpu_init), (self.encoder)());

        let entry = WindowEntryTryBuilder {
            window,
            driver_builder: |w| build_driver(w, gpu_init, frame),
        }
        .try_build()?;

        self.window = Some((id, entry));
        Ok(id)
    }

    fn resize(&mut self, window_id: WindowId, size: Option<PhysicalSize<u32>>) {
        let Some((id, entry)) = self.window.as_mut() else {
            return;
        };
        if *id != window_id {
            return;
        }

        let size = size.unwrap_or_else(|| entry.with_window(|w| w.inner_size()));
        entry.with_driver_mut(|driver| {
            if let Some(renderer) = driver.target_mut() {
                renderer.resize(size.width, size.height);
            }
        });
        entry.with_window(|w| w.request_redraw());
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId) {
        let Some((id, entry)) = self.window.as_mut() else {
            return;
        };
        if *id != window_id {
            return;
        }

        let error = entry.with_driver_mut(|driver| {
            driver.tick();
            driver.take_error()
        });

        if let Some(e) = error {
            self.fail(event_loop, anyhow::Error::new(e).context("rendering failed"));
        }
    }
}

/// Creates the GPU context for `window`, prepares `frame` on it and starts a
/// driver holding the pair.
fn build_driver<'w>(
    window: &'w Window,
    gpu_init: GpuInit,
    frame: FrameContext,
) -> Result<FrameDriver<WindowRenderer<'w>>> {
    let gpu = pollster::block_on(Gpu::new(window, gpu_init))
        .context("GPU initialization failed for window")?;
    let renderer = Renderer::new(gpu, frame).context("failed to prepare the frame context")?;

    let mut driver = FrameDriver::new();
    driver.register(renderer);
    driver.start();
    Ok(driver)
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exit_requested {
            return;
        }

        match self.create_window_entry(event_loop) {
            Ok(id) => log::info!("window {id:?} ready"),
            Err(e) => {
                self.fail(event_loop, e.context("failed to create initial window"));
                return;
            }
        }

        if let Some((_, entry)) = &self.window {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw; FIFO presentation blocks at the display refresh.
        if let Some((_, entry)) = &self.window {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("window {window_id:?} closing");
                self.close(event_loop);
            }

            WindowEvent::Resized(new_size) => self.resize(window_id, Some(new_size)),

            WindowEvent::ScaleFactorChanged { .. } => self.resize(window_id, None),

            WindowEvent::RedrawRequested => self.redraw(event_loop, window_id),

            _ => {}
        }
    }
}
