use crate::device::{GpuDevice, GpuError};
use crate::time::FrameTime;

use super::driver::FrameTarget;
use super::submission::{FrameContext, FrameOutcome};

/// A device paired with the frame context that renders into its surface.
///
/// This is the handle the frame driver owns; the window runtime forwards
/// surface events to it.
pub struct Renderer<D: GpuDevice> {
    device: D,
    frame: FrameContext,
}

impl<D: GpuDevice> Renderer<D> {
    /// Prepares `frame` against `device`.
    pub fn new(device: D, mut frame: FrameContext) -> Result<Self, GpuError> {
        frame.prepare(&device)?;
        Ok(Self { device, frame })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn frame(&self) -> &FrameContext {
        &self.frame
    }

    /// Frame size changed, in physical pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.frame.surface_resized(&mut self.device, width, height);
    }
}

impl<D: GpuDevice> FrameTarget for Renderer<D> {
    fn render_frame(&mut self, time: &FrameTime) -> Result<FrameOutcome, GpuError> {
        self.frame.render(&self.device, time)
    }

    fn closing(&mut self) {
        self.frame.surface_closing(&self.device);
    }
}
