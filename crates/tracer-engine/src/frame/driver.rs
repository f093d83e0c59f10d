use crate::device::GpuError;
use crate::time::{FrameClock, FrameTime};

use super::submission::FrameOutcome;

/// Something the frame driver renders once per tick.
pub trait FrameTarget {
    fn render_frame(&mut self, time: &FrameTime) -> Result<FrameOutcome, GpuError>;

    /// Called once when the target is unregistered, before it is handed back.
    fn closing(&mut self) {}
}

/// Serializes frame rendering behind an explicit start/stop switch.
///
/// The driver owns the only handle to its target. Every `tick` renders at most
/// one frame; pacing comes from the caller (the window runtime ticks on each
/// redraw, which FIFO presentation ties to the display refresh).
///
/// Teardown order: `stop`, then `unregister`. Dropping a driver that still
/// holds a target does both.
pub struct FrameDriver<T: FrameTarget> {
    target: Option<T>,
    running: bool,
    clock: FrameClock,
    ticks: u64,
    error: Option<GpuError>,
}

impl<T: FrameTarget> Default for FrameDriver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FrameTarget> FrameDriver<T> {
    pub fn new() -> Self {
        Self {
            target: None,
            running: false,
            clock: FrameClock::new(),
            ticks: 0,
            error: None,
        }
    }

    /// Installs `target`, unregistering (and returning) a previous one.
    ///
    /// The driver is left stopped.
    pub fn register(&mut self, target: T) -> Option<T> {
        let previous = self.unregister();
        self.target = Some(target);
        previous
    }

    /// Starts firing. Returns false if no target is registered.
    pub fn start(&mut self) -> bool {
        if self.target.is_none() {
            log::warn!("frame driver started without a target");
            return false;
        }
        if !self.running {
            self.clock.reset();
            self.running = true;
            log::debug!("frame driver started");
        }
        true
    }

    /// Halts future ticks. GPU work already committed keeps running.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::debug!("frame driver stopped after {} ticks", self.ticks);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_registered(&self) -> bool {
        self.target.is_some()
    }

    /// Ticks that rendered (or skipped) a frame.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Renders one frame if running.
    ///
    /// A render error stops the driver; the error is kept for `take_error`.
    pub fn tick(&mut self) -> Option<FrameOutcome> {
        if !self.running {
            return None;
        }
        let target = self.target.as_mut()?;

        let time = self.clock.tick();
        self.ticks += 1;

        match target.render_frame(&time) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::error!("frame {} failed, stopping driver: {e}", time.frame_index);
                self.running = false;
                self.error = Some(e);
                None
            }
        }
    }

    /// The error that stopped the driver, if any.
    pub fn take_error(&mut self) -> Option<GpuError> {
        self.error.take()
    }

    /// Stops the driver and hands back its target after running its closing hook.
    pub fn unregister(&mut self) -> Option<T> {
        self.stop();
        let mut target = self.target.take()?;
        target.closing();
        Some(target)
    }

    pub fn target(&self) -> Option<&T> {
        self.target.as_ref()
    }

    pub fn target_mut(&mut self) -> Option<&mut T> {
        self.target.as_mut()
    }
}

impl<T: FrameTarget> Drop for FrameDriver<T> {
    fn drop(&mut self) {
        if self.target.is_some() {
            drop(self.unregister());
        }
    }
}
