//! Frame submission and pacing.
//!
//! `FrameContext` records and commits one frame, `FrameDriver` fires it once
//! per tick, and `InFlightGate` bounds how far the CPU runs ahead of the GPU.

mod driver;
mod gate;
mod renderer;
mod submission;

pub use driver::{FrameDriver, FrameTarget};
pub use gate::{FramePermit, InFlightGate};
pub use renderer::Renderer;
pub use submission::{FrameConfig, FrameContext, FrameOutcome, FrameStats};
