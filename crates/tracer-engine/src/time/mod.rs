//! Time subsystem.
//!
//! One `FrameClock` per frame driver; `tick()` once per fired frame yields the
//! `FrameTime` handed to the render path.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
