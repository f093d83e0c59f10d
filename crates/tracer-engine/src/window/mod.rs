//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and wires them to the frame driver.

mod runtime;

pub use runtime::{EncoderFactory, Runtime, RuntimeConfig};
