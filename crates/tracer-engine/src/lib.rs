//! Tracer engine crate.
//!
//! A minimal real-time rendering harness: a wgpu device/surface manager behind
//! backend-neutral traits, a render core (pipeline, attachments, uniforms,
//! primitive encoders), frame submission bounded by frames in flight, and a
//! driver fired from the winit event loop.

pub mod device;
pub mod frame;
pub mod render;
pub mod time;
pub mod window;

pub mod logging;
