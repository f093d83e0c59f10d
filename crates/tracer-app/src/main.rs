use anyhow::Result;

use tracer_engine::device::GpuInit;
use tracer_engine::logging::{init_logging, LoggingConfig};
use tracer_engine::render::{PrimitiveEncoder, QuadEncoder};
use tracer_engine::window::{Runtime, RuntimeConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let gpu_init = GpuInit::default();
    log::info!(
        "starting tracer: depth={:?} stencil={:?} frames in flight={}",
        gpu_init.depth_format,
        gpu_init.stencil_format,
        gpu_init.max_frames_in_flight
    );

    Runtime::run(
        RuntimeConfig::default(),
        gpu_init,
        Box::new(|| -> Box<dyn PrimitiveEncoder> { Box::new(QuadEncoder::new()) }),
    )
}
