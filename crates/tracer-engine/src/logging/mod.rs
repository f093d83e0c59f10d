//! Logging utilities.
//!
//! Centralizes logger initialization. Library code only uses the `log` facade;
//! `env_logger` is installed by the binary through `init_logging`.

mod init;

pub use init::{init_logging, LoggingConfig};
