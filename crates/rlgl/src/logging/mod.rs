//! Logging utilities.
//!
//! rlgl reports through the `log` facade only; every message carries a
//! subsystem prefix (`RLGL:`, `TEXTURE:`, `SHADER:`, `FBO:`, `VR:`) so a single
//! sink can be filtered per subsystem. Installing a logger is left to the host, with
//! [`init_logging`] as the `env_logger` convenience.

mod init;

pub use init::{init_logging, LoggingConfig};
