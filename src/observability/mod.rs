//! Observability for the telemetry client
//!
//! Process-wide diagnostic configuration is set exactly once during
//! initialization, before any component runs.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
