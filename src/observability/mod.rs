//! Observability utilities for logging, metrics, and profiling.

pub mod logging;
pub mod metrics;
pub mod profiler;
