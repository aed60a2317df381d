//! Telemetry for fleet-bench.
//!
//! Provides structured logging, per-host spans, and metrics recording.
//! Nothing here installs an exporter; recording without a recorder is a no-op.

mod logging;
mod recorder;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use recorder::{
    describe_metrics, record_host_failure, record_iteration_failure, record_iteration_success,
};
pub use spans::{BenchSpan, SpanExt};
