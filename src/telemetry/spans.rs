//! Span utilities and extension traits for harness tracing.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for standardized harness spans.
pub struct BenchSpan;

impl BenchSpan {
    /// Span covering one host worker.
    ///
    /// `status`, `error.message` and `iterations` are filled in when the worker finishes.
    pub fn host(host: &str, model: &str) -> Span {
        info_span!(
            "bench_host",
            host = %host,
            model = %model,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            iterations = tracing::field::Empty,
        )
    }

    /// Span covering one analytics pass (`load`, `compute`, `rank`).
    pub fn pass(name: &'static str) -> Span {
        info_span!("metrics_pass", pass = name, bundles = tracing::field::Empty)
    }
}
