//! Metric instrument factories for fieldlog.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"fieldlog"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for fieldlog instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("fieldlog")
}

/// Counter: record store writes.
/// Labels: `operation` ("insert" | "delete"), `result` ("ok" | "error").
pub fn record_writes() -> Counter<u64> {
    meter()
        .u64_counter("fieldlog.records.writes")
        .with_description("Number of field record writes")
        .build()
}

/// Counter: assistant replies.
/// Labels: `source` ("delegated" | "fallback"), `topic`.
pub fn assistant_replies() -> Counter<u64> {
    meter()
        .u64_counter("fieldlog.assistant.replies")
        .with_description("Number of assistant replies by resolution path")
        .build()
}

/// Counter: exports rendered.
/// Labels: `format`.
pub fn exports() -> Counter<u64> {
    meter()
        .u64_counter("fieldlog.exports")
        .with_description("Number of record exports")
        .build()
}

/// Counter: activity log entries appended.
/// Labels: `action`.
pub fn activity_entries() -> Counter<u64> {
    meter()
        .u64_counter("fieldlog.activity.entries")
        .with_description("Number of activity log entries appended")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("fieldlog.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: LLM token usage.
/// Labels: `model`, `direction` ("input" | "output").
pub fn llm_tokens() -> Counter<u64> {
    meter()
        .u64_counter("fieldlog.llm.tokens")
        .with_description("LLM token usage")
        .build()
}
