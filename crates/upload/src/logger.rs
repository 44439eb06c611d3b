//! Logging collaborator injected into the orchestrator.

use tracing::Span;
use tracing::field::Empty;

/// Structured key/value pairs attached to a log line.
pub type LogFields<'a> = &'a [(&'static str, String)];

/// Receives the orchestrator's log output.
pub trait UploadLogger: Send + Sync {
    fn info(&self, message: &str, fields: LogFields<'_>);
    fn error(&self, message: &str, fields: LogFields<'_>);
}

/// Keys [`TracingLogger`] records as fields of their own. Anything else
/// is folded into a single `extra` field.
const SPAN_FIELDS: &[&str] = &[
    "transport",
    "session_id",
    "part_id",
    "range",
    "file_name",
    "file_id",
    "total_bytes",
    "part_size",
    "parts",
    "size",
    "digest",
    "error",
];

macro_rules! fields_span {
    ($level:expr) => {
        tracing::span!(
            $level,
            "upload",
            transport = Empty,
            session_id = Empty,
            part_id = Empty,
            range = Empty,
            file_name = Empty,
            file_id = Empty,
            total_bytes = Empty,
            part_size = Empty,
            parts = Empty,
            size = Empty,
            digest = Empty,
            error = Empty,
            extra = Empty,
        )
    };
}

/// Forwards to `tracing`, with each field recorded on an `upload` span
/// around the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl UploadLogger for TracingLogger {
    fn info(&self, message: &str, fields: LogFields<'_>) {
        let span = fields_span!(tracing::Level::INFO);
        record_fields(&span, fields);
        span.in_scope(|| tracing::info!("{message}"));
    }

    fn error(&self, message: &str, fields: LogFields<'_>) {
        let span = fields_span!(tracing::Level::ERROR);
        record_fields(&span, fields);
        span.in_scope(|| tracing::error!("{message}"));
    }
}

fn record_fields(span: &Span, fields: LogFields<'_>) {
    let mut extra = Vec::new();
    for (key, value) in fields {
        if SPAN_FIELDS.contains(key) {
            span.record(*key, value.as_str());
        } else {
            extra.push((*key, value.clone()));
        }
    }
    if !extra.is_empty() {
        span.record("extra", render_fields(&extra).as_str());
    }
}

/// Renders fields as `key=value` pairs separated by spaces.
pub fn render_fields(fields: LogFields<'_>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
