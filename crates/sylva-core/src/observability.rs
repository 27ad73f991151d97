//! Observability infrastructure for sylva.
//!
//! Structured logging with consistent spans. This module provides the
//! initialization helper and span constructors used across the consumer
//! components.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `sylva_consumer=debug`)
///
/// # Example
///
/// ```rust
/// use sylva_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one consumption run with standard fields.
#[must_use]
pub fn run_span(operation: &str, run_id: &str, task_uri: &str) -> Span {
    tracing::info_span!(
        "consumption_run",
        op = operation,
        run_id = run_id,
        task = task_uri,
    )
}

/// Creates a span for per-file processing within a run.
#[must_use]
pub fn file_span(operation: &str, file_id: &str) -> Span {
    tracing::info_span!("delta_file", op = operation, file_id = file_id)
}
