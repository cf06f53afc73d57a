//! Logging and tracing setup.
//!
//! The crate logs through `tracing` and never installs a subscriber on its
//! own. Hosts that don't bring one can call [`init_tracing`] or
//! [`init_tracing_json`]. Every pipeline stage runs inside a span, and the
//! subscriber installed here closes spans with a timing line, so a debug run
//! shows where reanalysis time goes.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is unset or unparseable.
const DEFAULT_FILTER: &str = "info";

/// Output style for [`init_tracing_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per event
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber in the given format. Only the first call in
/// a process does anything, and an already-installed subscriber is left
/// alone.
pub fn init_tracing_with(format: LogFormat) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter());
        let installed = match format {
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_span_events(FmtSpan::CLOSE)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_span_events(FmtSpan::CLOSE)
                        .with_current_span(true)
                        .with_target(true),
                )
                .try_init(),
        };
        if installed.is_ok() {
            info!(format = ?format, "disasm-core tracing initialized");
        }
    });
}

pub fn init_tracing() {
    init_tracing_with(LogFormat::Pretty);
}

pub fn init_tracing_json() {
    init_tracing_with(LogFormat::Json);
}

/// Open an `info`-level span for a pipeline stage.
#[macro_export]
macro_rules! span_trace {
    ($name:expr) => {
        tracing::info_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Log an error and hand it back, for use in `Err(...)` position.
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        tracing::error!(error = %e, "Operation failed");
        e
    }};
    ($err:expr, $msg:expr) => {{
        let e = $err;
        tracing::error!(error = %e, message = $msg, "Operation failed");
        e
    }};
}
