//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG` (default `info`). Every handled
//! command runs inside a `command` span carrying its [`CommandId`], so all log
//! lines of one request can be joined on `command_id`.

use milkbot_core::CommandId;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,sqlx=warn";

pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init();
}

/// Span wrapping one inbound command. Requester names are never recorded.
pub fn command_span(command_id: CommandId, operation: &'static str) -> ::tracing::Span {
    ::tracing::info_span!("command", command_id = %command_id, operation)
}
