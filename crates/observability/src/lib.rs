//! Tracing and logging setup shared by the bot binary and its tests.

/// Initialize process-wide tracing.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber setup and per-command spans.
pub mod tracing;

pub use crate::tracing::command_span;
