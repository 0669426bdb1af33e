//! Process-wide logging init: `tracing-subscriber` with an env filter,
//! matching the teacher's convention of one `init()` call from the binary
//! entry point. No custom event bus — suspension points are annotated with
//! `#[instrument]`/span fields directly on the owning functions.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber. Safe to call once per
/// process; subsequent calls are no-ops (the underlying `set_global_default`
/// error is swallowed, matching typical CLI entry-point behavior).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
