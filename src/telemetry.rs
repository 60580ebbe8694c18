//! Logging setup.
//!
//! The pipeline itself never installs a global subscriber — library code
//! should not fight an embedding application's own `tracing` setup. This
//! module offers [`install`] as a convenience for binaries and integration
//! tests, matching the teacher's `tracing-subscriber` `EnvFilter` + `fmt`
//! pattern.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a default `tracing` subscriber reading `RUST_LOG` (falling back
/// to `info`). Safe to call more than once; later calls are no-ops.
pub fn install() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_ansi(true).try_init();
}
