//! Shared logger initialisation for sealguard binaries.

use env_logger::Env;

/// Initialise the process-wide logger with `default_level` as the fallback
/// filter. `RUST_LOG` still wins when set. Safe to call more than once; later
/// calls are ignored.
pub fn init(default_level: &str) {
    let env = Env::default().default_filter_or(default_level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init();
}
