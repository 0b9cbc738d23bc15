//! Log output for applications embedding the engine.
//!
//! The engine only emits `tracing` events. Applications that don't set up
//! their own subscriber can call [`init`].

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered by `RUST_LOG`, or by
/// `default_filter` (e.g. `"parrot=info"`) when that isn't set.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes. Safe to call more than once.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_second_call_is_noop() {
        init("parrot=debug");
        assert!(!init("parrot=trace"));
    }
}
