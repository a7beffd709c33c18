//! Log output helpers.
//!
//! The library only emits `tracing` events. Hosts either install their own
//! subscriber or use these helpers; a [`Dispatch`] built by [`subscriber`]
//! can also be handed to a single source with `with_dispatch` so that its
//! session logs go somewhere other than the global default.

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before the fallback filter.
pub const FILTER_ENV: &str = "SENSORWIRE_LOG";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Formatting subscriber filtered by `$SENSORWIRE_LOG`, or `default` when
/// unset (e.g. `"sensorwire=debug"`).
pub fn subscriber(default: &str) -> Dispatch {
    Dispatch::new(tracing_subscriber::fmt().with_env_filter(filter(default)).finish())
}

/// Install [`subscriber`] as the global default.
///
/// Returns `false` if a global subscriber was already set.
pub fn try_init(default: &str) -> bool {
    tracing::dispatcher::set_global_default(subscriber(default)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_dispatch_receives_events() {
        let dispatch = subscriber("sensorwire=trace");
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("scoped event");
            assert!(tracing::enabled!(tracing::Level::INFO));
        });
    }

    #[test]
    fn second_global_install_is_rejected() {
        let _ = try_init("warn");
        assert!(!try_init("warn"));
    }
}
