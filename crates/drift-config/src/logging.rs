//! Logging setup for Drift binaries.
//!
//! Call [`init`] once at startup. The `DRIFT_LOG` environment variable
//! takes precedence over the default directive, using the usual
//! `tracing_subscriber::EnvFilter` syntax.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted for filter directives.
pub const LOG_ENV_VAR: &str = "DRIFT_LOG";

/// Initialize the global tracing subscriber.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
