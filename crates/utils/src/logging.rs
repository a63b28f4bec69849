//! Tracing subscriber setup shared by the binaries.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,server=debug,services=debug,db=debug";

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this twice is harmless; the
/// second installation attempt is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
