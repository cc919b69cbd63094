pub mod admin;
pub mod builder;
pub mod config;
pub mod error;
pub mod exposition;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod signals;
pub mod snapshot;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` takes precedence over `level` when set. `format` is `json`
/// for one JSON object per line, anything else for human-readable text.
pub fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
