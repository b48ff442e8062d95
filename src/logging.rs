//! Tracing subscriber setup for the CLI and embedding hosts.
//!
//! Filtering follows `RUST_LOG`; the default level is `info`.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Human-readable logs on stderr. Later calls are ignored.
pub fn init_tracing() {
    INIT.call_once(|| {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);

        if tracing_subscriber::registry()
            .with(env_filter())
            .with(layer)
            .try_init()
            .is_ok()
        {
            info!("signinspect tracing initialized");
        }
    });
}

/// JSON logs on stderr, one object per event.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true);

        if tracing_subscriber::registry()
            .with(env_filter())
            .with(layer)
            .try_init()
            .is_ok()
        {
            info!("signinspect tracing initialized (JSON mode)");
        }
    });
}
