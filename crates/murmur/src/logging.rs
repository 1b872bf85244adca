//! Process-wide log subscriber.
//!
//! Library code logs through the `log` facade and opens `tracing` spans
//! around job work. [`init_logging`] wires both into one `tracing_subscriber`
//! registry. Embedding applications that install their own subscriber can
//! skip it.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
///
/// Returns false if a subscriber was already installed, in which case the
/// call changes nothing.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let fmt_layer = if config.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }

    // Route `log` records into the subscriber.
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge not installed: {}", e);
    }

    tracing::info!(level = %config.level, json = config.json, "Logging initialized");
    true
}
