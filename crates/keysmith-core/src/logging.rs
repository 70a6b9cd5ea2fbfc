//! `tracing` subscriber setup.
//!
//! Libraries only emit events; binaries and test harnesses call [`init`] once
//! to decide where they go.

use crate::config::LoggingConfig;
use crate::env::vars;
use crate::error::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `KEYSMITH_LOG` wins, otherwise the configured level for
/// the keysmith crates.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(vars::KEYSMITH_LOG).unwrap_or_else(|_| {
        let level = config.level.as_str();
        EnvFilter::new(format!("keysmith_core={level},keysmith_keychain={level}"))
    })
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), Error> {
    let registry = tracing_subscriber::registry().with(filter(config));

    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| Error::Logging(e.to_string()))
}
