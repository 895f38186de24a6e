#![forbid(unsafe_code)]

//! Logging bootstrap.
//!
//! Installs a `tracing-subscriber` fmt subscriber filtered by an
//! [`EnvFilter`]. The `TRELLIS_LOG` environment variable, when set and
//! non-empty, replaces the configured directive.
//!
//! Useful targets: `trellis_reactive` (propagation spans, batch flushes),
//! `trellis_i18n::scope` (establish, unmount, recompose), and
//! `trellis_i18n::source` (language switches).

use serde::{Deserialize, Serialize};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

pub const LOG_ENV: &str = "TRELLIS_LOG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `"info,trellis_i18n=debug"`.
    pub filter: String,
    pub format: LogFormat,
    pub ansi: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            format: LogFormat::Full,
            ansi: true,
            with_target: true,
        }
    }
}

/// Directive in effect: `TRELLIS_LOG` if set, else the configured filter.
#[must_use]
pub fn effective_directive(config: &LogConfig) -> String {
    std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.filter.clone())
}

pub fn env_filter(config: &LogConfig) -> Result<EnvFilter> {
    parse_filter(&effective_directive(config))
}

fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|err| Error::LogFilter {
        directive: directive.to_owned(),
        message: err.to_string(),
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.with_target);
    let installed = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|_| Error::SubscriberInstalled)
}

/// Install a subscriber for the current thread only, until the guard drops.
pub fn init_scoped(config: &LogConfig) -> Result<DefaultGuard> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.with_target);
    let guard = match config.format {
        LogFormat::Full => tracing::subscriber::set_default(builder.finish()),
        LogFormat::Compact => tracing::subscriber::set_default(builder.compact().finish()),
    };
    Ok(guard)
}
