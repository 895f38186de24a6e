#![forbid(unsafe_code)]

//! Error type for loading catalogs and resolving scopes.

use thiserror::Error;

use crate::scope::ScopeId;

pub type Result<T> = std::result::Result<T, I18nError>;

#[derive(Debug, Error)]
pub enum I18nError {
    /// A strict lookup found no established scope above the calling position.
    #[error("no translation scope is established at this position")]
    ScopeNotFound,

    #[error("scope {id} has been unmounted")]
    StaleScope { id: ScopeId },

    #[error("unknown locale: {lang}")]
    UnknownLocale { lang: String },

    #[error("invalid locale data in {origin}: {message}")]
    InvalidLocale { origin: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl I18nError {
    #[must_use]
    pub fn invalid_locale(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLocale {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// True for the scope-resolution failures, as opposed to data loading.
    #[must_use]
    pub fn is_scope_error(&self) -> bool {
        matches!(self, Self::ScopeNotFound | Self::StaleScope { .. })
    }
}
