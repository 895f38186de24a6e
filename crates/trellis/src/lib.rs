#![forbid(unsafe_code)]

//! trellis public facade crate.
//!
//! Re-exports the reactive and i18n crates, adds a combined
//! [`TrellisConfig`], logging bootstrap, and [`App`], which wires a
//! configured [`I18n`] source into a [`ScopeTree`] as the root scope.

use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub mod logging;

// --- Reactive re-exports ---------------------------------------------------

pub use trellis_reactive::{BatchScope, Binding, Observable, Subscription};

// --- i18n re-exports -------------------------------------------------------

pub use trellis_i18n::{
    Emission, Fragment, I18n, I18nConfig, I18nError, Interpolator, LocaleState, LocaleStrings,
    Locales, PositionGuard, ScopeHandle, ScopeId, ScopeTree, Slot, Template, TranslationSource,
    Translator, interpolate,
};

pub use logging::LogConfig;

// --- Errors ---------------------------------------------------------------

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    I18n(#[from] I18nError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid log filter `{directive}`: {message}")]
    LogFilter { directive: String, message: String },

    #[error("a global tracing subscriber is already installed")]
    SubscriberInstalled,
}

pub type Result<T> = std::result::Result<T, Error>;

// --- Configuration --------------------------------------------------------

/// Top-level configuration.
///
/// ```toml
/// [log]
/// filter = "trellis_i18n=debug"
///
/// [i18n]
/// default_lang = "en"
/// locale_dir = "locales"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrellisConfig {
    pub i18n: I18nConfig,
    pub log: LogConfig,
}

impl TrellisConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}

// --- App ------------------------------------------------------------------

/// A scope tree with a configured source established at its root.
///
/// Everything rendered through [`App::tree`] sees the root source unless a
/// nested scope shadows it.
pub struct App {
    source: Rc<I18n>,
    root: ScopeHandle,
    tree: ScopeTree,
}

impl App {
    pub fn new(source: Rc<I18n>) -> Self {
        let tree = ScopeTree::new();
        let root = tree.establish_scope(source.clone());
        Self { source, root, tree }
    }

    pub fn from_config(config: &TrellisConfig) -> Result<Self> {
        let source = Rc::new(I18n::from_config(&config.i18n)?);
        info!(
            lang = %source.language(),
            languages = source.languages().len(),
            "translation source ready"
        );
        Ok(Self::new(source))
    }

    #[must_use]
    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    #[must_use]
    pub fn source(&self) -> &Rc<I18n> {
        &self.source
    }

    #[must_use]
    pub fn root(&self) -> ScopeId {
        self.root.id()
    }

    /// Switch the root source's language.
    pub fn switch_language(&self, lang: &str) -> Result<()> {
        Ok(self.source.switch_language(lang)?)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("source", &self.source)
            .field("root", &self.root)
            .field("tree", &self.tree)
            .finish()
    }
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        App, BatchScope, Binding, Emission, Error, Fragment, I18n, Interpolator, Observable,
        Result, ScopeTree, Slot, TranslationSource, Translator, TrellisConfig, interpolate,
    };

    pub use crate::{i18n, reactive};
}

pub use trellis_i18n as i18n;
pub use trellis_reactive as reactive;
