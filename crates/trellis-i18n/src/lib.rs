#![forbid(unsafe_code)]

//! Scoped translations for trellis.
//!
//! A [`ScopeTree`] makes a [`TranslationSource`] visible to a subtree. Nested
//! scopes shadow their ancestors without replacing them: each scope's
//! composite [`Translator`] tries its own source first and falls back to its
//! parent's composite on a miss (a lookup that echoes the key).
//!
//! [`template`] is independent of scope state. It splits a message such as
//! `"a{{b}}c"` into literal and placeholder segments and substitutes
//! caller-supplied [`Slot`]s, keyed or positional.
//!
//! # How it fits together
//! Scopes are built on `trellis-reactive`: every scope binds to its own
//! source and to its parent's composite and recomputes when either emits,
//! parent before child.

pub mod catalog;
pub mod compose;
pub mod config;
pub mod error;
pub mod scope;
pub mod source;
pub mod template;
pub mod translator;

pub use catalog::{LocaleStrings, Locales};
pub use compose::{Composer, compose};
pub use config::I18nConfig;
pub use error::{I18nError, Result};
pub use scope::{PositionGuard, ScopeHandle, ScopeId, ScopeTree};
pub use source::{I18n, LocaleState, TranslationSource};
pub use template::{Emission, Fragment, Interpolator, Slot, Template, interpolate};
pub use translator::{Translator, TranslatorId};
