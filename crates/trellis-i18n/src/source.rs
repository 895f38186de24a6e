#![forbid(unsafe_code)]

//! Translation sources.
//!
//! A [`TranslationSource`] publishes its language and translator as one
//! [`Observable<LocaleState>`], so a language switch is a single emission:
//! no subscriber can observe the new language with the old translator.
//!
//! [`I18n`] is the catalog-backed source shipped with this crate.

use std::cell::RefCell;

use tracing::{info, warn};
use trellis_reactive::{BatchScope, Observable};

use crate::catalog::{LocaleStrings, Locales};
use crate::config::I18nConfig;
use crate::error::{I18nError, Result};
use crate::translator::{Translator, fill_args};

/// The `(language, translator)` pair a source publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleState {
    pub lang: String,
    pub translator: Translator,
}

/// Reactive capability consumed by scopes.
pub trait TranslationSource {
    /// Current language and translator.
    fn state(&self) -> &Observable<LocaleState>;

    /// Switch language, updating language and translator in one emission.
    fn switch_language(&self, lang: &str) -> Result<()>;

    fn language(&self) -> String {
        self.state().with(|state| state.lang.clone())
    }

    fn translator(&self) -> Translator {
        self.state().with(|state| state.translator.clone())
    }
}

/// A translation source over an in-memory [`Locales`] catalog.
///
/// Missing keys echo back unchanged, which is what lets scopes fall back to
/// their ancestors.
pub struct I18n {
    locales: RefCell<Locales>,
    state: Observable<LocaleState>,
}

impl I18n {
    /// Create a source starting in `lang`, which must exist in `locales`.
    pub fn new(lang: impl Into<String>, locales: Locales) -> Result<Self> {
        let lang = lang.into();
        let Some(strings) = locales.get(&lang) else {
            return Err(I18nError::UnknownLocale { lang });
        };
        let translator = catalog_translator(strings.clone());
        Ok(Self {
            locales: RefCell::new(locales),
            state: Observable::new(LocaleState { lang, translator }),
        })
    }

    /// Single-language source, convenient for nested scopes that only
    /// override a handful of keys.
    pub fn single(lang: impl Into<String>, strings: LocaleStrings) -> Self {
        let lang = lang.into();
        let translator = catalog_translator(strings.clone());
        let mut locales = Locales::new();
        locales.insert(lang.clone(), strings);
        Self {
            locales: RefCell::new(locales),
            state: Observable::new(LocaleState { lang, translator }),
        }
    }

    /// Build from configuration: `locale_dir` first, inline locales on top.
    pub fn from_config(config: &I18nConfig) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(I18nError::Validation(errors));
        }
        let mut locales = match &config.locale_dir {
            Some(dir) => Locales::load_dir(dir)?,
            None => Locales::new(),
        };
        locales.merge(config.inline_locales()?);
        Self::new(config.default_lang.clone(), locales)
    }

    /// Languages this source can switch to.
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        self.locales.borrow().languages().map(str::to_owned).collect()
    }

    /// Add or replace a catalog. Replacing the active language re-emits a
    /// new translator under the same language.
    pub fn add_locale(&self, lang: impl Into<String>, strings: LocaleStrings) {
        let lang = lang.into();
        let active = self.language() == lang;
        self.locales.borrow_mut().insert(lang.clone(), strings.clone());
        if active {
            info!(lang = %lang, "active locale reloaded");
            self.state.set(LocaleState {
                lang,
                translator: catalog_translator(strings),
            });
        }
    }
}

impl TranslationSource for I18n {
    fn state(&self) -> &Observable<LocaleState> {
        &self.state
    }

    fn switch_language(&self, lang: &str) -> Result<()> {
        if self.state.with(|state| state.lang == lang) {
            return Ok(());
        }
        let strings = self.locales.borrow().get(lang).cloned();
        let Some(strings) = strings else {
            warn!(lang, "switch to unknown locale rejected");
            return Err(I18nError::UnknownLocale {
                lang: lang.to_owned(),
            });
        };
        let previous = self.language();
        // Dependent scopes settle in one flush when the caller is not
        // already batching.
        let _batch = BatchScope::new();
        self.state.set(LocaleState {
            lang: lang.to_owned(),
            translator: catalog_translator(strings),
        });
        info!(from = %previous, to = lang, "language switched");
        Ok(())
    }
}

impl std::fmt::Debug for I18n {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I18n")
            .field("lang", &self.language())
            .field("languages", &self.languages())
            .field("version", &self.state.version())
            .finish()
    }
}

fn catalog_translator(strings: LocaleStrings) -> Translator {
    Translator::new(move |key, args| match strings.get(key) {
        Some(message) => fill_args(message, args),
        None => key.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn fruit_locales() -> Locales {
        Locales::from_json_str(
            r#"{"en": {"apple": "apple", "greet": "Hi {{name}}"}, "zh": {"apple": "苹果"}}"#,
        )
        .expect("valid locales")
    }

    #[test]
    fn translates_and_echoes_misses() {
        let i18n = I18n::new("en", fruit_locales()).expect("en exists");
        let t = i18n.translator();
        assert_eq!(t.t("apple"), "apple");
        assert_eq!(t.translate("greet", &[("name", "Ada")]), "Hi Ada");
        assert_eq!(t.t("banana"), "banana");
    }

    #[test]
    fn unknown_initial_language_is_an_error() {
        let err = I18n::new("de", fruit_locales()).unwrap_err();
        assert!(matches!(err, I18nError::UnknownLocale { ref lang } if lang == "de"));
    }

    #[test]
    fn switch_language_emits_once_with_both_values() {
        let i18n = I18n::new("en", fruit_locales()).expect("en exists");
        let before = i18n.translator().id();
        let emissions = Rc::new(Cell::new(0u32));
        let emissions_clone = Rc::clone(&emissions);
        let _sub = i18n.state().subscribe(move |state: &LocaleState| {
            assert_eq!(state.lang, "zh");
            assert_eq!(state.translator.t("apple"), "苹果");
            emissions_clone.set(emissions_clone.get() + 1);
        });

        i18n.switch_language("zh").expect("zh exists");
        assert_eq!(emissions.get(), 1);
        assert_eq!(i18n.language(), "zh");
        assert_ne!(i18n.translator().id(), before);
    }

    #[test]
    fn switch_to_current_language_is_silent() {
        let i18n = I18n::new("en", fruit_locales()).expect("en exists");
        let id = i18n.translator().id();
        i18n.switch_language("en").expect("noop switch");
        assert_eq!(i18n.state().version(), 0);
        assert_eq!(i18n.translator().id(), id);
    }

    #[test]
    fn switch_to_unknown_language_keeps_state() {
        let i18n = I18n::new("en", fruit_locales()).expect("en exists");
        assert!(i18n.switch_language("fr").is_err());
        assert_eq!(i18n.language(), "en");
        assert_eq!(i18n.state().version(), 0);
    }

    #[test]
    fn add_locale_reemits_for_active_language() {
        let i18n = I18n::new("en", fruit_locales()).expect("en exists");
        i18n.add_locale("fr", [("apple", "pomme")].into_iter().collect());
        assert_eq!(i18n.state().version(), 0);

        i18n.add_locale("en", [("apple", "Apple")].into_iter().collect());
        assert_eq!(i18n.state().version(), 1);
        assert_eq!(i18n.translator().t("apple"), "Apple");

        i18n.switch_language("fr").expect("fr added");
        assert_eq!(i18n.translator().t("apple"), "pomme");
        assert_eq!(i18n.languages(), ["en", "fr", "zh"]);
    }
}
