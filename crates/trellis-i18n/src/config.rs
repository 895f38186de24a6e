#![forbid(unsafe_code)]

//! Translation source configuration.
//!
//! ```toml
//! default_lang = "en"
//! locale_dir = "locales"
//!
//! [locales.en]
//! greeting = "Hello"
//!
//! [locales.en.menu]
//! open = "Open"
//! ```
//!
//! Inline tables flatten exactly like locale JSON files (`menu.open`), and
//! override entries loaded from `locale_dir`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{LocaleStrings, Locales};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    /// Language the source starts in.
    pub default_lang: String,

    /// Directory of `<lang>.json` catalogs.
    pub locale_dir: Option<PathBuf>,

    /// Inline catalogs keyed by language.
    pub locales: BTreeMap<String, Value>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_lang: "en".to_owned(),
            locale_dir: None,
            locales: BTreeMap::new(),
        }
    }
}

impl I18nConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Validation problems; empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.default_lang.trim().is_empty() {
            errors.push("default_lang must not be empty".to_owned());
        }
        if self.locale_dir.is_none() && self.locales.is_empty() {
            errors.push("either locale_dir or inline locales must be provided".to_owned());
        }
        errors
    }

    /// Inline catalogs as [`Locales`].
    pub fn inline_locales(&self) -> Result<Locales> {
        let mut locales = Locales::new();
        for (lang, value) in &self.locales {
            let origin = format!("config locales.{lang}");
            locales.insert(lang.clone(), LocaleStrings::from_json_value(value, &origin)?);
        }
        Ok(locales)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::I18nError;
    use crate::source::{I18n, TranslationSource};

    const SAMPLE: &str = r#"
default_lang = "fr"

[locales.en]
greeting = "Hello"

[locales.fr]
greeting = "Bonjour"

[locales.fr.menu]
open = "Ouvrir"
"#;

    #[test]
    fn toml_inline_locales_flatten() {
        let config = I18nConfig::from_toml_str(SAMPLE).expect("valid toml");
        assert_eq!(config.default_lang, "fr");
        let locales = config.inline_locales().expect("valid locales");
        assert_eq!(
            locales.get("fr").and_then(|s| s.get("menu.open")),
            Some("Ouvrir")
        );
    }

    #[test]
    fn source_from_config_starts_in_default_lang() {
        let config = I18nConfig::from_toml_str(SAMPLE).expect("valid toml");
        let i18n = I18n::from_config(&config).expect("source");
        assert_eq!(i18n.language(), "fr");
        assert_eq!(i18n.translator().t("greeting"), "Bonjour");
    }

    #[test]
    fn locale_dir_and_inline_overlay() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("en.json"),
            r#"{"greeting": "Hi", "bye": "Bye"}"#,
        )
        .expect("write");
        let config = I18nConfig {
            locale_dir: Some(dir.path().to_path_buf()),
            locales: BTreeMap::from([(
                "en".to_owned(),
                serde_json::json!({ "greeting": "Hello" }),
            )]),
            ..I18nConfig::default()
        };
        let t = I18n::from_config(&config).expect("source").translator();
        assert_eq!(t.t("greeting"), "Hello");
        assert_eq!(t.t("bye"), "Bye");
    }

    #[test]
    fn empty_config_fails_validation() {
        let err = I18n::from_config(&I18nConfig::default()).unwrap_err();
        assert!(matches!(err, I18nError::Validation(ref errors) if errors.len() == 1));
    }

    #[test]
    fn json_config_round_trip_defaults() {
        let config = I18nConfig::from_json_str(r#"{"locales": {"en": {"a": "b"}}}"#).expect("json");
        assert_eq!(config.default_lang, "en");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn bad_toml_reports_toml_error() {
        assert!(matches!(
            I18nConfig::from_toml_str("default_lang = "),
            Err(I18nError::Toml(_))
        ));
    }
}
