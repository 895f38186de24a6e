#![forbid(unsafe_code)]

//! Locale message catalogs.
//!
//! [`LocaleStrings`] is a flat `key -> message` map for one language.
//! Nested JSON objects flatten into dotted keys, so
//! `{"menu": {"open": "Open"}}` provides `menu.open`. [`Locales`] groups the
//! per-language maps and can load a directory of `<lang>.json` files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{I18nError, Result};

/// Messages for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleStrings {
    entries: BTreeMap<String, String>,
}

impl LocaleStrings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.entries.insert(key.into(), message.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay `other`; its entries win.
    pub fn merge(&mut self, other: LocaleStrings) {
        self.entries.extend(other.entries);
    }

    /// Flatten a JSON object. Strings are messages; numbers and booleans
    /// are stored as their JSON text. Arrays and nulls are rejected.
    pub fn from_json_value(value: &Value, origin: &str) -> Result<Self> {
        let Value::Object(_) = value else {
            return Err(I18nError::invalid_locale(origin, "top level must be an object"));
        };
        let mut strings = Self::new();
        flatten_into(&mut strings, String::new(), value, origin)?;
        Ok(strings)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json_value(&value, "<inline>")
    }
}

fn flatten_into(out: &mut LocaleStrings, prefix: String, value: &Value, origin: &str) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(out, path, child, origin)?;
            }
            Ok(())
        }
        Value::String(message) => {
            out.insert(prefix, message.clone());
            Ok(())
        }
        Value::Number(n) => {
            out.insert(prefix, n.to_string());
            Ok(())
        }
        Value::Bool(b) => {
            out.insert(prefix, b.to_string());
            Ok(())
        }
        Value::Array(_) | Value::Null => Err(I18nError::invalid_locale(
            origin,
            format!("unsupported value at `{prefix}`"),
        )),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LocaleStrings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut strings = Self::new();
        for (key, message) in iter {
            strings.insert(key, message);
        }
        strings
    }
}

/// Catalogs for every known language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locales {
    locales: BTreeMap<String, LocaleStrings>,
}

impl Locales {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the catalog for `lang`.
    pub fn insert(&mut self, lang: impl Into<String>, strings: LocaleStrings) {
        self.locales.insert(lang.into(), strings);
    }

    #[must_use]
    pub fn get(&self, lang: &str) -> Option<&LocaleStrings> {
        self.locales.get(lang)
    }

    #[must_use]
    pub fn contains(&self, lang: &str) -> bool {
        self.locales.contains_key(lang)
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> + '_ {
        self.locales.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locales.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }

    /// Overlay `other` language by language.
    pub fn merge(&mut self, other: Locales) {
        for (lang, strings) in other.locales {
            self.locales.entry(lang).or_default().merge(strings);
        }
    }

    /// Parse `{"en": {...}, "zh": {...}}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(map) = value else {
            return Err(I18nError::invalid_locale("<inline>", "top level must be an object"));
        };
        let mut locales = Self::new();
        for (lang, strings) in &map {
            locales.insert(lang.clone(), LocaleStrings::from_json_value(strings, lang)?);
        }
        Ok(locales)
    }

    /// Load every `<lang>.json` file directly inside `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut locales = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let origin = path.display().to_string();
            let value: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
            let strings = LocaleStrings::from_json_value(&value, &origin)?;
            debug!(lang, keys = strings.len(), path = %origin, "loaded locale file");
            locales.insert(lang, strings);
        }
        Ok(locales)
    }
}
