#![forbid(unsafe_code)]

//! Translate-function values with explicit identity.
//!
//! A [`Translator`] is a shared `(key, args) -> String` closure paired with a
//! process-unique [`TranslatorId`]. Equality compares ids only, so two
//! translators with identical behaviour built at different times are still
//! different values. Memoization downstream keys on these ids.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::template::Template;

static NEXT_TRANSLATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one translator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TranslatorId(u64);

impl TranslatorId {
    fn next() -> Self {
        Self(NEXT_TRANSLATOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

type TranslateFn = dyn Fn(&str, &[(&str, &str)]) -> String;

/// A translate function value.
#[derive(Clone)]
pub struct Translator {
    id: TranslatorId,
    f: Rc<TranslateFn>,
}

impl Translator {
    /// Wrap `f` under a fresh id.
    pub fn new(f: impl Fn(&str, &[(&str, &str)]) -> String + 'static) -> Self {
        Self {
            id: TranslatorId::next(),
            f: Rc::new(f),
        }
    }

    /// A translator with no entries: every lookup is a miss.
    #[must_use]
    pub fn echo() -> Self {
        Self::new(|key, _| key.to_owned())
    }

    #[must_use]
    pub fn id(&self) -> TranslatorId {
        self.id
    }

    /// Translate `key`, substituting `args` into the message.
    #[must_use]
    pub fn translate(&self, key: &str, args: &[(&str, &str)]) -> String {
        (self.f)(key, args)
    }

    /// Translate `key` without arguments.
    #[must_use]
    pub fn t(&self, key: &str) -> String {
        self.translate(key, &[])
    }

    /// Whether `key` misses, i.e. the translator echoes it back.
    #[must_use]
    pub fn misses(&self, key: &str) -> bool {
        self.t(key) == key
    }
}

impl PartialEq for Translator {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Translator {}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator").field("id", &self.id.0).finish()
    }
}

/// Substitute `{{name}}` arguments into `message`.
///
/// Unknown names stay verbatim and substituted values are not scanned
/// again.
#[must_use]
pub fn fill_args(message: &str, args: &[(&str, &str)]) -> String {
    if args.is_empty() {
        return message.to_owned();
    }
    Template::parse(message).fill(|name| {
        args.iter()
            .find(|(arg, _)| *arg == name)
            .map(|(_, value)| *value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Translator::echo();
        let b = Translator::echo();
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn echo_always_misses() {
        let t = Translator::echo();
        assert_eq!(t.t("menu.open"), "menu.open");
        assert!(t.misses("menu.open"));
    }

    #[test]
    fn translate_passes_args() {
        let t = Translator::new(|key, args| format!("{key}:{}", args.len()));
        assert_eq!(t.translate("k", &[("a", "1"), ("b", "2")]), "k:2");
    }

    #[test]
    fn fill_args_substitutes_known_names() {
        assert_eq!(
            fill_args("Hello, {{name}}!", &[("name", "Ada")]),
            "Hello, Ada!"
        );
    }

    #[test]
    fn fill_args_keeps_unknown_and_is_not_recursive() {
        assert_eq!(
            fill_args("{{a}} and {{b}}", &[("a", "{{b}}")]),
            "{{b}} and {{b}}"
        );
    }

    #[test]
    fn fill_args_without_args_is_identity() {
        assert_eq!(fill_args("x {{y}} z", &[]), "x {{y}} z");
    }
}
