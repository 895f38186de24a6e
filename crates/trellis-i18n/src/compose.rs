#![forbid(unsafe_code)]

//! Fallback composition of translators.
//!
//! A composite tries its own translator and, on a miss (the result equals
//! the key), asks the parent composite. Since the parent is itself a
//! composite, one delegation reaches every ancestor.

use tracing::trace;

use crate::translator::{Translator, TranslatorId};

/// Compose `own` over `parent` into a fresh translator.
#[must_use]
pub fn compose(own: &Translator, parent: Option<&Translator>) -> Translator {
    let own = own.clone();
    let parent = parent.cloned();
    Translator::new(move |key, args| {
        let result = own.translate(key, args);
        match &parent {
            Some(parent) if result == key => parent.translate(key, args),
            _ => result,
        }
    })
}

/// Memoized [`compose`] keyed by input identities.
///
/// A new composite (and so a new [`TranslatorId`]) is produced only when the
/// own or parent translator id changes.
#[derive(Debug, Default)]
pub struct Composer {
    inputs: Option<(TranslatorId, Option<TranslatorId>)>,
    composite: Option<Translator>,
    recomputations: u64,
}

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, own: &Translator, parent: Option<&Translator>) -> Translator {
        let inputs = (own.id(), parent.map(Translator::id));
        if let Some(composite) = &self.composite
            && self.inputs == Some(inputs)
        {
            return composite.clone();
        }
        let composite = compose(own, parent);
        self.recomputations += 1;
        trace!(
            own = inputs.0.get(),
            parent = inputs.1.map(TranslatorId::get),
            composite = composite.id().get(),
            "composite translator recomputed"
        );
        self.inputs = Some(inputs);
        self.composite = Some(composite.clone());
        composite
    }

    /// How many composites this memo has built.
    #[must_use]
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}
