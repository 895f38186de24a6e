#![forbid(unsafe_code)]

//! Consumer-side binding to a single [`Observable`].
//!
//! A [`Binding`] caches the source's current value, re-evaluates its
//! consumer callback on every emission, and owns the subscription guard.
//! The subscription is released on every exit path: drop, [`Binding::unbind`],
//! and [`Binding::rebind`] (the old guard is dropped before the new source is
//! subscribed).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::observable::{Observable, Subscription};

type Consumer<T> = Rc<dyn Fn(&T)>;

/// A live binding from one observable to a consumer callback.
pub struct Binding<T> {
    source: Observable<T>,
    current: Rc<RefCell<T>>,
    evaluations: Rc<Cell<u64>>,
    consumer: Consumer<T>,
    subscription: Option<Subscription>,
}

impl<T: Clone + PartialEq + 'static> Binding<T> {
    /// Bind `on_change` to `source`. The current value is read immediately;
    /// `on_change` only runs for later emissions.
    pub fn new(source: &Observable<T>, on_change: impl Fn(&T) + 'static) -> Self {
        let mut binding = Self {
            source: source.clone(),
            current: Rc::new(RefCell::new(source.get())),
            evaluations: Rc::new(Cell::new(0)),
            consumer: Rc::new(on_change),
            subscription: None,
        };
        binding.subscribe();
        binding
    }

    /// Bind without a consumer; the binding only tracks the value.
    pub fn passive(source: &Observable<T>) -> Self {
        Self::new(source, |_| {})
    }

    fn subscribe(&mut self) {
        let current = Rc::clone(&self.current);
        let evaluations = Rc::clone(&self.evaluations);
        let consumer = Rc::clone(&self.consumer);
        self.subscription = Some(self.source.subscribe(move |value| {
            *current.borrow_mut() = value.clone();
            evaluations.set(evaluations.get() + 1);
            trace!(evaluations = evaluations.get(), "binding re-evaluated");
            consumer(value);
        }));
    }

    /// Value as of the last emission (or bind time).
    #[must_use]
    pub fn get(&self) -> T {
        self.current.borrow().clone()
    }

    /// Borrow the cached value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.current.borrow())
    }

    /// Number of times the consumer has been re-evaluated.
    #[must_use]
    pub fn evaluations(&self) -> u64 {
        self.evaluations.get()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }

    /// The observable this binding currently follows.
    #[must_use]
    pub fn source(&self) -> &Observable<T> {
        &self.source
    }

    /// Switch to a different source. The previous subscription is released
    /// first; if `source` is the same observable this is a no-op.
    pub fn rebind(&mut self, source: &Observable<T>) {
        if self.source.ptr_eq(source) && self.is_bound() {
            return;
        }
        self.subscription = None;
        self.source = source.clone();
        *self.current.borrow_mut() = source.get();
        self.subscribe();
    }

    /// Release the subscription. The cached value stays readable.
    pub fn unbind(&mut self) {
        self.subscription = None;
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("current", &self.current.borrow())
            .field("evaluations", &self.evaluations.get())
            .field("bound", &self.subscription.is_some())
            .finish()
    }
}
