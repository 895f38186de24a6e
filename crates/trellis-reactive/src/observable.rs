#![forbid(unsafe_code)]

//! Shared value with change notification and version tracking.
//!
//! [`Observable<T>`] keeps its value in `Rc<RefCell<..>>` storage. A change
//! (decided by `PartialEq`) bumps the version and notifies live subscribers
//! in registration order. Translation sources publish their
//! `(language, translator)` pair through one of these, and scopes publish
//! their composite translators the same way.
//!
//! # Failure Modes
//!
//! - **Subscriber leak**: `Subscription` guards stored forever keep their
//!   callbacks alive. Dead weak references are pruned lazily on notify.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{info_span, trace};
use web_time::Instant;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    /// Weak so that dropping the `Subscription` is enough to unsubscribe.
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` yields another handle to the **same** state.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable at version 0 with no subscribers.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value. Subscribers run only if the value changed.
    ///
    /// Safe to call from within a subscriber callback of a *different*
    /// observable; scopes rely on this to cascade composite updates.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Mutate in place. Subscribers run only if the value changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value != old {
                inner.version += 1;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Register `callback` for future changes.
    ///
    /// The callback is not invoked with the current value. Dropping the
    /// returned guard unsubscribes. Dead entries are pruned here as well as
    /// on notify, so the list stays bounded by live subscriptions plus those
    /// dropped since the last subscribe or emission.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.retain(|w| w.strong_count() > 0);
        inner.subscribers.push(weak);
        drop(inner);
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Version number, bumped once per value-changing mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Whether two handles share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        // Collect first so no borrow is held while callbacks run.
        let callbacks: Vec<CallbackRc<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(|w| w.upgrade())
                .collect()
        };

        if callbacks.is_empty() {
            return;
        }

        if super::batch::is_batching() {
            super::batch::record_emission();
            for cb in callbacks {
                let callback_key = Rc::as_ptr(&cb) as *const () as usize;
                // Weak, so a subscription dropped before the flush is skipped.
                let pending = Rc::downgrade(&cb);
                let source = self.clone();
                super::batch::defer_or_run_keyed(callback_key, move || {
                    if let Some(cb) = pending.upgrade() {
                        let latest = source.get();
                        cb(&latest);
                    }
                });
            }
            return;
        }

        let subscribers = callbacks.len() as u64;
        let value = self.inner.borrow().value.clone();
        let started = Instant::now();
        let _span = info_span!(
            "reactive.propagate",
            subscribers,
            duration_us = tracing::field::Empty
        )
        .entered();

        for cb in &callbacks {
            cb(&value);
        }

        let duration_us = started.elapsed().as_micros() as u64;
        tracing::Span::current().record("duration_us", duration_us);
        trace!(
            reactive_propagation_duration_us = duration_us,
            subscribers, "reactive propagation complete"
        );
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping it releases the only strong reference to the callback, so the
/// observable's weak entry fails to upgrade on the next notification.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};

    #[derive(Default)]
    struct SubscriberCountVisitor {
        subscribers: Option<u64>,
    }

    impl Visit for SubscriberCountVisitor {
        fn record_u64(&mut self, field: &Field, value: u64) {
            if field.name() == "subscribers" {
                self.subscribers = Some(value);
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    }

    struct PropagationSpanCapture {
        next_id: AtomicU64,
        spans: Arc<Mutex<Vec<u64>>>,
    }

    impl tracing::Subscriber for PropagationSpanCapture {
        fn enabled(&self, _metadata: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, attrs: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            if attrs.metadata().name() == "reactive.propagate" {
                let mut visitor = SubscriberCountVisitor::default();
                attrs.record(&mut visitor);
                self.spans
                    .lock()
                    .expect("span capture lock")
                    .push(visitor.subscribers.unwrap_or(0));
            }
            tracing::span::Id::from_u64(self.next_id.fetch_add(1, Ordering::Relaxed))
        }

        fn record(&self, _span: &tracing::span::Id, _values: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _span: &tracing::span::Id, _follows: &tracing::span::Id) {}

        fn event(&self, _event: &tracing::Event<'_>) {}

        fn enter(&self, _span: &tracing::span::Id) {}

        fn exit(&self, _span: &tracing::span::Id) {}
    }

    fn capture_propagation_spans(run: impl FnOnce()) -> Vec<u64> {
        let spans = Arc::new(Mutex::new(Vec::new()));
        let subscriber = PropagationSpanCapture {
            next_id: AtomicU64::new(1),
            spans: Arc::clone(&spans),
        };
        let _guard = tracing::subscriber::set_default(subscriber);
        run();
        spans.lock().expect("span capture lock").clone()
    }

    #[test]
    fn get_set_basic() {
        let lang = Observable::new("en".to_string());
        assert_eq!(lang.get(), "en");
        assert_eq!(lang.version(), 0);

        lang.set("zh".to_string());
        assert_eq!(lang.get(), "zh");
        assert_eq!(lang.version(), 1);
    }

    #[test]
    fn same_value_is_noop() {
        let lang = Observable::new("en".to_string());
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let _sub = lang.subscribe(move |_| hits_clone.set(hits_clone.get() + 1));

        lang.set("en".to_string());
        assert_eq!(lang.version(), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn update_mutates_in_place() {
        let keys = Observable::new(vec!["a".to_string()]);
        keys.update(|v| v.push("b".to_string()));
        assert_eq!(keys.get().len(), 2);
        assert_eq!(keys.version(), 1);

        keys.update(|_| {});
        assert_eq!(keys.version(), 1);
    }

    #[test]
    fn subscriber_receives_new_value() {
        let obs = Observable::new(0);
        let last_seen = Rc::new(Cell::new(0));
        let last_clone = Rc::clone(&last_seen);
        let _sub = obs.subscribe(move |val| last_clone.set(*val));

        obs.set(42);
        assert_eq!(last_seen.get(), 42);
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let obs = Observable::new(0);
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let sub = obs.subscribe(move |_| count_clone.set(count_clone.get() + 1));

        obs.set(1);
        drop(sub);
        obs.set(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn clone_shares_state_and_subscribers() {
        let a = Observable::new(0);
        let b = a.clone();
        assert!(a.ptr_eq(&b));

        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let _sub = a.subscribe(move |_| count_clone.set(count_clone.get() + 1));

        b.set(5);
        assert_eq!(a.get(), 5);
        assert_eq!(count.get(), 1);
        assert!(!a.ptr_eq(&Observable::new(5)));
    }

    #[test]
    fn dead_subscribers_pruned_on_notify() {
        let obs = Observable::new(0);
        let _s1 = obs.subscribe(|_| {});
        let s2 = obs.subscribe(|_| {});
        assert_eq!(obs.subscriber_count(), 2);

        drop(s2);
        assert_eq!(obs.subscriber_count(), 2);

        obs.set(1);
        assert_eq!(obs.subscriber_count(), 1);
    }

    #[test]
    fn subscribe_prunes_dropped_subscribers() {
        let obs = Observable::new(0);
        let _keep = obs.subscribe(|_| {});
        for _ in 0..1000 {
            let churn = obs.subscribe(|_| {});
            drop(churn);
        }
        assert_eq!(obs.version(), 0);
        assert!(obs.subscriber_count() <= 2);

        let _last = obs.subscribe(|_| {});
        assert_eq!(obs.subscriber_count(), 2);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let log1 = Rc::clone(&log);
        let _s1 = obs.subscribe(move |_| log1.borrow_mut().push("root"));
        let log2 = Rc::clone(&log);
        let _s2 = obs.subscribe(move |_| log2.borrow_mut().push("child"));

        obs.set(1);
        assert_eq!(*log.borrow(), vec!["root", "child"]);
    }

    #[test]
    fn set_from_callback_cascades_to_other_observable() {
        let upstream = Observable::new(1);
        let downstream = Observable::new(0);
        let downstream_clone = downstream.clone();
        let _sub = upstream.subscribe(move |v| downstream_clone.set(v * 10));

        upstream.set(4);
        assert_eq!(downstream.get(), 40);
    }

    #[test]
    fn propagation_span_reports_subscriber_count() {
        let lang = Observable::new("en".to_string());
        let _a = lang.subscribe(|_| {});
        let _b = lang.subscribe(|_| {});

        let spans = capture_propagation_spans(|| lang.set("fr".to_string()));
        assert_eq!(spans, vec![2]);
    }

    #[test]
    fn no_span_without_subscribers() {
        let lang = Observable::new("en".to_string());
        let spans = capture_propagation_spans(|| lang.set("fr".to_string()));
        assert!(spans.is_empty());
    }

    #[test]
    fn debug_format() {
        let dbg = format!("{:?}", Observable::new(42));
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
    }
}
