#![forbid(unsafe_code)]

//! Batch coalescing for [`Observable`](super::Observable) notifications.
//!
//! While a [`BatchScope`] is alive, values change immediately but
//! notifications are queued. Each subscriber callback is queued at most once
//! and reads the latest value when the outermost scope exits.
//!
//! ```ignore
//! use trellis_reactive::{BatchScope, Observable};
//!
//! let lang = Observable::new("en".to_string());
//! {
//!     let _batch = BatchScope::new();
//!     lang.set("fr".into()); // deferred
//!     lang.set("zh".into()); // coalesced
//! } // subscribers run once, seeing "zh"
//! ```
//!
//! # Invariants
//!
//! 1. Nested batches are supported: only the outermost scope flushes.
//! 2. Within a batch, `Observable::get()` returns the latest value.
//! 3. Subscribers see the final state, never an intermediate one.
//! 4. Flush runs callbacks in first-enqueue order.
//! 5. Callbacks that emit during a flush are queued into the same flush and
//!    drained before the scope returns, so cascades (a parent composite
//!    feeding a child scope) settle completely.
//!
//! # Failure Modes
//!
//! - **Callback panics during flush**: remaining callbacks still run; the
//!   first panic is re-raised once the queue is empty.

use std::cell::RefCell;
use tracing::{debug, info_span};
use web_time::Instant;

type DeferredNotify = Box<dyn FnOnce()>;

struct DeferredEntry {
    key: Option<usize>,
    notify: DeferredNotify,
}

struct BatchContext {
    depth: u32,
    deferred: Vec<DeferredEntry>,
    emissions: u64,
}

thread_local! {
    static BATCH_CTX: RefCell<Option<BatchContext>> = const { RefCell::new(None) };
}

/// True while a batch is active on this thread.
pub fn is_batching() -> bool {
    BATCH_CTX.with(|ctx| ctx.borrow().is_some())
}

/// Queue `f` for the current batch, or run it now if none is active.
///
/// Returns `true` if deferred.
pub fn defer_or_run(f: impl FnOnce() + 'static) -> bool {
    BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        if let Some(ref mut batch) = *guard {
            batch.deferred.push(DeferredEntry {
                key: None,
                notify: Box::new(f),
            });
            true
        } else {
            drop(guard);
            f();
            false
        }
    })
}

/// Queue `f` under `key`. A pending entry with the same key is replaced in
/// place, keeping its original position.
pub fn defer_or_run_keyed(key: usize, f: impl FnOnce() + 'static) -> bool {
    BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        if let Some(ref mut batch) = *guard {
            if let Some(entry) = batch
                .deferred
                .iter_mut()
                .find(|entry| entry.key == Some(key))
            {
                entry.notify = Box::new(f);
            } else {
                batch.deferred.push(DeferredEntry {
                    key: Some(key),
                    notify: Box::new(f),
                });
            }
            true
        } else {
            drop(guard);
            f();
            false
        }
    })
}

/// Count one value-changing emission against the active batch.
pub fn record_emission() {
    BATCH_CTX.with(|ctx| {
        if let Some(ref mut batch) = *ctx.borrow_mut() {
            batch.emissions = batch.emissions.saturating_add(1);
        }
    });
}

fn take_pending() -> Vec<DeferredNotify> {
    BATCH_CTX.with(|ctx| {
        ctx.borrow_mut().as_mut().map_or_else(Vec::new, |batch| {
            std::mem::take(&mut batch.deferred)
                .into_iter()
                .map(|entry| entry.notify)
                .collect()
        })
    })
}

fn flush() {
    let emissions = BATCH_CTX.with(|ctx| ctx.borrow().as_ref().map_or(0, |b| b.emissions));
    let started = Instant::now();
    let _span = info_span!(
        "reactive.batch_flush",
        emissions,
        callbacks = tracing::field::Empty,
        rounds = tracing::field::Empty
    )
    .entered();

    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
    let mut callbacks = 0_u64;
    let mut rounds = 0_u32;
    loop {
        let pending = take_pending();
        if pending.is_empty() {
            break;
        }
        rounds += 1;
        callbacks += pending.len() as u64;
        for notify in pending {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(notify));
            if let Err(payload) = result
                && first_panic.is_none()
            {
                first_panic = Some(payload);
            }
        }
    }

    let span = tracing::Span::current();
    span.record("callbacks", callbacks);
    span.record("rounds", rounds);
    debug!(
        duration_us = started.elapsed().as_micros() as u64,
        emissions, callbacks, rounds, "batch flushed"
    );

    if let Some(payload) = first_panic {
        BATCH_CTX.with(|ctx| *ctx.borrow_mut() = None);
        std::panic::resume_unwind(payload);
    }
}

/// RAII guard that opens a batch.
///
/// Nested scopes only bump the depth; the outermost one flushes on drop.
pub struct BatchScope {
    is_root: bool,
}

impl BatchScope {
    #[must_use]
    pub fn new() -> Self {
        let is_root = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            match *guard {
                Some(ref mut batch) => {
                    batch.depth += 1;
                    false
                }
                None => {
                    *guard = Some(BatchContext {
                        depth: 1,
                        deferred: Vec::new(),
                        emissions: 0,
                    });
                    true
                }
            }
        });
        Self { is_root }
    }

    /// Notifications currently queued in this thread's batch.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        BATCH_CTX.with(|ctx| ctx.borrow().as_ref().map_or(0, |b| b.deferred.len()))
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        // A scope opened by a callback during a flush is not the root; the
        // running flush drains whatever it queued.
        let should_flush = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            if let Some(ref mut batch) = *guard {
                batch.depth = batch.depth.saturating_sub(1);
                self.is_root && batch.depth == 0
            } else {
                false
            }
        });

        if should_flush {
            flush();
            BATCH_CTX.with(|ctx| *ctx.borrow_mut() = None);
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("is_root", &self.is_root)
            .field("pending", &self.pending_count())
            .finish()
    }
}
