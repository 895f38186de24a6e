#![forbid(unsafe_code)]

//! Reactive primitives for trellis.
//!
//! - [`Observable`]: a shared, version-tracked value with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`BatchScope`]: RAII guard that defers notifications until the
//!   outermost scope exits.
//! - [`Binding`]: a consumer bound to one observable, re-evaluated on every
//!   emission and released on every exit path.
//!
//! # Architecture
//!
//! Everything here is single-threaded (`Rc<RefCell<..>>`). Translation
//! scopes in `trellis-i18n` are built from these pieces: each scope binds to
//! its own source and to its parent's composite translator, and recomputes
//! when either emits.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op.
//! 4. Dropping a [`Subscription`] stops delivery before the next
//!    notification cycle.
//! 5. Within a `BatchScope`, values update immediately but notifications
//!    are deferred until the outermost scope exits.

pub mod batch;
pub mod binding;
pub mod observable;

pub use batch::BatchScope;
pub use binding::Binding;
pub use observable::{Observable, Subscription};
