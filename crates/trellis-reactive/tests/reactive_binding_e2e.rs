#![forbid(unsafe_code)]

//! E2E suite for the reactive primitives.
//!
//! 1. `bind_oneway` – observable to binding propagation
//! 2. `bind_batch` – batch coalescing and cascades
//! 3. `bind_lifecycle` – release on drop, unbind, and rebind

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_reactive::{BatchScope, Binding, Observable};

mod bind_oneway {
    use super::*;

    #[test]
    fn binding_tracks_every_emission() {
        let source = Observable::new(String::from("en"));
        let binding = Binding::passive(&source);

        for lang in ["fr", "de", "zh"] {
            source.set(lang.to_string());
            assert_eq!(binding.get(), lang);
        }
        assert_eq!(binding.evaluations(), 3);
    }

    #[test]
    fn many_bindings_on_one_source() {
        let source = Observable::new(1);
        let bindings: Vec<_> = (0..4).map(|_| Binding::passive(&source)).collect();
        source.set(2);
        assert!(bindings.iter().all(|b| b.get() == 2 && b.evaluations() == 1));
        assert_eq!(source.subscriber_count(), 4);
    }

    #[test]
    fn chained_bindings_cascade_parent_first() {
        let parent = Observable::new(1);
        let child = Observable::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let child_clone = child.clone();
        let order_parent = Rc::clone(&order);
        let _p = Binding::new(&parent, move |v| {
            order_parent.borrow_mut().push("parent");
            child_clone.set(v * 2);
        });
        let order_child = Rc::clone(&order);
        let _c = Binding::new(&child, move |_| order_child.borrow_mut().push("child"));

        parent.set(5);
        assert_eq!(child.get(), 10);
        assert_eq!(*order.borrow(), vec!["parent", "child"]);
    }
}

mod bind_batch {
    use super::*;

    #[test]
    fn paired_values_update_atomically() {
        let lang = Observable::new("en".to_string());
        let dir = Observable::new("ltr".to_string());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let dir_read = dir.clone();
        let seen_clone = Rc::clone(&seen);
        let _b = Binding::new(&lang, move |l| {
            seen_clone.borrow_mut().push(format!("{l}/{}", dir_read.get()));
        });

        {
            let _batch = BatchScope::new();
            lang.set("ar".to_string());
            dir.set("rtl".to_string());
        }
        assert_eq!(*seen.borrow(), vec!["ar/rtl".to_string()]);
    }

    #[test]
    fn cascade_through_three_levels_in_one_batch() {
        let a = Observable::new(0);
        let b = Observable::new(0);
        let c = Observable::new(0);
        let hits = Rc::new(Cell::new(0u32));

        let b_clone = b.clone();
        let _ab = Binding::new(&a, move |v| b_clone.set(*v + 1));
        let c_clone = c.clone();
        let _bc = Binding::new(&b, move |v| c_clone.set(*v + 1));
        let hits_clone = Rc::clone(&hits);
        let _leaf = Binding::new(&c, move |_| hits_clone.set(hits_clone.get() + 1));

        {
            let _batch = BatchScope::new();
            a.set(1);
            a.set(2);
        }
        assert_eq!(c.get(), 4);
        assert_eq!(hits.get(), 1);
    }
}

mod bind_lifecycle {
    use super::*;

    #[test]
    fn dropping_binding_releases_subscription() {
        let source = Observable::new(0);
        {
            let _binding = Binding::passive(&source);
            assert_eq!(source.subscriber_count(), 1);
        }
        source.set(1);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn rebind_moves_the_single_subscription() {
        let first = Observable::new(1);
        let second = Observable::new(100);
        let mut binding = Binding::passive(&first);

        binding.rebind(&second);
        first.set(2);
        second.set(200);

        assert_eq!(binding.get(), 200);
        assert_eq!(first.subscriber_count(), 0);
        assert_eq!(second.subscriber_count(), 1);
    }

    #[test]
    fn unbind_inside_batch_skips_pending_delivery() {
        let source = Observable::new(0);
        let mut binding = Binding::passive(&source);
        {
            let _batch = BatchScope::new();
            source.set(5);
            binding.unbind();
        }
        assert_eq!(binding.evaluations(), 0);
        assert_eq!(binding.get(), 0);
    }
}
