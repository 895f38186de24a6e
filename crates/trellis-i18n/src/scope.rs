#![forbid(unsafe_code)]

//! Translation scopes.
//!
//! A [`ScopeTree`] is an arena of scope nodes linked by parent ids. Every
//! node holds its own [`TranslationSource`] and publishes a composite
//! [`Translator`]: its own translator composed over its parent's composite.
//!
//! # Recomputation
//!
//! Each node keeps two [`Binding`]s: one on its source's [`LocaleState`] and
//! one on the parent's composite. Either emission re-runs a memoized
//! [`Composer`]; if the inputs' ids changed, the node's composite is set and
//! its own children recompute in turn.
//!
//! A recompute first settles the ancestor chain root first, so a node never
//! composes over a stale parent. This matters when one source backs scopes
//! at different depths: its subscribers run in subscription order, and a deep
//! scope may be notified before the scope between it and the root.
//!
//! # Calling position
//!
//! Renders traverse the tree: [`ScopeTree::establish_scope`] creates a scope
//! under the current position and makes it the position until its
//! [`ScopeHandle`] drops, at which point the outer scope is visible again and
//! the inner subtree is unmounted. [`ScopeTree::enter`] revisits an existing
//! node without owning it.
//!
//! | Lookup                      | No scope                             |
//! |-----------------------------|--------------------------------------|
//! | `translator()` and friends  | `Err(I18nError::ScopeNotFound)`      |
//! | `try_translator()` and friends | `None`                            |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};
use trellis_reactive::{Binding, Observable};

use crate::compose::Composer;
use crate::error::{I18nError, Result};
use crate::source::{LocaleState, TranslationSource};
use crate::translator::Translator;

/// Generational arena id of a scope node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Shared between a node's two bindings and its children.
struct Recompose {
    composer: RefCell<Composer>,
    own: Observable<LocaleState>,
    parent: Option<Rc<Recompose>>,
    composite: Observable<Translator>,
}

impl Recompose {
    fn resolve(&self) -> Translator {
        let own = self.own.with(|state| state.translator.clone());
        let parent = self.parent.as_ref().map(|parent| parent.composite.get());
        self.composer.borrow_mut().resolve(&own, parent.as_ref())
    }

    /// Settle the ancestors, then this node. Every step whose inputs are
    /// unchanged is a memo hit and sets nothing.
    fn run(&self) {
        if let Some(parent) = &self.parent {
            parent.run();
        }
        let next = self.resolve();
        self.composite.set(next);
    }
}

struct ScopeNode {
    source: Rc<dyn TranslationSource>,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    recompose: Rc<Recompose>,
    _own: Binding<LocaleState>,
    _upstream: Option<Binding<Translator>>,
}

struct Slot {
    generation: u32,
    node: Option<ScopeNode>,
}

#[derive(Default)]
struct TreeInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    cursor: Vec<ScopeId>,
    live: usize,
}

impl TreeInner {
    fn node(&self, id: ScopeId) -> Result<&ScopeNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(I18nError::StaleScope { id })
    }

    fn node_mut(&mut self, id: ScopeId) -> Result<&mut ScopeNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(I18nError::StaleScope { id })
    }

    fn is_live(&self, id: ScopeId) -> bool {
        self.node(id).is_ok()
    }

    fn nearest(&self) -> Option<ScopeId> {
        self.cursor.iter().rev().copied().find(|id| self.is_live(*id))
    }

    fn allocate(&mut self, node: ScopeNode) -> ScopeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return ScopeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        ScopeId {
            index,
            generation: 0,
        }
    }

    fn release(&mut self, id: ScopeId) -> Option<ScopeNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }
}

/// Arena of translation scopes plus the current calling position.
///
/// Cloning yields another handle to the same tree.
#[derive(Clone, Default)]
pub struct ScopeTree {
    inner: Rc<RefCell<TreeInner>>,
}

impl ScopeTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish `source` below the current position and enter it.
    ///
    /// The new scope shadows, but does not replace, the scope it is nested
    /// in. Dropping the handle restores the outer position and unmounts the
    /// new scope together with anything established inside it.
    pub fn establish_scope(&self, source: Rc<dyn TranslationSource>) -> ScopeHandle {
        let parent = self.try_lookup_nearest_scope();
        let id = self.mount(parent, source);
        self.inner.borrow_mut().cursor.push(id);
        ScopeHandle {
            tree: self.clone(),
            id,
        }
    }

    /// Create a scope under an explicit parent (`None` for a root) without
    /// moving the calling position.
    pub fn establish_under(
        &self,
        parent: Option<ScopeId>,
        source: Rc<dyn TranslationSource>,
    ) -> Result<ScopeId> {
        if let Some(parent) = parent {
            self.inner.borrow().node(parent)?;
        }
        Ok(self.mount(parent, source))
    }

    fn mount(&self, parent: Option<ScopeId>, source: Rc<dyn TranslationSource>) -> ScopeId {
        let parent_recompose = parent.and_then(|id| {
            self.inner
                .borrow()
                .node(id)
                .ok()
                .map(|node| Rc::clone(&node.recompose))
        });
        if let Some(parent) = &parent_recompose {
            parent.run();
        }

        let own = source.state().clone();
        let mut composer = Composer::new();
        let initial = composer.resolve(
            &own.with(|state| state.translator.clone()),
            parent_recompose
                .as_ref()
                .map(|parent| parent.composite.get())
                .as_ref(),
        );
        let recompose = Rc::new(Recompose {
            composer: RefCell::new(composer),
            own: own.clone(),
            parent: parent_recompose.clone(),
            composite: Observable::new(initial),
        });

        let on_own = Rc::clone(&recompose);
        let own_binding = Binding::new(&own, move |_| on_own.run());
        let upstream = parent_recompose.map(|parent| {
            let on_parent = Rc::clone(&recompose);
            Binding::new(&parent.composite, move |_| on_parent.run())
        });

        let mut inner = self.inner.borrow_mut();
        let id = inner.allocate(ScopeNode {
            source,
            parent,
            children: Vec::new(),
            recompose,
            _own: own_binding,
            _upstream: upstream,
        });
        if let Some(parent) = parent
            && let Ok(parent_node) = inner.node_mut(parent)
        {
            parent_node.children.push(id);
        }
        debug!(scope = %id, parent = ?parent.map(|p| p.to_string()), live = inner.live, "scope established");
        id
    }

    /// Make `id` the calling position until the guard drops.
    pub fn enter(&self, id: ScopeId) -> Result<PositionGuard> {
        let mut inner = self.inner.borrow_mut();
        inner.node(id)?;
        inner.cursor.push(id);
        Ok(PositionGuard {
            tree: self.clone(),
            id,
        })
    }

    fn leave(&self, id: ScopeId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(pos) = inner.cursor.iter().rposition(|entry| *entry == id) {
            inner.cursor.remove(pos);
        }
    }

    /// Remove `id` and all of its descendants, releasing their bindings.
    ///
    /// Returns how many scopes were removed.
    pub fn unmount(&self, id: ScopeId) -> Result<usize> {
        // Nodes are dropped after the borrow ends: dropping a source may run
        // arbitrary destructors.
        let removed: Vec<ScopeNode> = {
            let mut inner = self.inner.borrow_mut();
            let parent = inner.node(id)?.parent;
            if let Some(parent) = parent
                && let Ok(parent_node) = inner.node_mut(parent)
            {
                parent_node.children.retain(|child| *child != id);
            }
            let mut removed = Vec::new();
            let mut stack = vec![id];
            while let Some(next) = stack.pop() {
                if let Some(node) = inner.release(next) {
                    stack.extend(node.children.iter().copied());
                    removed.push(node);
                }
            }
            debug!(scope = %id, removed = removed.len(), live = inner.live, "scope unmounted");
            removed
        };
        Ok(removed.len())
    }

    /// Nearest scope from the calling position, or `ScopeNotFound`.
    pub fn lookup_nearest_scope(&self) -> Result<ScopeId> {
        self.try_lookup_nearest_scope()
            .ok_or(I18nError::ScopeNotFound)
    }

    /// Nearest scope from the calling position, if any.
    #[must_use]
    pub fn try_lookup_nearest_scope(&self) -> Option<ScopeId> {
        self.inner.borrow().nearest()
    }

    pub fn translator(&self) -> Result<Translator> {
        self.translator_of(self.lookup_nearest_scope()?)
    }

    #[must_use]
    pub fn try_translator(&self) -> Option<Translator> {
        self.try_lookup_nearest_scope()
            .and_then(|id| self.translator_of(id).ok())
    }

    pub fn language(&self) -> Result<String> {
        self.language_of(self.lookup_nearest_scope()?)
    }

    #[must_use]
    pub fn try_language(&self) -> Option<String> {
        self.try_lookup_nearest_scope()
            .and_then(|id| self.language_of(id).ok())
    }

    pub fn source(&self) -> Result<Rc<dyn TranslationSource>> {
        self.source_of(self.lookup_nearest_scope()?)
    }

    #[must_use]
    pub fn try_source(&self) -> Option<Rc<dyn TranslationSource>> {
        self.try_lookup_nearest_scope()
            .and_then(|id| self.source_of(id).ok())
    }

    /// Composite translator of `id`.
    ///
    /// Inside a [`BatchScope`](trellis_reactive::BatchScope) notifications
    /// may still be queued, so the ancestor chain is re-resolved root first.
    /// In the settled state every step is a memo hit.
    pub fn translator_of(&self, id: ScopeId) -> Result<Translator> {
        let recompose = Rc::clone(&self.inner.borrow().node(id)?.recompose);
        recompose.run();
        let current = recompose.composite.get();
        trace!(scope = %id, translator = current.id().get(), "translator resolved");
        Ok(current)
    }

    /// Language of the source established at `id`.
    pub fn language_of(&self, id: ScopeId) -> Result<String> {
        Ok(self.source_of(id)?.language())
    }

    pub fn source_of(&self, id: ScopeId) -> Result<Rc<dyn TranslationSource>> {
        Ok(Rc::clone(&self.inner.borrow().node(id)?.source))
    }

    /// Observable composite translator of `id`, for consumers that want to
    /// re-render when it changes.
    pub fn observe_translator(&self, id: ScopeId) -> Result<Observable<Translator>> {
        Ok(self.inner.borrow().node(id)?.recompose.composite.clone())
    }

    pub fn parent_of(&self, id: ScopeId) -> Result<Option<ScopeId>> {
        Ok(self.inner.borrow().node(id)?.parent)
    }

    pub fn children_of(&self, id: ScopeId) -> Result<Vec<ScopeId>> {
        Ok(self.inner.borrow().node(id)?.children.clone())
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors_of(&self, id: ScopeId) -> Result<Vec<ScopeId>> {
        let inner = self.inner.borrow();
        let mut out = Vec::new();
        let mut next = inner.node(id)?.parent;
        while let Some(parent) = next {
            out.push(parent);
            next = inner.node(parent)?.parent;
        }
        Ok(out)
    }

    /// How many composites `id` has built so far, including the initial one.
    pub fn recomputations_of(&self, id: ScopeId) -> Result<u64> {
        Ok(self
            .inner
            .borrow()
            .node(id)?
            .recompose
            .composer
            .borrow()
            .recomputations())
    }

    #[must_use]
    pub fn contains(&self, id: ScopeId) -> bool {
        self.inner.borrow().is_live(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ScopeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ScopeTree")
            .field("live", &inner.live)
            .field("slots", &inner.slots.len())
            .field("cursor", &inner.cursor)
            .finish()
    }
}

/// Owner of an established scope.
///
/// Dropping it ends the scope's subtree: the calling position returns to the
/// outer scope and the scope is unmounted.
#[must_use = "dropping the handle unmounts the scope immediately"]
pub struct ScopeHandle {
    tree: ScopeTree,
    id: ScopeId,
}

impl ScopeHandle {
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        self.tree.leave(self.id);
        // Already gone if an ancestor was unmounted first.
        let _ = self.tree.unmount(self.id);
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle").field("id", &self.id).finish()
    }
}

/// Calling position held while a subtree is traversed.
#[must_use = "the position is left when the guard drops"]
pub struct PositionGuard {
    tree: ScopeTree,
    id: ScopeId,
}

impl PositionGuard {
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }
}

impl Drop for PositionGuard {
    fn drop(&mut self) {
        self.tree.leave(self.id);
    }
}

impl fmt::Debug for PositionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionGuard").field("id", &self.id).finish()
    }
}
