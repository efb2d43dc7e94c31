//! Exact-key identifier map with a reference-counted entry lifecycle.
//!
//! The shape used for GPU function-id and cubin-id bookkeeping: callers
//! register an identifier once, bump its refcount for every in-flight
//! operation that mentions it, and the entry deletes itself the moment the
//! count returns to zero. There is no explicit remove call in normal
//! operation.
//!
//! All operations serialize on the map's spin lock, including lookups:
//! splaying moves the accessed entry to the root, so a lookup mutates tree
//! shape even though membership is unchanged. That keeps hot identifiers one
//! comparison away at the price of lock contention between readers — the
//! accepted trade-off of a self-adjusting tree.

use std::cmp::Ordering;

use log::trace;
use spin::Mutex;

use crate::splay::Tree;
use crate::Violation;

struct Slot<M> {
    refcount: u64,
    meta: M,
}

/// A by-value snapshot of one map entry, taken under the lock.
///
/// Holding it does not pin the entry: a concurrent refcount release can
/// delete the underlying node after the snapshot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdEntry<M> {
    /// The identifier this entry is keyed by.
    pub id: u64,
    /// Outstanding references at snapshot time.
    pub refcount: u64,
    /// Caller-supplied metadata registered at insert.
    pub meta: M,
}

/// Concurrent exact-match map from `u64` identifiers to metadata.
///
/// See the [module docs](self) for the lifecycle contract.
pub struct IdMap<M> {
    tree: Mutex<Tree<u64, Slot<M>>>,
}

fn probe(id: u64) -> impl Fn(&u64) -> Ordering {
    move |key| id.cmp(key)
}

impl<M: Clone> IdMap<M> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(Tree::new()),
        }
    }

    /// Create an empty map with arena space for `entries` nodes already
    /// reserved, keeping early inserts off the system allocator.
    pub fn with_capacity(entries: usize) -> Self {
        Self {
            tree: Mutex::new(Tree::with_capacity(entries)),
        }
    }

    /// Look up `id`, splaying it to the root on a hit.
    ///
    /// Returns a snapshot of the entry, or `None` if the identifier is not
    /// tracked. A miss still restructures the tree around the probe.
    pub fn lookup(&self, id: u64) -> Option<IdEntry<M>> {
        let mut tree = self.tree.lock();
        tree.splay_with(&probe(id));
        let hit = match tree.root_node() {
            Some(node) if node.key == id => Some(IdEntry {
                id,
                refcount: node.payload.refcount,
                meta: node.payload.meta.clone(),
            }),
            _ => None,
        };
        drop(tree);
        trace!("id map lookup: id=0x{:x} hit={}", id, hit.is_some());
        hit
    }

    /// Register `id` with a refcount of zero.
    ///
    /// Panics if `id` is already tracked — callers guarantee each identifier
    /// is registered exactly once, and a duplicate means upstream state is
    /// corrupt. Use [`try_insert`](Self::try_insert) to observe the
    /// violation as an error instead.
    pub fn insert(&self, id: u64, meta: M) {
        if let Err(violation) = self.try_insert(id, meta) {
            panic!("{violation}");
        }
    }

    /// Register `id` with a refcount of zero, reporting a duplicate as a
    /// [`Violation`] instead of aborting.
    pub fn try_insert(&self, id: u64, meta: M) -> Result<(), Violation> {
        trace!("id map insert: id=0x{id:x}");
        let mut tree = self.tree.lock();
        tree.insert_with(id, Slot { refcount: 0, meta }, &probe(id))
            .map_err(|_| Violation::DuplicateId { id })
    }

    /// Add `delta` to the refcount of `id`.
    ///
    /// Returns `true` if the identifier was found. A count that lands on
    /// exactly zero deletes the entry synchronously before the lock is
    /// released; this is the only path by which entries leave the map in
    /// normal operation. A miss performs no membership change.
    pub fn update_refcount(&self, id: u64, delta: i64) -> bool {
        let mut tree = self.tree.lock();
        tree.splay_with(&probe(id));
        let Some(node) = tree.root_node_mut() else {
            return false;
        };
        if node.key != id {
            return false;
        }
        let old = node.payload.refcount;
        node.payload.refcount = old.wrapping_add_signed(delta);
        let new = node.payload.refcount;
        trace!("id map refcount: id=0x{id:x} ({old} -> {new})");
        if new == 0 {
            trace!("id map refcount: id=0x{id:x} (deleting)");
            tree.remove_root(&probe(id));
        }
        true
    }

    /// Number of tracked identifiers, by full traversal. O(n); diagnostics
    /// and tests only.
    pub fn count(&self) -> usize {
        self.tree.lock().count()
    }

    /// Whether no identifiers are tracked.
    pub fn is_empty(&self) -> bool {
        self.tree.lock().is_empty()
    }

    /// Drop every entry and reclaim the node arena in one step. Shutdown
    /// path; there is no per-entry free.
    pub fn reset(&self) {
        self.tree.lock().reset();
    }

    /// In-order visit of `(id, refcount)` pairs, for diagnostics and test
    /// validation. Holds the lock for the whole traversal.
    #[cfg(test)]
    pub(crate) fn snapshot_keys(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        self.tree
            .lock()
            .for_each_in_order(|&k, slot| out.push((k, slot.refcount)));
        out
    }
}

impl<M: Clone> Default for IdMap<M> {
    fn default() -> Self {
        Self::new()
    }
}
