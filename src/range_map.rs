//! Interval map from address ranges to profiling metadata.
//!
//! The "data tree" shape: the allocation interception layer registers each
//! heap block as `[start, start + length)` with its owning context, sampled
//! addresses are resolved by containment ("which block holds this address?"),
//! and blocks are removed by their exact start address at free time.
//!
//! The tree is ordered by range start; containment lookups rely on tracked
//! ranges being disjoint, which the allocator guarantees for live blocks.
//! Same splay core, lock discipline, and arena lifetime as
//! [`IdMap`](crate::IdMap) — only the key shape and comparison differ.

use std::cmp::Ordering;

use log::trace;
use spin::Mutex;

use crate::splay::Tree;
use crate::Violation;

/// A `[start, start + len)` byte range.
#[derive(Clone, Copy)]
struct Interval {
    start: usize,
    len: usize,
}

/// Ordering probe for insert and removal: compares by range start only.
fn by_start(start: usize) -> impl Fn(&Interval) -> Ordering {
    move |iv| start.cmp(&iv.start)
}

/// Containment probe for lookups: `addr` inside the range compares equal, so
/// "splay then check the root" resolves point-in-range queries directly.
fn containing(addr: usize) -> impl Fn(&Interval) -> Ordering {
    move |iv| {
        if addr < iv.start {
            Ordering::Less
        } else if addr - iv.start < iv.len {
            Ordering::Equal
        } else {
            Ordering::Greater
        }
    }
}

/// A by-value snapshot of a matched range, taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeHit<M> {
    /// Metadata registered with the range (owning context, block record).
    pub meta: M,
    /// Inclusive start of the matched range.
    pub start: usize,
    /// Exclusive end of the matched range.
    pub end: usize,
}

/// Concurrent map from `(start, length)` ranges to metadata, queried by
/// address containment.
pub struct RangeMap<M> {
    tree: Mutex<Tree<Interval, M>>,
}

impl<M: Clone> RangeMap<M> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(Tree::new()),
        }
    }

    /// Create an empty map with arena space for `entries` nodes already
    /// reserved.
    pub fn with_capacity(entries: usize) -> Self {
        Self {
            tree: Mutex::new(Tree::with_capacity(entries)),
        }
    }

    /// Track `[start, start + len)` with its metadata.
    ///
    /// Panics if a range starting at `start` is already tracked; blocks are
    /// registered once per allocation, so a duplicate start means the
    /// interception layer is feeding corrupt events. A zero-length range is
    /// accepted but can only be found again via [`remove`](Self::remove).
    pub fn insert(&self, start: usize, len: usize, meta: M) {
        if let Err(violation) = self.try_insert(start, len, meta) {
            panic!("{violation}");
        }
    }

    /// Track `[start, start + len)`, reporting a duplicate start as a
    /// [`Violation`] instead of aborting.
    pub fn try_insert(&self, start: usize, len: usize, meta: M) -> Result<(), Violation> {
        trace!("range map insert: [0x{:x}, 0x{:x})", start, start + len);
        let mut tree = self.tree.lock();
        tree.insert_with(Interval { start, len }, meta, &by_start(start))
            .map_err(|_| Violation::DuplicateRange { start })
    }

    /// Resolve `addr` to the range containing it, splaying that range to the
    /// root on a hit.
    ///
    /// Returns the metadata and the concrete `[start, end)` bounds actually
    /// matched, or `None` when no tracked range covers `addr` (including the
    /// one-past-the-end address of every range).
    pub fn lookup(&self, addr: usize) -> Option<RangeHit<M>> {
        let mut tree = self.tree.lock();
        tree.splay_with(&containing(addr));
        let hit = match tree.root_node() {
            Some(node) if containing(addr)(&node.key) == Ordering::Equal => Some(RangeHit {
                meta: node.payload.clone(),
                start: node.key.start,
                end: node.key.start + node.key.len,
            }),
            _ => None,
        };
        drop(tree);
        trace!("range map lookup: addr=0x{:x} hit={}", addr, hit.is_some());
        hit
    }

    /// Stop tracking the range that begins exactly at `start`.
    ///
    /// Exact match on the start address, not containment: an interior
    /// address does not remove its block. Returns the removed range, or
    /// `None` if no range starts there.
    pub fn remove(&self, start: usize) -> Option<RangeHit<M>> {
        let mut tree = self.tree.lock();
        tree.splay_with(&by_start(start));
        match tree.root_node() {
            Some(node) if node.key.start == start => {}
            _ => return None,
        }
        let removed = tree.remove_root(&by_start(start));
        let node = tree.node(removed);
        let hit = RangeHit {
            meta: node.payload.clone(),
            start: node.key.start,
            end: node.key.start + node.key.len,
        };
        drop(tree);
        trace!("range map remove: [0x{:x}, 0x{:x})", hit.start, hit.end);
        Some(hit)
    }

    /// Number of tracked ranges, by full traversal. O(n); diagnostics and
    /// tests only.
    pub fn count(&self) -> usize {
        self.tree.lock().count()
    }

    /// Whether no ranges are tracked.
    pub fn is_empty(&self) -> bool {
        self.tree.lock().is_empty()
    }

    /// Drop every range and reclaim the node arena in one step.
    pub fn reset(&self) {
        self.tree.lock().reset();
    }

    /// In-order visit of `(start, len)` pairs, for test validation.
    #[cfg(test)]
    pub(crate) fn snapshot_ranges(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        self.tree
            .lock()
            .for_each_in_order(|iv, _| out.push((iv.start, iv.len)));
        out
    }
}

impl<M: Clone> Default for RangeMap<M> {
    fn default() -> Self {
        Self::new()
    }
}
