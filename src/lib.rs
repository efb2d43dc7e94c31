//! # splaymap
//!
//! Concurrent splay-tree identifier maps for sampling-profiler bookkeeping.
//!
//! A sampling profiler maps short-lived runtime identifiers (GPU kernel and
//! function ids, heap block address ranges, cubin ids) to profiling metadata,
//! and has to do so from contexts that cannot block or call a general-purpose
//! allocator: timer signal handlers and GPU-runtime callback threads. This
//! crate provides the two map shapes that pattern needs, both built on one
//! self-adjusting binary-search-tree core with arena-backed nodes and a
//! per-map spin lock:
//!
//! - [`IdMap`]: exact-match scalar keys with a reference-counted entry
//!   lifecycle — an entry whose refcount returns to zero is deleted on the
//!   spot, which is how entries leave the map in normal operation.
//! - [`RangeMap`]: `(start, length)` interval keys queried by containment —
//!   "which heap block does this sampled address fall into?" — and removed by
//!   exact start address.
//!
//! Lookups splay the accessed entry to the root, so repeated lookups of hot
//! identifiers stay cheap; the cost is that logically read-only operations
//! still mutate tree shape and therefore take the map's exclusive lock.
//!
//! Nodes live in a chunked index arena ([`arena::NodeArena`]) and are never
//! individually freed; deletion unlinks, and the arena is reclaimed in bulk.
//!
//! ## Example
//!
//! ```rust
//! use splaymap::IdMap;
//!
//! // function id -> (function index, owning cubin id)
//! let map: IdMap<(u64, u64)> = IdMap::new();
//! map.insert(0x4242, (7, 1));
//!
//! assert!(map.update_refcount(0x4242, 1));
//! assert_eq!(map.lookup(0x4242).unwrap().meta, (7, 1));
//!
//! // Refcount back to zero: the entry is deleted synchronously.
//! assert!(map.update_refcount(0x4242, -1));
//! assert!(map.lookup(0x4242).is_none());
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod id_map;
pub mod range_map;

pub(crate) mod splay;

pub use id_map::{IdEntry, IdMap};
pub use range_map::{RangeHit, RangeMap};

use std::fmt;

/// A protocol violation by an upstream caller.
///
/// Identifier uniqueness is guaranteed by the callers' protocol (a GPU
/// function id is registered exactly once per cubin load; a heap block is
/// registered once per allocation), so hitting one of these means state
/// upstream is already corrupt. The `try_insert` entry points surface it as
/// an error so tests can assert on it deterministically; the plain `insert`
/// entry points abort via panic, since continuing would silently
/// mis-attribute profiling data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// An identifier was inserted into an [`IdMap`] that already tracks it.
    DuplicateId {
        /// The identifier that was already present.
        id: u64,
    },
    /// A range starting at an already-tracked address was inserted into a
    /// [`RangeMap`].
    DuplicateRange {
        /// The start address that was already present.
        start: usize,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateId { id } => {
                write!(f, "duplicate identifier 0x{id:x} inserted into id map")
            }
            Violation::DuplicateRange { start } => {
                write!(f, "duplicate range start 0x{start:x} inserted into range map")
            }
        }
    }
}

impl std::error::Error for Violation {}

#[cfg(test)]
mod proptests;
