//! Typed node arena with 32-bit index handles.
//!
//! Nodes are allocated out of fixed-capacity chunks and addressed by a
//! [`NodeRef`] index instead of a pointer. This keeps tree links `Copy`,
//! makes rotations plain index reassignment, and rules out use-after-free:
//! a stale handle can at worst read a detached node, never freed memory.
//!
//! There is no per-node free. Entries deleted from a tree are unlinked and
//! their slots leak until [`NodeArena::reset`] reclaims the whole pool,
//! which matches the profiler's whole-arena-at-shutdown reclamation. Chunk
//! growth is the only step that touches the system allocator; pre-size with
//! [`NodeArena::with_capacity`] to keep the hot path allocation-free.

/// Number of nodes per chunk. Power of two so handle decoding is a
/// shift and a mask.
const CHUNK_NODES: usize = 1024;
const CHUNK_SHIFT: u32 = CHUNK_NODES.trailing_zeros();
const CHUNK_MASK: usize = CHUNK_NODES - 1;

/// A 32-bit reference to a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct NodeRef(u32);

impl NodeRef {
    /// The null handle. Used for empty child links and an empty root.
    pub const NULL: NodeRef = NodeRef(u32::MAX);

    /// Whether this is the null handle.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    fn new(idx: usize) -> Self {
        assert!(idx < u32::MAX as usize, "node arena exhausted");
        NodeRef(idx as u32)
    }

    #[inline]
    fn index(self) -> usize {
        debug_assert!(!self.is_null());
        self.0 as usize
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        NodeRef::NULL
    }
}

/// A growable pool of `T` with stable indices and no individual free.
pub struct NodeArena<T> {
    chunks: Vec<Vec<T>>,
    len: usize,
}

impl<T> NodeArena<T> {
    /// Create an empty arena. The first allocation reserves a chunk.
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            len: 0,
        }
    }

    /// Create an arena with room for at least `nodes` entries already
    /// reserved, so that many allocations proceed without touching the
    /// system allocator.
    pub fn with_capacity(nodes: usize) -> Self {
        let n_chunks = nodes.div_ceil(CHUNK_NODES).max(1);
        let mut chunks = Vec::with_capacity(n_chunks);
        for _ in 0..n_chunks {
            chunks.push(Vec::with_capacity(CHUNK_NODES));
        }
        Self { chunks, len: 0 }
    }

    /// Allocate a slot for `value` and return its handle.
    pub fn alloc(&mut self, value: T) -> NodeRef {
        let chunk_idx = self.len >> CHUNK_SHIFT;
        if chunk_idx == self.chunks.len() {
            self.chunks.push(Vec::with_capacity(CHUNK_NODES));
        }
        let handle = NodeRef::new(self.len);
        self.chunks[chunk_idx].push(value);
        self.len += 1;
        handle
    }

    /// Borrow the node behind `r`.
    ///
    /// Panics on a null or out-of-range handle; both indicate corrupted
    /// tree links upstream and are not recoverable.
    #[inline]
    pub fn get(&self, r: NodeRef) -> &T {
        let idx = r.index();
        &self.chunks[idx >> CHUNK_SHIFT][idx & CHUNK_MASK]
    }

    /// Mutably borrow the node behind `r`.
    #[inline]
    pub fn get_mut(&mut self, r: NodeRef) -> &mut T {
        let idx = r.index();
        &mut self.chunks[idx >> CHUNK_SHIFT][idx & CHUNK_MASK]
    }

    /// Total slots handed out, including slots whose node has since been
    /// unlinked from its tree.
    pub fn allocated(&self) -> usize {
        self.len
    }

    /// Drop every node and reclaim the pool in one step. Reserved chunk
    /// capacity is kept so the arena can be reused without reallocation.
    pub fn reset(&mut self) {
        for chunk in &mut self.chunks {
            chunk.clear();
        }
        self.len = 0;
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
