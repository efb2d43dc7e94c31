//! Generic top-down splay tree over arena-indexed nodes.
//!
//! The self-adjusting core shared by every map instantiation. It is
//! parameterized by a probe closure `Fn(&K) -> Ordering` that reports where
//! the probe sits relative to a visited node's key (`Less` means the probe
//! orders below the key). The exact-key map and the range map differ only in
//! the probes they hand in: scalar equality for identifiers, interval
//! containment for address lookups.
//!
//! Splaying rebuilds links top-down during a single descent (the Sleator
//! assembly-tree formulation), so no parent pointers are stored and no node
//! is ever allocated by the core itself. When the probe is absent, the last
//! non-null node inspected on the search path ends at the root — the
//! predecessor or successor of the probe. Insert and lookup both follow
//! "splay, then compare the resulting root", so the convention is applied
//! uniformly.

use std::cmp::Ordering;

use crate::arena::{NodeArena, NodeRef};

/// One tree node: a key, caller payload, and two index-valued child links.
pub(crate) struct Node<K, P> {
    pub key: K,
    pub payload: P,
    pub left: NodeRef,
    pub right: NodeRef,
}

impl<K, P> Node<K, P> {
    fn leaf(key: K, payload: P) -> Self {
        Self {
            key,
            payload,
            left: NodeRef::NULL,
            right: NodeRef::NULL,
        }
    }
}

/// Splay `root` so that the node matched by `probe` (or the last node on its
/// search path, if absent) becomes the root of the returned subtree.
///
/// Mutates only the link fields of visited nodes. O(depth) link writes, no
/// allocation, no recursion.
pub(crate) fn splay<K, P, F>(arena: &mut NodeArena<Node<K, P>>, root: NodeRef, probe: &F) -> NodeRef
where
    F: Fn(&K) -> Ordering,
{
    if root.is_null() {
        return root;
    }

    let mut t = root;
    // Assembly trees: `l` collects nodes ordering below the probe, `r` nodes
    // ordering above it. Tails are their insertion points.
    let mut l = NodeRef::NULL;
    let mut r = NodeRef::NULL;
    let mut l_tail = NodeRef::NULL;
    let mut r_tail = NodeRef::NULL;

    loop {
        match probe(&arena.get(t).key) {
            Ordering::Less => {
                let mut child = arena.get(t).left;
                if child.is_null() {
                    break;
                }
                if probe(&arena.get(child).key) == Ordering::Less {
                    // zig-zig: rotate right at t before linking
                    arena.get_mut(t).left = arena.get(child).right;
                    arena.get_mut(child).right = t;
                    t = child;
                    child = arena.get(t).left;
                    if child.is_null() {
                        break;
                    }
                }
                if r.is_null() {
                    r = t;
                } else {
                    arena.get_mut(r_tail).left = t;
                }
                r_tail = t;
                t = child;
            }
            Ordering::Greater => {
                let mut child = arena.get(t).right;
                if child.is_null() {
                    break;
                }
                if probe(&arena.get(child).key) == Ordering::Greater {
                    // zag-zag: rotate left at t before linking
                    arena.get_mut(t).right = arena.get(child).left;
                    arena.get_mut(child).left = t;
                    t = child;
                    child = arena.get(t).right;
                    if child.is_null() {
                        break;
                    }
                }
                if l.is_null() {
                    l = t;
                } else {
                    arena.get_mut(l_tail).right = t;
                }
                l_tail = t;
                t = child;
            }
            Ordering::Equal => break,
        }
    }

    // Reassemble: t's remaining subtrees hang off the assembly tails, the
    // assemblies become t's children.
    if !l.is_null() {
        let t_left = arena.get(t).left;
        arena.get_mut(l_tail).right = t_left;
        arena.get_mut(t).left = l;
    }
    if !r.is_null() {
        let t_right = arena.get(t).right;
        arena.get_mut(r_tail).left = t_right;
        arena.get_mut(t).right = r;
    }
    t
}

/// An unlocked splay tree bundling the node arena with the current root.
///
/// Map types wrap this in their guard; nothing here synchronizes.
pub(crate) struct Tree<K, P> {
    arena: NodeArena<Node<K, P>>,
    root: NodeRef,
}

impl<K, P> Tree<K, P> {
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            root: NodeRef::NULL,
        }
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            arena: NodeArena::with_capacity(nodes),
            root: NodeRef::NULL,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    /// Splay the whole tree toward `probe`.
    pub fn splay_with<F: Fn(&K) -> Ordering>(&mut self, probe: &F) {
        self.root = splay(&mut self.arena, self.root, probe);
    }

    /// The current root node, if the tree is non-empty.
    pub fn root_node(&self) -> Option<&Node<K, P>> {
        if self.root.is_null() {
            None
        } else {
            Some(self.arena.get(self.root))
        }
    }

    pub fn root_node_mut(&mut self) -> Option<&mut Node<K, P>> {
        if self.root.is_null() {
            None
        } else {
            Some(self.arena.get_mut(self.root))
        }
    }

    /// Insert by split: splay toward the new key, then splice the fresh node
    /// in as the root with the old root's subtrees partitioned around it.
    ///
    /// `probe` must order the new key against existing keys. Returns `Err`
    /// with the rejected pair when an equal key is already present; the tree
    /// is left splayed to the existing node and nothing is allocated.
    pub fn insert_with<F>(&mut self, key: K, payload: P, probe: &F) -> Result<(), (K, P)>
    where
        F: Fn(&K) -> Ordering,
    {
        if self.root.is_null() {
            self.root = self.arena.alloc(Node::leaf(key, payload));
            return Ok(());
        }
        self.splay_with(probe);
        let old = self.root;
        match probe(&self.arena.get(old).key) {
            Ordering::Less => {
                let left = self.arena.get(old).left;
                self.arena.get_mut(old).left = NodeRef::NULL;
                self.root = self.arena.alloc(Node {
                    key,
                    payload,
                    left,
                    right: old,
                });
                Ok(())
            }
            Ordering::Greater => {
                let right = self.arena.get(old).right;
                self.arena.get_mut(old).right = NodeRef::NULL;
                self.root = self.arena.alloc(Node {
                    key,
                    payload,
                    left: old,
                    right,
                });
                Ok(())
            }
            Ordering::Equal => Err((key, payload)),
        }
    }

    /// Unlink the current root and rejoin its subtrees.
    ///
    /// `probe` must order the removed key against remaining keys: the left
    /// subtree holds only smaller keys, so splaying it toward the removed key
    /// surfaces the subtree maximum, whose right slot is free for the old
    /// right subtree. The detached node's slot stays in the arena; only its
    /// links are cleared.
    ///
    /// Callers must ensure the tree is non-empty.
    pub fn remove_root<F>(&mut self, probe: &F) -> NodeRef
    where
        F: Fn(&K) -> Ordering,
    {
        let old = self.root;
        let left = self.arena.get(old).left;
        let right = self.arena.get(old).right;
        if left.is_null() {
            self.root = right;
        } else {
            let joined = splay(&mut self.arena, left, probe);
            debug_assert!(self.arena.get(joined).right.is_null());
            self.arena.get_mut(joined).right = right;
            self.root = joined;
        }
        let node = self.arena.get_mut(old);
        node.left = NodeRef::NULL;
        node.right = NodeRef::NULL;
        old
    }

    pub fn node(&self, r: NodeRef) -> &Node<K, P> {
        self.arena.get(r)
    }

    /// Number of live nodes, by full traversal. O(n); diagnostics and test
    /// support only, never on the sampling hot path.
    pub fn count(&self) -> usize {
        fn walk<K, P>(arena: &NodeArena<Node<K, P>>, n: NodeRef) -> usize {
            if n.is_null() {
                return 0;
            }
            let node = arena.get(n);
            1 + walk(arena, node.left) + walk(arena, node.right)
        }
        walk(&self.arena, self.root)
    }

    /// In-order visit of `(key, payload)` pairs. Iterative, so deeply
    /// unbalanced shapes (a splay tree's worst case) cannot overflow the
    /// stack.
    pub fn for_each_in_order(&self, mut f: impl FnMut(&K, &P)) {
        let mut stack: Vec<NodeRef> = Vec::new();
        let mut cur = self.root;
        loop {
            while !cur.is_null() {
                stack.push(cur);
                cur = self.arena.get(cur).left;
            }
            let Some(n) = stack.pop() else {
                break;
            };
            let node = self.arena.get(n);
            f(&node.key, &node.payload);
            cur = node.right;
        }
    }

    /// Drop the whole tree and reclaim the arena in one step.
    pub fn reset(&mut self) {
        self.root = NodeRef::NULL;
        self.arena.reset();
    }
}
