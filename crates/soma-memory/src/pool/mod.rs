// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Block-allocated pool of nodes.
//!
//! Nodes are served from contiguous blocks of [`NODE_BLOCK_SIZE`] cells.
//! All currently free nodes are threaded onto a single free list through
//! their [`Payload::Free`](crate::node::Payload::Free) link. Blocks are
//! never returned to the operating system; the pool only grows.
//!
//! The pool hands out raw nodes and keeps the counters; collection policy
//! (when to sweep, when to grow) lives in [`crate::memory`].


use crate::node::{Node, NodeRef, Payload};

/// Nodes per block.
pub const NODE_BLOCK_SIZE: usize = 5000;

/// The node pool: an ordered sequence of blocks plus the free list.
pub(crate) struct NodePool {
    /// Blocks in insertion order. A flat index `i` addresses
    /// `blocks[i / NODE_BLOCK_SIZE][i % NODE_BLOCK_SIZE]`.
    pub(crate) blocks: Vec<Box<[Node]>>,
    /// Head of the free list, or null when exhausted.
    pub(crate) free_list: NodeRef,
    /// Total nodes across all blocks.
    pub(crate) total: usize,
    /// Nodes currently on the free list.
    pub(crate) free: usize,
}

impl NodePool {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            blocks: Vec::new(),
            free_list: NodeRef::NULL,
            total: 0,
            free: 0,
        }
    }

    /// Allocate a new block and thread its nodes onto the free list.
    pub(crate) fn grow(&mut self) {
        let base = self.total;
        let mut nodes = Vec::with_capacity(NODE_BLOCK_SIZE);
        let mut next = self.free_list;
        for offset in 0..NODE_BLOCK_SIZE {
            nodes.push(Node::free(next));
            next = NodeRef::from_index(base + offset);
        }
        self.blocks.push(nodes.into_boxed_slice());
        self.free_list = next;
        self.total += NODE_BLOCK_SIZE;
        self.free += NODE_BLOCK_SIZE;
        log::debug!(
            "node pool grown to {} blocks ({} nodes)",
            self.blocks.len(),
            self.total
        );
    }

    /// Unlink the head of the free list.
    ///
    /// The returned node still carries the free kind; the caller installs
    /// the requested kind and payload. Returns `None` when exhausted.
    pub(crate) fn take(&mut self) -> Option<NodeRef> {
        if self.free_list.is_null() {
            return None;
        }
        let taken = self.free_list;
        let next = match &self.get(taken).payload {
            Payload::Free { next } => *next,
            other => panic!("free list corrupt: {taken:?} holds {other:?}"),
        };
        self.free_list = next;
        self.free -= 1;
        Some(taken)
    }

    /// Borrow a node. Fatal on the null object.
    #[must_use]
    pub(crate) fn get(&self, n: NodeRef) -> &Node {
        assert!(!n.is_null(), "null node where a pool node is required");
        let index = n.index();
        &self.blocks[index / NODE_BLOCK_SIZE][index % NODE_BLOCK_SIZE]
    }

    /// Mutably borrow a node. Fatal on the null object.
    #[must_use]
    pub(crate) fn get_mut(&mut self, n: NodeRef) -> &mut Node {
        assert!(!n.is_null(), "null node where a pool node is required");
        let index = n.index();
        &mut self.blocks[index / NODE_BLOCK_SIZE][index % NODE_BLOCK_SIZE]
    }

    /// Count free-kind nodes by scanning all blocks.
    ///
    /// Diagnostic only; the `free` counter is the fast path.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn count_free_kind(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|block| block.iter())
            .filter(|node| node.kind == crate::node::NodeKind::Free)
            .count()
    }
}
