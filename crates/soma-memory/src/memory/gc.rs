// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mark and sweep, with optional nursery copying.
//!
//! The mark phase walks the reachable graph from the managed singletons and
//! from every registered marker, in registration order. Marking is
//! cooperative: a live reference a marker fails to report will be swept.
//!
//! In copy mode the mark phase additionally ages every node whose payload
//! is nursery-resident. Payloads younger than [`TENURE`](super::TENURE) are
//! copied into the inactive half and their owner relinked; a payload
//! reaching the threshold is tenured onto the general heap (frames through
//! the frame store) and never copied again. After the sweep the halves
//! swap, reclaiming every dead nursery payload at once.
//!
//! The sweep visits every node of every block, clears surviving marks and
//! relinks dead nodes onto the free list after per-kind reclamation.
//! Marking a free node is a fatal invariant breach.

use crate::node::{FrameRef, NodeKind, NodeRef, Payload, VectorData, NUM_KINDS};
use crate::stack::NodeStack;

use super::{
    Memory, FRAME_CLOSURE, FRAME_HEADER_WORDS, FRAME_NSLOTS, FRAME_VARS, MAX_AGE, TENURE,
};

impl Memory {
    /// Run a collection. A copying collection also swaps the nursery
    /// halves, relocating or tenuring every live nursery payload.
    ///
    /// Does nothing while collection is suspended.
    pub fn gc(&mut self, copy: bool) {
        if self.suspensions > 0 {
            return;
        }
        self.collections += 1;
        log::debug!(
            "collection {} starting (copy: {copy}, {} of {} nodes free)",
            self.collections,
            self.pool.free,
            self.pool.total
        );

        self.copy_mode = copy;
        if copy {
            self.varpool.prep();
        }

        // memory managed roots
        let roots = [
            self.string_null,
            self.vector_null,
            self.listhead,
            self.listtail,
        ];
        for root in roots {
            self.mark(root);
        }

        // every collaborator marks its own roots
        let markers = self.markers.clone();
        for marker in &markers {
            marker.mark_roots(self);
        }

        self.sweep();

        if copy {
            self.swaps += 1;
            self.varpool.swap();
            self.copy_mode = false;
        }

        log::debug!(
            "collection {} done ({} of {} nodes free)",
            self.collections,
            self.pool.free,
            self.pool.total
        );
    }

    /// A plain, non-copying collection. This is what node exhaustion
    /// triggers: a constructor may hold a nursery payload that has no
    /// owning node yet, so exhaustion must never move the nursery.
    pub fn collect(&mut self) {
        self.gc(false);
    }

    /// Collect, copying when the nursery has filled past half its size.
    pub fn collect_auto(&mut self) {
        let copy = self.varpool.index() * 2 >= self.varpool.size();
        self.gc(copy);
    }

    /// Mark everything reachable from `n`.
    ///
    /// Cycles are fine: the mark bit bounds the traversal. Reaching a free
    /// node is fatal.
    pub fn mark(&mut self, n: NodeRef) {
        let mut pending = vec![n];
        while let Some(n) = pending.pop() {
            if n.is_null() {
                continue;
            }
            {
                let node = self.pool.get_mut(n);
                if node.mark {
                    continue;
                }
                node.mark = true;
            }

            match &self.pool.get(n).payload {
                Payload::Free { .. } => panic!("bad node {n:?} during gc"),
                Payload::Cons { car, cdr } => {
                    pending.push(*car);
                    pending.push(*cdr);
                }
                Payload::Promise { exp, val } => {
                    pending.push(*exp);
                    pending.push(*val);
                }
                Payload::Code { bcodes, sexprs } => {
                    pending.push(*bcodes);
                    pending.push(*sexprs);
                }
                Payload::Continuation { state } => pending.push(*state),
                Payload::Closure { code, benv, vars } => {
                    pending.push(*code);
                    pending.push(*benv);
                    pending.push(*vars);
                }
                Payload::Symbol { pair, .. } => pending.push(*pair),
                Payload::Gref { symbol } => pending.push(*symbol),
                Payload::Environment { base, .. } => {
                    let nslots = self.frame_nslots(n);
                    pending.push(self.frame_vars(n));
                    pending.push(self.frame_closure(n));
                    for i in 0..nslots {
                        pending.push(self.frame_cell(n, i));
                    }
                    pending.push(*base);
                }
                Payload::Vector { length, .. } => {
                    let length = *length;
                    for i in 0..length {
                        pending.push(self.vector_cell(n, i));
                    }
                }
                Payload::Fixnum(_)
                | Payload::Flonum(_)
                | Payload::Char(_)
                | Payload::String { .. }
                | Payload::ByteVector { .. }
                | Payload::Port { .. }
                | Payload::StringPort { .. }
                | Payload::Prim { .. }
                | Payload::Fref { .. } => {}
            }

            // children were captured above, so the payload is free to move
            if self.copy_mode {
                match self.pool.get(n).kind {
                    NodeKind::Environment if cfg!(feature = "nursery-frames") => {
                        self.age_and_move_frame(n);
                    }
                    NodeKind::Vector if cfg!(feature = "nursery-vectors") => {
                        self.age_and_move_vector(n);
                    }
                    _ => {}
                }
            }
        }
    }

    /// Mark every reference held by an externally-owned stack.
    pub fn mark_stack(&mut self, stack: &NodeStack) {
        for i in 0..stack.depth() {
            self.mark(stack.get(i));
        }
    }

    /// Age an environment and copy or tenure its nursery-resident frame.
    fn age_and_move_frame(&mut self, n: NodeRef) {
        let age = self.bump_age(n);
        let Some(offset) = self.young_frame_offset(n) else {
            return;
        };
        let nslots = self.varpool.get(offset + FRAME_NSLOTS);
        if age < TENURE {
            let words = FRAME_HEADER_WORDS + nslots as usize;
            let moved = self.varpool.copy_to_inactive(offset, words);
            self.set_env_frame(n, FrameRef::Young(moved));
        } else {
            let vars = NodeRef::from_bits(self.varpool.get(offset + FRAME_VARS));
            let closure = NodeRef::from_bits(self.varpool.get(offset + FRAME_CLOSURE));
            let frame = self.frame_store.clone_image(
                nslots,
                vars,
                closure,
                self.varpool
                    .slice(offset + FRAME_HEADER_WORDS as u32, nslots as usize),
            );
            self.set_env_frame(n, FrameRef::Heap(frame));
        }
    }

    /// Age a vector and copy or tenure its nursery-resident elements.
    fn age_and_move_vector(&mut self, n: NodeRef) {
        let age = self.bump_age(n);
        let Some(offset) = self.young_vector_offset(n) else {
            return;
        };
        let length = match &self.pool.get(n).payload {
            Payload::Vector { length, .. } => *length,
            other => panic!("vector access on {other:?}"),
        };
        if age < TENURE {
            let moved = self.varpool.copy_to_inactive(offset, length as usize);
            self.set_vector_data(n, VectorData::Young(moved));
        } else {
            let data: Box<[NodeRef]> = self
                .varpool
                .slice(offset, length as usize)
                .iter()
                .map(|&bits| NodeRef::from_bits(bits))
                .collect();
            self.set_vector_data(n, VectorData::Heap(data));
        }
    }

    /// Increment a node's age, saturating at [`MAX_AGE`](super::MAX_AGE).
    fn bump_age(&mut self, n: NodeRef) -> u8 {
        let node = self.pool.get_mut(n);
        if node.aux1 < MAX_AGE {
            node.aux1 += 1;
        }
        node.aux1
    }

    fn set_env_frame(&mut self, env: NodeRef, frame: FrameRef) {
        match &mut self.pool.get_mut(env).payload {
            Payload::Environment { frame: slot, .. } => *slot = frame,
            other => panic!("frame access on {other:?}"),
        }
    }

    fn set_vector_data(&mut self, vector: NodeRef, data: VectorData) {
        match &mut self.pool.get_mut(vector).payload {
            Payload::Vector { data: slot, .. } => *slot = data,
            other => panic!("vector access on {other:?}"),
        }
    }

    /// Reclaim every unmarked node and rebuild the free list.
    fn sweep(&mut self) {
        self.pool.free_list = NodeRef::NULL;
        self.pool.free = 0;
        self.reclaimed = [0; NUM_KINDS];

        for index in 0..self.pool.total {
            let n = NodeRef::from_index(index);
            let head = self.pool.free_list;
            let node = self.pool.get_mut(n);
            if node.mark {
                node.mark = false;
                continue;
            }

            let kind = node.kind;
            let payload = core::mem::replace(&mut node.payload, Payload::Free { next: head });
            node.kind = NodeKind::Free;
            node.form = 0;
            node.recu = 0;
            node.aux1 = 0;
            node.aux2 = 0;
            self.pool.free_list = n;
            self.pool.free += 1;
            self.reclaimed[kind as usize] += 1;

            match payload {
                // a tenured frame goes back to the store for reuse
                Payload::Environment {
                    frame: FrameRef::Heap(frame),
                    ..
                } => self.frame_store.free(frame),
                // nursery-resident frames and vectors are reclaimed
                // wholesale at the half swap; everything else (string and
                // vector buffers, symbol names, port files) drops here
                _ => {}
            }
        }

        log::trace!("sweep done: {} nodes free", self.pool.free);
    }
}
