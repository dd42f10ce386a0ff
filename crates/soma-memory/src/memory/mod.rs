// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The memory manager: allocator entry points and garbage collector.
//!
//! [`Memory`] owns the node pool, the two-space nursery, the frame store
//! and the root singletons. Collaborators allocate through the typed
//! `alloc_*` constructors and register a [`RootMarker`] so the collector
//! can reach their live references.
//!
//! ```text
//! alloc_* ──► node pool ──────────────┐
//!     │                               │ exhaustion
//!     ├──► nursery (frames, vectors)  ▼
//!     └──► heap buffers           gc(): mark roots ──► markers ──► sweep
//!                                       │
//!                                       └── copy mode: age, copy young
//!                                           payloads, tenure at TENURE,
//!                                           swap nursery halves
//! ```
//!
//! Constructors return fully initialized nodes. A collection may run
//! between a constructor's payload setup and its node allocation, so every
//! node reference passed into a constructor must already be rooted by the
//! caller (on a registered stack, or under a [`Memory::suspend_gc`] guard).
//!
//! Fatal conditions (marking a free node, a corrupt free list, recycled
//! frame size mismatch) panic; severe conditions are reported through
//! [`SevereError`](crate::sexpr::SevereError) results.

mod gc;


use core::ops::{Deref, DerefMut};
use std::fs::File;
use std::rc::Rc;

use crate::framestore::FrameStore;
use crate::node::{
    FrameRef, Node, NodeKind, NodeRef, Payload, PrimFn, VectorData, NUM_KINDS,
};
use crate::pool::{NodePool, NODE_BLOCK_SIZE};
use crate::sexpr::{guard, Expect, SevereError};
use crate::stack::NodeStack;
use crate::varpool::{VarPool, VARPOOL_START_SIZE};

/// Collections a nursery payload survives before it is promoted to the
/// general heap.
pub const TENURE: u8 = 5;

/// Saturation cap for the per-node age counter.
pub const MAX_AGE: u8 = 127;

/// Largest representable string length.
pub const MAX_STRING_SIZE: u32 = 0xFFFF_FFFE;

/// Word offsets within a nursery frame image.
pub(crate) const FRAME_NSLOTS: u32 = 0;
pub(crate) const FRAME_VARS: u32 = 1;
pub(crate) const FRAME_CLOSURE: u32 = 2;
/// Header words preceding the slot section of a nursery frame image.
pub(crate) const FRAME_HEADER_WORDS: usize = 3;

/// A collaborator-owned set of collection roots.
///
/// Markers fire in registration order during every collection, before the
/// sweep begins. Each marker must pass every live reference it owns to
/// [`Memory::mark`] or [`Memory::mark_stack`] exactly as it holds them;
/// a root the marker skips will be swept.
pub trait RootMarker {
    fn mark_roots(&self, mem: &mut Memory);
}

/// The memory manager.
pub struct Memory {
    pub(crate) pool: NodePool,
    pub(crate) varpool: VarPool,
    pub(crate) frame_store: FrameStore,
    markers: Vec<Rc<dyn RootMarker>>,
    /// Collection is suppressed while positive.
    suspensions: u32,
    /// True while a copying collection's mark phase runs.
    pub(crate) copy_mode: bool,
    collections: u32,
    swaps: u32,
    pub(crate) reclaimed: [u32; NUM_KINDS],
    string_null: NodeRef,
    vector_null: NodeRef,
    listhead: NodeRef,
    listtail: NodeRef,
}

impl Memory {
    /// Build a manager with one node block and the root singletons.
    #[must_use]
    pub fn new() -> Self {
        let mut mem = Self {
            pool: NodePool::new(),
            varpool: VarPool::new(VARPOOL_START_SIZE),
            frame_store: FrameStore::new(),
            markers: Vec::new(),
            suspensions: 0,
            copy_mode: false,
            collections: 0,
            swaps: 0,
            reclaimed: [0; NUM_KINDS],
            string_null: NodeRef::NULL,
            vector_null: NodeRef::NULL,
            listhead: NodeRef::NULL,
            listtail: NodeRef::NULL,
        };
        mem.pool.grow();
        mem.string_null = mem.alloc_string(0);
        mem.vector_null = mem.alloc_vector(0);
        mem.listtail = NodeRef::NULL;
        mem.listhead = mem.alloc_cons(NodeRef::NULL, NodeRef::NULL);
        mem
    }

    /// Register a root marker. Registration is append-only and must be
    /// complete before the registering collaborator allocates.
    pub fn register_marker(&mut self, marker: Rc<dyn RootMarker>) {
        self.markers.push(marker);
    }

    /// Suppress collection until the guard drops.
    ///
    /// Guards nest; collection resumes when the last one drops. Use this
    /// around multi-step constructions whose intermediate nodes have no
    /// root yet.
    #[must_use]
    pub fn suspend_gc(&mut self) -> GcSuspension<'_> {
        self.suspensions += 1;
        GcSuspension { mem: self }
    }

    // --- Allocation ---

    /// Take a node off the free list, collecting and growing when needed.
    ///
    /// The pool grows by a block when a collection leaves fewer than a
    /// fifth of a block free, so a nearly-full heap does not collect on
    /// every allocation.
    fn newnode(&mut self, kind: NodeKind, payload: Payload) -> NodeRef {
        if self.pool.free_list.is_null() {
            self.collect();
            if self.pool.free < NODE_BLOCK_SIZE / 5 {
                self.pool.grow();
            }
        }
        let Some(n) = self.pool.take() else {
            panic!("node pool exhausted after growth");
        };
        let node = self.pool.get_mut(n);
        node.kind = kind;
        node.payload = payload;
        n
    }

    pub fn alloc_fixnum(&mut self, value: i64) -> NodeRef {
        self.newnode(NodeKind::Fixnum, Payload::Fixnum(value))
    }

    pub fn alloc_flonum(&mut self, value: f64) -> NodeRef {
        self.newnode(NodeKind::Flonum, Payload::Flonum(value))
    }

    pub fn alloc_char(&mut self, ch: u8) -> NodeRef {
        self.newnode(NodeKind::Char, Payload::Char(ch))
    }

    /// A fresh string of `length` bytes, initially empty (`data[0]` is the
    /// terminating NUL).
    pub fn alloc_string(&mut self, length: u32) -> NodeRef {
        let data = vec![0; length as usize + 1].into_boxed_slice();
        self.newnode(
            NodeKind::String,
            Payload::String {
                length,
                index: 0,
                data,
            },
        )
    }

    /// A string holding a copy of `text`. The empty string is the shared
    /// `string_null` singleton.
    pub fn alloc_string_from(&mut self, text: &str) -> NodeRef {
        if text.is_empty() {
            return self.string_null;
        }
        let length = text.len() as u32;
        let mut data = vec![0; text.len() + 1];
        data[..text.len()].copy_from_slice(text.as_bytes());
        self.newnode(
            NodeKind::String,
            Payload::String {
                length,
                index: 0,
                data: data.into_boxed_slice(),
            },
        )
    }

    pub fn alloc_cons(&mut self, car: NodeRef, cdr: NodeRef) -> NodeRef {
        self.newnode(NodeKind::Cons, Payload::Cons { car, cdr })
    }

    /// A vector of `length` slots, all null. Placed in the nursery when
    /// vector placement is enabled, otherwise heap-owned.
    pub fn alloc_vector(&mut self, length: u32) -> NodeRef {
        let data = if cfg!(feature = "nursery-vectors") {
            let offset = self.varpool.alloc(length as usize);
            for i in 0..length {
                self.varpool.set(offset + i, NodeRef::NULL.to_bits());
            }
            VectorData::Young(offset)
        } else {
            VectorData::Heap(vec![NodeRef::NULL; length as usize].into_boxed_slice())
        };
        self.newnode(NodeKind::Vector, Payload::Vector { length, data })
    }

    /// A byte vector of `length` zero bytes.
    pub fn alloc_byte_vector(&mut self, length: u32) -> NodeRef {
        let data = vec![0; length as usize].into_boxed_slice();
        self.newnode(NodeKind::ByteVector, Payload::ByteVector { data })
    }

    /// A symbol named `name`, unbound, with an empty property list.
    ///
    /// The value/plist cons is built first and parked on the caller's
    /// register stack, so the collection that the symbol node allocation
    /// may trigger cannot sweep it.
    pub fn alloc_symbol(&mut self, name: &str, regstack: &NodeStack) -> NodeRef {
        let pair = self.alloc_cons(NodeRef::NULL, NodeRef::NULL);
        regstack.push(pair);
        let n = self.newnode(
            NodeKind::Symbol,
            Payload::Symbol {
                name: name.into(),
                pair,
            },
        );
        regstack.pop();
        n
    }

    pub fn alloc_continuation(&mut self) -> NodeRef {
        self.newnode(
            NodeKind::Continuation,
            Payload::Continuation {
                state: NodeRef::NULL,
            },
        )
    }

    /// A primitive of the given application kind (`Func`, `Eval`, `Apply`,
    /// `CallCc`, `Map`, `ForEach` or `Force`). Any other kind is fatal.
    pub fn alloc_prim(&mut self, func: PrimFn, name: &'static str, kind: NodeKind) -> NodeRef {
        assert!(kind.is_prim(), "{} is not a primitive kind", kind.name());
        self.newnode(kind, Payload::Prim { func, name })
    }

    /// A port over an open file. The file closes when the port is swept.
    pub fn alloc_port(&mut self, file: File, mode: u8) -> NodeRef {
        self.newnode(
            NodeKind::Port,
            Payload::Port {
                mode,
                file: Some(file),
            },
        )
    }

    /// A string port over a copy of `source`'s bytes, cursor at zero.
    pub fn alloc_string_port(
        &mut self,
        source: NodeRef,
        mode: u8,
    ) -> Result<NodeRef, SevereError> {
        guard(self, source, Expect::String)?;
        let data = match &self.pool.get(source).payload {
            Payload::String { length, data, .. } => data[..*length as usize].to_vec(),
            _ => panic!("string payload expected after guard"),
        };
        Ok(self.newnode(
            NodeKind::StringPort,
            Payload::StringPort {
                mode,
                data,
                index: 0,
            },
        ))
    }

    /// An empty string port, for building output in memory.
    pub fn alloc_string_port_empty(&mut self, mode: u8) -> NodeRef {
        self.newnode(
            NodeKind::StringPort,
            Payload::StringPort {
                mode,
                data: Vec::new(),
                index: 0,
            },
        )
    }

    /// A closure over `code` and its birth environment. Formals and arity
    /// are installed by the evaluator afterwards.
    pub fn alloc_closure(&mut self, code: NodeRef, env: NodeRef) -> NodeRef {
        self.newnode(
            NodeKind::Closure,
            Payload::Closure {
                code,
                benv: env,
                vars: NodeRef::NULL,
            },
        )
    }

    /// An environment with a frame of `nvars` null slots, binding `vars`,
    /// extending `env`. The frame is nursery-resident when frame placement
    /// is enabled, otherwise served by the frame store.
    pub fn alloc_environment(&mut self, nvars: u32, vars: NodeRef, env: NodeRef) -> NodeRef {
        let frame = if cfg!(feature = "nursery-frames") {
            let offset = self.varpool.alloc(FRAME_HEADER_WORDS + nvars as usize);
            self.varpool.set(offset + FRAME_NSLOTS, nvars);
            self.varpool.set(offset + FRAME_VARS, vars.to_bits());
            self.varpool
                .set(offset + FRAME_CLOSURE, NodeRef::NULL.to_bits());
            for i in 0..nvars {
                self.varpool.set(
                    offset + FRAME_HEADER_WORDS as u32 + i,
                    NodeRef::NULL.to_bits(),
                );
            }
            FrameRef::Young(offset)
        } else {
            let mut frame = self.frame_store.alloc(nvars);
            frame.vars = vars;
            FrameRef::Heap(frame)
        };
        self.newnode(NodeKind::Environment, Payload::Environment { frame, base: env })
    }

    pub fn alloc_promise(&mut self, exp: NodeRef) -> NodeRef {
        self.newnode(
            NodeKind::Promise,
            Payload::Promise {
                exp,
                val: NodeRef::NULL,
            },
        )
    }

    pub fn alloc_code(&mut self, bcodes: NodeRef, sexprs: NodeRef) -> NodeRef {
        self.newnode(NodeKind::Code, Payload::Code { bcodes, sexprs })
    }

    pub fn alloc_gref(&mut self, symbol: NodeRef) -> NodeRef {
        self.newnode(NodeKind::Gref, Payload::Gref { symbol })
    }

    pub fn alloc_fref(&mut self, depth: u32, index: u32) -> NodeRef {
        self.newnode(NodeKind::Fref, Payload::Fref { depth, index })
    }

    /// Grow a string by `delta` bytes, preserving its contents and the
    /// trailing NUL.
    pub fn resize_string(&mut self, string: NodeRef, delta: u32) -> Result<(), SevereError> {
        guard(self, string, Expect::String)?;
        let node = self.pool.get_mut(string);
        let Payload::String { length, data, .. } = &mut node.payload else {
            panic!("string payload expected after guard");
        };
        let new_length = u64::from(*length) + u64::from(delta);
        if new_length > u64::from(MAX_STRING_SIZE) {
            return Err(SevereError::StringOverflow { length: new_length });
        }
        let new_length = new_length as u32;
        let mut grown = vec![0; new_length as usize + 1];
        grown[..=*length as usize].copy_from_slice(&data[..=*length as usize]);
        *length = new_length;
        *data = grown.into_boxed_slice();
        Ok(())
    }

    // --- Introspection ---

    /// The kind of `n`; the null object reports [`NodeKind::Null`].
    #[must_use]
    pub fn kind(&self, n: NodeRef) -> NodeKind {
        if n.is_null() {
            NodeKind::Null
        } else {
            self.pool.get(n).kind
        }
    }

    /// The evaluator's dispatch hint byte.
    #[must_use]
    pub fn form(&self, n: NodeRef) -> u8 {
        self.pool.get(n).form
    }

    pub fn set_form(&mut self, n: NodeRef, form: u8) {
        self.pool.get_mut(n).form = form;
    }

    /// The printer's recursion guard byte.
    #[must_use]
    pub fn recu(&self, n: NodeRef) -> u8 {
        self.pool.get(n).recu
    }

    pub fn set_recu(&mut self, n: NodeRef, recu: u8) {
        self.pool.get_mut(n).recu = recu;
    }

    /// Nursery age of `n`'s payload: the number of copying collections it
    /// has survived, saturating at [`MAX_AGE`]. Meaningful for environments
    /// and vectors while nursery placement is enabled.
    #[must_use]
    pub fn age(&self, n: NodeRef) -> u8 {
        self.pool.get(n).aux1
    }

    /// The empty-string singleton.
    #[must_use]
    pub const fn string_null(&self) -> NodeRef {
        self.string_null
    }

    /// The empty-vector singleton.
    #[must_use]
    pub const fn vector_null(&self) -> NodeRef {
        self.vector_null
    }

    /// The list-construction head sentinel.
    #[must_use]
    pub const fn listhead(&self) -> NodeRef {
        self.listhead
    }

    /// The list-construction tail sentinel.
    #[must_use]
    pub const fn listtail(&self) -> NodeRef {
        self.listtail
    }

    /// Total nodes across all pool blocks.
    #[must_use]
    pub const fn total_node_count(&self) -> usize {
        self.pool.total
    }

    /// Nodes currently on the free list.
    #[must_use]
    pub const fn free_node_count(&self) -> usize {
        self.pool.free
    }

    /// Collections run so far.
    #[must_use]
    pub const fn collection_count(&self) -> u32 {
        self.collections
    }

    /// Nursery half swaps performed by copying collections.
    #[must_use]
    pub const fn nursery_swap_count(&self) -> u32 {
        self.swaps
    }

    /// Size of the active nursery half, in words.
    #[must_use]
    pub fn nursery_size(&self) -> usize {
        self.varpool.size()
    }

    /// Current bump index of the active nursery half, in words.
    #[must_use]
    pub fn nursery_index(&self) -> usize {
        self.varpool.index()
    }

    /// Highest nursery bump index ever reached.
    #[must_use]
    pub fn nursery_high_water(&self) -> usize {
        self.varpool.high_water()
    }

    /// Nodes reclaimed by the last sweep, indexed by kind.
    #[must_use]
    pub const fn reclamation_counts(&self) -> &[u32; NUM_KINDS] {
        &self.reclaimed
    }

    // --- Payload access for the accessor layer and the collector ---

    /// Borrow a pool node.
    #[must_use]
    pub(crate) fn node(&self, n: NodeRef) -> &Node {
        self.pool.get(n)
    }

    /// Mutably borrow a pool node.
    #[must_use]
    pub(crate) fn node_mut(&mut self, n: NodeRef) -> &mut Node {
        self.pool.get_mut(n)
    }

    /// Nursery offset of a vector's element buffer, or `None` when it is
    /// heap-owned. Fatal on a non-vector.
    fn young_vector_offset(&self, vector: NodeRef) -> Option<u32> {
        match &self.pool.get(vector).payload {
            Payload::Vector {
                data: VectorData::Young(offset),
                ..
            } => Some(*offset),
            Payload::Vector { .. } => None,
            other => panic!("vector access on {other:?}"),
        }
    }

    /// Nursery offset of an environment's frame image, or `None` when the
    /// frame is heap-owned. Fatal on a non-environment.
    pub(crate) fn young_frame_offset(&self, env: NodeRef) -> Option<u32> {
        match &self.pool.get(env).payload {
            Payload::Environment {
                frame: FrameRef::Young(offset),
                ..
            } => Some(*offset),
            Payload::Environment { .. } => None,
            other => panic!("frame access on {other:?}"),
        }
    }

    /// Mutably borrow the heap frame of an environment whose frame has been
    /// tenured. Fatal otherwise.
    fn heap_frame_mut(&mut self, env: NodeRef) -> &mut crate::framestore::Frame {
        match &mut self.pool.get_mut(env).payload {
            Payload::Environment {
                frame: FrameRef::Heap(frame),
                ..
            } => frame,
            other => panic!("frame access on {other:?}"),
        }
    }

    /// Borrow the heap frame of an environment. Fatal when nursery-resident.
    fn heap_frame(&self, env: NodeRef) -> &crate::framestore::Frame {
        match &self.pool.get(env).payload {
            Payload::Environment {
                frame: FrameRef::Heap(frame),
                ..
            } => frame,
            other => panic!("frame access on {other:?}"),
        }
    }

    /// Read vector slot `i`. Caller has checked kind and bounds.
    #[must_use]
    pub(crate) fn vector_cell(&self, vector: NodeRef, i: u32) -> NodeRef {
        match self.young_vector_offset(vector) {
            Some(offset) => NodeRef::from_bits(self.varpool.get(offset + i)),
            None => match &self.pool.get(vector).payload {
                Payload::Vector {
                    data: VectorData::Heap(data),
                    ..
                } => data[i as usize],
                other => panic!("vector access on {other:?}"),
            },
        }
    }

    /// Write vector slot `i`. Caller has checked kind and bounds.
    pub(crate) fn set_vector_cell(&mut self, vector: NodeRef, i: u32, value: NodeRef) {
        match self.young_vector_offset(vector) {
            Some(offset) => self.varpool.set(offset + i, value.to_bits()),
            None => match &mut self.pool.get_mut(vector).payload {
                Payload::Vector {
                    data: VectorData::Heap(data),
                    ..
                } => data[i as usize] = value,
                other => panic!("vector access on {other:?}"),
            },
        }
    }

    /// Slot count of an environment's frame. Caller has checked the kind.
    #[must_use]
    pub(crate) fn frame_nslots(&self, env: NodeRef) -> u32 {
        match self.young_frame_offset(env) {
            Some(offset) => self.varpool.get(offset + FRAME_NSLOTS),
            None => self.heap_frame(env).nslots,
        }
    }

    /// Read frame slot `i`. Caller has checked kind and bounds.
    #[must_use]
    pub(crate) fn frame_cell(&self, env: NodeRef, i: u32) -> NodeRef {
        match self.young_frame_offset(env) {
            Some(offset) => {
                NodeRef::from_bits(self.varpool.get(offset + FRAME_HEADER_WORDS as u32 + i))
            }
            None => self.heap_frame(env).slots[i as usize],
        }
    }

    /// Write frame slot `i`. Caller has checked kind and bounds.
    pub(crate) fn set_frame_cell(&mut self, env: NodeRef, i: u32, value: NodeRef) {
        match self.young_frame_offset(env) {
            Some(offset) => self
                .varpool
                .set(offset + FRAME_HEADER_WORDS as u32 + i, value.to_bits()),
            None => self.heap_frame_mut(env).slots[i as usize] = value,
        }
    }

    /// The formal-name list of an environment's frame.
    #[must_use]
    pub(crate) fn frame_vars(&self, env: NodeRef) -> NodeRef {
        match self.young_frame_offset(env) {
            Some(offset) => NodeRef::from_bits(self.varpool.get(offset + FRAME_VARS)),
            None => self.heap_frame(env).vars,
        }
    }

    pub(crate) fn set_frame_vars(&mut self, env: NodeRef, vars: NodeRef) {
        match self.young_frame_offset(env) {
            Some(offset) => self.varpool.set(offset + FRAME_VARS, vars.to_bits()),
            None => self.heap_frame_mut(env).vars = vars,
        }
    }

    /// The owning closure recorded in an environment's frame.
    #[must_use]
    pub(crate) fn frame_closure(&self, env: NodeRef) -> NodeRef {
        match self.young_frame_offset(env) {
            Some(offset) => NodeRef::from_bits(self.varpool.get(offset + FRAME_CLOSURE)),
            None => self.heap_frame(env).closure,
        }
    }

    pub(crate) fn set_frame_closure(&mut self, env: NodeRef, closure: NodeRef) {
        match self.young_frame_offset(env) {
            Some(offset) => self.varpool.set(offset + FRAME_CLOSURE, closure.to_bits()),
            None => self.heap_frame_mut(env).closure = closure,
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`Memory::suspend_gc`].
pub struct GcSuspension<'a> {
    mem: &'a mut Memory,
}

impl Deref for GcSuspension<'_> {
    type Target = Memory;

    fn deref(&self) -> &Memory {
        self.mem
    }
}

impl DerefMut for GcSuspension<'_> {
    fn deref_mut(&mut self) -> &mut Memory {
        self.mem
    }
}

impl Drop for GcSuspension<'_> {
    fn drop(&mut self) {
        self.mem.suspensions -= 1;
    }
}
