// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tagged node representation for Soma heap values.
//!
//! Every heap-visible value is a fixed-size [`Node`]: six single-byte header
//! fields plus a [`Payload`] selected by the node kind. Nodes are identified
//! by [`NodeRef`], an index into the node pool. The null object is the
//! reserved sentinel [`NodeRef::NULL`]; it has no backing storage and every
//! null test is an identity comparison against the sentinel.
//!
//! Variable-sized payloads (frames, vectors) may live out-of-line in the
//! two-space nursery; their node then records a word offset into the active
//! half instead of an owned buffer. See [`crate::varpool`].

#[cfg(test)]
mod node_test;

use core::fmt;
use std::fs::File;

use crate::framestore::Frame;
use crate::memory::Memory;
use crate::sexpr::SevereError;

/// Port mode bit: the port accepts reads.
pub const PORT_INPUT: u8 = 0x01;

/// Port mode bit: the port accepts writes.
pub const PORT_OUTPUT: u8 = 0x02;

/// Number of node kinds, for kind-indexed statistics tables.
pub const NUM_KINDS: usize = 26;

/// A primitive function installed by the evaluator.
///
/// Primitives take their arguments from the argument stack collaborator and
/// report type failures through the severe error channel.
pub type PrimFn = fn(&mut Memory) -> Result<NodeRef, SevereError>;

/// Reference to a node in the pool.
///
/// The all-ones bit pattern is the null object. References are plain
/// indices, so they stay valid across collections (the pool never moves
/// nodes; only out-of-line payloads move).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeRef(u32);

impl NodeRef {
    /// The null object. Never allocated from the pool.
    pub const NULL: Self = Self(u32::MAX);

    /// Check if this reference is the null object.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    /// Get the raw bit pattern, for storage in nursery cells.
    #[inline]
    #[must_use]
    pub(crate) const fn to_bits(self) -> u32 {
        self.0
    }

    /// Rebuild a reference from a raw bit pattern.
    #[inline]
    #[must_use]
    pub(crate) const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Build a reference from a flat pool index.
    #[inline]
    #[must_use]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Get the flat pool index. Must not be called on the null object.
    #[inline]
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "NodeRef(null)")
        } else {
            write!(f, "NodeRef({})", self.0)
        }
    }
}

/// The kind tag of a node.
///
/// `Func` through `Force` all carry the [`Payload::Prim`] shape; the kind
/// tells the evaluator which application protocol the primitive follows.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// On the free list; payload is the next-link.
    Free = 0,
    /// The null object. No pool node ever carries this kind; it is
    /// reported for [`NodeRef::NULL`] only.
    Null,
    Symbol,
    Fixnum,
    Flonum,
    Char,
    String,
    Cons,
    Vector,
    ByteVector,
    Environment,
    Promise,
    Closure,
    Continuation,
    Port,
    StringPort,
    Func,
    Eval,
    Apply,
    CallCc,
    Map,
    ForEach,
    Force,
    Code,
    Gref,
    Fref,
}

impl NodeKind {
    /// Human-readable kind name for error messages and debug output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Null => "null",
            Self::Symbol => "symbol",
            Self::Fixnum => "fixnum",
            Self::Flonum => "flonum",
            Self::Char => "char",
            Self::String => "string",
            Self::Cons => "cons",
            Self::Vector => "vector",
            Self::ByteVector => "byte-vector",
            Self::Environment => "environment",
            Self::Promise => "promise",
            Self::Closure => "closure",
            Self::Continuation => "continuation",
            Self::Port => "port",
            Self::StringPort => "string-port",
            Self::Func => "func",
            Self::Eval => "eval",
            Self::Apply => "apply",
            Self::CallCc => "call/cc",
            Self::Map => "map",
            Self::ForEach => "foreach",
            Self::Force => "force",
            Self::Code => "code",
            Self::Gref => "gref",
            Self::Fref => "fref",
        }
    }

    /// Check if this kind carries the primitive payload shape.
    #[must_use]
    pub const fn is_prim(self) -> bool {
        matches!(
            self,
            Self::Func
                | Self::Eval
                | Self::Apply
                | Self::CallCc
                | Self::Map
                | Self::ForEach
                | Self::Force
        )
    }
}

/// Location of a vector's element buffer.
#[derive(Debug)]
pub enum VectorData {
    /// Word offset into the active nursery half. The buffer is owned by the
    /// nursery and recycled wholesale when the halves swap.
    Young(u32),
    /// Heap-owned element buffer (tenured, or nursery placement disabled).
    Heap(Box<[NodeRef]>),
}

/// Location of an environment's activation frame.
#[derive(Debug)]
pub enum FrameRef {
    /// Word offset of the frame image in the active nursery half.
    Young(u32),
    /// Heap-owned frame, recycled through the frame store.
    Heap(Frame),
}

/// The kind-selected payload of a node.
#[derive(Debug)]
pub enum Payload {
    /// Free-list link. Only valid while the node kind is [`NodeKind::Free`].
    Free { next: NodeRef },
    Fixnum(i64),
    Flonum(f64),
    Char(u8),
    /// `data` holds `length + 1` bytes with a trailing NUL; `index` is a
    /// caller-maintained working cursor.
    String {
        length: u32,
        index: u32,
        data: Box<[u8]>,
    },
    Cons {
        car: NodeRef,
        cdr: NodeRef,
    },
    Vector {
        length: u32,
        data: VectorData,
    },
    ByteVector {
        data: Box<[u8]>,
    },
    Environment {
        frame: FrameRef,
        base: NodeRef,
    },
    Promise {
        exp: NodeRef,
        val: NodeRef,
    },
    /// Closure arity lives in the header (`aux1` = slot count, `aux2` =
    /// rest-args flag).
    Closure {
        code: NodeRef,
        benv: NodeRef,
        vars: NodeRef,
    },
    Continuation {
        state: NodeRef,
    },
    Port {
        mode: u8,
        file: Option<File>,
    },
    /// An in-memory port: owned byte buffer plus read/write cursor.
    StringPort {
        mode: u8,
        data: Vec<u8>,
        index: usize,
    },
    Prim {
        func: PrimFn,
        name: &'static str,
    },
    Code {
        bcodes: NodeRef,
        sexprs: NodeRef,
    },
    /// `pair` is the dedicated cons holding the symbol's value in the car
    /// and its property list in the cdr, so value assignment never disturbs
    /// the plist.
    Symbol {
        name: Box<str>,
        pair: NodeRef,
    },
    Gref {
        symbol: NodeRef,
    },
    Fref {
        depth: u32,
        index: u32,
    },
}

/// A fixed-size tagged heap cell.
///
/// Header bytes other than `kind` are zero on every node handed out by the
/// allocator; the sweep restores them to zero when a node is reclaimed.
#[derive(Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) mark: bool,
    /// Evaluator dispatch hint. Opaque to the memory core.
    pub(crate) form: u8,
    /// Printer recursion guard. Opaque to the memory core.
    pub(crate) recu: u8,
    /// Nursery age counter, or closure slot count. The two uses never
    /// coincide: closures own no nursery payload.
    pub(crate) aux1: u8,
    /// Closure rest-args flag.
    pub(crate) aux2: u8,
    pub(crate) payload: Payload,
}

impl Node {
    /// Build a free node linked to `next`, with a zeroed header.
    #[must_use]
    pub(crate) const fn free(next: NodeRef) -> Self {
        Self {
            kind: NodeKind::Free,
            mark: false,
            form: 0,
            recu: 0,
            aux1: 0,
            aux2: 0,
            payload: Payload::Free { next },
        }
    }

    /// The kind tag.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }
}
