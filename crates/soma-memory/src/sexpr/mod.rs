// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Checked accessors, predicates and the type guard.
//!
//! Collaborators reach node payloads through this layer. Every accessor
//! verifies the node kind and reports a [`SevereError`] on mismatch; the
//! interpreter's top level is where those errors land. Index accessors
//! additionally check bounds.
//!
//! [`guard`] is the generic form: it hands the node back when the expected
//! predicate holds and raises the severe type error naming the predicate
//! otherwise.

#[cfg(test)]
mod sexpr_test;

use core::fmt;

use crate::memory::Memory;
use crate::node::{NodeKind, NodeRef, Payload, PORT_INPUT, PORT_OUTPUT};

/// A recoverable fault, reported with context to the interpreter top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SevereError {
    /// An argument did not satisfy the expected predicate.
    WrongType {
        expected: &'static str,
        got: NodeRef,
    },
    /// Frame slot index out of range.
    FrameIndex { index: u32, nslots: u32 },
    /// Vector or byte-vector index out of range.
    VectorIndex { index: u32, length: u32 },
    /// A string operation would exceed the maximum string size.
    StringOverflow { length: u64 },
}

impl fmt::Display for SevereError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongType { expected, .. } => {
                write!(f, "argument wrong type--expected {expected}")
            }
            Self::FrameIndex { index, nslots } => {
                write!(f, "frame index {index} out of range ({nslots} slots)")
            }
            Self::VectorIndex { index, length } => {
                write!(f, "vector index {index} out of range (length {length})")
            }
            Self::StringOverflow { length } => {
                write!(f, "string length {length} exceeds maximum size")
            }
        }
    }
}

impl std::error::Error for SevereError {}

/// The predicate table: each entry checks one shape of node and knows the
/// human-readable name used in type-error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expect {
    Symbol,
    Fixnum,
    Flonum,
    Number,
    String,
    Char,
    Vector,
    Pair,
    Func,
    Port,
    StringPort,
    Closure,
    Special,
    Continuation,
    Environment,
    ByteVector,
    List,
    Atom,
    InPort,
    OutPort,
    InStringPort,
    OutStringPort,
    AnyInPort,
    AnyOutPort,
    LastArg,
    Promise,
    AnyPort,
    Prim,
    Code,
    Gref,
    Fref,
}

impl Expect {
    /// The name reported by a failed [`guard`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Symbol => "symbol",
            Self::Fixnum => "fixnum",
            Self::Flonum => "flonum",
            Self::Number => "number",
            Self::String => "string",
            Self::Char => "char",
            Self::Vector => "vector",
            Self::Pair => "pair",
            Self::Func => "func",
            Self::Port => "port",
            Self::StringPort => "string port",
            Self::Closure => "closure",
            Self::Special => "special",
            Self::Continuation => "continuation",
            Self::Environment => "environment",
            Self::ByteVector => "byte vector",
            Self::List => "list",
            Self::Atom => "atom",
            Self::InPort => "input port",
            Self::OutPort => "output port",
            Self::InStringPort => "input string port",
            Self::OutStringPort => "output string port",
            Self::AnyInPort => "any input port",
            Self::AnyOutPort => "any output port",
            Self::LastArg => "last argument",
            Self::Promise => "promise",
            Self::AnyPort => "port or stringport",
            Self::Prim => "func or special",
            Self::Code => "code",
            Self::Gref => "global symbol reference",
            Self::Fref => "frame symbol reference",
        }
    }

    /// Check the predicate against `n`.
    #[must_use]
    pub fn holds(self, mem: &Memory, n: NodeRef) -> bool {
        match self {
            Self::Symbol => symbolp(mem, n),
            Self::Fixnum => fixnump(mem, n),
            Self::Flonum => flonump(mem, n),
            Self::Number => numberp(mem, n),
            Self::String => stringp(mem, n),
            Self::Char => charp(mem, n),
            Self::Vector => vectorp(mem, n),
            Self::Pair => consp(mem, n),
            Self::Func => funcp(mem, n),
            Self::Port => portp(mem, n),
            Self::StringPort => stringportp(mem, n),
            Self::Closure => closurep(mem, n),
            Self::Special => specialp(mem, n),
            Self::Continuation => contp(mem, n),
            Self::Environment => envp(mem, n),
            Self::ByteVector => bvecp(mem, n),
            Self::List => listp(mem, n),
            Self::Atom => atomp(mem, n),
            Self::InPort => inportp(mem, n),
            Self::OutPort => outportp(mem, n),
            Self::InStringPort => instringportp(mem, n),
            Self::OutStringPort => outstringportp(mem, n),
            Self::AnyInPort => anyinportp(mem, n),
            Self::AnyOutPort => anyoutportp(mem, n),
            Self::LastArg => lastp(mem, n),
            Self::Promise => promisep(mem, n),
            Self::AnyPort => anyportp(mem, n),
            Self::Prim => primp(mem, n),
            Self::Code => codep(mem, n),
            Self::Gref => grefp(mem, n),
            Self::Fref => frefp(mem, n),
        }
    }
}

/// Hand `n` back when the predicate holds; raise the severe type error
/// naming it otherwise.
pub fn guard(mem: &Memory, n: NodeRef, expect: Expect) -> Result<NodeRef, SevereError> {
    if expect.holds(mem, n) {
        Ok(n)
    } else {
        Err(expected(expect, n))
    }
}

const fn expected(expect: Expect, got: NodeRef) -> SevereError {
    SevereError::WrongType {
        expected: expect.name(),
        got,
    }
}

fn payload_of(mem: &Memory, n: NodeRef) -> Option<&Payload> {
    if n.is_null() {
        None
    } else {
        Some(&mem.node(n).payload)
    }
}

// --- Predicates ---

#[must_use]
pub const fn nullp(n: NodeRef) -> bool {
    n.is_null()
}

#[must_use]
pub const fn anyp(n: NodeRef) -> bool {
    !n.is_null()
}

#[must_use]
pub fn symbolp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Symbol
}

#[must_use]
pub fn fixnump(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Fixnum
}

#[must_use]
pub fn flonump(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Flonum
}

#[must_use]
pub fn numberp(mem: &Memory, n: NodeRef) -> bool {
    fixnump(mem, n) || flonump(mem, n)
}

#[must_use]
pub fn stringp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::String
}

#[must_use]
pub fn charp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Char
}

#[must_use]
pub fn vectorp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Vector
}

#[must_use]
pub fn consp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Cons
}

#[must_use]
pub fn funcp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Func
}

#[must_use]
pub fn specialp(mem: &Memory, n: NodeRef) -> bool {
    matches!(
        mem.kind(n),
        NodeKind::Eval
            | NodeKind::Apply
            | NodeKind::CallCc
            | NodeKind::Map
            | NodeKind::ForEach
            | NodeKind::Force
    )
}

#[must_use]
pub fn primp(mem: &Memory, n: NodeRef) -> bool {
    funcp(mem, n) || specialp(mem, n)
}

#[must_use]
pub fn portp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Port
}

#[must_use]
pub fn stringportp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::StringPort
}

#[must_use]
pub fn anyportp(mem: &Memory, n: NodeRef) -> bool {
    portp(mem, n) || stringportp(mem, n)
}

#[must_use]
pub fn closurep(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Closure
}

#[must_use]
pub fn contp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Continuation
}

#[must_use]
pub fn envp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Environment
}

#[must_use]
pub fn bvecp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::ByteVector
}

#[must_use]
pub fn listp(mem: &Memory, n: NodeRef) -> bool {
    nullp(n) || consp(mem, n)
}

#[must_use]
pub fn atomp(mem: &Memory, n: NodeRef) -> bool {
    nullp(n) || !consp(mem, n)
}

#[must_use]
pub fn promisep(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Promise
}

#[must_use]
pub fn codep(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Code
}

#[must_use]
pub fn grefp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Gref
}

#[must_use]
pub fn frefp(mem: &Memory, n: NodeRef) -> bool {
    mem.kind(n) == NodeKind::Fref
}

/// True for null and for a pair whose cdr is null.
#[must_use]
pub fn lastp(mem: &Memory, n: NodeRef) -> bool {
    match payload_of(mem, n) {
        None => true,
        Some(Payload::Cons { cdr, .. }) => cdr.is_null(),
        Some(_) => false,
    }
}

fn mode_bits(mem: &Memory, n: NodeRef) -> Option<u8> {
    match payload_of(mem, n) {
        Some(Payload::Port { mode, .. } | Payload::StringPort { mode, .. }) => Some(*mode),
        _ => None,
    }
}

#[must_use]
pub fn inportp(mem: &Memory, n: NodeRef) -> bool {
    portp(mem, n) && mode_bits(mem, n).is_some_and(|mode| mode & PORT_INPUT != 0)
}

#[must_use]
pub fn outportp(mem: &Memory, n: NodeRef) -> bool {
    portp(mem, n) && mode_bits(mem, n).is_some_and(|mode| mode & PORT_OUTPUT != 0)
}

#[must_use]
pub fn instringportp(mem: &Memory, n: NodeRef) -> bool {
    stringportp(mem, n) && mode_bits(mem, n).is_some_and(|mode| mode & PORT_INPUT != 0)
}

#[must_use]
pub fn outstringportp(mem: &Memory, n: NodeRef) -> bool {
    stringportp(mem, n) && mode_bits(mem, n).is_some_and(|mode| mode & PORT_OUTPUT != 0)
}

#[must_use]
pub fn anyinportp(mem: &Memory, n: NodeRef) -> bool {
    inportp(mem, n) || instringportp(mem, n)
}

#[must_use]
pub fn anyoutportp(mem: &Memory, n: NodeRef) -> bool {
    outportp(mem, n) || outstringportp(mem, n)
}

// --- Numbers and characters ---

pub fn fixnum(mem: &Memory, n: NodeRef) -> Result<i64, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Fixnum(value)) => Ok(*value),
        _ => Err(expected(Expect::Fixnum, n)),
    }
}

pub fn flonum(mem: &Memory, n: NodeRef) -> Result<f64, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Flonum(value)) => Ok(*value),
        _ => Err(expected(Expect::Flonum, n)),
    }
}

pub fn char_value(mem: &Memory, n: NodeRef) -> Result<u8, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Char(ch)) => Ok(*ch),
        _ => Err(expected(Expect::Char, n)),
    }
}

// --- Lists ---

/// The car of a pair; the car of null is null.
pub fn car(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        None => Ok(NodeRef::NULL),
        Some(Payload::Cons { car, .. }) => Ok(*car),
        Some(_) => Err(expected(Expect::Pair, n)),
    }
}

/// The cdr of a pair; the cdr of null is null.
pub fn cdr(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        None => Ok(NodeRef::NULL),
        Some(Payload::Cons { cdr, .. }) => Ok(*cdr),
        Some(_) => Err(expected(Expect::Pair, n)),
    }
}

pub fn rplaca(mem: &mut Memory, n: NodeRef, car: NodeRef) -> Result<(), SevereError> {
    if n.is_null() {
        return Err(expected(Expect::Pair, n));
    }
    match &mut mem.node_mut(n).payload {
        Payload::Cons { car: slot, .. } => {
            *slot = car;
            Ok(())
        }
        _ => Err(expected(Expect::Pair, n)),
    }
}

pub fn rplacd(mem: &mut Memory, n: NodeRef, cdr: NodeRef) -> Result<(), SevereError> {
    if n.is_null() {
        return Err(expected(Expect::Pair, n));
    }
    match &mut mem.node_mut(n).payload {
        Payload::Cons { cdr: slot, .. } => {
            *slot = cdr;
            Ok(())
        }
        _ => Err(expected(Expect::Pair, n)),
    }
}

/// The car after dropping `n` leading pairs.
pub fn nthcar(mem: &Memory, list: NodeRef, n: u32) -> Result<NodeRef, SevereError> {
    let mut s = list;
    let mut remaining = n;
    while remaining > 0 && consp(mem, s) {
        s = cdr(mem, s)?;
        remaining -= 1;
    }
    car(mem, s)
}

/// The cdr after dropping `n` leading pairs.
pub fn nthcdr(mem: &Memory, list: NodeRef, n: u32) -> Result<NodeRef, SevereError> {
    let mut s = list;
    let mut remaining = n;
    while remaining > 0 && consp(mem, s) {
        s = cdr(mem, s)?;
        remaining -= 1;
    }
    cdr(mem, s)
}

/// Count the leading pairs of `x`. Stops at the first non-pair; does not
/// detect cycles.
#[must_use]
pub fn list_length(mem: &Memory, x: NodeRef) -> u32 {
    let mut length = 0;
    let mut s = x;
    while let Some(Payload::Cons { cdr, .. }) = payload_of(mem, s) {
        length += 1;
        s = *cdr;
    }
    length
}

// --- Strings ---

/// The bytes of a string, without the trailing NUL.
pub fn string_bytes(mem: &Memory, n: NodeRef) -> Result<&[u8], SevereError> {
    match payload_of(mem, n) {
        Some(Payload::String { length, data, .. }) => Ok(&data[..*length as usize]),
        _ => Err(expected(Expect::String, n)),
    }
}

pub fn string_length(mem: &Memory, n: NodeRef) -> Result<u32, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::String { length, .. }) => Ok(*length),
        _ => Err(expected(Expect::String, n)),
    }
}

/// The caller-maintained working cursor of a string.
pub fn string_index(mem: &Memory, n: NodeRef) -> Result<u32, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::String { index, .. }) => Ok(*index),
        _ => Err(expected(Expect::String, n)),
    }
}

pub fn set_string_index(mem: &mut Memory, n: NodeRef, index: u32) -> Result<(), SevereError> {
    if n.is_null() {
        return Err(expected(Expect::String, n));
    }
    match &mut mem.node_mut(n).payload {
        Payload::String { index: slot, .. } => {
            *slot = index;
            Ok(())
        }
        _ => Err(expected(Expect::String, n)),
    }
}

// --- Vectors and byte vectors ---

pub fn vector_length(mem: &Memory, v: NodeRef) -> Result<u32, SevereError> {
    match payload_of(mem, v) {
        Some(Payload::Vector { length, .. }) => Ok(*length),
        _ => Err(expected(Expect::Vector, v)),
    }
}

pub fn vref(mem: &Memory, v: NodeRef, index: u32) -> Result<NodeRef, SevereError> {
    let length = vector_length(mem, v)?;
    if index >= length {
        return Err(SevereError::VectorIndex { index, length });
    }
    Ok(mem.vector_cell(v, index))
}

pub fn vset(
    mem: &mut Memory,
    v: NodeRef,
    index: u32,
    value: NodeRef,
) -> Result<(), SevereError> {
    let length = vector_length(mem, v)?;
    if index >= length {
        return Err(SevereError::VectorIndex { index, length });
    }
    mem.set_vector_cell(v, index, value);
    Ok(())
}

pub fn bvec_length(mem: &Memory, v: NodeRef) -> Result<u32, SevereError> {
    match payload_of(mem, v) {
        Some(Payload::ByteVector { data }) => Ok(data.len() as u32),
        _ => Err(expected(Expect::ByteVector, v)),
    }
}

pub fn bvec_ref(mem: &Memory, v: NodeRef, index: u32) -> Result<u8, SevereError> {
    let length = bvec_length(mem, v)?;
    if index >= length {
        return Err(SevereError::VectorIndex { index, length });
    }
    match payload_of(mem, v) {
        Some(Payload::ByteVector { data }) => Ok(data[index as usize]),
        _ => Err(expected(Expect::ByteVector, v)),
    }
}

pub fn bvec_set(mem: &mut Memory, v: NodeRef, index: u32, byte: u8) -> Result<(), SevereError> {
    let length = bvec_length(mem, v)?;
    if index >= length {
        return Err(SevereError::VectorIndex { index, length });
    }
    match &mut mem.node_mut(v).payload {
        Payload::ByteVector { data } => {
            data[index as usize] = byte;
            Ok(())
        }
        _ => Err(expected(Expect::ByteVector, v)),
    }
}

// --- Symbols ---

fn symbol_pair(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Symbol { pair, .. }) => Ok(*pair),
        _ => Err(expected(Expect::Symbol, n)),
    }
}

/// The print name of a symbol.
pub fn name(mem: &Memory, n: NodeRef) -> Result<&str, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Symbol { name, .. }) => Ok(name),
        _ => Err(expected(Expect::Symbol, n)),
    }
}

/// The global value bound to a symbol.
pub fn value(mem: &Memory, symbol: NodeRef) -> Result<NodeRef, SevereError> {
    let pair = symbol_pair(mem, symbol)?;
    car(mem, pair)
}

/// Bind a symbol's global value, returning the symbol.
pub fn set(mem: &mut Memory, symbol: NodeRef, value: NodeRef) -> Result<NodeRef, SevereError> {
    let pair = symbol_pair(mem, symbol)?;
    rplaca(mem, pair, value)?;
    Ok(symbol)
}

/// The property list of a symbol.
pub fn plist(mem: &Memory, symbol: NodeRef) -> Result<NodeRef, SevereError> {
    let pair = symbol_pair(mem, symbol)?;
    cdr(mem, pair)
}

pub fn set_plist(mem: &mut Memory, symbol: NodeRef, plist: NodeRef) -> Result<(), SevereError> {
    let pair = symbol_pair(mem, symbol)?;
    rplacd(mem, pair, plist)
}

// --- Environments and frames ---

pub fn env_base(mem: &Memory, env: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, env) {
        Some(Payload::Environment { base, .. }) => Ok(*base),
        _ => Err(expected(Expect::Environment, env)),
    }
}

pub fn frame_nslots(mem: &Memory, env: NodeRef) -> Result<u32, SevereError> {
    guard(mem, env, Expect::Environment)?;
    Ok(mem.frame_nslots(env))
}

pub fn frame_vars(mem: &Memory, env: NodeRef) -> Result<NodeRef, SevereError> {
    guard(mem, env, Expect::Environment)?;
    Ok(mem.frame_vars(env))
}

pub fn set_frame_vars(mem: &mut Memory, env: NodeRef, vars: NodeRef) -> Result<(), SevereError> {
    guard(mem, env, Expect::Environment)?;
    mem.set_frame_vars(env, vars);
    Ok(())
}

pub fn frame_closure(mem: &Memory, env: NodeRef) -> Result<NodeRef, SevereError> {
    guard(mem, env, Expect::Environment)?;
    Ok(mem.frame_closure(env))
}

pub fn set_frame_closure(
    mem: &mut Memory,
    env: NodeRef,
    closure: NodeRef,
) -> Result<(), SevereError> {
    guard(mem, env, Expect::Environment)?;
    mem.set_frame_closure(env, closure);
    Ok(())
}

/// Read frame slot `index` of an environment.
pub fn fref(mem: &Memory, env: NodeRef, index: u32) -> Result<NodeRef, SevereError> {
    guard(mem, env, Expect::Environment)?;
    let nslots = mem.frame_nslots(env);
    if index >= nslots {
        return Err(SevereError::FrameIndex { index, nslots });
    }
    Ok(mem.frame_cell(env, index))
}

/// Write frame slot `index` of an environment.
pub fn fset(
    mem: &mut Memory,
    env: NodeRef,
    index: u32,
    value: NodeRef,
) -> Result<(), SevereError> {
    guard(mem, env, Expect::Environment)?;
    let nslots = mem.frame_nslots(env);
    if index >= nslots {
        return Err(SevereError::FrameIndex { index, nslots });
    }
    mem.set_frame_cell(env, index, value);
    Ok(())
}

// --- Closures ---

pub fn closure_code(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Closure { code, .. }) => Ok(*code),
        _ => Err(expected(Expect::Closure, n)),
    }
}

pub fn closure_benv(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Closure { benv, .. }) => Ok(*benv),
        _ => Err(expected(Expect::Closure, n)),
    }
}

pub fn closure_vars(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Closure { vars, .. }) => Ok(*vars),
        _ => Err(expected(Expect::Closure, n)),
    }
}

pub fn set_closure_vars(mem: &mut Memory, n: NodeRef, vars: NodeRef) -> Result<(), SevereError> {
    if n.is_null() {
        return Err(expected(Expect::Closure, n));
    }
    match &mut mem.node_mut(n).payload {
        Payload::Closure { vars: slot, .. } => {
            *slot = vars;
            Ok(())
        }
        _ => Err(expected(Expect::Closure, n)),
    }
}

/// Number of formals a closure binds (header `aux1`).
pub fn closure_numv(mem: &Memory, n: NodeRef) -> Result<u8, SevereError> {
    guard(mem, n, Expect::Closure)?;
    Ok(mem.node(n).aux1)
}

pub fn set_closure_numv(mem: &mut Memory, n: NodeRef, numv: u8) -> Result<(), SevereError> {
    guard(mem, n, Expect::Closure)?;
    mem.node_mut(n).aux1 = numv;
    Ok(())
}

/// Rest-args flag of a closure (header `aux2`).
pub fn closure_rargs(mem: &Memory, n: NodeRef) -> Result<u8, SevereError> {
    guard(mem, n, Expect::Closure)?;
    Ok(mem.node(n).aux2)
}

pub fn set_closure_rargs(mem: &mut Memory, n: NodeRef, rargs: u8) -> Result<(), SevereError> {
    guard(mem, n, Expect::Closure)?;
    mem.node_mut(n).aux2 = rargs;
    Ok(())
}

// --- Promises, code, continuations, references, ports ---

pub fn promise_exp(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Promise { exp, .. }) => Ok(*exp),
        _ => Err(expected(Expect::Promise, n)),
    }
}

pub fn promise_val(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Promise { val, .. }) => Ok(*val),
        _ => Err(expected(Expect::Promise, n)),
    }
}

pub fn set_promise_val(mem: &mut Memory, n: NodeRef, val: NodeRef) -> Result<(), SevereError> {
    if n.is_null() {
        return Err(expected(Expect::Promise, n));
    }
    match &mut mem.node_mut(n).payload {
        Payload::Promise { val: slot, .. } => {
            *slot = val;
            Ok(())
        }
        _ => Err(expected(Expect::Promise, n)),
    }
}

pub fn code_bcodes(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Code { bcodes, .. }) => Ok(*bcodes),
        _ => Err(expected(Expect::Code, n)),
    }
}

pub fn code_sexprs(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Code { sexprs, .. }) => Ok(*sexprs),
        _ => Err(expected(Expect::Code, n)),
    }
}

pub fn cont_state(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Continuation { state }) => Ok(*state),
        _ => Err(expected(Expect::Continuation, n)),
    }
}

pub fn set_cont_state(mem: &mut Memory, n: NodeRef, state: NodeRef) -> Result<(), SevereError> {
    if n.is_null() {
        return Err(expected(Expect::Continuation, n));
    }
    match &mut mem.node_mut(n).payload {
        Payload::Continuation { state: slot } => {
            *slot = state;
            Ok(())
        }
        _ => Err(expected(Expect::Continuation, n)),
    }
}

pub fn gref_symbol(mem: &Memory, n: NodeRef) -> Result<NodeRef, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Gref { symbol }) => Ok(*symbol),
        _ => Err(expected(Expect::Gref, n)),
    }
}

/// Lexical depth of a frame reference.
pub fn fref_depth(mem: &Memory, n: NodeRef) -> Result<u32, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Fref { depth, .. }) => Ok(*depth),
        _ => Err(expected(Expect::Fref, n)),
    }
}

/// Slot index of a frame reference.
pub fn fref_index(mem: &Memory, n: NodeRef) -> Result<u32, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Fref { index, .. }) => Ok(*index),
        _ => Err(expected(Expect::Fref, n)),
    }
}

pub fn port_mode(mem: &Memory, n: NodeRef) -> Result<u8, SevereError> {
    mode_bits(mem, n).ok_or(expected(Expect::AnyPort, n))
}

/// The name installed on a primitive.
pub fn prim_name(mem: &Memory, n: NodeRef) -> Result<&'static str, SevereError> {
    match payload_of(mem, n) {
        Some(Payload::Prim { name, .. }) => Ok(name),
        _ => Err(expected(Expect::Prim, n)),
    }
}

// --- Debug support ---

/// Render a short description of a node, for diagnostics.
#[must_use]
pub fn describe(mem: &Memory, n: NodeRef) -> String {
    if n.is_null() {
        return "null".to_owned();
    }
    let kind = mem.kind(n);
    match &mem.node(n).payload {
        Payload::Symbol { name, .. } => format!("{}({n:?}) [{name}]", kind.name()),
        _ => format!("{}({n:?})", kind.name()),
    }
}
