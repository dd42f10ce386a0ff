// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the node representation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{Node, NodeKind, NodeRef, Payload};

#[test]
fn null_is_identity() {
    assert!(NodeRef::NULL.is_null());
    assert!(NodeRef::default().is_null());
    assert_eq!(NodeRef::NULL, NodeRef::default());
    assert!(!NodeRef::from_index(0).is_null());
}

#[test]
fn bits_round_trip() {
    let n = NodeRef::from_index(4999);
    assert_eq!(NodeRef::from_bits(n.to_bits()), n);
    assert_eq!(n.index(), 4999);
    assert!(NodeRef::from_bits(NodeRef::NULL.to_bits()).is_null());
}

#[test]
fn debug_formats() {
    assert_eq!(format!("{:?}", NodeRef::NULL), "NodeRef(null)");
    assert_eq!(format!("{:?}", NodeRef::from_index(7)), "NodeRef(7)");
}

#[test]
fn kind_names() {
    assert_eq!(NodeKind::Cons.name(), "cons");
    assert_eq!(NodeKind::ByteVector.name(), "byte-vector");
    assert_eq!(NodeKind::CallCc.name(), "call/cc");
    assert_eq!(NodeKind::StringPort.name(), "string-port");
}

#[test]
fn prim_kinds() {
    assert!(NodeKind::Func.is_prim());
    assert!(NodeKind::Eval.is_prim());
    assert!(NodeKind::Force.is_prim());
    assert!(!NodeKind::Cons.is_prim());
    assert!(!NodeKind::Closure.is_prim());
}

#[test]
fn free_node_has_zeroed_header() {
    let next = NodeRef::from_index(3);
    let node = Node::free(next);
    assert_eq!(node.kind(), NodeKind::Free);
    assert!(!node.mark);
    assert_eq!(node.form, 0);
    assert_eq!(node.recu, 0);
    assert_eq!(node.aux1, 0);
    assert_eq!(node.aux2, 0);
    match node.payload {
        Payload::Free { next: linked } => assert_eq!(linked, next),
        other => panic!("unexpected payload {other:?}"),
    }
}
