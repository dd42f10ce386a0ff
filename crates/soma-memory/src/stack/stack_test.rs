// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the node-reference stacks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{ArgStack, NodeStack};
use crate::node::NodeRef;

#[test]
fn push_pop_top_depth() {
    let stack = NodeStack::new("register", 8);
    assert_eq!(stack.depth(), 0);

    stack.push(NodeRef::from_index(1));
    stack.push(NodeRef::from_index(2));
    assert_eq!(stack.depth(), 2);
    assert_eq!(stack.top(), NodeRef::from_index(2));
    assert_eq!(stack.get(0), NodeRef::from_index(1));

    assert_eq!(stack.pop(), NodeRef::from_index(2));
    assert_eq!(stack.pop(), NodeRef::from_index(1));
    assert_eq!(stack.depth(), 0);
}

#[test]
fn flush_empties_the_stack() {
    let stack = NodeStack::new("register", 8);
    stack.push(NodeRef::NULL);
    stack.push(NodeRef::from_index(3));
    stack.flush();
    assert_eq!(stack.depth(), 0);
}

#[test]
#[should_panic(expected = "register stack overflow")]
fn overflow_is_fatal() {
    let stack = NodeStack::new("register", 2);
    stack.push(NodeRef::from_index(1));
    stack.push(NodeRef::from_index(2));
    stack.push(NodeRef::from_index(3));
}

#[test]
#[should_panic(expected = "register stack underflow")]
fn underflow_is_fatal() {
    let stack = NodeStack::new("register", 2);
    let _ = stack.pop();
}

#[test]
fn argstack_tracks_the_current_call() {
    let args = ArgStack::new(16);
    args.push(NodeRef::from_index(10));
    args.push(NodeRef::from_index(11));
    args.push(NodeRef::from_index(12));

    assert_eq!(args.argc(), 3);
    assert_eq!(args.first_arg_index(), 0);
    assert_eq!(args.arg(0), NodeRef::from_index(10));
    assert_eq!(args.arg(2), NodeRef::from_index(12));

    args.remove_argc();
    assert_eq!(args.argc(), 0);
    assert_eq!(args.depth(), 0);
}

#[test]
fn argstack_nested_calls_save_and_restore() {
    let args = ArgStack::new(16);
    args.push(NodeRef::from_index(1));
    args.push(NodeRef::from_index(2));

    let saved = args.save_argc();
    assert_eq!(saved, 2);
    assert_eq!(args.argc(), 0);

    args.push(NodeRef::from_index(3));
    assert_eq!(args.argc(), 1);
    assert_eq!(args.first_arg_index(), 2);
    assert_eq!(args.arg(0), NodeRef::from_index(3));
    args.remove_argc();

    args.restore_argc(saved);
    assert_eq!(args.argc(), 2);
    assert_eq!(args.arg(1), NodeRef::from_index(2));
}

#[test]
fn arg_iterator_walks_the_frame() {
    let args = ArgStack::new(16);
    args.push(NodeRef::from_index(7));
    args.push(NodeRef::from_index(8));

    let mut iter = args.iter();
    assert!(iter.more());
    assert_eq!(iter.getarg(), NodeRef::from_index(7));
    assert_eq!(iter.getarg(), NodeRef::from_index(8));
    assert!(!iter.more());
}

#[test]
#[should_panic(expected = "argument iterator exhausted")]
fn arg_iterator_past_the_end_is_fatal() {
    let args = ArgStack::new(16);
    args.push(NodeRef::from_index(7));
    let mut iter = args.iter();
    let _ = iter.getarg();
    let _ = iter.getarg();
}
