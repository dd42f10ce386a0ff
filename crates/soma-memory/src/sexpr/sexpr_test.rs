// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the checked accessors, predicates and the guard.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{
    atomp, bvec_ref, bvec_set, car, cdr, char_value, closure_benv, closure_code, closure_numv,
    closure_vars, cont_state, describe, env_base, fixnum, flonum, fref, fref_depth, fref_index,
    fset, gref_symbol, guard, lastp, list_length, listp, name, nthcar, nthcdr, numberp, plist,
    port_mode, promise_exp, promise_val, rplaca, rplacd, set, set_closure_numv, set_closure_vars,
    set_plist, set_promise_val, string_bytes, string_index, set_string_index, value, vref, vset,
    Expect, SevereError,
};
use crate::memory::Memory;
use crate::node::{NodeKind, NodeRef, PORT_INPUT};
use crate::stack::{NodeStack, REGSTACK_SIZE};

fn setup() -> Memory {
    Memory::new()
}

/// Build the list (1 2 3).
fn list123(mem: &mut Memory) -> NodeRef {
    let mut head = NodeRef::NULL;
    for i in (1..=3).rev() {
        let item = mem.alloc_fixnum(i);
        head = mem.alloc_cons(item, head);
    }
    head
}

#[test]
fn guard_passes_matching_nodes() {
    let mut mem = setup();
    let n = mem.alloc_fixnum(5);
    assert_eq!(guard(&mem, n, Expect::Fixnum).unwrap(), n);
    assert_eq!(guard(&mem, n, Expect::Number).unwrap(), n);
}

#[test]
fn guard_reports_the_expected_name() {
    let mut mem = setup();
    let n = mem.alloc_fixnum(1);
    let err = car(&mem, n).unwrap_err();
    assert_eq!(
        err,
        SevereError::WrongType {
            expected: "pair",
            got: n
        }
    );
    assert_eq!(
        err.to_string(),
        "argument wrong type--expected pair"
    );
}

#[test]
fn car_and_cdr_of_null_are_null() {
    let mem = setup();
    assert!(car(&mem, NodeRef::NULL).unwrap().is_null());
    assert!(cdr(&mem, NodeRef::NULL).unwrap().is_null());
}

#[test]
fn list_walks() {
    let mut mem = setup();
    let list = list123(&mut mem);

    assert_eq!(list_length(&mem, list), 3);
    assert_eq!(list_length(&mem, NodeRef::NULL), 0);

    let first = car(&mem, list).unwrap();
    assert_eq!(fixnum(&mem, first).unwrap(), 1);

    assert_eq!(fixnum(&mem, nthcar(&mem, list, 0).unwrap()).unwrap(), 1);
    assert_eq!(fixnum(&mem, nthcar(&mem, list, 2).unwrap()).unwrap(), 3);
    assert!(nthcdr(&mem, list, 2).unwrap().is_null());
}

#[test]
fn list_length_ignores_an_improper_tail() {
    let mut mem = setup();
    let tail = mem.alloc_fixnum(9);
    let list = mem.alloc_cons(NodeRef::NULL, tail);
    assert_eq!(list_length(&mem, list), 1);
}

#[test]
fn rplaca_and_rplacd_replace_in_place() {
    let mut mem = setup();
    let pair = mem.alloc_cons(NodeRef::NULL, NodeRef::NULL);
    let a = mem.alloc_fixnum(1);
    let d = mem.alloc_fixnum(2);

    rplaca(&mut mem, pair, a).unwrap();
    rplacd(&mut mem, pair, d).unwrap();
    assert_eq!(car(&mem, pair).unwrap(), a);
    assert_eq!(cdr(&mem, pair).unwrap(), d);

    assert!(rplaca(&mut mem, a, d).is_err());
    assert!(rplaca(&mut mem, NodeRef::NULL, d).is_err());
}

#[test]
fn predicates_classify() {
    let mut mem = setup();
    let pair = mem.alloc_cons(NodeRef::NULL, NodeRef::NULL);
    let five = mem.alloc_fixnum(5);
    let half = mem.alloc_flonum(0.5);

    assert!(listp(&mem, NodeRef::NULL));
    assert!(listp(&mem, pair));
    assert!(!listp(&mem, five));
    assert!(atomp(&mem, NodeRef::NULL));
    assert!(atomp(&mem, five));
    assert!(!atomp(&mem, pair));
    assert!(numberp(&mem, five));
    assert!(numberp(&mem, half));
    assert!(!numberp(&mem, pair));
    assert!(lastp(&mem, NodeRef::NULL));
    assert!(lastp(&mem, pair));
    assert!(!lastp(&mem, five));
}

#[test]
fn vector_access_checks_bounds() {
    let mut mem = setup();
    let v = mem.alloc_vector(3);
    let item = mem.alloc_fixnum(7);

    assert!(vref(&mem, v, 0).unwrap().is_null());
    vset(&mut mem, v, 2, item).unwrap();
    assert_eq!(vref(&mem, v, 2).unwrap(), item);

    assert_eq!(
        vref(&mem, v, 3).unwrap_err(),
        SevereError::VectorIndex {
            index: 3,
            length: 3
        }
    );
    assert!(vset(&mut mem, item, 0, v).is_err());
}

#[test]
fn byte_vector_access_checks_bounds() {
    let mut mem = setup();
    let v = mem.alloc_byte_vector(2);
    assert_eq!(bvec_ref(&mem, v, 0).unwrap(), 0);
    bvec_set(&mut mem, v, 1, 0xAB).unwrap();
    assert_eq!(bvec_ref(&mem, v, 1).unwrap(), 0xAB);
    assert!(bvec_ref(&mem, v, 2).is_err());
}

#[test]
fn string_accessors() {
    let mut mem = setup();
    let s = mem.alloc_string_from("hello");
    assert_eq!(string_bytes(&mem, s).unwrap(), b"hello");
    assert_eq!(string_index(&mem, s).unwrap(), 0);
    set_string_index(&mut mem, s, 3).unwrap();
    assert_eq!(string_index(&mem, s).unwrap(), 3);

    let not_a_string = mem.alloc_fixnum(1);
    assert!(string_bytes(&mem, not_a_string).is_err());
}

#[test]
fn symbol_value_and_plist_are_independent() {
    let mut mem = setup();
    let regstack = NodeStack::new("register", REGSTACK_SIZE);
    let sym = mem.alloc_symbol("x", &regstack);

    assert_eq!(name(&mem, sym).unwrap(), "x");
    assert!(value(&mem, sym).unwrap().is_null());
    assert!(plist(&mem, sym).unwrap().is_null());

    let forty_two = mem.alloc_fixnum(42);
    let props = mem.alloc_cons(NodeRef::NULL, NodeRef::NULL);
    assert_eq!(set(&mut mem, sym, forty_two).unwrap(), sym);
    set_plist(&mut mem, sym, props).unwrap();

    assert_eq!(value(&mem, sym).unwrap(), forty_two);
    assert_eq!(plist(&mem, sym).unwrap(), props);

    // rebinding the value leaves the plist alone
    let other = mem.alloc_fixnum(43);
    set(&mut mem, sym, other).unwrap();
    assert_eq!(plist(&mem, sym).unwrap(), props);
}

#[test]
fn frame_access_checks_bounds() {
    let mut mem = setup();
    let env = mem.alloc_environment(2, NodeRef::NULL, NodeRef::NULL);
    let item = mem.alloc_fixnum(9);

    assert!(fref(&mem, env, 0).unwrap().is_null());
    fset(&mut mem, env, 1, item).unwrap();
    assert_eq!(fref(&mem, env, 1).unwrap(), item);

    assert_eq!(
        fref(&mem, env, 2).unwrap_err(),
        SevereError::FrameIndex {
            index: 2,
            nslots: 2
        }
    );
    assert!(fset(&mut mem, item, 0, env).is_err());
    assert!(env_base(&mem, env).unwrap().is_null());
}

#[test]
fn closure_accessors() {
    let mut mem = setup();
    let code = mem.alloc_fixnum(0);
    let env = mem.alloc_environment(0, NodeRef::NULL, NodeRef::NULL);
    let closure = mem.alloc_closure(code, env);

    assert_eq!(closure_code(&mem, closure).unwrap(), code);
    assert_eq!(closure_benv(&mem, closure).unwrap(), env);
    assert!(closure_vars(&mem, closure).unwrap().is_null());

    let formals = mem.alloc_cons(NodeRef::NULL, NodeRef::NULL);
    set_closure_vars(&mut mem, closure, formals).unwrap();
    assert_eq!(closure_vars(&mem, closure).unwrap(), formals);

    set_closure_numv(&mut mem, closure, 2).unwrap();
    assert_eq!(closure_numv(&mem, closure).unwrap(), 2);

    assert!(closure_code(&mem, code).is_err());
}

#[test]
fn promise_and_continuation_accessors() {
    let mut mem = setup();
    let exp = mem.alloc_fixnum(1);
    let promise = mem.alloc_promise(exp);
    assert_eq!(promise_exp(&mem, promise).unwrap(), exp);
    assert!(promise_val(&mem, promise).unwrap().is_null());

    let val = mem.alloc_fixnum(2);
    set_promise_val(&mut mem, promise, val).unwrap();
    assert_eq!(promise_val(&mem, promise).unwrap(), val);

    let cont = mem.alloc_continuation();
    assert!(cont_state(&mem, cont).unwrap().is_null());
}

#[test]
fn reference_accessors() {
    let mut mem = setup();
    let regstack = NodeStack::new("register", REGSTACK_SIZE);
    let sym = mem.alloc_symbol("global", &regstack);
    let gref = mem.alloc_gref(sym);
    assert_eq!(gref_symbol(&mem, gref).unwrap(), sym);

    let fref_node = mem.alloc_fref(2, 5);
    assert_eq!(fref_depth(&mem, fref_node).unwrap(), 2);
    assert_eq!(fref_index(&mem, fref_node).unwrap(), 5);
}

#[test]
fn port_mode_accessor() {
    let mut mem = setup();
    let port = mem.alloc_string_port_empty(PORT_INPUT);
    assert_eq!(port_mode(&mem, port).unwrap(), PORT_INPUT);

    let not_a_port = mem.alloc_fixnum(1);
    assert_eq!(
        port_mode(&mem, not_a_port).unwrap_err(),
        SevereError::WrongType {
            expected: "port or stringport",
            got: not_a_port
        }
    );
}

#[test]
fn numbers_read_back() {
    let mut mem = setup();
    let five = mem.alloc_fixnum(5);
    let half = mem.alloc_flonum(0.5);
    let ch = mem.alloc_char(b'a');

    assert_eq!(fixnum(&mem, five).unwrap(), 5);
    assert!((flonum(&mem, half).unwrap() - 0.5).abs() < f64::EPSILON);
    assert_eq!(char_value(&mem, ch).unwrap(), b'a');
    assert!(fixnum(&mem, half).is_err());
    assert!(flonum(&mem, five).is_err());
}

proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

    #[test]
    fn list_length_matches_the_construction(len in 0u32..200) {
        let mut mem = setup();
        let mut head = NodeRef::NULL;
        for _ in 0..len {
            head = mem.alloc_cons(NodeRef::NULL, head);
        }
        proptest::prop_assert_eq!(list_length(&mem, head), len);
    }
}

#[test]
fn describe_renders_kind_and_name() {
    let mut mem = setup();
    let regstack = NodeStack::new("register", REGSTACK_SIZE);

    assert_eq!(describe(&mem, NodeRef::NULL), "null");

    let sym = mem.alloc_symbol("lambda", &regstack);
    let description = describe(&mem, sym);
    assert!(description.starts_with("symbol("));
    assert!(description.ends_with("[lambda]"));

    let pair = mem.alloc_cons(NodeRef::NULL, NodeRef::NULL);
    assert!(describe(&mem, pair).starts_with("cons("));
    assert_eq!(mem.kind(pair), NodeKind::Cons);
}
