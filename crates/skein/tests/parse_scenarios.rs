//! End-to-end coverage of the scenarios `SPEC_FULL.md` §8 names explicitly,
//! driven entirely through the public `Interpreter::eval_str` surface rather
//! than any one module's internals — the same path `skein-repl` drives per
//! REPL line.

use pretty_assertions::assert_eq;
use skein::{Interpreter, NoPrint, Value};

#[test]
fn object_construction_is_selfish() {
    let mut interp = Interpreter::new();
    let mut writer = NoPrint;
    let result = interp.eval_str(&mut writer, "make _ [a: 10 b: 20]").unwrap();
    let Value::Context { id, .. } = result else { panic!("expected a context") };

    let record = interp.store().get(id);
    // root self-cell, hidden SELF key, a, b
    assert_eq!(interp.series().len(record.varlist), 4);

    interp.eval_str(&mut writer, "obj: make _ [a: 10 b: 20]").unwrap();
    let a = interp.eval_str(&mut writer, "obj/a").unwrap();
    assert_eq!(a, Value::Integer(10));
}

#[test]
fn child_object_does_not_alias_the_parent() {
    let mut interp = Interpreter::new();
    let mut writer = NoPrint;
    interp.eval_str(&mut writer, "parent: make _ [x: 1 y: 2]").unwrap();
    interp.eval_str(&mut writer, "child: make parent [y: 20 z: 3]").unwrap();

    let child_y = interp.eval_str(&mut writer, "child/y").unwrap();
    assert_eq!(child_y, Value::Integer(20));
    let child_z = interp.eval_str(&mut writer, "child/z").unwrap();
    assert_eq!(child_z, Value::Integer(3));

    // The copy-on-write expansion that gave `child` its own `z` slot must not
    // have reached back into `parent`'s keylist/varlist.
    let parent_y = interp.eval_str(&mut writer, "parent/y").unwrap();
    assert_eq!(parent_y, Value::Integer(2));
}

#[test]
fn simple_parse_match_runs_to_the_end_of_input() {
    let mut interp = Interpreter::new();
    let mut writer = NoPrint;
    let result = interp.eval_str(&mut writer, r#"parse "aaabbb" [some "a" some "b" end]"#).unwrap();
    assert_eq!(result, Value::Logic(true));
}

#[test]
fn parse_capture_and_alternation_over_a_block() {
    let mut interp = Interpreter::new();
    let mut writer = NoPrint;
    let result = interp
        .eval_str(&mut writer, r#"parse [1 "x" 2 "y"] [some [copy pair [integer! string!]]]"#)
        .unwrap();
    assert_eq!(result, Value::Logic(true));

    let pair = interp.eval_str(&mut writer, "pair").unwrap();
    let Value::Block(pos) = pair else { panic!("expected the last capture to be a block") };
    assert_eq!(interp.series().len(pos.series), 2);
}

#[test]
fn parse_return_from_a_group_escapes_with_its_value() {
    let mut interp = Interpreter::new();
    let mut writer = NoPrint;
    let result = interp.eval_str(&mut writer, r#"parse "1020" [(return 42) not-seen]"#).unwrap();
    assert_eq!(result, Value::Integer(42));
}

#[test]
fn parse_reject_in_a_nested_rule_fails_the_whole_match() {
    let mut interp = Interpreter::new();
    let mut writer = NoPrint;
    let result = interp.eval_str(&mut writer, r#"parse "abc" [some [["a" | "b" | reject] skip]]"#).unwrap();
    assert_eq!(result, Value::Logic(false));
}
