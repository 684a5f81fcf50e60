//! Integration tests: schema application semantics.
//!
//! Covers argument binding per arity, chain short-circuiting, the field
//! removal guarantee, nested schema delegation, defaulting, deletion, and
//! idempotence on already-valid data.

use std::cell::RefCell;
use std::rc::Rc;

use graft_core::{Document, Function, FunctionError, FunctionRef, ObjectId, ReturnClass, Value};
use graft_schema::{
    apply, apply_field, chain, library, ChainEntry, SearchDirection, SCHEMA_ATTRIBUTE,
};
use proptest::prelude::*;

type Log = Rc<RefCell<Vec<String>>>;

/// A function of the given arity that records its arguments and passes.
fn recorder(params: usize, log: &Log) -> FunctionRef {
    let log = Rc::clone(log);
    FunctionRef::new(Function::new(
        format!("rec{params}"),
        params,
        ReturnClass::Bool,
        move |_, inv| {
            let rendered: Vec<String> = inv
                .args()
                .iter()
                .map(|arg| match arg {
                    Value::Object(id) => format!("obj{}", id.index()),
                    Value::Str(s) => format!("str:{s}"),
                    other => format!("{other:?}"),
                })
                .collect();
            log.borrow_mut().push(rendered.join(","));
            Ok(Value::Bool(true))
        },
    ))
}

/// A predicate that records its name when it runs.
fn traced(name: &str, verdict: bool, log: &Log) -> FunctionRef {
    let log = Rc::clone(log);
    let label = name.to_string();
    FunctionRef::new(Function::new(name, 1, ReturnClass::Bool, move |_, _| {
        log.borrow_mut().push(label.clone());
        Ok(Value::Bool(verdict))
    }))
}

fn single_field_schema(doc: &mut Document, field: &str, constraint: Value) -> ObjectId {
    doc.build(None)
        .field(field, Value::Null)
        .attr(SCHEMA_ATTRIBUTE, constraint)
        .finish()
}

#[test]
fn each_arity_receives_its_documented_arguments() {
    let mut doc = Document::new();
    let log: Log = Rc::default();
    let schema = single_field_schema(
        &mut doc,
        "age",
        chain((0..=4).map(|params| recorder(params, &log))),
    );
    let target = doc.build(None).field("age", 30).finish();

    assert!(apply_field(&mut doc, schema, target, "age"));

    let t = format!("obj{}", target.index());
    let s = format!("obj{}", schema.index());
    let v = format!("{:?}", Value::from(30));
    assert_eq!(
        *log.borrow(),
        vec![
            String::new(),
            v.clone(),
            format!("{t},{v}"),
            format!("{t},str:age,{v}"),
            format!("{t},{s},str:age,{v}"),
        ]
    );
}

#[test]
fn false_predicate_stops_the_chain() {
    let mut doc = Document::new();
    let log: Log = Rc::default();
    let schema = single_field_schema(
        &mut doc,
        "x",
        chain([
            traced("first", true, &log),
            traced("second", false, &log),
            traced("third", true, &log),
        ]),
    );
    let target = doc.build(None).field("x", 1).finish();

    assert!(!apply(&mut doc, schema, target));
    assert_eq!(*log.borrow(), vec!["first", "second"]);
    assert!(!doc.has_field(target, "x").unwrap());
}

#[test]
fn failing_field_does_not_stop_later_fields() {
    let mut doc = Document::new();
    let log: Log = Rc::default();
    let schema = doc
        .build(None)
        .field("a", Value::Null)
        .attr(SCHEMA_ATTRIBUTE, traced("a", false, &log))
        .field("b", Value::Null)
        .attr(SCHEMA_ATTRIBUTE, traced("b", true, &log))
        .finish();
    let target = doc.build(None).field("a", 1).field("b", 2).finish();

    assert!(!apply(&mut doc, schema, target));
    assert_eq!(*log.borrow(), vec!["a", "b"]);
    assert_eq!(doc.field_names(target).unwrap(), vec!["b"]);
}

#[test]
fn failed_field_is_removed_even_after_a_transform_set_it() {
    let mut doc = Document::new();
    let schema = single_field_schema(
        &mut doc,
        "x",
        chain([
            library::default(),
            library::transform("stamp", |_| Some(Value::from("stamped"))),
            library::is_number(),
        ]),
    );
    let writer = FunctionRef::new(Function::new("writer", 3, ReturnClass::Void, |doc, inv| {
        let target = inv.object_arg(0)?;
        doc.set(target, "x", Value::from("side effect"))?;
        Ok(Value::Null)
    }));
    let other = single_field_schema(&mut doc, "x", chain([writer, library::is_bool()]));
    let target = doc.build(None).field("x", 1).finish();

    assert!(!apply(&mut doc, schema, target));
    assert!(!doc.has_field(target, "x").unwrap());

    doc.set(target, "x", Value::from(1)).unwrap();
    assert!(!apply(&mut doc, other, target));
    assert!(!doc.has_field(target, "x").unwrap());
}

#[test]
fn faulting_function_fails_closed() {
    let mut doc = Document::new();
    let boom = FunctionRef::new(Function::new("boom", 1, ReturnClass::Bool, |_, _| {
        Err(FunctionError::failed("exploded"))
    }));
    let schema = single_field_schema(&mut doc, "x", boom.into());
    let target = doc.build(None).field("x", 1).field("y", 2).finish();

    assert!(!apply(&mut doc, schema, target));
    assert_eq!(doc.field_names(target).unwrap(), vec!["y"]);
}

#[test]
fn default_then_type_check_fills_missing_field() {
    let mut doc = Document::new();
    let schema = doc
        .build(None)
        .field("retries", 3)
        .attr(SCHEMA_ATTRIBUTE, chain([library::default(), library::is_number()]))
        .field("secret", Value::Null)
        .attr(SCHEMA_ATTRIBUTE, chain([library::delete()]))
        .finish();
    let target = doc.build(None).field("secret", "hunter2").finish();

    assert!(apply(&mut doc, schema, target));
    assert_eq!(doc.value(target, "retries").unwrap(), Value::from(3));
    assert!(!doc.has_field(target, "secret").unwrap());
}

#[test]
fn default_keeps_existing_value() {
    let mut doc = Document::new();
    let schema = single_field_schema(&mut doc, "n", chain([library::default()]));
    doc.set(schema, "n", Value::from(1)).unwrap();
    let target = doc.build(None).field("n", 7).finish();

    assert!(apply(&mut doc, schema, target));
    assert_eq!(doc.value(target, "n").unwrap(), Value::from(7));
}

#[test]
fn missing_field_without_default_is_rejected_by_required() {
    let mut doc = Document::new();
    let schema = single_field_schema(
        &mut doc,
        "name",
        chain([library::default(), library::required()]),
    );
    let target = doc.create(None);
    assert!(!apply(&mut doc, schema, target));
    assert!(!doc.has_field(target, "name").unwrap());
}

#[test]
fn nested_schema_delegates_and_refreshes_the_box() {
    let mut doc = Document::new();
    let inner = doc
        .build(None)
        .field("port", 80)
        .attr(SCHEMA_ATTRIBUTE, chain([library::default()]))
        .finish();
    let outer = single_field_schema(
        &mut doc,
        "port",
        chain([ChainEntry::Schema(inner), ChainEntry::Function(library::is_number())]),
    );
    let target = doc.create(None);

    assert!(apply(&mut doc, outer, target));
    assert_eq!(doc.value(target, "port").unwrap(), Value::from(80));
}

#[test]
fn bare_nested_schema_constraint_delegates() {
    let mut doc = Document::new();
    let inner = single_field_schema(&mut doc, "x", library::is_string().into());
    let outer = single_field_schema(&mut doc, "x", Value::Object(inner));
    let good = doc.build(None).field("x", "ok").finish();
    let bad = doc.build(None).field("x", 5).finish();

    assert!(apply(&mut doc, outer, good));
    assert!(!apply(&mut doc, outer, bad));
    assert!(!doc.has_field(bad, "x").unwrap());
}

#[test]
fn search_fills_from_parent_and_required_guards_misses() {
    let mut doc = Document::new();
    let schema = doc
        .build(None)
        .field("user", Value::Null)
        .attr(
            SCHEMA_ATTRIBUTE,
            chain([
                library::search(&["username"], SearchDirection::Up),
                library::required(),
            ]),
        )
        .finish();
    let root = doc
        .build(None)
        .field("username", "ada")
        .child("request", |b| b)
        .finish();
    let request = doc.value(root, "request").unwrap().as_object().unwrap();
    let orphan = doc.create(None);

    assert!(apply(&mut doc, schema, request));
    assert_eq!(doc.value(request, "user").unwrap(), Value::from("ada"));
    assert!(!apply(&mut doc, schema, orphan));
}

fn leaf_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::from),
        "[a-z]{0,12}".prop_map(Value::Str),
    ]
}

proptest! {
    /// Data that passed once passes again unchanged, and any target reaches
    /// a fixpoint after one repair pass.
    #[test]
    fn apply_is_idempotent_on_valid_data(
        count in leaf_value(),
        label in leaf_value(),
        flag in leaf_value(),
    ) {
        let mut doc = Document::new();
        let schema = doc
            .build(None)
            .field("count", 0)
            .attr(SCHEMA_ATTRIBUTE, chain([library::default(), library::to_number(), library::is_number()]))
            .field("label", "none")
            .attr(SCHEMA_ATTRIBUTE, chain([library::default(), library::is_string()]))
            .field("flag", Value::Null)
            .attr(SCHEMA_ATTRIBUTE, chain([library::is_bool()]))
            .finish();
        let target = doc
            .build(None)
            .field("count", count)
            .field("label", label)
            .field("flag", flag)
            .finish();

        let first_valid = apply(&mut doc, schema, target);
        let first = doc.to_json(target).unwrap();
        let second_valid = apply(&mut doc, schema, target);
        let second = doc.to_json(target).unwrap();
        if first_valid {
            prop_assert!(second_valid);
            prop_assert_eq!(&second, &first);
        }

        let third_valid = apply(&mut doc, schema, target);
        prop_assert_eq!(doc.to_json(target).unwrap(), second);
        prop_assert_eq!(third_valid, second_valid);
    }
}
