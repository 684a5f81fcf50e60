//! Integration tests: task tree execution.
//!
//! Covers sibling ordering, the child-first recursive walk, tagged actions,
//! overriding `run`, error propagation, the nesting guard, and the schemafy
//! task's verdicts.

use graft_core::{
    Document, EngineConfig, Function, FunctionError, ObjectBuilder, ObjectId, ReturnClass, Value,
};
use graft_schema::{chain, library, SCHEMA_ATTRIBUTE};
use graft_task::{
    Schemafy, TaskEngine, TaskError, ORDER_ATTRIBUTE, RUN_ATTRIBUTE, RUN_METHOD,
};
use proptest::prelude::*;

// ─── Helpers ────────────────────────────────────────────────────────

/// Append `entry` to the reply's `log` list.
fn push(doc: &mut Document, reply: ObjectId, entry: &str) -> Result<(), FunctionError> {
    let mut log = match doc.value(reply, "log")? {
        Value::Vec(items) => items,
        _ => Vec::new(),
    };
    log.push(Value::from(entry));
    doc.set(reply, "log", Value::Vec(log))?;
    Ok(())
}

fn entries(doc: &Document, reply: ObjectId) -> Vec<String> {
    match doc.value(reply, "log").unwrap() {
        Value::Vec(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn body(engine: &TaskEngine, label: impl Into<String>) -> Function {
    let label = label.into();
    engine.run_method(move |doc, _, reply| push(doc, reply, &label))
}

fn logging_task<'d>(
    engine: &TaskEngine,
    builder: ObjectBuilder<'d>,
    label: impl Into<String>,
) -> ObjectBuilder<'d> {
    engine.declare(builder).function(body(engine, label))
}

/// A `run`-tagged action logging its own name.
fn action(name: &'static str, order: i64) -> Function {
    Function::new(name, 1, ReturnClass::Void, move |doc, inv| {
        let reply = inv.object_arg(0)?;
        push(doc, reply, name)?;
        Ok(Value::Null)
    })
    .with_attribute(RUN_ATTRIBUTE, order)
}

fn field_object(doc: &Document, id: ObjectId, field: &str) -> ObjectId {
    doc.value(id, field).unwrap().as_object().unwrap()
}

// ─── Ordering ───────────────────────────────────────────────────────

#[test]
fn siblings_run_in_stable_order() {
    let engine = TaskEngine::default();
    let mut doc = Document::new();
    let root = doc
        .build(None)
        .child("a", |b| logging_task(&engine, b, "a"))
        .attr(ORDER_ATTRIBUTE, 1)
        .child("b", |b| logging_task(&engine, b, "b"))
        .attr(ORDER_ATTRIBUTE, 0)
        .child("c", |b| logging_task(&engine, b, "c"))
        .attr(ORDER_ATTRIBUTE, 1)
        .finish();
    let reply = doc.create(None);

    engine.run(&mut doc, root, reply).unwrap();
    assert_eq!(entries(&doc, reply), vec!["b", "a", "c"]);
}

#[test]
fn children_finish_before_bodies_at_every_level() {
    let engine = TaskEngine::default();
    let mut doc = Document::new();
    let root = doc
        .build(None)
        .function(
            engine
                .scheduler()
                .wrap("wrapped", |doc, _, reply| push(doc, reply, "wrapped-fn")),
        )
        .child("main", |b| {
            engine
                .declare(b)
                .child("first", |b| {
                    engine
                        .declare(b)
                        .child("sub_sub_a", |b| logging_task(&engine, b, "sub-sub-a"))
                        .attr(ORDER_ATTRIBUTE, 1)
                        .child("sub_sub_b", |b| logging_task(&engine, b, "sub-sub-b"))
                        .attr(ORDER_ATTRIBUTE, 0)
                        .function(body(&engine, "first-body"))
                })
                .attr(ORDER_ATTRIBUTE, 0)
                .child("second", |b| logging_task(&engine, b, "second"))
                .attr(ORDER_ATTRIBUTE, 1)
                .function(body(&engine, "main-body"))
        })
        .finish();
    let reply = doc.create(None);

    doc.call_method(root, "wrapped", vec![reply.into()]).unwrap();
    assert_eq!(
        entries(&doc, reply),
        vec!["sub-sub-b", "sub-sub-a", "first-body", "second", "main-body", "wrapped-fn"]
    );
}

#[test]
fn rerunning_a_finished_tree_starts_fresh() {
    let engine = TaskEngine::default();
    let mut doc = Document::new();
    let root = doc
        .build(None)
        .child("only", |b| logging_task(&engine, b, "only"))
        .finish();
    let reply = doc.create(None);

    engine.run(&mut doc, root, reply).unwrap();
    engine.run(&mut doc, root, reply).unwrap();
    assert_eq!(entries(&doc, reply), vec!["only", "only"]);
}

// ─── Actions and overrides ──────────────────────────────────────────

#[test]
fn tagged_actions_run_in_order_before_run() {
    let engine = TaskEngine::default();
    let mut doc = Document::new();
    let tick = Function::new("tick", 0, ReturnClass::Void, |doc, inv| {
        let task = inv.require_receiver()?;
        doc.set(task, "ticked", Value::from(true))?;
        Ok(Value::Null)
    })
    .with_attribute(RUN_ATTRIBUTE, Value::Null);
    let root = doc
        .build(None)
        .child("job", |b| {
            engine
                .declare(b)
                .function(action("late", 2))
                .function(action("early", 1))
                .function(tick)
                .function(body(&engine, "body"))
        })
        .finish();
    let reply = doc.create(None);

    engine.run(&mut doc, root, reply).unwrap();
    assert_eq!(entries(&doc, reply), vec!["early", "late", "body"]);
    let job = field_object(&doc, root, "job");
    assert_eq!(doc.value(job, "ticked").unwrap(), Value::from(true));
}

#[test]
fn tagged_run_method_is_not_invoked_twice() {
    let engine = TaskEngine::default();
    let mut doc = Document::new();
    let root = doc
        .build(None)
        .child("job", |b| {
            engine
                .declare(b)
                .child("kid", |b| logging_task(&engine, b, "kid"))
                .function(action("after", 1))
                .function(body(&engine, "body").with_attribute(RUN_ATTRIBUTE, 0))
        })
        .finish();
    let reply = doc.create(None);

    engine.run(&mut doc, root, reply).unwrap();
    assert_eq!(entries(&doc, reply), vec!["kid", "body", "after"]);
}

#[test]
fn override_without_base_run_prunes_the_subtree() {
    let engine = TaskEngine::default();
    let mut doc = Document::new();
    let pruning = Function::new(RUN_METHOD, 1, ReturnClass::Void, |doc, inv| {
        let reply = inv.object_arg(0)?;
        push(doc, reply, "override")?;
        Ok(Value::Null)
    });
    let task = engine
        .declare(doc.build(None))
        .child("kid", |b| logging_task(&engine, b, "kid"))
        .function(pruning)
        .finish();
    let reply = doc.create(None);

    engine.run(&mut doc, task, reply).unwrap();
    assert_eq!(entries(&doc, reply), vec!["override"]);
}

#[test]
fn override_calling_base_run_keeps_the_subtree() {
    let engine = TaskEngine::default();
    let inner = engine.clone();
    let mut doc = Document::new();
    let keeping = Function::new(RUN_METHOD, 1, ReturnClass::Void, move |doc, inv| {
        let task = inv.require_receiver()?;
        let reply = inv.object_arg(0)?;
        inner.base_run(doc, task, reply)?;
        push(doc, reply, "override")?;
        Ok(Value::Null)
    });
    let task = engine
        .declare(doc.build(None))
        .child("kid", |b| logging_task(&engine, b, "kid"))
        .function(keeping)
        .finish();
    let reply = doc.create(None);

    engine.run(&mut doc, task, reply).unwrap();
    assert_eq!(entries(&doc, reply), vec!["kid", "override"]);
}

// ─── Faults ─────────────────────────────────────────────────────────

#[test]
fn action_errors_abort_the_run() {
    let engine = TaskEngine::default();
    let mut doc = Document::new();
    let root = doc
        .build(None)
        .child("bad", |b| {
            engine
                .declare(b)
                .function(engine.run_method(|_, _, _| Err(FunctionError::failed("disk full"))))
        })
        .child("after", |b| logging_task(&engine, b, "after"))
        .attr(ORDER_ATTRIBUTE, 1)
        .finish();
    let reply = doc.create(None);
    let bad = field_object(&doc, root, "bad");

    let err = engine.run(&mut doc, root, reply).unwrap_err();
    match err {
        TaskError::Action { task, name, source } => {
            assert_eq!(task, bad);
            assert_eq!(name, RUN_METHOD);
            assert_eq!(source, FunctionError::failed("disk full"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(entries(&doc, reply).is_empty());
}

#[test]
fn nested_failures_name_the_failing_task() {
    let engine = TaskEngine::default();
    let mut doc = Document::new();
    let root = doc
        .build(None)
        .child("outer", |b| {
            engine.declare(b).child("bad", |b| {
                engine
                    .declare(b)
                    .function(engine.run_method(|_, _, _| Err(FunctionError::failed("disk full"))))
            })
        })
        .finish();
    let outer = field_object(&doc, root, "outer");
    let bad = field_object(&doc, outer, "bad");
    let reply = doc.create(None);

    let err = engine.run(&mut doc, root, reply).unwrap_err();
    match err {
        TaskError::Action { task, name, source } => {
            assert_eq!(task, bad, "error attributed to {task}, failing task is {bad}");
            assert_eq!(name, RUN_METHOD);
            assert_eq!(source, FunctionError::failed("disk full"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Same attribution when the root itself has a wrapped `run`.
    engine.make_task(&mut doc, root).unwrap();
    let err = engine.run(&mut doc, root, reply).unwrap_err();
    assert!(matches!(err, TaskError::Action { task, .. } if task == bad), "got {err}");
}

#[test]
fn cyclic_tree_hits_the_depth_limit() {
    let config = EngineConfig::from_yaml_str("scheduler:\n  max_depth: 8\n").unwrap();
    let engine = TaskEngine::new(&config);
    let mut doc = Document::new();
    let looped = doc.create(None);
    engine.make_task(&mut doc, looped).unwrap();
    doc.set(looped, "again", Value::Object(looped)).unwrap();
    let reply = doc.create(None);

    let err = engine.run(&mut doc, looped, reply).unwrap_err();
    assert!(matches!(err, TaskError::DepthExceeded(8)), "got {err}");

    // The nesting counter is released after the failure.
    doc.remove(looped, "again").unwrap();
    engine.run(&mut doc, looped, reply).unwrap();
}

// ─── Schemafy ───────────────────────────────────────────────────────

fn status_schema(doc: &mut Document) -> ObjectId {
    doc.build(None)
        .field("status", Value::Null)
        .attr(SCHEMA_ATTRIBUTE, chain([library::required(), library::is_string()]))
        .finish()
}

fn producer<'d>(engine: &TaskEngine, builder: ObjectBuilder<'d>, status: Value) -> ObjectBuilder<'d> {
    engine.declare(builder).function(engine.run_method(move |doc, _, reply| {
        doc.set(reply, "status", status.clone())?;
        Ok(())
    }))
}

#[test]
fn schemafy_validates_the_reply_after_its_subtree() {
    let engine = TaskEngine::default();
    let schemafy = Schemafy::new(engine.clone());
    let mut doc = Document::new();
    let schema = status_schema(&mut doc);
    let root = doc
        .build(None)
        .child("check", |b| {
            schemafy
                .declare(b, schema, None)
                .child("produce", |b| producer(&engine, b, Value::from("ok")))
        })
        .finish();
    let reply = doc.create(None);

    engine.run(&mut doc, root, reply).unwrap();
    let check = field_object(&doc, root, "check");
    assert!(Schemafy::valid(&doc, check));
    assert_eq!(doc.value(reply, "status").unwrap(), Value::from("ok"));
}

#[test]
fn schemafy_records_invalid_and_strips_the_field() {
    let engine = TaskEngine::default();
    let schemafy = Schemafy::new(engine.clone());
    let mut doc = Document::new();
    let schema = status_schema(&mut doc);
    let root = doc
        .build(None)
        .child("check", |b| {
            schemafy
                .declare(b, schema, None)
                .child("produce", |b| producer(&engine, b, Value::from(5)))
        })
        .child("after", |b| logging_task(&engine, b, "after"))
        .attr(ORDER_ATTRIBUTE, 1)
        .finish();
    let reply = doc.create(None);

    engine.run(&mut doc, root, reply).unwrap();
    let check = field_object(&doc, root, "check");
    assert!(!Schemafy::valid(&doc, check));
    assert!(!doc.has_field(reply, "status").unwrap());
    assert_eq!(entries(&doc, reply), vec!["after"]);
}

#[test]
fn schemafy_prefers_an_explicit_target() {
    let engine = TaskEngine::default();
    let schemafy = Schemafy::new(engine.clone());
    let mut doc = Document::new();
    let schema = status_schema(&mut doc);
    let target = doc.build(None).field("status", 3).finish();
    let check = schemafy.declare(doc.build(None), schema, Some(target)).finish();
    let reply = doc.build(None).field("status", "untouched").finish();

    engine.run(&mut doc, check, reply).unwrap();
    assert!(!Schemafy::valid(&doc, check));
    assert!(!doc.has_field(target, "status").unwrap());
    assert_eq!(doc.value(reply, "status").unwrap(), Value::from("untouched"));

    doc.set(target, "status", Value::from("fixed")).unwrap();
    engine.run(&mut doc, check, reply).unwrap();
    assert!(Schemafy::valid(&doc, check));
}

#[test]
fn schemafy_absorbs_subtree_failures() {
    let engine = TaskEngine::default();
    let schemafy = Schemafy::new(engine.clone());
    let mut doc = Document::new();
    let schema = status_schema(&mut doc);
    let check = schemafy
        .declare(doc.build(None), schema, None)
        .child("boom", |b| {
            engine
                .declare(b)
                .function(engine.run_method(|_, _, _| Err(FunctionError::failed("boom"))))
        })
        .finish();
    let reply = doc.build(None).field("status", "ok").finish();

    engine.run(&mut doc, check, reply).unwrap();
    assert!(!Schemafy::valid(&doc, check));
}

// ─── Properties ─────────────────────────────────────────────────────

proptest! {
    /// Children run sorted by `order`, ties in declaration order.
    #[test]
    fn children_follow_a_stable_sort_on_order(orders in prop::collection::vec(-3i64..3, 0..8)) {
        let engine = TaskEngine::default();
        let mut doc = Document::new();
        let mut builder = doc.build(None);
        for (i, order) in orders.iter().enumerate() {
            let name = format!("t{i}");
            builder = builder
                .child(&name, |b| logging_task(&engine, b, name.clone()))
                .attr(ORDER_ATTRIBUTE, *order);
        }
        let root = builder.finish();
        let reply = doc.create(None);

        engine.run(&mut doc, root, reply).unwrap();

        let mut expected: Vec<(i64, String)> = orders
            .iter()
            .enumerate()
            .map(|(i, order)| (*order, format!("t{i}")))
            .collect();
        expected.sort_by_key(|(order, _)| *order);
        let expected: Vec<String> = expected.into_iter().map(|(_, name)| name).collect();
        prop_assert_eq!(entries(&doc, reply), expected);
    }
}
