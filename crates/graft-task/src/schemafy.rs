//! # Schemafy Task
//!
//! A task that runs its subtree and then applies a held schema to a target,
//! recording the verdict in its own `valid` field.
//!
//! The target is the object in the task's `target` field when set, else the
//! reply object. Any fault (a failing subtree, a missing schema, a dangling
//! target) records `valid = false`; the task never raises to its caller.

use graft_core::{Document, Function, ObjectBuilder, ObjectError, ObjectId, ReturnClass, Value};

use crate::scheduler::{TaskError, RUN_METHOD, TASK_CAPABILITY};
use crate::task::TaskEngine;

/// Capability tag identifying schemafy tasks.
pub const SCHEMAFY_CAPABILITY: &str = "schemafy";

/// Field holding the schema object to apply.
pub const SCHEMA_FIELD: &str = "schema";

/// Field holding the optional explicit target object.
pub const TARGET_FIELD: &str = "target";

/// Field recording the outcome of the last run.
pub const VALID_FIELD: &str = "valid";

/// Declares schemafy tasks.
#[derive(Debug, Clone, Default)]
pub struct Schemafy {
    engine: TaskEngine,
}

impl Schemafy {
    /// Schemafy tasks whose subtrees run on `engine`.
    pub fn new(engine: TaskEngine) -> Self {
        Self { engine }
    }

    /// Turn an object under construction into a schemafy task.
    ///
    /// With `target` unset the reply object is validated.
    pub fn declare<'d>(
        &self,
        builder: ObjectBuilder<'d>,
        schema: ObjectId,
        target: Option<ObjectId>,
    ) -> ObjectBuilder<'d> {
        builder
            .tag(TASK_CAPABILITY)
            .tag(SCHEMAFY_CAPABILITY)
            .field(SCHEMA_FIELD, schema)
            .field(TARGET_FIELD, target)
            .field(VALID_FIELD, false)
            .function(self.run_method())
    }

    /// The schemafy `run` method.
    pub fn run_method(&self) -> Function {
        let engine = self.engine.clone();
        Function::new(RUN_METHOD, 1, ReturnClass::Void, move |doc, inv| {
            let task = inv.require_receiver()?;
            let reply = inv.object_arg(0)?;

            let valid = match engine.base_run(doc, task, reply) {
                Ok(()) => match apply_held_schema(doc, task, reply) {
                    Ok(valid) => valid,
                    Err(error) => {
                        tracing::warn!(%task, %error, "schemafy could not apply its schema");
                        false
                    }
                },
                Err(error) => {
                    tracing::warn!(%task, %error, "schemafy subtree failed");
                    false
                }
            };

            if let Err(error) = doc.set(task, VALID_FIELD, Value::Bool(valid)) {
                tracing::warn!(%task, %error, "schemafy could not record its verdict");
            }
            tracing::debug!(%task, valid, "schemafy finished");
            Ok(Value::Null)
        })
    }

    /// Verdict recorded by the last run; `false` before any run.
    pub fn valid(doc: &Document, task: ObjectId) -> bool {
        doc.get(task, VALID_FIELD)
            .ok()
            .flatten()
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn apply_held_schema(doc: &mut Document, task: ObjectId, reply: ObjectId) -> Result<bool, TaskError> {
    let schema = doc.value(task, SCHEMA_FIELD)?;
    let schema = schema.as_object().ok_or(ObjectError::NotAnObject {
        found: schema.type_name(),
    })?;
    let target = doc
        .value(task, TARGET_FIELD)?
        .as_object()
        .unwrap_or(reply);
    if !doc.contains(target) {
        return Err(ObjectError::Dangling(target).into());
    }
    Ok(graft_schema::apply(doc, schema, target))
}
