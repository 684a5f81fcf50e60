//! # Schema Application
//!
//! Validates and transforms the fields of a target object against the
//! `schema` attributes declared on a schema object.
//!
//! ## Constraint Shapes
//!
//! The `schema` attribute of a schema field is one of:
//!
//! - absent or null: the field is unconstrained;
//! - an object: a nested schema, delegated to for the same field name;
//! - a function: a one-entry validator chain;
//! - a sequence of functions and nested schemas: a validator chain.
//!
//! ## Failure Policy
//!
//! A validation failure short-circuits only the chain of the current field.
//! Execution faults (function errors, malformed constraints, dangling
//! objects) are caught at the [`apply_field`] boundary, logged, and reported
//! as `false`. [`apply`] always visits every schema field and strips every
//! field that failed, so the target is never left holding invalid data.

use graft_core::{
    Document, FunctionError, FunctionRef, ObjectError, ObjectId, ReturnClass, Value, ValueBox,
};
use thiserror::Error;

use crate::dispatch::{self, ChainContext};

/// Attribute name carrying a field's constraint.
pub const SCHEMA_ATTRIBUTE: &str = "schema";

/// Maximum nesting of schema delegation before the field is rejected.
pub const MAX_DELEGATION_DEPTH: usize = 64;

/// Execution faults raised while applying a field constraint.
///
/// These never escape [`apply`] or [`apply_field`]; they are converted into
/// a failed field and logged.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Arena access failed.
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// A chain function raised an error.
    #[error("chain function `{name}` failed on field `{field}`: {source}")]
    Invocation {
        /// Chain function name.
        name: String,
        /// Field under validation.
        field: String,
        /// The function's own error.
        #[source]
        source: FunctionError,
    },

    /// The `schema` attribute had a shape that is not a constraint.
    #[error("field `{field}` has an invalid constraint of type {found}")]
    InvalidConstraint {
        /// Schema field carrying the attribute.
        field: String,
        /// Type name of the attribute value.
        found: &'static str,
    },

    /// A chain element was neither a function nor a nested schema.
    #[error("field `{field}` chain entry {index} is a {found}, expected a function or schema")]
    InvalidChainEntry {
        /// Schema field carrying the chain.
        field: String,
        /// Position of the entry in the chain.
        index: usize,
        /// Type name of the entry.
        found: &'static str,
    },

    /// A chain function declared more parameters than can be bound.
    #[error("chain function `{name}` declares {params} parameters; at most 4 are supported")]
    UnsupportedArity {
        /// Chain function name.
        name: String,
        /// Declared parameter count.
        params: usize,
    },

    /// A bool-class function returned something other than a bool.
    #[error("predicate `{name}` returned {found} instead of a bool")]
    NonBoolVerdict {
        /// Predicate name.
        name: String,
        /// Type name of the returned value.
        found: &'static str,
    },

    /// Nested schemas delegated to each other too deeply (likely a cycle).
    #[error("schema delegation for field `{field}` exceeded depth {depth}")]
    DelegationTooDeep {
        /// Field being delegated.
        field: String,
        /// The depth limit that was hit.
        depth: usize,
    },
}

/// One element of a validator chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEntry {
    /// A function invoked with the arguments its arity selects.
    Function(FunctionRef),
    /// A nested schema applied to the same field.
    Schema(ObjectId),
}

impl From<FunctionRef> for ChainEntry {
    fn from(function: FunctionRef) -> Self {
        Self::Function(function)
    }
}

impl From<ObjectId> for ChainEntry {
    fn from(schema: ObjectId) -> Self {
        Self::Schema(schema)
    }
}

impl From<ChainEntry> for Value {
    fn from(entry: ChainEntry) -> Self {
        match entry {
            ChainEntry::Function(function) => Value::Function(function),
            ChainEntry::Schema(schema) => Value::Object(schema),
        }
    }
}

/// Build a `schema` attribute value from chain entries.
pub fn chain<I, E>(entries: I) -> Value
where
    I: IntoIterator<Item = E>,
    E: Into<ChainEntry>,
{
    Value::Vec(
        entries
            .into_iter()
            .map(|entry| Value::from(Into::<ChainEntry>::into(entry)))
            .collect(),
    )
}

/// The decoded constraint of one schema field.
#[derive(Debug, Clone, PartialEq)]
enum Constraint {
    Unconstrained,
    Delegate(ObjectId),
    Chain(Vec<ChainEntry>),
}

impl Constraint {
    fn read(doc: &Document, schema: ObjectId, field: &str) -> Result<Self, SchemaError> {
        let Some(value) = doc.attribute(schema, field, SCHEMA_ATTRIBUTE)? else {
            return Ok(Self::Unconstrained);
        };
        match value {
            Value::Null => Ok(Self::Unconstrained),
            Value::Object(nested) => Ok(Self::Delegate(*nested)),
            Value::Function(function) => Ok(Self::Chain(vec![ChainEntry::Function(
                function.clone(),
            )])),
            Value::Vec(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Function(function) => Ok(ChainEntry::Function(function.clone())),
                    Value::Object(nested) => Ok(ChainEntry::Schema(*nested)),
                    other => Err(SchemaError::InvalidChainEntry {
                        field: field.to_string(),
                        index,
                        found: other.type_name(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Chain),
            other => Err(SchemaError::InvalidConstraint {
                field: field.to_string(),
                found: other.type_name(),
            }),
        }
    }
}

/// Outcome of [`apply_report`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyReport {
    /// Whether every schema field passed.
    pub valid: bool,
    /// Fields that failed and were stripped from the target, in schema order.
    pub removed: Vec<String>,
}

/// Apply `schema` to `target`, returning overall validity.
///
/// Every field declared on `schema` is processed in declaration order, even
/// after a failure. Failed fields are removed from `target`.
pub fn apply(doc: &mut Document, schema: ObjectId, target: ObjectId) -> bool {
    apply_report(doc, schema, target).valid
}

/// Like [`apply`], also naming the fields that were stripped.
pub fn apply_report(doc: &mut Document, schema: ObjectId, target: ObjectId) -> ApplyReport {
    let fields = match doc.field_names(schema) {
        Ok(fields) => fields,
        Err(error) => {
            tracing::warn!(%schema, %target, %error, "schema object is not readable");
            return ApplyReport::default();
        }
    };

    let mut report = ApplyReport {
        valid: true,
        removed: Vec::new(),
    };
    for field in fields {
        if apply_field(doc, schema, target, &field) {
            continue;
        }
        report.valid = false;
        if let Err(error) = doc.remove(target, &field) {
            tracing::warn!(%target, field = %field, %error, "could not strip invalid field");
        }
        report.removed.push(field);
    }
    tracing::debug!(%schema, %target, valid = report.valid, removed = report.removed.len(), "schema applied");
    report
}

/// Apply the constraint of one schema field to the same field of `target`.
///
/// Returns `true` when the field is valid (or unconstrained). Never fails:
/// execution faults are logged and reported as `false`. The caller decides
/// whether to strip the field; [`apply`] always does.
pub fn apply_field(doc: &mut Document, schema: ObjectId, target: ObjectId, field: &str) -> bool {
    match apply_field_at(doc, schema, target, field, 0) {
        Ok(valid) => valid,
        Err(error) => {
            tracing::warn!(%schema, %target, field, %error, "field constraint faulted");
            false
        }
    }
}

fn apply_field_at(
    doc: &mut Document,
    schema: ObjectId,
    target: ObjectId,
    field: &str,
    depth: usize,
) -> Result<bool, SchemaError> {
    if depth > MAX_DELEGATION_DEPTH {
        return Err(SchemaError::DelegationTooDeep {
            field: field.to_string(),
            depth: MAX_DELEGATION_DEPTH,
        });
    }
    match Constraint::read(doc, schema, field)? {
        Constraint::Unconstrained => Ok(true),
        Constraint::Delegate(nested) => apply_field_at(doc, nested, target, field, depth + 1),
        Constraint::Chain(entries) => run_chain(doc, schema, target, field, &entries, depth),
    }
}

fn run_chain(
    doc: &mut Document,
    schema: ObjectId,
    target: ObjectId,
    field: &str,
    entries: &[ChainEntry],
    depth: usize,
) -> Result<bool, SchemaError> {
    let mut slot = ValueBox::new(doc.value(target, field)?);

    for entry in entries {
        slot.begin_step();
        match entry {
            ChainEntry::Function(function) => {
                if !call_step(doc, function, schema, target, field, &mut slot)? {
                    tracing::debug!(%target, field, step = function.name(), "chain rejected value");
                    return Ok(false);
                }
            }
            ChainEntry::Schema(nested) => {
                if !apply_field_at(doc, *nested, target, field, depth + 1)? {
                    return Ok(false);
                }
                slot.reset(doc.value(target, field)?);
            }
        }
    }

    if !slot.is_null() {
        doc.set(target, field, slot.into_inner())?;
    }
    Ok(true)
}

/// Run one function step. Returns `false` only for a rejecting predicate.
fn call_step(
    doc: &mut Document,
    function: &FunctionRef,
    schema: ObjectId,
    target: ObjectId,
    field: &str,
    slot: &mut ValueBox,
) -> Result<bool, SchemaError> {
    let ctx = ChainContext {
        target,
        schema,
        field,
        value: slot.get(),
    };
    let args = dispatch::bind(function.name(), function.params(), &ctx)?;
    let invocation_error = |source| SchemaError::Invocation {
        name: function.name().to_string(),
        field: field.to_string(),
        source,
    };

    let result = doc
        .invoke_with_box(function, None, args, Some(&mut *slot))
        .map_err(invocation_error)?;

    match function.returns() {
        ReturnClass::Bool => match result {
            Value::Bool(verdict) => Ok(verdict),
            other => Err(SchemaError::NonBoolVerdict {
                name: function.name().to_string(),
                found: other.type_name(),
            }),
        },
        ReturnClass::Other => {
            if !result.is_null() && !slot.write(result) {
                return Err(invocation_error(FunctionError::BoxRewritten(
                    function.name().to_string(),
                )));
            }
            Ok(true)
        }
        ReturnClass::Void => Ok(true),
    }
}
