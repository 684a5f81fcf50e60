//! # Argument Binding
//!
//! Chain functions declare 0 to 4 parameters and receive the most specific
//! subset of the chain context that fits:
//!
//! | Arity | Arguments                          |
//! |-------|------------------------------------|
//! | 0     | —                                  |
//! | 1     | value                              |
//! | 2     | target, value                      |
//! | 3     | target, field, value               |
//! | 4     | target, schema, field, value       |
//!
//! The table is keyed by [`Arity`]; no runtime introspection is involved
//! beyond the declared parameter count.

use graft_core::{ObjectId, Value};

use crate::engine::SchemaError;

/// Supported chain function arities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// No arguments.
    Nullary,
    /// `(value)`.
    Unary,
    /// `(target, value)`.
    Binary,
    /// `(target, field, value)`.
    Ternary,
    /// `(target, schema, field, value)`.
    Quaternary,
}

/// One context value a chain function may receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The object being validated.
    Target,
    /// The schema object declaring the field.
    Schema,
    /// The field name, as a string.
    Field,
    /// The current boxed value.
    Value,
}

impl Arity {
    /// The arity for a declared parameter count, `None` above four.
    pub fn from_params(params: usize) -> Option<Self> {
        match params {
            0 => Some(Self::Nullary),
            1 => Some(Self::Unary),
            2 => Some(Self::Binary),
            3 => Some(Self::Ternary),
            4 => Some(Self::Quaternary),
            _ => None,
        }
    }

    /// The context slots bound for this arity, in argument order.
    pub fn slots(self) -> &'static [Slot] {
        match self {
            Self::Nullary => &[],
            Self::Unary => &[Slot::Value],
            Self::Binary => &[Slot::Target, Slot::Value],
            Self::Ternary => &[Slot::Target, Slot::Field, Slot::Value],
            Self::Quaternary => &[Slot::Target, Slot::Schema, Slot::Field, Slot::Value],
        }
    }
}

/// The context available to one chain step.
#[derive(Debug, Clone, Copy)]
pub struct ChainContext<'a> {
    /// Object being validated.
    pub target: ObjectId,
    /// Schema declaring the field.
    pub schema: ObjectId,
    /// Field name.
    pub field: &'a str,
    /// Box contents at the start of the step.
    pub value: &'a Value,
}

impl ChainContext<'_> {
    fn slot(&self, slot: Slot) -> Value {
        match slot {
            Slot::Target => Value::Object(self.target),
            Slot::Schema => Value::Object(self.schema),
            Slot::Field => Value::Str(self.field.to_string()),
            Slot::Value => self.value.clone(),
        }
    }
}

/// Build the argument list for a function named `name` declaring `params`.
pub fn bind(name: &str, params: usize, ctx: &ChainContext<'_>) -> Result<Vec<Value>, SchemaError> {
    let arity = Arity::from_params(params).ok_or_else(|| SchemaError::UnsupportedArity {
        name: name.to_string(),
        params,
    })?;
    Ok(arity.slots().iter().map(|slot| ctx.slot(*slot)).collect())
}
