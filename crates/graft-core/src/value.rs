//! # Values
//!
//! The variant type stored in object fields, attributes, and passed to
//! reflected functions. Nested objects are referenced by [`ObjectId`]; the
//! arena in [`Document`](crate::Document) owns the objects themselves.

use std::collections::BTreeMap;
use std::fmt;

use crate::function::FunctionRef;

/// Stable index of an object inside a [`Document`](crate::Document) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

impl ObjectId {
    /// The raw arena index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A number with an optional unit label.
///
/// The label is opaque: no unit arithmetic or conversion happens here.
#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    /// Numeric magnitude.
    pub value: f64,
    /// Unit label, `None` for a plain number.
    pub unit: Option<String>,
}

impl Number {
    /// A plain number without a unit.
    pub fn new(value: f64) -> Self {
        Self { value, unit: None }
    }

    /// A number carrying a unit label.
    pub fn with_unit(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: Some(unit.into()),
        }
    }

    /// The value as an integer, when it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        if self.value.fract() == 0.0
            && self.value >= i64::MIN as f64
            && self.value <= i64::MAX as f64
        {
            Some(self.value as i64)
        } else {
            None
        }
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Number with an optional unit label.
    Number(Number),
    /// UTF-8 string.
    Str(String),
    /// Raw byte buffer.
    Bytes(Vec<u8>),
    /// String-keyed mapping, ordered by key.
    Map(BTreeMap<String, Value>),
    /// Unordered collection without duplicates; see [`Value::set`].
    Set(Vec<Value>),
    /// Ordered sequence.
    Vec(Vec<Value>),
    /// Reference to a reflected function.
    Function(FunctionRef),
    /// Reference to an object in the same [`Document`](crate::Document).
    Object(ObjectId),
}

impl Value {
    /// Build a set, dropping duplicate members while keeping first occurrence.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        Value::Set(members)
    }

    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Vec(_) => "vec",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
        }
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean, for [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The number, for [`Value::Number`].
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Integer view of a unit-less or unit-carrying whole number.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }

    /// The string slice, for [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The referenced object id, for [`Value::Object`].
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Element count for collection-like values.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::Map(m) => Some(m.len()),
            Value::Set(items) | Value::Vec(items) => Some(items.len()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(Number::new(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(Number::new(value as f64))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(Number::new(f64::from(value)))
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Vec(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::Object(value)
    }
}

impl From<FunctionRef> for Value {
    fn from(value: FunctionRef) -> Self {
        Value::Function(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
