//! # Reflected Functions
//!
//! Host functions carried as values and attached to objects as members.
//! Each function declares its parameter count and the class of value it
//! returns, which is all the engines need to bind arguments and interpret
//! results. Function bodies are native closures over the [`Document`].
//!
//! ## Value Box
//!
//! A [`ValueBox`] is the single slot that threads a field's value through a
//! validator chain. When a function is invoked as a chain step it receives a
//! mutable handle to the box through its [`Invocation`] and may replace the
//! value at most once per step.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::document::Document;
use crate::error::FunctionError;
use crate::value::{ObjectId, Value};

/// Attribute map attached to a field or a member function.
pub type Attributes = BTreeMap<String, Value>;

/// Signature of a native function body.
pub type NativeBody = dyn Fn(&mut Document, &mut Invocation<'_>) -> Result<Value, FunctionError>;

/// The class of value a function returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnClass {
    /// Returns a verdict; anything other than a bool is a fault.
    Bool,
    /// Called for side effects; the return value is ignored.
    Void,
    /// Returns an arbitrary value.
    Other,
}

/// A reflected, invocable function.
pub struct Function {
    name: String,
    params: usize,
    returns: ReturnClass,
    attributes: Attributes,
    body: Rc<NativeBody>,
}

impl Function {
    /// A function named `name` declaring `params` parameters.
    ///
    /// `body` receives the document and the call's [`Invocation`].
    pub fn new<F>(name: impl Into<String>, params: usize, returns: ReturnClass, body: F) -> Self
    where
        F: Fn(&mut Document, &mut Invocation<'_>) -> Result<Value, FunctionError> + 'static,
    {
        Self {
            name: name.into(),
            params,
            returns,
            attributes: Attributes::new(),
            body: Rc::new(body),
        }
    }

    /// Builder: attach an attribute to the function declaration.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder: rename the function, keeping its body and attributes.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declared name; member lookup is by this name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count.
    pub fn params(&self) -> usize {
        self.params
    }

    /// Declared return class.
    pub fn returns(&self) -> ReturnClass {
        self.returns
    }

    /// All attributes attached to the declaration.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// A single declaration attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub(crate) fn body(&self) -> Rc<NativeBody> {
        Rc::clone(&self.body)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Shared reference to a [`Function`]. Equality is identity.
#[derive(Clone)]
pub struct FunctionRef(Rc<Function>);

impl FunctionRef {
    /// Share `function`.
    pub fn new(function: Function) -> Self {
        Self(Rc::new(function))
    }
}

impl std::ops::Deref for FunctionRef {
    type Target = Function;

    fn deref(&self) -> &Function {
        &self.0
    }
}

impl From<Function> for FunctionRef {
    fn from(function: Function) -> Self {
        Self::new(function)
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}/{}>", self.0.name, self.0.params)
    }
}

/// Single mutable slot holding a field's value during a validator chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueBox {
    value: Value,
    written: bool,
}

impl ValueBox {
    /// A box seeded with `value`, not yet written.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            written: false,
        }
    }

    /// Current value.
    pub fn get(&self) -> &Value {
        &self.value
    }

    /// Whether the current value is null.
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Replace the value. Returns `false` if the box was already written
    /// during the current step, leaving the value unchanged.
    pub fn write(&mut self, value: Value) -> bool {
        if self.written {
            return false;
        }
        self.value = value;
        self.written = true;
        true
    }

    /// Start a new chain step, re-arming the single write.
    pub fn begin_step(&mut self) {
        self.written = false;
    }

    /// Overwrite the value outside of any step accounting.
    pub fn reset(&mut self, value: Value) {
        self.value = value;
        self.written = false;
    }

    /// Consume the box, returning its value.
    pub fn into_inner(self) -> Value {
        self.value
    }
}

/// The arguments and context of one function call.
pub struct Invocation<'a> {
    function: &'a str,
    receiver: Option<ObjectId>,
    args: Vec<Value>,
    slot: Option<&'a mut ValueBox>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        function: &'a str,
        receiver: Option<ObjectId>,
        args: Vec<Value>,
        slot: Option<&'a mut ValueBox>,
    ) -> Self {
        Self {
            function,
            receiver,
            args,
            slot,
        }
    }

    /// Name of the function being invoked.
    pub fn function(&self) -> &str {
        self.function
    }

    /// The object the function was invoked on, for member calls.
    pub fn receiver(&self) -> Option<ObjectId> {
        self.receiver
    }

    /// The receiver, or an error naming the function.
    pub fn require_receiver(&self) -> Result<ObjectId, FunctionError> {
        self.receiver.ok_or_else(|| FunctionError::InvalidArgument {
            name: self.function.to_string(),
            reason: "must be invoked on an object".to_string(),
        })
    }

    /// All positional arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Positional argument, `None` when out of range.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Positional argument that must reference an object.
    pub fn object_arg(&self, index: usize) -> Result<ObjectId, FunctionError> {
        match self.args.get(index) {
            Some(Value::Object(id)) => Ok(*id),
            other => Err(self.mismatch(index, "an object", other)),
        }
    }

    /// Positional argument that must be a string.
    pub fn str_arg(&self, index: usize) -> Result<&str, FunctionError> {
        match self.args.get(index) {
            Some(Value::Str(s)) => Ok(s),
            other => Err(self.mismatch(index, "a string", other)),
        }
    }

    fn mismatch(&self, index: usize, expected: &str, found: Option<&Value>) -> FunctionError {
        FunctionError::InvalidArgument {
            name: self.function.to_string(),
            reason: format!(
                "argument {index} must be {expected}, got {}",
                found.map(Value::type_name).unwrap_or("nothing")
            ),
        }
    }

    /// Whether the call is a validator chain step with a value box.
    pub fn has_box(&self) -> bool {
        self.slot.is_some()
    }

    /// Current boxed value, `None` outside a chain.
    pub fn boxed(&self) -> Option<&Value> {
        self.slot.as_deref().map(ValueBox::get)
    }

    /// Replace the boxed value; fails outside a chain or on a second write.
    pub fn write_box(&mut self, value: Value) -> Result<(), FunctionError> {
        let name = self.function;
        let slot = self
            .slot
            .as_deref_mut()
            .ok_or_else(|| FunctionError::MissingBox(name.to_string()))?;
        if slot.write(value) {
            Ok(())
        } else {
            Err(FunctionError::BoxRewritten(name.to_string()))
        }
    }
}
