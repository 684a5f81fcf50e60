//! # Document Arena
//!
//! Owns every object of one object graph. Objects are addressed by stable
//! [`ObjectId`] indices; parent links are plain ids used for lookup only.
//!
//! ## Ownership
//!
//! An object is owned by the object its parent link points at. Removing a
//! field whose value is an owned child destroys the child's whole subtree.
//! Fields that reference objects owned elsewhere are plain references, and
//! removing them leaves the referenced object alive. Destroyed slots are
//! never reused, so a stale id reports [`ObjectError::Dangling`] instead of
//! aliasing a newer object.

use std::collections::BTreeSet;

use crate::error::{FunctionError, ObjectError};
use crate::function::{Attributes, Function, FunctionRef, Invocation, ValueBox};
use crate::value::{ObjectId, Value};

/// One named field of an object: its value plus its attribute map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    /// Field name, unique within its object.
    pub name: String,
    /// Current value.
    pub value: Value,
    /// Metadata keyed by attribute name.
    pub attributes: Attributes,
}

/// A node of the object graph.
#[derive(Debug, Clone, Default)]
pub struct Node {
    fields: Vec<Field>,
    functions: Vec<FunctionRef>,
    capabilities: BTreeSet<String>,
    parent: Option<ObjectId>,
}

impl Node {
    fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn field_entry(&mut self, name: &str) -> &mut Field {
        let index = match self.fields.iter().position(|f| f.name == name) {
            Some(index) => index,
            None => {
                self.fields.push(Field {
                    name: name.to_string(),
                    ..Field::default()
                });
                self.fields.len() - 1
            }
        };
        &mut self.fields[index]
    }

    fn add_function(&mut self, function: FunctionRef) {
        match self
            .functions
            .iter_mut()
            .find(|f| f.name() == function.name())
        {
            Some(existing) => *existing = function,
            None => self.functions.push(function),
        }
    }
}

/// Arena of objects forming one or more object trees.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<Option<Node>>,
}

impl Document {
    /// An empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty object with an optional parent link.
    ///
    /// The parent link is not a field: callers attach the object to its
    /// parent with [`Document::set`] (or use [`Document::create_child`]).
    pub fn create(&mut self, parent: Option<ObjectId>) -> ObjectId {
        let id = ObjectId(self.nodes.len());
        self.nodes.push(Some(Node {
            parent,
            ..Node::default()
        }));
        id
    }

    /// Allocate an object owned by `parent` and store it in `field`.
    pub fn create_child(&mut self, parent: ObjectId, field: &str) -> Result<ObjectId, ObjectError> {
        self.node(parent)?;
        let child = self.create(Some(parent));
        self.set(parent, field, Value::Object(child))?;
        Ok(child)
    }

    /// Start building a new object with the fluent [`ObjectBuilder`].
    pub fn build(&mut self, parent: Option<ObjectId>) -> ObjectBuilder<'_> {
        ObjectBuilder::new(self, parent)
    }

    /// Whether `id` refers to a live object.
    pub fn contains(&self, id: ObjectId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Whether no object is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node(&self, id: ObjectId) -> Result<&Node, ObjectError> {
        match self.nodes.get(id.0) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(ObjectError::Dangling(id)),
            None => Err(ObjectError::Unknown(id)),
        }
    }

    fn node_mut(&mut self, id: ObjectId) -> Result<&mut Node, ObjectError> {
        match self.nodes.get_mut(id.0) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(ObjectError::Dangling(id)),
            None => Err(ObjectError::Unknown(id)),
        }
    }

    // ── Fields ──────────────────────────────────────────────────────

    /// Field names in declaration order.
    pub fn field_names(&self, id: ObjectId) -> Result<Vec<String>, ObjectError> {
        Ok(self.node(id)?.fields.iter().map(|f| f.name.clone()).collect())
    }

    /// Whether the object declares `field`, even with a null value.
    pub fn has_field(&self, id: ObjectId, field: &str) -> Result<bool, ObjectError> {
        Ok(self.node(id)?.field(field).is_some())
    }

    /// Borrow a field's value; `None` when the field is not declared.
    pub fn get(&self, id: ObjectId, field: &str) -> Result<Option<&Value>, ObjectError> {
        Ok(self.node(id)?.field(field).map(|f| &f.value))
    }

    /// Clone a field's value; `Null` when the field is not declared.
    pub fn value(&self, id: ObjectId, field: &str) -> Result<Value, ObjectError> {
        Ok(self.get(id, field)?.cloned().unwrap_or_default())
    }

    /// Set a field's value, declaring the field at the end if it is new.
    /// Existing attributes are kept.
    pub fn set(&mut self, id: ObjectId, field: &str, value: Value) -> Result<(), ObjectError> {
        self.node_mut(id)?.field_entry(field).value = value;
        Ok(())
    }

    /// Remove a field together with its attributes.
    ///
    /// If the value is an object owned by `id`, that object's subtree is
    /// destroyed. Removing an undeclared field is a no-op returning `None`.
    pub fn remove(&mut self, id: ObjectId, field: &str) -> Result<Option<Value>, ObjectError> {
        let node = self.node_mut(id)?;
        let Some(index) = node.fields.iter().position(|f| f.name == field) else {
            return Ok(None);
        };
        let removed = node.fields.remove(index).value;
        if let Value::Object(child) = removed {
            if self.parent(child).ok().flatten() == Some(id) {
                self.destroy(child);
            }
        }
        Ok(Some(removed))
    }

    fn destroy(&mut self, root: ObjectId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.nodes.get_mut(id.0) else {
                continue;
            };
            let Some(node) = slot.take() else {
                continue;
            };
            for field in node.fields {
                if let Value::Object(child) = field.value {
                    if matches!(self.nodes.get(child.0), Some(Some(n)) if n.parent == Some(id)) {
                        stack.push(child);
                    }
                }
            }
        }
        tracing::trace!(object = %root, "destroyed object subtree");
    }

    // ── Attributes ──────────────────────────────────────────────────

    /// Attribute map of a field; `None` when the field is not declared.
    pub fn attributes(&self, id: ObjectId, field: &str) -> Result<Option<&Attributes>, ObjectError> {
        Ok(self.node(id)?.field(field).map(|f| &f.attributes))
    }

    /// A single attribute of a field.
    pub fn attribute(
        &self,
        id: ObjectId,
        field: &str,
        name: &str,
    ) -> Result<Option<&Value>, ObjectError> {
        Ok(self
            .attributes(id, field)?
            .and_then(|attributes| attributes.get(name)))
    }

    /// Set a field attribute, declaring the field with a null value if new.
    pub fn set_attribute(
        &mut self,
        id: ObjectId,
        field: &str,
        name: &str,
        value: Value,
    ) -> Result<(), ObjectError> {
        self.node_mut(id)?
            .field_entry(field)
            .attributes
            .insert(name.to_string(), value);
        Ok(())
    }

    // ── Capabilities & navigation ───────────────────────────────────

    /// Tag an object with a capability.
    pub fn tag(&mut self, id: ObjectId, capability: &str) -> Result<(), ObjectError> {
        self.node_mut(id)?.capabilities.insert(capability.to_string());
        Ok(())
    }

    /// Whether the object carries the capability tag.
    pub fn is_instance_of(&self, id: ObjectId, capability: &str) -> Result<bool, ObjectError> {
        Ok(self.node(id)?.capabilities.contains(capability))
    }

    /// The object's parent link, `None` for a root.
    pub fn parent(&self, id: ObjectId) -> Result<Option<ObjectId>, ObjectError> {
        Ok(self.node(id)?.parent)
    }

    /// Object-valued fields in declaration order, as `(field, id)` pairs.
    pub fn object_fields(&self, id: ObjectId) -> Result<Vec<(String, ObjectId)>, ObjectError> {
        Ok(self
            .node(id)?
            .fields
            .iter()
            .filter_map(|f| f.value.as_object().map(|child| (f.name.clone(), child)))
            .collect())
    }

    // ── Functions ───────────────────────────────────────────────────

    /// Attach a member function, replacing any function with the same name.
    pub fn add_function(
        &mut self,
        id: ObjectId,
        function: impl Into<FunctionRef>,
    ) -> Result<(), ObjectError> {
        self.node_mut(id)?.add_function(function.into());
        Ok(())
    }

    /// Member functions in declaration order.
    pub fn functions(&self, id: ObjectId) -> Result<Vec<FunctionRef>, ObjectError> {
        Ok(self.node(id)?.functions.clone())
    }

    /// Member function by name.
    pub fn function(&self, id: ObjectId, name: &str) -> Result<Option<FunctionRef>, ObjectError> {
        Ok(self
            .node(id)?
            .functions
            .iter()
            .find(|f| f.name() == name)
            .cloned())
    }

    /// Invoke a function with positional arguments.
    pub fn invoke(
        &mut self,
        function: &FunctionRef,
        receiver: Option<ObjectId>,
        args: Vec<Value>,
    ) -> Result<Value, FunctionError> {
        self.invoke_with_box(function, receiver, args, None)
    }

    /// Invoke a function as a validator chain step, exposing the value box.
    pub fn invoke_with_box(
        &mut self,
        function: &FunctionRef,
        receiver: Option<ObjectId>,
        args: Vec<Value>,
        slot: Option<&mut ValueBox>,
    ) -> Result<Value, FunctionError> {
        if args.len() != function.params() {
            return Err(FunctionError::ArityMismatch {
                name: function.name().to_string(),
                expected: function.params(),
                got: args.len(),
            });
        }
        let body = function.body();
        let mut invocation = Invocation::new(function.name(), receiver, args, slot);
        body(self, &mut invocation)
    }

    /// Invoke the member function `name` on `id`.
    pub fn call_method(
        &mut self,
        id: ObjectId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, FunctionError> {
        let function = self
            .function(id, name)?
            .ok_or_else(|| ObjectError::NoSuchFunction {
                object: id,
                name: name.to_string(),
            })?;
        self.invoke(&function, Some(id), args)
    }

    // ── Inspection ──────────────────────────────────────────────────

    /// Project an object subtree onto a `serde_json::Value`.
    ///
    /// Objects become JSON objects keyed by field name, functions become
    /// `"<fn name>"`, bytes become arrays of numbers, and numbers with a unit
    /// become `{"value": n, "unit": u}`. Objects already on the current path
    /// render as `"<cycle #n>"`.
    pub fn to_json(&self, id: ObjectId) -> Result<serde_json::Value, ObjectError> {
        let mut path = Vec::new();
        self.object_to_json(id, &mut path)
    }

    fn object_to_json(
        &self,
        id: ObjectId,
        path: &mut Vec<ObjectId>,
    ) -> Result<serde_json::Value, ObjectError> {
        let node = self.node(id)?;
        path.push(id);
        let mut map = serde_json::Map::new();
        for field in &node.fields {
            map.insert(field.name.clone(), self.value_to_json(&field.value, path)?);
        }
        path.pop();
        Ok(serde_json::Value::Object(map))
    }

    fn value_to_json(
        &self,
        value: &Value,
        path: &mut Vec<ObjectId>,
    ) -> Result<serde_json::Value, ObjectError> {
        use serde_json::Value as Json;

        Ok(match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => {
                let number = match n.as_i64() {
                    Some(i) => Json::from(i),
                    None => serde_json::Number::from_f64(n.value)
                        .map(Json::Number)
                        .unwrap_or(Json::Null),
                };
                match &n.unit {
                    Some(unit) => serde_json::json!({ "value": number, "unit": unit }),
                    None => number,
                }
            }
            Value::Str(s) => Json::String(s.clone()),
            Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            Value::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (key, item) in entries {
                    map.insert(key.clone(), self.value_to_json(item, path)?);
                }
                Json::Object(map)
            }
            Value::Set(items) | Value::Vec(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.value_to_json(item, path))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Function(f) => Json::String(format!("<fn {}>", f.name())),
            Value::Object(child) if path.contains(child) => Json::String(format!("<cycle {child}>")),
            Value::Object(child) => self.object_to_json(*child, path)?,
        })
    }
}

/// Fluent construction of an object and its owned children.
///
/// ```
/// use graft_core::{Document, Value};
///
/// let mut doc = Document::new();
/// let person = doc
///     .build(None)
///     .field("name", "Ada")
///     .attr("schema", Value::Null)
///     .child("address", |b| b.field("city", "London"))
///     .finish();
/// assert_eq!(doc.value(person, "name").unwrap(), Value::from("Ada"));
/// ```
pub struct ObjectBuilder<'d> {
    doc: &'d mut Document,
    id: ObjectId,
    node: Node,
    current: Option<usize>,
}

impl<'d> ObjectBuilder<'d> {
    fn new(doc: &'d mut Document, parent: Option<ObjectId>) -> Self {
        let id = doc.create(parent);
        Self {
            doc,
            id,
            node: Node {
                parent,
                ..Node::default()
            },
            current: None,
        }
    }

    /// Id the object will have once finished.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Declare (or overwrite) a field; later [`attr`](Self::attr) calls apply to it.
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        let field = self.node.field_entry(name);
        field.value = value.into();
        self.current = self.node.fields.iter().position(|f| f.name == name);
        self
    }

    /// Attach an attribute to the most recently declared field.
    ///
    /// Without a preceding field the attribute is dropped.
    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let Some(field) = self.current.and_then(|i| self.node.fields.get_mut(i)) {
            field.attributes.insert(name.to_string(), value.into());
        }
        self
    }

    /// Declare a field holding a new object owned by this one.
    pub fn child(
        self,
        name: &str,
        build: impl FnOnce(ObjectBuilder<'_>) -> ObjectBuilder<'_>,
    ) -> Self {
        let Self {
            doc,
            id,
            node,
            current,
        } = self;
        let child = build(ObjectBuilder::new(&mut *doc, Some(id))).finish();
        Self {
            doc,
            id,
            node,
            current,
        }
        .field(name, Value::Object(child))
    }

    /// Tag the object with a capability.
    pub fn tag(mut self, capability: &str) -> Self {
        self.node.capabilities.insert(capability.to_string());
        self
    }

    /// Attach a member function, replacing one with the same name.
    pub fn function(mut self, function: Function) -> Self {
        self.node.add_function(FunctionRef::new(function));
        self
    }

    /// Store the object in the arena and return its id.
    pub fn finish(self) -> ObjectId {
        if let Some(slot) = self.doc.nodes.get_mut(self.id.0) {
            *slot = Some(self.node);
        }
        self.id
    }
}
