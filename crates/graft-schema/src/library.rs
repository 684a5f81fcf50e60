//! # Built-in Chain Functions
//!
//! Ordinary validator chain entries built on the same arity contract as
//! host-supplied functions. Each constructor returns a fresh
//! [`FunctionRef`] ready to be placed in a `schema` attribute.
//!
//! | Function       | Arity | Class | Effect                                         |
//! |----------------|-------|-------|------------------------------------------------|
//! | type checks    | 1     | bool  | value has the named variant                    |
//! | `required`     | 1     | bool  | value is non-null                              |
//! | `default`      | 4     | other | schema's declared value when the box is null   |
//! | `delete`       | 3     | void  | remove the field from the target, null the box |
//! | `search`       | 3     | other | alias lookup in the tree when the box is null  |
//! | `one_of`       | 1     | bool  | value equals one of the listed values          |
//! | `range`        | 1     | bool  | number within inclusive bounds                 |
//! | `length`       | 1     | bool  | collection or string length within bounds      |
//! | `to_number`    | 1     | other | parse numeric strings                          |
//! | `instance_of`  | 1     | bool  | object carries a capability tag                |

use std::collections::{BTreeSet, VecDeque};

use graft_core::{
    Document, Function, FunctionError, FunctionRef, Invocation, Number, ObjectError, ObjectId,
    ReturnClass, SearchConfig, Value,
};

/// The value under validation: the box inside a chain, else the positional
/// value argument.
fn current<'i>(inv: &'i Invocation<'_>, index: usize) -> Option<&'i Value> {
    inv.boxed().or_else(|| inv.arg(index))
}

/// Build a unary predicate over the boxed value.
pub fn predicate<F>(name: &str, check: F) -> FunctionRef
where
    F: Fn(&Value) -> bool + 'static,
{
    FunctionRef::new(Function::new(name, 1, ReturnClass::Bool, move |_, inv| {
        Ok(Value::Bool(inv.arg(0).is_some_and(&check)))
    }))
}

/// Build a unary transform; `None` leaves the boxed value unchanged.
pub fn transform<F>(name: &str, map: F) -> FunctionRef
where
    F: Fn(&Value) -> Option<Value> + 'static,
{
    FunctionRef::new(Function::new(name, 1, ReturnClass::Other, move |_, inv| {
        Ok(inv.arg(0).and_then(&map).unwrap_or(Value::Null))
    }))
}

// ─── Type predicates ────────────────────────────────────────────────

pub fn is_null() -> FunctionRef {
    predicate("is_null", Value::is_null)
}

pub fn is_bool() -> FunctionRef {
    predicate("is_bool", |v| matches!(v, Value::Bool(_)))
}

pub fn is_number() -> FunctionRef {
    predicate("is_number", |v| matches!(v, Value::Number(_)))
}

pub fn is_string() -> FunctionRef {
    predicate("is_string", |v| matches!(v, Value::Str(_)))
}

pub fn is_bytes() -> FunctionRef {
    predicate("is_bytes", |v| matches!(v, Value::Bytes(_)))
}

pub fn is_map() -> FunctionRef {
    predicate("is_map", |v| matches!(v, Value::Map(_)))
}

pub fn is_set() -> FunctionRef {
    predicate("is_set", |v| matches!(v, Value::Set(_)))
}

pub fn is_vec() -> FunctionRef {
    predicate("is_vec", |v| matches!(v, Value::Vec(_)))
}

pub fn is_function() -> FunctionRef {
    predicate("is_function", |v| matches!(v, Value::Function(_)))
}

pub fn is_object() -> FunctionRef {
    predicate("is_object", |v| matches!(v, Value::Object(_)))
}

/// Number carrying exactly the given unit label.
pub fn has_unit(unit: &str) -> FunctionRef {
    let unit = unit.to_string();
    predicate("has_unit", move |v| {
        v.as_number()
            .is_some_and(|n| n.unit.as_deref() == Some(unit.as_str()))
    })
}

// ─── Presence and defaults ──────────────────────────────────────────

/// Value is non-null.
pub fn required() -> FunctionRef {
    predicate("required", |v| !v.is_null())
}

/// Substitute the schema's declared value when the box is null.
pub fn default() -> FunctionRef {
    FunctionRef::new(Function::new(
        "default",
        4,
        ReturnClass::Other,
        |doc, inv| {
            if !current(inv, 3).map_or(true, Value::is_null) {
                return Ok(Value::Null);
            }
            let schema = inv.object_arg(1)?;
            let field = inv.str_arg(2)?;
            Ok(doc.value(schema, field)?)
        },
    ))
}

/// Remove the field from the target and null the box.
///
/// Outside a chain there is no box, and only the removal happens.
pub fn delete() -> FunctionRef {
    FunctionRef::new(Function::new("delete", 3, ReturnClass::Void, |doc, inv| {
        let target = inv.object_arg(0)?;
        let field = inv.str_arg(1)?.to_string();
        doc.remove(target, &field)?;
        if inv.has_box() {
            inv.write_box(Value::Null)?;
        }
        Ok(Value::Null)
    }))
}

// ─── Search ─────────────────────────────────────────────────────────

/// Where [`search`] looks for alias fields, starting from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchDirection {
    /// The target, then its owned and referenced descendants, breadth-first.
    Down,
    /// The target, then each ancestor along the parent chain.
    Up,
    /// [`Up`](Self::Up) first, then [`Down`](Self::Down).
    Both,
}

/// Fill a null box from the first non-null alias field found in the tree.
///
/// Never rejects: a miss leaves the box null. Pair with [`required`] to
/// demand a value. Uses the default depth limit; build with [`search_with`]
/// to apply a loaded [`SearchConfig`].
pub fn search(aliases: &[&str], direction: SearchDirection) -> FunctionRef {
    search_with(aliases, direction, &SearchConfig::default())
}

/// [`search`] with an explicit depth limit, typically `&config.search` of
/// an [`EngineConfig`](graft_core::EngineConfig).
pub fn search_with(
    aliases: &[&str],
    direction: SearchDirection,
    config: &SearchConfig,
) -> FunctionRef {
    let aliases: Vec<String> = aliases.iter().map(|a| a.to_string()).collect();
    let max_depth = config.max_depth;
    FunctionRef::new(Function::new("search", 3, ReturnClass::Other, move |doc, inv| {
        if !current(inv, 2).map_or(true, Value::is_null) {
            return Ok(Value::Null);
        }
        let target = inv.object_arg(0)?;
        let found = match direction {
            SearchDirection::Up => search_up(doc, target, &aliases, max_depth)?,
            SearchDirection::Down => search_down(doc, target, &aliases, max_depth)?,
            SearchDirection::Both => match search_up(doc, target, &aliases, max_depth)? {
                Some(value) => Some(value),
                None => search_down(doc, target, &aliases, max_depth)?,
            },
        };
        if found.is_none() {
            tracing::debug!(%target, ?aliases, "search found no alias");
        }
        Ok(found.unwrap_or(Value::Null))
    }))
}

fn alias_value(
    doc: &Document,
    id: ObjectId,
    aliases: &[String],
) -> Result<Option<Value>, ObjectError> {
    for alias in aliases {
        if let Some(value) = doc.get(id, alias)? {
            if !value.is_null() {
                return Ok(Some(value.clone()));
            }
        }
    }
    Ok(None)
}

fn search_up(
    doc: &Document,
    target: ObjectId,
    aliases: &[String],
    max_depth: usize,
) -> Result<Option<Value>, ObjectError> {
    let mut current = Some(target);
    let mut hops = 0;
    while let Some(id) = current {
        if hops > max_depth {
            break;
        }
        if let Some(value) = alias_value(doc, id, aliases)? {
            return Ok(Some(value));
        }
        current = doc.parent(id)?.filter(|parent| doc.contains(*parent));
        hops += 1;
    }
    Ok(None)
}

fn search_down(
    doc: &Document,
    target: ObjectId,
    aliases: &[String],
    max_depth: usize,
) -> Result<Option<Value>, ObjectError> {
    let mut queue = VecDeque::from([(target, 0usize)]);
    let mut visited = BTreeSet::from([target]);
    while let Some((id, depth)) = queue.pop_front() {
        if let Some(value) = alias_value(doc, id, aliases)? {
            return Ok(Some(value));
        }
        if depth >= max_depth {
            continue;
        }
        for (_, child) in doc.object_fields(id)? {
            if doc.contains(child) && visited.insert(child) {
                queue.push_back((child, depth + 1));
            }
        }
    }
    Ok(None)
}

// ─── Value constraints ──────────────────────────────────────────────

/// Value equals one of `allowed`.
pub fn one_of(allowed: Vec<Value>) -> FunctionRef {
    predicate("one_of", move |v| allowed.contains(v))
}

/// Number within the inclusive bounds; non-numbers are rejected.
pub fn range(min: Option<f64>, max: Option<f64>) -> FunctionRef {
    predicate("range", move |v| {
        v.as_number().is_some_and(|n| {
            min.map_or(true, |lo| n.value >= lo) && max.map_or(true, |hi| n.value <= hi)
        })
    })
}

/// Length within the inclusive bounds; values without a length are rejected.
pub fn length(min: Option<usize>, max: Option<usize>) -> FunctionRef {
    predicate("length", move |v| {
        v.len().is_some_and(|len| {
            min.map_or(true, |lo| len >= lo) && max.map_or(true, |hi| len <= hi)
        })
    })
}

/// Parse strings holding a number; everything else passes through.
pub fn to_number() -> FunctionRef {
    transform("to_number", |v| {
        v.as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .map(|n| Value::Number(Number::new(n)))
    })
}

/// Object reference whose object carries `capability`.
pub fn instance_of(capability: &str) -> FunctionRef {
    let capability = capability.to_string();
    FunctionRef::new(Function::new(
        "instance_of",
        1,
        ReturnClass::Bool,
        move |doc, inv| {
            let verdict = match inv.arg(0) {
                Some(Value::Object(id)) => doc
                    .is_instance_of(*id, &capability)
                    .map_err(FunctionError::from)?,
                _ => false,
            };
            Ok(Value::Bool(verdict))
        },
    ))
}
