//! # graft-schema — Schema Engine
//!
//! Validates and transforms the fields of a target object against the
//! per-field rules declared on a schema object, deleting anything invalid.
//!
//! ## Application (`engine`)
//!
//! - [`apply`] — apply every field of a schema to a target; returns overall
//!   validity and strips every failed field.
//! - [`apply_field`] — apply one field's constraint; never raises.
//! - [`apply_report`] — like [`apply`], also naming the stripped fields.
//!
//! ## Argument Binding (`dispatch`)
//!
//! Chain functions declare 0–4 parameters and receive the matching subset
//! of `(target, schema, field, value)`; see [`dispatch::Arity`].
//!
//! ## Built-ins (`library`)
//!
//! Type predicates, `required`, `default`, `delete`, `search`, and a few
//! value constraints, all implemented as ordinary chain functions.
//!
//! ## Example
//!
//! ```
//! use graft_core::{Document, Value};
//! use graft_schema::{apply, chain, library, SCHEMA_ATTRIBUTE};
//!
//! let mut doc = Document::new();
//! let schema = doc
//!     .build(None)
//!     .field("port", 8080)
//!     .attr(SCHEMA_ATTRIBUTE, chain([library::default(), library::is_number()]))
//!     .field("debug", Value::Null)
//!     .attr(SCHEMA_ATTRIBUTE, chain([library::delete()]))
//!     .finish();
//! let target = doc.build(None).field("debug", true).finish();
//!
//! assert!(apply(&mut doc, schema, target));
//! assert_eq!(doc.value(target, "port").unwrap(), Value::from(8080));
//! assert!(!doc.has_field(target, "debug").unwrap());
//! ```

pub mod dispatch;
pub mod engine;
pub mod library;

pub use dispatch::{Arity, ChainContext};
pub use engine::{
    apply, apply_field, apply_report, chain, ApplyReport, ChainEntry, SchemaError,
    MAX_DELEGATION_DEPTH, SCHEMA_ATTRIBUTE,
};
pub use library::SearchDirection;
