#![deny(missing_docs)]

//! # graft-core — Dynamic Object Model
//!
//! The object graph that the schema and task engines operate on. A
//! [`Document`] is an arena of objects; each object holds ordered fields,
//! per-field attribute maps, member functions, capability tags, and a
//! parent link. The engines consume only the reflection surface exposed
//! here:
//!
//! - field enumeration, read, write, and removal;
//! - per-field attribute lookup;
//! - capability (instance-of) checks and parent navigation;
//! - member function listing, function attributes, declared parameter count,
//!   return class, and dynamic invocation.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `graft-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - Single-threaded: documents and functions are `Rc`-based and not `Send`.

pub mod config;
pub mod document;
pub mod error;
pub mod function;
pub mod value;

pub use config::{EngineConfig, SchedulerConfig, SearchConfig};
pub use document::{Document, Field, ObjectBuilder};
pub use error::{ConfigError, FunctionError, ObjectError};
pub use function::{Attributes, Function, FunctionRef, Invocation, NativeBody, ReturnClass, ValueBox};
pub use value::{Number, ObjectId, Value};
