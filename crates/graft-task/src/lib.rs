//! # graft-task — Task Engine
//!
//! Runs trees of task objects against a shared reply object. Any object
//! tagged `task` is a task; its children run before its own body, ordered
//! by the `order` attribute of the field holding them.
//!
//! ## Modules
//!
//! - `scheduler` — discovery, stable ordering, and the [`Scheduler::wrap`]
//!   decorator that turns a body into a child-first `run` method.
//! - `task` — [`TaskEngine`]: declaring tasks and running a tree.
//! - `schemafy` — [`Schemafy`]: a task that validates its target with a held
//!   schema after its subtree finishes.
//!
//! ## Example
//!
//! ```
//! use graft_core::{Document, Value};
//! use graft_task::{TaskEngine, ORDER_ATTRIBUTE};
//!
//! let engine = TaskEngine::default();
//! let mut doc = Document::new();
//! let root = doc
//!     .build(None)
//!     .child("greet", |b| {
//!         engine.declare(b).function(engine.run_method(|doc, _, reply| {
//!             doc.set(reply, "greeting", Value::from("hello"))?;
//!             Ok(())
//!         }))
//!     })
//!     .attr(ORDER_ATTRIBUTE, 1)
//!     .finish();
//! let reply = doc.create(None);
//!
//! engine.run(&mut doc, root, reply).unwrap();
//! assert_eq!(doc.value(reply, "greeting").unwrap(), Value::from("hello"));
//! ```
//!
//! ## Crate Policy
//!
//! - Depends on `graft-core` and `graft-schema` only.
//! - Errors from any task abort the run and propagate to the caller;
//!   [`Schemafy`] is the one task that absorbs them into a verdict.

pub mod scheduler;
pub mod schemafy;
pub mod task;

pub use scheduler::{
    ScheduledTask, Scheduler, TaskAction, TaskError, TaskPhase, ORDER_ATTRIBUTE, RUN_ATTRIBUTE,
    RUN_METHOD, TASK_CAPABILITY,
};
pub use schemafy::{Schemafy, SCHEMAFY_CAPABILITY};
pub use task::{run, TaskEngine};
