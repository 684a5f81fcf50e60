//! # Error Types — Object Model Error Hierarchy
//!
//! Defines the errors raised by the document arena and by function bodies.
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Arena access errors (`ObjectError`) name the offending object id and,
//!   where relevant, the field or function involved.
//! - Function bodies fail with `FunctionError`. The engines treat any
//!   `FunctionError` as an execution fault, never as a validation verdict.

use thiserror::Error;

use crate::value::ObjectId;

/// Error raised while reading or mutating the document arena.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObjectError {
    /// The id was never allocated by this document.
    #[error("unknown object {0}")]
    Unknown(ObjectId),

    /// The object existed but its subtree has been destroyed.
    #[error("object {0} has been destroyed")]
    Dangling(ObjectId),

    /// A value expected to reference an object held something else.
    #[error("expected an object reference, found {found}")]
    NotAnObject {
        /// Type name of the value actually found.
        found: &'static str,
    },

    /// A named member function does not exist on the object.
    #[error("object {object} has no function `{name}`")]
    NoSuchFunction {
        /// The object that was searched.
        object: ObjectId,
        /// The function name that was requested.
        name: String,
    },
}

/// Error raised by a function body during invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// The function was called with the wrong number of arguments.
    #[error("function `{name}` expects {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Function name.
        name: String,
        /// Declared parameter count.
        expected: usize,
        /// Number of arguments actually supplied.
        got: usize,
    },

    /// An argument had an unexpected shape.
    #[error("function `{name}`: {reason}")]
    InvalidArgument {
        /// Function name.
        name: String,
        /// Description of the mismatch.
        reason: String,
    },

    /// The function wrote the value box more than once in a single call.
    #[error("function `{0}` wrote the value box more than once")]
    BoxRewritten(String),

    /// The function needs a value box but was invoked outside a chain.
    #[error("function `{0}` requires a value box")]
    MissingBox(String),

    /// A recursive call chain exceeded its configured nesting limit.
    #[error("nesting depth limit {0} exceeded")]
    DepthExceeded(usize),

    /// A nested task action failed. Carries the task it was invoked on so
    /// the attribution survives being passed up through enclosing tasks.
    #[error("task {task} action `{name}` failed: {source}")]
    Task {
        /// The task the failing action was invoked on.
        task: ObjectId,
        /// Name of the failing action.
        name: String,
        /// The action's own error.
        source: Box<FunctionError>,
    },

    /// Arena access failed inside the function body.
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// Free-form failure raised by a host-supplied function.
    #[error("{0}")]
    Failed(String),
}

impl FunctionError {
    /// Convenience constructor for host functions that fail with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error raised while loading an [`EngineConfig`](crate::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The YAML document could not be parsed into a configuration.
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON value could not be parsed into a configuration.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A parsed value is outside its permitted range.
    #[error("configuration value `{key}` is out of range: {reason}")]
    OutOfRange {
        /// Dotted configuration key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
