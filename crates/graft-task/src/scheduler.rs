//! # Task Scheduler
//!
//! Discovers, orders, and runs the task-tagged children of a container
//! object, then runs a wrapped body.
//!
//! ## Design
//!
//! [`Scheduler::wrap`] turns a body into a member function that, invoked on
//! a container with a reply object:
//!
//! 1. **Discovers** every field of the container holding a `task`-tagged
//!    object, in declaration order.
//! 2. **Orders** them with a stable sort on the `order` attribute of the
//!    container's field (integer, default 0).
//! 3. **Runs** each task: its `run`-tagged member functions in stable
//!    `run`-order, then the task's own `run` method unless one of the
//!    tagged functions already was `run`.
//! 4. **Finishes** by calling the wrapped body.
//!
//! A task's `run` method is itself a wrapped body, so the tree is processed
//! depth-first with children before the body at every level.
//!
//! ## Lifecycle
//!
//! Each task moves through [`TaskPhase`] once per run:
//!
//! ```text
//! Pending ──▶ RunningChildren ──▶ RunningOwnActions ──▶ RunningBody ──▶ Done
//! ```
//!
//! Phases are reported as `tracing` events. Nothing is memoized: invoking
//! `run` on a finished tree starts a fresh run.

use std::cell::Cell;
use std::rc::Rc;

use graft_core::{
    Document, Function, FunctionError, FunctionRef, ObjectError, ObjectId, ReturnClass,
    SchedulerConfig, Value,
};
use thiserror::Error;

/// Capability tag identifying task objects.
pub const TASK_CAPABILITY: &str = "task";

/// Field attribute holding a child task's sibling order.
pub const ORDER_ATTRIBUTE: &str = "order";

/// Function attribute marking a task action, holding its optional order.
pub const RUN_ATTRIBUTE: &str = "run";

/// Name of a task's base method.
pub const RUN_METHOD: &str = "run";

/// Errors raised while running a task tree.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Arena access failed.
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// A task action or `run` method raised an error.
    #[error("task {task} action `{name}` failed: {source}")]
    Action {
        /// The task the failing action was invoked on.
        task: ObjectId,
        /// Name of the failing action.
        name: String,
        /// The action's own error.
        #[source]
        source: FunctionError,
    },

    /// Task nesting exceeded `scheduler.max_depth` (likely a cycle).
    #[error("task nesting exceeded depth {0}")]
    DepthExceeded(usize),

    /// An `order` or `run` attribute held something other than an integer.
    #[error("`{attribute}` attribute of `{subject}` must be an integer, found {found}")]
    InvalidOrder {
        /// Field name (for `order`) or function name (for `run`).
        subject: String,
        /// Which attribute was malformed.
        attribute: &'static str,
        /// Type name of the value found.
        found: &'static str,
    },
}

impl TaskError {
    /// Attribute a function failure to the task it was invoked on.
    ///
    /// A failure already attributed to a nested task keeps that attribution.
    pub fn from_invocation(task: ObjectId, name: &str, source: FunctionError) -> Self {
        match source {
            FunctionError::DepthExceeded(depth) => Self::DepthExceeded(depth),
            FunctionError::Task { task, name, source } => Self::Action {
                task,
                name,
                source: *source,
            },
            source => Self::Action {
                task,
                name: name.to_string(),
                source,
            },
        }
    }
}

impl From<TaskError> for FunctionError {
    fn from(error: TaskError) -> Self {
        match error {
            TaskError::Object(source) => FunctionError::Object(source),
            TaskError::Action { task, name, source } => FunctionError::Task {
                task,
                name,
                source: Box::new(source),
            },
            TaskError::DepthExceeded(depth) => FunctionError::DepthExceeded(depth),
            other => FunctionError::Failed(other.to_string()),
        }
    }
}

/// Per-run lifecycle of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPhase {
    /// Discovered and sorted, not yet started.
    Pending,
    /// Running the task's own child tasks.
    RunningChildren,
    /// Running the task's `run`-tagged actions.
    RunningOwnActions,
    /// Running the wrapped body.
    RunningBody,
    /// Finished for this run.
    Done,
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::RunningChildren => f.write_str("running_children"),
            Self::RunningOwnActions => f.write_str("running_own_actions"),
            Self::RunningBody => f.write_str("running_body"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// A discovered child task with its sibling order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    /// Field of the container holding the task.
    pub field: String,
    /// The child task.
    pub task: ObjectId,
    /// Value of the field's `order` attribute, 0 when absent.
    pub order: i64,
}

/// A `run`-tagged member function with its action order.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskAction {
    /// The tagged member function.
    pub function: FunctionRef,
    /// Value of the function's `run` attribute, 0 when null.
    pub order: i64,
}

/// Orders and runs task trees. Cloning shares the nesting counter.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
    depth: Rc<Cell<usize>>,
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl Scheduler {
    /// A scheduler with its own nesting counter.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            depth: Rc::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn enter(&self) -> Result<DepthGuard<'_>, TaskError> {
        let depth = self.depth.get() + 1;
        if depth > self.config.max_depth {
            return Err(TaskError::DepthExceeded(self.config.max_depth));
        }
        self.depth.set(depth);
        Ok(DepthGuard(&self.depth))
    }

    /// Wrap `body` into a one-parameter member function named `name`.
    ///
    /// Invoked on a container with a reply object, the function runs the
    /// container's task children and then `body(doc, container, reply)`.
    pub fn wrap<F>(&self, name: &str, body: F) -> Function
    where
        F: Fn(&mut Document, ObjectId, ObjectId) -> Result<(), FunctionError> + 'static,
    {
        let scheduler = self.clone();
        Function::new(name, 1, ReturnClass::Void, move |doc, inv| {
            let container = inv.require_receiver()?;
            let reply = inv.object_arg(0)?;
            scheduler.run_children(doc, container, reply)?;
            tracing::debug!(task = %container, phase = %TaskPhase::RunningBody);
            body(doc, container, reply)?;
            tracing::debug!(task = %container, phase = %TaskPhase::Done);
            Ok(Value::Null)
        })
    }

    /// Steps 1–3: discover, order, and run every child task of `container`.
    pub fn run_children(
        &self,
        doc: &mut Document,
        container: ObjectId,
        reply: ObjectId,
    ) -> Result<(), TaskError> {
        let _guard = self.enter()?;
        let tasks = Self::discover(doc, container)?;
        tracing::debug!(
            task = %container,
            phase = %TaskPhase::RunningChildren,
            children = tasks.len()
        );
        for scheduled in tasks {
            self.run_task(doc, scheduled.task, reply)?;
        }
        Ok(())
    }

    /// Task-tagged children of `container`, stably sorted by `order`.
    pub fn discover(doc: &Document, container: ObjectId) -> Result<Vec<ScheduledTask>, TaskError> {
        let mut tasks = Vec::new();
        for (field, task) in doc.object_fields(container)? {
            if !doc.contains(task) || !doc.is_instance_of(task, TASK_CAPABILITY)? {
                continue;
            }
            let order = read_order(
                doc.attribute(container, &field, ORDER_ATTRIBUTE)?,
                &field,
                ORDER_ATTRIBUTE,
            )?;
            tracing::trace!(task = %task, field = %field, order, phase = %TaskPhase::Pending);
            tasks.push(ScheduledTask { field, task, order });
        }
        tasks.sort_by_key(|scheduled| scheduled.order);
        Ok(tasks)
    }

    /// `run`-tagged member functions of `task`, stably sorted by order, and
    /// whether one of them is the `run` method itself.
    pub fn actions(doc: &Document, task: ObjectId) -> Result<(Vec<TaskAction>, bool), TaskError> {
        let mut actions = Vec::new();
        let mut includes_run = false;
        for function in doc.functions(task)? {
            let Some(tag) = function.attribute(RUN_ATTRIBUTE) else {
                continue;
            };
            let order = read_order(Some(tag), function.name(), RUN_ATTRIBUTE)?;
            includes_run |= function.name() == RUN_METHOD;
            actions.push(TaskAction { function, order });
        }
        actions.sort_by_key(|action| action.order);
        Ok((actions, includes_run))
    }

    /// Run one task: its tagged actions, then its `run` method if not
    /// already among them.
    pub fn run_task(&self, doc: &mut Document, task: ObjectId, reply: ObjectId) -> Result<(), TaskError> {
        let (actions, includes_run) = Self::actions(doc, task)?;
        tracing::debug!(
            task = %task,
            phase = %TaskPhase::RunningOwnActions,
            actions = actions.len(),
            includes_run
        );
        for action in &actions {
            invoke_action(doc, task, &action.function, reply)?;
        }
        if includes_run {
            return Ok(());
        }
        match doc.function(task, RUN_METHOD)? {
            Some(run) => invoke_action(doc, task, &run, reply),
            None => {
                self.run_children(doc, task, reply)?;
                tracing::debug!(task = %task, phase = %TaskPhase::Done);
                Ok(())
            }
        }
    }
}

fn invoke_action(
    doc: &mut Document,
    task: ObjectId,
    function: &FunctionRef,
    reply: ObjectId,
) -> Result<(), TaskError> {
    let args = if function.params() == 0 {
        Vec::new()
    } else {
        vec![Value::Object(reply)]
    };
    doc.invoke(function, Some(task), args)
        .map(|_| ())
        .map_err(|source| TaskError::from_invocation(task, function.name(), source))
}

fn read_order(value: Option<&Value>, subject: &str, attribute: &'static str) -> Result<i64, TaskError> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value.as_i64().ok_or_else(|| TaskError::InvalidOrder {
            subject: subject.to_string(),
            attribute,
            found: value.type_name(),
        }),
    }
}
