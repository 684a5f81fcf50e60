//! # Tasks
//!
//! A task is any object tagged with the `task` capability. Its `run` method
//! is a [`Scheduler`]-wrapped body, so running a task first runs its own
//! child tasks. A task declared without a body gets the base behaviour,
//! which only descends into its children.
//!
//! Overriding `run` with a plain function (not built with
//! [`TaskEngine::run_method`]) must call [`TaskEngine::base_run`] to keep
//! descending; otherwise the subtree is silently skipped.

use graft_core::{Document, EngineConfig, Function, FunctionError, ObjectBuilder, ObjectId};

use crate::scheduler::{Scheduler, TaskError, RUN_METHOD, TASK_CAPABILITY};

/// Entry point for declaring and running task trees.
#[derive(Debug, Clone, Default)]
pub struct TaskEngine {
    scheduler: Scheduler,
}

impl TaskEngine {
    /// An engine using the `scheduler` section of `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            scheduler: Scheduler::new(config.scheduler.clone()),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The base `run` method: descend into children, no body.
    pub fn base_method(&self) -> Function {
        self.scheduler.wrap(RUN_METHOD, |_, _, _| Ok(()))
    }

    /// A `run` method that descends into children, then calls `body`.
    pub fn run_method<F>(&self, body: F) -> Function
    where
        F: Fn(&mut Document, ObjectId, ObjectId) -> Result<(), FunctionError> + 'static,
    {
        self.scheduler.wrap(RUN_METHOD, body)
    }

    /// Tag an object under construction as a task with the base `run`.
    ///
    /// A later `.function(engine.run_method(..))` replaces the base method.
    pub fn declare<'d>(&self, builder: ObjectBuilder<'d>) -> ObjectBuilder<'d> {
        builder.tag(TASK_CAPABILITY).function(self.base_method())
    }

    /// Tag an existing object as a task, installing the base `run` unless
    /// it already has one.
    pub fn make_task(&self, doc: &mut Document, object: ObjectId) -> Result<(), TaskError> {
        doc.tag(object, TASK_CAPABILITY)?;
        if doc.function(object, RUN_METHOD)?.is_none() {
            doc.add_function(object, self.base_method())?;
        }
        Ok(())
    }

    /// Run `root` against `reply`: its `run` method if it has one, else the
    /// base behaviour. Returns once the whole subtree has finished.
    pub fn run(&self, doc: &mut Document, root: ObjectId, reply: ObjectId) -> Result<(), TaskError> {
        let span = tracing::debug_span!("task_run", root = %root, reply = %reply);
        let _entered = span.enter();
        match doc.function(root, RUN_METHOD)? {
            Some(run) => doc
                .invoke(&run, Some(root), vec![reply.into()])
                .map(|_| ())
                .map_err(|source| TaskError::from_invocation(root, RUN_METHOD, source)),
            None => self.base_run(doc, root, reply),
        }
    }

    /// The base behaviour of `run`: run every child task of `task`.
    pub fn base_run(&self, doc: &mut Document, task: ObjectId, reply: ObjectId) -> Result<(), TaskError> {
        self.scheduler.run_children(doc, task, reply)
    }
}

/// Run a task tree with the default configuration.
pub fn run(doc: &mut Document, root: ObjectId, reply: ObjectId) -> Result<(), TaskError> {
    TaskEngine::default().run(doc, root, reply)
}
