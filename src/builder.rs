//! The fluent builder (C4): chained construction of a [`Workflow`], with
//! automatic dependency threading and nested sub-graph composition for
//! `condition`/`parallel`/`foreach`/`while_loop` callback bodies.
//!
//! Grounded on `highway_dsl.workflow_dsl.WorkflowBuilder` (see
//! `examples/original_source/highway_dsl/workflow_dsl.py`), generalized to
//! the teacher's fluent `with_x(mut self, ...) -> Self` chaining style
//! (`DurableEngineBuilder`).

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::model::envelope::{Envelope, JoinMode, RetryPolicy, TimeoutPolicy, TriggerRule};
use crate::model::operator::{
    ActivityOperator, ConditionOperator, ConstructError, EmitEventFields, EmitEventOperator,
    ForEachFields, ForEachOperator, JoinFields, JoinOperator, Operator, ParallelFields,
    ParallelOperator, SwitchFields, SwitchOperator, TaskFields, TaskOperator, WaitFields,
    WaitFor, WaitForEventFields, WaitForEventOperator, WaitOperator, WhileFields, WhileOperator,
};
use crate::model::workflow::{ValidationError, Workflow};

/// Errors the builder can accumulate across a `build()` call (spec.md §7:
/// "the builder may accumulate multiple errors per `build()` call and
/// return them together").
#[derive(Debug, snafu::Snafu)]
pub enum Error {
    #[snafu(display("task '{task_id}' references non-existent {field} '{handler_id}'"))]
    MissingHandlerReference {
        task_id: String,
        field: &'static str,
        handler_id: String,
    },

    #[snafu(display("workflow failed validation: {source}"))]
    Validation { source: ValidationError },

    #[snafu(display("{source}"))]
    Construct { source: ConstructError },
}

/// Envelope fields a caller may override on any operator. Matches the
/// subset of `**kwargs` the Python builder routes to `BaseOperator` fields
/// rather than variant-specific ones (`task_id`, `dependencies`,
/// `retry_policy`, `timeout_policy`, `idempotency_key`, `metadata`,
/// `description`, `result_key`, `trigger_rule`).
#[derive(Debug, Clone, Default)]
pub struct EnvelopeOpts {
    pub dependencies: Vec<String>,
    pub trigger_rule: TriggerRule,
    pub retry_policy: Option<RetryPolicy>,
    pub timeout_policy: Option<TimeoutPolicy>,
    pub idempotency_key: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub description: String,
    pub result_key: Option<String>,
}

/// [`EnvelopeOpts`] plus the function invocation fields shared by `task`
/// and `activity`.
#[derive(Debug, Clone, Default)]
pub struct TaskOpts {
    pub envelope: EnvelopeOpts,
    pub args: Vec<Value>,
    pub kwargs: HashMap<String, Value>,
}

/// Fluent, chainable workflow construction. Carries `(workflow,
/// current_task)` state; every method returns `self` except `build()`.
pub struct WorkflowBuilder {
    workflow: Workflow,
    current_task: Option<String>,
    errors: Vec<Error>,
}

impl WorkflowBuilder {
    /// # Errors
    /// Returns [`ValidationError`] if `name`/`version` fail spec.md §3's
    /// regex rules (fails immediately, before any task is added).
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            workflow: Workflow::new(name, version)?,
            current_task: None,
            errors: Vec::new(),
        })
    }

    /// A sub-builder for a nested callback body. The name is mechanically
    /// derived (`{task_id}_true`, `{task_id}_{branch}`, ...) and sanitized
    /// to always satisfy the workflow name regex, so this never fails.
    fn sub(name: &str, version: String) -> Self {
        let sanitized = sanitize_sub_name(name);
        let workflow =
            Workflow::new(sanitized, version).expect("sanitized sub-workflow name is always valid");
        Self {
            workflow,
            current_task: None,
            errors: Vec::new(),
        }
    }

    fn make_envelope(&self, task_id: &str, opts: EnvelopeOpts) -> Envelope {
        Envelope {
            task_id: task_id.to_string(),
            dependencies: opts.dependencies,
            trigger_rule: opts.trigger_rule,
            retry_policy: opts.retry_policy,
            timeout_policy: opts.timeout_policy,
            idempotency_key: opts.idempotency_key,
            metadata: opts.metadata,
            description: opts.description,
            result_key: opts.result_key,
            on_success_task_id: None,
            on_failure_task_id: None,
            is_internal_loop_task: false,
            is_internal_parallel_task: false,
        }
    }

    /// A task id is a "handler" if some already-inserted task names it as
    /// its `on_success_task_id`/`on_failure_task_id`; handlers are exempt
    /// from auto-chaining (spec.md §4.4 "Handler exception").
    fn is_handler(&self, task_id: &str) -> bool {
        self.workflow.tasks.values().any(|t| {
            let env = t.envelope();
            env.on_success_task_id.as_deref() == Some(task_id)
                || env.on_failure_task_id.as_deref() == Some(task_id)
        })
    }

    /// Insert `op`, auto-threading `dependencies := [current_task]` unless
    /// the caller passed explicit dependencies or `task_id` is a handler.
    /// Dependencies are canonicalized (I5). Updates `current_task`.
    fn insert_threaded(&mut self, task_id: String, mut op: Operator, explicit_deps: bool) {
        if !explicit_deps && !self.is_handler(&task_id) {
            if let Some(cur) = self.current_task.clone() {
                op.envelope_mut().dependencies.push(cur);
            }
        }
        op.envelope_mut().canonicalize_dependencies();
        self.workflow.tasks.insert(task_id.clone(), op);
        self.current_task = Some(task_id);
    }

    #[must_use]
    pub fn task(mut self, task_id: impl Into<String>, function: impl Into<String>, opts: TaskOpts) -> Self {
        let task_id = task_id.into();
        let explicit = !opts.envelope.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts.envelope);
        let op = Operator::Task(Box::new(TaskOperator {
            envelope,
            fields: TaskFields {
                function: function.into(),
                args: opts.args,
                kwargs: opts.kwargs,
            },
        }));
        self.insert_threaded(task_id, op, explicit);
        self
    }

    /// A long-running, out-of-transaction unit of work (spec.md §3.2).
    #[must_use]
    pub fn activity(mut self, task_id: impl Into<String>, function: impl Into<String>, opts: TaskOpts) -> Self {
        let task_id = task_id.into();
        let explicit = !opts.envelope.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts.envelope);
        let op = Operator::Activity(Box::new(ActivityOperator {
            envelope,
            fields: TaskFields {
                function: function.into(),
                args: opts.args,
                kwargs: opts.kwargs,
            },
        }));
        self.insert_threaded(task_id, op, explicit);
        self
    }

    /// A branch: `if_true`/`if_false` bodies are populated by callbacks
    /// receiving a fresh sub-builder. Every branch task's dependency list
    /// gets the condition's own id appended (spec.md §4.4 "Condition").
    #[must_use]
    pub fn condition(
        mut self,
        task_id: impl Into<String>,
        condition: impl Into<String>,
        if_true: impl FnOnce(WorkflowBuilder) -> WorkflowBuilder,
        if_false: impl FnOnce(WorkflowBuilder) -> WorkflowBuilder,
        opts: EnvelopeOpts,
    ) -> Self {
        let task_id = task_id.into();
        let version = self.workflow.version.clone();

        let true_built = if_true(Self::sub(&format!("{task_id}_true"), version.clone()));
        let false_built = if_false(Self::sub(&format!("{task_id}_false"), version));

        let if_true_head = true_built.workflow.tasks.keys().next().cloned();
        let if_false_head = false_built.workflow.tasks.keys().next().cloned();

        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);

        match ConditionOperator::new(envelope, condition, if_true_head, if_false_head) {
            Ok(cond) => {
                self.insert_threaded(task_id.clone(), Operator::Condition(Box::new(cond)), explicit);
                for (_, op) in true_built.workflow.tasks {
                    self.merge_branch_task(&task_id, op);
                }
                for (_, op) in false_built.workflow.tasks {
                    self.merge_branch_task(&task_id, op);
                }
            }
            Err(source) => self.errors.push(Error::Construct { source }),
        }
        self
    }

    /// Add a condition-branch task into the parent map, ensuring the
    /// condition's own id is present in its dependencies (without
    /// disturbing whatever the sub-builder already threaded).
    fn merge_branch_task(&mut self, condition_id: &str, mut op: Operator) {
        if !op.dependencies().iter().any(|d| d == condition_id) {
            op.envelope_mut().dependencies.push(condition_id.to_string());
            op.envelope_mut().canonicalize_dependencies();
        }
        self.workflow.tasks.insert(op.task_id().to_string(), op);
    }

    /// Fork-only parallel (I7): each branch body is fully built as an
    /// independent sub-workflow and attached whole as
    /// `branch_workflows[name]`; branch tasks never leak into the parent
    /// task map. `branches[name]` records that branch's task ids for
    /// summary/reference.
    #[must_use]
    pub fn parallel(
        mut self,
        task_id: impl Into<String>,
        branches: Vec<(String, Box<dyn FnOnce(WorkflowBuilder) -> WorkflowBuilder>)>,
        opts: EnvelopeOpts,
    ) -> Self {
        let task_id = task_id.into();
        let version = self.workflow.version.clone();

        let mut branch_heads: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut branch_workflows: IndexMap<String, Workflow> = IndexMap::new();

        for (name, body) in branches {
            let normalized = name.to_lowercase();
            let sub = Self::sub(&format!("{task_id}_{normalized}"), version.clone());
            let mut built = body(sub);
            for op in built.workflow.tasks.values_mut() {
                op.envelope_mut().is_internal_parallel_task = true;
            }
            match built.build() {
                Ok(wf) => {
                    branch_heads.insert(name.clone(), wf.tasks.keys().cloned().collect());
                    branch_workflows.insert(name, wf);
                }
                Err(errs) => self.errors.extend(errs),
            }
        }

        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);
        let op = Operator::Parallel(Box::new(ParallelOperator {
            envelope,
            fields: ParallelFields {
                branches: branch_heads,
                branch_workflows,
                timeout: None,
            },
        }));
        self.insert_threaded(task_id, op, explicit);
        self
    }

    #[must_use]
    pub fn wait(mut self, task_id: impl Into<String>, wait_for: WaitFor, opts: EnvelopeOpts) -> Self {
        let task_id = task_id.into();
        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);
        let op = Operator::Wait(Box::new(WaitOperator {
            envelope,
            fields: WaitFields { wait_for },
        }));
        self.insert_threaded(task_id, op, explicit);
        self
    }

    /// Every task in the loop body gets `is_internal_loop_task = true`;
    /// only the first body task's dependencies get the container's id
    /// appended (I8, spec.md §4.4 "ForEach / While"). Body tasks are also
    /// flattened into the parent task map so references stay resolvable.
    #[must_use]
    pub fn foreach(
        mut self,
        task_id: impl Into<String>,
        items: impl Into<String>,
        parallel: bool,
        loop_body: impl FnOnce(WorkflowBuilder) -> WorkflowBuilder,
        opts: EnvelopeOpts,
    ) -> Self {
        let task_id = task_id.into();
        let version = self.workflow.version.clone();
        let built = loop_body(Self::sub(&format!("{task_id}_loop"), version));
        let mut loop_tasks: Vec<Operator> = built.workflow.tasks.into_values().collect();

        for op in &mut loop_tasks {
            op.envelope_mut().is_internal_loop_task = true;
        }
        thread_container_into_first(&mut loop_tasks, &task_id);

        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);
        let op = Operator::ForEach(Box::new(ForEachOperator {
            envelope,
            fields: ForEachFields {
                items: items.into(),
                loop_body: loop_tasks.clone(),
                parallel,
            },
        }));
        self.insert_threaded(task_id, op, explicit);

        for op in loop_tasks {
            self.workflow.tasks.insert(op.task_id().to_string(), op);
        }
        self
    }

    #[must_use]
    pub fn while_loop(
        mut self,
        task_id: impl Into<String>,
        condition: impl Into<String>,
        loop_body: impl FnOnce(WorkflowBuilder) -> WorkflowBuilder,
        opts: EnvelopeOpts,
    ) -> Self {
        let task_id = task_id.into();
        let version = self.workflow.version.clone();
        let built = loop_body(Self::sub(&format!("{task_id}_loop"), version));
        let mut loop_tasks: Vec<Operator> = built.workflow.tasks.into_values().collect();

        for op in &mut loop_tasks {
            op.envelope_mut().is_internal_loop_task = true;
        }
        thread_container_into_first(&mut loop_tasks, &task_id);

        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);
        let op = Operator::While(Box::new(WhileOperator {
            envelope,
            fields: WhileFields {
                condition: condition.into(),
                loop_body: loop_tasks.clone(),
            },
        }));
        self.insert_threaded(task_id, op, explicit);

        for op in loop_tasks {
            self.workflow.tasks.insert(op.task_id().to_string(), op);
        }
        self
    }

    #[must_use]
    pub fn emit_event(
        mut self,
        task_id: impl Into<String>,
        event_name: impl Into<String>,
        payload: HashMap<String, Value>,
        opts: EnvelopeOpts,
    ) -> Self {
        let task_id = task_id.into();
        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);
        let op = Operator::EmitEvent(Box::new(EmitEventOperator {
            envelope,
            fields: EmitEventFields {
                event_name: event_name.into(),
                payload,
            },
        }));
        self.insert_threaded(task_id, op, explicit);
        self
    }

    #[must_use]
    pub fn wait_for_event(
        mut self,
        task_id: impl Into<String>,
        event_name: impl Into<String>,
        timeout_seconds: Option<i64>,
        opts: EnvelopeOpts,
    ) -> Self {
        let task_id = task_id.into();
        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);
        let op = Operator::WaitForEvent(Box::new(WaitForEventOperator {
            envelope,
            fields: WaitForEventFields {
                event_name: event_name.into(),
                timeout_seconds,
            },
        }));
        self.insert_threaded(task_id, op, explicit);
        self
    }

    #[must_use]
    pub fn switch(
        mut self,
        task_id: impl Into<String>,
        switch_on: impl Into<String>,
        cases: IndexMap<String, String>,
        default: Option<String>,
        opts: EnvelopeOpts,
    ) -> Self {
        let task_id = task_id.into();
        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);
        let op = Operator::Switch(Box::new(SwitchOperator {
            envelope,
            fields: SwitchFields {
                switch_on: switch_on.into(),
                cases,
                default,
            },
        }));
        self.insert_threaded(task_id, op, explicit);
        self
    }

    #[must_use]
    pub fn join(
        mut self,
        task_id: impl Into<String>,
        join_tasks: Vec<String>,
        join_mode: JoinMode,
        opts: EnvelopeOpts,
    ) -> Self {
        let task_id = task_id.into();
        let explicit = !opts.dependencies.is_empty();
        let envelope = self.make_envelope(&task_id, opts);
        let op = Operator::Join(Box::new(JoinOperator {
            envelope,
            fields: JoinFields {
                join_tasks,
                join_mode,
            },
        }));
        self.insert_threaded(task_id, op, explicit);
        self
    }

    /// Attach a retry policy to the current task. Only applies to `Task`
    /// operators, matching the original's `isinstance(..., TaskOperator)`
    /// check (which `ActivityOperator`, a sibling class, doesn't satisfy).
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        if let Some(cur) = self.current_task.clone() {
            if let Some(Operator::Task(op)) = self.workflow.tasks.get_mut(&cur) {
                op.envelope.retry_policy = Some(policy);
            }
        }
        self
    }

    #[must_use]
    pub fn timeout(mut self, policy: TimeoutPolicy) -> Self {
        if let Some(cur) = self.current_task.clone() {
            if let Some(Operator::Task(op)) = self.workflow.tasks.get_mut(&cur) {
                op.envelope.timeout_policy = Some(policy);
            }
        }
        self
    }

    /// Set the current task's `on_success_task_id`. Binding is eager;
    /// validity is checked at `build()`.
    #[must_use]
    pub fn on_success(mut self, handler_id: impl Into<String>) -> Self {
        if let Some(cur) = self.current_task.clone() {
            if let Some(op) = self.workflow.tasks.get_mut(&cur) {
                op.envelope_mut().on_success_task_id = Some(handler_id.into());
            }
        }
        self
    }

    #[must_use]
    pub fn on_failure(mut self, handler_id: impl Into<String>) -> Self {
        if let Some(cur) = self.current_task.clone() {
            if let Some(op) = self.workflow.tasks.get_mut(&cur) {
                op.envelope_mut().on_failure_task_id = Some(handler_id.into());
            }
        }
        self
    }

    #[must_use]
    pub fn set_description(mut self, description: impl Into<String>) -> Self {
        self.workflow.description = description.into();
        self
    }

    #[must_use]
    pub fn set_version(mut self, version: impl Into<String>) -> Self {
        self.workflow.version = version.into();
        self
    }

    #[must_use]
    pub fn set_variables(mut self, variables: IndexMap<String, Value>) -> Self {
        self.workflow.variables.extend(variables);
        self
    }

    #[must_use]
    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        self.workflow.start_task = Some(task_id.into());
        self
    }

    #[must_use]
    pub fn set_schedule(mut self, cron: impl Into<String>) -> Self {
        self.workflow.schedule = Some(cron.into());
        self
    }

    #[must_use]
    pub fn set_start_date(mut self, start_date: chrono::DateTime<chrono::Utc>) -> Self {
        self.workflow.start_date = Some(start_date);
        self
    }

    #[must_use]
    pub fn set_catchup(mut self, enabled: bool) -> Self {
        self.workflow.catchup = enabled;
        self
    }

    #[must_use]
    pub fn set_paused(mut self, paused: bool) -> Self {
        self.workflow.is_paused = paused;
        self
    }

    #[must_use]
    pub fn add_tags<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.workflow.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn set_max_active_runs(mut self, count: i64) -> Self {
        self.workflow.max_active_runs = count;
        self
    }

    #[must_use]
    pub fn set_default_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.workflow.default_retry_policy = Some(policy);
        self
    }

    /// Finalize: check handler references, default `start_task` to the
    /// first inserted key, then run full I1-I8 validation (spec.md §4.4's
    /// implementer note: run the complete check here, not just the
    /// handler-reference subset literally listed under "build()
    /// finalization").
    ///
    /// # Errors
    /// Returns every accumulated builder error plus any validation
    /// failure, together.
    pub fn build(mut self) -> Result<Workflow, Vec<Error>> {
        let mut errors = std::mem::take(&mut self.errors);

        for (task_id, op) in &self.workflow.tasks {
            let env = op.envelope();
            if let Some(handler_id) = &env.on_success_task_id {
                if !self.workflow.tasks.contains_key(handler_id) {
                    errors.push(Error::MissingHandlerReference {
                        task_id: task_id.clone(),
                        field: "on_success_task_id",
                        handler_id: handler_id.clone(),
                    });
                }
            }
            if let Some(handler_id) = &env.on_failure_task_id {
                if !self.workflow.tasks.contains_key(handler_id) {
                    errors.push(Error::MissingHandlerReference {
                        task_id: task_id.clone(),
                        field: "on_failure_task_id",
                        handler_id: handler_id.clone(),
                    });
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        if self.workflow.start_task.is_none() && !self.workflow.tasks.is_empty() {
            self.workflow.start_task = self.workflow.tasks.keys().next().cloned();
        }

        if let Err(source) = self.workflow.validate() {
            return Err(vec![Error::Validation { source }]);
        }

        Ok(self.workflow)
    }
}

/// For each task `is.first()`, append `container_id` to its dependencies
/// unless already present (spec.md §4.4's "only the first loop-body task
/// carries the container id").
fn thread_container_into_first(loop_tasks: &mut [Operator], container_id: &str) {
    if let Some(first) = loop_tasks.first_mut() {
        if !first.dependencies().iter().any(|d| d == container_id) {
            first.envelope_mut().dependencies.push(container_id.to_string());
            first.envelope_mut().canonicalize_dependencies();
        }
    }
}

/// Derive a mechanically-safe sub-workflow name: lowercase, non
/// `[a-z0-9_]` characters replaced with `_`, guaranteed to start with a
/// letter. Used for `{task_id}_true`/`_false`/`_loop`/`_{branch}` names so
/// sub-builder construction can never fail on the name regex.
fn sanitize_sub_name(raw: &str) -> String {
    let mut out: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || !out.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        out.insert(0, 'w');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::operator::Operator;

    #[test]
    fn linear_chain_auto_threads_dependencies() {
        let wf = WorkflowBuilder::new("w1", "2.0.0")
            .unwrap()
            .task("extract", "f.e", TaskOpts::default())
            .task(
                "transform",
                "f.t",
                TaskOpts {
                    args: vec![Value::String("{{raw}}".into())],
                    ..Default::default()
                },
            )
            .build()
            .unwrap();

        assert_eq!(wf.start_task.as_deref(), Some("extract"));
        assert!(wf.tasks["extract"].dependencies().is_empty());
        assert_eq!(wf.tasks["transform"].dependencies(), [String::from("extract")]);
    }

    #[test]
    fn explicit_dependencies_override_auto_threading() {
        let wf = WorkflowBuilder::new("w2", "2.0.0")
            .unwrap()
            .task("a", "f.a", TaskOpts::default())
            .task("b", "f.b", TaskOpts::default())
            .task(
                "c",
                "f.c",
                TaskOpts {
                    envelope: EnvelopeOpts {
                        dependencies: vec!["a".to_string(), "a".to_string()],
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .build()
            .unwrap();

        assert_eq!(wf.tasks["c"].dependencies(), [String::from("a")]);
    }

    #[test]
    fn handler_task_is_not_auto_chained() {
        let wf = WorkflowBuilder::new("w3", "2.0.0")
            .unwrap()
            .task("a", "f.a", TaskOpts::default())
            .on_failure("h")
            .task("h", "f.h", TaskOpts::default())
            .build()
            .unwrap();

        assert!(wf.tasks["h"].dependencies().is_empty());
        assert_eq!(wf.tasks["a"].envelope().on_failure_task_id.as_deref(), Some("h"));
    }

    #[test]
    fn condition_branches_depend_on_condition() {
        let wf = WorkflowBuilder::new("w4", "2.0.0")
            .unwrap()
            .condition(
                "route",
                "x > 0",
                |b| b.task("hi", "f.h", TaskOpts::default()),
                |b| b.task("lo", "f.l", TaskOpts::default()),
                EnvelopeOpts::default(),
            )
            .build()
            .unwrap();

        assert_eq!(wf.tasks["hi"].dependencies(), [String::from("route")]);
        assert_eq!(wf.tasks["lo"].dependencies(), [String::from("route")]);
        match &wf.tasks["route"] {
            Operator::Condition(c) => {
                assert_eq!(c.fields.if_true.as_deref(), Some("hi"));
                assert_eq!(c.fields.if_false.as_deref(), Some("lo"));
            }
            other => panic!("expected condition, got {other:?}"),
        }
    }

    #[test]
    fn parallel_is_fork_only() {
        let wf = WorkflowBuilder::new("w5", "2.0.0")
            .unwrap()
            .parallel(
                "deploy",
                vec![(
                    "api".to_string(),
                    Box::new(|b: WorkflowBuilder| b.task("deploy_api", "d.api", TaskOpts::default())) as _,
                )],
                EnvelopeOpts::default(),
            )
            .build()
            .unwrap();

        assert!(!wf.tasks.contains_key("deploy_api"));
        match &wf.tasks["deploy"] {
            Operator::Parallel(p) => {
                assert_eq!(p.fields.branches["api"], vec!["deploy_api".to_string()]);
                assert!(p.fields.branch_workflows["api"].tasks.contains_key("deploy_api"));
            }
            other => panic!("expected parallel, got {other:?}"),
        }
    }

    #[test]
    fn foreach_marks_internal_and_threads_only_first() {
        let wf = WorkflowBuilder::new("w6", "2.0.0")
            .unwrap()
            .foreach(
                "each_order",
                "orders",
                false,
                |b| {
                    b.task("ship", "f.ship", TaskOpts::default())
                        .task("notify", "f.notify", TaskOpts::default())
                },
                EnvelopeOpts::default(),
            )
            .build()
            .unwrap();

        assert!(wf.tasks["ship"].envelope().is_internal_loop_task);
        assert!(wf.tasks["notify"].envelope().is_internal_loop_task);
        assert_eq!(wf.tasks["ship"].dependencies(), [String::from("each_order")]);
        assert_eq!(wf.tasks["notify"].dependencies(), [String::from("ship")]);
    }

    #[test]
    fn missing_handler_reference_fails_build() {
        let result = WorkflowBuilder::new("w7", "2.0.0")
            .unwrap()
            .task("a", "f.a", TaskOpts::default())
            .on_failure("missing")
            .build();

        assert!(matches!(
            result,
            Err(errors) if matches!(errors.as_slice(), [Error::MissingHandlerReference { .. }])
        ));
    }

    #[test]
    fn double_underscore_name_fails_immediately() {
        assert!(WorkflowBuilder::new("double__underscore", "1.0.0").is_err());
    }
}
