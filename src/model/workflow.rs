//! The top-level workflow container (C2): task map, variables, scheduling
//! metadata, and referential-integrity validation (invariants I1-I8).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use super::envelope::RetryPolicy;
use super::operator::Operator;

fn name_regex() -> Regex {
    Regex::new(r"^[a-z][a-z0-9_]*$").expect("static regex is valid")
}

fn version_regex() -> Regex {
    Regex::new(r"^[a-zA-Z0-9._-]+$").expect("static regex is valid")
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ValidationError {
    #[snafu(display("workflow {field} '{value}' cannot contain '__' (reserved separator)"))]
    ReservedSeparator { field: &'static str, value: String },

    #[snafu(display("workflow {field} '{value}' does not match the required pattern"))]
    NameInvalid { field: &'static str, value: String },

    #[snafu(display("task map key '{key}' does not match its operator's task_id '{task_id}'"))]
    KeyMismatch { key: String, task_id: String },

    #[snafu(display("task '{task_id}' field '{field}' references unknown task '{target}'"))]
    DanglingReference {
        task_id: String,
        field: String,
        target: String,
    },

    #[snafu(display("start_task is unset but the workflow has tasks"))]
    MissingStartTask,

    #[snafu(display(
        "parallel '{parallel_id}' branch task '{branch_task_id}' must live only in \
         branch_workflows, not the parent task map (fork-only invariant)"
    ))]
    ParallelBranchLeaked {
        parallel_id: String,
        branch_task_id: String,
    },

    #[snafu(display("task '{task_id}' is nested under a {container} but missing its {flag} flag"))]
    InternalFlagMissing {
        task_id: String,
        container: &'static str,
        flag: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// The authoring-time task graph. Produced by [`crate::builder::WorkflowBuilder`]
/// or by [`crate::codec`] decoding, consumed by the codec, the Mermaid
/// renderer, and (outside this crate) an execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: IndexMap<String, Operator>,
    #[serde(default)]
    pub variables: indexmap::IndexMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub catchup: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_max_active_runs")]
    pub max_active_runs: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_retry_policy: Option<RetryPolicy>,
}

fn default_version() -> String {
    "2.0.0".to_string()
}

fn default_max_active_runs() -> i64 {
    1
}

impl Workflow {
    /// # Errors
    /// Returns [`ValidationError::ReservedSeparator`] or
    /// [`ValidationError::NameInvalid`] if `name`/`version` fail §3's regex
    /// rules, matching the original's "fail fast at construction" behavior
    /// (S6: `Workflow(name="double__underscore")` fails immediately).
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let version = version.into();
        check_name_and_version(&name, &version)?;

        Ok(Self {
            name,
            version,
            description: String::new(),
            tasks: IndexMap::new(),
            variables: IndexMap::new(),
            start_task: None,
            schedule: None,
            start_date: None,
            catchup: false,
            is_paused: false,
            tags: Vec::new(),
            max_active_runs: 1,
            default_retry_policy: None,
        })
    }

    /// Insert or replace, keyed by `op.task_id()`. Idempotent for equal
    /// values.
    #[must_use]
    pub fn add_task(mut self, op: Operator) -> Self {
        self.tasks.insert(op.task_id().to_string(), op);
        self
    }

    /// Upsert merge into `variables`.
    #[must_use]
    pub fn set_variables(mut self, variables: indexmap::IndexMap<String, serde_json::Value>) -> Self {
        self.variables.extend(variables);
        self
    }

    #[must_use]
    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        self.start_task = Some(task_id.into());
        self
    }

    #[must_use]
    pub fn set_schedule(mut self, cron: impl Into<String>) -> Self {
        self.schedule = Some(cron.into());
        self
    }

    #[must_use]
    pub fn set_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    #[must_use]
    pub fn set_catchup(mut self, enabled: bool) -> Self {
        self.catchup = enabled;
        self
    }

    #[must_use]
    pub fn set_paused(mut self, paused: bool) -> Self {
        self.is_paused = paused;
        self
    }

    #[must_use]
    pub fn add_tags<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn set_max_active_runs(mut self, count: i64) -> Self {
        self.max_active_runs = count;
        self
    }

    #[must_use]
    pub fn set_default_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_retry_policy = Some(policy);
        self
    }

    /// Every `task_id` reachable from this workflow: its own task keys plus
    /// every task nested in a `loop_body` or `branch_workflows`, recursively
    /// (I2's "reachable from this workflow").
    #[must_use]
    pub fn reachable_task_ids(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        for op in self.tasks.values() {
            collect_nested_ids(op, &mut ids);
        }
        ids.extend(self.tasks.keys().cloned());
        ids
    }

    /// Enforce invariants I1-I8. Run at decode time and again at builder
    /// `build()` finalization, per spec.md §4.4's implementer note to run
    /// the full check at both points rather than guessing which one the
    /// source intended.
    ///
    /// # Errors
    /// Returns the first invariant violation found.
    pub fn validate(&self) -> Result<()> {
        check_name_and_version(&self.name, &self.version)?;

        // I1: key agreement.
        for (key, op) in &self.tasks {
            if key != op.task_id() {
                return Err(ValidationError::KeyMismatch {
                    key: key.clone(),
                    task_id: op.task_id().to_string(),
                });
            }
        }

        // I2: reference integrity.
        let reachable = self.reachable_task_ids();
        for op in self.tasks.values() {
            for target in op.references() {
                if !reachable.contains(&target) {
                    return Err(ValidationError::DanglingReference {
                        task_id: op.task_id().to_string(),
                        field: "reference".to_string(),
                        target,
                    });
                }
            }
            validate_nested_references(op, &reachable)?;
        }

        // I6: start task set once tasks exist.
        if !self.tasks.is_empty() && self.start_task.is_none() {
            return Err(ValidationError::MissingStartTask);
        }

        // I7: parallel fork-only - branch heads must not leak into the
        // parent task map.
        for op in self.tasks.values() {
            if let Operator::Parallel(p) = op {
                for heads in p.fields.branches.values() {
                    for head in heads {
                        if self.tasks.contains_key(head) {
                            return Err(ValidationError::ParallelBranchLeaked {
                                parallel_id: op.task_id().to_string(),
                                branch_task_id: head.clone(),
                            });
                        }
                    }
                }
                for branch_workflow in p.fields.branch_workflows.values() {
                    branch_workflow.validate()?;
                }
            }
        }

        // I8: internal-task flags.
        for op in self.tasks.values() {
            check_internal_flags(op)?;
        }

        Ok(())
    }
}

fn check_name_and_version(name: &str, version: &str) -> Result<()> {
    if name.contains("__") {
        return Err(ValidationError::ReservedSeparator {
            field: "name",
            value: name.to_string(),
        });
    }
    if version.contains("__") {
        return Err(ValidationError::ReservedSeparator {
            field: "version",
            value: version.to_string(),
        });
    }
    if !name.is_empty() && !name_regex().is_match(name) {
        return Err(ValidationError::NameInvalid {
            field: "name",
            value: name.to_string(),
        });
    }
    if !version.is_empty() && !version_regex().is_match(version) {
        return Err(ValidationError::NameInvalid {
            field: "version",
            value: version.to_string(),
        });
    }
    Ok(())
}

fn collect_nested_ids(op: &Operator, ids: &mut HashSet<String>) {
    match op {
        Operator::ForEach(f) => {
            for sub in &f.fields.loop_body {
                ids.insert(sub.task_id().to_string());
                collect_nested_ids(sub, ids);
            }
        }
        Operator::While(w) => {
            for sub in &w.fields.loop_body {
                ids.insert(sub.task_id().to_string());
                collect_nested_ids(sub, ids);
            }
        }
        Operator::Parallel(p) => {
            for branch_workflow in p.fields.branch_workflows.values() {
                ids.extend(branch_workflow.reachable_task_ids());
            }
        }
        Operator::Task(_)
        | Operator::Activity(_)
        | Operator::Condition(_)
        | Operator::Wait(_)
        | Operator::EmitEvent(_)
        | Operator::WaitForEvent(_)
        | Operator::Switch(_)
        | Operator::Join(_) => {}
    }
}

fn validate_nested_references(op: &Operator, reachable: &HashSet<String>) -> Result<()> {
    match op {
        Operator::ForEach(f) => {
            for sub in &f.fields.loop_body {
                for target in sub.references() {
                    if !reachable.contains(&target) {
                        return Err(ValidationError::DanglingReference {
                            task_id: sub.task_id().to_string(),
                            field: "reference".to_string(),
                            target,
                        });
                    }
                }
                validate_nested_references(sub, reachable)?;
            }
        }
        Operator::While(w) => {
            for sub in &w.fields.loop_body {
                for target in sub.references() {
                    if !reachable.contains(&target) {
                        return Err(ValidationError::DanglingReference {
                            task_id: sub.task_id().to_string(),
                            field: "reference".to_string(),
                            target,
                        });
                    }
                }
                validate_nested_references(sub, reachable)?;
            }
        }
        Operator::Parallel(p) => {
            for branch_workflow in p.fields.branch_workflows.values() {
                for sub in branch_workflow.tasks.values() {
                    for target in sub.references() {
                        if !reachable.contains(&target) {
                            return Err(ValidationError::DanglingReference {
                                task_id: sub.task_id().to_string(),
                                field: "reference".to_string(),
                                target,
                            });
                        }
                    }
                    validate_nested_references(sub, reachable)?;
                }
            }
        }
        Operator::Task(_)
        | Operator::Activity(_)
        | Operator::Condition(_)
        | Operator::Wait(_)
        | Operator::EmitEvent(_)
        | Operator::WaitForEvent(_)
        | Operator::Switch(_)
        | Operator::Join(_) => {}
    }
    Ok(())
}

fn check_internal_flags(op: &Operator) -> Result<()> {
    match op {
        Operator::ForEach(f) => check_loop_body_flags(&f.fields.loop_body),
        Operator::While(w) => check_loop_body_flags(&w.fields.loop_body),
        Operator::Parallel(p) => {
            for branch_workflow in p.fields.branch_workflows.values() {
                for sub in branch_workflow.tasks.values() {
                    if !sub.envelope().is_internal_parallel_task {
                        return Err(ValidationError::InternalFlagMissing {
                            task_id: sub.task_id().to_string(),
                            container: "parallel branch",
                            flag: "is_internal_parallel_task",
                        });
                    }
                    check_internal_flags(sub)?;
                }
            }
            Ok(())
        }
        Operator::Task(_)
        | Operator::Activity(_)
        | Operator::Condition(_)
        | Operator::Wait(_)
        | Operator::EmitEvent(_)
        | Operator::WaitForEvent(_)
        | Operator::Switch(_)
        | Operator::Join(_) => Ok(()),
    }
}

fn check_loop_body_flags(loop_body: &[Operator]) -> Result<()> {
    for sub in loop_body {
        if !sub.envelope().is_internal_loop_task {
            return Err(ValidationError::InternalFlagMissing {
                task_id: sub.task_id().to_string(),
                container: "loop body",
                flag: "is_internal_loop_task",
            });
        }
        check_internal_flags(sub)?;
    }
    Ok(())
}
