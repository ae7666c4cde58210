//! The closed set of operator variants (C1).
//!
//! Represented as a single tagged sum on `operator_type`. Every consumer
//! matches exhaustively — never add a wildcard arm here, a new variant must
//! be handled everywhere it matters (builder, codec, validator, renderer).

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};

use super::envelope::{Envelope, JoinMode};
use super::wire::{self, WireWaitFor};
use super::workflow::Workflow;

/// `Wait.wait_for`: a duration, an absolute timestamp, or an opaque event tag.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitFor {
    Duration(StdDuration),
    Timestamp(DateTime<Utc>),
    Event(String),
}

impl Serialize for WaitFor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = match self {
            WaitFor::Duration(d) => wire::encode_duration(*d),
            WaitFor::Timestamp(t) => wire::encode_timestamp(*t),
            WaitFor::Event(tag) => tag.clone(),
        };
        serializer.serialize_str(&encoded)
    }
}

impl<'de> Deserialize<'de> for WaitFor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match wire::decode_wait_for(&raw) {
            WireWaitFor::Duration(d) => WaitFor::Duration(d),
            WireWaitFor::Timestamp(t) => WaitFor::Timestamp(t),
            WireWaitFor::Event(e) => WaitFor::Event(e),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFields {
    pub function: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub kwargs: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionFields {
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_true: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_false: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitFields {
    pub wait_for: WaitFor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelFields {
    #[serde(default)]
    pub branches: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub branch_workflows: IndexMap<String, Workflow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachFields {
    pub items: String,
    #[serde(default)]
    pub loop_body: Vec<Operator>,
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileFields {
    pub condition: String,
    #[serde(default)]
    pub loop_body: Vec<Operator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitEventFields {
    pub event_name: String,
    #[serde(default)]
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitForEventFields {
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchFields {
    pub switch_on: String,
    #[serde(default)]
    pub cases: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinFields {
    pub join_tasks: Vec<String>,
    pub join_mode: JoinMode,
}

/// The closed set of operator variants. Wire tag lives under `operator_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator_type", rename_all = "snake_case")]
pub enum Operator {
    Task(Box<TaskOperator>),
    Activity(Box<ActivityOperator>),
    Condition(Box<ConditionOperator>),
    Wait(Box<WaitOperator>),
    Parallel(Box<ParallelOperator>),
    #[serde(rename = "foreach")]
    ForEach(Box<ForEachOperator>),
    While(Box<WhileOperator>),
    EmitEvent(Box<EmitEventOperator>),
    WaitForEvent(Box<WaitForEventOperator>),
    Switch(Box<SwitchOperator>),
    Join(Box<JoinOperator>),
}

macro_rules! operator_variant {
    ($name:ident, $fields:ty) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(flatten)]
            pub envelope: Envelope,
            #[serde(flatten)]
            pub fields: $fields,
        }
    };
}

operator_variant!(TaskOperator, TaskFields);
operator_variant!(ActivityOperator, TaskFields);
operator_variant!(ConditionOperator, ConditionFields);
operator_variant!(WaitOperator, WaitFields);
operator_variant!(ParallelOperator, ParallelFields);
operator_variant!(ForEachOperator, ForEachFields);
operator_variant!(WhileOperator, WhileFields);
operator_variant!(EmitEventOperator, EmitEventFields);
operator_variant!(WaitForEventOperator, WaitForEventFields);
operator_variant!(SwitchOperator, SwitchFields);
operator_variant!(JoinOperator, JoinFields);

impl Operator {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operator::Task(_) => "task",
            Operator::Activity(_) => "activity",
            Operator::Condition(_) => "condition",
            Operator::Wait(_) => "wait",
            Operator::Parallel(_) => "parallel",
            Operator::ForEach(_) => "foreach",
            Operator::While(_) => "while",
            Operator::EmitEvent(_) => "emit_event",
            Operator::WaitForEvent(_) => "wait_for_event",
            Operator::Switch(_) => "switch",
            Operator::Join(_) => "join",
        }
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        match self {
            Operator::Task(o) => &o.envelope,
            Operator::Activity(o) => &o.envelope,
            Operator::Condition(o) => &o.envelope,
            Operator::Wait(o) => &o.envelope,
            Operator::Parallel(o) => &o.envelope,
            Operator::ForEach(o) => &o.envelope,
            Operator::While(o) => &o.envelope,
            Operator::EmitEvent(o) => &o.envelope,
            Operator::WaitForEvent(o) => &o.envelope,
            Operator::Switch(o) => &o.envelope,
            Operator::Join(o) => &o.envelope,
        }
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        match self {
            Operator::Task(o) => &mut o.envelope,
            Operator::Activity(o) => &mut o.envelope,
            Operator::Condition(o) => &mut o.envelope,
            Operator::Wait(o) => &mut o.envelope,
            Operator::Parallel(o) => &mut o.envelope,
            Operator::ForEach(o) => &mut o.envelope,
            Operator::While(o) => &mut o.envelope,
            Operator::EmitEvent(o) => &mut o.envelope,
            Operator::WaitForEvent(o) => &mut o.envelope,
            Operator::Switch(o) => &mut o.envelope,
            Operator::Join(o) => &mut o.envelope,
        }
    }

    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.envelope().task_id
    }

    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.envelope().dependencies
    }

    pub fn dependencies_mut(&mut self) -> &mut Vec<String> {
        &mut self.envelope_mut().dependencies
    }

    /// Every `task_id` this operator references, for C2's integrity check
    /// (§4.1 "Reference-yield"). Always includes the envelope's own
    /// `dependencies`/`on_success_task_id`/`on_failure_task_id`.
    #[must_use]
    pub fn references(&self) -> HashSet<String> {
        let envelope = self.envelope();
        let mut refs: HashSet<String> = envelope.dependencies.iter().cloned().collect();
        if let Some(id) = &envelope.on_success_task_id {
            refs.insert(id.clone());
        }
        if let Some(id) = &envelope.on_failure_task_id {
            refs.insert(id.clone());
        }

        match self {
            Operator::Task(_) | Operator::Activity(_) | Operator::Wait(_) => {}
            Operator::Condition(o) => {
                if let Some(id) = &o.fields.if_true {
                    refs.insert(id.clone());
                }
                if let Some(id) = &o.fields.if_false {
                    refs.insert(id.clone());
                }
            }
            Operator::Parallel(o) => {
                for heads in o.fields.branches.values() {
                    refs.extend(heads.iter().cloned());
                }
            }
            Operator::ForEach(o) => {
                if let Some(first) = o.fields.loop_body.first() {
                    refs.insert(first.task_id().to_string());
                }
            }
            Operator::While(o) => {
                if let Some(first) = o.fields.loop_body.first() {
                    refs.insert(first.task_id().to_string());
                }
            }
            Operator::EmitEvent(_) | Operator::WaitForEvent(_) => {}
            Operator::Switch(o) => {
                refs.extend(o.fields.cases.values().cloned());
                if let Some(id) = &o.fields.default {
                    refs.insert(id.clone());
                }
            }
            Operator::Join(o) => {
                refs.extend(o.fields.join_tasks.iter().cloned());
            }
        }

        refs
    }
}

/// Rejects obviously invalid combinations at construction time, e.g. a
/// `Condition` whose `if_true`/`if_false` both point back at itself.
#[derive(Debug, snafu::Snafu)]
pub enum ConstructError {
    #[snafu(display("condition '{task_id}' cannot target itself via {field}"))]
    SelfReferentialCondition { task_id: String, field: &'static str },
}

impl ConditionOperator {
    /// # Errors
    /// Returns [`ConstructError::SelfReferentialCondition`] if `if_true` or
    /// `if_false` names this same task.
    pub fn new(
        envelope: Envelope,
        condition: impl Into<String>,
        if_true: Option<String>,
        if_false: Option<String>,
    ) -> Result<Self, ConstructError> {
        if if_true.as_deref() == Some(envelope.task_id.as_str()) {
            return Err(ConstructError::SelfReferentialCondition {
                task_id: envelope.task_id,
                field: "if_true",
            });
        }
        if if_false.as_deref() == Some(envelope.task_id.as_str()) {
            return Err(ConstructError::SelfReferentialCondition {
                task_id: envelope.task_id,
                field: "if_false",
            });
        }
        Ok(Self {
            envelope,
            fields: ConditionFields {
                condition: condition.into(),
                if_true,
                if_false,
            },
        })
    }
}

/// The closed set of wire tags, used by the codec to turn serde's generic
/// "unknown variant" error into the crate's own `UnknownOperatorType` error
/// with the offending tag attached.
pub fn is_known_operator_type(tag: &str) -> bool {
    matches!(
        tag,
        "task"
            | "activity"
            | "condition"
            | "wait"
            | "parallel"
            | "foreach"
            | "while"
            | "emit_event"
            | "wait_for_event"
            | "switch"
            | "join"
    )
}
