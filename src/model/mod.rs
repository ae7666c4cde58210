//! The data model (C1, C2): the closed operator taxonomy, their shared
//! envelope, and the top-level workflow container that owns the task map.

pub mod envelope;
pub mod operator;
pub mod wire;
pub mod workflow;

pub use envelope::{Duration, Envelope, JoinMode, RetryPolicy, TimeoutPolicy, TriggerRule};
pub use operator::{
    ActivityOperator, ConditionOperator, ConstructError, EmitEventOperator, ForEachOperator,
    JoinOperator, Operator, ParallelOperator, SwitchOperator, TaskOperator, WaitFor,
    WaitForEventOperator, WaitOperator, WhileOperator,
};
pub use workflow::{ValidationError, Workflow};
