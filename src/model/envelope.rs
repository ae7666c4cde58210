//! Fields and policy types shared by every operator variant.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

/// Dependency trigger rule for smart joins (Airflow-style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    /// All dependencies must succeed.
    #[default]
    AllSuccess,
    /// All dependencies reached a final state (success or failure).
    AllDone,
    /// At least one dependency succeeded.
    OneSuccess,
    /// At least one dependency reached a final state.
    OneDone,
    /// No dependency failed.
    NoneFailed,
}

/// Join operator coordination mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Wait for all branches to complete, success or failure.
    AllOf,
    /// Wait for any branch to complete.
    AnyOf,
    /// Wait for all branches to succeed; fail if any fails.
    AllSuccess,
    /// Wait for at least one branch to succeed.
    OneSuccess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(with = "duration_seconds", default = "default_retry_delay")]
    pub delay: StdDuration,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay: default_retry_delay(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> StdDuration {
    StdDuration::from_secs(5)
}

fn default_backoff_factor() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    #[serde(with = "duration_seconds")]
    pub timeout: StdDuration,
    #[serde(default = "default_kill_on_timeout")]
    pub kill_on_timeout: bool,
}

fn default_kill_on_timeout() -> bool {
    true
}

/// Historical wire format for `retry_policy.delay` / `timeout_policy.timeout`:
/// a fractional number of seconds. Kept for backward compatibility even
/// though `Wait.wait_for` moved to the `PT<seconds>S` form (see `codec::wire`).
mod duration_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

/// Constructors for common durations, so callers don't need to reach for a
/// third-party duration literal syntax inside builder calls.
///
/// ```
/// use magpie::model::Duration;
/// let five_minutes = Duration::minutes(5);
/// ```
pub struct Duration;

impl Duration {
    #[must_use]
    pub fn seconds(n: u64) -> StdDuration {
        StdDuration::from_secs(n)
    }

    #[must_use]
    pub fn minutes(n: u64) -> StdDuration {
        StdDuration::from_secs(n * 60)
    }

    #[must_use]
    pub fn hours(n: u64) -> StdDuration {
        StdDuration::from_secs(n * 3600)
    }

    #[must_use]
    pub fn days(n: u64) -> StdDuration {
        StdDuration::from_secs(n * 86_400)
    }

    #[must_use]
    pub fn weeks(n: u64) -> StdDuration {
        StdDuration::from_secs(n * 7 * 86_400)
    }
}

/// Fields present on every operator variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub task_id: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub trigger_rule: TriggerRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_policy: Option<TimeoutPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure_task_id: Option<String>,
    #[serde(default)]
    pub is_internal_loop_task: bool,
    #[serde(default)]
    pub is_internal_parallel_task: bool,
}

impl Envelope {
    #[must_use]
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            dependencies: Vec::new(),
            trigger_rule: TriggerRule::default(),
            retry_policy: None,
            timeout_policy: None,
            idempotency_key: None,
            metadata: HashMap::new(),
            description: String::new(),
            result_key: None,
            on_success_task_id: None,
            on_failure_task_id: None,
            is_internal_loop_task: false,
            is_internal_parallel_task: false,
        }
    }

    /// Sort and dedup `dependencies` in place (invariant I5).
    pub fn canonicalize_dependencies(&mut self) {
        self.dependencies.sort();
        self.dependencies.dedup();
    }
}
