//! Task wire types.
//!
//! [`Task`] is the snapshot callers receive from admission and polling.
//! [`TaskStatus`] serializes as an integer code (`1` in progress, `0`
//! success, `-1` error) to match the response contract of the rankings API.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::TaskError;

/// Task lifecycle status.
///
/// ```text
/// InProgress -> Success, Error
/// Success    -> (terminal)
/// Error      -> (terminal)
/// ```
///
/// # Examples
///
/// ```
/// use toprank_tasks::TaskStatus;
///
/// assert_eq!(TaskStatus::InProgress.code(), 1);
/// assert!(TaskStatus::InProgress.can_transition_to(&TaskStatus::Success));
/// assert!(!TaskStatus::Error.can_transition_to(&TaskStatus::Success));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The runner has not yet published a result.
    InProgress,
    /// The runner finished and results are available (terminal).
    Success,
    /// The runner failed (terminal).
    Error,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl TaskStatus {
    /// Integer code used on the wire.
    pub fn code(&self) -> i8 {
        match self {
            Self::InProgress => 1,
            Self::Success => 0,
            Self::Error => -1,
        }
    }

    /// Parses a wire code back into a status.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::InProgress),
            0 => Some(Self::Success),
            -1 => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns `true` if no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Returns `true` if moving from this status to `next` is valid.
    ///
    /// Only `InProgress` may move, and only to a terminal status.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!(self, Self::InProgress) && next.is_terminal()
    }

    /// Validates a transition, producing [`TaskError::InvalidTransition`]
    /// with the task's fingerprint on rejection.
    pub fn validate_transition(&self, fingerprint: &str, next: &Self) -> Result<(), TaskError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition {
                fingerprint: fingerprint.to_string(),
                from: *self,
                to: *next,
            })
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown task status code: {code}")))
    }
}

/// Snapshot of a task as returned to callers.
///
/// `results` is omitted from JSON until the task succeeds.
///
/// # Examples
///
/// ```
/// use toprank_tasks::{Task, TaskStatus};
/// use serde_json::json;
///
/// let task = Task::in_progress();
/// let value = serde_json::to_value(&task).unwrap();
/// assert_eq!(value["status"], json!(1));
/// assert!(value.get("results").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Human-readable status description. For failed tasks this is the
    /// failure message.
    pub status_message: String,

    /// Ranked entries, present only on success.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub results: Option<Vec<Value>>,
}

/// Status message attached to a freshly admitted task.
pub const IN_PROGRESS_MESSAGE: &str = "Task is being processed";

/// Status message attached to a successfully finished task.
pub const SUCCESS_MESSAGE: &str = "Task completed";

impl Task {
    /// A new, unfinished task snapshot.
    pub fn in_progress() -> Self {
        Self {
            status: TaskStatus::InProgress,
            status_message: IN_PROGRESS_MESSAGE.to_string(),
            results: None,
        }
    }
}

/// Terminal result published by a runner.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The computation produced these ranked entries.
    Success(Vec<Value>),
    /// The computation failed with this message.
    Failure(String),
}

impl TaskOutcome {
    /// The status this outcome moves a task into.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Success(_) => TaskStatus::Success,
            Self::Failure(_) => TaskStatus::Error,
        }
    }

    /// Applies the outcome to a task snapshot.
    pub(crate) fn apply(self, task: &mut Task) {
        match self {
            Self::Success(results) => {
                task.status = TaskStatus::Success;
                task.status_message = SUCCESS_MESSAGE.to_string();
                task.results = Some(results);
            },
            Self::Failure(message) => {
                task.status = TaskStatus::Error;
                task.status_message = message;
                task.results = None;
            },
        }
    }
}
