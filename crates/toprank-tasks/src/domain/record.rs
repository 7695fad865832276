//! Task record -- the store's internal representation of a task.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::task::{Task, TaskOutcome};

/// How long a finished task is kept before eviction.
///
/// Reward-bearing results are expensive to produce and are retained in the
/// [`Extended`](Retention::Extended) class; everything else is
/// [`Standard`](Retention::Standard). The concrete durations live in
/// [`StoreConfig`](crate::store::StoreConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retention {
    /// Cheap results (no reward data).
    Standard,
    /// Results that required reward enrichment.
    Extended,
}

impl Retention {
    /// Picks the retention class for a query.
    pub fn for_rewards(include_rewards: bool) -> Self {
        if include_rewards {
            Self::Extended
        } else {
            Self::Standard
        }
    }
}

/// Internal storage representation of a task.
///
/// Each record carries a `generation`, a UUIDv4 unique to this incarnation
/// of the fingerprint. Once a record is evicted and the same query is
/// admitted again, the new record gets a new generation, so stale runners and
/// stale eviction entries can be told apart from the live one.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use toprank_tasks::domain::{Retention, TaskRecord};
/// use toprank_tasks::TaskStatus;
///
/// let record = TaskRecord::new("fp-1".to_string(), Retention::Standard, Utc::now());
/// assert_eq!(record.task.status, TaskStatus::InProgress);
/// assert!(record.expires_at.is_none());
/// assert_eq!(record.generation.len(), 36);
/// ```
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// The wire-format snapshot handed to callers.
    pub task: Task,

    /// Query fingerprint this task computes.
    pub fingerprint: String,

    /// Unique id of this incarnation of the fingerprint.
    pub generation: String,

    /// Retention class applied once the task is finalized.
    pub retention: Retention,

    /// When the task was admitted.
    pub created_at: DateTime<Utc>,

    /// When the runner published its outcome.
    pub finalized_at: Option<DateTime<Utc>>,

    /// Scheduled eviction time. `None` while the task is in progress and for
    /// failed tasks, which live until a reader evicts them.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Creates a new in-progress record.
    pub fn new(fingerprint: String, retention: Retention, now: DateTime<Utc>) -> Self {
        Self {
            task: Task::in_progress(),
            fingerprint,
            generation: Uuid::new_v4().to_string(),
            retention,
            created_at: now,
            finalized_at: None,
            expires_at: None,
        }
    }

    /// Returns `true` if an eviction time is set and has passed. Stores treat
    /// an expired record as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Returns a clone of the wire snapshot.
    pub fn snapshot(&self) -> Task {
        self.task.clone()
    }

    /// Applies a terminal outcome and records the eviction time, if any.
    pub(crate) fn finish(
        &mut self,
        outcome: TaskOutcome,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        outcome.apply(&mut self.task);
        self.finalized_at = Some(now);
        self.expires_at = expires_at;
    }
}
