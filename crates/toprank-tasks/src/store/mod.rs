//! Task store trait and supporting types.
//!
//! # Architecture
//!
//! - [`TaskStore`] -- the interface the admission gate and runners use,
//!   shared as `Arc<dyn TaskStore>`.
//! - [`InMemoryTaskStore`](memory::InMemoryTaskStore) -- the process-local
//!   implementation on `DashMap`, with an [`EvictionQueue`](eviction::EvictionQueue)
//!   driven by an injectable [`Clock`](crate::clock::Clock).
//! - [`spawn_reaper`](reaper::spawn_reaper) -- background loop that applies
//!   due evictions.
//!
//! # Lifecycle
//!
//! A fingerprint maps to at most one live record. The record is created in
//! progress by [`TaskStore::create_if_absent`], moved to a terminal state
//! exactly once by [`TaskStore::finalize`], and removed either by
//! [`TaskStore::evict_if`] or once its retention lapses. Only successful
//! records have a retention; a failed record stays until it is evicted.
//! Expired records read as absent whether or not the queue has swept them.

pub mod eviction;
pub mod memory;
pub mod reaper;

use async_trait::async_trait;
use chrono::Duration;

use crate::domain::{Retention, TaskRecord};
use crate::error::TaskError;
use crate::types::task::TaskOutcome;

/// Retention configuration for finished tasks.
///
/// | Setting        | Default    | Applies to                         |
/// |----------------|------------|------------------------------------|
/// | `standard_ttl` | 5 minutes  | results computed without rewards   |
/// | `extended_ttl` | 12 hours   | results that include reward totals |
///
/// # Examples
///
/// ```
/// use chrono::Duration;
/// use toprank_tasks::domain::Retention;
/// use toprank_tasks::store::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.ttl_for(Retention::Standard), Duration::minutes(5));
/// assert_eq!(config.ttl_for(Retention::Extended), Duration::hours(12));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Retention for cheap results.
    pub standard_ttl: Duration,
    /// Retention for reward-bearing results.
    pub extended_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            standard_ttl: Duration::minutes(5),
            extended_ttl: Duration::hours(12),
        }
    }
}

impl StoreConfig {
    /// Returns the retention period for a class.
    pub fn ttl_for(&self, retention: Retention) -> Duration {
        match retention {
            Retention::Standard => self.standard_ttl,
            Retention::Extended => self.extended_ttl,
        }
    }
}

/// Result of [`TaskStore::create_if_absent`].
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    /// The live record for the fingerprint.
    pub record: TaskRecord,
    /// `true` if this call created the record; only that caller may start a
    /// runner for it.
    pub created: bool,
}

/// Storage for fingerprint-keyed tasks.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// request handler and runner of a service.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Returns the live record for `fingerprint`, creating an in-progress one
    /// if none exists or the existing one has expired. Creation is atomic: concurrent callers for the same
    /// fingerprint observe exactly one `created == true`.
    async fn create_if_absent(
        &self,
        fingerprint: &str,
        retention: Retention,
    ) -> Result<CreateOutcome, TaskError>;

    /// Returns a copy of the live record, if any. An expired record is
    /// removed and reported as absent.
    async fn get(&self, fingerprint: &str) -> Result<Option<TaskRecord>, TaskError>;

    /// Moves the record identified by `fingerprint` and `generation` into a
    /// terminal state. A successful outcome is scheduled for eviction after
    /// its retention period; a failure is kept until evicted.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if no record with that generation is live.
    /// - [`TaskError::InvalidTransition`] if the record is already terminal.
    async fn finalize(
        &self,
        fingerprint: &str,
        generation: &str,
        outcome: TaskOutcome,
    ) -> Result<TaskRecord, TaskError>;

    /// Removes the record for `fingerprint` if it is still `generation`.
    /// Returns `true` if one was removed; a newer record is left in place.
    async fn evict_if(&self, fingerprint: &str, generation: &str)
        -> Result<bool, TaskError>;

    /// Applies every eviction whose time has come. Returns how many records
    /// were removed.
    async fn run_pending_evictions(&self) -> Result<usize, TaskError>;

    /// Number of live records.
    fn len(&self) -> usize;

    /// Returns `true` if there are no live records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the retention configuration.
    fn config(&self) -> &StoreConfig;
}
