//! In-memory task store.
//!
//! [`InMemoryTaskStore`] keeps one [`TaskRecord`] per fingerprint in a
//! `DashMap`. Creation goes through the map's entry API, which makes
//! create-if-absent atomic per shard: two admissions racing on one
//! fingerprint cannot both create a record.
//!
//! Successful records are scheduled on an [`EvictionQueue`]. Each queue entry
//! names the generation it was scheduled for and only removes a record of
//! that generation, so an entry left behind by an evicted-and-recreated task
//! never removes its successor. The queue only sweeps: reads and creates
//! check `expires_at` themselves, so an expired record is never served even
//! if no reaper is running. Failed records are never scheduled; they stay
//! until a reader evicts them.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use chrono::{Duration, TimeZone, Utc};
//! use toprank_tasks::clock::ManualClock;
//! use toprank_tasks::domain::Retention;
//! use toprank_tasks::store::memory::InMemoryTaskStore;
//! use toprank_tasks::store::TaskStore;
//! use toprank_tasks::TaskOutcome;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let clock = ManualClock::new(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
//! let store = InMemoryTaskStore::new().with_clock(Arc::new(clock.clone()));
//!
//! let created = store.create_if_absent("fp", Retention::Standard).await.unwrap();
//! store
//!     .finalize("fp", &created.record.generation, TaskOutcome::Success(vec![]))
//!     .await
//!     .unwrap();
//!
//! clock.advance(Duration::minutes(5));
//! assert_eq!(store.run_pending_evictions().await.unwrap(), 1);
//! assert!(store.get("fp").await.unwrap().is_none());
//! # });
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};
use crate::domain::{Retention, TaskRecord};
use crate::error::TaskError;
use crate::store::eviction::{EvictionQueue, ScheduledEviction};
use crate::types::task::TaskOutcome;

use super::{CreateOutcome, StoreConfig, TaskStore};

/// Process-local task store.
pub struct InMemoryTaskStore {
    records: DashMap<String, TaskRecord>,
    evictions: EvictionQueue,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

impl std::fmt::Debug for InMemoryTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTaskStore")
            .field("records", &self.records.len())
            .field("pending_evictions", &self.evictions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl InMemoryTaskStore {
    /// Creates an empty store on the system clock with default retention.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            evictions: EvictionQueue::new(),
            clock: Arc::new(SystemClock),
            config: StoreConfig::default(),
        }
    }

    /// Sets the retention configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of evictions waiting in the queue.
    pub fn pending_evictions(&self) -> usize {
        self.evictions.len()
    }

    fn remove_generation(&self, fingerprint: &str, generation: &str) -> bool {
        self.records
            .remove_if(fingerprint, |_, record| record.generation == generation)
            .is_some()
    }

    fn fresh(&self, fingerprint: &str, retention: Retention) -> TaskRecord {
        let record = TaskRecord::new(fingerprint.to_string(), retention, self.clock.now());
        tracing::debug!(fingerprint, generation = %record.generation, "task created");
        record
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_if_absent(
        &self,
        fingerprint: &str,
        retention: Retention,
    ) -> Result<CreateOutcome, TaskError> {
        let now = self.clock.now();
        match self.records.entry(fingerprint.to_string()) {
            Entry::Occupied(mut entry) if entry.get().is_expired(now) => {
                let record = self.fresh(fingerprint, retention);
                let expired = entry.insert(record.clone());
                tracing::debug!(
                    fingerprint,
                    generation = %expired.generation,
                    "expired task replaced"
                );
                Ok(CreateOutcome {
                    record,
                    created: true,
                })
            },
            Entry::Occupied(entry) => Ok(CreateOutcome {
                record: entry.get().clone(),
                created: false,
            }),
            Entry::Vacant(entry) => {
                let record = self.fresh(fingerprint, retention);
                entry.insert(record.clone());
                Ok(CreateOutcome {
                    record,
                    created: true,
                })
            },
        }
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<TaskRecord>, TaskError> {
        let record = self
            .records
            .get(fingerprint)
            .map(|entry| entry.value().clone());
        let Some(record) = record else {
            return Ok(None);
        };
        if record.is_expired(self.clock.now()) {
            if self.remove_generation(fingerprint, &record.generation) {
                tracing::debug!(fingerprint, "expired task evicted on read");
            }
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn finalize(
        &self,
        fingerprint: &str,
        generation: &str,
        outcome: TaskOutcome,
    ) -> Result<TaskRecord, TaskError> {
        let now = self.clock.now();
        let record = {
            let mut entry = self
                .records
                .get_mut(fingerprint)
                .filter(|entry| entry.generation == generation)
                .ok_or_else(|| TaskError::NotFound {
                    fingerprint: fingerprint.to_string(),
                })?;

            entry
                .task
                .status
                .validate_transition(fingerprint, &outcome.status())?;

            let expires_at = matches!(outcome, TaskOutcome::Success(_))
                .then(|| now + self.config.ttl_for(entry.retention));
            entry.finish(outcome, now, expires_at);
            entry.value().clone()
        };

        if let Some(at) = record.expires_at {
            self.evictions.schedule(ScheduledEviction {
                at,
                fingerprint: fingerprint.to_string(),
                generation: generation.to_string(),
            });
        }

        tracing::debug!(
            fingerprint,
            status = %record.task.status,
            expires_at = ?record.expires_at,
            "task finalized"
        );
        Ok(record)
    }

    async fn evict_if(&self, fingerprint: &str, generation: &str) -> Result<bool, TaskError> {
        let removed = self.remove_generation(fingerprint, generation);
        if removed {
            tracing::debug!(fingerprint, generation, "task evicted");
        }
        Ok(removed)
    }

    async fn run_pending_evictions(&self) -> Result<usize, TaskError> {
        let due = self.evictions.pop_due(self.clock.now());
        let mut removed = 0;
        for entry in due {
            if self.remove_generation(&entry.fingerprint, &entry.generation) {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "expired tasks evicted");
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }
}
