//! Admission gate.
//!
//! [`RankingService::admit`] answers every ranking request without waiting
//! for a computation:
//!
//! 1. Normalize and validate the query.
//! 2. Fingerprint it.
//! 3. Serve the cached task if one exists. A task in the error state is
//!    evicted as it is served, so the next identical query recomputes. Only
//!    the generation that was read is evicted; a successor created by a
//!    concurrent reader stays.
//! 4. On a miss, ask the [`AdmissionLimiter`] if the query is expensive.
//! 5. Create the task and, if this call created it, spawn a [`TaskRunner`].
//!
//! Callers poll by repeating the same query.

use std::sync::Arc;

use serde::ser::{Serialize, Serializer};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toprank_tasks::{
    Clock, InMemoryTaskStore, SystemClock, Task, TaskStatus, TaskStore,
};

use crate::config::ServiceConfig;
use crate::error::ValidationError;
use crate::fingerprint::Fingerprint;
use crate::params::{start_of_day, RawQuery, ValidationPolicy};
use crate::runner::TaskRunner;
use crate::sources::{
    AdmissionLimiter, ContributionStore, GovernorLimiter, MemoryContributionStore,
    NoopEnrichment, RewardEnrichment, Unlimited,
};

/// Error text returned to throttled callers.
pub const THROTTLED_MESSAGE: &str = "too many requests";

/// What the caller is told.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    /// The query was rejected, or failed the advisory date-range check.
    Invalid(ValidationError),
    /// An expensive query was refused by the limiter. No task exists.
    Throttled,
    /// The task store failed.
    Unavailable(String),
    /// The current snapshot of the query's task.
    Snapshot(Task),
}

impl AdmissionOutcome {
    /// HTTP status for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Invalid(_) => 400,
            Self::Throttled => 429,
            Self::Unavailable(_) => 503,
            Self::Snapshot(_) => 200,
        }
    }
}

impl Serialize for AdmissionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Snapshot(task) => task.serialize(serializer),
            Self::Invalid(e) => json!({ "error": e.to_string() }).serialize(serializer),
            Self::Throttled => json!({ "error": THROTTLED_MESSAGE }).serialize(serializer),
            Self::Unavailable(message) => json!({ "error": message }).serialize(serializer),
        }
    }
}

/// Result of [`RankingService::admit`].
#[derive(Debug)]
pub struct Admission {
    /// Reply for the caller.
    pub outcome: AdmissionOutcome,
    /// Fingerprint of the query, if it normalized.
    pub fingerprint: Option<Fingerprint>,
    /// The runner spawned by this admission, if any.
    pub runner: Option<JoinHandle<()>>,
}

impl Admission {
    fn rejected(outcome: AdmissionOutcome, fingerprint: Option<Fingerprint>) -> Self {
        Self {
            outcome,
            fingerprint,
            runner: None,
        }
    }
}

/// The ranking service: admission gate, task store and runner.
#[derive(Clone)]
pub struct RankingService {
    tasks: Arc<dyn TaskStore>,
    runner: TaskRunner,
    limiter: Arc<dyn AdmissionLimiter>,
    clock: Arc<dyn Clock>,
    policy: ValidationPolicy,
}

impl std::fmt::Debug for RankingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankingService")
            .field("tasks", &self.tasks.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RankingService {
    /// Starts building a service.
    pub fn builder() -> RankingServiceBuilder {
        RankingServiceBuilder::new()
    }

    /// The task store.
    pub fn tasks(&self) -> &Arc<dyn TaskStore> {
        &self.tasks
    }

    /// Admits or polls a ranking query.
    pub async fn admit(&self, raw: &RawQuery) -> Admission {
        let today = start_of_day(self.clock.now());
        let checked = match raw.normalize(today, &self.policy) {
            Ok(checked) => checked,
            Err(e) => {
                tracing::info!(error = %e, "query rejected");
                return Admission::rejected(AdmissionOutcome::Invalid(e), None);
            },
        };
        let params = checked.params;
        let fingerprint = Fingerprint::of(&params);
        let reply = |task: Task| match &checked.advisory {
            Some(advisory) => AdmissionOutcome::Invalid(advisory.clone()),
            None => AdmissionOutcome::Snapshot(task),
        };

        match self.tasks.get(fingerprint.as_str()).await {
            Ok(Some(record)) => {
                if record.task.status == TaskStatus::Error {
                    tracing::debug!(%fingerprint, "serving failed task and evicting it");
                    if let Err(e) = self
                        .tasks
                        .evict_if(fingerprint.as_str(), &record.generation)
                        .await
                    {
                        tracing::warn!(%fingerprint, error = %e, "eviction failed");
                    }
                } else {
                    tracing::debug!(%fingerprint, status = %record.task.status, "cache hit");
                }
                return Admission::rejected(reply(record.snapshot()), Some(fingerprint));
            },
            Ok(None) => {},
            Err(e) => {
                tracing::warn!(%fingerprint, error = %e, "task lookup failed");
                return Admission::rejected(
                    AdmissionOutcome::Unavailable(e.to_string()),
                    Some(fingerprint),
                );
            },
        }

        if params.is_expensive() && !self.limiter.check() {
            tracing::info!(%fingerprint, "expensive query throttled");
            return Admission::rejected(AdmissionOutcome::Throttled, Some(fingerprint));
        }

        let created = match self
            .tasks
            .create_if_absent(fingerprint.as_str(), params.retention())
            .await
        {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(%fingerprint, error = %e, "task creation failed");
                return Admission::rejected(
                    AdmissionOutcome::Unavailable(e.to_string()),
                    Some(fingerprint),
                );
            },
        };

        let runner = created.created.then(|| {
            tracing::info!(
                %fingerprint,
                retrieve_by = %params.retrieve_by,
                sort_by = %params.sort_by,
                include_rewards = params.include_rewards,
                "ranking admitted"
            );
            self.runner.spawn(
                fingerprint.clone(),
                created.record.generation.clone(),
                params.clone(),
            )
        });

        Admission {
            outcome: reply(created.record.snapshot()),
            fingerprint: Some(fingerprint),
            runner,
        }
    }

    /// Spawns the eviction loop for this service's task store.
    pub fn spawn_reaper(
        &self,
        interval: std::time::Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        toprank_tasks::spawn_reaper(self.tasks.clone(), interval, shutdown)
    }
}

/// Builder for [`RankingService`].
///
/// Every collaborator has an in-process default: an in-memory task store, an
/// empty contribution store, no-op enrichment, no throttling, and the system
/// clock.
///
/// # Examples
///
/// ```
/// use toprank::gate::RankingService;
/// use toprank::sources::{GovernorLimiter, MemoryContributionStore};
///
/// let service = RankingService::builder()
///     .contributions(MemoryContributionStore::new(vec![]))
///     .limiter(GovernorLimiter::new(30, 5))
///     .build();
/// assert!(service.tasks().is_empty());
/// ```
#[allow(missing_debug_implementations)]
pub struct RankingServiceBuilder {
    tasks: Option<Arc<dyn TaskStore>>,
    contributions: Arc<dyn ContributionStore>,
    enrichment: Arc<dyn RewardEnrichment>,
    limiter: Arc<dyn AdmissionLimiter>,
    clock: Arc<dyn Clock>,
    config: ServiceConfig,
}

impl Default for RankingServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingServiceBuilder {
    /// Creates a builder with in-process defaults.
    pub fn new() -> Self {
        Self {
            tasks: None,
            contributions: Arc::new(MemoryContributionStore::default()),
            enrichment: Arc::new(NoopEnrichment),
            limiter: Arc::new(Unlimited),
            clock: Arc::new(SystemClock),
            config: ServiceConfig::default(),
        }
    }

    /// Applies validation limits, retention and a token-bucket limiter from
    /// `config`. Call before [`limiter`](Self::limiter) to override the
    /// limiter.
    pub fn config(mut self, config: &ServiceConfig) -> Self {
        self.limiter = Arc::new(GovernorLimiter::new(
            config.expensive_per_minute,
            config.expensive_burst,
        ));
        self.config = config.clone();
        self
    }

    /// Uses a specific task store. Retention settings from
    /// [`config`](Self::config) do not apply to it.
    pub fn tasks(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(store);
        self
    }

    /// Sets the contribution store.
    pub fn contributions(mut self, store: impl ContributionStore + 'static) -> Self {
        self.contributions = Arc::new(store);
        self
    }

    /// Sets a shared contribution store.
    pub fn contributions_arc(mut self, store: Arc<dyn ContributionStore>) -> Self {
        self.contributions = store;
        self
    }

    /// Sets the reward enrichment step run before reward queries.
    pub fn enrichment(mut self, enrichment: impl RewardEnrichment + 'static) -> Self {
        self.enrichment = Arc::new(enrichment);
        self
    }

    /// Sets a shared reward enrichment step.
    pub fn enrichment_arc(mut self, enrichment: Arc<dyn RewardEnrichment>) -> Self {
        self.enrichment = enrichment;
        self
    }

    /// Sets the limiter consulted for expensive cache misses.
    pub fn limiter(mut self, limiter: impl AdmissionLimiter + 'static) -> Self {
        self.limiter = Arc::new(limiter);
        self
    }

    /// Sets a shared limiter.
    pub fn limiter_arc(mut self, limiter: Arc<dyn AdmissionLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Time source for the default end date and, when no task store is
    /// given, for retention.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the service. The reaper is not started; expired tasks are
    /// still never served.
    pub fn build(self) -> RankingService {
        let tasks = self.tasks.unwrap_or_else(|| {
            Arc::new(
                InMemoryTaskStore::new()
                    .with_config(self.config.store_config())
                    .with_clock(self.clock.clone()),
            )
        });
        RankingService {
            runner: TaskRunner::new(tasks.clone(), self.contributions, self.enrichment),
            tasks,
            limiter: self.limiter,
            clock: self.clock,
            policy: self.config.validation_policy(),
        }
    }
}
