//! Background computation of one ranking.
//!
//! A runner refreshes rewards when the query needs them, runs the
//! aggregation pipeline, and publishes the outcome to the task store. The
//! outcome is published exactly once per task generation: failures,
//! including panics inside the computation, become the task's error state
//! and are never surfaced to the caller that admitted the query.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use toprank_tasks::{TaskOutcome, TaskRecord, TaskStore};

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::params::QueryParams;
use crate::pipeline::AggregationPipeline;
use crate::sources::{ContributionStore, RewardEnrichment};

/// Computes rankings and publishes them to the task store.
#[derive(Clone)]
pub struct TaskRunner {
    tasks: Arc<dyn TaskStore>,
    contributions: Arc<dyn ContributionStore>,
    enrichment: Arc<dyn RewardEnrichment>,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner").finish_non_exhaustive()
    }
}

impl TaskRunner {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        contributions: Arc<dyn ContributionStore>,
        enrichment: Arc<dyn RewardEnrichment>,
    ) -> Self {
        Self {
            tasks,
            contributions,
            enrichment,
        }
    }

    /// Produces the ranked entries for `params`.
    pub async fn compute(&self, params: &QueryParams) -> Result<Vec<Value>> {
        if params.is_expensive() {
            self.enrichment
                .refresh(params.start_date, params.end_date, params.enrichment_cap())
                .await?;
        }
        AggregationPipeline::new(params.clone())
            .run(self.contributions.as_ref())
            .await
    }

    /// Computes and finalizes the task `fingerprint`/`generation`.
    ///
    /// Returns the finalized record, or `None` if the store refused the
    /// outcome because the task was evicted or already finished.
    pub async fn run(
        &self,
        fingerprint: &Fingerprint,
        generation: &str,
        params: &QueryParams,
    ) -> Option<TaskRecord> {
        let outcome = match AssertUnwindSafe(self.compute(params)).catch_unwind().await {
            Ok(Ok(results)) => {
                tracing::info!(%fingerprint, results = results.len(), "ranking computed");
                TaskOutcome::Success(results)
            },
            Ok(Err(e)) => {
                tracing::warn!(%fingerprint, error = %e, "ranking failed");
                TaskOutcome::Failure(e.to_string())
            },
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(%fingerprint, %message, "ranking panicked");
                TaskOutcome::Failure(format!("ranking panicked: {message}"))
            },
        };

        match self
            .tasks
            .finalize(fingerprint.as_str(), generation, outcome)
            .await
        {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(%fingerprint, error = %e, "discarding ranking outcome");
                None
            },
        }
    }

    /// Runs [`run`](Self::run) on a detached tokio task.
    pub fn spawn(
        &self,
        fingerprint: Fingerprint,
        generation: String,
        params: QueryParams,
    ) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            runner.run(&fingerprint, &generation, &params).await;
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
