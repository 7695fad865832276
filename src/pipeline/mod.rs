//! Aggregation pipeline.
//!
//! Turns a normalized query into store stages, runs them against a
//! [`ContributionStore`], and shapes the returned documents into ranked
//! entries:
//!
//! 1. [`Match`](Stage::Match) on creation time. With `only_new` the lower
//!    bound is left out here and enforced per group in post-processing,
//!    since a project must be dropped when *any* of its contributions
//!    predates the window.
//! 2. By project, [`Group`](Stage::Group) then [`Sort`](Stage::Sort) on the
//!    group size.
//! 3. Post-processing, see [`post`].

pub mod payout;
pub mod post;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::params::{QueryParams, RetrieveBy};
use crate::sources::ContributionStore;

/// Field names of contribution records and group documents.
pub mod fields {
    /// Creation time of a contribution.
    pub const CREATED: &str = "created";
    /// Project a contribution belongs to.
    pub const PROJECT: &str = "project";
    /// Key inside the project object that identifies it.
    pub const PROJECT_ID: &str = "id";
    /// Vote balance of a contribution.
    pub const NET_VOTES: &str = "net_votes";
    /// Payout not yet paid out.
    pub const PENDING_PAYOUT: &str = "pending_payout_value";
    /// Payout already paid out.
    pub const TOTAL_PAYOUT: &str = "total_payout_value";
    /// Contributions in a project group.
    pub const COUNT: &str = "count";
    /// Members of a project group.
    pub const CONTRIBUTIONS: &str = "contributions";
    /// Computed reward total.
    pub const REWARDS: &str = "rewards";
}

/// One aggregation step executed by the contribution store.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keeps records created in `[created_from, created_before)`. No lower
    /// bound when `created_from` is `None`.
    Match {
        created_from: Option<DateTime<Utc>>,
        created_before: DateTime<Utc>,
    },
    /// Groups records by project into `{project, count, contributions}`.
    ///
    /// Members keep their creation time, plus both payout fields when
    /// `with_rewards` is set.
    Group { with_rewards: bool },
    /// Orders documents by a numeric field.
    Sort {
        field: &'static str,
        descending: bool,
    },
}

/// Stages and post-processing for one query.
#[derive(Debug, Clone)]
pub struct AggregationPipeline {
    params: QueryParams,
}

impl AggregationPipeline {
    pub fn new(params: QueryParams) -> Self {
        Self { params }
    }

    /// The stages sent to the contribution store.
    pub fn stages(&self) -> Vec<Stage> {
        let params = &self.params;
        let mut stages = vec![Stage::Match {
            created_from: (!params.only_new).then_some(params.start_date),
            created_before: params.end_date,
        }];
        if params.retrieve_by == RetrieveBy::Projects {
            stages.push(Stage::Group {
                with_rewards: params.include_rewards,
            });
            stages.push(Stage::Sort {
                field: fields::COUNT,
                descending: true,
            });
        }
        stages
    }

    /// Aggregates and post-processes into at most `limit` ranked entries.
    pub async fn run(&self, store: &dyn ContributionStore) -> Result<Vec<Value>> {
        let stages = self.stages();
        let documents = store.aggregate(&stages).await?;
        tracing::debug!(documents = documents.len(), "aggregation returned");
        post::rank(&self.params, documents)
    }
}
