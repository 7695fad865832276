//! Reward ledger refresh.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Refreshes payout totals for contributions created in a date range.
///
/// Refreshing is idempotent; concurrent or repeated calls over overlapping
/// ranges are allowed.
#[async_trait]
pub trait RewardEnrichment: Send + Sync {
    /// Refreshes payouts for contributions created in `[start, end]`.
    ///
    /// With `cap`, only the first `cap` candidates need refreshing.
    async fn refresh(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cap: Option<usize>,
    ) -> Result<()>;
}

/// Enrichment for records whose payouts are already current.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnrichment;

#[async_trait]
impl RewardEnrichment for NoopEnrichment {
    async fn refresh(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cap: Option<usize>,
    ) -> Result<()> {
        tracing::trace!(%start, %end, ?cap, "reward refresh skipped");
        Ok(())
    }
}
