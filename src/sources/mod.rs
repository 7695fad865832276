//! Collaborators the ranking service depends on.
//!
//! - [`ContributionStore`] executes aggregation stages over contribution
//!   records.
//! - [`RewardEnrichment`] refreshes payout totals from the reward ledger
//!   before rewards are read.
//! - [`AdmissionLimiter`] decides whether an expensive query may start a
//!   computation.
//!
//! Each has an in-process implementation so the service runs without any
//! external system.

pub mod contributions;
pub mod enrichment;
pub mod limiter;

pub use contributions::{ContributionStore, MemoryContributionStore};
pub use enrichment::{NoopEnrichment, RewardEnrichment};
pub use limiter::{AdmissionLimiter, GovernorLimiter, Unlimited};
