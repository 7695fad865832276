//! Ranked "top projects" and "top contributions" views.
//!
//! A query is admitted by the [`gate`], which answers immediately with the
//! current snapshot of the query's task. The first admission of a query
//! creates the task and spawns a [`runner`] that refreshes rewards if
//! needed, runs the [`pipeline`], and publishes the result. Identical
//! queries share one task, keyed by its [`fingerprint`], until the task is
//! evicted.
//!
//! # Module Organization
//!
//! - [`params`] - Query parameters, defaults and validation
//! - [`fingerprint`] - Stable query identity
//! - [`pipeline`] - Aggregation stages and post-processing
//! - [`sources`] - Contribution store, reward enrichment, admission limiter
//! - [`runner`] - Background computation of one ranking
//! - [`gate`] - [`RankingService`] and its builder
//! - [`config`] - TOML service configuration
//! - [`http`] - axum router (feature `http`)
//!
//! Task storage lives in the [`toprank_tasks`] crate and is re-exported as
//! [`tasks`].
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use toprank::{AdmissionOutcome, RankingService, RawQuery};
//! use toprank::sources::MemoryContributionStore;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let service = RankingService::builder()
//!     .contributions(MemoryContributionStore::new(vec![json!({
//!         "project": {"id": 1},
//!         "created": "2020-01-02T00:00:00",
//!     })]))
//!     .build();
//!
//! let query = RawQuery {
//!     start_date: Some("2020-01-01".to_string()),
//!     end_date: Some("2020-01-08".to_string()),
//!     ..RawQuery::default()
//! };
//! let admission = service.admit(&query).await;
//! assert!(matches!(admission.outcome, AdmissionOutcome::Snapshot(_)));
//! admission.runner.unwrap().await.unwrap();
//!
//! let polled = service.admit(&query).await;
//! let body = serde_json::to_value(&polled.outcome).unwrap();
//! assert_eq!(body["status"], json!(0));
//! assert_eq!(body["results"][0]["count"], json!(1));
//! # });
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gate;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "logging")]
pub mod logging;
pub mod params;
pub mod pipeline;
pub mod runner;
pub mod sources;

pub use toprank_tasks as tasks;

pub use config::ServiceConfig;
pub use error::{Error, Result, ValidationError};
pub use fingerprint::Fingerprint;
pub use gate::{Admission, AdmissionOutcome, RankingService, RankingServiceBuilder};
pub use params::{QueryParams, RawQuery, RetrieveBy, SortBy};
pub use runner::TaskRunner;
