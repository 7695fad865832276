//! Fingerprint-keyed task store for toprank.
//!
//! A task records one asynchronous ranking computation. It is created in
//! progress when a query is first admitted, finalized exactly once by the
//! runner that computes it. A successful result is evicted after a retention
//! period that depends on how expensive it was to produce; a failure stays
//! until the first reader evicts it.
//!
//! # Module Organization
//!
//! - [`types`] - Wire snapshot ([`Task`]) and status codes
//! - [`domain`] - Store-internal [`TaskRecord`] and [`Retention`] classes
//! - [`store`] - [`TaskStore`] trait, in-memory store, eviction queue, reaper
//! - [`clock`] - Injectable time source
//! - [`error`] - [`TaskError`]

pub mod clock;
pub mod domain;
pub mod error;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{Retention, TaskRecord};
pub use error::TaskError;
pub use store::memory::InMemoryTaskStore;
pub use store::reaper::spawn_reaper;
pub use store::{CreateOutcome, StoreConfig, TaskStore};
pub use types::*;
