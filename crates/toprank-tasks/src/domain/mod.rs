//! Domain types for internal task representation.
//!
//! [`TaskRecord`] is the store's view of a task: the wire [`Task`](crate::Task)
//! snapshot plus the fingerprint, generation and retention data the store
//! needs to finalize and evict it.

pub mod record;

pub use record::*;
