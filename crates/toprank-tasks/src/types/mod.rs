//! Wire types returned to callers of the task store.

pub mod task;

pub use task::*;
