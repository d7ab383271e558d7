//! Per-mirror synchronization: index fetch, dedup, and artifact planning.

mod planner;
mod types;

pub use planner::SyncPlanner;
pub use types::*;
