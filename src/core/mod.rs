//! # Core Infrastructure Module
//!
//! Memory accounting for the bounded working set and the statistics reported
//! by generation and batch runs.

pub mod stats;
pub mod working_set;

pub use stats::{BatchSummary, GenerationStats};
pub use working_set::{BufferKind, WorkingSet, WorkingSetGuard, WorkingSetSnapshot};
