//! Batched per-object statistics collection.
//!
//! A container's statistics are fetched with one query and applied to the
//! objects its cache already holds.

mod collector;


pub use collector::{CollectOutcome, StatisticsCollector, StatsApplier, StatsRowSource};
