//! Recommendation aggregation: ranked neighbors to scored laboratory tests.

pub mod aggregator;
pub mod types;

pub use aggregator::{aggregate, aggregate_with};
pub use types::*;
