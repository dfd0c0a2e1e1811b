pub mod aggregation;
pub mod engine;
pub mod insights;
pub mod scheduler;

pub use aggregation::{AggregationFailure, AggregationReport};
pub use engine::AnalyticsEngine;
