pub mod combine;
pub mod config;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod range;
pub mod rank;
pub mod snapshot;
pub mod timeseries;

pub use event::RawEvent;
pub use range::{DateInterval, RangeError, RangeToken};
pub use snapshot::DailySnapshot;
