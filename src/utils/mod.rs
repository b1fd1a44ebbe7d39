//! Common utilities shared across the pipeline

pub mod time;

pub use time::{
    current_timestamp_nanos,
    current_timestamp_secs,
    MockTimeProvider,
    SystemTimeProvider,
    TickRateMeter,
    TimeProvider,
};
