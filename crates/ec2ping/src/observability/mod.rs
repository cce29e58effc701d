//! Observability Module
//!
//! - `events`: Structured event logging with consistent fields
//! - `metrics`: Round counters and histograms through the `metrics` facade
//! - `tracing`: Subscriber setup for binaries embedding the resolver

pub mod events;
pub mod metrics;
pub mod tracing;

pub use self::metrics::register_metric_descriptions;
pub use self::tracing::{init_tracing, TracingConfig};
