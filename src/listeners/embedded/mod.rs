//! # Built-in listeners
//!
//! Attached by [`WorkersComponent`](crate::WorkersComponent) and protected via the locked-set.
//!
//! - [`LogListener`]: writes every event to `tracing`.
//! - [`MetricsListener`] / [`MetricsCollector`]: status counters and gauges (`metrics` feature).

mod log;
#[cfg(feature = "metrics")]
mod metrics;

pub use log::{LOG_LISTENER_NAME, LogListener};
#[cfg(feature = "metrics")]
pub use self::metrics::{METRICS_LISTENER_EVENTS, METRICS_LISTENER_NAME, MetricsCollector, MetricsListener};
