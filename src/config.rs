//! # Dispatcher configuration.
//!
//! Provides [`Config`], the tunables an external configuration store supplies at startup
//! and re-applies on change (see [`WorkersComponent::apply_config`](crate::WorkersComponent::apply_config)).
//!
//! ## Sentinel values
//! - `execute_tasks_interval = 0` / `notify_listeners_interval = 0` → clamped to [`MIN_TICK`]
//! - `completed_capacity = 0` → finished tasks are dropped as soon as they reach a terminal state
//! - `events_capacity = 0` → clamped to 1
//!
//! Durations are (de)serialized as integer milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest tick period accepted by the dispatcher loop.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Configuration for the dispatcher and its component wrapper.
///
/// ## Field semantics
/// - `workers_count`: workers created at startup; raising it later adds workers, lowering it never removes any
/// - `execute_tasks_interval`: period of the execute-tick (task assignment)
/// - `notify_listeners_interval`: period of the notify-tick (event delivery)
/// - `logging_listener`: attach the built-in, locked logging listener
/// - `completed_capacity`: how many finished tasks stay visible for introspection
/// - `events_capacity`: pending events kept between notify-ticks (oldest dropped beyond it)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default number of workers.
    pub workers_count: usize,

    /// Period of the execute-tick.
    #[serde(with = "duration_ms")]
    pub execute_tasks_interval: Duration,

    /// Period of the notify-tick.
    #[serde(with = "duration_ms")]
    pub notify_listeners_interval: Duration,

    /// Whether the built-in logging listener is attached.
    pub logging_listener: bool,

    /// Bound of the recently-completed task history.
    pub completed_capacity: usize,

    /// Bound of the pending-event queue.
    ///
    /// Beyond it the oldest pending event is dropped (see `DispatcherStats::dropped_events`),
    /// so listeners, the built-in metrics counters included, can under-count bursts.
    pub events_capacity: usize,
}

impl Config {
    /// Execute-tick period, never below [`MIN_TICK`].
    #[inline]
    pub fn execute_interval(&self) -> Duration {
        self.execute_tasks_interval.max(MIN_TICK)
    }

    /// Notify-tick period, never below [`MIN_TICK`].
    #[inline]
    pub fn notify_interval(&self) -> Duration {
        self.notify_listeners_interval.max(MIN_TICK)
    }

    /// Pending-event queue bound, clamped to a minimum of 1.
    #[inline]
    pub fn events_capacity_clamped(&self) -> usize {
        self.events_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `workers_count = 2`
    /// - `execute_tasks_interval = 1s`
    /// - `notify_listeners_interval = 1s`
    /// - `logging_listener = true`
    /// - `completed_capacity = 1000`
    /// - `events_capacity = 4096`
    fn default() -> Self {
        Self {
            workers_count: 2,
            execute_tasks_interval: Duration::from_secs(1),
            notify_listeners_interval: Duration::from_secs(1),
            logging_listener: true,
            completed_capacity: 1000,
            events_capacity: 4096,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let ms = d.as_millis().min(u128::from(u64::MAX)) as u64;
        s.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.workers_count, 2);
        assert_eq!(cfg.execute_interval(), Duration::from_secs(1));
        assert_eq!(cfg.notify_interval(), Duration::from_secs(1));
        assert!(cfg.logging_listener);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"workers_count": 5, "execute_tasks_interval": 250}"#)
                .unwrap();
        assert_eq!(cfg.workers_count, 5);
        assert_eq!(cfg.execute_tasks_interval, Duration::from_millis(250));
        assert_eq!(cfg.notify_listeners_interval, Duration::from_secs(1));
        assert_eq!(cfg.completed_capacity, 1000);
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let cfg = Config {
            execute_tasks_interval: Duration::ZERO,
            notify_listeners_interval: Duration::ZERO,
            events_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.execute_interval(), MIN_TICK);
        assert_eq!(cfg.notify_interval(), MIN_TICK);
        assert_eq!(cfg.events_capacity_clamped(), 1);
    }

    #[test]
    fn test_serializes_durations_as_millis() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["execute_tasks_interval"], 1000);
    }
}
