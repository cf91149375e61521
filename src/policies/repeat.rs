//! # Repeat policies for submitted tasks.
//!
//! [`RepeatPolicy`] determines whether a task is re-enqueued after it reaches
//! `Success`, `Fail` or `FailByTimeout`.
//!
//! - [`RepeatPolicy::Never`] the task runs once (default).
//! - [`RepeatPolicy::Times`] the task runs once plus `n` repeats.
//! - [`RepeatPolicy::Forever`] the task is re-enqueued after every run.
//!
//! ## Choosing the right policy
//!
//! **One-shot tasks** (mail sending, a single HTTP call):
//! ```text
//! RepeatPolicy::Never            → Wait → Process → Success/Fail (terminal)
//! ```
//!
//! **Bounded polling**:
//! ```text
//! RepeatPolicy::Times(3)         → 4 runs total, repeat interval between them
//! ```
//!
//! **Periodic refresh** (stats, health checks):
//! ```text
//! RepeatPolicy::Forever          → runs, waits the repeat interval, runs again
//! ```
//!
//! Repeats are the only retry mechanism: a failed run is re-enqueued only
//! if the policy still allows another run.

use serde::{Serialize, Serializer};

/// Policy controlling whether a task is re-enqueued after a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepeatPolicy {
    /// Run once.
    #[default]
    Never,
    /// Run once, then repeat `n` more times.
    Times(u32),
    /// Repeat after every run until removed.
    Forever,
}

impl RepeatPolicy {
    /// Returns `true` if the task may run again after `attempts` finished runs.
    ///
    /// ```
    /// use workvisor::RepeatPolicy;
    ///
    /// assert!(!RepeatPolicy::Never.allows_another(1));
    /// assert!(RepeatPolicy::Times(2).allows_another(2));
    /// assert!(!RepeatPolicy::Times(2).allows_another(3));
    /// ```
    pub fn allows_another(&self, attempts: u64) -> bool {
        match *self {
            RepeatPolicy::Never => false,
            RepeatPolicy::Times(n) => attempts <= u64::from(n),
            RepeatPolicy::Forever => true,
        }
    }

    /// Returns `true` unless the policy is [`RepeatPolicy::Never`].
    pub fn is_repeating(&self) -> bool {
        !matches!(self, RepeatPolicy::Never)
    }
}

/// Serialized as the repeat count: `0`, `n`, or the string `"forever"`.
impl Serialize for RepeatPolicy {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match *self {
            RepeatPolicy::Never => s.serialize_u32(0),
            RepeatPolicy::Times(n) => s.serialize_u32(n),
            RepeatPolicy::Forever => s.serialize_str("forever"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_runs_once() {
        assert!(!RepeatPolicy::Never.allows_another(1));
        assert!(!RepeatPolicy::Never.is_repeating());
    }

    #[test]
    fn test_times_counts_repeats_not_runs() {
        let policy = RepeatPolicy::Times(1);
        assert!(policy.allows_another(1));
        assert!(!policy.allows_another(2));
    }

    #[test]
    fn test_times_zero_behaves_like_never() {
        assert!(!RepeatPolicy::Times(0).allows_another(1));
    }

    #[test]
    fn test_forever_never_exhausts() {
        assert!(RepeatPolicy::Forever.allows_another(u64::MAX));
    }

    #[test]
    fn test_serialize_shape() {
        assert_eq!(serde_json::to_value(RepeatPolicy::Times(3)).unwrap(), 3);
        assert_eq!(
            serde_json::to_value(RepeatPolicy::Forever).unwrap(),
            "forever"
        );
    }
}
