//! Repeat policies.
//!
//! This module groups the knobs that control **if** a finished task is
//! re-enqueued. **When** it becomes eligible again is the task's repeat
//! interval, carried by [`TaskSpec`](crate::TaskSpec).
//!
//! ## Quick wiring
//! ```text
//! TaskSpec { repeat: RepeatPolicy, repeat_interval: Duration, .. }
//!      └─► Dispatcher on completion:
//!           - repeat.allows_another(attempts) → RepeatWait (allowed start = now + interval)
//!           - otherwise                       → terminal, kept in the finished history
//! ```
//!
//! ## Defaults
//! - `RepeatPolicy::Never` (one-shot task).

mod repeat;

pub use repeat::RepeatPolicy;
