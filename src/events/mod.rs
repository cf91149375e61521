//! Lifecycle events: types and the pending-event queue.
//!
//! This module groups the event **data model** and the **queue** that buffers
//! events between notify-ticks.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Status`] event classification and payload
//! - [`EventQueue`] bounded FIFO drained by the dispatcher's notify-tick
//!
//! ## Quick reference
//! - **Publishers**: every mutating `Dispatcher` call, the execute-tick and
//!   completion handling.
//! - **Consumers**: listeners registered in the dispatcher's registry, invoked
//!   from the notify-tick only.

mod event;
mod queue;

pub use event::{Event, EventKind, Status};
pub use queue::EventQueue;
