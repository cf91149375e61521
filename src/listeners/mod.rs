//! # Event listeners for the dispatcher.
//!
//! This module provides the [`Listen`] trait, the [`Listener`] handle, and the
//! registry that maps event kinds to listeners.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Dispatcher ── publish(Event) ──► EventQueue ──► notify-tick ──► Registry::targets(kind)
//!                                                                       │
//!                                                        ┌──────────────┼──────────────┐
//!                                                        ▼              ▼              ▼
//!                                                   LogListener  MetricsListener    Custom
//! ```
//!
//! ## Listener types
//! - **Built-in** listeners (logging, metrics) are attached by the component wrapper and locked.
//! - **Custom** listeners implement [`Listen`] or wrap a closure with [`Listener::from_fn`].

pub mod embedded;
mod listener;
mod registry;

pub use listener::{Listen, Listener, ListenerSnapshot};
pub(crate) use registry::{Registry, deliver};
