//! # Event listener trait and handle.
//!
//! Provides [`Listen`], the extension point for plugging event handlers into the dispatcher,
//! and [`Listener`], the identified handle the registry stores.
//!
//! Each listener gets:
//! - **Identity** (UUID v4), a name and a creation time
//! - **Per-kind subscriptions** (see [`Dispatcher::add_listener`](crate::Dispatcher::add_listener))
//! - **Panic isolation** (a panic is caught, logged and counted as a failure)
//!
//! ## Rules
//! - Listeners are invoked from the dispatcher's notify-tick, never while dispatcher locks are held.
//! - Listeners for one kind are invoked sequentially in subscription order.
//! - A slow listener delays the notify-tick, not task execution.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use workvisor::{Event, EventKind, Listen, Listener};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Listen for Audit {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::TaskRemove) {
//!             // write an audit record, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &str { "audit" }
//! }
//!
//! let listener = Listener::new(Audit);
//! assert_eq!(listener.name(), "audit");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::events::{Event, EventKind};
use crate::ids::ListenerId;

/// Event handler invoked by the dispatcher's notify-tick.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; a panic is caught but counted as a failure.
#[async_trait]
pub trait Listen: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Returns the listener name used in logs, metadata and snapshots.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it when possible.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Identified listener handle.
///
/// Cheap to clone; the id is fixed at construction and is what subscriptions,
/// removal and the locked-set refer to.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    name: Arc<str>,
    created_at: DateTime<Utc>,
    handler: Arc<dyn Listen>,
}

impl Listener {
    /// Wraps a handler, assigning a fresh id.
    pub fn new<L: Listen>(handler: L) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Wraps a shared handler, assigning a fresh id.
    pub fn from_arc(handler: Arc<dyn Listen>) -> Self {
        Self {
            id: ListenerId::new(),
            name: Arc::from(handler.name()),
            created_at: Utc::now(),
            handler,
        }
    }

    /// Creates a listener from a synchronous closure.
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use workvisor::Listener;
    ///
    /// let seen = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&seen);
    /// let listener = Listener::from_fn("counter", move |_ev| {
    ///     counter.fetch_add(1, Ordering::Relaxed);
    /// });
    /// assert_eq!(listener.name(), "counter");
    /// ```
    pub fn from_fn<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self::new(FnListener {
            name: name.into(),
            f,
        })
    }

    /// Overrides the display name.
    pub fn with_name(mut self, name: impl AsRef<str>) -> Self {
        self.name = Arc::from(name.as_ref());
        self
    }

    /// Listener id.
    #[inline]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Listener name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation timestamp.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn handler(&self) -> &Arc<dyn Listen> {
        &self.handler
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish()
    }
}

struct FnListener<F> {
    name: Cow<'static, str>,
    f: F,
}

#[async_trait]
impl<F> Listen for FnListener<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    async fn on_event(&self, event: &Event) {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Point-in-time copy of a registered listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerSnapshot {
    pub id: ListenerId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Kinds the listener is subscribed to, in subscription order.
    pub events: Vec<EventKind>,
    /// Protected from removal.
    pub locked: bool,
    /// Successful and failed invocations.
    pub fires: u64,
    /// Invocations that panicked.
    pub failures: u64,
    pub first_fired_at: Option<DateTime<Utc>>,
    pub last_fired_at: Option<DateTime<Utc>>,
}
