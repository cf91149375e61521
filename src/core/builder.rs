use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::error::DispatcherError;
use crate::events::{Event, EventKind, EventQueue};
use crate::ids::ListenerId;
use crate::listeners::{Listener, Registry};

use super::dispatcher::Dispatcher;

/// Builder for constructing a [`Dispatcher`] with listeners attached up front.
///
/// Listeners added here receive the dispatcher's very first events
/// (including `ListenerAdd` for themselves).
pub struct DispatcherBuilder {
    cfg: Config,
    listeners: Vec<(Vec<EventKind>, Listener, bool)>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            listeners: Vec::new(),
        }
    }

    /// Subscribes a listener to `kinds`.
    pub fn with_listener(mut self, kinds: &[EventKind], listener: Listener) -> Self {
        self.listeners.push((kinds.to_vec(), listener, false));
        self
    }

    /// Subscribes a listener to `kinds` and puts it in the locked-set.
    pub fn with_locked_listener(mut self, kinds: &[EventKind], listener: Listener) -> Self {
        self.listeners.push((kinds.to_vec(), listener, true));
        self
    }

    /// Builds and returns the dispatcher.
    ///
    /// A listener that duplicates an earlier (listener, kind) pair is skipped and logged.
    pub fn build(self) -> Arc<Dispatcher> {
        let events = EventQueue::new(self.cfg.events_capacity_clamped());
        let mut registry = Registry::new();
        let mut locked: HashSet<ListenerId> = HashSet::new();

        for (kinds, listener, lock) in self.listeners {
            let id = listener.id();
            match registry.subscribe(&kinds, listener) {
                Ok(added) => {
                    if lock {
                        locked.insert(id);
                    }
                    if let Some(snapshot) = registry.snapshot(id, &locked) {
                        for kind in added {
                            events.publish(
                                Event::new(EventKind::ListenerAdd)
                                    .with_listener(snapshot.clone(), kind),
                            );
                        }
                    }
                }
                Err(e @ DispatcherError::DuplicateListener { .. }) => {
                    tracing::warn!(error = %e, "skipping duplicate listener subscription");
                }
                Err(e) => tracing::warn!(error = %e, "skipping listener"),
            }
        }

        Arc::new(Dispatcher::new_internal(&self.cfg, registry, locked, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_registers_and_locks() {
        let open = Listener::from_fn("open", |_| {});
        let guarded = Listener::from_fn("guarded", |_| {});
        let (open_id, guarded_id) = (open.id(), guarded.id());

        let d = DispatcherBuilder::new(Config::default())
            .with_listener(&[EventKind::TaskAdd], open)
            .with_locked_listener(&EventKind::ALL, guarded)
            .build();

        assert_eq!(d.locked_listeners().await, vec![guarded_id]);
        let stats = d.stats().await;
        assert_eq!(stats.listeners_total, 2);
        assert_eq!(stats.listener_bindings, 1 + EventKind::ALL.len());
        assert!(d.listener(open_id).await.is_some_and(|l| !l.locked));
        // one ListenerAdd per subscribed kind
        assert_eq!(stats.pending_events, 1 + EventKind::ALL.len());
    }
}
