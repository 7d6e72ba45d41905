//! Subscription registry: channel name -> ordered list of handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use joist_protocol::ChangeEvent;

/// A callback invoked for every decoded event on a subscribed channel.
///
/// Handlers must not block: anything slow hands off internally (the
/// WebSocket forwarder enqueues onto per-connection channels and returns).
/// A returned error is logged and isolated; it never reaches the pump.
pub trait ChangeHandler: Send + Sync {
    /// Short name used in dispatch logs.
    fn name(&self) -> &str;

    /// Handle one decoded event.
    fn handle(&self, event: &ChangeEvent) -> anyhow::Result<()>;
}

/// Handle returned by [`SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn ChangeHandler>,
}

/// Maps channel names to registered handlers.
///
/// Registration order is preserved per channel. Duplicate registrations are
/// kept as-is: registering the same handler twice means it runs twice per
/// event.
pub struct SubscriptionRegistry {
    channels: DashMap<String, Vec<Subscription>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for a channel. Returns its subscription id.
    pub fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn ChangeHandler>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Subscribed handler '{}' to channel {channel}", handler.name());
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    /// Remove a subscription. Unknown ids are a no-op.
    pub fn unsubscribe(&self, channel: &str, id: SubscriptionId) {
        if let Some(mut subs) = self.channels.get_mut(channel) {
            subs.retain(|sub| sub.id != id);
        }
    }

    /// Invoke every handler registered for the event's channel, in
    /// registration order.
    ///
    /// Handlers are invoked over a snapshot of the list, so a handler may
    /// subscribe/unsubscribe without deadlocking the dispatch. One failing
    /// handler does not stop the rest.
    pub fn dispatch(&self, event: &ChangeEvent) {
        let handlers: Vec<Arc<dyn ChangeHandler>> = match self.channels.get(&event.channel) {
            Some(subs) => subs.iter().map(|sub| sub.handler.clone()).collect(),
            None => return,
        };

        for handler in handlers {
            if let Err(err) = handler.handle(event) {
                warn!(
                    "Handler '{}' failed on channel {}: {err:#}",
                    handler.name(),
                    event.channel
                );
            }
        }
    }

    /// Number of handlers registered for a channel.
    pub fn handler_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|subs| subs.len()).unwrap_or(0)
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
