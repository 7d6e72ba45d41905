//! Relay core.
//!
//! One pump task consumes raw notifications from the change source, decodes
//! them, and dispatches to the subscription registry. Handlers are
//! non-blocking, so processing one event never delays the next.

mod registry;
mod source;

pub use registry::{ChangeHandler, SubscriptionId, SubscriptionRegistry};
pub use source::{ChangeSource, RawEvent, SourceError};

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use joist_protocol::{ChangeEvent, ChangeMessage};

/// Relay lifecycle state.
///
/// There is no separate error state: any unrecoverable fault returns the
/// relay to `Stopped`, and restarting the process is the recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Stopped,
    Connecting,
    Listening,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Connecting => "connecting",
            Self::Listening => "listening",
        }
    }
}

/// The change relay: owns the pump task and publishes its state.
pub struct Relay {
    registry: Arc<SubscriptionRegistry>,
    state_tx: watch::Sender<RelayState>,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl Relay {
    /// Create a stopped relay over the given registry.
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        let (state_tx, _) = watch::channel(RelayState::Stopped);
        Self {
            registry,
            state_tx,
            cancel: CancellationToken::new(),
            pump: None,
        }
    }

    /// The registry this relay dispatches into.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Subscribe to relay state changes (for the health probe).
    pub fn state(&self) -> watch::Receiver<RelayState> {
        self.state_tx.subscribe()
    }

    /// Connect the source, listen on every channel, and spawn the pump.
    ///
    /// A failure at any step leaves the relay `Stopped` and is returned to
    /// the caller; startup is expected to treat it as fatal.
    pub async fn start<S>(&mut self, mut source: S, channels: &[String]) -> Result<(), SourceError>
    where
        S: ChangeSource + 'static,
    {
        self.state_tx.send_replace(RelayState::Connecting);

        if let Err(err) = source.connect().await {
            self.state_tx.send_replace(RelayState::Stopped);
            return Err(err);
        }

        for channel in channels {
            if let Err(err) = source.listen(channel).await {
                source.disconnect().await;
                self.state_tx.send_replace(RelayState::Stopped);
                return Err(err);
            }
        }

        self.state_tx.send_replace(RelayState::Listening);
        info!("Relay listening on {} channel(s)", channels.len());

        self.cancel = CancellationToken::new();
        self.pump = Some(tokio::spawn(pump(
            source,
            self.registry.clone(),
            self.state_tx.clone(),
            self.cancel.clone(),
        )));

        Ok(())
    }

    /// Cancel the pump and wait for it to release the source connection.
    ///
    /// Cancellation takes effect between events; an in-flight dispatch runs
    /// to completion, so no event is ever half-dispatched.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
        self.state_tx.send_replace(RelayState::Stopped);
    }
}

/// The event pump: decode and dispatch until cancelled or the stream fails.
async fn pump<S: ChangeSource>(
    mut source: S,
    registry: Arc<SubscriptionRegistry>,
    state_tx: watch::Sender<RelayState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = source.recv() => match received {
                Ok(raw) => {
                    let message = ChangeMessage::decode(&raw.payload);
                    registry.dispatch(&ChangeEvent::new(raw.channel, message));
                }
                Err(err) => {
                    error!("Change stream failed: {err}");
                    break;
                }
            }
        }
    }

    // The pump is cancelled before the source connection is released.
    source.disconnect().await;
    state_tx.send_replace(RelayState::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use joist_protocol::ChangeAction;

    struct FakeSource {
        rx: mpsc::UnboundedReceiver<RawEvent>,
        fail_connect: bool,
        connected: bool,
        listened: Vec<String>,
    }

    impl FakeSource {
        fn new(fail_connect: bool) -> (mpsc::UnboundedSender<RawEvent>, Self) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                tx,
                Self {
                    rx,
                    fail_connect,
                    connected: false,
                    listened: Vec::new(),
                },
            )
        }
    }

    #[async_trait]
    impl ChangeSource for FakeSource {
        async fn connect(&mut self) -> Result<(), SourceError> {
            if self.fail_connect {
                return Err(SourceError::Unavailable(sqlx::Error::PoolClosed));
            }
            self.connected = true;
            Ok(())
        }

        async fn listen(&mut self, channel: &str) -> Result<(), SourceError> {
            if !self.connected {
                return Err(SourceError::NotConnected);
            }
            self.listened.push(channel.to_string());
            Ok(())
        }

        async fn recv(&mut self) -> Result<RawEvent, SourceError> {
            self.rx
                .recv()
                .await
                .ok_or(SourceError::Lost(sqlx::Error::PoolClosed))
        }

        async fn disconnect(&mut self) {
            self.connected = false;
        }
    }

    struct Capture {
        tx: mpsc::UnboundedSender<ChangeEvent>,
    }

    impl ChangeHandler for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        fn handle(&self, event: &ChangeEvent) -> anyhow::Result<()> {
            self.tx.send(event.clone())?;
            Ok(())
        }
    }

    fn capture_registry() -> (Arc<SubscriptionRegistry>, mpsc::UnboundedReceiver<ChangeEvent>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (tx, rx) = mpsc::unbounded_channel();
        registry.subscribe("item_changes", Arc::new(Capture { tx }));
        (registry, rx)
    }

    fn raw(payload: &str) -> RawEvent {
        RawEvent {
            channel: "item_changes".to_string(),
            payload: payload.to_string(),
        }
    }

    #[tokio::test]
    async fn test_events_flow_from_source_to_handlers() {
        let (registry, mut events) = capture_registry();
        let (tx, source) = FakeSource::new(false);
        let mut relay = Relay::new(registry);

        relay
            .start(source, &["item_changes".to_string()])
            .await
            .unwrap();
        assert_eq!(*relay.state().borrow(), RelayState::Listening);

        tx.send(raw(
            r#"{"table":"items","action":"INSERT","id":1,"data":{"id":1}}"#,
        ))
        .unwrap();

        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        let record = event.message.record().unwrap();
        assert_eq!(record.action, ChangeAction::Insert);
        assert_eq!(record.id, 1);

        relay.shutdown().await;
        assert_eq!(*relay.state().borrow(), RelayState::Stopped);
    }

    #[tokio::test]
    async fn test_malformed_payload_does_not_halt_delivery() {
        let (registry, mut events) = capture_registry();
        let (tx, source) = FakeSource::new(false);
        let mut relay = Relay::new(registry);

        relay
            .start(source, &["item_changes".to_string()])
            .await
            .unwrap();

        tx.send(raw("not json")).unwrap();
        tx.send(raw(
            r#"{"table":"items","action":"DELETE","id":7,"data":{"id":7}}"#,
        ))
        .unwrap();

        let first = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.message.record().is_none());

        let second = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.message.record().unwrap().action, ChangeAction::Delete);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_relay_stopped() {
        let (_tx, source) = FakeSource::new(true);
        let mut relay = Relay::new(Arc::new(SubscriptionRegistry::new()));

        let result = relay.start(source, &["item_changes".to_string()]).await;

        assert!(matches!(result, Err(SourceError::Unavailable(_))));
        assert_eq!(*relay.state().borrow(), RelayState::Stopped);
    }

    #[tokio::test]
    async fn test_lost_stream_stops_the_pump() {
        let (registry, _events) = capture_registry();
        let (tx, source) = FakeSource::new(false);
        let mut relay = Relay::new(registry);

        relay
            .start(source, &["item_changes".to_string()])
            .await
            .unwrap();

        let mut state = relay.state();
        // Dropping the sender makes recv() fail, which stops the pump.
        drop(tx);

        timeout(Duration::from_secs(1), async {
            while *state.borrow_and_update() != RelayState::Stopped {
                state.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }
}
