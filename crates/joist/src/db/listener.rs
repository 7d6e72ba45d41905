//! PostgreSQL LISTEN/NOTIFY adapter.

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use tracing::{debug, info};

use crate::relay::{ChangeSource, RawEvent, SourceError};

/// Change source backed by a dedicated PostgreSQL LISTEN connection.
///
/// One long-lived connection, separate from the query pool. There is no
/// reconnect policy here; if the stream errors the relay stops and the
/// process has to be restarted.
pub struct PgChangeSource {
    url: String,
    listener: Option<PgListener>,
}

impl PgChangeSource {
    /// Create a disconnected adapter for the given connection string.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            listener: None,
        }
    }
}

#[async_trait]
impl ChangeSource for PgChangeSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        let listener = PgListener::connect(&self.url)
            .await
            .map_err(SourceError::Unavailable)?;
        self.listener = Some(listener);
        info!("Postgres listener connected");
        Ok(())
    }

    async fn listen(&mut self, channel: &str) -> Result<(), SourceError> {
        let listener = self.listener.as_mut().ok_or(SourceError::NotConnected)?;
        listener
            .listen(channel)
            .await
            .map_err(SourceError::Lost)?;
        info!("Listening on channel: {channel}");
        Ok(())
    }

    async fn recv(&mut self) -> Result<RawEvent, SourceError> {
        let listener = self.listener.as_mut().ok_or(SourceError::NotConnected)?;
        let notification = listener.recv().await.map_err(SourceError::Lost)?;
        Ok(RawEvent {
            channel: notification.channel().to_string(),
            payload: notification.payload().to_string(),
        })
    }

    async fn disconnect(&mut self) {
        if self.listener.take().is_some() {
            debug!("Postgres listener closed");
        }
    }
}
