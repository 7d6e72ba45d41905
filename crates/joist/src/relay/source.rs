//! The change-source seam.
//!
//! The relay pump consumes raw notifications through [`ChangeSource`] without
//! knowing where they come from. Production uses the PostgreSQL adapter in
//! `crate::db`; tests substitute a channel-backed fake.

use async_trait::async_trait;
use thiserror::Error;

/// A raw notification as emitted by the change source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Channel the notification was published on.
    pub channel: String,
    /// Undecoded payload.
    pub payload: String,
}

/// Errors surfaced by a change source.
///
/// None of these are retried: `Unavailable` at connect time is fatal to
/// startup, and a `Lost` stream stops the pump. Restart is the recovery path.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("change source unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("change source connection lost: {0}")]
    Lost(#[source] sqlx::Error),

    #[error("change source is not connected")]
    NotConnected,
}

/// A long-lived connection to the storage engine's native change stream.
#[async_trait]
pub trait ChangeSource: Send {
    /// Establish the connection. Fails with [`SourceError::Unavailable`]
    /// when the underlying store cannot be reached.
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Register interest in a named channel. May be called once per channel
    /// of interest; each registration is independent.
    async fn listen(&mut self, channel: &str) -> Result<(), SourceError>;

    /// Wait for the next raw notification.
    async fn recv(&mut self) -> Result<RawEvent, SourceError>;

    /// Release the connection. Safe to call when not connected.
    async fn disconnect(&mut self);
}
