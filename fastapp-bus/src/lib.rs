//! Redis pub/sub event bus.
//!
//! A deliberately separate collaborator from the repository layer:
//! publish/subscribe is messaging, not persistence, so the bus does not
//! implement the repository contract. The bus is constructed explicitly by
//! the application's startup sequence and passed to whoever needs it —
//! never a module-level global.

use futures::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::{debug, info};

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Errors that can occur on the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Channel names are dot-separated identifier segments; anything else
    /// is rejected before a command is issued.
    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),

    /// Error from the Redis connection.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// A message received from a subscribed channel.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

/// Process-wide pub/sub bus over one Redis deployment.
///
/// Publishing multiplexes over a shared [`ConnectionManager`]; each
/// subscription holds its own dedicated pub/sub connection, which Redis
/// requires.
#[derive(Clone)]
pub struct EventBus {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl EventBus {
    /// Connects the bus. Called once at startup; the application owns the
    /// returned value and injects it where needed.
    pub async fn connect(redis_url: &str) -> BusResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        info!("event bus connected");
        Ok(Self { client, publisher })
    }

    /// Publishes a payload to a channel, returning the receiver count.
    pub async fn publish(&self, channel: &str, payload: &str) -> BusResult<u64> {
        validate_channel(channel)?;
        let mut conn = self.publisher.clone();
        let receivers: u64 = conn.publish(channel, payload).await?;
        debug!(channel, receivers, "published");
        Ok(receivers)
    }

    /// Subscribes to a channel, returning a stream of messages. The
    /// stream ends when the subscription connection drops; dropping the
    /// stream closes the connection.
    pub async fn subscribe(&self, channel: &str) -> BusResult<BoxStream<'static, BusMessage>> {
        validate_channel(channel)?;
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        info!(channel, "subscribed");
        Ok(pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                let channel = msg.get_channel_name().to_string();
                let payload: String = msg.get_payload().ok()?;
                Some(BusMessage { channel, payload })
            })
            .boxed())
    }
}

/// Channel names are dot-separated segments, each a plain identifier
/// (e.g. `addons.commerce.orders`).
fn validate_channel(channel: &str) -> BusResult<()> {
    if channel.is_empty() {
        return Err(BusError::InvalidChannel(channel.to_string()));
    }
    for segment in channel.split('.') {
        fastapp_model::validate_identifier(segment)
            .map_err(|_| BusError::InvalidChannel(channel.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_validation() {
        assert!(validate_channel("addons.commerce.orders").is_ok());
        assert!(validate_channel("events").is_ok());
        assert!(validate_channel("").is_err());
        assert!(validate_channel("bad channel").is_err());
        assert!(validate_channel("a..b").is_err());
        assert!(validate_channel("a.*").is_err());
    }
}
