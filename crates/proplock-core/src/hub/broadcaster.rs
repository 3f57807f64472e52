//! Outbound delivery of hub events
//!
//! [`Broadcaster`] is the seam between the hub and whatever transport carries
//! events to clients. [`ConnectionHub`] is the in-process implementation: one
//! bounded queue per connection, drained by the transport's writer task.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use super::event::HubEvent;
use crate::domain::locking::ConnectionId;
use crate::error::{Error, Result};

/// Delivery of events to one connection or to all of them
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Send an event to a single connection
    async fn send_to(&self, connection: &ConnectionId, event: HubEvent) -> Result<()>;

    /// Send an event to every connected party
    async fn send_to_all(&self, event: HubEvent) -> Result<()>;
}

/// Receiving end of a connection's outbound queue
pub type EventReceiver = mpsc::Receiver<HubEvent>;

/// Table of live connections and their outbound queues
#[derive(Debug)]
pub struct ConnectionHub {
    /// Capacity of each connection's queue
    buffer: usize,

    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<HubEvent>>>,
}

impl ConnectionHub {
    /// Create a hub whose per-connection queues hold `buffer` events
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection
    pub async fn connect(&self) -> (ConnectionId, EventReceiver) {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::channel(self.buffer);
        self.connections.write().await.insert(id.clone(), tx);
        debug!(connection_id = %id, "Connection registered");
        (id, rx)
    }

    /// Remove a connection; its queue closes once drained
    ///
    /// Returns `false` if the connection was already gone.
    pub async fn disconnect(&self, connection: &ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(connection).is_some();
        if removed {
            debug!(connection_id = %connection, "Connection unregistered");
        }
        removed
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Queue an event on one sender, evicting the connection if it cannot keep up
    async fn deliver(
        &self,
        connection: &ConnectionId,
        tx: &mpsc::Sender<HubEvent>,
        event: HubEvent,
    ) -> Result<()> {
        match tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    connection_id = %connection,
                    event = event.name(),
                    "Outbound queue full, evicting connection"
                );
                self.disconnect(connection).await;
                Err(Error::ConnectionClosed(connection.to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.disconnect(connection).await;
                Err(Error::ConnectionClosed(connection.to_string()))
            }
        }
    }
}

#[async_trait]
impl Broadcaster for ConnectionHub {
    async fn send_to(&self, connection: &ConnectionId, event: HubEvent) -> Result<()> {
        let tx = self.connections.read().await.get(connection).cloned();
        match tx {
            Some(tx) => self.deliver(connection, &tx, event).await,
            None => Err(Error::ConnectionNotFound(connection.to_string())),
        }
    }

    async fn send_to_all(&self, event: HubEvent) -> Result<()> {
        let targets: Vec<(ConnectionId, mpsc::Sender<HubEvent>)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();

        // One slow or dead client must not stop the others from hearing about it
        for (id, tx) in &targets {
            let _ = self.deliver(id, tx, event.clone()).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locking::ResourceId;

    fn rejected(reason: &str) -> HubEvent {
        HubEvent::protocol_error(&Error::InvalidRequest(reason.to_string()))
    }

    fn locked(resource: &str, holder: &ConnectionId) -> HubEvent {
        HubEvent::PropertyLocked(ResourceId::from(resource), holder.clone())
    }

    #[tokio::test]
    async fn test_send_to_reaches_only_target() {
        let hub = ConnectionHub::new(8);
        let (a, mut rx_a) = hub.connect().await;
        let (_b, mut rx_b) = hub.connect().await;

        hub.send_to(&a, rejected("nope")).await.unwrap();

        assert_eq!(rx_a.recv().await, Some(rejected("nope")));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_all_reaches_everyone() {
        let hub = ConnectionHub::new(8);
        let (a, mut rx_a) = hub.connect().await;
        let (_b, mut rx_b) = hub.connect().await;

        hub.send_to_all(locked("P1", &a)).await.unwrap();

        assert_eq!(rx_a.recv().await, Some(locked("P1", &a)));
        assert_eq!(rx_b.recv().await, Some(locked("P1", &a)));
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection() {
        let hub = ConnectionHub::new(8);

        let err = hub
            .send_to(&ConnectionId::from("ghost"), rejected("x"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "E200");
    }

    #[tokio::test]
    async fn test_disconnect_closes_queue() {
        let hub = ConnectionHub::new(8);
        let (a, mut rx_a) = hub.connect().await;

        assert!(hub.disconnect(&a).await);
        assert!(!hub.disconnect(&a).await);
        assert_eq!(rx_a.recv().await, None);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_full_queue_evicts_only_the_slow_connection() {
        let hub = ConnectionHub::new(1);
        let (slow, mut rx_slow) = hub.connect().await;
        let (fast, mut rx_fast) = hub.connect().await;

        hub.send_to_all(locked("P1", &fast)).await.unwrap();
        assert_eq!(rx_fast.recv().await, Some(locked("P1", &fast)));

        // slow never drained its first event
        hub.send_to_all(locked("P2", &fast)).await.unwrap();

        assert_eq!(rx_fast.recv().await, Some(locked("P2", &fast)));
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(rx_slow.recv().await, Some(locked("P1", &fast)));
        assert_eq!(rx_slow.recv().await, None);
        assert!(hub.send_to(&slow, locked("P3", &fast)).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_unregistered() {
        let hub = ConnectionHub::new(4);
        let (a, rx_a) = hub.connect().await;
        drop(rx_a);

        let err = hub.send_to(&a, locked("P1", &a)).await.unwrap_err();

        assert_eq!(err.code(), "E201");
        assert_eq!(hub.connection_count().await, 0);
    }
}
