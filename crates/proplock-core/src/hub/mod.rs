//! Lock hub: the connection-lifecycle side of the lock registry
//!
//! The transport calls into [`LockHub`] on three events (lock request, unlock
//! request, disconnect). The hub runs the registry operation, then announces
//! the outcome through a [`Broadcaster`] once the registry guard is released:
//! successes go to every connection, rejections only to the caller.

pub mod broadcaster;
pub mod event;

pub use broadcaster::{Broadcaster, ConnectionHub, EventReceiver};
pub use event::{HubEvent, WireEvent};

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::locking::{AcquireOutcome, ConnectionId, LockRegistry, ReleaseOutcome, ResourceId};

/// Lifecycle adapter between connections and the lock registry
#[derive(Clone)]
pub struct LockHub {
    registry: Arc<LockRegistry>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl std::fmt::Debug for LockHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHub")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl LockHub {
    /// Create a hub over an injected registry and broadcaster
    pub fn new(registry: Arc<LockRegistry>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// Get the registry
    pub fn registry(&self) -> &LockRegistry {
        &self.registry
    }

    /// Handle a lock request from `caller`
    pub async fn on_acquire_request(
        &self,
        caller: &ConnectionId,
        resource_id: ResourceId,
    ) -> AcquireOutcome {
        let outcome = self
            .registry
            .acquire(resource_id.clone(), caller.clone())
            .await;

        match outcome.failure_reason() {
            None => {
                info!(resource_id = %resource_id, holder = %caller, "Property locked");
                self.broadcast(HubEvent::PropertyLocked(resource_id, caller.clone()))
                    .await;
            }
            Some(reason) => {
                info!(
                    resource_id = %resource_id,
                    caller = %caller,
                    outcome = %outcome,
                    "Lock request rejected"
                );
                self.reply(caller, HubEvent::LockFailed(resource_id, reason.to_string()))
                    .await;
            }
        }

        outcome
    }

    /// Handle an unlock request from `caller`
    pub async fn on_release_request(
        &self,
        caller: &ConnectionId,
        resource_id: ResourceId,
    ) -> ReleaseOutcome {
        let outcome = self.registry.release(&resource_id, caller).await;

        match outcome.failure_reason() {
            None => {
                info!(resource_id = %resource_id, holder = %caller, "Property unlocked");
                self.broadcast(HubEvent::PropertyUnlocked(resource_id, caller.clone()))
                    .await;
            }
            Some(reason) => {
                info!(
                    resource_id = %resource_id,
                    caller = %caller,
                    outcome = %outcome,
                    "Unlock request rejected"
                );
                self.reply(caller, HubEvent::UnlockFailed(resource_id, reason.to_string()))
                    .await;
            }
        }

        outcome
    }

    /// Handle the disconnect of `caller`, releasing everything it held
    ///
    /// The transport calls this once per connection.
    pub async fn on_disconnect(&self, caller: &ConnectionId) -> Vec<ResourceId> {
        let released = self.registry.release_all_for(caller).await;

        if !released.is_empty() {
            info!(holder = %caller, count = released.len(), "Released locks of departed connection");
        }
        for resource_id in &released {
            self.broadcast(HubEvent::PropertyUnlocked(resource_id.clone(), caller.clone()))
                .await;
        }

        released
    }

    /// Send `caller` the list of every held lock
    pub async fn on_snapshot_request(&self, caller: &ConnectionId) {
        let locks = self.registry.snapshot().await;
        self.reply(caller, HubEvent::LockedProperties(locks)).await;
    }

    async fn broadcast(&self, event: HubEvent) {
        let name = event.name();
        if let Err(e) = self.broadcaster.send_to_all(event).await {
            warn!(event = name, error = %e, "Broadcast failed");
        }
    }

    async fn reply(&self, caller: &ConnectionId, event: HubEvent) {
        let name = event.name();
        if let Err(e) = self.broadcaster.send_to(caller, event).await {
            warn!(connection_id = %caller, event = name, error = %e, "Reply not delivered");
        }
    }
}
