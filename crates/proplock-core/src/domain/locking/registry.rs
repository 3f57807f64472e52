//! Lock registry for connection-scoped resource locks
//!
//! The registry is the single source of truth for who holds which resource.
//! Every mutation runs under one write guard over the whole map, so acquire,
//! release and the disconnect purge are linearizable with respect to each
//! other. The guard only ever covers in-memory map work; callers announce
//! state changes after the call returns.

use super::types::{AcquireOutcome, ConnectionId, LockInfo, ReleaseOutcome, ResourceId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;
use tracing::debug;

/// A held lock as stored in the registry
#[derive(Debug, Clone)]
struct LockEntry {
    holder: ConnectionId,
    acquired_at: DateTime<Utc>,
    /// Acquisition order, used to keep purge and snapshot output deterministic
    seq: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    locks: HashMap<ResourceId, LockEntry>,
    next_seq: u64,
}

/// In-memory mapping from resource to the connection holding it
#[derive(Debug, Default)]
pub struct LockRegistry {
    state: RwLock<RegistryState>,
}

impl LockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to lock `resource_id` for `holder`
    ///
    /// Exactly one of any number of concurrent callers on a free resource
    /// gets [`AcquireOutcome::Locked`].
    pub async fn acquire(&self, resource_id: ResourceId, holder: ConnectionId) -> AcquireOutcome {
        let mut state = self.state.write().await;
        let seq = state.next_seq;

        let outcome = match state.locks.entry(resource_id) {
            Entry::Occupied(existing) => {
                if existing.get().holder == holder {
                    AcquireOutcome::AlreadyOwnedByCaller
                } else {
                    AcquireOutcome::AlreadyLocked
                }
            }
            Entry::Vacant(slot) => {
                debug!(resource_id = %slot.key(), holder = %holder, "Lock acquired");
                slot.insert(LockEntry {
                    holder,
                    acquired_at: Utc::now(),
                    seq,
                });
                AcquireOutcome::Locked
            }
        };

        if outcome.is_success() {
            state.next_seq += 1;
        }
        outcome
    }

    /// Release `resource_id` if and only if `holder` currently holds it
    pub async fn release(&self, resource_id: &ResourceId, holder: &ConnectionId) -> ReleaseOutcome {
        let mut state = self.state.write().await;

        let held_by_caller = state
            .locks
            .get(resource_id)
            .is_some_and(|entry| entry.holder == *holder);
        if !held_by_caller {
            return ReleaseOutcome::NotOwnerOrNotLocked;
        }

        state.locks.remove(resource_id);
        debug!(resource_id = %resource_id, holder = %holder, "Lock released");
        ReleaseOutcome::Released
    }

    /// Remove every lock held by `holder`, returning the freed resources in
    /// the order they were acquired
    ///
    /// The scan and the removals happen under a single guard, so no other
    /// operation observes a partially purged map.
    pub async fn release_all_for(&self, holder: &ConnectionId) -> Vec<ResourceId> {
        let mut state = self.state.write().await;

        let mut owned: Vec<(u64, ResourceId)> = state
            .locks
            .iter()
            .filter(|(_, entry)| entry.holder == *holder)
            .map(|(resource_id, entry)| (entry.seq, resource_id.clone()))
            .collect();
        owned.sort_unstable_by_key(|(seq, _)| *seq);

        for (_, resource_id) in &owned {
            state.locks.remove(resource_id);
        }

        if !owned.is_empty() {
            debug!(holder = %holder, count = owned.len(), "Purged locks for holder");
        }

        owned.into_iter().map(|(_, resource_id)| resource_id).collect()
    }

    /// Current holder of `resource_id`, if any
    pub async fn holder_of(&self, resource_id: &ResourceId) -> Option<ConnectionId> {
        let state = self.state.read().await;
        state.locks.get(resource_id).map(|entry| entry.holder.clone())
    }

    /// All held locks, in acquisition order
    pub async fn snapshot(&self) -> Vec<LockInfo> {
        let state = self.state.read().await;

        let mut entries: Vec<(&ResourceId, &LockEntry)> = state.locks.iter().collect();
        entries.sort_unstable_by_key(|(_, entry)| entry.seq);

        entries
            .into_iter()
            .map(|(resource_id, entry)| LockInfo {
                resource_id: resource_id.clone(),
                holder: entry.holder.clone(),
                acquired_at: entry.acquired_at,
            })
            .collect()
    }

    /// Number of held locks
    pub async fn len(&self) -> usize {
        self.state.read().await.locks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
