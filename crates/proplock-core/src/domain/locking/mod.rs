//! Connection-scoped resource locking
//!
//! A resource is locked by at most one connection at a time. Locks are never
//! transferred: they end when the holder releases them or when the holder's
//! connection goes away and its locks are purged.
//!
//! # Example
//!
//! ```ignore
//! use proplock_core::domain::locking::{AcquireOutcome, ConnectionId, LockRegistry};
//!
//! let registry = LockRegistry::new();
//! let me = ConnectionId::generate();
//!
//! assert_eq!(registry.acquire("P1".into(), me.clone()).await, AcquireOutcome::Locked);
//!
//! // On disconnect
//! let freed = registry.release_all_for(&me).await;
//! ```

pub mod registry;
pub mod types;

pub use registry::LockRegistry;
pub use types::{
    AcquireOutcome, ConnectionId, LockInfo, ReleaseOutcome, ResourceId, REASON_ALREADY_LOCKED,
    REASON_ALREADY_OWNED, REASON_NOT_OWNER,
};
