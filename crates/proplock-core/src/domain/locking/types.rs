//! Lock identifiers and operation outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reason sent to a caller whose lock request hit a lock held by someone else
pub const REASON_ALREADY_LOCKED: &str = "Property is already locked by another user.";

/// Reason sent to a caller that asks for a lock it already holds
pub const REASON_ALREADY_OWNED: &str = "You already hold the lock on this property.";

/// Reason sent to a caller that releases a lock it does not hold
pub const REASON_NOT_OWNER: &str = "You do not own this lock or it is not locked.";

/// Identifier of a lockable resource (e.g. a property record)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of a live connection, used as the lock holder
///
/// Scoped to the lifetime of the connection; it is not a user identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh, process-unique connection identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Outcome of an acquire request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireOutcome {
    /// The resource was free and is now held by the caller
    Locked,
    /// The resource is held by a different connection
    AlreadyLocked,
    /// The caller already holds the resource
    AlreadyOwnedByCaller,
}

impl AcquireOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Locked)
    }

    /// Human-readable reason reported to the caller on failure
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            Self::Locked => None,
            Self::AlreadyLocked => Some(REASON_ALREADY_LOCKED),
            Self::AlreadyOwnedByCaller => Some(REASON_ALREADY_OWNED),
        }
    }
}

impl fmt::Display for AcquireOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "locked"),
            Self::AlreadyLocked => write!(f, "already_locked"),
            Self::AlreadyOwnedByCaller => write!(f, "already_owned_by_caller"),
        }
    }
}

/// Outcome of a release request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The caller held the resource and it is now free
    Released,
    /// The resource is free, or held by someone else; nothing changed
    NotOwnerOrNotLocked,
}

impl ReleaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Human-readable reason reported to the caller on failure
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            Self::Released => None,
            Self::NotOwnerOrNotLocked => Some(REASON_NOT_OWNER),
        }
    }
}

impl fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Released => write!(f, "released"),
            Self::NotOwnerOrNotLocked => write!(f, "not_owner_or_not_locked"),
        }
    }
}

/// Snapshot of a held lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    /// Locked resource
    pub resource_id: ResourceId,

    /// Connection holding the lock
    pub holder: ConnectionId,

    /// When the lock was acquired
    pub acquired_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_outcome_reasons() {
        assert!(AcquireOutcome::Locked.is_success());
        assert_eq!(AcquireOutcome::Locked.failure_reason(), None);
        assert_eq!(
            AcquireOutcome::AlreadyLocked.failure_reason(),
            Some("Property is already locked by another user.")
        );
        assert!(!AcquireOutcome::AlreadyOwnedByCaller.is_success());
        assert_eq!(
            AcquireOutcome::AlreadyOwnedByCaller.failure_reason(),
            Some(REASON_ALREADY_OWNED)
        );
    }

    #[test]
    fn test_release_outcome_reasons() {
        assert!(ReleaseOutcome::Released.is_success());
        assert_eq!(ReleaseOutcome::Released.failure_reason(), None);
        assert_eq!(
            ReleaseOutcome::NotOwnerOrNotLocked.failure_reason(),
            Some("You do not own this lock or it is not locked.")
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(AcquireOutcome::AlreadyLocked.to_string(), "already_locked");
        assert_eq!(
            ReleaseOutcome::NotOwnerOrNotLocked.to_string(),
            "not_owner_or_not_locked"
        );
    }

    #[test]
    fn test_generated_connection_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let resource = ResourceId::from("P1");
        assert_eq!(serde_json::to_string(&resource).unwrap(), "\"P1\"");

        let holder: ConnectionId = serde_json::from_str("\"conn-7\"").unwrap();
        assert_eq!(holder, ConnectionId::new("conn-7"));
    }
}
