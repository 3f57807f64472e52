//! Events sent from the hub to connected clients

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::domain::locking::{ConnectionId, LockInfo, ResourceId};
use crate::error::Error;

/// Outbound event vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// Greeting carrying the receiving connection's own id
    Connected(ConnectionId),
    /// Broadcast: a resource was locked by a connection
    PropertyLocked(ResourceId, ConnectionId),
    /// Broadcast: a resource was unlocked (released or purged on disconnect)
    PropertyUnlocked(ResourceId, ConnectionId),
    /// To caller: a lock request was rejected
    LockFailed(ResourceId, String),
    /// To caller: an unlock request was rejected
    UnlockFailed(ResourceId, String),
    /// To caller: every lock currently held
    LockedProperties(Vec<LockInfo>),
    /// To caller: the request could not be understood
    ProtocolError {
        reason: String,
        code: &'static str,
        suggestion: Option<String>,
    },
}

impl HubEvent {
    /// Report a rejected request back to its sender
    pub fn protocol_error(error: &Error) -> Self {
        Self::ProtocolError {
            reason: error.to_string(),
            code: error.code(),
            suggestion: error.suggestion(),
        }
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "Connected",
            Self::PropertyLocked(..) => "PropertyLocked",
            Self::PropertyUnlocked(..) => "PropertyUnlocked",
            Self::LockFailed(..) => "LockFailed",
            Self::UnlockFailed(..) => "UnlockFailed",
            Self::LockedProperties(_) => "LockedProperties",
            Self::ProtocolError { .. } => "ProtocolError",
        }
    }

    /// Positional arguments as they appear on the wire
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::Connected(id) => vec![json!(id)],
            Self::PropertyLocked(resource, holder) | Self::PropertyUnlocked(resource, holder) => {
                vec![json!(resource), json!(holder)]
            }
            Self::LockFailed(resource, reason) | Self::UnlockFailed(resource, reason) => {
                vec![json!(resource), json!(reason)]
            }
            Self::LockedProperties(locks) => vec![json!(locks)],
            Self::ProtocolError {
                reason,
                code,
                suggestion,
            } => vec![json!(reason), json!(code), json!(suggestion)],
        }
    }
}

/// Framed form of an event: `{"event": <name>, "args": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event: String,
    pub args: Vec<Value>,
}

impl From<&HubEvent> for WireEvent {
    fn from(event: &HubEvent) -> Self {
        Self {
            event: event.name().to_string(),
            args: event.args(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_property_locked_wire_form() {
        let event = HubEvent::PropertyLocked(ResourceId::from("P1"), ConnectionId::from("a"));
        let wire = WireEvent::from(&event);

        assert_eq!(wire.event, "PropertyLocked");
        assert_eq!(wire.args, vec![json!("P1"), json!("a")]);
    }

    #[test]
    fn test_lock_failed_wire_form() {
        let event = HubEvent::LockFailed(
            ResourceId::from("P1"),
            "Property is already locked by another user.".to_string(),
        );
        let line = serde_json::to_string(&WireEvent::from(&event)).unwrap();

        assert_eq!(
            line,
            r#"{"event":"LockFailed","args":["P1","Property is already locked by another user."]}"#
        );
    }

    #[test]
    fn test_locked_properties_wire_form() {
        let info = LockInfo {
            resource_id: ResourceId::from("P2"),
            holder: ConnectionId::from("b"),
            acquired_at: Utc::now(),
        };
        let wire = WireEvent::from(&HubEvent::LockedProperties(vec![info]));

        assert_eq!(wire.event, "LockedProperties");
        assert_eq!(wire.args.len(), 1);
        assert_eq!(wire.args[0][0]["resourceId"], "P2");
        assert_eq!(wire.args[0][0]["holder"], "b");
    }

    #[test]
    fn test_protocol_error_carries_code_and_suggestion() {
        let error = Error::InvalidRequest("propertyId must not be empty".to_string());
        let wire = WireEvent::from(&HubEvent::protocol_error(&error));

        assert_eq!(wire.event, "ProtocolError");
        assert_eq!(wire.args[0], "Invalid request: propertyId must not be empty");
        assert_eq!(wire.args[1], "E100");
        assert!(wire.args[2].as_str().unwrap().contains("LockProperty"));
    }

    #[test]
    fn test_protocol_error_without_suggestion() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad bytes");
        let wire = WireEvent::from(&HubEvent::protocol_error(&Error::Io(io)));

        assert_eq!(wire.args, vec![json!("bad bytes"), json!("E9999"), Value::Null]);
    }
}
