//! Line-delimited JSON framing
//!
//! Each request and each event is one JSON object on its own line.

use serde::Deserialize;

use crate::domain::locking::ResourceId;
use crate::error::{Error, Result};
use crate::hub::{HubEvent, WireEvent};

/// A request sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method")]
pub enum ClientRequest {
    LockProperty {
        #[serde(rename = "propertyId")]
        property_id: ResourceId,
    },
    UnlockProperty {
        #[serde(rename = "propertyId")]
        property_id: ResourceId,
    },
    GetLockedProperties,
}

/// Parse one request line
///
/// Returns `Ok(None)` for blank lines.
pub fn parse_request(line: &str) -> Result<Option<ClientRequest>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let request: ClientRequest = serde_json::from_str(line)?;
    match &request {
        ClientRequest::LockProperty { property_id } | ClientRequest::UnlockProperty { property_id }
            if property_id.as_str().is_empty() =>
        {
            Err(Error::InvalidRequest("propertyId must not be empty".to_string()))
        }
        _ => Ok(Some(request)),
    }
}

/// Encode an event as a newline-terminated JSON line
pub fn encode_event(event: &HubEvent) -> Result<String> {
    let mut line = serde_json::to_string(&WireEvent::from(event))?;
    line.push('\n');
    Ok(line)
}
