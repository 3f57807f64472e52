//! proplock Core Library
//!
//! This crate provides the core functionality for proplock, including:
//! - Lock registry (connection-scoped, mutually exclusive resource locks)
//! - Lock hub (acquire/release/disconnect handling with fan-out notification)
//! - TCP transport (newline-delimited JSON)
//! - Configuration

pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod transport;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::locking::{
        AcquireOutcome, ConnectionId, LockInfo, LockRegistry, ReleaseOutcome, ResourceId,
    };
    pub use crate::error::{Error, Result};
    pub use crate::hub::{Broadcaster, ConnectionHub, HubEvent, LockHub};
    pub use crate::transport::LockServer;
}
