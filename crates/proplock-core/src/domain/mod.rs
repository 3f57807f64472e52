//! Domain layer
//!
//! Contains the lock registry and its value types.

pub mod locking;
