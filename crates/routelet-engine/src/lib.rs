//! routelet-engine: Health blacklist and instance selection
//!
//! This crate provides the selection engine consumed by registry and HTTP
//! interception collaborators:
//! - TTL-based blacklist of recently failed addresses
//! - Background TCP recovery probing
//! - Load-balanced instance selection with emergency fallback

pub mod blacklist;
pub mod engine;
pub mod probe;
pub mod selector;

pub use blacklist::{Blacklist, BlacklistedInstance};
pub use engine::SelectionEngine;
pub use probe::{ProbeHandle, RecoveryProbe};
pub use selector::Selector;
