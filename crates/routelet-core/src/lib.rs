//! routelet-core: Core types for the routelet selection engine
//!
//! This crate provides the fundamental types shared across routelet:
//! - Service instance data model
//! - Configuration types and load-balancing strategies
//! - Error handling

pub mod config;
pub mod error;
pub mod instance;

pub use config::*;
pub use error::*;
pub use instance::*;
