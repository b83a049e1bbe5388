//! Core functionality shared by the CloudSign workspace.
//!
//! This crate provides the ambient pieces every CloudSign component relies on:
//! structured logging setup, the client configuration model, and the core
//! error type used while loading that configuration.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{KmsConfig, DEFAULT_ALGORITHM_NAME, DEFAULT_CACHE_TTL_SECS};
pub use error::{CoreError, Result};
