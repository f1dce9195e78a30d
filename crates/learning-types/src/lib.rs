//! Shared identifiers, CEFR scale, error taxonomy, and configuration for the
//! adaptive learning orchestrator.

pub mod common;
pub mod config;
pub mod error;

pub use common::*;
pub use config::EngineConfig;
pub use error::{EngineError, Result};
