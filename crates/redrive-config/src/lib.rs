//! Configuration system for the redrive failure handler.
//!
//! Provides TOML-based configuration with an environment overlay:
//! - `[queue]` retry queue, terminal archive queue and retry delay window
//! - `[notify]` escalation topic
//! - `[retry]` retry budget
//! - `[aws]` region, deploy stage and the required service endpoints
//! - `[logging]` log verbosity
//!
//! Environment variables override file values (see [`env`]).

pub mod env;
pub mod error;
pub mod types;

pub use env::{apply_env, apply_env_with};
pub use error::{ConfigError, Result};
pub use types::*;
