//! Configuration loading and schema definitions
//!
//! Shared configuration types used by the CLI and the Bluetooth session.

mod loader;
mod schema;

pub use loader::{Config, ENV_DEVICE, ENV_LOG_LEVEL};
pub use schema::*;
