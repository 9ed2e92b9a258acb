//! Shared plumbing for the meteo station tools
//!
//! [`error`] defines the coded [`Error`] every crate converts into,
//! [`config`] loads `.meteo-station.toml` with `METEO_*` overrides,
//! [`retry`] wraps flaky radio work in backoff, and [`validation`]
//! collects field-level errors and warnings.
//!
//! ```rust,no_run
//! use meteo_core::config::Config;
//!
//! # fn main() -> meteo_core::Result<()> {
//! let config = Config::load(None)?;
//! println!("scan for {}s", config.schema.ble.scan_timeout_secs);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod retry;
pub mod validation;

pub use error::{Category, Error, ErrorCode, Result, ResultExt};

pub mod prelude {
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::retry::{retry_async, RetryConfig};
    pub use crate::validation::{ValidationResult, Validator};
}
