//! Bluetooth LE access to the weather station
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                StationSession                 │
//! │  queries, typed reads/writes, log download    │
//! └───────────────────────┬───────────────────────┘
//!                         │ Transport
//!         ┌───────────────┴───────────────┐
//!         ▼                               ▼
//! ┌───────────────┐               ┌───────────────┐
//! │ GattTransport │               │ MemoryTransport│
//! │  (btleplug)   │               │  (in-process)  │
//! └───────────────┘               └───────────────┘
//! ```
//!
//! - [`scanner`] finds stations advertising the station service
//! - [`connection`] opens the GATT link and locates the characteristics
//! - [`session`] turns notifications into typed responses

pub mod connection;
mod error;
pub mod memory;
pub mod scanner;
pub mod session;
mod transport;

pub use connection::{open, GattTransport};
pub use error::{BleError, Result};
pub use memory::MemoryTransport;
pub use scanner::{scan, DiscoveredStation};
pub use session::{LogDownload, SessionSettings, StationSession, StationSnapshot};
pub use transport::{NotificationStream, Transport};
