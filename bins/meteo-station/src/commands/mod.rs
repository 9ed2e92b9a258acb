//! CLI command implementations

pub mod coeff;
pub mod device;
pub mod log;
pub mod manifest;
pub mod monitor;
pub mod period;
pub mod scan;
pub mod time;

use indicatif::ProgressBar;
use meteo_ble::{GattTransport, SessionSettings, StationSession};
use meteo_cli::{progress, OutputFormat};
use meteo_core::config::Config;
use meteo_core::Result;

/// Settings shared by every command
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub device: Option<String>,
    pub quiet: bool,
}

impl Context {
    pub fn json(&self) -> bool {
        self.format.is_json()
    }

    /// Spinner, or nothing when the output must stay machine-readable
    pub fn spinner(&self, message: &str) -> ProgressBar {
        if self.quiet || self.json() {
            progress::hidden()
        } else {
            progress::spinner(message)
        }
    }

    /// Find the station and start a session with it.
    pub async fn connect(&self) -> Result<StationSession<GattTransport>> {
        let pb = self.spinner("Connecting to weather station...");
        let transport = match meteo_ble::open(&self.config.schema, self.device.as_deref()).await {
            Ok(transport) => transport,
            Err(e) => {
                progress::finish_error(&pb, "Connection failed");
                return Err(e);
            }
        };
        progress::finish_success(
            &pb,
            &format!("Connected to {} ({})", transport.name(), transport.address()),
        );

        let settings = SessionSettings::from_config(&self.config.schema);
        Ok(StationSession::new(transport, settings).await?)
    }
}
