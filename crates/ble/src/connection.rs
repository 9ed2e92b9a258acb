//! GATT link to a station.

use crate::error::{BleError, Result};
use crate::scanner::{self, DiscoveredStation};
use crate::transport::{NotificationStream, Transport};
use async_trait::async_trait;
use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::StreamExt;
use meteo_core::config::ConfigSchema;
use meteo_core::retry::retry_async;
use meteo_protocol::{NOTIFY_CHAR_UUID, SERVICE_UUID, WRITE_CHAR_UUID};
use meteo_telemetry::{names, Timer};
use std::time::Duration;
use uuid::Uuid;

/// A connected station with its command and notify characteristics.
pub struct GattTransport {
    peripheral: Peripheral,
    write_char: Characteristic,
    notify_char: Characteristic,
    name: String,
    address: String,
}

impl GattTransport {
    /// Connect, discover the station service and enable notifications.
    pub async fn connect(station: DiscoveredStation, timeout: Duration) -> Result<Self> {
        let peripheral = station.peripheral;
        tracing::info!(name = %station.name, address = %station.address, "connecting");

        let timer = Timer::start(names::CONNECT_MS);
        tokio::time::timeout(timeout, peripheral.connect())
            .await
            .map_err(|_| BleError::Timeout {
                what: "connection".to_string(),
                after: timeout,
            })??;

        if let Err(err) = peripheral.discover_services().await {
            let _ = peripheral.disconnect().await;
            return Err(err.into());
        }

        let (write_char, notify_char) = match locate_characteristics(&peripheral) {
            Ok(found) => found,
            Err(err) => {
                let _ = peripheral.disconnect().await;
                return Err(err);
            }
        };

        peripheral.subscribe(&notify_char).await?;
        let elapsed = timer.stop();
        tracing::info!(address = %station.address, ?elapsed, "connected");

        Ok(Self {
            peripheral,
            write_char,
            notify_char,
            name: station.name,
            address: station.address,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

fn locate_characteristics(peripheral: &Peripheral) -> Result<(Characteristic, Characteristic)> {
    if !peripheral.services().iter().any(|s| s.uuid == SERVICE_UUID) {
        return Err(BleError::ServiceNotFound(SERVICE_UUID));
    }
    let characteristics = peripheral.characteristics();
    let find = |uuid: Uuid| {
        characteristics
            .iter()
            .find(|c| c.uuid == uuid && c.service_uuid == SERVICE_UUID)
            .cloned()
            .ok_or(BleError::CharacteristicNotFound(uuid))
    };
    Ok((find(WRITE_CHAR_UUID)?, find(NOTIFY_CHAR_UUID)?))
}

#[async_trait]
impl Transport for GattTransport {
    async fn write(&self, frame: &[u8]) -> Result<()> {
        if !self.is_connected().await {
            return Err(BleError::NotConnected);
        }
        let kind = if self.write_char.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral.write(&self.write_char, frame, kind).await?;
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        let stream = self.peripheral.notifications().await?;
        Ok(stream
            .filter_map(|n| async move { (n.uuid == NOTIFY_CHAR_UUID).then_some(n.value) })
            .boxed())
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.is_connected().await {
            return Ok(());
        }
        if let Err(err) = self.peripheral.unsubscribe(&self.notify_char).await {
            tracing::debug!(error = %err, "unsubscribe failed");
        }
        self.peripheral.disconnect().await?;
        tracing::info!(address = %self.address, "disconnected");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }
}

/// Find and connect to a station, retrying per `[retry]`.
///
/// `address` overrides `[device] address`; with neither, the strongest
/// station in range is used.
pub async fn open(config: &ConfigSchema, address: Option<&str>) -> meteo_core::Result<GattTransport> {
    let adapter = scanner::adapter(config.ble.adapter_index).await?;
    let address = address.map(str::to_string).or_else(|| config.device.address.clone());
    let scan_timeout = config.ble.scan_timeout();
    let connect_timeout = config.ble.connect_timeout();
    let name_filter = config.ble.name_filter.as_deref();

    let retry = config
        .retry
        .to_retry_config()
        .with_attempt_timeout(scan_timeout + connect_timeout);

    let outcome = retry_async(retry, "connect", |attempt| {
        let adapter = &adapter;
        let address = address.as_deref();
        async move {
            tracing::debug!(attempt, address, "connect attempt");
            let station = match address {
                Some(address) => scanner::find(adapter, address, scan_timeout).await?,
                None => scanner::scan(adapter, scan_timeout, name_filter)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| BleError::DeviceNotFound("no station in range".to_string()))?,
            };
            Ok::<_, meteo_core::Error>(GattTransport::connect(station, connect_timeout).await?)
        }
    })
    .await?;

    Ok(outcome.value)
}
