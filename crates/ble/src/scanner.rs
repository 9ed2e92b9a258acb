//! Station discovery.

use crate::error::{BleError, Result};
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use meteo_protocol::SERVICE_UUID;
use meteo_telemetry::{metrics, names};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Display name for stations that advertise no local name
pub const DEFAULT_STATION_NAME: &str = "Weather station";

/// What one advertisement told us about a peripheral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advertisement {
    pub name: Option<String>,
    pub address: String,
    pub rssi: Option<i16>,
    pub services: Vec<Uuid>,
}

/// A station found during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredStation {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    #[serde(skip)]
    pub(crate) peripheral: Peripheral,
}

/// Bluetooth adapter by index, as listed by the platform.
pub async fn adapter(index: usize) -> Result<Adapter> {
    let manager = Manager::new().await?;
    manager
        .adapters()
        .await?
        .into_iter()
        .nth(index)
        .ok_or(BleError::AdapterNotFound(index))
}

/// Scan for `duration` and return every station in range, strongest first.
pub async fn scan(
    adapter: &Adapter,
    duration: Duration,
    name_filter: Option<&str>,
) -> Result<Vec<DiscoveredStation>> {
    tracing::debug!(?duration, "starting scan");
    adapter
        .start_scan(ScanFilter {
            services: vec![SERVICE_UUID],
        })
        .await?;
    tokio::time::sleep(duration).await;
    adapter.stop_scan().await?;

    let mut found = Vec::new();
    for peripheral in adapter.peripherals().await? {
        let Some(props) = peripheral.properties().await? else {
            continue;
        };
        let advert = Advertisement {
            name: props.local_name,
            address: props.address.to_string(),
            rssi: props.rssi,
            services: props.services,
        };
        found.push((advert, peripheral));
    }

    let stations: Vec<DiscoveredStation> = rank(found, name_filter)
        .into_iter()
        .map(|(advert, peripheral)| DiscoveredStation {
            name: advert
                .name
                .unwrap_or_else(|| DEFAULT_STATION_NAME.to_string()),
            address: advert.address,
            rssi: advert.rssi,
            peripheral,
        })
        .collect();

    metrics().increment_by(names::STATIONS_FOUND, stations.len() as u64);
    if let Some(rssi) = stations.first().and_then(|s| s.rssi) {
        metrics().gauge(names::BEST_RSSI, i64::from(rssi));
    }
    tracing::info!(count = stations.len(), "scan finished");
    Ok(stations)
}

/// Scan until the station with `address` shows up.
pub async fn find(adapter: &Adapter, address: &str, duration: Duration) -> Result<DiscoveredStation> {
    scan(adapter, duration, None)
        .await?
        .into_iter()
        .find(|s| s.address.eq_ignore_ascii_case(address))
        .ok_or_else(|| BleError::DeviceNotFound(address.to_string()))
}

/// Keep station advertisements, one per address, strongest signal first.
fn rank<T>(found: Vec<(Advertisement, T)>, name_filter: Option<&str>) -> Vec<(Advertisement, T)> {
    let filter = name_filter.map(str::to_lowercase);
    let mut best: HashMap<String, (Advertisement, T)> = HashMap::new();

    for (advert, item) in found {
        if !advert.services.contains(&SERVICE_UUID) {
            continue;
        }
        if let Some(filter) = &filter {
            let name = advert.name.as_deref().unwrap_or(DEFAULT_STATION_NAME);
            if !name.to_lowercase().contains(filter.as_str()) {
                continue;
            }
        }
        let key = advert.address.to_uppercase();
        match best.get(&key) {
            Some((kept, _)) if kept.rssi >= advert.rssi => {}
            _ => {
                best.insert(key, (advert, item));
            }
        }
    }

    let mut ranked: Vec<_> = best.into_values().collect();
    // None sorts below any reading
    ranked.sort_by(|(a, _), (b, _)| b.rssi.cmp(&a.rssi).then_with(|| a.address.cmp(&b.address)));
    ranked
}
