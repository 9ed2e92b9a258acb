//! Readings: one-shot read and periodic monitor

use super::Context;
use chrono::Local;
use meteo_cli::output::{paint, print_json, Status, Style};
use meteo_core::Result;
use meteo_protocol::{HumidityTemperature, PressureTemperature};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct Reading {
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pressure_temperature: Option<PressureTemperature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    humidity_temperature: Option<HumidityTemperature>,
}

/// Read both value pairs once
pub async fn read(ctx: &Context) -> Result<()> {
    let session = ctx.connect().await?;
    let outcome = async {
        let pt = session.read_pressure_temperature().await?;
        let ht = session.read_humidity_temperature().await?;
        Ok::<_, meteo_ble::BleError>((pt, ht))
    }
    .await;
    let (pt, ht) = session.finish(outcome).await?;

    if ctx.json() {
        return print_json(&Reading {
            time: Local::now().to_rfc3339(),
            pressure_temperature: Some(pt),
            humidity_temperature: Some(ht),
        });
    }

    Status::header("Current readings");
    print_readings(Some(&pt), Some(&ht));
    Ok(())
}

/// Poll every `interval_secs` until `count` polls are done.
///
/// A poll that times out is reported and skipped; any other error ends the
/// monitor.
pub async fn run(ctx: &Context, interval_secs: u64, count: Option<u64>) -> Result<()> {
    let session = ctx.connect().await?;
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    if !ctx.json() {
        let header = format!(
            "{:<20} {:>12} {:>10} {:>10} {:>10}",
            "Time", "P, kPa", "T, °C", "H, %", "T1, °C"
        );
        println!("  {}", paint(header, Style::new().dimmed()));
    }

    let outcome = async {
        let mut polls = 0u64;
        while count.is_none_or(|n| polls < n) {
            ticker.tick().await;
            polls += 1;

            let pt = poll(session.read_pressure_temperature().await)?;
            let ht = poll(session.read_humidity_temperature().await)?;
            let reading = Reading {
                time: Local::now().to_rfc3339(),
                pressure_temperature: pt,
                humidity_temperature: ht,
            };

            if ctx.json() {
                println!("{}", serde_json::to_string(&reading)?);
            } else {
                println!("  {}", format_row(&reading));
            }
        }
        Ok::<_, meteo_core::Error>(())
    }
    .await;
    session.finish(outcome).await
}

fn poll<T>(result: meteo_ble::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ meteo_ble::BleError::Timeout { .. }) => {
            tracing::warn!(error = %e, "poll skipped");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn format_row(reading: &Reading) -> String {
    fn cell(value: Option<f32>, precision: usize) -> String {
        value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
    }
    let time = chrono::DateTime::parse_from_rfc3339(&reading.time)
        .map(|t| t.format("%d.%m.%Y %H:%M:%S").to_string())
        .unwrap_or_else(|_| reading.time.clone());
    let pt = reading.pressure_temperature.as_ref();
    let ht = reading.humidity_temperature.as_ref();
    format!(
        "{:<20} {:>12} {:>10} {:>10} {:>10}",
        time,
        cell(pt.map(|v| v.pressure), 3),
        cell(pt.map(|v| v.temperature), 2),
        cell(ht.map(|v| v.humidity), 1),
        cell(ht.map(|v| v.temperature), 2),
    )
}

/// Labelled value lines for the snapshot and `read` output
pub fn print_readings(pt: Option<&PressureTemperature>, ht: Option<&HumidityTemperature>) {
    match pt {
        Some(pt) => {
            Status::field("Pressure", format!("{:.3} kPa", pt.pressure));
            Status::field("Temperature", format!("{:.2} °C", pt.temperature));
        }
        None => {
            Status::field_missing("Pressure");
            Status::field_missing("Temperature");
        }
    }
    match ht {
        Some(ht) => {
            Status::field("Humidity", format!("{:.1} %", ht.humidity));
            Status::field("Temperature (T1)", format!("{:.2} °C", ht.temperature));
        }
        None => {
            Status::field_missing("Humidity");
            Status::field_missing("Temperature (T1)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row_with_missing_pair() {
        let reading = Reading {
            time: "2024-05-01T12:30:00+00:00".to_string(),
            pressure_temperature: Some(PressureTemperature {
                pressure: 101.325,
                temperature: 21.5,
            }),
            humidity_temperature: None,
        };
        let row = format_row(&reading);
        assert!(row.starts_with("01.05.2024 12:30:00"));
        assert!(row.contains("101.325"));
        assert!(row.contains("21.50"));
        assert!(row.trim_end().ends_with('-'));
    }

    #[test]
    fn test_poll_skips_timeouts_only() {
        let timeout: meteo_ble::Result<u32> = Err(meteo_ble::BleError::Timeout {
            what: "response".into(),
            after: Duration::from_secs(2),
        });
        assert!(poll(timeout).unwrap().is_none());

        let closed: meteo_ble::Result<u32> = Err(meteo_ble::BleError::NotConnected);
        assert!(poll(closed).is_err());
        assert_eq!(poll(Ok(7u32)).unwrap(), Some(7));
    }
}
