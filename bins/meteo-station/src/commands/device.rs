//! Station identity commands: info, device-id, status

use super::Context;
use meteo_cli::output::{format_period, print_json, Status};
use meteo_core::Result;
use meteo_protocol::format_timestamp;
use serde::Serialize;

/// Connect and print the station snapshot
pub async fn info(ctx: &Context) -> Result<()> {
    let session = ctx.connect().await?;
    let name = session.transport().name().to_string();
    let address = session.transport().address().to_string();
    let snapshot = session.snapshot().await;
    let snapshot = session.finish(snapshot).await?;

    if ctx.json() {
        #[derive(Serialize)]
        struct Output<'a> {
            name: &'a str,
            address: &'a str,
            #[serde(flatten)]
            snapshot: &'a meteo_ble::StationSnapshot,
        }
        return print_json(&Output {
            name: &name,
            address: &address,
            snapshot: &snapshot,
        });
    }

    Status::header(&format!("{} ({})", name, address));
    match snapshot.firmware {
        Some(version) => Status::field("Firmware", version),
        None => Status::field_missing("Firmware"),
    }
    match snapshot.device_info {
        Some(info) => {
            Status::field("Serial number", info.serial_number);
            Status::field("Production date", info.production_date());
        }
        None => {
            Status::field_missing("Serial number");
            Status::field_missing("Production date");
        }
    }
    match snapshot.period_ms {
        Some(ms) => Status::field("Measurement period", format_period(ms)),
        None => Status::field_missing("Measurement period"),
    }
    super::monitor::print_readings(
        snapshot.pressure_temperature.as_ref(),
        snapshot.humidity_temperature.as_ref(),
    );
    Ok(())
}

/// Print both hardware identifiers
pub async fn ids(ctx: &Context) -> Result<()> {
    let session = ctx.connect().await?;
    let ids = session.read_device_ids().await;
    let (first, second) = session.finish(ids).await?;

    if ctx.json() {
        return print_json(&[first, second]);
    }

    Status::header("Device identifiers");
    Status::field("ID 1", format!("{} (bytes {})", first, first.hex()));
    Status::field("ID 2", format!("{} (bytes {})", second, second.hex()));
    Ok(())
}

/// Print the raw device status block
pub async fn status(ctx: &Context) -> Result<()> {
    let session = ctx.connect().await?;
    let outcome = async {
        let payload = session.read_device_status().await?;
        let clock = session.read_datetime().await.ok();
        Ok::<_, meteo_ble::BleError>((payload, clock))
    }
    .await;
    let (payload, clock) = session.finish(outcome).await?;

    if ctx.json() {
        return print_json(&serde_json::json!({
            "status": hex::encode(&payload),
            "length": payload.len(),
            "timestamp": clock,
        }));
    }

    Status::header("Device status");
    Status::field("Raw", hex_dump(&payload));
    Status::field("Length", format!("{} bytes", payload.len()));
    match clock {
        Some(ts) => Status::field("Device clock", format_timestamp(ts)),
        None => Status::field_missing("Device clock"),
    }
    Ok(())
}

/// Space-separated uppercase byte pairs
fn hex_dump(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "(empty)".to_string();
    }
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x01, 0xAB, 0x00]), "01 AB 00");
        assert_eq!(hex_dump(&[]), "(empty)");
    }
}
