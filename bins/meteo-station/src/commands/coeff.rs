//! Calibration coefficient commands

use super::Context;
use meteo_cli::output::{print_json, Status};
use meteo_core::{Error, ErrorCode, Result};
use meteo_protocol::{Channel, Coefficients};

/// The station stores coefficients as f32 and echoes them exactly
const VERIFY_TOLERANCE: f32 = 1e-6;

pub async fn get(ctx: &Context, channel: Channel) -> Result<()> {
    let session = ctx.connect().await?;
    let coefficients = session.read_coefficients(channel).await;
    let coefficients = session.finish(coefficients).await?;

    if ctx.json() {
        return print_json(&serde_json::json!({
            "channel": channel,
            "a": coefficients.a,
            "b": coefficients.b,
        }));
    }

    Status::header(&format!("Coefficients {}", channel));
    Status::field("A", coefficients.a);
    Status::field("B", coefficients.b);
    Ok(())
}

/// Write a channel's pair; the station does not acknowledge, so `verify`
/// reads it back.
pub async fn set(ctx: &Context, channel: Channel, a: f32, b: f32, verify: bool) -> Result<()> {
    let wanted = Coefficients::new(a, b);
    let session = ctx.connect().await?;
    let outcome = async {
        session.write_coefficients(channel, wanted).await?;
        if !verify {
            return Ok::<_, meteo_ble::BleError>(None);
        }
        session.read_coefficients(channel).await.map(Some)
    }
    .await;
    let readback = session.finish(outcome).await?;

    if let Some(actual) = readback {
        if !matches(wanted, actual) {
            return Err(Error::new(
                ErrorCode::DeviceError,
                format!(
                    "Coefficients {} read back as A={} B={}, expected A={} B={}",
                    channel, actual.a, actual.b, wanted.a, wanted.b
                ),
            )
            .with_suggestion("Retry the write; the station may have dropped the frame"));
        }
    }

    if ctx.json() {
        return print_json(&serde_json::json!({
            "channel": channel,
            "a": a,
            "b": b,
            "verified": readback.is_some(),
        }));
    }

    let suffix = if readback.is_some() { " (verified)" } else { "" };
    Status::success(&format!("Coefficients {} set to A={} B={}{}", channel, a, b, suffix));
    Ok(())
}

fn matches(wanted: Coefficients, actual: Coefficients) -> bool {
    (wanted.a - actual.a).abs() <= VERIFY_TOLERANCE && (wanted.b - actual.b).abs() <= VERIFY_TOLERANCE
}
