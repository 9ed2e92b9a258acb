//! Measurement period commands

use super::Context;
use meteo_cli::output::{format_period, print_json, Status};
use meteo_core::{Error, ErrorCode, Result};

pub async fn get(ctx: &Context) -> Result<()> {
    let session = ctx.connect().await?;
    let period_ms = session.read_measurement_period().await;
    let period_ms = session.finish(period_ms).await?;

    if ctx.json() {
        return print_json(&serde_json::json!({ "period_ms": period_ms }));
    }
    Status::field("Measurement period", format!("{} ({} ms)", format_period(period_ms), period_ms));
    Ok(())
}

pub async fn set(ctx: &Context, period_ms: u32, verify: bool) -> Result<()> {
    if period_ms == 0 {
        return Err(Error::new(ErrorCode::InvalidInput, "Measurement period must be above 0 ms"));
    }

    let session = ctx.connect().await?;
    let outcome = async {
        session.write_measurement_period(period_ms).await?;
        if !verify {
            return Ok::<_, meteo_ble::BleError>(None);
        }
        session.read_measurement_period().await.map(Some)
    }
    .await;
    let readback = session.finish(outcome).await?;

    if let Some(actual) = readback.filter(|actual| *actual != period_ms) {
        return Err(Error::new(
            ErrorCode::DeviceError,
            format!("Period read back as {} ms, expected {} ms", actual, period_ms),
        ));
    }

    if ctx.json() {
        return print_json(&serde_json::json!({
            "period_ms": period_ms,
            "verified": readback.is_some(),
        }));
    }
    Status::success(&format!("Measurement period set to {}", format_period(period_ms)));
    Ok(())
}
