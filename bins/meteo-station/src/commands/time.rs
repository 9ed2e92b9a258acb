//! Device clock commands

use super::Context;
use chrono::Utc;
use meteo_cli::output::{print_json, Status};
use meteo_core::Result;
use meteo_protocol::format_timestamp;

pub async fn get(ctx: &Context) -> Result<()> {
    let session = ctx.connect().await?;
    let timestamp = session.read_datetime().await;
    let timestamp = session.finish(timestamp).await?;

    let drift = drift_secs(timestamp, Utc::now().timestamp());
    if ctx.json() {
        return print_json(&serde_json::json!({
            "timestamp": timestamp,
            "local": format_timestamp(timestamp),
            "drift_secs": drift,
        }));
    }

    Status::field("Device clock", format_timestamp(timestamp));
    Status::field("Drift", format!("{:+} s", drift));
    if drift.abs() > 60 {
        Status::warning("Clock is more than a minute off; run `meteo time sync`");
    }
    Ok(())
}

pub async fn sync(ctx: &Context) -> Result<()> {
    let session = ctx.connect().await?;
    let timestamp = session.sync_datetime(Utc::now()).await;
    let timestamp = session.finish(timestamp).await?;

    if ctx.json() {
        return print_json(&serde_json::json!({ "timestamp": timestamp }));
    }
    Status::success(&format!("Device clock set to {}", format_timestamp(timestamp)));
    Ok(())
}

/// Device minus host, in seconds
fn drift_secs(device: u32, host: i64) -> i64 {
    i64::from(device) - host
}
