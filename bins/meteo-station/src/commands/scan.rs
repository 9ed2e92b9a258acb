//! Scan command - list stations in range

use super::Context;
use meteo_ble::scanner;
use meteo_cli::output::{format_count, format_rssi, paint, print_json, Status, Style};
use meteo_cli::progress;
use meteo_core::Result;
use std::time::Duration;

/// Run scan command
pub async fn run(ctx: &Context, timeout_secs: Option<u64>) -> Result<()> {
    let ble = &ctx.config.schema.ble;
    let duration = timeout_secs.map_or_else(|| ble.scan_timeout(), Duration::from_secs);

    let adapter = scanner::adapter(ble.adapter_index).await?;
    let pb = ctx.spinner(&format!("Scanning for {}s...", duration.as_secs()));
    let stations = match scanner::scan(&adapter, duration, ble.name_filter.as_deref()).await {
        Ok(stations) => stations,
        Err(e) => {
            progress::finish_error(&pb, "Scan failed");
            return Err(e.into());
        }
    };
    progress::finish_success(
        &pb,
        &format!("Found {}", format_count(stations.len(), "station", "stations")),
    );

    if ctx.json() {
        return print_json(&stations);
    }

    if stations.is_empty() {
        Status::warning("No weather station in range");
        return Ok(());
    }

    let dim = Style::new().dimmed();
    println!();
    println!(
        "  {}",
        paint(format!("{:<20} {:<24} {}", "Address", "Name", "Signal"), dim)
    );
    println!("  {}", paint("─".repeat(60), dim));
    for station in &stations {
        println!(
            "  {} {:<24} {}",
            paint(format!("{:<20}", station.address), Style::new().cyan()),
            station.name,
            format_rssi(station.rssi)
        );
    }
    println!();

    if let Some(first) = stations.first() {
        Status::info(&format!("Connect with: meteo --device {} info", first.address));
    }
    Ok(())
}
