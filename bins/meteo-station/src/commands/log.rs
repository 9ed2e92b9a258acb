//! Measurement log commands

use super::Context;
use meteo_ble::LogDownload;
use meteo_cli::output::{format_count, print_json, Status};
use meteo_cli::progress;
use meteo_core::{Error, ErrorCode, Result, ResultExt};
use meteo_protocol::{format_timestamp, LogEntry, RawPayload};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

/// Logging state changes that need no answer
#[derive(Debug, Clone, Copy)]
pub enum Control {
    Pause,
    Resume,
    Stop,
}

pub async fn size(ctx: &Context) -> Result<()> {
    let session = ctx.connect().await?;
    let records = session.read_log_size().await;
    let records = session.finish(records).await?;

    if ctx.json() {
        return print_json(&serde_json::json!({ "records": records }));
    }
    Status::field("Log size", format_count(records as usize, "record", "records"));
    Ok(())
}

/// Download the whole log to stdout or `out`.
///
/// A relative `out` lands in `[log] export_dir`.
pub async fn download(ctx: &Context, out: Option<&Path>, csv: bool) -> Result<()> {
    let session = ctx.connect().await?;
    let total = session.read_log_size().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "log size unavailable");
        0
    });

    let pb = if ctx.quiet || (ctx.json() && out.is_none()) {
        progress::hidden()
    } else {
        progress::log_progress(u64::from(total))
    };
    let result = session.download_log(|_| pb.inc(1)).await;
    let result = session.finish(result).await;

    let download = match result {
        Ok(download) => download,
        Err(e) => {
            progress::finish_error(&pb, "Download failed");
            return Err(e.into());
        }
    };
    let summary = format_count(download.entries.len(), "entry", "entries");
    if download.completed {
        progress::finish_success(&pb, &format!("Downloaded {}", summary));
    } else {
        progress::finish_error(&pb, &format!("Transfer went idle after {}", summary));
    }

    let body = if csv {
        download.to_csv()
    } else if ctx.json() {
        serde_json::to_string_pretty(&download)?
    } else {
        render_table(&download)
    };

    match out {
        Some(path) => {
            let path = resolve_export_path(&ctx.config.schema.log.export_dir_expanded(), path);
            std::fs::write(&path, body)
                .map_err(Error::from)
                .context(format!("Writing {}", path.display()))?;
            if !ctx.json() {
                Status::success(&format!("Saved {} to {}", summary, path.display()));
            }
        }
        None => print!("{}", body),
    }

    if !ctx.json() && download.incomplete() > 0 {
        Status::warning(&format!(
            "{} missing at least one partial record",
            format_count(download.incomplete(), "entry is", "entries are")
        ));
    }
    if download.dropped_frames > 0 {
        Status::warning(&format!(
            "{} lost while reading; the result is partial",
            format_count(download.dropped_frames as usize, "frame was", "frames were")
        ));
    } else if !download.completed {
        Status::warning("The station never signalled the end of the log; the result may be partial");
    }
    Ok(())
}

/// Show the raw logging parameters, or replace them when `set` is given.
pub async fn params(ctx: &Context, set: Option<&str>) -> Result<()> {
    let replacement = set.map(parse_payload).transpose()?;

    let session = ctx.connect().await?;
    if let Some(payload) = replacement {
        let len = payload.as_bytes().len();
        let written = session.write_log_params(payload).await;
        session.finish(written).await?;
        Status::success(&format!("Wrote {} of log parameters", format_count(len, "byte", "bytes")));
        return Ok(());
    }

    let payload = session.read_log_params().await;
    let payload = session.finish(payload).await?;
    if ctx.json() {
        return print_json(&serde_json::json!({ "params": hex::encode(&payload) }));
    }
    Status::field("Log parameters", hex::encode_upper(&payload));
    Ok(())
}

pub async fn control(ctx: &Context, action: Control) -> Result<()> {
    let session = ctx.connect().await?;
    let sent = match action {
        Control::Pause => session.pause_log().await,
        Control::Resume => session.resume_log().await,
        Control::Stop => session.stop_log().await,
    };
    session.finish(sent).await?;

    let done = match action {
        Control::Pause => "Logging paused",
        Control::Resume => "Logging resumed",
        Control::Stop => "Log transfer stopped",
    };
    Status::success(done);
    Ok(())
}

/// Erase the stored log after confirmation.
pub async fn reset(ctx: &Context, yes: bool) -> Result<()> {
    if !yes {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Err(Error::new(ErrorCode::InvalidInput, "Refusing to erase the log without confirmation")
                .with_suggestion("Pass --yes to erase without a prompt"));
        }
        print!("Erase every record stored on the station? [y/N] ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            Status::info("Log left untouched");
            return Ok(());
        }
    }

    let session = ctx.connect().await?;
    let erased = session.reset_log().await;
    session.finish(erased).await?;
    Status::success("Station log erased");
    Ok(())
}

fn parse_payload(text: &str) -> Result<RawPayload> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    let bytes = hex::decode(&cleaned).map_err(|e| {
        Error::new(ErrorCode::InvalidFormat, format!("Invalid hex payload '{}': {}", text, e))
    })?;
    Ok(RawPayload::try_from(bytes)?)
}

fn resolve_export_path(export_dir: &str, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(export_dir).join(path)
    }
}

fn render_table(download: &LogDownload) -> String {
    fn cell(value: Option<f32>, precision: usize) -> String {
        value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
    }
    fn row(entry: &LogEntry) -> String {
        format!(
            "{:>6}  {:<19}  {:>9}  {:>7}  {:>6}  {:>7}\n",
            entry.record,
            entry.timestamp.map(format_timestamp).unwrap_or_else(|| "-".to_string()),
            cell(entry.pressure, 3),
            cell(entry.temperature, 2),
            cell(entry.humidity, 1),
            cell(entry.temperature_ext, 2),
        )
    }

    let mut out = format!(
        "{:>6}  {:<19}  {:>9}  {:>7}  {:>6}  {:>7}\n",
        "#", "Time", "P, kPa", "T, °C", "H, %", "T1, °C"
    );
    for entry in &download.entries {
        out.push_str(&row(entry));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_accepts_separators() {
        let payload = parse_payload("01:02 0a ff").unwrap();
        assert_eq!(payload.as_bytes(), &[0x01, 0x02, 0x0A, 0xFF]);
        assert!(parse_payload("0g").is_err());
        assert!(parse_payload(&"00".repeat(300)).is_err());
    }

    #[test]
    fn test_resolve_export_path() {
        assert_eq!(
            resolve_export_path("/data/logs", Path::new("run.csv")),
            PathBuf::from("/data/logs/run.csv")
        );
        assert_eq!(
            resolve_export_path("/data/logs", Path::new("/tmp/run.csv")),
            PathBuf::from("/tmp/run.csv")
        );
    }

    #[test]
    fn test_render_table_marks_missing_fields() {
        let download = LogDownload {
            entries: vec![LogEntry {
                record: 7,
                timestamp: None,
                pressure: None,
                temperature: Some(21.5),
                humidity: Some(40.0),
                temperature_ext: None,
            }],
            completed: false,
            dropped_frames: 0,
        };
        let table = render_table(&download);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(!table.contains('\x1b'));
        assert!(lines[1].trim_start().starts_with("7  -"));
        assert!(lines[1].contains("21.50"));
    }
}
