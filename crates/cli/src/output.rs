//! Printing command results
//!
//! Human output goes through [`Status`]; `--format json` output through
//! [`print_json`]. Every color goes through [`paint`] or [`paint_stderr`],
//! which drop styling when the stream is not a terminal or when the global
//! `owo_colors` override is off (`--no-color` / `NO_COLOR`).

use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use std::fmt::Display;

pub use owo_colors::Style;

/// Width of the label column in [`Status::field`] blocks
const LABEL_WIDTH: usize = 18;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One pretty-printed JSON document on stdout
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> meteo_core::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}

/// `text` in `style` when stdout takes colors, plain otherwise
pub fn paint(text: impl Display, style: Style) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.style(style))
        .to_string()
}

/// [`paint`] for text bound for stderr
pub fn paint_stderr(text: impl Display, style: Style) -> String {
    text.if_supports_color(Stream::Stderr, |t| t.style(style))
        .to_string()
}

/// Status lines and `label: value` blocks.
///
/// Warnings go to stderr so they never mix into redirected output.
pub struct Status;

impl Status {
    pub fn success(message: &str) {
        println!("{} {}", paint("✓", Style::new().green()), message);
    }

    pub fn warning(message: &str) {
        eprintln!("{} {}", paint_stderr("⚠", Style::new().yellow()), message);
    }

    pub fn info(message: &str) {
        println!("{} {}", paint("ℹ", Style::new().blue()), message);
    }

    /// Bold title underlined to its own width, after a blank line
    pub fn header(title: &str) {
        let rule = "─".repeat(title.chars().count());
        println!("\n{}\n{}", paint(title, Style::new().bold()), rule);
    }

    pub fn field(label: &str, value: impl Display) {
        println!("  {} {}", paint(pad_label(label), Style::new().dimmed()), value);
    }

    /// A field with nothing to show, rendered as a dimmed `n/a`
    pub fn field_missing(label: &str) {
        let dim = Style::new().dimmed();
        println!("  {} {}", paint(pad_label(label), dim), paint("n/a", dim));
    }
}

fn pad_label(label: &str) -> String {
    format!("{:<width$}", format!("{}:", label), width = LABEL_WIDTH)
}

/// Signal strength as four bars plus dBm, e.g. `▂▄▆_  -67 dBm`
pub fn format_rssi(rssi: Option<i16>) -> String {
    const BARS: [&str; 4] = ["▂", "▄", "▆", "█"];
    const THRESHOLDS: [i16; 4] = [-90, -80, -67, -55];

    let Some(rssi) = rssi else {
        return "    ? dBm".to_string();
    };
    let lit = THRESHOLDS.iter().filter(|&&t| rssi >= t).count();
    let bars: String = BARS
        .iter()
        .enumerate()
        .map(|(i, bar)| if i < lit { *bar } else { "_" })
        .collect();
    format!("{} {:>4} dBm", bars, rssi)
}

/// Measurement period in the largest unit that divides it evenly
pub fn format_period(period_ms: u32) -> String {
    const UNITS: [(u32, &str); 2] = [(60_000, "min"), (1000, "s")];

    UNITS
        .iter()
        .find(|(size, _)| period_ms >= *size && period_ms % size == 0)
        .map_or_else(
            || format!("{} ms", period_ms),
            |(size, unit)| format!("{} {}", period_ms / size, unit),
        )
}

/// `1 station`, `3 stations`
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    let noun = if count == 1 { singular } else { plural };
    format!("{} {}", count, noun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_period() {
        assert_eq!(format_period(250), "250 ms");
        assert_eq!(format_period(5000), "5 s");
        assert_eq!(format_period(1500), "1500 ms");
        assert_eq!(format_period(120_000), "2 min");
        assert_eq!(format_period(90_000), "90 s");
    }

    #[test]
    fn test_format_rssi() {
        assert_eq!(format_rssi(Some(-50)), "▂▄▆█  -50 dBm");
        assert_eq!(format_rssi(Some(-67)), "▂▄▆_  -67 dBm");
        assert_eq!(format_rssi(Some(-85)), "▂___  -85 dBm");
        assert_eq!(format_rssi(Some(-100)), "____ -100 dBm");
        assert_eq!(format_rssi(None), "    ? dBm");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(1, "station", "stations"), "1 station");
        assert_eq!(format_count(0, "station", "stations"), "0 stations");
    }

    #[test]
    fn test_pad_label_aligns_values() {
        assert_eq!(pad_label("RSSI").len(), LABEL_WIDTH);
        assert!(pad_label("RSSI").starts_with("RSSI:"));
    }

    #[test]
    fn test_paint_follows_color_override() {
        owo_colors::set_override(true);
        let forced = paint("Error:", Style::new().red().bold());
        owo_colors::set_override(false);
        let plain = paint("Error:", Style::new().red().bold());
        let plain_err = paint_stderr(pad_label("RSSI"), Style::new().dimmed());
        owo_colors::unset_override();

        assert!(forced.contains('\x1b'));
        assert_eq!(plain, "Error:");
        assert_eq!(plain_err, pad_label("RSSI"));
    }

    #[test]
    fn test_output_format_is_json() {
        assert!(OutputFormat::Json.is_json());
        assert!(!OutputFormat::default().is_json());
    }
}
