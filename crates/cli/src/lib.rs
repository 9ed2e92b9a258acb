//! Terminal helpers shared by the meteo binaries: status lines, text or
//! JSON output, and progress indicators for scans and log downloads.

pub mod output;
pub mod progress;

pub use output::{paint, paint_stderr, OutputFormat, Status, Style};
