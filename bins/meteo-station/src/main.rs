//! meteo - command-line companion for the BLE weather station
//!
//! Talks to the station over Bluetooth LE (readings, calibration, clock,
//! measurement log) and checks the companion app's packaging manifest.

use clap::{Parser, Subcommand};
use meteo_cli::{paint_stderr, OutputFormat, Style};
use meteo_core::config::Config;
use meteo_core::error::exit_codes;
use meteo_telemetry::TelemetryConfig;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

use commands::{coeff, device, log, manifest, monitor, period, scan, time, Context};

/// Weather station companion CLI
#[derive(Parser)]
#[command(name = "meteo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (default: .meteo-station.toml, then the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print collected metrics as JSON to stderr on exit
    #[arg(long, global = true)]
    metrics: bool,

    /// Station address (overrides [device] address and METEO_DEVICE)
    #[arg(short, long, global = true, value_name = "ADDRESS")]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for weather stations in range
    Scan {
        /// Scan duration in seconds (default: [ble] scan_timeout_secs)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Connect and show firmware, production data, period and readings
    Info,

    /// Read current pressure, temperature and humidity
    Read,

    /// Poll readings repeatedly
    Monitor {
        /// Seconds between polls
        #[arg(short, long, default_value = "5")]
        interval: u64,

        /// Stop after this many polls
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Calibration coefficients
    Coeff {
        #[command(subcommand)]
        action: CoeffAction,
    },

    /// Measurement period
    Period {
        #[command(subcommand)]
        action: PeriodAction,
    },

    /// Device clock
    Time {
        #[command(subcommand)]
        action: TimeAction,
    },

    /// Show both 64-bit hardware identifiers
    DeviceId,

    /// Show the raw device status block
    Status,

    /// Measurement log
    Log {
        #[command(subcommand)]
        action: LogAction,
    },

    /// Packaging manifest of the companion app
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Subcommand)]
enum CoeffAction {
    /// Read the A/B pair of a channel (p, t, h, t1)
    Get { channel: meteo_protocol::Channel },

    /// Write the A/B pair of a channel
    Set {
        channel: meteo_protocol::Channel,
        #[arg(allow_negative_numbers = true)]
        a: f32,
        #[arg(allow_negative_numbers = true)]
        b: f32,

        /// Read the pair back and compare
        #[arg(long)]
        verify: bool,
    },
}

#[derive(Subcommand)]
enum PeriodAction {
    /// Read the measurement period
    Get,

    /// Set the measurement period in milliseconds
    Set {
        period_ms: u32,

        /// Read the period back and compare
        #[arg(long)]
        verify: bool,
    },
}

#[derive(Subcommand)]
enum TimeAction {
    /// Read the device clock
    Get,

    /// Set the device clock to the host's current time
    Sync,
}

#[derive(Subcommand)]
enum LogAction {
    /// Number of stored records
    Size,

    /// Download the whole log
    Download {
        /// Write entries to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// CSV instead of text/JSON
        #[arg(long)]
        csv: bool,
    },

    /// Show or replace the raw logging parameters
    Params {
        /// New parameter block as hex
        #[arg(long, value_name = "HEX")]
        set: Option<String>,
    },

    /// Pause logging
    Pause,

    /// Resume logging
    Resume,

    /// Stop a running log transfer
    Stop,

    /// Erase the stored log
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Validate one or more manifests
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Show the typed settings
    Show { file: PathBuf },

    /// Differences between two variants
    Diff { a: PathBuf, b: PathBuf },

    /// Render an AndroidManifest.xml fragment
    Render {
        file: PathBuf,

        /// TOML rendering of the typed settings instead
        #[arg(long)]
        toml: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let no_color = cli.no_color || std::env::var_os("NO_COLOR").is_some();
    if no_color {
        owo_colors::set_override(false);
    }

    let format = cli.format;
    let show_metrics = cli.metrics;

    let result = run(cli, no_color).await;

    if show_metrics {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&meteo_telemetry::metrics().export_json())
                .unwrap_or_default()
        );
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.downcast_ref::<meteo_core::Error>() {
                Some(err) => {
                    if format.is_json() {
                        eprintln!(
                            "{}",
                            serde_json::to_string_pretty(&err.to_report()).unwrap_or_default()
                        );
                    } else {
                        eprintln!("{} {}", paint_stderr("Error:", error_style()), err);
                    }
                    err.exit_code()
                }
                None => {
                    eprintln!("{} {:#}", paint_stderr("Error:", error_style()), e);
                    exit_codes::FAILURE
                }
            };
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn error_style() -> Style {
    Style::new().red().bold()
}

async fn run(cli: Cli, no_color: bool) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    meteo_telemetry::init_with_config(TelemetryConfig {
        log_level: meteo_telemetry::level_for_verbosity(
            &config.schema.telemetry.log_level,
            cli.verbose,
            cli.quiet,
        ),
        ansi: !no_color,
        ..TelemetryConfig::default()
    })?;

    if let Some(path) = &config.path {
        tracing::debug!(path = %path.display(), "using config file");
    }

    let ctx = Context {
        config,
        format: cli.format,
        device: cli.device,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Scan { timeout } => scan::run(&ctx, timeout).await?,
        Commands::Info => device::info(&ctx).await?,
        Commands::Read => monitor::read(&ctx).await?,
        Commands::Monitor { interval, count } => monitor::run(&ctx, interval, count).await?,

        Commands::Coeff { action } => match action {
            CoeffAction::Get { channel } => coeff::get(&ctx, channel).await?,
            CoeffAction::Set { channel, a, b, verify } => {
                coeff::set(&ctx, channel, a, b, verify).await?
            }
        },

        Commands::Period { action } => match action {
            PeriodAction::Get => period::get(&ctx).await?,
            PeriodAction::Set { period_ms, verify } => period::set(&ctx, period_ms, verify).await?,
        },

        Commands::Time { action } => match action {
            TimeAction::Get => time::get(&ctx).await?,
            TimeAction::Sync => time::sync(&ctx).await?,
        },

        Commands::DeviceId => device::ids(&ctx).await?,
        Commands::Status => device::status(&ctx).await?,

        Commands::Log { action } => match action {
            LogAction::Size => log::size(&ctx).await?,
            LogAction::Download { out, csv } => log::download(&ctx, out.as_deref(), csv).await?,
            LogAction::Params { set } => log::params(&ctx, set.as_deref()).await?,
            LogAction::Pause => log::control(&ctx, log::Control::Pause).await?,
            LogAction::Resume => log::control(&ctx, log::Control::Resume).await?,
            LogAction::Stop => log::control(&ctx, log::Control::Stop).await?,
            LogAction::Reset { yes } => log::reset(&ctx, yes).await?,
        },

        Commands::Manifest { action } => match action {
            ManifestAction::Check { files, strict } => manifest::check(&ctx, &files, strict)?,
            ManifestAction::Show { file } => manifest::show(&ctx, &file)?,
            ManifestAction::Diff { a, b } => manifest::diff(&ctx, &a, &b)?,
            ManifestAction::Render { file, toml } => manifest::render(&file, toml)?,
        },
    }

    Ok(())
}
