//! Manifest commands - check, show, diff and render the packaging manifest

use super::Context;
use meteo_cli::output::{format_count, paint, print_json, Status, Style};
use meteo_core::validation::{ValidationError, ValidationResult};
use meteo_core::{Error, ErrorCode, Result};
use meteo_manifest::{AppManifest, ChangeKind, Manifest};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct FileReport {
    file: PathBuf,
    valid: bool,
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
}

/// Validate every file; fails when any file has errors (or warnings with `strict`).
pub fn check(ctx: &Context, files: &[PathBuf], strict: bool) -> Result<()> {
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let result = match meteo_manifest::load(file) {
            Ok(manifest) => manifest.validate(),
            Err(e) => {
                let mut result = ValidationResult::new();
                result.add_error(ValidationError::new("", "UNREADABLE", e.to_string()));
                result
            }
        };
        let valid = result.is_valid() && !(strict && !result.warnings().is_empty());
        reports.push(FileReport {
            file: file.clone(),
            valid,
            errors: result.errors().to_vec(),
            warnings: result.warnings().to_vec(),
        });
    }

    let failed = reports.iter().filter(|r| !r.valid).count();

    if ctx.json() {
        print_json(&reports)?;
    } else {
        for report in &reports {
            print_report(report);
        }
        println!();
        if failed == 0 {
            Status::success(&format!(
                "{} passed",
                format_count(reports.len(), "manifest", "manifests")
            ));
        }
    }

    if failed > 0 {
        return Err(Error::new(
            ErrorCode::ValidationError,
            format!(
                "{} of {} failed validation",
                format_count(failed, "manifest", "manifests"),
                reports.len()
            ),
        ));
    }
    Ok(())
}

fn print_report(report: &FileReport) {
    let name = report.file.display().to_string();
    if report.valid {
        println!("{} {}", paint("✓", Style::new().green()), name);
    } else {
        println!("{} {}", paint("✗", Style::new().red()), paint(name, Style::new().bold()));
    }
    for error in &report.errors {
        println!("    {} {}", paint("error", Style::new().red()), describe(error));
    }
    for warning in &report.warnings {
        println!("    {} {}", paint("warning", Style::new().yellow()), describe(warning));
    }
}

fn describe(issue: &ValidationError) -> String {
    let mut line = if issue.field.is_empty() {
        issue.message.clone()
    } else {
        issue.to_string()
    };
    if let Some(expected) = &issue.expected {
        line.push_str(&format!(" (expected {}", expected));
        if let Some(actual) = &issue.actual {
            line.push_str(&format!(", got `{}`", actual));
        }
        line.push(')');
    }
    line
}

pub fn show(ctx: &Context, file: &Path) -> Result<()> {
    let manifest = meteo_manifest::load(file)?;

    if ctx.json() {
        return print_json(&manifest.app);
    }
    print_model(&manifest);
    Ok(())
}

fn print_model(manifest: &Manifest) {
    fn opt(label: &str, value: Option<impl std::fmt::Display>) {
        match value {
            Some(v) => Status::field(label, v),
            None => Status::field_missing(label),
        }
    }
    fn list(label: &str, values: &[String]) {
        if values.is_empty() {
            Status::field_missing(label);
        } else {
            Status::field(label, values.join(", "));
        }
    }

    let app: &AppManifest = &manifest.app;
    Status::header(&manifest.display_name());

    opt("Title", app.identity.title.as_deref());
    opt("Bundle id", app.identity.bundle_id());
    opt("Version", app.version.version.as_deref().or(app.version.regex.as_deref()));
    Status::field("Source dir", &app.build.source_dir);
    list("Include exts", &app.build.include_exts);

    let requirements: Vec<String> = app.requirements.iter().map(ToString::to_string).collect();
    list("Requirements", &requirements);
    list("Orientation", &app.platform.orientation);
    opt("Fullscreen", app.platform.fullscreen);

    let android = &app.android;
    Status::field(
        "Android api",
        format!("{} (min {})", android.target_api(), android.min_api()),
    );
    opt("NDK", android.ndk.as_deref());
    list("Archs", &android.archs);
    list("Permissions", &android.permissions);
    opt("p4a branch", app.toolchain.p4a_branch.as_deref());
    opt("Log level", app.buildozer.log_level);
}

pub fn diff(ctx: &Context, a: &Path, b: &Path) -> Result<()> {
    let left = meteo_manifest::load(a)?;
    let right = meteo_manifest::load(b)?;
    let changes = left.diff(&right);

    if ctx.json() {
        return print_json(&changes);
    }

    if changes.is_empty() {
        Status::success(&format!(
            "{} and {} are equivalent",
            left.display_name(),
            right.display_name()
        ));
        return Ok(());
    }

    Status::header(&format!("{} → {}", left.display_name(), right.display_name()));
    for change in &changes {
        let style = match change.kind {
            ChangeKind::Added => Style::new().green(),
            ChangeKind::Removed => Style::new().red(),
            ChangeKind::Changed => Style::new().yellow(),
        };
        println!("  {}", paint(change, style));
    }
    println!();
    Status::info(&format_count(changes.len(), "difference", "differences"));
    Ok(())
}

/// AndroidManifest.xml fragment, or the typed settings as TOML
pub fn render(file: &Path, toml: bool) -> Result<()> {
    let manifest = meteo_manifest::load(file)?;
    let out = if toml {
        meteo_manifest::to_toml(&manifest.app)?
    } else {
        meteo_manifest::render_android_manifest(&manifest.app)
    };
    print!("{}", out);
    Ok(())
}
