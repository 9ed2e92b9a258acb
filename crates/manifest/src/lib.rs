//! The weather-station companion app's packaging manifest.
//!
//! The manifest is a flat INI file read by an external packager: `[app]`
//! holds identity, build inputs, versioning, requirements, presentation,
//! Android build parameters, permissions and the bridge-layer pin;
//! `[buildozer]` holds tool settings. This crate parses it, checks it,
//! compares variants and renders what Android needs from it.
//!
//! ```
//! let manifest = meteo_manifest::parse_str(
//!     "[app]\ntitle = Meteo\npackage.name = meteo\npackage.domain = org.test\nversion = 1.0\n",
//! )
//! .unwrap();
//!
//! assert_eq!(manifest.app.identity.bundle_id().as_deref(), Some("org.test.meteo"));
//! assert!(manifest.validate().is_valid());
//! ```

mod diff;
mod error;
pub mod model;
mod parser;
mod render;
mod validate;
mod value;

pub use diff::{diff, Change, ChangeKind};
pub use error::{ManifestError, Result};
pub use model::AppManifest;
pub use parser::{Duplicate, Entry, RawManifest, Section};
pub use render::{render_android_manifest, to_toml};
pub use validate::validate;
pub use value::{parse_bool, parse_list};

use meteo_core::validation::ValidationResult;
use std::path::{Path, PathBuf};

/// A parsed manifest with its typed view.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: Option<PathBuf>,
    pub raw: RawManifest,
    pub app: AppManifest,
}

impl Manifest {
    pub fn validate(&self) -> ValidationResult {
        validate(&self.raw)
    }

    pub fn diff(&self, other: &Manifest) -> Vec<Change> {
        diff(&self.raw, &other.raw)
    }

    /// File name for messages, `<input>` when parsed from a string
    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "<input>".to_string(), |p| p.display().to_string())
    }
}

/// Parse manifest text.
pub fn parse_str(text: &str) -> Result<Manifest> {
    let raw = parser::parse_str(text)?;
    let app = AppManifest::from_raw(&raw);
    Ok(Manifest {
        path: None,
        raw,
        app,
    })
}

/// Read and parse a manifest file.
pub fn load(path: impl AsRef<Path>) -> Result<Manifest> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded manifest");

    let mut manifest = parse_str(&text)?;
    manifest.path = Some(path.to_path_buf());
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[app]\ntitle = Meteo\nandroid.api = 33").unwrap();

        let manifest = load(file.path()).unwrap();
        assert_eq!(manifest.app.android.api, Some(33));
        assert_eq!(manifest.display_name(), file.path().display().to_string());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("buildozer.spec")).unwrap_err();
        assert_eq!(err.code(), meteo_core::ErrorCode::FileNotFound);
    }

    #[test]
    fn test_syntax_error_converts_to_core_error() {
        let err: meteo_core::Error = parse_str("[app]\nbroken\n").unwrap_err().into();
        assert_eq!(err.code, meteo_core::ErrorCode::InvalidFormat);
        assert!(err.message.contains("Line 2"));
    }

    #[test]
    fn test_manifest_json_shape() {
        let manifest = parse_str("[app]\ntitle = Meteo\n").unwrap();
        let json = serde_json::to_value(&manifest.app).unwrap();
        assert_eq!(json["identity"]["title"], "Meteo");
        assert_eq!(json["build"]["source_dir"], ".");
    }
}
