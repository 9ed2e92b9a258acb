//! Typed view of the manifest, one group per kind of setting.
//!
//! Conversion is lenient: values that do not parse are left out here and
//! reported by [`crate::validate`].

use crate::parser::RawManifest;
use crate::value::{parse_bool, parse_int, parse_list};
use serde::Serialize;

pub const APP: &str = "app";
pub const BUILDOZER: &str = "buildozer";

/// Prefix the Android permission names are normalised to
pub const PERMISSION_PREFIX: &str = "android.permission.";

/// App display name and bundle identifier parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Identity {
    pub title: Option<String>,
    pub package_name: Option<String>,
    pub package_domain: Option<String>,
}

impl Identity {
    /// `package.domain` + `.` + `package.name`
    pub fn bundle_id(&self) -> Option<String> {
        match (&self.package_domain, &self.package_name) {
            (Some(domain), Some(name)) => Some(format!("{}.{}", domain, name)),
            _ => None,
        }
    }
}

/// Which files the packager bundles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildInputs {
    pub source_dir: String,
    pub include_exts: Vec<String>,
    pub exclude_dirs: Vec<String>,
}

impl Default for BuildInputs {
    fn default() -> Self {
        Self {
            source_dir: ".".to_string(),
            include_exts: Vec::new(),
            exclude_dirs: Vec::new(),
        }
    }
}

/// Either a literal version or a regex applied to a source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Versioning {
    pub version: Option<String>,
    pub regex: Option<String>,
    pub filename: Option<String>,
}

/// One runtime requirement, `name` or `name==pin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

impl Requirement {
    pub fn parse(spec: &str) -> Self {
        match spec.split_once("==") {
            Some((name, pin)) => Self {
                name: name.trim().to_string(),
                pin: Some(pin.trim().to_string()),
            },
            None => Self {
                name: spec.trim().to_string(),
                pin: None,
            },
        }
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pin {
            Some(pin) => write!(f, "{}=={}", self.name, pin),
            None => f.write_str(&self.name),
        }
    }
}

/// Presentation constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlatformTarget {
    pub orientation: Vec<String>,
    pub fullscreen: Option<bool>,
}

/// Parameters for the Android build backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AndroidBuild {
    pub api: Option<u32>,
    pub minapi: Option<u32>,
    pub ndk: Option<String>,
    pub ndk_api: Option<u32>,
    pub build_tools_version: Option<String>,
    pub accept_sdk_license: Option<bool>,
    pub skip_update: Option<bool>,
    pub archs: Vec<String>,
    /// Fully-qualified permission names
    pub permissions: Vec<String>,
}

impl AndroidBuild {
    /// Packager default when `android.api` is unset
    pub const DEFAULT_API: u32 = 31;
    /// Packager default when `android.minapi` is unset
    pub const DEFAULT_MINAPI: u32 = 21;

    pub fn target_api(&self) -> u32 {
        self.api.unwrap_or(Self::DEFAULT_API)
    }

    pub fn min_api(&self) -> u32 {
        self.minapi.unwrap_or(Self::DEFAULT_MINAPI)
    }

    pub fn has_permission(&self, short_name: &str) -> bool {
        let full = normalize_permission(short_name);
        self.permissions.iter().any(|p| *p == full)
    }
}

/// Platform-bridge build layer pin.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Toolchain {
    pub p4a_branch: Option<String>,
}

/// `[buildozer]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildozerSettings {
    pub log_level: Option<u32>,
    pub warn_on_root: Option<bool>,
}

/// Typed manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppManifest {
    pub identity: Identity,
    pub build: BuildInputs,
    pub version: Versioning,
    pub platform: PlatformTarget,
    pub android: AndroidBuild,
    pub toolchain: Toolchain,
    pub buildozer: BuildozerSettings,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
}

impl AppManifest {
    pub fn from_raw(raw: &RawManifest) -> Self {
        let app = |key: &str| raw.get(APP, key).map(str::to_string);
        let list = |key: &str| raw.get(APP, key).map(parse_list).unwrap_or_default();
        let int = |key: &str| raw.get(APP, key).and_then(parse_int);
        let flag = |key: &str| raw.get(APP, key).and_then(parse_bool);

        Self {
            identity: Identity {
                title: app("title"),
                package_name: app("package.name"),
                package_domain: app("package.domain"),
            },
            build: BuildInputs {
                source_dir: app("source.dir").unwrap_or_else(|| ".".to_string()),
                include_exts: list("source.include_exts"),
                exclude_dirs: list("source.exclude_dirs"),
            },
            version: Versioning {
                version: app("version"),
                regex: app("version.regex"),
                filename: app("version.filename"),
            },
            platform: PlatformTarget {
                orientation: list("orientation"),
                fullscreen: flag("fullscreen"),
            },
            android: AndroidBuild {
                api: int("android.api"),
                minapi: int("android.minapi"),
                ndk: app("android.ndk"),
                ndk_api: int("android.ndk_api"),
                build_tools_version: app("android.build_tools_version"),
                accept_sdk_license: flag("android.accept_sdk_license"),
                skip_update: flag("android.skip_update"),
                archs: list("android.archs"),
                permissions: list("android.permissions")
                    .iter()
                    .map(|p| normalize_permission(p))
                    .collect(),
            },
            toolchain: Toolchain {
                p4a_branch: app("p4a.branch"),
            },
            buildozer: BuildozerSettings {
                log_level: raw.get(BUILDOZER, "log_level").and_then(parse_int),
                warn_on_root: raw.get(BUILDOZER, "warn_on_root").and_then(parse_bool),
            },
            requirements: list("requirements")
                .iter()
                .map(|spec| Requirement::parse(spec))
                .collect(),
        }
    }
}

/// `BLUETOOTH_SCAN` → `android.permission.BLUETOOTH_SCAN`; dotted names
/// are already qualified and kept.
pub fn normalize_permission(name: &str) -> String {
    let name = name.trim();
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{}{}", PERMISSION_PREFIX, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    const SAMPLE: &str = "\
[app]
title = Weather Station
package.name = meteostation
package.domain = org.meteo
source.dir = .
source.include_exts = py,png,jpg,kv,atlas
version = 0.1
requirements = python3,kivy==2.2.1,pyjnius,android
orientation = portrait
fullscreen = 0
android.permissions = BLUETOOTH_SCAN, BLUETOOTH_CONNECT, android.permission.ACCESS_FINE_LOCATION
android.api = 33
android.minapi = 21
android.ndk = 25b
android.archs = arm64-v8a, armeabi-v7a
android.accept_sdk_license = True
p4a.branch = develop

[buildozer]
log_level = 2
warn_on_root = 1
";

    #[test]
    fn test_from_raw_groups() {
        let manifest = AppManifest::from_raw(&parse_str(SAMPLE).unwrap());

        assert_eq!(manifest.identity.bundle_id().as_deref(), Some("org.meteo.meteostation"));
        assert_eq!(manifest.build.include_exts.len(), 5);
        assert_eq!(manifest.version.version.as_deref(), Some("0.1"));
        assert_eq!(manifest.platform.fullscreen, Some(false));
        assert_eq!(manifest.android.api, Some(33));
        assert_eq!(manifest.android.accept_sdk_license, Some(true));
        assert_eq!(manifest.android.archs, vec!["arm64-v8a", "armeabi-v7a"]);
        assert_eq!(manifest.toolchain.p4a_branch.as_deref(), Some("develop"));
        assert_eq!(manifest.buildozer.log_level, Some(2));
        assert_eq!(manifest.buildozer.warn_on_root, Some(true));
    }

    #[test]
    fn test_requirements_with_pins() {
        let manifest = AppManifest::from_raw(&parse_str(SAMPLE).unwrap());
        assert_eq!(
            manifest.requirements[1],
            Requirement {
                name: "kivy".into(),
                pin: Some("2.2.1".into())
            }
        );
        assert_eq!(manifest.requirements[0].pin, None);
        assert_eq!(manifest.requirements[1].to_string(), "kivy==2.2.1");
    }

    #[test]
    fn test_permissions_normalised() {
        let manifest = AppManifest::from_raw(&parse_str(SAMPLE).unwrap());
        assert_eq!(
            manifest.android.permissions,
            vec![
                "android.permission.BLUETOOTH_SCAN",
                "android.permission.BLUETOOTH_CONNECT",
                "android.permission.ACCESS_FINE_LOCATION",
            ]
        );
        assert!(manifest.android.has_permission("ACCESS_FINE_LOCATION"));
        assert!(!manifest.android.has_permission("BLUETOOTH_ADMIN"));
    }

    #[test]
    fn test_defaults_when_unset() {
        let manifest = AppManifest::from_raw(&parse_str("[app]\ntitle = x\n").unwrap());
        assert_eq!(manifest.build.source_dir, ".");
        assert_eq!(manifest.android.target_api(), 31);
        assert_eq!(manifest.android.min_api(), 21);
        assert!(manifest.identity.bundle_id().is_none());
    }

    #[test]
    fn test_malformed_numbers_are_left_out() {
        let manifest = AppManifest::from_raw(&parse_str("[app]\nandroid.api = thirty\n").unwrap());
        assert_eq!(manifest.android.api, None);
    }
}
