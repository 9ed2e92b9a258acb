//! Manifest checks.
//!
//! Errors block packaging; warnings flag settings the Bluetooth companion
//! app needs at runtime or keys the packager does not know.

use crate::model::{AppManifest, APP, BUILDOZER};
use crate::parser::RawManifest;
use crate::value::{parse_bool, parse_int};
use meteo_core::validation::{ValidationError, ValidationResult, Validator};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

static DOMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*$").unwrap());

static NDK_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}[a-z]?$").unwrap());

const ORIENTATIONS: &[&str] = &[
    "portrait",
    "landscape",
    "portrait-reverse",
    "landscape-reverse",
    "all",
];

const BOOL_KEYS: &[&str] = &[
    "fullscreen",
    "android.accept_sdk_license",
    "android.skip_update",
];

/// Titles past this are truncated on most launchers
const MAX_TITLE_LEN: usize = 30;

const INT_KEYS: &[&str] = &["android.api", "android.minapi", "android.ndk_api"];

/// `[app]` keys the packager understands besides the `ios.`/`osx.` namespaces.
const KNOWN_APP_KEYS: &[&str] = &[
    "title",
    "package.name",
    "package.domain",
    "source.dir",
    "source.include_exts",
    "source.include_patterns",
    "source.exclude_exts",
    "source.exclude_dirs",
    "source.exclude_patterns",
    "version",
    "version.regex",
    "version.filename",
    "requirements",
    "requirements.source.kivy",
    "garden_requirements",
    "presplash.filename",
    "icon.filename",
    "orientation",
    "fullscreen",
    "services",
    "android.api",
    "android.minapi",
    "android.sdk",
    "android.ndk",
    "android.ndk_api",
    "android.ndk_path",
    "android.sdk_path",
    "android.ant_path",
    "android.build_tools_version",
    "android.accept_sdk_license",
    "android.skip_update",
    "android.archs",
    "android.permissions",
    "android.features",
    "android.presplash_color",
    "android.entrypoint",
    "android.apptheme",
    "android.gradle_dependencies",
    "android.add_jars",
    "android.add_src",
    "android.add_aars",
    "android.add_assets",
    "android.add_resources",
    "android.meta_data",
    "android.logcat_filters",
    "android.copy_libs",
    "android.wakelock",
    "android.private_storage",
    "android.allow_backup",
    "android.release_artifact",
    "android.debug_artifact",
    "android.enable_androidx",
    "p4a.branch",
    "p4a.commit",
    "p4a.fork",
    "p4a.url",
    "p4a.source_dir",
    "p4a.local_recipes",
    "p4a.hook",
    "p4a.bootstrap",
    "p4a.port",
    "p4a.extra_args",
];

const KNOWN_BUILDOZER_KEYS: &[&str] = &["log_level", "warn_on_root", "build_dir", "bin_dir"];

/// Check a parsed manifest.
pub fn validate(raw: &RawManifest) -> ValidationResult {
    let manifest = AppManifest::from_raw(raw);
    let mut result = ValidationResult::new();

    check_structure(raw, &mut result);
    check_scalars(raw, &mut result);
    result.merge(check_identity(&manifest));
    result.merge(check_build(&manifest));
    check_bluetooth_readiness(&manifest, &mut result);

    tracing::debug!(
        errors = result.errors().len(),
        warnings = result.warnings().len(),
        "manifest validated"
    );
    result
}

fn field(section: &str, key: &str) -> String {
    if section == APP {
        key.to_string()
    } else {
        format!("{}.{}", section, key)
    }
}

fn check_structure(raw: &RawManifest, result: &mut ValidationResult) {
    for dup in raw.duplicates() {
        result.add_error(ValidationError::new(
            field(&dup.section, &dup.key),
            "DUPLICATE_KEY",
            format!(
                "Defined more than once (lines {} and {}); line {} wins",
                dup.first_line, dup.line, dup.line
            ),
        ));
    }

    if raw.section(APP).is_none() {
        result.add_error(ValidationError::new("[app]", "MISSING_SECTION", "No [app] section"));
    }

    for section in raw.sections() {
        for (key, _) in raw.effective(&section.name) {
            let known = match section.name.as_str() {
                APP => {
                    KNOWN_APP_KEYS.contains(&key) || key.starts_with("ios.") || key.starts_with("osx.")
                }
                BUILDOZER => KNOWN_BUILDOZER_KEYS.contains(&key),
                // other sections ([app:profile], [depends]) are the packager's business
                _ => true,
            };
            if !known {
                result.add_warning(ValidationError::new(
                    field(&section.name, key),
                    "UNKNOWN_KEY",
                    "Not a key the packager reads; check for typos",
                ));
            }
        }
    }
}

fn check_scalars(raw: &RawManifest, result: &mut ValidationResult) {
    let bools = BOOL_KEYS
        .iter()
        .map(|k| (APP, *k))
        .chain([(BUILDOZER, "warn_on_root")]);
    for (section, key) in bools {
        if let Some(value) = raw.get(section, key) {
            if parse_bool(value).is_none() {
                result.add_error(
                    ValidationError::new(field(section, key), "INVALID_BOOL", "Not a boolean")
                        .expected("1/0, true/false, yes/no or on/off")
                        .actual(value),
                );
            }
        }
    }

    let ints = INT_KEYS
        .iter()
        .map(|k| (APP, *k))
        .chain([(BUILDOZER, "log_level")]);
    for (section, key) in ints {
        if let Some(value) = raw.get(section, key) {
            if parse_int(value).is_none() {
                result.add_error(
                    ValidationError::new(field(section, key), "INVALID_INT", "Not an integer")
                        .expected("non-negative integer")
                        .actual(value),
                );
            }
        }
    }
}

fn check_identity(manifest: &AppManifest) -> ValidationResult {
    let identity = &manifest.identity;
    let mut v = Validator::new()
        .present("title", identity.title.as_deref())
        .present("package.name", identity.package_name.as_deref())
        .present("package.domain", identity.package_domain.as_deref());

    if let Some(title) = identity.title.as_deref() {
        v = v.warn_if(
            "title",
            title.chars().count() > MAX_TITLE_LEN,
            &format!("Longer than {} characters; the launcher label may be cut", MAX_TITLE_LEN),
        );
    }
    if let Some(name) = identity.package_name.as_deref().filter(|n| !n.is_empty()) {
        v = v.pattern("package.name", name, &IDENTIFIER, "a letter followed by letters, digits or _");
    }
    if let Some(domain) = identity.package_domain.as_deref().filter(|d| !d.is_empty()) {
        v = v.pattern("package.domain", domain, &DOMAIN, "dot-separated identifiers");
    }
    v.validate()
}

fn check_build(manifest: &AppManifest) -> ValidationResult {
    let version = &manifest.version;
    let android = &manifest.android;

    let mut v = Validator::new()
        .custom("version", || match (&version.version, &version.regex, &version.filename) {
            (Some(_), _, _) => None,
            (None, Some(_), Some(_)) => None,
            (None, Some(_), None) => Some("version.regex needs version.filename".to_string()),
            (None, None, _) => {
                Some("Set either version or version.regex with version.filename".to_string())
            }
        })
        .custom("android.minapi", || {
            (android.min_api() > android.target_api()).then(|| {
                format!(
                    "minapi {} is above the target api {}",
                    android.min_api(),
                    android.target_api()
                )
            })
        });

    v = v.warn_if(
        "android.accept_sdk_license",
        android.accept_sdk_license != Some(true),
        "Not accepted; unattended builds stop at the SDK license prompt",
    );

    if let Some(ndk) = android.ndk.as_deref() {
        v = v.pattern("android.ndk", ndk, &NDK_VERSION, "an NDK release such as 25b");
    }
    for orientation in &manifest.platform.orientation {
        v = v.one_of("orientation", orientation, ORIENTATIONS);
    }
    if let Some(level) = manifest.buildozer.log_level {
        v = v.range("buildozer.log_level", level, 0, 2);
    }
    v.validate()
}

fn check_bluetooth_readiness(manifest: &AppManifest, result: &mut ValidationResult) {
    let android = &manifest.android;
    let mut missing = Vec::new();

    if android.target_api() >= 31 {
        missing.extend(
            ["BLUETOOTH_SCAN", "BLUETOOTH_CONNECT"]
                .into_iter()
                .filter(|p| !android.has_permission(p))
                .map(|p| (p, "needed on Android 12+ to find and talk to the station")),
        );
    }
    if android.min_api() <= 30 {
        missing.extend(
            ["BLUETOOTH", "BLUETOOTH_ADMIN", "ACCESS_FINE_LOCATION"]
                .into_iter()
                .filter(|p| !android.has_permission(p))
                .map(|p| (p, "needed for BLE scanning on Android 11 and older")),
        );
    }

    for (permission, why) in missing {
        result.add_warning(ValidationError::new(
            "android.permissions",
            "MISSING_PERMISSION",
            format!("{} is not requested; {}", permission, why),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    const GOOD: &str = "\
[app]
title = Weather Station
package.name = meteostation
package.domain = org.meteo
version = 1.0
orientation = portrait
android.api = 33
android.minapi = 31
android.ndk = 25b
android.permissions = BLUETOOTH_SCAN,BLUETOOTH_CONNECT
android.accept_sdk_license = True

[buildozer]
log_level = 2
warn_on_root = 1
";

    fn check(text: &str) -> ValidationResult {
        validate(&parse_str(text).unwrap())
    }

    fn codes(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.code.as_str()).collect()
    }

    #[test]
    fn test_good_manifest_is_clean() {
        let result = check(GOOD);
        assert!(result.is_valid(), "{:?}", result.errors());
        assert!(result.warnings().is_empty(), "{:?}", result.warnings());
    }

    #[test]
    fn test_missing_identity() {
        let result = check("[app]\nversion = 1\n");
        let fields: Vec<&str> = result.errors().iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"title"));
        assert!(fields.contains(&"package.name"));
        assert!(fields.contains(&"package.domain"));
    }

    #[test]
    fn test_bad_identifiers() {
        let result = check(&GOOD.replace("meteostation", "meteo station").replace("org.meteo", "org..meteo"));
        assert_eq!(codes(result.errors()), vec!["PATTERN", "PATTERN"]);
    }

    #[test]
    fn test_duplicate_key_is_error() {
        let result = check(&GOOD.replace("android.api = 33", "android.api = 33\nandroid.api = 34"));
        assert_eq!(codes(result.errors()), vec!["DUPLICATE_KEY"]);
        assert_eq!(result.errors()[0].field, "android.api");
    }

    #[test]
    fn test_malformed_scalars() {
        let result = check(
            &GOOD
                .replace("android.api = 33", "android.api = 33a")
                .replace("warn_on_root = 1", "warn_on_root = sometimes"),
        );
        let found = codes(result.errors());
        assert!(found.contains(&"INVALID_INT"));
        assert!(found.contains(&"INVALID_BOOL"));
    }

    #[test]
    fn test_version_sources() {
        let no_version = GOOD.replace("version = 1.0\n", "");
        assert_eq!(check(&no_version).errors()[0].field, "version");

        let from_file = no_version.replace(
            "[buildozer]",
            "version.regex = __version__ = '(.*)'\nversion.filename = %(source.dir)s/main.py\n\n[buildozer]",
        );
        assert!(check(&from_file).is_valid());
    }

    #[test]
    fn test_minapi_above_api() {
        let result = check(&GOOD.replace("android.minapi = 31", "android.minapi = 34"));
        assert_eq!(result.errors()[0].field, "android.minapi");
    }

    #[test]
    fn test_ndk_orientation_and_log_level() {
        let result = check(
            &GOOD
                .replace("25b", "r25")
                .replace("portrait", "diagonal")
                .replace("log_level = 2", "log_level = 5"),
        );
        assert_eq!(codes(result.errors()), vec!["PATTERN", "ONE_OF", "RANGE"]);
    }

    #[test]
    fn test_unknown_keys_warn() {
        let result = check(&GOOD.replace("android.ndk = 25b", "android.ndk = 25b\nandroid.permisions = X"));
        assert!(result.is_valid());
        assert_eq!(codes(result.warnings()), vec!["UNKNOWN_KEY"]);
        assert_eq!(result.warnings()[0].field, "android.permisions");
    }

    #[test]
    fn test_bluetooth_permissions_for_new_android() {
        let result = check(&GOOD.replace("BLUETOOTH_SCAN,", ""));
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
        assert!(result.warnings()[0].message.contains("BLUETOOTH_SCAN"));
    }

    #[test]
    fn test_legacy_permissions_when_supporting_old_android() {
        let result = check(&GOOD.replace("android.minapi = 31", "android.minapi = 21"));
        let messages: Vec<&str> = result.warnings().iter().map(|w| w.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().any(|m| m.starts_with("ACCESS_FINE_LOCATION")));
    }

    #[test]
    fn test_long_title_and_unaccepted_license_only_warn() {
        let result = check(
            &GOOD
                .replace("Weather Station", "Weather Station Companion For Android")
                .replace("android.accept_sdk_license = True\n", ""),
        );
        assert!(result.is_valid());
        let fields: Vec<&str> = result.warnings().iter().map(|w| w.field.as_str()).collect();
        assert!(fields.contains(&"title"));
        assert!(fields.contains(&"android.accept_sdk_license"));
    }
}
