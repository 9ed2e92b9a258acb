//! Output formats for the typed manifest.

use crate::error::Result;
use crate::model::AppManifest;

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// `AndroidManifest.xml` fragment with the SDK levels and permissions.
pub fn render_android_manifest(manifest: &AppManifest) -> String {
    let android = &manifest.android;
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\"");
    if let Some(bundle) = manifest.identity.bundle_id() {
        xml.push_str(&format!("\n    package=\"{}\"", escape_attr(&bundle)));
    }
    if let Some(version) = &manifest.version.version {
        xml.push_str(&format!("\n    android:versionName=\"{}\"", escape_attr(version)));
    }
    xml.push_str(">\n");

    xml.push_str(&format!(
        "    <uses-sdk android:minSdkVersion=\"{}\" android:targetSdkVersion=\"{}\" />\n",
        android.min_api(),
        android.target_api()
    ));
    for permission in &android.permissions {
        xml.push_str(&format!(
            "    <uses-permission android:name=\"{}\" />\n",
            escape_attr(permission)
        ));
    }
    xml.push_str("</manifest>\n");
    xml
}

/// The typed manifest as TOML.
pub fn to_toml(manifest: &AppManifest) -> Result<String> {
    Ok(toml::to_string_pretty(manifest)?)
}
