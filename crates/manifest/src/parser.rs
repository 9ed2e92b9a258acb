//! Line-level parsing of the packaging manifest.
//!
//! The format is the INI dialect the packager reads: `[section]` headers,
//! `key = value` (or `key: value`) entries, full-line `#`/`;` comments and
//! indented continuation lines. Keys are case-sensitive.

use crate::error::{ManifestError, Result};
use serde::Serialize;

/// One `key = value` line (plus continuations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
    /// 1-based line of the key
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub entries: Vec<Entry>,
}

/// A key defined more than once in the same section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duplicate {
    pub section: String,
    pub key: String,
    pub first_line: usize,
    pub line: usize,
}

/// Manifest as written, before any typing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawManifest {
    sections: Vec<Section>,
    duplicates: Vec<Duplicate>,
}

impl RawManifest {
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn duplicates(&self) -> &[Duplicate] {
        &self.duplicates
    }

    /// Effective value of `key`; the last definition wins.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Effective entries of a section in first-definition order.
    pub fn effective(&self, section: &str) -> Vec<(&str, &str)> {
        let Some(section) = self.section(section) else {
            return Vec::new();
        };
        let mut out: Vec<(&str, &str)> = Vec::new();
        for entry in &section.entries {
            match out.iter_mut().find(|(key, _)| *key == entry.key) {
                Some(slot) => slot.1 = entry.value.as_str(),
                None => out.push((entry.key.as_str(), entry.value.as_str())),
            }
        }
        out
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    fn insert(&mut self, section: &str, entry: Entry) {
        let target = self.section_mut(section);
        let first = target.entries.iter().find(|e| e.key == entry.key).map(|e| e.line);
        let key = entry.key.clone();
        let line = entry.line;
        target.entries.push(entry);

        if let Some(first_line) = first {
            tracing::debug!(section, key = %key, line, "duplicate manifest key");
            self.duplicates.push(Duplicate {
                section: section.to_string(),
                key,
                first_line,
                line,
            });
        }
    }
}

/// Parse manifest text.
pub fn parse_str(text: &str) -> Result<RawManifest> {
    let mut manifest = RawManifest::default();
    let mut section: Option<String> = None;
    let mut pending: Option<Entry> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches('\r');
        let trimmed = line.trim();

        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if trimmed.is_empty() {
            flush(&mut manifest, section.as_deref(), pending.take());
            continue;
        }

        let indented = line.starts_with([' ', '\t']);
        if indented {
            if let Some(entry) = pending.as_mut() {
                if !entry.value.is_empty() {
                    entry.value.push('\n');
                }
                entry.value.push_str(trimmed);
                continue;
            }
        }

        flush(&mut manifest, section.as_deref(), pending.take());

        if let Some(name) = trimmed.strip_prefix('[') {
            let name = name
                .strip_suffix(']')
                .ok_or_else(|| ManifestError::syntax(line_no, "unterminated section header"))?
                .trim();
            if name.is_empty() {
                return Err(ManifestError::syntax(line_no, "empty section name"));
            }
            manifest.section_mut(name);
            section = Some(name.to_string());
            continue;
        }

        let Some(split) = trimmed.find(['=', ':']) else {
            return Err(ManifestError::syntax(
                line_no,
                format!("expected `key = value`, found `{}`", trimmed),
            ));
        };
        let key = trimmed[..split].trim();
        if key.is_empty() {
            return Err(ManifestError::syntax(line_no, "missing key before `=`"));
        }
        if section.is_none() {
            return Err(ManifestError::syntax(
                line_no,
                format!("`{}` appears before any [section]", key),
            ));
        }

        pending = Some(Entry {
            key: key.to_string(),
            value: trimmed[split + 1..].trim().to_string(),
            line: line_no,
        });
    }

    flush(&mut manifest, section.as_deref(), pending.take());
    Ok(manifest)
}

fn flush(manifest: &mut RawManifest, section: Option<&str>, entry: Option<Entry>) {
    if let (Some(section), Some(entry)) = (section, entry) {
        manifest.insert(section, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_and_entries() {
        let raw = parse_str(
            "[app]\n# comment\ntitle = Weather Station\npackage.name: meteo\n\n[buildozer]\nlog_level = 2\n",
        )
        .unwrap();

        assert_eq!(raw.sections().len(), 2);
        assert_eq!(raw.get("app", "title"), Some("Weather Station"));
        assert_eq!(raw.get("app", "package.name"), Some("meteo"));
        assert_eq!(raw.get("buildozer", "log_level"), Some("2"));
        assert_eq!(raw.get("app", "log_level"), None);
    }

    #[test]
    fn test_commented_keys_are_ignored() {
        let raw = parse_str("[app]\n#android.presplash_color = #FFFFFF\n; icon.filename = x.png\n").unwrap();
        assert!(raw.effective("app").is_empty());
    }

    #[test]
    fn test_continuation_lines() {
        let raw = parse_str("[app]\nrequirements = python3,\n    kivy==2.2.1,\n\tpyjnius\ntitle = x\n").unwrap();
        assert_eq!(
            raw.get("app", "requirements"),
            Some("python3,\nkivy==2.2.1,\npyjnius")
        );
        assert_eq!(raw.get("app", "title"), Some("x"));
    }

    #[test]
    fn test_value_may_contain_delimiters() {
        let raw = parse_str("[app]\nversion.regex = __version__ = ['\"](.*)['\"]\n").unwrap();
        assert_eq!(raw.get("app", "version.regex"), Some("__version__ = ['\"](.*)['\"]"));
    }

    #[test]
    fn test_duplicates_recorded_last_wins() {
        let raw = parse_str("[app]\nandroid.api = 30\ntitle = t\nandroid.api = 33\n").unwrap();

        assert_eq!(raw.get("app", "android.api"), Some("33"));
        assert_eq!(
            raw.duplicates(),
            &[Duplicate {
                section: "app".into(),
                key: "android.api".into(),
                first_line: 2,
                line: 4,
            }]
        );
        assert_eq!(raw.effective("app"), vec![("android.api", "33"), ("title", "t")]);
    }

    #[test]
    fn test_repeated_section_header_merges() {
        let raw = parse_str("[app]\ntitle = a\n[buildozer]\nlog_level = 1\n[app]\ntitle = b\n").unwrap();
        assert_eq!(raw.sections().len(), 2);
        assert_eq!(raw.duplicates().len(), 1);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let raw = parse_str("[app]\nTitle = A\ntitle = b\n").unwrap();
        assert!(raw.duplicates().is_empty());
        assert_eq!(raw.get("app", "Title"), Some("A"));
    }

    #[test]
    fn test_syntax_errors_carry_line() {
        let err = parse_str("[app]\ntitle = ok\nnot a pair\n").unwrap_err();
        assert!(matches!(err, ManifestError::Syntax { line: 3, .. }));

        let err = parse_str("title = orphan\n").unwrap_err();
        assert!(matches!(err, ManifestError::Syntax { line: 1, .. }));

        let err = parse_str("[app\n").unwrap_err();
        assert!(matches!(err, ManifestError::Syntax { line: 1, .. }));
    }
}
