//! Key-level comparison of two manifest variants.

use crate::parser::RawManifest;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One key that differs between the variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub section: String,
    pub key: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let old = self.old.as_deref().unwrap_or_default();
        let new = self.new.as_deref().unwrap_or_default();
        match self.kind {
            ChangeKind::Added => write!(f, "+ [{}] {} = {}", self.section, self.key, new),
            ChangeKind::Removed => write!(f, "- [{}] {} = {}", self.section, self.key, old),
            ChangeKind::Changed => {
                write!(f, "~ [{}] {}: {} -> {}", self.section, self.key, old, new)
            }
        }
    }
}

fn flatten(raw: &RawManifest) -> BTreeMap<(&str, &str), &str> {
    raw.sections()
        .iter()
        .flat_map(|section| {
            raw.effective(&section.name)
                .into_iter()
                .map(move |(key, value)| ((section.name.as_str(), key), value))
        })
        .collect()
}

/// Differences from `a` to `b`, ordered by section then key.
///
/// Effective values are compared, so a duplicate key in either file counts
/// with its last definition.
pub fn diff(a: &RawManifest, b: &RawManifest) -> Vec<Change> {
    let left = flatten(a);
    let right = flatten(b);

    let mut keys: Vec<&(&str, &str)> = left.keys().chain(right.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|k| {
            let (old, new) = (left.get(k).copied(), right.get(k).copied());
            let kind = match (old, new) {
                (Some(o), Some(n)) if o == n => return None,
                (Some(_), Some(_)) => ChangeKind::Changed,
                (Some(_), None) => ChangeKind::Removed,
                (None, Some(_)) => ChangeKind::Added,
                (None, None) => return None,
            };
            Some(Change {
                section: k.0.to_string(),
                key: k.1.to_string(),
                kind,
                old: old.map(String::from),
                new: new.map(String::from),
            })
        })
        .collect()
}
