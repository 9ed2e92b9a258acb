//! Scalar value syntax shared by every manifest key.

/// `1/0`, `true/false`, `yes/no`, `on/off`, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_int(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Comma or newline separated items, trimmed, empty items dropped.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split([',', '\n'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
