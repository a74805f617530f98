// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client-supplied filename sanitizing

/// Device names that cannot be used as file names on Windows
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "LPT1", "LPT2", "LPT3",
];

/// Reduce a client-supplied filename to a safe, flat file name
///
/// Non-ASCII characters are dropped, path separators become spaces, runs of
/// whitespace are joined with `_`, anything outside `[A-Za-z0-9_.-]` is
/// removed and leading/trailing `.`/`_` are stripped. The result never
/// contains a path separator and may be empty.
///
/// ```
/// use detection_node::utils::secure_filename;
///
/// assert_eq!(secure_filename("My cool photo.jpg"), "My_cool_photo.jpg");
/// assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
/// ```
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or_default().to_ascii_uppercase();
    if !trimmed.is_empty() && WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
        return format!("_{}", trimmed);
    }

    trimmed.to_string()
}
