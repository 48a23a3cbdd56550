use chrono::NaiveDate;
use std::path::Path;

/// Derives the catalog version marker from a listing file name.
///
/// The first calendar date in the stem wins (`2024-03-15` or `20240315`); names without a valid
/// date fall back to the whole stem.
pub fn source_identity_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    date_token(stem).unwrap_or_else(|| stem.to_string())
}

fn date_token(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    for start in 0..bytes.len() {
        if start > 0 && bytes[start - 1].is_ascii_digit() {
            continue;
        }
        if let Some(window) = stem.get(start..start + 10) {
            let bounded = !bytes.get(start + 10).is_some_and(u8::is_ascii_digit);
            if bounded && NaiveDate::parse_from_str(window, "%Y-%m-%d").is_ok() {
                return Some(window.to_string());
            }
        }
        if let Some(window) = stem.get(start..start + 8) {
            let bounded = !bytes.get(start + 8).is_some_and(u8::is_ascii_digit);
            if bounded
                && window.bytes().all(|b| b.is_ascii_digit())
                && NaiveDate::parse_from_str(window, "%Y%m%d").is_ok()
            {
                return Some(window.to_string());
            }
        }
    }
    None
}
