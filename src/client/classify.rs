/// Share of non-printable bytes above which content is treated as binary.
pub const BINARY_THRESHOLD: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Text,
    Binary,
    Empty,
}

/// Control bytes other than tab, LF and CR, plus DEL. Bytes >= 0x80 count as printable so UTF-8
/// text in any script passes.
fn is_non_printable(byte: u8) -> bool {
    match byte {
        b'\t' | b'\n' | b'\r' => false,
        0x00..=0x1f | 0x7f => true,
        _ => false,
    }
}

pub fn non_printable_ratio(content: &[u8]) -> f64 {
    if content.is_empty() {
        return 0.0;
    }
    let count = content.iter().filter(|b| is_non_printable(**b)).count();
    count as f64 / content.len() as f64
}

pub fn classify_content(content: &[u8]) -> ContentClass {
    if content.is_empty() {
        return ContentClass::Empty;
    }
    if non_printable_ratio(content) > BINARY_THRESHOLD {
        ContentClass::Binary
    } else {
        ContentClass::Text
    }
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
