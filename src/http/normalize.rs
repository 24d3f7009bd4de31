//! Unicode normalization of client input.
//!
//! Printable ASCII passes through untouched and unallocated. Anything else
//! has XML-illegal characters replaced with U+FFFD and is put in NFC.

use std::borrow::Cow;

use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// Normalize one string.
pub fn normalize(input: &str) -> Cow<'_, str> {
    if input.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Cow::Borrowed(input);
    }

    let needs_replace = input.chars().any(is_illegal);
    let cleaned: Cow<'_, str> = if needs_replace {
        Cow::Owned(
            input
                .chars()
                .map(|c| if is_illegal(c) { '\u{FFFD}' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(input)
    };

    if is_nfc_quick(cleaned.chars()) == IsNormalized::Yes {
        return cleaned;
    }
    Cow::Owned(cleaned.nfc().collect())
}

/// Normalize every element of a list.
pub fn normalize_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| normalize(v).into_owned()).collect()
}

fn is_illegal(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}
