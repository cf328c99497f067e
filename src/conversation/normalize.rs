//! Text canonicalization applied to everything entering the log
//!
//! Curly quotation marks are folded to their ASCII forms and the result is
//! composed to Unicode NFC, so what the user typed, what the model sees and
//! what gets rendered all agree byte for byte.

use unicode_normalization::{is_nfc, UnicodeNormalization};

/// Replace curly quotes with straight ones, then compose to NFC.
pub fn normalize_text(text: &str) -> String {
    let straightened: String = text
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();

    if is_nfc(&straightened) {
        straightened
    } else {
        straightened.nfc().collect()
    }
}
