//! Transcript canonicalization applied before alignment.
//!
//! The aligner must see the same alphabet the segment word matcher expects,
//! so typographic apostrophes become ASCII and a fixed punctuation set is
//! blanked out. Every replaced character becomes exactly one space, which
//! keeps the character count stable.

/// Mojibake produced when a UTF-8 right single quote is decoded as cp1252.
const MOJIBAKE_APOSTROPHE: &str = "\u{e2}\u{20ac}\u{2122}";

/// Canonicalize transcript text. Total and pure.
pub fn normalize(text: &str) -> String {
    let text = text.replace(MOJIBAKE_APOSTROPHE, "'");
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{02bc}' => '\'',
            ',' | '.' | '-' | '?' | '"' | '\u{201c}' | '\u{201d}' => ' ',
            other => other,
        })
        .collect()
}
