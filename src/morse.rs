//! The character/prosign lookup table (C9): a bidirectional map between
//! characters and their Morse representations, shared by the generator and
//! receiver modules.

use std::collections::HashMap;

use lazy_static::lazy_static;
use phf::phf_map;

use crate::error::{CwError, CwResult};

/// Compile-time encode table: character to dots/dashes string. Extends the
/// teacher's letter/digit/punctuation table with standard prosigns under the
/// usual punctuation stand-ins (`+` = AR, `&` = AS, `^` = KA, `(` = KN,
/// `>` = SK, `~` and `<` given distinct stand-in codes so every character
/// keeps a unique representation).
pub static MORSE: phf::Map<char, &'static str> = phf_map! {
    'A' => ".-",    'B' => "-...",  'C' => "-.-.",  'D' => "-..",
    'E' => ".",     'F' => "..-.",  'G' => "--.",   'H' => "....",
    'I' => "..",    'J' => ".---",  'K' => "-.-",   'L' => ".-..",
    'M' => "--",    'N' => "-.",    'O' => "---",   'P' => ".--.",
    'Q' => "--.-",  'R' => ".-.",   'S' => "...",   'T' => "-",
    'U' => "..-",   'V' => "...-", 'W' => ".--",   'X' => "-..-",
    'Y' => "-.--",  'Z' => "--..",
    '0' => "-----", '1' => ".----", '2' => "..---", '3' => "...--",
    '4' => "....-", '5' => ".....", '6' => "-....", '7' => "--...",
    '8' => "---..", '9' => "----.",
    '.' => ".-.-.-", ',' => "--..--", '?' => "..--..", '/' => "-..-.",
    '(' => "-.--.",  ')' => "-.--.-", '=' => "-...-",
    '@' => ".--.-.", ':' => "---...", '\'' => ".----.",
    '"' => ".-..-.", '!' => "-.-.--",
    '+' => ".-.-.", '&' => ".-...", '-' => "-....-",
    '^' => "-.-.-", '~' => "..--.", '>' => "...-.-", '<' => ".--.-",
};

lazy_static! {
    /// Decode table built once from [`MORSE`], mirroring the teacher's
    /// `COMMON_TIMINGS` pattern of precomputing a lookup behind `lazy_static`.
    static ref REVERSE: HashMap<&'static str, char> =
        MORSE.entries().map(|(&c, &r)| (r, c)).collect();
}

pub fn lookup_char(c: char) -> Option<&'static str> {
    MORSE.get(&c).copied()
}

pub fn lookup_representation(repr: &str) -> Option<char> {
    REVERSE.get(repr).copied()
}

/// Encodes text into a space-separated Morse string, using `/` to mark word
/// boundaries. Newlines and carriage returns are dropped; any other
/// character absent from [`MORSE`] is an error.
pub fn text_to_morse(text: &str) -> CwResult<String> {
    let mut out = String::new();
    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            continue;
        }
        let up = ch.to_ascii_uppercase();
        if up == ' ' {
            out.push_str("/ ");
            continue;
        }
        match lookup_char(up) {
            Some(repr) => {
                out.push_str(repr);
                out.push(' ');
            }
            None => return Err(CwError::Invalid(format!("no Morse mapping for '{ch}'"))),
        }
    }
    Ok(out.trim_end().to_string())
}

/// Decodes a space-separated Morse string (as produced by a receiver's
/// representation buffer) back into text. `/` decodes to a space.
pub fn morse_to_text(representation: &str) -> CwResult<String> {
    let mut out = String::new();
    for token in representation.split_whitespace() {
        if token == "/" {
            out.push(' ');
            continue;
        }
        match lookup_representation(token) {
            Some(c) => out.push(c),
            None => return Err(CwError::Invalid(format!("no character for '{token}'"))),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_sos() {
        assert_eq!(text_to_morse("SOS").unwrap(), "... --- ...");
    }

    #[test]
    fn encode_word_boundary() {
        assert_eq!(text_to_morse("HI THERE").unwrap(), ".... .. / - .... . .-. .");
    }

    #[test]
    fn round_trip_every_letter() {
        for (&c, &repr) in MORSE.entries() {
            assert_eq!(lookup_representation(repr), Some(c), "round trip for {c}");
        }
    }

    #[test]
    fn decode_sos() {
        assert_eq!(morse_to_text("... --- ...").unwrap(), "SOS");
    }

    #[test]
    fn decode_word_boundary() {
        assert_eq!(morse_to_text(".... .. / - .... . .-. .").unwrap(), "HI THERE");
    }

    #[test]
    fn invalid_character_rejected() {
        assert!(text_to_morse("caf\u{e9}").is_err());
    }

    #[test]
    fn invalid_representation_rejected() {
        assert!(morse_to_text("..--..--").is_err());
    }
}
