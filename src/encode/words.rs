//! RFC 2047 encoded-word generation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::charset::{encode_text, encode_with_policy, is_utf8, CharsetPolicy};
use crate::error::Result;

/// Maximum length of a single encoded word (RFC 2047 §2).
const MAX_WORD_LEN: usize = 75;

/// Separator between consecutive encoded words: a folded header line.
const WORD_SEPARATOR: &str = "\r\n ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordEncoding {
    Q,
    B,
}

impl WordEncoding {
    fn letter(self) -> char {
        match self {
            Self::Q => 'q',
            Self::B => 'b',
        }
    }

    fn encoded_len(self, bytes: &[u8]) -> usize {
        match self {
            Self::Q => bytes.iter().map(|&b| q_byte_len(b)).sum(),
            Self::B => bytes.len().div_ceil(3) * 4,
        }
    }

    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Q => q_encode(bytes),
            Self::B => BASE64.encode(bytes),
        }
    }
}

/// Encode `text` as one or more encoded words in `charset`.
///
/// Falls back to UTF-8 (or fails) according to `policy` when the text is
/// not representable in `charset`.
pub fn encode_words(text: &str, charset: &str, policy: CharsetPolicy) -> Result<String> {
    let (all_bytes, charset) = encode_with_policy(text, charset, policy)?;
    let charset = charset.trim().to_ascii_lowercase();
    let method = choose_encoding(&charset, &all_bytes);

    let prefix = format!("=?{charset}?{}?", method.letter());
    let budget = MAX_WORD_LEN.saturating_sub(prefix.len() + 2).max(4);

    let mut words = Vec::new();
    let mut chunk: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        let ch_bytes = encode_text(ch.encode_utf8(&mut buf), &charset)?;
        let mut candidate = chunk.clone();
        candidate.extend_from_slice(&ch_bytes);
        if !chunk.is_empty() && method.encoded_len(&candidate) > budget {
            words.push(format!("{prefix}{}?=", method.encode(&chunk)));
            chunk = ch_bytes;
        } else {
            chunk = candidate;
        }
    }
    if !chunk.is_empty() || words.is_empty() {
        words.push(format!("{prefix}{}?=", method.encode(&chunk)));
    }

    Ok(words.join(WORD_SEPARATOR))
}

/// Encode unstructured header text (Subject, custom fields).
///
/// Printable ASCII that cannot be mistaken for an encoded word is written
/// verbatim; everything else goes through [`encode_words`].
pub fn encode_header_text(text: &str, charset: &str, policy: CharsetPolicy) -> Result<String> {
    if is_plain_header_text(text) {
        return Ok(text.to_string());
    }
    encode_words(text, charset, policy)
}

/// `true` if `text` can be used in a header without any encoding.
pub fn is_plain_header_text(text: &str) -> bool {
    text.chars().all(|c| c == ' ' || c == '\t' || c.is_ascii_graphic()) && !text.contains("=?")
}

fn choose_encoding(charset: &str, bytes: &[u8]) -> WordEncoding {
    if is_utf8(charset) {
        let q = WordEncoding::Q.encoded_len(bytes);
        let b = WordEncoding::B.encoded_len(bytes);
        return if q <= b { WordEncoding::Q } else { WordEncoding::B };
    }
    if ["iso-8859-", "iso8859-", "latin", "windows-125", "cp125", "koi8"]
        .iter()
        .any(|p| charset.starts_with(p))
    {
        WordEncoding::Q
    } else {
        WordEncoding::B
    }
}

fn q_is_literal(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'!' | b'*' | b'+' | b'-' | b'/')
}

fn q_byte_len(b: u8) -> usize {
    if q_is_literal(b) || b == b' ' {
        1
    } else {
        3
    }
}

/// Q-encoding (RFC 2047 §4.2): space → `_`, unsafe bytes → `=XX`.
fn q_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        if q_is_literal(b) {
            out.push(b as char);
        } else if b == b' ' {
            out.push('_');
        } else {
            out.push_str(&format!("={b:02X}"));
        }
    }
    out
}
