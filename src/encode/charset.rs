//! Charset handling for header and body text.
//!
//! Text is encoded with `encoding_rs`. US-ASCII is handled here because
//! `encoding_rs` maps the `us-ascii` label to windows-1252.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::{MailError, Result};

/// What to do when text cannot be represented in the requested charset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CharsetPolicy {
    /// Silently use UTF-8 instead.
    #[default]
    Utf8Fallback,
    /// Return [`MailError::Unencodable`].
    Strict,
}

impl std::str::FromStr for CharsetPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8-fallback" | "fallback" => Ok(Self::Utf8Fallback),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown charset policy '{other}' (expected utf8-fallback or strict)")),
        }
    }
}

/// `true` for the labels of US-ASCII.
pub fn is_us_ascii(charset: &str) -> bool {
    matches!(
        charset.trim().to_ascii_lowercase().as_str(),
        "us-ascii" | "ascii" | "us_ascii" | "ansi_x3.4-1968" | "iso646-us"
    )
}

/// `true` for the labels of UTF-8.
pub fn is_utf8(charset: &str) -> bool {
    matches!(
        charset.trim().to_ascii_lowercase().as_str(),
        "utf-8" | "utf8" | "unicode-1-1-utf-8"
    )
}

/// Encode `text` into `charset`, failing if any character is not
/// representable.
pub fn encode_text(text: &str, charset: &str) -> Result<Vec<u8>> {
    if is_us_ascii(charset) {
        if text.is_ascii() {
            return Ok(text.as_bytes().to_vec());
        }
        return Err(unencodable(text, charset));
    }
    if is_utf8(charset) {
        return Ok(text.as_bytes().to_vec());
    }

    let encoding = Encoding::for_label(charset.trim().as_bytes())
        .ok_or_else(|| MailError::UnknownCharset(charset.to_string()))?;
    let (bytes, used, had_errors) = encoding.encode(text);
    // UTF-16 and "replacement" labels have no encoder; encoding_rs switches to UTF-8.
    if had_errors || used != encoding {
        return Err(unencodable(text, charset));
    }
    Ok(bytes.into_owned())
}

/// Encode `text` into `charset`, applying `policy` when that is impossible.
///
/// Returns the bytes and the charset actually used.
pub fn encode_with_policy(
    text: &str,
    charset: &str,
    policy: CharsetPolicy,
) -> Result<(Vec<u8>, String)> {
    match encode_text(text, charset) {
        Ok(bytes) => Ok((bytes, charset.to_string())),
        Err(MailError::Unencodable { .. }) if policy == CharsetPolicy::Utf8Fallback => {
            tracing::debug!(charset, "Text not representable, falling back to utf-8");
            Ok((text.as_bytes().to_vec(), "utf-8".to_string()))
        }
        Err(e) => Err(e),
    }
}

fn unencodable(text: &str, charset: &str) -> MailError {
    MailError::Unencodable {
        charset: charset.to_string(),
        text: text.to_string(),
    }
}
