//! Address header formatting for From, To and Cc.

use crate::encode::charset::CharsetPolicy;
use crate::encode::words::encode_words;
use crate::error::{MailError, Result};
use crate::model::address::Address;

/// Characters that force a display name to be quoted (RFC 5322 specials).
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// Format a list of addresses into one encoded header value.
///
/// Entries are separated by a plain `,` and fragments are joined by single
/// spaces, so two entries render as `Foo <foo@example.com> , Bar <bar@example.com>`.
/// US-ASCII display names are written as `Name <mailbox>` (quoted when
/// needed); other names become encoded words in `charset`, with `policy`
/// deciding what happens if `charset` cannot represent them. Mailboxes are
/// never encoded.
pub fn format_addresses(addresses: &[Address], charset: &str, policy: CharsetPolicy) -> Result<String> {
    let mut fragments: Vec<String> = Vec::with_capacity(addresses.len() * 2);

    for (i, address) in addresses.iter().enumerate() {
        if i != 0 {
            fragments.push(",".to_string());
        }
        match address {
            Address::Bare(mailbox) => fragments.push(ascii_only(mailbox)?.to_string()),
            Address::Named { name, mailbox } => {
                let mailbox = ascii_only(mailbox)?;
                if name.is_ascii() {
                    fragments.push(format_ascii_address(name, mailbox));
                } else {
                    fragments.push(encode_words(name, charset, policy)?);
                    fragments.push(format!("<{mailbox}>"));
                }
            }
        }
    }

    Ok(fragments.join(" "))
}

/// `display-name <address>`, quoting the name when it contains specials.
fn format_ascii_address(name: &str, mailbox: &str) -> String {
    if name.is_empty() {
        return mailbox.to_string();
    }
    if name.contains(SPECIALS) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\" <{mailbox}>")
    } else {
        format!("{name} <{mailbox}>")
    }
}

fn ascii_only(mailbox: &str) -> Result<&str> {
    if mailbox.is_ascii() {
        Ok(mailbox)
    } else {
        Err(MailError::NonAsciiAddress(mailbox.to_string()))
    }
}
