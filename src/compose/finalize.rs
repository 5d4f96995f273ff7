//! Stamp addressing headers onto a built body and serialize it.

use chrono::{DateTime, Local, Utc};
use lettre::message::header::{HeaderName, HeaderValue, Headers, MIME_VERSION_1_0};

use super::build::MailBody;
use super::format::format_addresses;
use crate::encode::charset::CharsetPolicy;
use crate::encode::words::encode_header_text;
use crate::error::{MailError, Result};
use crate::model::address::Address;

/// Value of an extra header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderText {
    /// Unicode text, encoded with the message's default charset when needed.
    Text(String),
    /// A value that is already a valid encoded header value; written as-is.
    Encoded(String),
}

impl From<&str> for HeaderText {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for HeaderText {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Optional inputs of [`complete_mail`].
#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
    /// Carbon-copy recipients, written to the `Cc` header.
    pub cc: Vec<Address>,
    /// Blind carbon-copy recipients: envelope only, never a header.
    pub bcc: Vec<Address>,
    /// Generate a `Message-Id` from this string. A seed containing `@`
    /// supplies the id's domain; otherwise the local host name is used.
    pub message_id_seed: Option<String>,
    /// Timestamp for the `Date` header; now when `None`.
    pub date: Option<DateTime<Utc>>,
    /// Extra `(field, value)` headers, in order.
    pub headers: Vec<(String, HeaderText)>,
    /// Behavior for display names the default charset cannot represent.
    pub charset_policy: CharsetPolicy,
}

/// SMTP envelope of a composed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Mailbox given to `MAIL FROM`.
    pub mail_from: String,
    /// Mailboxes given to `RCPT TO`: To, then Cc, then Bcc.
    pub rcpt_to: Vec<String>,
}

/// A message ready to be handed to the transport.
#[derive(Debug, Clone)]
pub struct ComposedMail {
    /// The complete message in wire format (CRLF line endings).
    pub payload: Vec<u8>,
    pub envelope: Envelope,
    /// The generated `Message-Id`, when a seed was given.
    pub message_id: Option<String>,
}

/// Fill in From, To, Cc, Subject, Date and Message-Id, then serialize.
///
/// `default_charset` encodes non-ASCII display names, the subject and plain
/// extra header values.
pub fn complete_mail(
    body: &MailBody,
    sender: &Address,
    recipients: &[Address],
    subject: &str,
    default_charset: &str,
    options: &FinalizeOptions,
) -> Result<ComposedMail> {
    let policy = options.charset_policy;

    let envelope = Envelope {
        mail_from: sender.mailbox().to_string(),
        rcpt_to: recipients
            .iter()
            .chain(&options.cc)
            .chain(&options.bcc)
            .map(|a| a.mailbox().to_string())
            .collect(),
    };

    let mut headers = Headers::new();
    insert(
        &mut headers,
        "From",
        format_addresses(std::slice::from_ref(sender), default_charset, policy)?,
    )?;
    if !recipients.is_empty() {
        insert(&mut headers, "To", format_addresses(recipients, default_charset, policy)?)?;
    }
    if !options.cc.is_empty() {
        insert(&mut headers, "Cc", format_addresses(&options.cc, default_charset, policy)?)?;
    }
    insert(
        &mut headers,
        "Subject",
        encode_header_text(subject, default_charset, policy)?,
    )?;

    let date = options.date.unwrap_or_else(Utc::now);
    insert(&mut headers, "Date", date.with_timezone(&Local).to_rfc2822())?;

    let message_id = options.message_id_seed.as_deref().map(make_message_id);
    if let Some(id) = &message_id {
        insert(&mut headers, "Message-Id", id.clone())?;
    }

    for (field, value) in &options.headers {
        let encoded = match value {
            HeaderText::Encoded(raw) => {
                check_folding(field, raw)?;
                raw.clone()
            }
            HeaderText::Text(text) => encode_header_text(text, default_charset, policy)?,
        };
        insert(&mut headers, field, encoded)?;
    }
    headers.set(MIME_VERSION_1_0);

    let mut payload = headers.to_string().into_bytes();
    payload.extend_from_slice(&body.formatted());

    tracing::debug!(
        mail_from = %envelope.mail_from,
        recipients = envelope.rcpt_to.len(),
        size = payload.len(),
        "Composed message"
    );

    Ok(ComposedMail {
        payload,
        envelope,
        message_id,
    })
}

/// Preferred length of a header line, excluding CRLF.
const MAX_LINE_LEN: usize = 78;

/// Append a header whose value is already encoded, folding long lines.
fn insert(headers: &mut Headers, field: &str, encoded: String) -> Result<()> {
    let name = HeaderName::new_from_ascii(field.to_string())
        .map_err(|e| MailError::InvalidHeader(format!("{field}: {e}")))?;
    let folded = fold_header(field, &encoded);
    headers.insert_raw(HeaderValue::dangerous_new_pre_encoded(name, encoded, folded));
    Ok(())
}

/// Fold `value` at spaces so that lines stay within [`MAX_LINE_LEN`]
/// where possible. Existing folds are kept; a single word longer than a
/// line is never split.
fn fold_header(field: &str, value: &str) -> String {
    let mut out = String::with_capacity(value.len() + value.len() / MAX_LINE_LEN * 3);
    // "Field: " precedes the first line.
    let mut line_len = field.len() + 2;
    let mut line_has_word = false;

    for (i, segment) in value.split("\r\n").enumerate() {
        if i > 0 {
            out.push_str("\r\n");
            line_len = 0;
            line_has_word = false;
        }
        for (j, word) in segment.split(' ').enumerate() {
            if j > 0 {
                if line_has_word && !word.is_empty() && line_len + 1 + word.len() > MAX_LINE_LEN {
                    out.push_str("\r\n");
                    line_len = 0;
                    line_has_word = false;
                }
                out.push(' ');
                line_len += 1;
            }
            out.push_str(word);
            line_len += word.len();
            line_has_word |= !word.is_empty();
        }
    }
    out
}

/// Reject line breaks that are not followed by folding whitespace.
fn check_folding(field: &str, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let ok = match b {
            b'\r' => bytes.get(i + 1) == Some(&b'\n'),
            b'\n' => i > 0 && bytes[i - 1] == b'\r' && matches!(bytes.get(i + 1), Some(b' ' | b'\t')),
            _ => true,
        };
        if !ok {
            return Err(MailError::InvalidHeader(format!(
                "{field}: line break without folding whitespace"
            )));
        }
    }
    Ok(())
}

/// Generate a unique message id from `seed`.
///
/// `<timestamp.pid.random.seed@host>`; when the seed already contains `@`
/// the host part is left out so the seed's domain is used.
pub fn make_message_id(seed: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let pid = std::process::id();
    let random = uuid::Uuid::new_v4().simple();
    if seed.contains('@') {
        format!("<{timestamp}.{pid}.{random}.{seed}>")
    } else {
        format!("<{timestamp}.{pid}.{random}.{seed}@{}>", local_hostname())
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
