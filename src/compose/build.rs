//! Message body construction.
//!
//! The structure of the generated body is:
//!
//! ```text
//! multipart/mixed              (only if attachments are given)
//!  +-- multipart/related       (only if embedded files are given)
//!  |    +-- multipart/alternative   (only if text AND html are given)
//!  |    |    +-- text/plain
//!  |    |    +-- text/html
//!  |    +-- image/gif          (embedded files)
//!  +-- application/pdf         (attachments)
//! ```

use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Body, MultiPart, MultiPartBuilder, SinglePart, SinglePartBuilder};

use crate::encode::charset::encode_text;
use crate::error::{MailError, Result};
use crate::model::attachment::{Attachment, EmbeddedFile, PartSource};

/// Root node of a message body: a single leaf or a multipart container.
#[derive(Debug, Clone)]
pub enum MailBody {
    Single(SinglePart),
    Multi(MultiPart),
}

impl MailBody {
    /// Serialize the node: its own headers, a blank line, then the content.
    pub fn formatted(&self) -> Vec<u8> {
        match self {
            Self::Single(part) => part.formatted(),
            Self::Multi(part) => part.formatted(),
        }
    }

    fn into_container(self, builder: MultiPartBuilder) -> MultiPart {
        match self {
            Self::Single(part) => builder.singlepart(part),
            Self::Multi(part) => builder.multipart(part),
        }
    }
}

impl From<SinglePart> for MailBody {
    fn from(part: SinglePart) -> Self {
        Self::Single(part)
    }
}

impl From<MultiPart> for MailBody {
    fn from(part: MultiPart) -> Self {
        Self::Multi(part)
    }
}

/// Build the body of a message.
///
/// `text` and `html` are `(content, charset)` pairs. With neither, the body
/// is an empty `text/plain; charset=us-ascii` part. `use_quoted_printable`
/// forces quoted-printable on the text and HTML parts; attachments carry
/// their own flag. Attachments and embedded files keep the caller's order.
pub fn build_mail(
    text: Option<(&str, &str)>,
    html: Option<(&str, &str)>,
    attachments: &[PartSource<Attachment>],
    embeddeds: &[PartSource<EmbeddedFile>],
    use_quoted_printable: bool,
) -> Result<MailBody> {
    let plain_leaf = text
        .map(|(content, charset)| text_part(content, "plain", charset, use_quoted_printable))
        .transpose()?;
    let html_leaf = html
        .map(|(content, charset)| text_part(content, "html", charset, use_quoted_printable))
        .transpose()?;

    let mut main = match (plain_leaf, html_leaf) {
        (Some(text), Some(html)) => {
            MailBody::Multi(MultiPart::alternative().singlepart(text).singlepart(html))
        }
        (Some(part), None) | (None, Some(part)) => MailBody::Single(part),
        (None, None) => MailBody::Single(text_part("", "plain", "us-ascii", false)?),
    };

    if !embeddeds.is_empty() {
        let mut related = main.into_container(MultiPart::related());
        for entry in embeddeds {
            related = related.singlepart(entry.resolve(EmbeddedFile::to_mime_part)?);
        }
        main = MailBody::Multi(related);
    }

    if !attachments.is_empty() {
        let mut mixed = main.into_container(MultiPart::mixed());
        for entry in attachments {
            mixed = mixed.singlepart(entry.resolve(Attachment::to_mime_part)?);
        }
        main = MailBody::Multi(mixed);
    }

    tracing::debug!(
        text = text.is_some(),
        html = html.is_some(),
        attachments = attachments.len(),
        embedded = embeddeds.len(),
        "Built message body"
    );
    Ok(main)
}

/// Build a `text/<subtype>` leaf from Unicode content.
///
/// The content is encoded into `charset`; characters it cannot represent
/// are an error.
pub fn text_part(content: &str, subtype: &str, charset: &str, use_quoted_printable: bool) -> Result<SinglePart> {
    let bytes = encode_text(content, charset)?;
    text_leaf(bytes, subtype, charset, use_quoted_printable, |part| part)
}

/// Build a leaf from raw data.
///
/// `text/*` data must already be encoded in `charset` and gets the default
/// transfer encoding (or quoted-printable when requested); any other type is
/// base64 encoded. `decorate` adds part-specific headers.
pub(crate) fn leaf_part(
    data: &[u8],
    maintype: &str,
    subtype: &str,
    charset: Option<&str>,
    use_quoted_printable: bool,
    decorate: impl FnOnce(SinglePartBuilder) -> SinglePartBuilder,
) -> Result<SinglePart> {
    if maintype.eq_ignore_ascii_case("text") {
        let charset = charset.ok_or_else(|| MailError::MissingCharset(format!("text/{subtype}")))?;
        return text_leaf(data.to_vec(), subtype, charset, use_quoted_printable, decorate);
    }

    let content_type = parse_content_type(&format!("{maintype}/{subtype}"))?;
    let body = Body::new_with_encoding(data.to_vec(), ContentTransferEncoding::Base64)
        .unwrap_or_else(Body::new);
    Ok(decorate(SinglePart::builder().header(content_type)).body(body))
}

fn text_leaf(
    bytes: Vec<u8>,
    subtype: &str,
    charset: &str,
    use_quoted_printable: bool,
    decorate: impl FnOnce(SinglePartBuilder) -> SinglePartBuilder,
) -> Result<SinglePart> {
    let content_type = parse_content_type(&format!("text/{subtype}; charset={charset}"))?;
    let bytes = normalize_line_endings(&bytes);
    let body = if use_quoted_printable {
        Body::new_with_encoding(bytes, ContentTransferEncoding::QuotedPrintable).unwrap_or_else(Body::new)
    } else {
        Body::new(bytes)
    };
    Ok(decorate(SinglePart::builder().header(content_type)).body(body))
}

fn parse_content_type(value: &str) -> Result<ContentType> {
    ContentType::parse(value).map_err(|_| MailError::InvalidMimeType(value.to_string()))
}

/// Convert bare `\n` and `\r` line breaks to CRLF.
fn normalize_line_endings(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 16);
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                out.extend_from_slice(b"\r\n");
                i += 2;
                continue;
            }
            b'\r' | b'\n' => out.extend_from_slice(b"\r\n"),
            b => out.push(b),
        }
        i += 1;
    }
    out
}
