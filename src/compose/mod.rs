//! Message composition: body building, header formatting and finalization.

pub mod build;
pub mod finalize;
pub mod format;

use crate::error::Result;
use crate::model::address::Address;
use crate::model::attachment::{Attachment, EmbeddedFile, PartSource};

use build::build_mail;
use finalize::{complete_mail, ComposedMail, FinalizeOptions};

/// Body inputs of [`compose_mail`].
#[derive(Debug, Clone, Default)]
pub struct MailContent {
    /// Plain text content and its charset.
    pub text: Option<(String, String)>,
    /// HTML content and its charset.
    pub html: Option<(String, String)>,
    pub attachments: Vec<PartSource<Attachment>>,
    pub embeddeds: Vec<PartSource<EmbeddedFile>>,
    /// Force quoted-printable on the text and HTML parts.
    pub use_quoted_printable: bool,
}

/// Build a body from `content` and finalize it in one call.
pub fn compose_mail(
    sender: &Address,
    recipients: &[Address],
    subject: &str,
    default_charset: &str,
    content: &MailContent,
    options: &FinalizeOptions,
) -> Result<ComposedMail> {
    let body = build_mail(
        content.text.as_ref().map(|(t, c)| (t.as_str(), c.as_str())),
        content.html.as_ref().map(|(t, c)| (t.as_str(), c.as_str())),
        &content.attachments,
        &content.embeddeds,
        content.use_quoted_printable,
    )?;
    complete_mail(&body, sender, recipients, subject, default_charset, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_mail_text_and_attachment() {
        let content = MailContent {
            text: Some(("Hello world".into(), "us-ascii".into())),
            attachments: vec![Attachment::new(b"data".to_vec()).with_filename("d.bin").into()],
            ..Default::default()
        };
        let mail = compose_mail(
            &"me@foo.com".into(),
            &["him@bar.com".into()],
            "subject",
            "utf-8",
            &content,
            &FinalizeOptions::default(),
        )
        .unwrap();
        let raw = String::from_utf8(mail.payload).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("application/octet-stream"));
        assert!(raw.contains("Hello world"));
        assert_eq!(mail.envelope.rcpt_to, vec!["him@bar.com"]);
    }

    #[test]
    fn test_compose_mail_propagates_encoding_error() {
        let content = MailContent {
            html: Some(("<p>caf\u{e9}</p>".into(), "us-ascii".into())),
            ..Default::default()
        };
        let res = compose_mail(
            &"me@foo.com".into(),
            &[],
            "s",
            "utf-8",
            &content,
            &FinalizeOptions::default(),
        );
        assert!(res.is_err());
    }
}
