//! Centralized error types for mailcompose.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

/// Recipients refused by the server, keyed by address, with the SMTP reply
/// code and text.
pub type Rejections = BTreeMap<String, (u16, String)>;

/// All errors produced by the mailcompose library.
#[derive(Error, Debug)]
pub enum MailError {
    /// Text cannot be represented in the requested charset and the charset
    /// policy forbids falling back to UTF-8.
    #[error("Cannot encode {text:?} using charset '{charset}'")]
    Unencodable { charset: String, text: String },

    /// A bare address or mailbox contains non US-ASCII characters.
    #[error("Address is not US-ASCII: {0}")]
    NonAsciiAddress(String),

    /// The charset label is not known.
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),

    /// A `text/*` part was given without a charset.
    #[error("Text part '{0}' requires a charset")]
    MissingCharset(String),

    /// The MIME type could not be parsed.
    #[error("Invalid MIME type: {0}")]
    InvalidMimeType(String),

    /// The header name or value is not acceptable.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// An envelope address could not be parsed.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TLS parameters could not be set up.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The SMTP exchange failed and nobody received the message.
    #[error(transparent)]
    Smtp(#[from] SmtpFailure),
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Categorized SMTP failures.
///
/// The `Display` text is the human-readable report returned by
/// [`crate::transport::smtp::send_mail`].
#[derive(Error, Debug)]
pub enum SmtpFailure {
    /// The server could not be reached or the connection dropped.
    #[error("server {host}:{port} not responding: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    /// The server rejected the credentials.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Every recipient was refused.
    #[error("all recipients refused: {}", join_keys(.0))]
    RecipientsRefused(Rejections),

    /// The server refused the envelope sender.
    #[error("sender refused: {sender}")]
    SenderRefused {
        sender: String,
        code: Option<u16>,
        reason: String,
    },

    /// The server rejected the message data.
    #[error("SMTP protocol mismatch: {0}")]
    Data(String),

    /// The server did not reply properly to the greeting or EHLO.
    #[error("server didn't reply properly to the HELO greeting: {0}")]
    Greeting(String),

    /// Any other protocol level error.
    #[error("SMTP error: {0}")]
    Protocol(String),
}

fn join_keys(rejections: &Rejections) -> String {
    rejections
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipients_refused_lists_every_address() {
        let mut refused = Rejections::new();
        refused.insert("a@example.com".into(), (550, "no such user".into()));
        refused.insert("b@example.com".into(), (553, "relay denied".into()));
        let msg = SmtpFailure::RecipientsRefused(refused).to_string();
        assert_eq!(
            msg,
            "all recipients refused: a@example.com, b@example.com"
        );
    }

    #[test]
    fn test_smtp_failure_converts_into_mail_error() {
        let err: MailError = SmtpFailure::Authentication("535 bad credentials".into()).into();
        assert!(matches!(err, MailError::Smtp(SmtpFailure::Authentication(_))));
        assert_eq!(err.to_string(), "authentication error: 535 bad credentials");
    }

    #[test]
    fn test_connection_message_names_server() {
        let err = SmtpFailure::Connection {
            host: "mail.example.com".into(),
            port: 2525,
            reason: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "server mail.example.com:2525 not responding: connection refused"
        );
    }
}
