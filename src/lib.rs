//! `mailcompose` — compose charset-correct MIME email messages and deliver
//! them over SMTP.
//!
//! The crate builds a (possibly nested) multipart body from text, HTML,
//! attachments and embedded files, stamps RFC 2047 encoded addressing
//! headers onto it, and hands the serialized message to an SMTP server.

pub mod compose;
pub mod config;
pub mod encode;
pub mod error;
pub mod model;
pub mod transport;

pub use compose::build::{build_mail, MailBody};
pub use compose::finalize::{complete_mail, ComposedMail, Envelope, FinalizeOptions, HeaderText};
pub use compose::format::format_addresses;
pub use compose::{compose_mail, MailContent};
pub use encode::charset::CharsetPolicy;
pub use error::{MailError, Rejections, Result, SmtpFailure};
pub use model::address::Address;
pub use model::attachment::{Attachment, EmbeddedFile, PartSource};
pub use transport::{send_mail, send_raw, SendStatus, SmtpMode, SmtpSettings};
