//! Message delivery.

pub mod smtp;

pub use smtp::{send_mail, send_raw, SendStatus, SmtpMode, SmtpSettings};
