//! Blocking SMTP delivery on top of lettre's low-level client.
//!
//! One connection per call: connect (implicit TLS or plain), optional
//! STARTTLS upgrade, optional AUTH, then `MAIL FROM`, one `RCPT TO` per
//! recipient, `DATA`. `QUIT` is attempted on every exit path once
//! `SmtpConnection::connect` has returned. A refused greeting or EHLO
//! happens inside `connect`, which drops the socket without `QUIT`.

use std::str::FromStr;
use std::time::Duration;

use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Data, Mail, Rcpt, Rset};
use lettre::transport::smtp::extension::{ClientId, Extension, MailBodyParameter, MailParameter};
use lettre::transport::smtp::Error as SmtpError;
use serde::{Deserialize, Serialize};

use crate::error::{MailError, Rejections, Result, SmtpFailure};

/// How the connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpMode {
    /// No encryption.
    #[default]
    Plain,
    /// TLS from the first byte (usually port 465).
    Tls,
    /// Plain connection upgraded with `STARTTLS`.
    StartTls,
}

impl FromStr for SmtpMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "normal" => Ok(Self::Plain),
            "tls" | "ssl" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            other => Err(format!("unknown SMTP mode '{other}' (expected plain, tls or starttls)")),
        }
    }
}

/// Connection parameters for one delivery.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub mode: SmtpMode,
    pub login: Option<String>,
    pub password: Option<String>,
    /// Socket timeout; `None` blocks indefinitely.
    pub timeout: Option<Duration>,
    /// Name sent with `EHLO`; the local host name when `None`.
    pub helo_name: Option<String>,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            mode: SmtpMode::Plain,
            login: None,
            password: None,
            timeout: None,
            helo_name: None,
        }
    }
}

impl SmtpSettings {
    /// Settings for `host:port` in plain mode.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    fn client_id(&self) -> ClientId {
        self.helo_name
            .clone()
            .map(ClientId::Domain)
            .unwrap_or_default()
    }

    fn credentials(&self) -> Option<Credentials> {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => Some(Credentials::new(login.clone(), password.clone())),
            _ => None,
        }
    }
}

/// Outcome of [`send_mail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SendStatus {
    /// At least one recipient accepted the message; the map lists the
    /// recipients that were refused (empty when all were accepted).
    Delivered { refused: Rejections },
    /// Nobody received the message.
    Failed { reason: String },
}

impl SendStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Deliver `payload` and report refused recipients.
///
/// Every SMTP failure is returned as [`MailError::Smtp`]. When all
/// recipients are refused the transaction is reset and
/// [`SmtpFailure::RecipientsRefused`] is returned.
pub fn send_raw(
    payload: &[u8],
    mail_from: &str,
    rcpt_to: &[String],
    settings: &SmtpSettings,
) -> Result<Rejections> {
    let sender = envelope_address(mail_from)?;
    let recipients = rcpt_to
        .iter()
        .map(|r| envelope_address(r).map(|addr| (r.clone(), addr)))
        .collect::<Result<Vec<_>>>()?;

    let tls = match settings.mode {
        SmtpMode::Plain => None,
        SmtpMode::Tls | SmtpMode::StartTls => Some(
            TlsParameters::new(settings.host.clone()).map_err(|e| MailError::Tls(e.to_string()))?,
        ),
    };
    let implicit_tls = if settings.mode == SmtpMode::Tls {
        tls.as_ref()
    } else {
        None
    };
    let hello = settings.client_id();

    tracing::debug!(
        host = %settings.host,
        port = settings.port,
        mode = ?settings.mode,
        "Connecting to SMTP server"
    );
    let mut conn = SmtpConnection::connect(
        (settings.host.as_str(), settings.port),
        settings.timeout,
        &hello,
        implicit_tls,
        None,
    )
    .map_err(|e| connect_failure(settings, &e))?;

    let session = Session {
        settings,
        hello: &hello,
        starttls: if settings.mode == SmtpMode::StartTls {
            tls.as_ref()
        } else {
            None
        },
    };
    let result = session.transact(&mut conn, payload, &sender, &recipients);

    if let Err(e) = conn.quit() {
        tracing::debug!(error = %e, "QUIT failed");
    }

    result.map_err(MailError::from)
}

/// Deliver `payload`, turning SMTP failures into [`SendStatus::Failed`].
///
/// Errors outside the SMTP exchange (an unparsable envelope address, TLS
/// setup) are still returned as `Err`.
pub fn send_mail(
    payload: &[u8],
    mail_from: &str,
    rcpt_to: &[String],
    settings: &SmtpSettings,
) -> Result<SendStatus> {
    match send_raw(payload, mail_from, rcpt_to, settings) {
        Ok(refused) => Ok(SendStatus::Delivered { refused }),
        Err(MailError::Smtp(failure)) => {
            tracing::warn!(error = %failure, "Delivery failed");
            Ok(SendStatus::Failed {
                reason: failure.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

struct Session<'a> {
    settings: &'a SmtpSettings,
    hello: &'a ClientId,
    starttls: Option<&'a TlsParameters>,
}

impl Session<'_> {
    fn transact(
        &self,
        conn: &mut SmtpConnection,
        payload: &[u8],
        sender: &lettre::Address,
        recipients: &[(String, lettre::Address)],
    ) -> std::result::Result<Rejections, SmtpFailure> {
        if let Some(tls) = self.starttls {
            tracing::debug!("Upgrading with STARTTLS");
            conn.starttls(tls, self.hello).map_err(|e| {
                if is_reply(&e) {
                    SmtpFailure::Greeting(e.to_string())
                } else {
                    self.lost(&e)
                }
            })?;
        }

        if let Some(credentials) = self.settings.credentials() {
            tracing::debug!(login = ?self.settings.login, "Authenticating");
            conn.auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
                .map_err(|e| {
                    if is_reply(&e) || e.is_client() {
                        SmtpFailure::Authentication(e.to_string())
                    } else {
                        self.lost(&e)
                    }
                })?;
        }

        let mut params = Vec::new();
        if !payload.is_ascii() && conn.server_info().supports_feature(Extension::EightBitMime) {
            params.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        }
        tracing::debug!(sender = %sender, "MAIL FROM");
        conn.command(Mail::new(Some(sender.clone()), params))
            .map_err(|e| {
                if is_reply(&e) {
                    SmtpFailure::SenderRefused {
                        sender: sender.to_string(),
                        code: reply_code(&e),
                        reason: e.to_string(),
                    }
                } else {
                    self.lost(&e)
                }
            })?;

        let mut refused = Rejections::new();
        let mut accepted = 0usize;
        for (raw, recipient) in recipients {
            match conn.command(Rcpt::new(recipient.clone(), vec![])) {
                Ok(_) => {
                    tracing::debug!(recipient = %raw, "RCPT TO accepted");
                    accepted += 1;
                }
                Err(e) if is_reply(&e) => {
                    tracing::warn!(recipient = %raw, error = %e, "Recipient refused");
                    refused.insert(raw.clone(), (reply_code(&e).unwrap_or(0), e.to_string()));
                }
                Err(e) => return Err(self.lost(&e)),
            }
        }

        // A duplicated address is one map entry but several RCPT commands.
        if accepted == 0 {
            if let Err(e) = conn.command(Rset) {
                tracing::debug!(error = %e, "RSET failed");
            }
            return Err(SmtpFailure::RecipientsRefused(refused));
        }

        conn.command(Data).map_err(|e| self.data_failure(&e))?;
        conn.message(payload).map_err(|e| self.data_failure(&e))?;

        tracing::info!(
            host = %self.settings.host,
            accepted,
            refused = refused.len(),
            "Message delivered"
        );
        Ok(refused)
    }

    fn data_failure(&self, e: &SmtpError) -> SmtpFailure {
        if is_reply(e) {
            SmtpFailure::Data(e.to_string())
        } else {
            self.lost(e)
        }
    }

    /// Failure that is not an SMTP reply.
    fn lost(&self, e: &SmtpError) -> SmtpFailure {
        if e.is_response() || e.is_client() {
            SmtpFailure::Protocol(e.to_string())
        } else {
            SmtpFailure::Connection {
                host: self.settings.host.clone(),
                port: self.settings.port,
                reason: e.to_string(),
            }
        }
    }
}

fn connect_failure(settings: &SmtpSettings, e: &SmtpError) -> MailError {
    let failure = if is_reply(e) {
        SmtpFailure::Greeting(e.to_string())
    } else if e.is_response() {
        SmtpFailure::Protocol(e.to_string())
    } else {
        SmtpFailure::Connection {
            host: settings.host.clone(),
            port: settings.port,
            reason: e.to_string(),
        }
    };
    tracing::debug!(error = %failure, "Connection failed");
    failure.into()
}

/// `true` for a negative reply from the server (4xx or 5xx).
fn is_reply(e: &SmtpError) -> bool {
    e.is_transient() || e.is_permanent()
}

fn reply_code(e: &SmtpError) -> Option<u16> {
    e.status().and_then(|code| code.to_string().parse().ok())
}

fn envelope_address(raw: &str) -> Result<lettre::Address> {
    lettre::Address::from_str(raw.trim()).map_err(|e| MailError::InvalidAddress {
        address: raw.to_string(),
        reason: e.to_string(),
    })
}
