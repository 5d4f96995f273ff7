//! Attachments and embedded (inline) files.
//!
//! Both are plain records. They are turned into MIME leaves exactly once,
//! when the message body is built.

use std::path::Path;

use lettre::message::header::{ContentDisposition, ContentId, Header, HeaderName, HeaderValue};
use lettre::message::SinglePart;

use crate::compose::build::leaf_part;
use crate::error::{MailError, Result};

/// MIME type used when nothing better is known.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file attached to the message (`Content-Disposition: attachment`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Raw data. For `text/*` content, bytes already encoded in `charset`.
    pub data: Vec<u8>,
    /// MIME main type (`text`, `image`, `application`, ...).
    pub maintype: String,
    /// MIME sub type (`plain`, `png`, `pdf`, ...).
    pub subtype: String,
    /// Suggested file name; may contain non-ASCII characters.
    pub filename: Option<String>,
    /// Charset of `data`; required when `maintype` is `text`.
    pub charset: Option<String>,
    /// Force quoted-printable for `text/*` content.
    pub use_quoted_printable: bool,
}

impl Attachment {
    /// An `application/octet-stream` attachment without a file name.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            maintype: "application".to_string(),
            subtype: "octet-stream".to_string(),
            filename: None,
            charset: None,
            use_quoted_printable: false,
        }
    }

    /// Read an attachment from disk.
    ///
    /// The file name is the base name of `path`; the MIME type defaults to
    /// `application/octet-stream`.
    pub fn from_path(path: impl AsRef<Path>, mime_type: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| MailError::io(path, e))?;
        let (maintype, subtype) = split_mime_type(mime_type.unwrap_or(DEFAULT_MIME_TYPE))?;
        Ok(Self {
            data,
            maintype,
            subtype,
            filename: base_name(path),
            charset: None,
            use_quoted_printable: false,
        })
    }

    pub fn with_mime_type(mut self, maintype: impl Into<String>, subtype: impl Into<String>) -> Self {
        self.maintype = maintype.into();
        self.subtype = subtype.into();
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn with_quoted_printable(mut self, enabled: bool) -> Self {
        self.use_quoted_printable = enabled;
        self
    }

    /// Convert into a MIME leaf carrying `Content-Disposition: attachment`.
    ///
    /// Non-ASCII file names are written as RFC 2231 extended parameters.
    pub fn to_mime_part(&self) -> Result<SinglePart> {
        leaf_part(
            &self.data,
            &self.maintype,
            &self.subtype,
            self.charset.as_deref(),
            self.use_quoted_printable,
            |part| match &self.filename {
                Some(name) => part.header(ContentDisposition::attachment(name)),
                None => part.header(BareAttachment),
            },
        )
    }
}

/// `Content-Disposition: attachment` without a file name.
#[derive(Debug, Clone, Copy)]
struct BareAttachment;

impl Header for BareAttachment {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Content-Disposition")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if s.trim().eq_ignore_ascii_case("attachment") {
            Ok(Self)
        } else {
            Err(format!("not a bare attachment disposition: {s}").into())
        }
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), "attachment".to_string())
    }
}

/// A document referenced from the text or HTML body through `cid:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    /// Raw data. For `text/*` content, bytes already encoded in `charset`.
    pub data: Vec<u8>,
    pub maintype: String,
    pub subtype: String,
    /// Identifier used in `cid:` references, without angle brackets.
    pub content_id: String,
    pub charset: Option<String>,
    /// Optional file name added to the inline disposition.
    pub filename: Option<String>,
}

impl EmbeddedFile {
    /// An `application/octet-stream` embedded file.
    pub fn new(data: impl Into<Vec<u8>>, content_id: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            maintype: "application".to_string(),
            subtype: "octet-stream".to_string(),
            content_id: content_id.into(),
            charset: None,
            filename: None,
        }
    }

    /// Read an embedded file from disk.
    ///
    /// The MIME type is guessed from the file name when not given, the file
    /// name defaults to the base name of `path` and the content-id defaults
    /// to the file name.
    pub fn from_path(
        path: impl AsRef<Path>,
        mime_type: Option<&str>,
        content_id: Option<&str>,
        filename: Option<&str>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| MailError::io(path, e))?;
        let mime_type = match mime_type {
            Some(m) => m.to_string(),
            None => guess_mime_type(path),
        };
        let (maintype, subtype) = split_mime_type(&mime_type)?;
        let filename = filename.map(String::from).or_else(|| base_name(path));
        let content_id = content_id
            .map(String::from)
            .or_else(|| filename.clone())
            .unwrap_or_default();
        Ok(Self {
            data,
            maintype,
            subtype,
            content_id,
            charset: None,
            filename,
        })
    }

    pub fn with_mime_type(mut self, maintype: impl Into<String>, subtype: impl Into<String>) -> Self {
        self.maintype = maintype.into();
        self.subtype = subtype.into();
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Convert into a MIME leaf with `Content-ID` and an inline disposition.
    pub fn to_mime_part(&self) -> Result<SinglePart> {
        let content_id = ContentId::from(format!("<{}>", self.content_id));
        let disposition = match &self.filename {
            Some(name) => ContentDisposition::inline_with_name(name),
            None => ContentDisposition::inline(),
        };
        leaf_part(
            &self.data,
            &self.maintype,
            &self.subtype,
            self.charset.as_deref(),
            false,
            |part| part.header(content_id).header(disposition),
        )
    }
}

/// Entry of an attachment or embedded-file list.
///
/// `Built` parts are attached to the message unmodified.
#[derive(Debug, Clone)]
pub enum PartSource<T> {
    Data(T),
    Built(SinglePart),
}

impl<T> PartSource<T> {
    pub(crate) fn resolve(&self, convert: impl Fn(&T) -> Result<SinglePart>) -> Result<SinglePart> {
        match self {
            Self::Data(data) => convert(data),
            Self::Built(part) => Ok(part.clone()),
        }
    }
}

impl From<Attachment> for PartSource<Attachment> {
    fn from(attachment: Attachment) -> Self {
        Self::Data(attachment)
    }
}

impl From<EmbeddedFile> for PartSource<EmbeddedFile> {
    fn from(embedded: EmbeddedFile) -> Self {
        Self::Data(embedded)
    }
}

impl From<SinglePart> for PartSource<Attachment> {
    fn from(part: SinglePart) -> Self {
        Self::Built(part)
    }
}

impl From<SinglePart> for PartSource<EmbeddedFile> {
    fn from(part: SinglePart) -> Self {
        Self::Built(part)
    }
}

/// Guess a MIME type from the file name, falling back to
/// `application/octet-stream`.
pub fn guess_mime_type(path: impl AsRef<Path>) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

/// Split `"image/png"` into `("image", "png")`.
pub fn split_mime_type(mime_type: &str) -> Result<(String, String)> {
    match mime_type.trim().split_once('/') {
        Some((main, sub)) if !main.is_empty() && !sub.is_empty() => {
            Ok((main.to_ascii_lowercase(), sub.to_ascii_lowercase()))
        }
        _ => Err(MailError::InvalidMimeType(mime_type.to_string())),
    }
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
