//! Header text encoding: charsets and RFC 2047 encoded words.

pub mod charset;
pub mod words;
