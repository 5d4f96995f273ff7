//! Core data model types: addresses, attachments and embedded files.

pub mod address;
pub mod attachment;
