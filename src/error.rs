//! Error types for css-orphans operations.

use thiserror::Error;

use crate::stylesheet::{RulePath, StylesheetError};

/// Errors that can abort a run or a single operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource not found: {0}")]
    MissingResource(String),

    #[error("Could not parse markup document {id}: {reason}")]
    Markup { id: String, reason: String },

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("Invalid preferences: {0}")]
    Preferences(#[from] serde_json::Error),

    #[error("Cannot delete selector {index} of rule {rule} in {stylesheet}: {reason}")]
    StaleDeletion {
        stylesheet: String,
        rule: RulePath,
        index: usize,
        reason: String,
    },

    #[error("CSS parsing error: {0}")]
    Css(#[from] StylesheetError),
}

pub type Result<T> = std::result::Result<T, Error>;
