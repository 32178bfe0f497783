//! Error types for daisy-nav operations.

use thiserror::Error;

/// Errors that can occur while reading a book's documents.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome code of a navigation call.
///
/// Every navigation result maps onto exactly one of these; see [`Status::of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Status {
    Ok,
    AtBeginning,
    AtEnd,
    NotFound,
    NotInitialized,
    ParseError,
}

impl Status {
    /// Status code for a navigation result.
    pub fn of<T>(result: &std::result::Result<T, NavError>) -> Status {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => e.status(),
        }
    }
}

/// Why a navigation request could not be satisfied.
///
/// `AtBeginning` and `AtEnd` are boundaries, not failures: they end the
/// current call but leave the engine usable.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("already at the beginning")]
    AtBeginning,

    #[error("already at the end")]
    AtEnd,

    #[error("position not found")]
    NotFound,

    #[error("no book is open")]
    NotInitialized,

    #[error("failed to load document: {0}")]
    Parse(#[from] Error),
}

impl NavError {
    pub fn status(&self) -> Status {
        match self {
            NavError::AtBeginning => Status::AtBeginning,
            NavError::AtEnd => Status::AtEnd,
            NavError::NotFound => Status::NotFound,
            NavError::NotInitialized => Status::NotInitialized,
            NavError::Parse(_) => Status::ParseError,
        }
    }

    /// True for `AtBeginning`/`AtEnd`.
    pub fn is_boundary(&self) -> bool {
        matches!(self, NavError::AtBeginning | NavError::AtEnd)
    }
}

/// Errors from mapping an elapsed time onto a document position.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("the spine is empty")]
    EmptySpine,

    #[error("no document contains second {0}")]
    OutOfRange(i64),

    #[error("document {0} lacks timing metadata")]
    MetadataMissing(String),

    #[error("failed to load document during search: {0}")]
    Load(#[from] Error),
}
