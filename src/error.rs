//! Error types for sheetstream

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for sheetstream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Main error type for builder and session operations
///
/// Errors are `Clone` so a session can hand the same failure back on every
/// call after it has been latched.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// The builder was already built, or a previous registration failed
    #[error("StreamFileBuilder has already been built, functions may no longer be used")]
    AlreadyBuilt,

    /// Two sheets were registered under the same name
    #[error("Duplicate sheet name '{name}'")]
    DuplicateSheetName { name: String },

    /// Sheet name rejected by the workbook model
    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: &'static str },

    /// Header row is wider than a worksheet can hold
    #[error("Failed to write headers for sheet '{sheet}': {count} columns exceeds the limit")]
    TooManyColumns { sheet: String, count: usize },

    /// `build` was called before any sheet was registered
    #[error("At least one sheet must be added before building")]
    NoSheets,

    /// The data-section end marker is missing or repeated in a rendered sheet
    #[error("Unexpected sheet XML in '{path}': expected one </sheetData> tag, found {occurrences}")]
    MalformedTemplate { path: String, occurrences: usize },

    /// A rendered sheet path does not map to a registered sheet
    #[error("Unexpected sheet index in template path '{path}'")]
    UnexpectedSheetIndex { path: String },

    /// The template produced no document for a registered sheet
    #[error("Template did not render sheet {index}")]
    MissingSheetTemplate { index: usize },

    #[error("No current sheet")]
    NoCurrentSheet,

    /// Row width differs from the sheet's header width
    #[error("Invalid number of cells passed to write: expected {expected}, got {actual}. All rows on a sheet must match its header")]
    WrongColumnCount { expected: usize, actual: usize },

    /// The sheet already holds as many rows as a worksheet can
    #[error("Sheet '{sheet}' is full: a worksheet holds at most {limit} rows")]
    TooManyRows { sheet: String, limit: u32 },

    #[error("next_sheet() called, but already on last sheet")]
    AlreadyOnLastSheet,

    /// The archive outgrew what a ZIP32 container can describe
    #[error("Archive limit exceeded: {0}")]
    ArchiveLimit(String),

    /// IO error from the underlying sink
    #[error("Sink error: {0}")]
    Sink(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Sink(Arc::new(err))
    }
}
