//! Streaming XLSX writer
//!
//! This module splits the work the way the container format forces it to:
//! - Workbook metadata is rendered up front and written deflated
//! - Sheet documents are cut at `</sheetData>`; rows are spliced in between
//!   and go out uncompressed so every row reaches the sink immediately
//! - Shared strings are collected while streaming and written last
//!
//! # Examples
//!
//! ```
//! use sheetstream::streaming::StreamFileBuilder;
//!
//! let mut builder = StreamFileBuilder::new(Vec::new());
//! builder.add_sheet("Sheet1", &["Name", "Age"])?;
//!
//! let mut file = builder.build()?;
//! file.write(&["Alice", "30"])?;
//! file.write_all([["Bob", "25"], ["Carol", ""]])?;
//!
//! let bytes: Vec<u8> = file.close()?;
//! assert!(bytes.starts_with(b"PK"));
//! # Ok::<(), sheetstream::StreamError>(())
//! ```

pub mod builder;
pub mod row;
pub mod session;
pub mod shared_strings;
pub mod template;
pub mod xml_writer;
pub mod zip_writer;

pub use builder::StreamFileBuilder;
pub use row::{column_name, encode_row, MAX_COLUMNS, MAX_ROWS};
pub use session::StreamFile;
pub use shared_strings::{SharedStrings, SHARED_STRINGS_PATH};
pub use template::{sheet_path, DefaultTemplate, SheetSpec, TemplatePart, WorkbookTemplate};
pub use zip_writer::{CompressionMethod, StreamingZipWriter};
