//! # sheetstream
//!
//! Write XLSX workbooks as a stream, row by row, into any [`std::io::Write`].
//!
//! ## Features
//!
//! - **True Streaming**: every row is flushed to the sink as it is written
//! - **No Seeking**: the ZIP container is written front to back, so sockets,
//!   pipes and HTTP bodies work as sinks
//! - **Multiple Sheets**: sheets are filled one after another in the order
//!   they were added
//! - **Shared Strings**: repeated text is stored once for the whole workbook
//! - **Fixed Width Rows**: each sheet's header sets the row width, checked on
//!   every write
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheetstream::StreamFileBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = StreamFileBuilder::create("output.xlsx")?;
//! builder.add_sheet("Users", &["Name", "Age", "City"])?;
//! builder.add_sheet("Audit", &["Event"])?;
//!
//! let mut file = builder.build()?;
//! file.write(&["Alice", "30", "New York"])?;
//! file.write(&["Bob", "25", ""])?;
//!
//! file.next_sheet()?;
//! file.write(&["export finished"])?;
//!
//! file.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Memory stays at one row plus the shared strings table. Entries written
//! in one piece (metadata, shared strings) are deflated; sheet entries are
//! stored, because compressing them would hold rows back until the sheet
//! ends.

pub mod config;
pub mod error;
pub mod streaming;

pub use config::StreamOptions;
pub use error::{Result, StreamError};
pub use streaming::{SharedStrings, StreamFile, StreamFileBuilder, WorkbookTemplate};
