//! Builder that registers sheets and starts the stream

use super::row::MAX_COLUMNS;
use super::session::{SheetDescriptor, StreamFile};
use super::shared_strings::SharedStrings;
use super::template::{
    DefaultTemplate, SheetSpec, TemplatePart, WorkbookTemplate, END_SHEET_DATA_TAG,
    SHEET_PATH_PREFIX, SHEET_PATH_SUFFIX,
};
use super::zip_writer::{CompressionMethod, StreamingZipWriter};
use crate::config::StreamOptions;
use crate::error::{Result, StreamError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const MAX_SHEET_NAME_CHARS: usize = 31;
const INVALID_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Collects sheets and their headers, then starts streaming
///
/// 1. Add every sheet with [`add_sheet`](Self::add_sheet). The header fixes
///    how many cells each row of that sheet must have.
/// 2. Optionally register frequent strings with
///    [`add_shared_strings`](Self::add_shared_strings).
/// 3. Call [`build`](Self::build) once to write the workbook metadata and get
///    a [`StreamFile`] positioned on the first sheet.
///
/// Any failed registration, and any call after `build`, leaves the builder
/// unusable: later calls return [`StreamError::AlreadyBuilt`].
///
/// # Examples
///
/// ```no_run
/// use sheetstream::StreamFileBuilder;
///
/// let mut builder = StreamFileBuilder::create("report.xlsx")?;
/// builder.add_sheet("Orders", &["Id", "Customer", "Status"])?;
/// builder.add_sheet("Notes", &["Text"])?;
/// builder.add_shared_strings(["Shipped", "Pending"])?;
///
/// let mut file = builder.build()?;
/// file.write(&["1", "ACME", "Shipped"])?;
/// file.next_sheet()?;
/// file.write(&["Call back on Monday"])?;
/// file.close()?;
/// # Ok::<(), sheetstream::StreamError>(())
/// ```
pub struct StreamFileBuilder<W: Write, T: WorkbookTemplate = DefaultTemplate> {
    writer: Option<W>,
    template: T,
    options: StreamOptions,
    sheets: Vec<SheetSpec>,
    shared_strings: SharedStrings,
    built: bool,
}

impl<W: Write> StreamFileBuilder<W> {
    /// Stream to `writer` with default options
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, StreamOptions::default())
    }

    pub fn with_options(writer: W, options: StreamOptions) -> Self {
        let template = DefaultTemplate::new(options.clone());
        Self::with_template(writer, options, template)
    }
}

impl StreamFileBuilder<BufWriter<File>> {
    /// Create (or truncate) the file at `path` and stream into it
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::with_capacity(64 * 1024, file)))
    }
}

impl<W: Write, T: WorkbookTemplate> StreamFileBuilder<W, T> {
    /// Stream to `writer`, rendering the workbook skeleton with `template`
    pub fn with_template(writer: W, options: StreamOptions, template: T) -> Self {
        let shared_strings = SharedStrings::with_capacity(options.shared_strings_capacity);
        StreamFileBuilder {
            writer: Some(writer),
            template,
            options,
            sheets: Vec::new(),
            shared_strings,
            built: false,
        }
    }

    /// Register a sheet and its header row.
    ///
    /// Sheet names must be unique (ignoring case), 1-31 characters long and
    /// free of `[ ] : * ? / \`. Every row later written to this sheet must
    /// have exactly `headers.len()` cells.
    pub fn add_sheet<S: AsRef<str>>(&mut self, name: &str, headers: &[S]) -> Result<()> {
        if self.built {
            return Err(StreamError::AlreadyBuilt);
        }
        let result = self.register_sheet(name, headers);
        if let Err(err) = &result {
            // Every later call fails too
            self.built = true;
            log::warn!("sheet registration failed: {err}");
        }
        result
    }

    fn register_sheet<S: AsRef<str>>(&mut self, name: &str, headers: &[S]) -> Result<()> {
        validate_sheet_name(name)?;
        if self
            .sheets
            .iter()
            .any(|sheet| sheet.name.to_lowercase() == name.to_lowercase())
        {
            return Err(StreamError::DuplicateSheetName {
                name: name.to_string(),
            });
        }
        if headers.len() > MAX_COLUMNS {
            return Err(StreamError::TooManyColumns {
                sheet: name.to_string(),
                count: headers.len(),
            });
        }

        self.sheets.push(SheetSpec {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
        });
        log::debug!(
            "sheet {} '{}' registered with {} columns",
            self.sheets.len(),
            name,
            headers.len()
        );
        Ok(())
    }

    /// Add strings to the shared strings table ahead of any row data.
    ///
    /// Strings registered here get the smallest indices. Every string written
    /// ends up in the table anyway; this only controls ordering, which keeps
    /// references to common values short.
    pub fn add_shared_strings<I, S>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.built {
            return Err(StreamError::AlreadyBuilt);
        }
        for value in values {
            self.shared_strings.add_string(value.as_ref());
        }
        Ok(())
    }

    /// Names of the sheets registered so far, in order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    /// Write the workbook metadata and start streaming.
    ///
    /// Can be called once. The returned file is positioned on the first
    /// sheet.
    pub fn build(&mut self) -> Result<StreamFile<W>> {
        if self.built {
            return Err(StreamError::AlreadyBuilt);
        }
        self.built = true;
        let writer = self.writer.take().ok_or(StreamError::AlreadyBuilt)?;
        if self.sheets.is_empty() {
            return Err(StreamError::NoSheets);
        }

        let mut shared_strings = std::mem::take(&mut self.shared_strings);
        let parts = self.template.render(&self.sheets, &mut shared_strings)?;

        // Validate every sheet document before any byte reaches the sink
        let mut templates: Vec<Option<(Vec<u8>, Vec<u8>)>> = vec![None; self.sheets.len()];
        let mut metadata = Vec::with_capacity(parts.len());
        for part in parts {
            if !part.path.starts_with(SHEET_PATH_PREFIX) {
                metadata.push(part);
                continue;
            }
            let index = parse_sheet_index(&part.path, self.sheets.len())?;
            let slot = &mut templates[index - 1];
            if slot.is_some() {
                return Err(StreamError::UnexpectedSheetIndex { path: part.path });
            }
            *slot = Some(split_sheet(&part)?);
        }

        let mut descriptors = Vec::with_capacity(self.sheets.len());
        for (position, (sheet, template)) in self.sheets.iter().zip(templates).enumerate() {
            let index = position + 1;
            let (prefix, suffix) = template.ok_or(StreamError::MissingSheetTemplate { index })?;
            descriptors.push(SheetDescriptor {
                name: sheet.name.clone(),
                index,
                column_count: sheet.headers.len(),
                prefix,
                suffix,
            });
        }

        let mut zip = StreamingZipWriter::with_compression(writer, self.options.compression_level);
        for part in &metadata {
            zip.start_entry(&part.path, CompressionMethod::Deflated)?;
            zip.write_data(&part.content)?;
        }
        zip.finish_entry()?;
        zip.flush()?;
        log::debug!(
            "stream started: {} metadata parts, {} sheets",
            metadata.len(),
            descriptors.len()
        );

        let mut file = StreamFile::new(zip, shared_strings, descriptors);
        file.next_sheet()?;
        Ok(file)
    }
}

fn validate_sheet_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.encode_utf16().count() > MAX_SHEET_NAME_CHARS {
        Some("name is longer than 31 characters")
    } else if name.contains(INVALID_SHEET_NAME_CHARS) {
        Some("name contains one of [ ] : * ? / \\")
    } else if name.starts_with('\'') || name.ends_with('\'') {
        Some("name starts or ends with an apostrophe")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StreamError::InvalidSheetName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// 1-based sheet index from `xl/worksheets/sheet<N>.xml`
fn parse_sheet_index(path: &str, sheet_count: usize) -> Result<usize> {
    path.strip_prefix(SHEET_PATH_PREFIX)
        .and_then(|rest| rest.strip_suffix(SHEET_PATH_SUFFIX))
        .and_then(|digits| digits.parse::<usize>().ok())
        .filter(|index| (1..=sheet_count).contains(index))
        .ok_or_else(|| StreamError::UnexpectedSheetIndex {
            path: path.to_string(),
        })
}

/// Cut a sheet document around its single `</sheetData>`; the tag itself
/// is written back when the sheet is closed
fn split_sheet(part: &TemplatePart) -> Result<(Vec<u8>, Vec<u8>)> {
    let tag = END_SHEET_DATA_TAG.as_bytes();
    let positions: Vec<usize> = part
        .content
        .windows(tag.len())
        .enumerate()
        .filter(|(_, window)| *window == tag)
        .map(|(pos, _)| pos)
        .collect();

    match positions.as_slice() {
        [pos] => Ok((
            part.content[..*pos].to_vec(),
            part.content[pos + tag.len()..].to_vec(),
        )),
        _ => Err(StreamError::MalformedTemplate {
            path: part.path.clone(),
            occurrences: positions.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Template returning fixed parts, for exercising the builder's checks
    struct FixedTemplate(Vec<TemplatePart>);

    impl WorkbookTemplate for FixedTemplate {
        fn render(
            &self,
            _sheets: &[SheetSpec],
            _strings: &mut SharedStrings,
        ) -> Result<Vec<TemplatePart>> {
            Ok(self.0.clone())
        }
    }

    fn part(path: &str, content: &str) -> TemplatePart {
        TemplatePart {
            path: path.to_string(),
            content: content.as_bytes().to_vec(),
        }
    }

    fn fixed_builder(parts: Vec<TemplatePart>) -> StreamFileBuilder<Vec<u8>, FixedTemplate> {
        let mut builder =
            StreamFileBuilder::with_template(Vec::new(), StreamOptions::new(), FixedTemplate(parts));
        builder.add_sheet("One", &["a"]).unwrap();
        builder
    }

    #[test]
    fn test_split_sheet() {
        let (prefix, suffix) =
            split_sheet(&part("p", "<w><sheetData><row/></sheetData><x/></w>")).unwrap();
        assert_eq!(prefix, b"<w><sheetData><row/>");
        assert_eq!(suffix, b"<x/></w>");
    }

    #[test]
    fn test_split_sheet_needs_exactly_one_marker() {
        for (content, expected) in [("<w/>", 0), ("</sheetData></sheetData>", 2)] {
            match split_sheet(&part("xl/worksheets/sheet1.xml", content)) {
                Err(StreamError::MalformedTemplate { occurrences, .. }) => {
                    assert_eq!(occurrences, expected)
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_sheet_index() {
        assert_eq!(parse_sheet_index("xl/worksheets/sheet2.xml", 2).unwrap(), 2);
        for path in [
            "xl/worksheets/sheet0.xml",
            "xl/worksheets/sheet3.xml",
            "xl/worksheets/sheetX.xml",
            "xl/worksheets/sheet1.bin",
        ] {
            assert!(matches!(
                parse_sheet_index(path, 2),
                Err(StreamError::UnexpectedSheetIndex { .. })
            ));
        }
    }

    #[test]
    fn test_sheet_name_rules() {
        assert!(validate_sheet_name("Q1 Sales (draft)").is_ok());
        assert!(validate_sheet_name(&"x".repeat(31)).is_ok());
        // Length is counted in UTF-16 units, so each emoji counts twice
        assert!(validate_sheet_name(&"\u{1F4C8}".repeat(15)).is_ok());
        let long = "x".repeat(32);
        let long_emoji = "\u{1F4C8}".repeat(16);
        for bad in [
            "",
            "a/b",
            "what?",
            "[x]",
            "'quoted'",
            long.as_str(),
            long_emoji.as_str(),
        ] {
            assert!(
                matches!(
                    validate_sheet_name(bad),
                    Err(StreamError::InvalidSheetName { .. })
                ),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn test_duplicate_name_ends_registration() {
        let mut builder = StreamFileBuilder::new(Vec::new());
        builder.add_sheet("Data", &["a"]).unwrap();
        assert!(matches!(
            builder.add_sheet("data", &["b"]),
            Err(StreamError::DuplicateSheetName { .. })
        ));
        assert_eq!(builder.sheet_names(), vec!["Data"]);
        assert!(matches!(
            builder.add_sheet("Other", &["c"]),
            Err(StreamError::AlreadyBuilt)
        ));
        assert!(matches!(
            builder.add_shared_strings(["x"]),
            Err(StreamError::AlreadyBuilt)
        ));
        assert!(matches!(builder.build(), Err(StreamError::AlreadyBuilt)));
    }

    #[test]
    fn test_too_many_header_cells() {
        let mut builder = StreamFileBuilder::new(Vec::new());
        let headers = vec!["h"; MAX_COLUMNS + 1];
        assert!(matches!(
            builder.add_sheet("Wide", &headers),
            Err(StreamError::TooManyColumns { .. })
        ));
    }

    #[test]
    fn test_build_once() {
        let mut builder = StreamFileBuilder::new(Vec::new());
        builder.add_sheet("One", &["a"]).unwrap();
        let file = builder.build().unwrap();
        assert_eq!(file.current_sheet(), Some((1, "One")));
        assert!(matches!(builder.build(), Err(StreamError::AlreadyBuilt)));
        assert!(matches!(
            builder.add_sheet("Two", &["b"]),
            Err(StreamError::AlreadyBuilt)
        ));
    }

    #[test]
    fn test_build_without_sheets() {
        let mut builder = StreamFileBuilder::new(Vec::new());
        assert!(matches!(builder.build(), Err(StreamError::NoSheets)));
    }

    #[test]
    fn test_shared_strings_registered_first() {
        let mut builder = StreamFileBuilder::new(Vec::new());
        builder.add_shared_strings(["Yes", "No", "Yes"]).unwrap();
        builder.add_sheet("One", &["No", "Header"]).unwrap();
        let file = builder.build().unwrap();

        let strings = file.shared_strings();
        assert_eq!(strings.index_of("Yes"), Some(0));
        assert_eq!(strings.index_of("No"), Some(1));
        assert_eq!(strings.index_of("Header"), Some(2));
    }

    #[test]
    fn test_malformed_sheet_template() {
        let mut builder = fixed_builder(vec![part("xl/worksheets/sheet1.xml", "<w><sheetData/></w>")]);
        assert!(matches!(
            builder.build(),
            Err(StreamError::MalformedTemplate { occurrences: 0, .. })
        ));
    }

    #[test]
    fn test_unexpected_sheet_index() {
        let mut builder = fixed_builder(vec![part(
            "xl/worksheets/sheet2.xml",
            "<w><sheetData></sheetData></w>",
        )]);
        assert!(matches!(
            builder.build(),
            Err(StreamError::UnexpectedSheetIndex { .. })
        ));

        let doc = "<w><sheetData></sheetData></w>";
        let mut builder = fixed_builder(vec![
            part("xl/worksheets/sheet1.xml", doc),
            part("xl/worksheets/sheet1.xml", doc),
        ]);
        assert!(matches!(
            builder.build(),
            Err(StreamError::UnexpectedSheetIndex { .. })
        ));
    }

    #[test]
    fn test_missing_sheet_template() {
        let mut builder = fixed_builder(vec![part("xl/workbook.xml", "<workbook/>")]);
        assert!(matches!(
            builder.build(),
            Err(StreamError::MissingSheetTemplate { index: 1 })
        ));
    }
}
