//! Streaming session: rows in, archive bytes out

use super::row::{encode_row, MAX_ROWS};
use super::shared_strings::{SharedStrings, SHARED_STRINGS_PATH};
use super::template::{sheet_path, END_SHEET_DATA_TAG};
use super::zip_writer::{CompressionMethod, StreamingZipWriter};
use crate::error::{Result, StreamError};
use std::io::Write;

/// A sheet ready for streaming: its fixed width and the template halves
/// that surround the rows
#[derive(Debug, Clone)]
pub(crate) struct SheetDescriptor {
    pub(crate) name: String,
    /// 1-based position, also the N in `xl/worksheets/sheet<N>.xml`
    pub(crate) index: usize,
    pub(crate) column_count: usize,
    pub(crate) prefix: Vec<u8>,
    pub(crate) suffix: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct SheetCursor {
    /// Position in `sheets`
    position: usize,
    /// Rows in the open sheet, header included
    rows_written: u32,
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Active(SheetCursor),
    AllSheetsVisited,
    Failed(StreamError),
}

/// An XLSX file being streamed to `W`
///
/// Created by [`StreamFileBuilder::build`](super::StreamFileBuilder::build),
/// positioned on the first sheet. Rows go to one sheet at a time; sheets are
/// visited in the order they were added and cannot be revisited.
///
/// Any failure other than [`StreamError::AlreadyOnLastSheet`] is final: bytes
/// already handed to the sink cannot be taken back, so the session keeps
/// returning the same error and writes nothing more. Discard the output and
/// start over with a fresh sink.
///
/// The session is not synchronized. Sharing it between threads is up to the
/// caller.
pub struct StreamFile<W: Write> {
    zip: StreamingZipWriter<W>,
    shared_strings: SharedStrings,
    sheets: Vec<SheetDescriptor>,
    state: SessionState,
    row_buffer: Vec<u8>,
}

impl<W: Write> StreamFile<W> {
    pub(crate) fn new(
        zip: StreamingZipWriter<W>,
        shared_strings: SharedStrings,
        sheets: Vec<SheetDescriptor>,
    ) -> Self {
        StreamFile {
            zip,
            shared_strings,
            sheets,
            state: SessionState::Idle,
            row_buffer: Vec::with_capacity(4096),
        }
    }

    /// Write a row to the current sheet and flush the sink.
    ///
    /// The row must have exactly as many cells as the sheet's header. Empty
    /// strings leave their cell out of the markup.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetstream::StreamFileBuilder;
    ///
    /// let mut builder = StreamFileBuilder::new(Vec::new());
    /// builder.add_sheet("People", &["Name", "City"])?;
    /// let mut file = builder.build()?;
    ///
    /// file.write(&["Alice", "Hanoi"])?;
    /// file.write(&["Bob", ""])?;
    /// assert!(file.write(&["too", "many", "cells"]).is_err());
    /// # Ok::<(), sheetstream::StreamError>(())
    /// ```
    pub fn write<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<()> {
        self.check_failed()?;
        let result = self.write_row(cells).and_then(|_| self.zip.flush());
        self.latch(result)
    }

    /// Write several rows, flushing after each one.
    ///
    /// Stops at the first row that fails; rows before it stay written.
    pub fn write_all<I, R, S>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        for row in rows {
            self.write(row.as_ref())?;
        }
        Ok(())
    }

    /// Close the current sheet and move to the next one.
    ///
    /// On the last sheet this still closes the sheet, then fails with
    /// [`StreamError::AlreadyOnLastSheet`]. Nothing more can be written after
    /// that, but [`close`](Self::close) finishes the file normally.
    pub fn next_sheet(&mut self) -> Result<()> {
        self.check_failed()?;
        match self.advance() {
            Ok(true) => Ok(()),
            Ok(false) => Err(StreamError::AlreadyOnLastSheet),
            Err(err) => self.latch(Err(err)),
        }
    }

    /// Finish the file and hand back the sink.
    ///
    /// Sheets that were never reached are written with their header row only.
    /// The shared strings part and the ZIP central directory follow.
    pub fn close(mut self) -> Result<W> {
        self.check_failed()?;

        loop {
            match self.advance() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(err) => {
                    log::warn!("closing stream failed: {err}");
                    return Err(err);
                }
            }
        }

        log::debug!(
            "writing {} shared strings",
            self.shared_strings.len()
        );
        let sst = self.shared_strings.into_xml();
        self.zip
            .start_entry(SHARED_STRINGS_PATH, CompressionMethod::Deflated)?;
        self.zip.write_data(&sst)?;
        self.zip.finish()
    }

    /// The error that stopped this session, if any
    pub fn error(&self) -> Option<&StreamError> {
        match &self.state {
            SessionState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// 1-based index and name of the sheet accepting rows
    pub fn current_sheet(&self) -> Option<(usize, &str)> {
        match &self.state {
            SessionState::Active(cursor) => {
                let sheet = &self.sheets[cursor.position];
                Some((sheet.index, sheet.name.as_str()))
            }
            _ => None,
        }
    }

    /// Rows in the current sheet, counting the header row
    pub fn rows_written(&self) -> Option<u32> {
        match &self.state {
            SessionState::Active(cursor) => Some(cursor.rows_written),
            _ => None,
        }
    }

    pub fn shared_strings(&self) -> &SharedStrings {
        &self.shared_strings
    }

    fn write_row<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<()> {
        let SessionState::Active(cursor) = &mut self.state else {
            return Err(StreamError::NoCurrentSheet);
        };
        let sheet = &self.sheets[cursor.position];
        if cells.len() != sheet.column_count {
            return Err(StreamError::WrongColumnCount {
                expected: sheet.column_count,
                actual: cells.len(),
            });
        }
        if cursor.rows_written >= MAX_ROWS {
            return Err(StreamError::TooManyRows {
                sheet: sheet.name.clone(),
                limit: MAX_ROWS,
            });
        }

        cursor.rows_written += 1;
        let row_index = cursor.rows_written - 1;
        log::trace!("sheet {}: row {}", sheet.index, row_index + 1);

        self.row_buffer.clear();
        encode_row(
            row_index,
            cells,
            &mut self.shared_strings,
            &mut self.row_buffer,
        );
        self.zip.write_data(&self.row_buffer)
    }

    /// Close the active sheet, if any, and open the next unvisited one.
    ///
    /// Returns `false` once every sheet has been written and closed.
    fn advance(&mut self) -> Result<bool> {
        let next = match self.state {
            SessionState::Idle => 0,
            SessionState::Active(cursor) => {
                self.finish_sheet(cursor)?;
                cursor.position + 1
            }
            SessionState::AllSheetsVisited => self.sheets.len(),
            SessionState::Failed(ref err) => return Err(err.clone()),
        };

        if next >= self.sheets.len() {
            self.state = SessionState::AllSheetsVisited;
            return Ok(false);
        }
        self.open_sheet(next)?;
        Ok(true)
    }

    fn open_sheet(&mut self, position: usize) -> Result<()> {
        let sheet = &self.sheets[position];
        // Stored: deflate would hold the whole sheet back until it ends
        self.zip
            .start_entry(&sheet_path(sheet.index), CompressionMethod::Stored)?;
        self.zip.write_data(&sheet.prefix)?;
        log::debug!("sheet {} '{}' opened", sheet.index, sheet.name);

        self.state = SessionState::Active(SheetCursor {
            position,
            rows_written: 1,
        });
        Ok(())
    }

    fn finish_sheet(&mut self, cursor: SheetCursor) -> Result<()> {
        let sheet = &self.sheets[cursor.position];
        self.zip.write_data(END_SHEET_DATA_TAG.as_bytes())?;
        self.zip.write_data(&sheet.suffix)?;
        self.zip.finish_entry()?;
        log::debug!(
            "sheet {} '{}' closed with {} rows",
            sheet.index,
            sheet.name,
            cursor.rows_written
        );
        Ok(())
    }

    fn check_failed(&self) -> Result<()> {
        match &self.state {
            SessionState::Failed(err) => Err(err.clone()),
            _ => Ok(()),
        }
    }

    fn latch<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            log::warn!("stream failed, no further writes accepted: {err}");
            self.state = SessionState::Failed(err.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn descriptor(index: usize, columns: usize) -> SheetDescriptor {
        SheetDescriptor {
            name: format!("S{index}"),
            index,
            column_count: columns,
            prefix: b"<worksheet><sheetData><row r=\"1\"></row>".to_vec(),
            suffix: b"</worksheet>".to_vec(),
        }
    }

    fn session(columns: &[usize]) -> StreamFile<Vec<u8>> {
        let sheets = columns
            .iter()
            .enumerate()
            .map(|(i, &c)| descriptor(i + 1, c))
            .collect();
        StreamFile::new(
            StreamingZipWriter::new(Vec::new()),
            SharedStrings::new(),
            sheets,
        )
    }

    #[test]
    fn test_idle_session_rejects_rows() {
        let mut file = session(&[1]);
        assert!(matches!(
            file.write(&["x"]),
            Err(StreamError::NoCurrentSheet)
        ));
        // Latched: advancing no longer helps
        assert!(matches!(
            file.next_sheet(),
            Err(StreamError::NoCurrentSheet)
        ));
    }

    #[test]
    fn test_cursor_moves_forward() {
        let mut file = session(&[1, 2]);
        file.next_sheet().unwrap();
        assert_eq!(file.current_sheet(), Some((1, "S1")));
        assert_eq!(file.rows_written(), Some(1));

        file.write(&["a"]).unwrap();
        assert_eq!(file.rows_written(), Some(2));

        file.next_sheet().unwrap();
        assert_eq!(file.current_sheet(), Some((2, "S2")));
        assert_eq!(file.rows_written(), Some(1));

        assert!(matches!(
            file.next_sheet(),
            Err(StreamError::AlreadyOnLastSheet)
        ));
        assert_eq!(file.current_sheet(), None);
        assert!(file.error().is_none());
    }

    #[test]
    fn test_wrong_column_count_latches() {
        let mut file = session(&[2]);
        file.next_sheet().unwrap();
        let err = file.write(&["only one"]).unwrap_err();
        assert!(matches!(
            err,
            StreamError::WrongColumnCount {
                expected: 2,
                actual: 1
            }
        ));
        assert!(file.error().is_some());
        assert!(matches!(
            file.write(&["now", "right"]),
            Err(StreamError::WrongColumnCount { .. })
        ));
        assert!(matches!(
            file.close(),
            Err(StreamError::WrongColumnCount { .. })
        ));
    }

    #[test]
    fn test_failed_session_writes_nothing_more() {
        let mut file = session(&[1]);
        file.next_sheet().unwrap();
        let _ = file.write::<&str>(&[]);
        let before = file.zip.bytes_written();
        let _ = file.write(&["x"]);
        let _ = file.next_sheet();
        assert_eq!(file.zip.bytes_written(), before);
    }

    #[test]
    fn test_rows_interned() {
        let mut file = session(&[2]);
        file.next_sheet().unwrap();
        file.write_all([["a", "b"], ["b", "a"]]).unwrap();
        assert_eq!(file.shared_strings().len(), 2);
    }

    #[test]
    fn test_row_limit_latches() {
        let mut file = session(&[1]);
        file.next_sheet().unwrap();
        file.state = SessionState::Active(SheetCursor {
            position: 0,
            rows_written: MAX_ROWS - 1,
        });

        file.write(&["last"]).unwrap();
        assert_eq!(file.rows_written(), Some(MAX_ROWS));

        let before = file.zip.bytes_written();
        assert!(matches!(
            file.write(&["over"]),
            Err(StreamError::TooManyRows { limit: MAX_ROWS, .. })
        ));
        assert_eq!(file.zip.bytes_written(), before);
        assert!(matches!(
            file.close(),
            Err(StreamError::TooManyRows { .. })
        ));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_error_latches() {
        let mut file = StreamFile::new(
            StreamingZipWriter::new(BrokenPipe),
            SharedStrings::new(),
            vec![descriptor(1, 1)],
        );
        assert!(matches!(file.next_sheet(), Err(StreamError::Sink(_))));
        assert!(matches!(file.write(&["x"]), Err(StreamError::Sink(_))));
        assert!(matches!(file.close(), Err(StreamError::Sink(_))));
    }
}
