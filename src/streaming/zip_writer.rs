//! Streaming ZIP writer for non-seekable sinks
//!
//! Every entry is written with a data descriptor (general purpose bit 3), so
//! CRC and sizes follow the data instead of being patched into the local
//! header. Offsets are counted as bytes pass through, which means the sink
//! only needs `Write`.
//!
//! - `Stored` entries go straight to the sink as they are written.
//! - `Deflated` entries are compressed into memory and emitted when the entry
//!   ends. Use them for parts that are produced in one piece.

use crate::error::{Result, StreamError};
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

const LOCAL_HEADER_SIG: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const DATA_DESCRIPTOR_SIG: [u8; 4] = [0x50, 0x4b, 0x07, 0x08];
const CENTRAL_DIR_SIG: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
const END_OF_CENTRAL_DIR_SIG: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

const VERSION_NEEDED: u16 = 20;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_UTF8_NAME: u16 = 1 << 11;

/// Largest size or offset a ZIP32 archive can describe
const ZIP32_LIMIT: u64 = u32::MAX as u64;

/// How an entry's bytes are stored, fixed when the entry is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression; bytes reach the sink as soon as they are written
    Stored,
    /// Deflate; the entry is buffered and compressed when it is finished
    Deflated,
}

impl CompressionMethod {
    fn code(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
        }
    }
}

/// Entry info kept for the central directory
struct ZipEntry {
    name: String,
    method: CompressionMethod,
    local_header_offset: u32,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
}

enum EntryBody {
    Stored,
    Deflated(DeflateEncoder<Vec<u8>>),
}

struct CurrentEntry {
    name: String,
    method: CompressionMethod,
    local_header_offset: u32,
    crc: Crc32,
    uncompressed_size: u64,
    stored_size: u64,
    body: EntryBody,
}

/// Writer that counts every byte handed to the sink
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// ZIP writer that emits entries sequentially into any `Write`
pub struct StreamingZipWriter<W: Write> {
    output: CountingWriter<W>,
    entries: Vec<ZipEntry>,
    current_entry: Option<CurrentEntry>,
    compression_level: u32,
    size_limit: u64,
    dos_time: u16,
    dos_date: u16,
}

impl<W: Write> StreamingZipWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_compression(writer, 6)
    }

    /// `compression_level` (0-9) applies to `Deflated` entries
    pub fn with_compression(writer: W, compression_level: u32) -> Self {
        let (dos_time, dos_date) = dos_timestamp(Local::now().naive_local());
        Self {
            output: CountingWriter {
                inner: writer,
                written: 0,
            },
            entries: Vec::new(),
            current_entry: None,
            compression_level: compression_level.min(9),
            size_limit: ZIP32_LIMIT,
            dos_time,
            dos_date,
        }
    }

    #[cfg(test)]
    fn with_size_limit(mut self, size_limit: u64) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Bytes handed to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.output.written
    }

    /// Start a new entry, finishing the previous one if any
    pub fn start_entry(&mut self, name: &str, method: CompressionMethod) -> Result<()> {
        self.finish_entry()?;

        if self.entries.len() >= u16::MAX as usize {
            return Err(StreamError::ArchiveLimit(format!(
                "more than {} entries",
                u16::MAX
            )));
        }
        let local_header_offset = to_u32(self.output.written, "entry offset")?;
        let name_len = u16::try_from(name.len())
            .map_err(|_| StreamError::ArchiveLimit(format!("entry name too long: {name}")))?;

        let out = &mut self.output;
        out.write_all(&LOCAL_HEADER_SIG)?;
        out.write_all(&VERSION_NEEDED.to_le_bytes())?;
        out.write_all(&entry_flags(name).to_le_bytes())?;
        out.write_all(&method.code().to_le_bytes())?;
        out.write_all(&self.dos_time.to_le_bytes())?;
        out.write_all(&self.dos_date.to_le_bytes())?;
        out.write_all(&0u32.to_le_bytes())?; // crc32, in data descriptor
        out.write_all(&0u32.to_le_bytes())?; // compressed size, in data descriptor
        out.write_all(&0u32.to_le_bytes())?; // uncompressed size, in data descriptor
        out.write_all(&name_len.to_le_bytes())?;
        out.write_all(&0u16.to_le_bytes())?; // extra len
        out.write_all(name.as_bytes())?;

        let body = match method {
            CompressionMethod::Stored => EntryBody::Stored,
            CompressionMethod::Deflated => EntryBody::Deflated(DeflateEncoder::new(
                Vec::new(),
                Compression::new(self.compression_level),
            )),
        };

        log::trace!("zip entry started: {name} ({method:?})");
        self.current_entry = Some(CurrentEntry {
            name: name.to_string(),
            method,
            local_header_offset,
            crc: Crc32::new(),
            uncompressed_size: 0,
            stored_size: 0,
            body,
        });
        Ok(())
    }

    /// Append data to the current entry.
    ///
    /// Fails with [`StreamError::ArchiveLimit`] before writing anything if
    /// the entry or the archive would outgrow ZIP32.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let Some(entry) = self.current_entry.as_mut() else {
            return Err(std::io::Error::other("no zip entry started").into());
        };

        let len = data.len() as u64;
        let archive_end = match entry.body {
            EntryBody::Stored => self.output.written + len,
            EntryBody::Deflated(_) => self.output.written,
        };
        if entry.uncompressed_size + len > self.size_limit || archive_end > self.size_limit {
            return Err(StreamError::ArchiveLimit(format!(
                "entry {} would grow past {} bytes and need ZIP64",
                entry.name, self.size_limit
            )));
        }

        entry.crc.update(data);
        entry.uncompressed_size += data.len() as u64;
        match &mut entry.body {
            EntryBody::Stored => {
                self.output.write_all(data)?;
                entry.stored_size += data.len() as u64;
            }
            EntryBody::Deflated(encoder) => encoder.write_all(data)?,
        }
        Ok(())
    }

    /// Push everything written so far to the sink and flush it.
    ///
    /// Bytes of an open `Deflated` entry stay buffered until the entry ends.
    pub fn flush(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }

    /// Finish the current entry and write its data descriptor
    pub fn finish_entry(&mut self) -> Result<()> {
        let Some(entry) = self.current_entry.take() else {
            return Ok(());
        };

        let stored_size = match entry.body {
            EntryBody::Stored => entry.stored_size,
            EntryBody::Deflated(encoder) => {
                let compressed = encoder.finish()?;
                self.output.write_all(&compressed)?;
                compressed.len() as u64
            }
        };

        let crc = entry.crc.finalize();
        let compressed_size = to_u32(stored_size, "entry size")?;
        let uncompressed_size = to_u32(entry.uncompressed_size, "entry size")?;

        self.output.write_all(&DATA_DESCRIPTOR_SIG)?;
        self.output.write_all(&crc.to_le_bytes())?;
        self.output.write_all(&compressed_size.to_le_bytes())?;
        self.output.write_all(&uncompressed_size.to_le_bytes())?;

        log::debug!(
            "zip entry finished: {} ({} -> {} bytes)",
            entry.name,
            uncompressed_size,
            compressed_size
        );
        self.entries.push(ZipEntry {
            name: entry.name,
            method: entry.method,
            local_header_offset: entry.local_header_offset,
            crc32: crc,
            compressed_size,
            uncompressed_size,
        });
        Ok(())
    }

    /// Write the central directory and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.finish_entry()?;

        let central_dir_offset = to_u32(self.output.written, "central directory offset")?;

        for entry in &self.entries {
            let out = &mut self.output;
            out.write_all(&CENTRAL_DIR_SIG)?;
            out.write_all(&VERSION_NEEDED.to_le_bytes())?; // version made by
            out.write_all(&VERSION_NEEDED.to_le_bytes())?;
            out.write_all(&entry_flags(&entry.name).to_le_bytes())?;
            out.write_all(&entry.method.code().to_le_bytes())?;
            out.write_all(&self.dos_time.to_le_bytes())?;
            out.write_all(&self.dos_date.to_le_bytes())?;
            out.write_all(&entry.crc32.to_le_bytes())?;
            out.write_all(&entry.compressed_size.to_le_bytes())?;
            out.write_all(&entry.uncompressed_size.to_le_bytes())?;
            out.write_all(&(entry.name.len() as u16).to_le_bytes())?;
            out.write_all(&0u16.to_le_bytes())?; // extra len
            out.write_all(&0u16.to_le_bytes())?; // file comment len
            out.write_all(&0u16.to_le_bytes())?; // disk number start
            out.write_all(&0u16.to_le_bytes())?; // internal attrs
            out.write_all(&0u32.to_le_bytes())?; // external attrs
            out.write_all(&entry.local_header_offset.to_le_bytes())?;
            out.write_all(entry.name.as_bytes())?;
        }

        let central_dir_size = to_u32(
            self.output.written - central_dir_offset as u64,
            "central directory size",
        )?;
        let entry_count = self.entries.len() as u16;

        let out = &mut self.output;
        out.write_all(&END_OF_CENTRAL_DIR_SIG)?;
        out.write_all(&0u16.to_le_bytes())?; // disk number
        out.write_all(&0u16.to_le_bytes())?; // disk with central dir
        out.write_all(&entry_count.to_le_bytes())?;
        out.write_all(&entry_count.to_le_bytes())?;
        out.write_all(&central_dir_size.to_le_bytes())?;
        out.write_all(&central_dir_offset.to_le_bytes())?;
        out.write_all(&0u16.to_le_bytes())?; // comment len
        out.flush()?;

        log::debug!(
            "zip archive finished: {} entries, {} bytes",
            self.entries.len(),
            self.output.written
        );
        Ok(self.output.inner)
    }
}

fn entry_flags(name: &str) -> u16 {
    if name.is_ascii() {
        FLAG_DATA_DESCRIPTOR
    } else {
        FLAG_DATA_DESCRIPTOR | FLAG_UTF8_NAME
    }
}

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StreamError::ArchiveLimit(format!("{what} {value} needs ZIP64")))
}

/// MS-DOS (time, date) pair; dates before 1980 clamp to 1980-01-01
fn dos_timestamp(dt: NaiveDateTime) -> (u16, u16) {
    if dt.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
    let date =
        (((dt.year() - 1980).min(127) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
    (time, date)
}
