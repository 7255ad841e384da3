//! Shared strings table for string deduplication

use super::xml_writer::XmlWriter;
use indexmap::IndexSet;

/// Archive path of the shared strings part
pub const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Shared strings table that deduplicates strings across the workbook
///
/// Indices are assigned in first-seen order and never change. The table is
/// serialized once, by value, when the workbook is closed.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    strings: IndexSet<String>,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SharedStrings {
            strings: IndexSet::with_capacity(capacity),
        }
    }

    /// Add a string and get its index
    pub fn add_string(&mut self, s: &str) -> u32 {
        if let Some(index) = self.strings.get_index_of(s) {
            return index as u32;
        }
        let (index, _) = self.strings.insert_full(s.to_string());
        index as u32
    }

    pub fn index_of(&self, s: &str) -> Option<u32> {
        self.strings.get_index_of(s).map(|i| i as u32)
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get_index(index as usize).map(String::as_str)
    }

    /// Number of unique strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Serialize the table as `xl/sharedStrings.xml`
    pub fn into_xml(self) -> Vec<u8> {
        let count = self.strings.len() as u64;
        let mut xml = XmlWriter::new();
        xml.declaration()
            .start_element("sst")
            .attribute("xmlns", SPREADSHEETML_NS)
            .attribute_int("count", count)
            .attribute_int("uniqueCount", count)
            .close_start_tag();

        for s in &self.strings {
            xml.start_element("si").close_start_tag();
            xml.start_element("t");
            // Excel trims edge whitespace unless told otherwise
            if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                xml.attribute("xml:space", "preserve");
            }
            xml.close_start_tag().escaped(s).end_element("t");
            xml.end_element("si");
        }

        xml.end_element("sst");
        xml.into_bytes()
    }
}
