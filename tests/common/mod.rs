//! Helpers for reading streamed workbooks back

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read};

pub struct Workbook {
    archive: zip::ZipArchive<Cursor<Vec<u8>>>,
}

/// One parsed `<row>`: its `r` attribute and `(cell ref, text)` pairs
#[derive(Debug, PartialEq)]
pub struct RowData {
    pub number: u32,
    pub cells: Vec<(String, String)>,
}

impl Workbook {
    pub fn open(bytes: Vec<u8>) -> Self {
        Workbook {
            archive: zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip archive"),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub fn text(&mut self, name: &str) -> String {
        let mut file = self
            .archive
            .by_name(name)
            .unwrap_or_else(|_| panic!("missing entry {name}"));
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    pub fn compression(&mut self, name: &str) -> zip::CompressionMethod {
        self.archive.by_name(name).unwrap().compression()
    }

    pub fn shared_strings(&mut self) -> Vec<String> {
        let xml = self.text("xl/sharedStrings.xml");
        let doc = roxmltree::Document::parse(&xml).expect("well-formed sharedStrings.xml");
        doc.descendants()
            .filter(|n| n.has_tag_name("si"))
            .map(|si| {
                si.descendants()
                    .filter(|n| n.has_tag_name("t"))
                    .filter_map(|t| t.text())
                    .collect::<String>()
            })
            .collect()
    }

    /// Rows of a sheet with shared string references resolved
    pub fn rows(&mut self, sheet_index: usize) -> Vec<RowData> {
        let strings = self.shared_strings();
        let xml = self.text(&format!("xl/worksheets/sheet{sheet_index}.xml"));
        let doc = roxmltree::Document::parse(&xml).expect("well-formed sheet");

        doc.descendants()
            .filter(|n| n.has_tag_name("row"))
            .map(|row| RowData {
                number: row.attribute("r").unwrap().parse().unwrap(),
                cells: row
                    .children()
                    .filter(|n| n.has_tag_name("c"))
                    .map(|c| {
                        let reference = c.attribute("r").unwrap().to_string();
                        assert_eq!(c.attribute("t"), Some("s"));
                        let v = c
                            .children()
                            .find(|n| n.has_tag_name("v"))
                            .and_then(|v| v.text())
                            .unwrap();
                        let index: usize = v.parse().unwrap();
                        (reference, strings[index].clone())
                    })
                    .collect(),
            })
            .collect()
    }

    /// Sheet names from `xl/workbook.xml`, in order
    pub fn sheet_names(&mut self) -> Vec<String> {
        let xml = self.text("xl/workbook.xml");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        doc.descendants()
            .filter(|n| n.has_tag_name("sheet"))
            .map(|n| n.attribute("name").unwrap().to_string())
            .collect()
    }
}

/// Flatten rows into `ref -> text`
pub fn cell_map(rows: &[RowData]) -> HashMap<String, String> {
    rows.iter()
        .flat_map(|row| row.cells.iter().cloned())
        .collect()
}
