//! Workbook skeleton rendering
//!
//! A [`WorkbookTemplate`] turns the registered sheets into every part of an
//! empty workbook: static metadata plus one sheet document per sheet holding
//! just its header row. The builder writes the metadata verbatim and cuts
//! each sheet document at `</sheetData>` so rows can be streamed in between.

use super::row::encode_row;
use super::shared_strings::SharedStrings;
use super::xml_writer::XmlWriter;
use crate::config::StreamOptions;
use crate::error::Result;
use chrono::{SecondsFormat, Utc};

/// Sheet documents live at `xl/worksheets/sheet<N>.xml`, N starting at 1
pub const SHEET_PATH_PREFIX: &str = "xl/worksheets/sheet";
pub const SHEET_PATH_SUFFIX: &str = ".xml";

/// Closing tag of the data section; rows are inserted right before it
pub const END_SHEET_DATA_TAG: &str = "</sheetData>";

const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// A sheet as registered with the builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSpec {
    pub name: String,
    pub headers: Vec<String>,
}

/// One rendered archive part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePart {
    pub path: String,
    pub content: Vec<u8>,
}

impl TemplatePart {
    fn new(path: impl Into<String>, content: Vec<u8>) -> Self {
        TemplatePart {
            path: path.into(),
            content,
        }
    }
}

/// Archive path of the sheet with the given 1-based index
pub fn sheet_path(index: usize) -> String {
    format!("{SHEET_PATH_PREFIX}{index}{SHEET_PATH_SUFFIX}")
}

/// Renders the parts of an empty workbook
pub trait WorkbookTemplate {
    /// Render every part for `sheets`, in the order they should be written.
    ///
    /// Sheet documents must use [`sheet_path`] with the sheet's 1-based
    /// position and contain exactly one [`END_SHEET_DATA_TAG`]. Header text
    /// is interned into `strings`. The shared strings part itself must not be
    /// rendered; it is written when the stream is closed.
    fn render(&self, sheets: &[SheetSpec], strings: &mut SharedStrings)
        -> Result<Vec<TemplatePart>>;
}

/// SpreadsheetML template with a single default cell style
#[derive(Debug, Clone, Default)]
pub struct DefaultTemplate {
    options: StreamOptions,
}

impl DefaultTemplate {
    pub fn new(options: StreamOptions) -> Self {
        DefaultTemplate { options }
    }

    fn content_types(&self, sheet_count: usize) -> Vec<u8> {
        let mut xml = XmlWriter::new();
        xml.declaration()
            .start_element("Types")
            .attribute(
                "xmlns",
                "http://schemas.openxmlformats.org/package/2006/content-types",
            )
            .close_start_tag();
        xml.start_element("Default")
            .attribute("Extension", "rels")
            .attribute(
                "ContentType",
                "application/vnd.openxmlformats-package.relationships+xml",
            )
            .close_empty();
        xml.start_element("Default")
            .attribute("Extension", "xml")
            .attribute("ContentType", "application/xml")
            .close_empty();

        let overrides = [
            (
                "/xl/workbook.xml",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
            ),
            (
                "/xl/styles.xml",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
            ),
            (
                "/xl/sharedStrings.xml",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml",
            ),
            (
                "/docProps/core.xml",
                "application/vnd.openxmlformats-package.core-properties+xml",
            ),
            (
                "/docProps/app.xml",
                "application/vnd.openxmlformats-officedocument.extended-properties+xml",
            ),
        ];
        for (part, content_type) in overrides {
            xml.start_element("Override")
                .attribute("PartName", part)
                .attribute("ContentType", content_type)
                .close_empty();
        }
        for index in 1..=sheet_count {
            xml.start_element("Override")
                .attribute("PartName", &format!("/{}", sheet_path(index)))
                .attribute(
                    "ContentType",
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
                )
                .close_empty();
        }
        xml.end_element("Types");
        xml.into_bytes()
    }

    fn root_rels(&self) -> Vec<u8> {
        let mut xml = XmlWriter::new();
        xml.declaration()
            .start_element("Relationships")
            .attribute("xmlns", PACKAGE_RELS_NS)
            .close_start_tag();
        let rels = [
            (
                "rId1",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument",
                "xl/workbook.xml",
            ),
            (
                "rId2",
                "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
                "docProps/core.xml",
            ),
            (
                "rId3",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties",
                "docProps/app.xml",
            ),
        ];
        for (id, rel_type, target) in rels {
            relationship(&mut xml, id, rel_type, target);
        }
        xml.end_element("Relationships");
        xml.into_bytes()
    }

    fn app_props(&self, sheets: &[SheetSpec]) -> Vec<u8> {
        let mut xml = XmlWriter::new();
        xml.declaration()
            .start_element("Properties")
            .attribute(
                "xmlns",
                "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties",
            )
            .attribute(
                "xmlns:vt",
                "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes",
            )
            .close_start_tag();
        xml.text_element("Application", &self.options.application);
        xml.text_element("DocSecurity", "0");

        xml.start_element("TitlesOfParts").close_start_tag();
        xml.start_element("vt:vector")
            .attribute_int("size", sheets.len() as u64)
            .attribute("baseType", "lpstr")
            .close_start_tag();
        for sheet in sheets {
            xml.text_element("vt:lpstr", &sheet.name);
        }
        xml.end_element("vt:vector").end_element("TitlesOfParts");

        xml.end_element("Properties");
        xml.into_bytes()
    }

    fn core_props(&self) -> Vec<u8> {
        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut xml = XmlWriter::new();
        xml.declaration()
            .start_element("cp:coreProperties")
            .attribute(
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            )
            .attribute("xmlns:dc", "http://purl.org/dc/elements/1.1/")
            .attribute("xmlns:dcterms", "http://purl.org/dc/terms/")
            .attribute("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance")
            .close_start_tag();
        xml.text_element("dc:creator", &self.options.creator);
        for tag in ["dcterms:created", "dcterms:modified"] {
            xml.start_element(tag)
                .attribute("xsi:type", "dcterms:W3CDTF")
                .close_start_tag()
                .raw(&created)
                .end_element(tag);
        }
        xml.end_element("cp:coreProperties");
        xml.into_bytes()
    }

    fn workbook(&self, sheets: &[SheetSpec]) -> Vec<u8> {
        let mut xml = XmlWriter::new();
        xml.declaration()
            .start_element("workbook")
            .attribute("xmlns", SPREADSHEETML_NS)
            .attribute("xmlns:r", RELATIONSHIPS_NS)
            .close_start_tag();
        xml.start_element("sheets").close_start_tag();
        for (i, sheet) in sheets.iter().enumerate() {
            let id = (i + 1) as u64;
            xml.start_element("sheet")
                .attribute("name", &sheet.name)
                .attribute_int("sheetId", id)
                .attribute("r:id", &format!("rId{id}"))
                .close_empty();
        }
        xml.end_element("sheets").end_element("workbook");
        xml.into_bytes()
    }

    fn workbook_rels(&self, sheet_count: usize) -> Vec<u8> {
        let mut xml = XmlWriter::new();
        xml.declaration()
            .start_element("Relationships")
            .attribute("xmlns", PACKAGE_RELS_NS)
            .close_start_tag();
        for index in 1..=sheet_count {
            relationship(
                &mut xml,
                &format!("rId{index}"),
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet",
                &format!("worksheets/sheet{index}.xml"),
            );
        }
        relationship(
            &mut xml,
            &format!("rId{}", sheet_count + 1),
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
            "styles.xml",
        );
        relationship(
            &mut xml,
            &format!("rId{}", sheet_count + 2),
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings",
            "sharedStrings.xml",
        );
        xml.end_element("Relationships");
        xml.into_bytes()
    }

    fn styles(&self) -> Vec<u8> {
        let mut xml = XmlWriter::new();
        xml.declaration().raw(concat!(
            r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
            r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#,
            r#"<fills count="2"><fill><patternFill patternType="none"/></fill>"#,
            r#"<fill><patternFill patternType="gray125"/></fill></fills>"#,
            r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
            r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
            r#"</styleSheet>"#,
        ));
        xml.into_bytes()
    }

    fn sheet(&self, sheet: &SheetSpec, strings: &mut SharedStrings) -> Vec<u8> {
        let mut xml = XmlWriter::new();
        xml.declaration()
            .start_element("worksheet")
            .attribute("xmlns", SPREADSHEETML_NS)
            .attribute("xmlns:r", RELATIONSHIPS_NS)
            .close_start_tag();
        xml.start_element("sheetFormatPr")
            .attribute("defaultRowHeight", "15")
            .close_empty();
        xml.start_element("sheetData").close_start_tag();

        let mut header = Vec::with_capacity(64 * sheet.headers.len().max(1));
        encode_row(0, &sheet.headers, strings, &mut header);
        xml.bytes(&header);

        xml.raw(END_SHEET_DATA_TAG);
        xml.start_element("pageMargins")
            .attribute("left", "0.7")
            .attribute("right", "0.7")
            .attribute("top", "0.75")
            .attribute("bottom", "0.75")
            .attribute("header", "0.3")
            .attribute("footer", "0.3")
            .close_empty();
        xml.end_element("worksheet");
        xml.into_bytes()
    }
}

impl WorkbookTemplate for DefaultTemplate {
    fn render(
        &self,
        sheets: &[SheetSpec],
        strings: &mut SharedStrings,
    ) -> Result<Vec<TemplatePart>> {
        let mut parts = Vec::with_capacity(7 + sheets.len());
        parts.push(TemplatePart::new(
            "[Content_Types].xml",
            self.content_types(sheets.len()),
        ));
        parts.push(TemplatePart::new("_rels/.rels", self.root_rels()));
        parts.push(TemplatePart::new("docProps/app.xml", self.app_props(sheets)));
        parts.push(TemplatePart::new("docProps/core.xml", self.core_props()));
        parts.push(TemplatePart::new("xl/workbook.xml", self.workbook(sheets)));
        parts.push(TemplatePart::new(
            "xl/_rels/workbook.xml.rels",
            self.workbook_rels(sheets.len()),
        ));
        parts.push(TemplatePart::new("xl/styles.xml", self.styles()));

        for (i, sheet) in sheets.iter().enumerate() {
            parts.push(TemplatePart::new(
                sheet_path(i + 1),
                self.sheet(sheet, strings),
            ));
        }
        Ok(parts)
    }
}

fn relationship(xml: &mut XmlWriter, id: &str, rel_type: &str, target: &str) {
    xml.start_element("Relationship")
        .attribute("Id", id)
        .attribute("Type", rel_type)
        .attribute("Target", target)
        .close_empty();
}
