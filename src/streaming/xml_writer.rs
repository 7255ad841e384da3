//! Small XML writer for the documents rendered in memory

/// Append `text` to `buffer` with XML escaping.
///
/// Characters that XML 1.0 cannot carry (C0 controls other than tab, LF and
/// CR, plus U+FFFE and U+FFFF) become U+FFFD. CR is written as `&#xD;` so
/// parsers do not fold it into LF.
pub fn escape_into(buffer: &mut Vec<u8>, text: &str) {
    escape(buffer, text, false)
}

/// Like [`escape_into`], for attribute values: tab and LF are also written
/// as character references, which survive attribute value normalization
fn escape_attribute_into(buffer: &mut Vec<u8>, text: &str) {
    escape(buffer, text, true)
}

fn escape(buffer: &mut Vec<u8>, text: &str, in_attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => buffer.extend_from_slice(b"&amp;"),
            '<' => buffer.extend_from_slice(b"&lt;"),
            '>' => buffer.extend_from_slice(b"&gt;"),
            '"' => buffer.extend_from_slice(b"&quot;"),
            '\'' => buffer.extend_from_slice(b"&apos;"),
            '\r' => buffer.extend_from_slice(b"&#xD;"),
            '\t' if in_attribute => buffer.extend_from_slice(b"&#x9;"),
            '\n' if in_attribute => buffer.extend_from_slice(b"&#xA;"),
            '\t' | '\n' => buffer.push(c as u8),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                buffer.extend_from_slice("\u{FFFD}".as_bytes())
            }
            c if c.is_ascii() => buffer.push(c as u8),
            _ => {
                let mut buf = [0; 4];
                buffer.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

/// XML writer that accumulates output in memory
///
/// The writer never fails: it targets a `Vec<u8>` and the finished bytes are
/// taken with [`XmlWriter::into_bytes`].
pub struct XmlWriter {
    buffer: Vec<u8>,
}

impl XmlWriter {
    pub fn new() -> Self {
        XmlWriter {
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Standard `standalone="yes"` declaration followed by a newline
    pub fn declaration(&mut self) -> &mut Self {
        self.raw("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")
    }

    #[inline]
    pub fn raw(&mut self, s: &str) -> &mut Self {
        self.buffer.extend_from_slice(s.as_bytes());
        self
    }

    /// Open a start tag: `<name`
    #[inline]
    pub fn start_element(&mut self, name: &str) -> &mut Self {
        self.buffer.push(b'<');
        self.raw(name)
    }

    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> &mut Self {
        self.buffer.push(b' ');
        self.raw(name);
        self.buffer.extend_from_slice(b"=\"");
        escape_attribute_into(&mut self.buffer, value);
        self.buffer.push(b'"');
        self
    }

    #[inline]
    pub fn attribute_int(&mut self, name: &str, value: u64) -> &mut Self {
        let mut num = itoa::Buffer::new();
        self.buffer.push(b' ');
        self.raw(name);
        self.buffer.extend_from_slice(b"=\"");
        self.buffer.extend_from_slice(num.format(value).as_bytes());
        self.buffer.push(b'"');
        self
    }

    /// Finish a start tag: `>`
    #[inline]
    pub fn close_start_tag(&mut self) -> &mut Self {
        self.buffer.push(b'>');
        self
    }

    /// Finish a start tag as an empty element: `/>`
    #[inline]
    pub fn close_empty(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(b"/>");
        self
    }

    #[inline]
    pub fn end_element(&mut self, name: &str) -> &mut Self {
        self.buffer.extend_from_slice(b"</");
        self.raw(name);
        self.buffer.push(b'>');
        self
    }

    /// `<name>text</name>` with escaped text
    pub fn text_element(&mut self, name: &str, text: &str) -> &mut Self {
        self.start_element(name).close_start_tag();
        self.escaped(text);
        self.end_element(name)
    }

    #[inline]
    pub fn escaped(&mut self, text: &str) -> &mut Self {
        escape_into(&mut self.buffer, text);
        self
    }

    /// Append pre-encoded markup
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(data);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_writer() {
        let mut writer = XmlWriter::new();
        writer
            .start_element("root")
            .attribute("attr", "value")
            .attribute_int("count", 3)
            .close_start_tag()
            .raw("content")
            .end_element("root");

        assert_eq!(
            String::from_utf8(writer.into_bytes()).unwrap(),
            "<root attr=\"value\" count=\"3\">content</root>"
        );
    }

    #[test]
    fn test_xml_escaping() {
        let mut out = Vec::new();
        escape_into(&mut out, "<test>&value</test> \"q\" 'a'");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "&lt;test&gt;&amp;value&lt;/test&gt; &quot;q&quot; &apos;a&apos;"
        );
    }

    #[test]
    fn test_escaping_keeps_unicode_and_whitespace() {
        let mut out = Vec::new();
        escape_into(&mut out, "Tiếng Việt\tline\nnext");
        assert_eq!(String::from_utf8(out).unwrap(), "Tiếng Việt\tline\nnext");
    }

    #[test]
    fn test_carriage_return_escaped() {
        let mut out = Vec::new();
        escape_into(&mut out, "a\r\nb");
        assert_eq!(String::from_utf8(out).unwrap(), "a&#xD;\nb");
    }

    #[test]
    fn test_attribute_whitespace_escaped() {
        let mut writer = XmlWriter::new();
        writer
            .start_element("sheet")
            .attribute("name", "a\tb\nc\rd")
            .close_empty();
        let xml = String::from_utf8(writer.into_bytes()).unwrap();
        assert_eq!(xml, "<sheet name=\"a&#x9;b&#xA;c&#xD;d\"/>");

        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(doc.root_element().attribute("name"), Some("a\tb\nc\rd"));
    }

    #[test]
    fn test_invalid_xml_chars_replaced() {
        let mut out = Vec::new();
        escape_into(&mut out, "a\u{0}b\u{1b}c");
        assert_eq!(String::from_utf8(out).unwrap(), "a\u{FFFD}b\u{FFFD}c");
    }
}
