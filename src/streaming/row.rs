//! Row encoding for sheet data

use super::shared_strings::SharedStrings;

/// Widest row a worksheet accepts (column XFD)
pub const MAX_COLUMNS: usize = 16_384;

/// Most rows a worksheet holds, header row included
pub const MAX_ROWS: u32 = 1_048_576;

/// Append one `<row>` element to `buffer`.
///
/// `row_index` is zero-based; the emitted `r` attribute is one-based. Every
/// non-empty cell becomes a shared string reference with an explicit cell
/// reference, so empty cells are simply left out without shifting the
/// columns that follow them.
pub fn encode_row<S: AsRef<str>>(
    row_index: u32,
    cells: &[S],
    strings: &mut SharedStrings,
    buffer: &mut Vec<u8>,
) {
    let mut num = itoa::Buffer::new();
    let row_number = row_index + 1;

    buffer.extend_from_slice(b"<row r=\"");
    buffer.extend_from_slice(num.format(row_number).as_bytes());
    buffer.extend_from_slice(b"\">");

    for (col_idx, value) in cells.iter().enumerate() {
        let value = value.as_ref();
        if value.is_empty() {
            continue;
        }
        let string_index = strings.add_string(value);

        buffer.extend_from_slice(b"<c r=\"");
        push_column_letter(buffer, col_idx as u32 + 1);
        buffer.extend_from_slice(num.format(row_number).as_bytes());
        buffer.extend_from_slice(b"\" t=\"s\"><v>");
        buffer.extend_from_slice(num.format(string_index).as_bytes());
        buffer.extend_from_slice(b"</v></c>");
    }

    buffer.extend_from_slice(b"</row>");
}

/// Column letters for a one-based column number (1 -> A, 27 -> AA)
pub fn column_name(col: u32) -> String {
    let mut buffer = Vec::with_capacity(3);
    push_column_letter(&mut buffer, col);
    buffer.into_iter().map(char::from).collect()
}

fn push_column_letter(buffer: &mut Vec<u8>, mut n: u32) {
    if n == 0 {
        return;
    }
    let mut tmp = [0u8; 10];
    let mut len = 0;
    while n > 0 {
        let rem = (n - 1) % 26;
        tmp[len] = b'A' + rem as u8;
        len += 1;
        n = (n - 1) / 26;
    }
    buffer.extend(tmp[..len].iter().rev());
}
