//! CSV serialisation of row tables for re-upload.

use csv::{QuoteStyle, Terminator};

use crate::{data::RowTable, error::Result};

/// Renders `table` as CSV text.
///
/// The header is the union of keys across all rows in first-seen order, so
/// ragged rows keep every column; a missing cell becomes an empty field.
/// Fields are quoted only when they contain a comma, quote or line break.
/// The one exception is a single-column record whose cell is empty: it is
/// written as `""` so the reader does not drop it as a blank line.
/// Records are separated by `\n` with no trailing newline, and an empty table
/// renders as an empty string.
pub fn serialize_rows(table: &RowTable) -> Result<String> {
    let headers = table.all_columns();
    if table.is_empty() || headers.is_empty() {
        return Ok(String::new());
    }

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(b',')
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'));
    let mut writer = builder.from_writer(Vec::new());

    writer.write_record(&headers)?;
    for row in table.rows() {
        writer.write_record(headers.iter().map(|key| {
            row.get(key)
                .map(|value| value.as_display().into_owned())
                .unwrap_or_default()
        }))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Appends `.csv` unless the name already carries it.
pub fn csv_file_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.to_ascii_lowercase().ends_with(".csv") {
        trimmed.to_string()
    } else {
        format!("{trimmed}.csv")
    }
}
