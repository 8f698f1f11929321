//! Plain-text tables for CLI output.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::service::{LoadStatus, LoadSummary, LoadedTable};

/// Cells wider than this are cut and end with `…`.
pub const MAX_CELL_WIDTH: usize = 48;

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| clean_cell(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| row.iter().map(|cell| clean_cell(cell)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    push_line(&mut output, &headers, &widths);
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    push_line(&mut output, &rule, &widths);
    for row in &rows {
        push_line(&mut output, row, &widths);
    }
    output
}

fn push_line<S: AsRef<str>>(output: &mut String, cells: &[S], widths: &[usize]) {
    let mut line = String::new();
    for (idx, &width) in widths.iter().enumerate() {
        let cell: &str = cells.get(idx).map_or("", |c| c.as_ref());
        if idx > 0 {
            line.push_str(" | ");
        }
        let _ = write!(line, "{cell:<width$}");
    }
    let _ = writeln!(output, "{}", line.trim_end());
}

/// Flattens control characters and truncates long values.
fn clean_cell(value: &str) -> Cow<'_, str> {
    let needs_flattening = value.contains(['\n', '\r', '\t']);
    let too_wide = value.chars().count() > MAX_CELL_WIDTH;
    if !needs_flattening && !too_wide {
        return Cow::Borrowed(value);
    }
    let mut cleaned = value
        .chars()
        .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
        .collect::<String>();
    if too_wide {
        cleaned = cleaned.chars().take(MAX_CELL_WIDTH - 1).collect();
        cleaned.push('…');
    }
    Cow::Owned(cleaned)
}

pub fn render_load_summary(summary: &LoadSummary) -> String {
    let rows = summary
        .items
        .iter()
        .map(|item| {
            vec![
                item.source.clone(),
                item.kind.as_str().to_string(),
                match item.status {
                    LoadStatus::Loaded => "loaded".to_string(),
                    LoadStatus::Failed => "failed".to_string(),
                },
                item.rows.to_string(),
                match &item.error {
                    Some(error) => error.clone(),
                    None => item.tables.join(", "),
                },
            ]
        })
        .collect::<Vec<_>>();
    let mut output = render_table(&["source", "kind", "status", "rows", "tables / error"], &rows);
    let _ = writeln!(
        output,
        "{} file(s): {} loaded, {} failed, {} row(s)",
        summary.files_processed, summary.succeeded, summary.failed, summary.total_rows
    );
    output
}

pub fn render_loaded_tables(tables: &[LoadedTable]) -> String {
    let rows = tables
        .iter()
        .map(|table| {
            vec![
                table.name.clone(),
                table
                    .rows
                    .map(|rows| rows.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                match &table.sheets {
                    Some(sheets) => format!("sheets: {}", sheets.join(", ")),
                    None => table.sample_columns.join(", "),
                },
            ]
        })
        .collect::<Vec<_>>();
    render_table(&["table", "rows", "columns"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_padded_and_trailing_space_trimmed() {
        let rendered = render_table(
            &["name", "rows"],
            &[
                vec!["vendas.csv".to_string(), "3".to_string()],
                vec!["a".to_string(), "120".to_string()],
            ],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "name       | rows");
        assert_eq!(lines[1], "---------- | ----");
        assert_eq!(lines[2], "vendas.csv | 3");
        assert_eq!(lines[3], "a          | 120");
    }

    #[test]
    fn long_and_multiline_cells_are_cleaned() {
        let long = "x".repeat(MAX_CELL_WIDTH + 10);
        let cleaned = clean_cell(&long);
        assert_eq!(cleaned.chars().count(), MAX_CELL_WIDTH);
        assert!(cleaned.ends_with('…'));
        assert_eq!(clean_cell("a\nb"), "a b");
    }

    #[test]
    fn short_rows_render_blank_cells() {
        let rendered = render_table(&["a", "b"], &[vec!["1".to_string()]]);
        assert_eq!(rendered.lines().nth(2), Some("1 |"));
    }
}
