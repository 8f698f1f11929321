//! Decoding of delimited text and spreadsheet bytes into row tables.
//!
//! - **Text** (`.csv`, `.tsv`, `.txt`): UTF-8 with BOM removal, falling back
//!   to Windows-1252 when the bytes are not valid UTF-8. The delimiter is
//!   tab for `.tsv` and otherwise sniffed from the header line.
//! - **Spreadsheets** (`.xlsx`, `.xls`): every sheet with a header row becomes
//!   its own table inside a [`SheetBundle`].
//!
//! Header cells are normalised with [`normalize_column_name`]; duplicates get
//! a numeric suffix so no column is silently dropped.

use std::{borrow::Cow, collections::HashSet, io::Cursor};

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDate, TimeDelta};
use encoding_rs::{UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Row, RowTable, SheetBundle, Value, normalize_column_name},
    store::Decoded,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
const SNIFFED_DELIMITERS: &[u8] = b",;\t|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Csv,
    Tsv,
    Txt,
    Xlsx,
    Xls,
}

impl SourceKind {
    /// Kind implied by the extension of `name`, if it is a table source.
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, extension) = name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(SourceKind::Csv),
            "tsv" => Some(SourceKind::Tsv),
            "txt" => Some(SourceKind::Txt),
            "xlsx" => Some(SourceKind::Xlsx),
            "xls" => Some(SourceKind::Xls),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Csv => "csv",
            SourceKind::Tsv => "tsv",
            SourceKind::Txt => "txt",
            SourceKind::Xlsx => "xlsx",
            SourceKind::Xls => "xls",
        }
    }

    pub fn is_spreadsheet(self) -> bool {
        matches!(self, SourceKind::Xlsx | SourceKind::Xls)
    }
}

pub trait TableDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], kind: SourceKind) -> Result<Decoded>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl TableDecoder for FileDecoder {
    fn decode(&self, bytes: &[u8], kind: SourceKind) -> Result<Decoded> {
        if kind.is_spreadsheet() {
            decode_workbook(bytes).map(Decoded::Sheets)
        } else {
            decode_delimited(bytes, kind).map(Decoded::Rows)
        }
    }
}

pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if had_errors {
        WINDOWS_1252.decode_with_bom_removal(bytes).0
    } else {
        text
    }
}

/// Most frequent candidate delimiter in the header line; ties and headers
/// without any candidate fall back to a comma.
pub fn sniff_delimiter(text: &str, kind: SourceKind) -> u8 {
    if kind == SourceKind::Tsv {
        return DEFAULT_TSV_DELIMITER;
    }
    let header = text.lines().next().unwrap_or("");
    let mut best = DEFAULT_CSV_DELIMITER;
    let mut best_count = 0;
    for &candidate in SNIFFED_DELIMITERS {
        let count = header.bytes().filter(|byte| *byte == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

pub fn open_csv_reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(text.as_bytes())
}

pub fn decode_delimited(bytes: &[u8], kind: SourceKind) -> Result<RowTable> {
    let text = decode_text(bytes);
    let delimiter = sniff_delimiter(&text, kind);
    let mut reader = open_csv_reader(&text, delimiter);
    let headers = unique_headers(reader.headers().context("Reading header row")?.iter());

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(key, field)| (key.clone(), Value::from_text(field)))
            .collect::<Row>();
        rows.push(row);
    }
    Ok(RowTable::new(rows))
}

pub fn decode_workbook(bytes: &[u8]) -> Result<SheetBundle> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|err| anyhow!("Opening workbook: {err}"))?;
    let mut bundle = SheetBundle::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|err| anyhow!("Reading sheet '{sheet}': {err}"))?;
        let mut sheet_rows = range
            .rows()
            .filter(|cells| cells.iter().any(|cell| !matches!(cell, Data::Empty)));
        let Some(header_cells) = sheet_rows.next() else {
            continue;
        };
        let headers = unique_headers(header_cells.iter().map(|cell| cell.to_string()));
        let rows = sheet_rows
            .map(|cells| {
                headers
                    .iter()
                    .zip(cells.iter())
                    .map(|(key, cell)| (key.clone(), cell_value(cell)))
                    .collect::<Row>()
            })
            .collect::<Vec<_>>();
        bundle.insert(sheet, RowTable::new(rows));
    }
    Ok(bundle)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => Value::from_text(s),
        Data::Float(f) => Value::Number(*f),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Bool(b) => Value::String(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_iso(dt.as_f64())
            .map(Value::Date)
            .unwrap_or(Value::Number(dt.as_f64())),
        Data::DateTimeIso(s) => Value::Date(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
    }
}

/// Converts an Excel serial date (days since 1899-12-30) to ISO-8601. Whole
/// days render as `YYYY-MM-DD`.
pub fn excel_serial_to_iso(serial: f64) -> Option<String> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let moment = epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
    if serial.fract() == 0.0 {
        Some(moment.format("%Y-%m-%d").to_string())
    } else {
        Some(moment.format("%Y-%m-%dT%H:%M:%S").to_string())
    }
}

fn unique_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let mut name = normalize_column_name(header.as_ref());
            if name.is_empty() {
                name = format!("column_{}", idx + 1);
            }
            let mut candidate = name.clone();
            let mut suffix = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{name}_{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}
