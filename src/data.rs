//! Row-level data model shared by the store, the query engine and the codecs.
//!
//! A [`RowTable`] is an ordered list of [`Row`]s. Each row maps a normalised
//! column key to a scalar [`Value`]. Rows inside one table usually share the
//! same key set, but decoding is lenient, so a missing key is always treated
//! as an absent (null) cell rather than an error.

use std::{borrow::Cow, fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

pub type Row = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    String(String),
    /// ISO-8601 date or datetime, kept as text.
    Date(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual form used for grouping, filtering and CSV output. Null renders
    /// as the empty string.
    pub fn as_display(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Number(n) => Cow::Owned(format_number(*n)),
            Value::String(s) | Value::Date(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Lenient numeric view of the value. Anything that does not parse is
    /// `None`; aggregate callers turn that into zero.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Number(n) => n.is_finite().then_some(*n),
            Value::String(s) | Value::Date(s) => parse_number(s),
        }
    }

    /// Empty or whitespace-only text is null.
    pub fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Value::Null
        } else {
            Value::String(raw.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_display())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::String(b.to_string()),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

/// Number of the value at `column`, treating missing or unparseable cells as 0.
pub fn numeric_or_zero(row: &Row, column: &str) -> f64 {
    row.get(column).and_then(Value::as_number).unwrap_or(0.0)
}

/// Display form of the value at `column`; a missing key reads as empty.
pub fn display_of<'a>(row: &'a Row, column: &str) -> Cow<'a, str> {
    row.get(column)
        .map(Value::as_display)
        .unwrap_or(Cow::Borrowed(""))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RowTable {
    rows: Vec<Row>,
}

impl RowTable {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Keys of the first row, in the order they were encountered.
    pub fn columns(&self) -> Vec<String> {
        self.first_row()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Union of keys over every row, in first-seen order.
    pub fn all_columns(&self) -> Vec<String> {
        let mut seen = IndexSet::new();
        for row in &self.rows {
            for key in row.keys() {
                if !seen.contains(key.as_str()) {
                    seen.insert(key.clone());
                }
            }
        }
        seen.into_iter().collect()
    }
}

impl From<Vec<Row>> for RowTable {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

/// Sheets decoded from one workbook, keyed by sheet name in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetBundle {
    sheets: IndexMap<String, Arc<RowTable>>,
}

impl SheetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sheet: impl Into<String>, table: RowTable) {
        self.sheets.insert(sheet.into(), Arc::new(table));
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }

    pub fn sheets(&self) -> impl Iterator<Item = (&str, &Arc<RowTable>)> {
        self.sheets.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn total_rows(&self) -> usize {
        self.sheets.values().map(|table| table.len()).sum()
    }
}

/// Normalises a raw header into a column key: trimmed, lower-cased, runs of
/// whitespace collapsed to `_`, Latin accents folded to ASCII and any other
/// non-word character dropped.
pub fn normalize_column_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_gap = false;
    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            pending_gap = true;
            continue;
        }
        if pending_gap {
            normalized.push('_');
            pending_gap = false;
        }
        for lowered in ch.to_lowercase() {
            let folded = fold_accent(lowered);
            if folded.is_ascii_alphanumeric() || folded == '_' {
                normalized.push(folded);
            }
        }
    }
    normalized
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Parses plain (`1234.5`) and Brazilian (`1.234,56`, `12,5`) decimal text.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = trimmed.parse::<f64>() {
        return parsed.is_finite().then_some(parsed);
    }
    if !trimmed.contains(',') {
        return None;
    }
    let localized = trimmed.replace('.', "").replace(',', ".");
    localized
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn normalize_column_name_folds_and_strips() {
        assert_eq!(normalize_column_name("  Valor Total  "), "valor_total");
        assert_eq!(normalize_column_name("UF\tEmitente"), "uf_emitente");
        assert_eq!(
            normalize_column_name("Descrição do Produto/Serviço"),
            "descricao_do_produtoservico"
        );
        assert_eq!(normalize_column_name("Valor (R$)"), "valor_r");
    }

    #[test]
    fn parse_number_accepts_localized_decimals() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number(" 7 "), Some(7.0));
        assert_eq!(parse_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_number("12,5"), Some(12.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn value_display_trims_integral_numbers() {
        assert_eq!(Value::Number(3.0).as_display(), "3");
        assert_eq!(Value::Number(2.5).as_display(), "2.5");
        assert_eq!(Value::Null.as_display(), "");
    }

    #[test]
    fn all_columns_unions_ragged_rows() {
        let table = RowTable::new(vec![
            row(&[("a", Value::Number(1.0))]),
            row(&[("b", Value::Null), ("a", Value::Null)]),
            row(&[("c", Value::from_text("x"))]),
        ]);
        assert_eq!(table.columns(), vec!["a"]);
        assert_eq!(table.all_columns(), vec!["a", "b", "c"]);
    }

    #[test]
    fn json_values_convert_to_scalars() {
        assert_eq!(Value::from(serde_json::json!(null)), Value::Null);
        assert_eq!(Value::from(serde_json::json!(4)), Value::Number(4.0));
        assert_eq!(
            Value::from(serde_json::json!(true)),
            Value::String("true".into())
        );
    }
}
