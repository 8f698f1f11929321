//! Maps user supplied table identifiers onto stored tables.
//!
//! Matching is ranked and deterministic; the first rule that produces a hit
//! wins, and within a rule stored names are tried in insertion order:
//!
//! 1. exact name
//! 2. a stored name containing the identifier (case-insensitive)
//! 3. a stored name whose base (text before the first `_`, or the whole
//!    name) appears in the identifier
//! 4. the identifier with a `.xlsx`/`.xls` suffix removed, retried against
//!    rules 1 and 2
//!
//! A hit on a workbook bundle unwraps to its only sheet, or fails with
//! [`TableError::AmbiguousTable`] when it has several.

use std::sync::Arc;

use log::debug;

use crate::{
    data::RowTable,
    error::{Result, TableError},
    store::{TableEntry, TableStore, sheet_table_name},
};

const SPREADSHEET_SUFFIXES: &[&str] = &[".xlsx", ".xls"];

#[derive(Debug, Clone)]
pub struct ResolvedTable {
    /// Name of the table that was actually selected.
    pub name: String,
    pub table: Arc<RowTable>,
}

pub fn resolve_table(store: &TableStore, identifier: &str) -> Result<ResolvedTable> {
    let identifier = identifier.trim();
    let matched = find_entry_name(store, identifier).ok_or_else(|| not_found(store, identifier))?;
    if matched != identifier {
        debug!("Resolved table '{identifier}' to '{matched}'");
    }
    unwrap_entry(store, &matched)
}

/// Exact lookup only, still unwrapping single-sheet bundles.
pub fn resolve_exact(store: &TableStore, name: &str) -> Option<Result<ResolvedTable>> {
    store.get(name)?;
    Some(unwrap_entry(store, name))
}

fn find_entry_name(store: &TableStore, identifier: &str) -> Option<String> {
    if identifier.is_empty() {
        return None;
    }
    if store.get(identifier).is_some() {
        return Some(identifier.to_string());
    }
    let names = store.list_names();
    let lowered = identifier.to_lowercase();
    if let Some(found) = names
        .iter()
        .find(|name| name.to_lowercase().contains(&lowered))
    {
        return Some(found.clone());
    }
    if let Some(found) = names.iter().find(|name| {
        base_name(name)
            .map(|base| lowered.contains(&base.to_lowercase()))
            .unwrap_or(false)
    }) {
        return Some(found.clone());
    }
    let stripped = strip_spreadsheet_suffix(identifier)?;
    if stripped.is_empty() {
        return None;
    }
    if store.get(stripped).is_some() {
        return Some(stripped.to_string());
    }
    let lowered = stripped.to_lowercase();
    names
        .into_iter()
        .find(|name| name.to_lowercase().contains(&lowered))
}

fn base_name(name: &str) -> Option<&str> {
    name.split('_').next().filter(|base| !base.is_empty())
}

fn strip_spreadsheet_suffix(identifier: &str) -> Option<&str> {
    let lowered = identifier.to_ascii_lowercase();
    SPREADSHEET_SUFFIXES
        .iter()
        .find(|suffix| lowered.ends_with(*suffix))
        .map(|suffix| &identifier[..identifier.len() - suffix.len()])
}

fn unwrap_entry(store: &TableStore, name: &str) -> Result<ResolvedTable> {
    match store.get(name) {
        Some(TableEntry::Rows(table)) => Ok(ResolvedTable {
            name: name.to_string(),
            table: Arc::clone(table),
        }),
        Some(TableEntry::Sheets(bundle)) => {
            let mut sheets = bundle.sheets();
            match (sheets.next(), sheets.next()) {
                (Some((sheet, table)), None) => Ok(ResolvedTable {
                    name: sheet_table_name(name, sheet),
                    table: Arc::clone(table),
                }),
                (None, _) => Err(TableError::EmptyTable(name.to_string())),
                _ => Err(TableError::AmbiguousTable {
                    name: name.to_string(),
                    candidates: bundle
                        .sheet_names()
                        .iter()
                        .map(|sheet| sheet_table_name(name, sheet))
                        .collect(),
                }),
            }
        }
        None => Err(not_found(store, name)),
    }
}

fn not_found(store: &TableStore, identifier: &str) -> TableError {
    TableError::TableNotFound {
        name: identifier.to_string(),
        available: store.list_names(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{Row, SheetBundle, Value},
        store::Decoded,
    };

    fn rows(count: usize) -> RowTable {
        RowTable::new(
            (0..count)
                .map(|idx| {
                    let mut row = Row::new();
                    row.insert("n".into(), Value::Number(idx as f64));
                    row
                })
                .collect(),
        )
    }

    #[test]
    fn base_name_requires_non_empty_prefix() {
        assert_eq!(base_name("nfe_itens.csv"), Some("nfe"));
        assert_eq!(base_name("_hidden"), None);
        assert_eq!(base_name("orders.csv"), Some("orders.csv"));
    }

    #[test]
    fn strip_suffix_is_case_insensitive() {
        assert_eq!(strip_spreadsheet_suffix("Report.XLSX"), Some("Report"));
        assert_eq!(strip_spreadsheet_suffix("old.xls"), Some("old"));
        assert_eq!(strip_spreadsheet_suffix("orders.csv"), None);
    }

    #[test]
    fn single_sheet_bundle_resolves_to_qualified_sheet() {
        let mut bundle = SheetBundle::new();
        bundle.insert("Plan1", rows(4));
        let mut store = TableStore::new();
        store.register("vendas.xlsx", Decoded::Sheets(bundle));

        let resolved = resolve_table(&store, "vendas.xlsx").expect("resolved");
        assert_eq!(resolved.name, "vendas.xlsx_Plan1");
        assert_eq!(resolved.table.len(), 4);
    }

    #[test]
    fn empty_identifier_is_not_found() {
        let mut store = TableStore::new();
        store.insert("orders.csv", rows(1));
        let err = resolve_table(&store, "  ").unwrap_err();
        assert!(matches!(err, TableError::TableNotFound { .. }));
    }

    #[test]
    fn exact_resolution_ignores_fuzzy_matches() {
        let mut store = TableStore::new();
        store.insert("nfe_cabecalho.csv", rows(2));
        assert!(resolve_exact(&store, "nfe_itens.csv").is_none());
        assert!(resolve_table(&store, "nfe_itens.csv").is_ok());
    }
}
