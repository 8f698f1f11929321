//! In-memory table namespace.
//!
//! The store maps table names to either a flat [`RowTable`] or a
//! [`SheetBundle`]. Names keep their insertion order so listings are stable.
//! Re-registering a name replaces the previous value in place.

use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use crate::data::{RowTable, SheetBundle};

#[derive(Debug, Clone)]
pub enum TableEntry {
    Rows(Arc<RowTable>),
    Sheets(SheetBundle),
}

impl TableEntry {
    /// Flat tables are queryable; a bundle only when it wraps a single sheet.
    pub fn is_queryable(&self) -> bool {
        match self {
            TableEntry::Rows(_) => true,
            TableEntry::Sheets(bundle) => bundle.len() == 1,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            TableEntry::Rows(table) => table.len(),
            TableEntry::Sheets(bundle) => bundle.total_rows(),
        }
    }
}

impl From<RowTable> for TableEntry {
    fn from(table: RowTable) -> Self {
        TableEntry::Rows(Arc::new(table))
    }
}

impl From<SheetBundle> for TableEntry {
    fn from(bundle: SheetBundle) -> Self {
        TableEntry::Sheets(bundle)
    }
}

/// Output of decoding one source file.
#[derive(Debug, Clone)]
pub enum Decoded {
    Rows(RowTable),
    Sheets(SheetBundle),
}

impl Decoded {
    pub fn row_count(&self) -> usize {
        match self {
            Decoded::Rows(table) => table.len(),
            Decoded::Sheets(bundle) => bundle.total_rows(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TableStore {
    entries: IndexMap<String, TableEntry>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`, returning the replaced entry.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        entry: impl Into<TableEntry>,
    ) -> Option<TableEntry> {
        let name = name.into();
        let previous = self.entries.insert(name.clone(), entry.into());
        if previous.is_some() {
            debug!("Replaced table '{name}'");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&TableEntry> {
        self.entries.get(name)
    }

    pub fn list_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &TableEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a decoded source under `base` and returns the names created.
    ///
    /// Flat sources land under `base` alone. Workbooks register `base` for the
    /// whole bundle, followed by one `base_<sheet>` entry per sheet.
    pub fn register(&mut self, base: &str, decoded: Decoded) -> Vec<String> {
        match decoded {
            Decoded::Rows(table) => {
                self.insert(base, table);
                vec![base.to_string()]
            }
            Decoded::Sheets(bundle) => {
                // sheet entries share row data with the bundle entry
                let sheets = bundle
                    .sheets()
                    .map(|(sheet, table)| (sheet_table_name(base, sheet), Arc::clone(table)))
                    .collect::<Vec<_>>();
                self.insert(base, bundle);
                let mut registered = vec![base.to_string()];
                for (qualified, table) in sheets {
                    self.insert(qualified.clone(), TableEntry::Rows(table));
                    registered.push(qualified);
                }
                registered
            }
        }
    }
}

pub fn sheet_table_name(base: &str, sheet: &str) -> String {
    format!("{base}_{sheet}")
}
