//! Fuzzy column lookup for analyses that target semantic columns ("uf",
//! "estado", ...) across files whose headers drift.

use crate::data::{Row, RowTable};

/// Finds the actual key in `row` for the first candidate that matches.
///
/// Each candidate is tried, in order, by exact key, then case-insensitive
/// equality, then case-insensitive containment (key contains candidate).
pub fn find_column<S: AsRef<str>>(row: &Row, candidates: &[S]) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| -> &str { candidate.as_ref() })
        .filter(|candidate| !candidate.is_empty())
        .find_map(|candidate| match_candidate(row, candidate))
}

/// Same as [`find_column`] against the first row of `table`.
pub fn find_table_column<S: AsRef<str>>(table: &RowTable, candidates: &[S]) -> Option<String> {
    table
        .first_row()
        .and_then(|row| find_column(row, candidates))
}

fn match_candidate(row: &Row, candidate: &str) -> Option<String> {
    if row.contains_key(candidate) {
        return Some(candidate.to_string());
    }
    let lowered = candidate.to_lowercase();
    row.keys()
        .find(|key| key.to_lowercase() == lowered)
        .or_else(|| row.keys().find(|key| key.to_lowercase().contains(&lowered)))
        .cloned()
}
