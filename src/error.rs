use thiserror::Error;

/// Recoverable failures surfaced to tool callers. Every variant carries enough
/// context (available tables or columns) for the caller to retry.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Table '{name}' not found. Available tables: {}", list_or_none(.available))]
    TableNotFound { name: String, available: Vec<String> },

    #[error(
        "Table '{name}' has multiple sheets; query one of: {}",
        .candidates.join(", ")
    )]
    AmbiguousTable { name: String, candidates: Vec<String> },

    #[error("Operation '{operation}' requires the '{parameter}' parameter")]
    MissingParameter {
        operation: String,
        parameter: &'static str,
    },

    #[error(
        "Unknown operation '{0}'. Supported: count, get_columns, sample, sum, group_by, filter, all"
    )]
    UnknownOperation(String),

    #[error(
        "Unknown analysis type '{0}'. Supported: total_nfs, uf_values, internet_cities, category_values"
    )]
    UnknownAnalysisType(String),

    #[error(
        "Could not find columns for {} in table '{table}'. Available columns: {}",
        .wanted.join(" / "),
        list_or_none(.available)
    )]
    ColumnsNotFound {
        table: String,
        wanted: Vec<String>,
        available: Vec<String>,
    },

    #[error("Table '{0}' is not loaded. Load the archive that contains it first")]
    TableNotLoaded(String),

    #[error("Table '{0}' has no rows")]
    EmptyTable(String),

    #[error("No data to export")]
    NoData,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TableError {
    /// True for lookups that failed because nothing matched.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TableError::TableNotFound { .. } | TableError::TableNotLoaded(_)
        )
    }
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

pub type Result<T> = std::result::Result<T, TableError>;
