//! Read-only query operations over a single resolved [`RowTable`].
//!
//! Aggregates are lenient: a cell that does not parse as a number counts as
//! zero instead of failing the whole operation.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Row, RowTable, Value, display_of, numeric_or_zero},
    error::{Result, TableError},
};

pub const DEFAULT_LIMIT: usize = 100;
/// `sample` never returns more rows than this, whatever the limit.
pub const SAMPLE_CAP: usize = 10;
pub const GROUP_PREVIEW_ROWS: usize = 3;
pub const EMPTY_GROUP_KEY: &str = "<empty>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Count,
    GetColumns,
    Sample,
    Sum,
    GroupBy,
    Filter,
    All,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Count => "count",
            Operation::GetColumns => "get_columns",
            Operation::Sample => "sample",
            Operation::Sum => "sum",
            Operation::GroupBy => "group_by",
            Operation::Filter => "filter",
            Operation::All => "all",
        }
    }
}

impl FromStr for Operation {
    type Err = TableError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Operation::Count),
            "get_columns" => Ok(Operation::GetColumns),
            "sample" => Ok(Operation::Sample),
            "sum" => Ok(Operation::Sum),
            "group_by" => Ok(Operation::GroupBy),
            "filter" => Ok(Operation::Filter),
            "all" => Ok(Operation::All),
            _ => Err(TableError::UnknownOperation(value.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub operation: Operation,
    pub column: Option<String>,
    pub value: Option<String>,
    pub limit: Option<usize>,
}

impl QueryRequest {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            column: None,
            value: None,
            limit: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    fn require_column(&self) -> Result<&str> {
        require(self.operation, self.column.as_deref(), "column")
    }

    fn require_value(&self) -> Result<&str> {
        require(self.operation, self.value.as_deref(), "value")
    }
}

fn require<'a>(
    operation: Operation,
    provided: Option<&'a str>,
    parameter: &'static str,
) -> Result<&'a str> {
    provided
        .filter(|value| !value.is_empty())
        .ok_or_else(|| TableError::MissingParameter {
            operation: operation.to_string(),
            parameter,
        })
}

/// Columns summed into a group's `total_value`. The first column present with
/// a non-empty value in a row wins; rows with none of them contribute 0, so a
/// table without any of these columns reports all-zero totals instead of an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupTotals {
    columns: Vec<String>,
}

impl GroupTotals {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn total_for(&self, row: &Row) -> f64 {
        self.columns
            .iter()
            .find(|column| {
                row.get(column.as_str())
                    .is_some_and(|value| !value.is_null() && !value.as_display().is_empty())
            })
            .map(|column| numeric_or_zero(row, column))
            .unwrap_or(0.0)
    }
}

impl Default for GroupTotals {
    fn default() -> Self {
        Self::new(["valor_total", "valor"])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub key: String,
    pub count: usize,
    pub total_value: f64,
    pub items: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum QueryOutput {
    Count { count: usize },
    Columns { columns: Vec<String> },
    Rows { count: usize, rows: Vec<Row> },
    Sum { column: String, sum: f64 },
    Groups { column: String, groups: Vec<Group> },
}

pub fn execute(table: &RowTable, request: &QueryRequest, totals: &GroupTotals) -> Result<QueryOutput> {
    let output = match request.operation {
        Operation::Count => QueryOutput::Count { count: table.len() },
        Operation::GetColumns => QueryOutput::Columns {
            columns: table.columns(),
        },
        Operation::Sample => rows_output(head(table, request.limit().min(SAMPLE_CAP))),
        Operation::All => rows_output(head(table, request.limit())),
        Operation::Sum => {
            let column = request.require_column()?;
            QueryOutput::Sum {
                column: column.to_string(),
                sum: sum_column(table, column),
            }
        }
        Operation::GroupBy => {
            let column = request.require_column()?;
            QueryOutput::Groups {
                column: column.to_string(),
                groups: group_by(table, column, totals),
            }
        }
        Operation::Filter => {
            let column = request.require_column()?;
            let needle = request.require_value()?;
            let rows = filter_contains(table.rows(), column, needle)
                .take(request.limit())
                .cloned()
                .collect();
            rows_output(rows)
        }
    };
    Ok(output)
}

fn head(table: &RowTable, limit: usize) -> Vec<Row> {
    table.rows().iter().take(limit).cloned().collect()
}

fn rows_output(rows: Vec<Row>) -> QueryOutput {
    QueryOutput::Rows {
        count: rows.len(),
        rows,
    }
}

pub fn sum_column(table: &RowTable, column: &str) -> f64 {
    table
        .rows()
        .iter()
        .map(|row| numeric_or_zero(row, column))
        .sum()
}

/// Rows whose value at `column` contains `needle`, ignoring case.
pub fn filter_contains<'a>(
    rows: &'a [Row],
    column: &'a str,
    needle: &str,
) -> impl Iterator<Item = &'a Row> + 'a {
    let needle = needle.to_lowercase();
    rows.iter()
        .filter(move |row| display_of(row, column).to_lowercase().contains(&needle))
}

pub fn group_key(value: Option<&Value>) -> String {
    match value.map(Value::as_display) {
        Some(text) if !text.is_empty() => text.into_owned(),
        _ => EMPTY_GROUP_KEY.to_string(),
    }
}

/// Partitions rows by the value at `column`, groups sorted by descending
/// `total_value`. Ties keep first-seen order.
pub fn group_by(table: &RowTable, column: &str, totals: &GroupTotals) -> Vec<Group> {
    let mut groups: IndexMap<String, Group> = IndexMap::new();
    for row in table.rows() {
        let key = group_key(row.get(column));
        let group = groups.entry(key.clone()).or_insert_with(|| Group {
            key,
            count: 0,
            total_value: 0.0,
            items: Vec::new(),
        });
        group.count += 1;
        group.total_value += totals.total_for(row);
        if group.items.len() < GROUP_PREVIEW_ROWS {
            group.items.push(row.clone());
        }
    }
    let mut groups = groups.into_values().collect::<Vec<_>>();
    groups.sort_by(|a, b| b.total_value.total_cmp(&a.total_value));
    groups
}
