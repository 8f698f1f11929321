//! Tool catalogue shared by the REST endpoints and the MCP endpoint.
//!
//! Each tool takes JSON arguments, runs against the shared [`TableService`]
//! and answers with a JSON document. Loads take the write lock; everything
//! else shares the read lock.

use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    error::TableError,
    query::{Operation, QueryRequest},
    service::{ExportSource, TableService},
};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Invalid arguments: {0}")]
    InvalidParams(String),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("{0:#}")]
    Internal(anyhow::Error),
}

/// Table errors wrapped in `anyhow` keep their variant.
impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TableError>() {
            Ok(table) => ToolError::Table(table),
            Err(other) => ToolError::Internal(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    ListDriveFiles,
    LoadArchive,
    QueryTable,
    AnalyzeData,
    ExportTable,
    ListTables,
}

pub const ALL_TOOLS: &[Tool] = &[
    Tool::ListDriveFiles,
    Tool::LoadArchive,
    Tool::QueryTable,
    Tool::AnalyzeData,
    Tool::ExportTable,
    Tool::ListTables,
];

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::ListDriveFiles => "list_drive_files",
            Tool::LoadArchive => "load_archive",
            Tool::QueryTable => "query_table",
            Tool::AnalyzeData => "analyze_data",
            Tool::ExportTable => "export_table",
            Tool::ListTables => "list_tables",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::ListDriveFiles => "List files available on the drive",
            Tool::LoadArchive => {
                "Download a ZIP archive from the drive and load its CSV/Excel files into memory"
            }
            Tool::QueryTable => {
                "Run count, get_columns, sample, sum, group_by, filter or all against a loaded table"
            }
            Tool::AnalyzeData => {
                "Invoice analyses: total_nfs, uf_values, internet_cities, category_values"
            }
            Tool::ExportTable => "Serialize a loaded table (or supplied rows) to CSV and upload it",
            Tool::ListTables => "List loaded tables with row counts and sample columns",
        }
    }

    pub fn input_schema(self) -> Value {
        match self {
            Tool::ListDriveFiles | Tool::ListTables => {
                json!({ "type": "object", "properties": {} })
            }
            Tool::LoadArchive => json!({
                "type": "object",
                "properties": { "file_id": { "type": "string" } },
                "required": ["file_id"]
            }),
            Tool::QueryTable => json!({
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "operation": {
                        "type": "string",
                        "enum": ["count", "get_columns", "sample", "sum", "group_by", "filter", "all"]
                    },
                    "column": { "type": "string" },
                    "value": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 0 }
                },
                "required": ["table", "operation"]
            }),
            Tool::AnalyzeData => json!({
                "type": "object",
                "properties": {
                    "analysis_type": {
                        "type": "string",
                        "enum": ["total_nfs", "uf_values", "internet_cities", "category_values"]
                    },
                    "category": { "type": "string" }
                },
                "required": ["analysis_type"]
            }),
            Tool::ExportTable => json!({
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "rows": { "type": "array", "items": { "type": "object" } },
                    "filename": { "type": "string" },
                    "upload": { "type": "boolean" }
                },
                "required": ["filename"]
            }),
        }
    }

    pub fn descriptor(self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
        })
    }
}

impl FromStr for Tool {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ALL_TOOLS
            .iter()
            .copied()
            .find(|tool| tool.name() == value)
            .ok_or_else(|| ToolError::UnknownTool(value.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadParams {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    pub table: String,
    pub operation: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeParams {
    pub analysis_type: String,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_upload() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub rows: Option<Vec<IndexMap<String, Value>>>,
    pub filename: String,
    #[serde(default = "default_upload")]
    pub upload: bool,
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|err| ToolError::Internal(err.into()))
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Runs `tool` with untyped JSON arguments.
pub async fn call(
    service: &RwLock<TableService>,
    tool: Tool,
    arguments: Value,
) -> Result<Value, ToolError> {
    match tool {
        Tool::ListDriveFiles => list_drive_files(service).await,
        Tool::LoadArchive => load_archive(service, parse_args(arguments)?).await,
        Tool::QueryTable => query_table(service, parse_args(arguments)?).await,
        Tool::AnalyzeData => analyze_data(service, parse_args(arguments)?).await,
        Tool::ExportTable => export_table(service, parse_args(arguments)?).await,
        Tool::ListTables => list_tables(service).await,
    }
}

pub async fn list_drive_files(service: &RwLock<TableService>) -> Result<Value, ToolError> {
    let files = service.read().await.list_files()?;
    Ok(json!({ "count": files.len(), "files": files }))
}

pub async fn load_archive(
    service: &RwLock<TableService>,
    params: LoadParams,
) -> Result<Value, ToolError> {
    let summary = service.write().await.load_archive(params.file_id.trim())?;
    to_json(&summary)
}

pub async fn query_table(
    service: &RwLock<TableService>,
    params: QueryParams,
) -> Result<Value, ToolError> {
    let operation = params.operation.parse::<Operation>()?;
    let request = QueryRequest {
        operation,
        column: params.column,
        value: params.value,
        limit: params.limit,
    };
    let result = service.read().await.query(&params.table, request)?;
    to_json(&result)
}

pub async fn analyze_data(
    service: &RwLock<TableService>,
    params: AnalyzeParams,
) -> Result<Value, ToolError> {
    let output = service
        .read()
        .await
        .analyze(&params.analysis_type, params.category.as_deref())?;
    to_json(&output)
}

pub async fn export_table(
    service: &RwLock<TableService>,
    params: ExportParams,
) -> Result<Value, ToolError> {
    let source = match (params.table, params.rows) {
        (Some(table), _) if !table.trim().is_empty() => ExportSource::Table(table),
        (_, Some(rows)) => ExportSource::from_json_rows(rows),
        _ => return Err(TableError::NoData.into()),
    };
    let service = service.read().await;
    if params.upload {
        to_json(&service.export_and_upload(source, &params.filename)?)
    } else {
        to_json(&service.export(source, &params.filename)?)
    }
}

pub async fn list_tables(service: &RwLock<TableService>) -> Result<Value, ToolError> {
    let tables = service.read().await.list_loaded();
    Ok(json!({ "count": tables.len(), "tables": tables }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip() {
        for tool in ALL_TOOLS {
            assert_eq!(tool.name().parse::<Tool>().unwrap(), *tool);
        }
        assert!(matches!(
            "drop_table".parse::<Tool>(),
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn anyhow_wrapped_table_errors_stay_typed() {
        let err: ToolError = anyhow::Error::new(TableError::NoData).into();
        assert!(matches!(err, ToolError::Table(TableError::NoData)));
        assert_eq!(err.to_string(), TableError::NoData.to_string());
    }

    #[test]
    fn messages_carry_context() {
        let err: ToolError = TableError::NoData.into();
        assert!(matches!(err, ToolError::Table(TableError::NoData)));
        assert_eq!(
            ToolError::UnknownTool("drop_table".to_string()).to_string(),
            "Unknown tool 'drop_table'"
        );
        assert_eq!(
            ToolError::InvalidParams("missing field".to_string()).to_string(),
            "Invalid arguments: missing field"
        );
        let internal = ToolError::from(anyhow::anyhow!("disk full").context("Uploading resumo.csv"));
        assert_eq!(internal.to_string(), "Uploading resumo.csv: disk full");
    }

    #[test]
    fn null_arguments_parse_as_empty_object() {
        let err = parse_args::<LoadParams>(Value::Null).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(message) if message.contains("file_id")));
    }
}
