//! Tool-level operations over one [`TableStore`].
//!
//! `TableService` owns the store plus the collaborators that fill it (drive,
//! archive extractor, decoder). Loading never aborts a batch: each source
//! gets its own success or failure entry in the [`LoadSummary`].

use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    analyze::{self, AnalysisOutput, AnalysisType, AnalyzerSettings},
    archive::{ArchiveExtractor, SourceFile, ZipExtractor},
    config::Config,
    data::{Row, RowTable, Value},
    decode::{FileDecoder, SourceKind, TableDecoder},
    drive::{DriveFile, DriveStore},
    error::TableError,
    export::{csv_file_name, serialize_rows},
    query::{self, GroupTotals, QueryOutput, QueryRequest},
    resolver::resolve_table,
    store::{TableEntry, TableStore},
};

/// Columns shown per table in [`TableService::list_loaded`].
pub const SAMPLE_COLUMNS: usize = 10;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub default_limit: usize,
    pub group_totals: GroupTotals,
    pub analyzer: AnalyzerSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_limit: config.default_limit,
            group_totals: config.group_by_total_columns.clone(),
            analyzer: config.analyzer.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadItem {
    pub source: String,
    pub kind: SourceKind,
    pub status: LoadStatus,
    pub tables: Vec<String>,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub files_processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_rows: usize,
    pub items: Vec<LoadItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub table: String,
    #[serde(flatten)]
    pub output: QueryOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedTable {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets: Option<Vec<String>>,
    pub sample_columns: Vec<String>,
}

/// Where exported rows come from.
#[derive(Debug, Clone)]
pub enum ExportSource {
    Table(String),
    Rows(Vec<Row>),
}

impl ExportSource {
    /// Raw JSON objects supplied by a caller.
    pub fn from_json_rows(rows: Vec<IndexMap<String, serde_json::Value>>) -> Self {
        ExportSource::Rows(
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|(key, value)| (key, Value::from(value)))
                        .collect()
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedCsv {
    pub filename: String,
    pub rows: usize,
    pub csv: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReceipt {
    pub file_id: String,
    pub filename: String,
    pub rows: usize,
    pub bytes: usize,
}

pub struct TableService {
    store: TableStore,
    drive: Arc<dyn DriveStore>,
    extractor: Box<dyn ArchiveExtractor>,
    decoder: Box<dyn TableDecoder>,
    settings: ServiceSettings,
}

impl TableService {
    pub fn new(drive: Arc<dyn DriveStore>, settings: ServiceSettings) -> Self {
        Self {
            store: TableStore::new(),
            drive,
            extractor: Box::new(ZipExtractor),
            decoder: Box::new(FileDecoder),
            settings,
        }
    }

    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_decoder(mut self, decoder: impl TableDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn list_files(&self) -> Result<Vec<DriveFile>> {
        self.drive.list().context("Listing drive files")
    }

    /// Downloads the archive `file_id` from the drive and loads its tables.
    pub fn load_archive(&mut self, file_id: &str) -> Result<LoadSummary> {
        info!("Downloading archive '{file_id}'");
        let bytes = self
            .drive
            .download(file_id)
            .with_context(|| format!("Downloading '{file_id}'"))?;
        self.load_archive_bytes(&bytes)
            .with_context(|| format!("Loading archive '{file_id}'"))
    }

    pub fn load_archive_bytes(&mut self, archive: &[u8]) -> Result<LoadSummary> {
        let sources = self.extractor.extract(archive)?;
        debug!("Archive contains {} table source(s)", sources.len());
        Ok(self.load(sources))
    }

    pub fn load(&mut self, sources: Vec<SourceFile>) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for source in sources {
            summary.files_processed += 1;
            match self.decoder.decode(&source.bytes, source.kind) {
                Ok(decoded) => {
                    let rows = decoded.row_count();
                    let tables = self.store.register(&source.name, decoded);
                    info!(
                        "Loaded '{}' with {} row(s) as {}",
                        source.name,
                        rows,
                        tables.join(", ")
                    );
                    summary.succeeded += 1;
                    summary.total_rows += rows;
                    summary.items.push(LoadItem {
                        source: source.name,
                        kind: source.kind,
                        status: LoadStatus::Loaded,
                        tables,
                        rows,
                        error: None,
                    });
                }
                Err(err) => {
                    warn!("Failed to decode '{}': {err:#}", source.name);
                    summary.failed += 1;
                    summary.items.push(LoadItem {
                        source: source.name,
                        kind: source.kind,
                        status: LoadStatus::Failed,
                        tables: Vec::new(),
                        rows: 0,
                        error: Some(format!("{err:#}")),
                    });
                }
            }
        }
        summary
    }

    pub fn query(
        &self,
        identifier: &str,
        mut request: QueryRequest,
    ) -> std::result::Result<QueryResult, TableError> {
        let resolved = resolve_table(&self.store, identifier)?;
        request.limit.get_or_insert(self.settings.default_limit);
        debug!(
            "Running {} on '{}' ({} row(s))",
            request.operation,
            resolved.name,
            resolved.table.len()
        );
        let output = query::execute(&resolved.table, &request, &self.settings.group_totals)?;
        Ok(QueryResult {
            table: resolved.name,
            output,
        })
    }

    pub fn analyze(
        &self,
        analysis: &str,
        category: Option<&str>,
    ) -> std::result::Result<AnalysisOutput, TableError> {
        let analysis = analysis.parse::<AnalysisType>()?;
        analyze::analyze(&self.store, &self.settings.analyzer, analysis, category)
    }

    pub fn export(
        &self,
        source: ExportSource,
        filename: &str,
    ) -> std::result::Result<ExportedCsv, TableError> {
        let table = match source {
            ExportSource::Table(identifier) => {
                let resolved = resolve_table(&self.store, &identifier)?;
                if resolved.table.is_empty() {
                    return Err(TableError::EmptyTable(resolved.name));
                }
                resolved.table
            }
            ExportSource::Rows(rows) => {
                if rows.is_empty() {
                    return Err(TableError::NoData);
                }
                Arc::new(RowTable::new(rows))
            }
        };
        let csv = serialize_rows(&table)?;
        Ok(ExportedCsv {
            filename: csv_file_name(filename),
            rows: table.len(),
            csv,
        })
    }

    /// Serialises the source and uploads it to the drive.
    pub fn export_and_upload(&self, source: ExportSource, filename: &str) -> Result<ExportReceipt> {
        let exported = self.export(source, filename)?;
        let file_id = self
            .drive
            .upload(exported.csv.as_bytes(), &exported.filename)
            .with_context(|| format!("Uploading '{}'", exported.filename))?;
        info!(
            "Exported {} row(s) to '{}' ({file_id})",
            exported.rows, exported.filename
        );
        Ok(ExportReceipt {
            file_id,
            filename: exported.filename,
            rows: exported.rows,
            bytes: exported.csv.len(),
        })
    }

    pub fn list_loaded(&self) -> Vec<LoadedTable> {
        self.store
            .entries()
            .map(|(name, entry)| match entry {
                TableEntry::Rows(table) => LoadedTable {
                    name: name.to_string(),
                    rows: Some(table.len()),
                    sheets: None,
                    sample_columns: table.columns().into_iter().take(SAMPLE_COLUMNS).collect(),
                },
                TableEntry::Sheets(bundle) => LoadedTable {
                    name: name.to_string(),
                    rows: None,
                    sheets: Some(bundle.sheet_names()),
                    sample_columns: Vec::new(),
                },
            })
            .collect()
    }
}
