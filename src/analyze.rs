//! Fixed analyses over the invoice header and line-item tables.
//!
//! Column names vary between exports, so every analysis looks its columns up
//! through [`crate::columns::find_table_column`] with a configurable list of
//! candidates.

use std::{str::FromStr, sync::Arc};

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    columns::find_table_column,
    data::{Row, RowTable, display_of},
    error::{Result, TableError},
    query::{filter_contains, group_key},
    resolver::resolve_exact,
    store::TableStore,
};

pub const CATEGORY_SAMPLE_ROWS: usize = 5;
pub const TOP_CITIES: usize = 2;
const INTERNET_TRUTHY: &[&str] = &["s", "sim", "true", "1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    TotalNfs,
    UfValues,
    InternetCities,
    CategoryValues,
}

impl FromStr for AnalysisType {
    type Err = TableError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "total_nfs" => Ok(AnalysisType::TotalNfs),
            "uf_values" => Ok(AnalysisType::UfValues),
            "internet_cities" => Ok(AnalysisType::InternetCities),
            "category_values" => Ok(AnalysisType::CategoryValues),
            _ => Err(TableError::UnknownAnalysisType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub header_table: String,
    pub items_table: String,
    pub period_label: String,
    pub default_category: String,
    pub region_columns: Vec<String>,
    pub total_columns: Vec<String>,
    pub internet_columns: Vec<String>,
    pub city_columns: Vec<String>,
    pub description_columns: Vec<String>,
    pub item_value_columns: Vec<String>,
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            header_table: "nfe_cabecalho.csv".to_string(),
            items_table: "nfe_itens.csv".to_string(),
            period_label: "Janeiro/2024".to_string(),
            default_category: "Livros".to_string(),
            region_columns: names(&["uf_emitente", "uf", "estado"]),
            total_columns: names(&["valor_nota_fiscal", "valor_total", "valor"]),
            internet_columns: names(&["via_internet", "internet", "indicador_internet"]),
            city_columns: names(&["municipio_emitente", "cidade", "municipio"]),
            description_columns: names(&["descricao_do_produto", "descricao", "produto"]),
            item_value_columns: names(&["valor_total", "valor_item", "valor"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionTotal {
    pub uf: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityCount {
    pub city: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisOutput {
    TotalNfs {
        table: String,
        total: usize,
        period: String,
    },
    UfValues {
        region_column: String,
        value_column: String,
        top: Option<RegionTotal>,
        ranking: Vec<RegionTotal>,
    },
    InternetCities {
        internet_column: String,
        city_column: String,
        internet_total: usize,
        distinct_cities: usize,
        top: Vec<CityCount>,
    },
    CategoryValues {
        category: String,
        description_column: String,
        value_column: String,
        total: f64,
        count: usize,
        samples: Vec<Row>,
    },
}

pub fn analyze(
    store: &TableStore,
    settings: &AnalyzerSettings,
    analysis: AnalysisType,
    category: Option<&str>,
) -> Result<AnalysisOutput> {
    debug!("Running analysis {analysis:?}");
    match analysis {
        AnalysisType::TotalNfs => {
            let (name, header) = loaded(store, &settings.header_table)?;
            Ok(AnalysisOutput::TotalNfs {
                table: name,
                total: header.len(),
                period: settings.period_label.clone(),
            })
        }
        AnalysisType::UfValues => uf_values(store, settings),
        AnalysisType::InternetCities => internet_cities(store, settings),
        AnalysisType::CategoryValues => {
            let category = category
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(settings.default_category.as_str());
            category_values(store, settings, category)
        }
    }
}

fn loaded(store: &TableStore, name: &str) -> Result<(String, Arc<RowTable>)> {
    match resolve_exact(store, name) {
        Some(resolved) => resolved.map(|r| (r.name, r.table)),
        None => Err(TableError::TableNotLoaded(name.to_string())),
    }
}

fn loaded_with_rows(store: &TableStore, name: &str) -> Result<(String, Arc<RowTable>)> {
    let (resolved, table) = loaded(store, name)?;
    if table.is_empty() {
        return Err(TableError::EmptyTable(resolved));
    }
    Ok((resolved, table))
}

fn require_columns(
    table_name: &str,
    table: &RowTable,
    first: &[String],
    second: &[String],
) -> Result<(String, String)> {
    match (
        find_table_column(table, first),
        find_table_column(table, second),
    ) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(TableError::ColumnsNotFound {
            table: table_name.to_string(),
            wanted: vec![first.join("|"), second.join("|")],
            available: table.columns(),
        }),
    }
}

fn uf_values(store: &TableStore, settings: &AnalyzerSettings) -> Result<AnalysisOutput> {
    let (name, header) = loaded_with_rows(store, &settings.header_table)?;
    let (region_column, value_column) = require_columns(
        &name,
        &header,
        &settings.region_columns,
        &settings.total_columns,
    )?;

    let mut totals: IndexMap<String, RegionTotal> = IndexMap::new();
    for row in header.rows() {
        let uf = group_key(row.get(&region_column));
        let entry = totals.entry(uf.clone()).or_insert_with(|| RegionTotal {
            uf,
            total: 0.0,
            count: 0,
        });
        entry.count += 1;
        if let Some(amount) = row.get(&value_column).and_then(|value| value.as_number()) {
            entry.total += amount;
        }
    }
    let mut ranking = totals.into_values().collect::<Vec<_>>();
    ranking.sort_by(|a, b| b.total.total_cmp(&a.total));

    Ok(AnalysisOutput::UfValues {
        region_column,
        value_column,
        top: ranking.first().cloned(),
        ranking,
    })
}

fn internet_cities(store: &TableStore, settings: &AnalyzerSettings) -> Result<AnalysisOutput> {
    let (name, header) = loaded_with_rows(store, &settings.header_table)?;
    let (internet_column, city_column) = require_columns(
        &name,
        &header,
        &settings.internet_columns,
        &settings.city_columns,
    )?;

    let mut counts: IndexMap<String, usize> = IndexMap::new();
    let mut internet_total = 0;
    for row in header.rows() {
        let flag = display_of(row, &internet_column).trim().to_lowercase();
        if !INTERNET_TRUTHY.contains(&flag.as_str()) {
            continue;
        }
        internet_total += 1;
        *counts.entry(group_key(row.get(&city_column))).or_insert(0) += 1;
    }
    let distinct_cities = counts.len();
    let mut ranked = counts
        .into_iter()
        .map(|(city, count)| CityCount { city, count })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(TOP_CITIES);

    Ok(AnalysisOutput::InternetCities {
        internet_column,
        city_column,
        internet_total,
        distinct_cities,
        top: ranked,
    })
}

fn category_values(
    store: &TableStore,
    settings: &AnalyzerSettings,
    category: &str,
) -> Result<AnalysisOutput> {
    let (name, items) = loaded_with_rows(store, &settings.items_table)?;
    let (description_column, value_column) = require_columns(
        &name,
        &items,
        &settings.description_columns,
        &settings.item_value_columns,
    )?;

    let mut total = 0.0;
    let mut count = 0;
    let mut samples = Vec::new();
    for row in filter_contains(items.rows(), &description_column, category) {
        total += row
            .get(&value_column)
            .and_then(|value| value.as_number())
            .unwrap_or(0.0);
        count += 1;
        if samples.len() < CATEGORY_SAMPLE_ROWS {
            samples.push(row.clone());
        }
    }

    Ok(AnalysisOutput::CategoryValues {
        category: category.to_string(),
        description_column,
        value_column,
        total,
        count,
        samples,
    })
}
