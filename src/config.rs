//! Server configuration.
//!
//! Settings come from an optional YAML file; CLI flags override individual
//! fields afterwards. Every field has a default so an empty (or absent) file
//! is valid.

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{analyze::AnalyzerSettings, query::DEFAULT_LIMIT, query::GroupTotals};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const TOKEN_ENV: &str = "DRIVE_TABLES_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    /// Bearer token required on tool endpoints when set.
    pub auth_token: Option<String>,
    pub drive_root: PathBuf,
    pub default_limit: usize,
    pub group_by_total_columns: GroupTotals,
    pub analyzer: AnalyzerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            auth_token: None,
            drive_root: PathBuf::from("drive"),
            default_limit: DEFAULT_LIMIT,
            group_by_total_columns: GroupTotals::default(),
            analyzer: AnalyzerSettings::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening config file {path:?}"))?;
        Self::from_yaml(&raw).with_context(|| format!("Parsing config file {path:?}"))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
