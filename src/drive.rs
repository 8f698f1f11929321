//! File storage behind the tool server.
//!
//! Cloud drives sit behind [`DriveStore`]; [`LocalDrive`] keeps files in a
//! directory and uses the file name as the id.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::info;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub modified_time: Option<String>,
}

pub trait DriveStore: Send + Sync {
    /// Stores `bytes` as `name` and returns the new file id.
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String>;
    fn download(&self, id: &str) -> Result<Vec<u8>>;
    fn list(&self) -> Result<Vec<DriveFile>>;
}

#[derive(Debug, Clone)]
pub struct LocalDrive {
    root: PathBuf,
}

impl LocalDrive {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("Creating drive directory {root:?}"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let trimmed = id.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed == "."
            || trimmed == ".."
        {
            bail!("Invalid drive file id '{id}'");
        }
        Ok(self.root.join(trimmed))
    }
}

impl DriveStore for LocalDrive {
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String> {
        let path = self.path_for(name)?;
        fs::write(&path, bytes).with_context(|| format!("Writing drive file {path:?}"))?;
        info!("Stored {} byte(s) as {:?}", bytes.len(), path);
        Ok(name.trim().to_string())
    }

    fn download(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(id)?;
        fs::read(&path).with_context(|| format!("Reading drive file {path:?}"))
    }

    fn list(&self) -> Result<Vec<DriveFile>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Listing drive directory {:?}", self.root))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let modified_time = metadata
                .modified()
                .ok()
                .map(|time| DateTime::<Utc>::from(time).to_rfc3339());
            files.push(DriveFile {
                id: name.clone(),
                name,
                size: metadata.len(),
                modified_time,
            });
        }
        Ok(files
            .into_iter()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }
}
