use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use log::debug;

use crate::decode::SourceKind;

/// A table source pulled out of an archive (or supplied directly).
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Lower-cased base file name, extension included.
    pub name: String,
    pub kind: SourceKind,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Builds a source from a file name, or `None` when the extension is not a
    /// supported table format.
    pub fn from_name(name: &str, bytes: Vec<u8>) -> Option<Self> {
        let name = base_file_name(name);
        let kind = SourceKind::from_name(&name)?;
        Some(Self { name, kind, bytes })
    }
}

pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive: &[u8]) -> Result<Vec<SourceFile>>;
}

/// Cap on the buffer reserved up front from an entry's declared size.
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &[u8]) -> Result<Vec<SourceFile>> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).context("Opening ZIP archive")?;
        let mut files = Vec::new();
        for idx in 0..zip.len() {
            let mut entry = zip
                .by_index(idx)
                .with_context(|| format!("Reading ZIP entry #{idx}"))?;
            let path = entry.name().to_string();
            if entry.is_dir() || is_hidden_entry(&path) {
                continue;
            }
            if SourceKind::from_name(&path).is_none() {
                debug!("Skipping non-table entry '{path}'");
                continue;
            }
            let mut bytes = Vec::with_capacity(preallocation(entry.size()));
            entry
                .read_to_end(&mut bytes)
                .with_context(|| format!("Extracting '{path}'"))?;
            if let Some(file) = SourceFile::from_name(&path, bytes) {
                files.push(file);
            }
        }
        Ok(files)
    }
}

fn is_hidden_entry(path: &str) -> bool {
    path.starts_with("__MACOSX/")
        || path
            .rsplit('/')
            .next()
            .is_some_and(|file| file.starts_with('.'))
}

fn preallocation(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOCATION, |size| size.min(MAX_PREALLOCATION))
}

fn base_file_name(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .trim()
        .to_lowercase()
}
