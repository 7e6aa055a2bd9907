use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::info;

use crate::models::{BookRecord, DATASET_COLUMNS};

/// Writes the dataset CSV consumed by the query service.
///
/// Rows go to a temporary file next to the destination which then replaces
/// it, so readers see either the previous file or the complete new one.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    path: PathBuf,
}

impl DatasetWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, records: &[BookRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("create output dir: {}", dir.display()))?;

        let temp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(temp.as_file());
        writer
            .write_record(DATASET_COLUMNS)
            .context("write dataset header")?;
        for record in records {
            writer
                .serialize(record)
                .with_context(|| format!("write record {}", record.identifier))?;
        }
        writer.flush().context("flush dataset")?;
        drop(writer);

        temp.as_file().sync_all().context("sync dataset")?;
        temp.persist(&self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;

        info!("Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}
