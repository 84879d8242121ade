//! CSV export of a [`MetadataTable`].
//!
//! Files are opened in append mode and the header row is written only when
//! the file is empty, so re-exporting into the same path adds rows instead of
//! clobbering earlier ones. A table with zero rows still produces a file
//! holding just the header.

use crate::error::Result;
use crate::models::{HomepageContext, MetadataTable};
use crate::utils::host_slug;
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Writes metadata tables below `output_dir`.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// `{output_dir}/{host}/{host}_{YYYY-MM-DD_HH-MM-SS}.csv`
    pub fn path_for(&self, homepage: &HomepageContext, timestamp: &DateTime<Local>) -> PathBuf {
        let slug = host_slug(homepage.host());
        self.output_dir.join(&slug).join(format!(
            "{}_{}.csv",
            slug,
            timestamp.format("%Y-%m-%d_%H-%M-%S")
        ))
    }

    /// Append `table` to this run's file for `homepage` and return its path.
    ///
    /// # Errors
    ///
    /// Directory creation, file open and CSV write failures.
    #[instrument(level = "info", skip_all, fields(homepage = %homepage, rows = table.rows.len()))]
    pub fn write(&self, table: &MetadataTable, homepage: &HomepageContext) -> Result<PathBuf> {
        let path = self.path_for(homepage, &table.timestamp);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if size == 0 {
            writer.write_record(table.header())?;
        }
        for record in &table.rows {
            writer.write_record(table.cells(record))?;
        }
        writer.flush()?;

        info!(path = %path.display(), rows = table.rows.len(), "Wrote CSV");
        Ok(path)
    }
}
