//! CSV output for extracted records.
//!
//! The table has a fixed header, `title,subtitle,author,publishDate,content`,
//! and one row per record. Missing optional fields are written as empty
//! values. Each write replaces whatever was at the path before.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::error::SinkError;
use crate::models::ArticleRecord;
use crate::utils::ensure_parent_dir;

/// What [`persist`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// No records were given; nothing was written.
    Empty,
    /// The file was written with this many data rows plus the header.
    Written { rows: usize },
}

#[instrument(level = "info", skip_all, fields(count = records.len(), path = %path.display()))]
pub fn persist(records: &[ArticleRecord], path: &Path) -> Result<PersistOutcome, SinkError> {
    if records.is_empty() {
        warn!("Nothing to persist; leaving output untouched");
        return Ok(PersistOutcome::Empty);
    }

    ensure_parent_dir(path).map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let csv_err = |source: csv::Error| SinkError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer
        .write_record(ArticleRecord::COLUMNS)
        .map_err(csv_err)?;
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(rows = records.len(), "Wrote CSV");
    Ok(PersistOutcome::Written {
        rows: records.len(),
    })
}
