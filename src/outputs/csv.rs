//! CSV export with a fixed, batch-wide schema.
//!
//! The header is computed once per batch: the caller's leading columns (those
//! present in the batch), then every other field in first-seen order. Every row
//! is written against that header, so rows that lack a field get `"N/A"` and the
//! column set never varies within a file.
//!
//! Files are UTF-8 with a byte-order mark so spreadsheet software picks the
//! right encoding.

use crate::error::Result;
use crate::models::Record;
use itertools::Itertools;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Default)]
pub struct CsvExporter {
    leading: Vec<String>,
    dropped: Vec<String>,
}

impl CsvExporter {
    pub fn new(leading: &[&str]) -> Self {
        Self {
            leading: leading.iter().map(|c| c.to_string()).collect(),
            dropped: Vec::new(),
        }
    }

    /// Columns never written, whatever the rows hold.
    pub fn dropping(mut self, columns: &[&str]) -> Self {
        self.dropped.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Header for this batch.
    pub fn schema(&self, rows: &[Record]) -> Vec<String> {
        let kept = |c: &&str| !self.dropped.iter().any(|d| d == c);
        if rows.is_empty() {
            return self.leading.iter().map(String::as_str).filter(kept).map(str::to_string).collect();
        }
        let seen: Vec<&str> = rows.iter().flat_map(|r| r.field_names()).unique().collect();
        let leading = self
            .leading
            .iter()
            .map(String::as_str)
            .filter(|c| seen.contains(c));
        let rest = seen
            .iter()
            .copied()
            .filter(|c| !self.leading.iter().any(|l| l == c));
        leading.chain(rest).filter(kept).map(str::to_string).collect()
    }

    /// Serialize `rows` into BOM-prefixed CSV bytes.
    pub fn to_bytes(&self, rows: &[Record]) -> Result<Vec<u8>> {
        let header = self.schema(rows);
        let mut buf = UTF8_BOM.to_vec();
        {
            let mut wtr = csv::WriterBuilder::new()
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(&mut buf);
            wtr.write_record(&header)?;
            for row in rows {
                wtr.write_record(header.iter().map(|c| row.get_or_na(c)))?;
            }
            wtr.flush()?;
        }
        Ok(buf)
    }

    /// Write `rows` to `path`, replacing any previous file; returns the row count.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn write(&self, rows: &[Record], path: &Path) -> Result<usize> {
        let bytes = self.to_bytes(rows)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let tmp = path.with_extension("csv.partial");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, path).await?;
        info!(rows = rows.len(), bytes = bytes.len(), "Wrote CSV");
        Ok(rows.len())
    }
}
