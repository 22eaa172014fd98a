//! JSON dump of intermediate records.
//!
//! Used to keep the combined, pre-export records of a collection next to its
//! CSV for inspection. The output is a BOM-prefixed, pretty-printed array of
//! objects whose keys keep the record field order.

use crate::error::Result;
use crate::models::Record;
use crate::outputs::csv::UTF8_BOM;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `records` as a JSON array to `path`, creating the parent directory.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_records(records: &[Record], path: &Path) -> Result<()> {
    let mut json = UTF8_BOM.to_vec();
    serde_json::to_writer_pretty(&mut json, records)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!(count = records.len(), "Wrote JSON dump");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_records_round_trips_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dump").join("combined.json");
        let records = vec![Record::from_pairs([("nom", "Dupont"), ("typeOrgane", "ASSEMBLEE")])];
        write_records(&records, &path).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let value: serde_json::Value = serde_json::from_slice(&bytes[UTF8_BOM.len()..]).unwrap();
        assert_eq!(value[0]["nom"], "Dupont");
        assert_eq!(value[0]["typeOrgane"], "ASSEMBLEE");
    }
}
