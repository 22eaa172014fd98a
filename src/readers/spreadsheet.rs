use crate::error::{HarvestError, Result};
use crate::models::Record;
use calamine::{Data, Reader, Xls};
use std::io::Cursor;
use tracing::debug;

/// Decode the first worksheet of an `.xls` workbook; the first row holds field names.
///
/// # Errors
///
/// Fails on bytes that are not an `.xls` workbook, and reports a workbook
/// without a worksheet or header row as an unavailable source.
pub fn records_from_xls(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut workbook: Xls<_> =
        Xls::new(Cursor::new(bytes.to_vec())).map_err(calamine::Error::from)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| HarvestError::unavailable("xls", "workbook has no worksheet"))?
        .map_err(calamine::Error::from)?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| HarvestError::unavailable("xls", "worksheet is empty"))?
        .iter()
        .map(|c| cell_text(c).unwrap_or_default())
        .collect();
    debug!(?headers, "xls header");

    let records = rows
        .map(|row| {
            let mut record = Record::new();
            for (i, name) in headers.iter().enumerate() {
                record.set_opt(name.as_str(), row.get(i).and_then(cell_text));
            }
            record
        })
        .collect();
    Ok(records)
}

/// Render one cell as text. Empty and error cells are absent.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some((*f as i64).to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::String("  ".into())), None);
        assert_eq!(cell_text(&Data::String(" Mme ".into())), Some("Mme".into()));
        assert_eq!(cell_text(&Data::Float(19011.0)), Some("19011".into()));
        assert_eq!(cell_text(&Data::Float(2.5)), Some("2.5".into()));
        assert_eq!(cell_text(&Data::Int(7)), Some("7".into()));
        assert_eq!(
            cell_text(&Data::DateTimeIso("1950-01-31".into())),
            Some("1950-01-31".into())
        );
    }

    #[test]
    fn test_garbage_bytes_are_an_error() {
        assert!(records_from_xls(b"this is not a workbook").is_err());
    }
}
