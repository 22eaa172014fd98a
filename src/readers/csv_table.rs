use crate::error::Result;
use crate::models::Record;

/// Decode CSV text into records. Empty cells are absent; a leading BOM is ignored.
///
/// Rows shorter than the header leave their trailing fields absent.
///
/// # Errors
///
/// Returns [`crate::error::HarvestError::Csv`] if the header or a row cannot be
/// read.
pub fn records_from_csv(text: &str) -> Result<Vec<Record>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = Record::new();
        for (i, name) in headers.iter().enumerate() {
            let value = row
                .get(i)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            record.set_opt(name.as_str(), value);
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_empty_cells() {
        let text = "\u{feff}senmat,eludatdeb,eludatfin\n99001A,2001-10-01,\n\"12,3\", 2008-10-01 ,2014-09-30\n";
        let records = records_from_csv(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("senmat"), Some("99001A"));
        assert!(records[0].contains("eludatfin"));
        assert_eq!(records[0].get("eludatfin"), None);
        assert_eq!(records[1].get("senmat"), Some("12,3"));
        assert_eq!(records[1].get("eludatdeb"), Some("2008-10-01"));
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let records = records_from_csv("a,b,c\n1\n").unwrap();
        assert_eq!(records[0].get("a"), Some("1"));
        assert_eq!(records[0].get("c"), None);
        assert_eq!(records[0].field_names().count(), 3);
    }
}
