//! Source Readers: turn one external source into a sequence of raw records.
//!
//! A reader owns everything site-specific about *getting* a table (which page,
//! which link, which markup) and hands the pipeline plain [`Record`]s. The
//! decoders below are shared by the collection scrapers:
//!
//! | Decoder | Input | Notes |
//! |---------|-------|-------|
//! | [`csv_table`] | CSV text | header row = field names |
//! | [`spreadsheet`] | `.xls` bytes | first worksheet |
//! | [`html_table`] | HTML text or a saved page file | `<th>` = field names, `<tbody><tr>` = records |
//! | [`json_tree`] | `serde_json::Value` | path accessors with sentinel fallback |

use crate::error::Result;
use crate::fetch::Fetch;
use crate::models::Record;

pub mod csv_table;
pub mod html_table;
pub mod json_tree;
pub mod spreadsheet;

/// One external source of raw records.
pub trait SourceReader {
    /// Short label used in logs and errors.
    fn name(&self) -> &str;

    /// Fetch and decode the whole source.
    ///
    /// An `Err` means the source as a whole is unavailable; per-record problems
    /// are handled inside the reader.
    async fn read<F: Fetch>(&self, fetcher: &F) -> Result<Vec<Record>>;
}
