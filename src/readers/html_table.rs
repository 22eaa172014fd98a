use crate::error::{HarvestError, Result};
use crate::fetch::Fetch;
use crate::models::Record;
use crate::readers::SourceReader;
use crate::utils::clean_text;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::path::PathBuf;
use tracing::info;

static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
static BODY_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// Parse a CSS selector, reporting a bad one as an unavailable source.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::unavailable(css, format!("bad selector: {e}")))
}

/// Text content of an element with whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Decode the first table matching `table_css` into records.
///
/// Header cells name the fields; every body row with at least one `<td>` is a
/// record. Empty cells are absent.
///
/// # Arguments
///
/// * `html` - Full page or fragment
/// * `table_css` - Selector of the wanted table, e.g. `"table#tablesorter0"`
///
/// # Errors
///
/// A bad selector or a page without a matching table is reported as an
/// unavailable source.
pub fn records_from_table(html: &str, table_css: &str) -> Result<Vec<Record>> {
    let document = Html::parse_document(html);
    let table_sel = selector(table_css)?;
    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| HarvestError::unavailable(table_css, "table not found"))?;

    let headers: Vec<String> = table.select(&TH).map(element_text).collect();
    let mut records = Vec::new();
    for row in table.select(&BODY_ROW) {
        let cells: Vec<String> = row.select(&TD).map(element_text).collect();
        if cells.is_empty() {
            continue;
        }
        let mut record = Record::new();
        for (i, name) in headers.iter().enumerate() {
            let value = cells.get(i).filter(|c| !c.is_empty()).cloned();
            record.set_opt(name.as_str(), value);
        }
        records.push(record);
    }
    Ok(records)
}

/// A result table saved to disk from a page that needs a browser session
/// (multi-criteria search forms).
#[derive(Debug, Clone)]
pub struct SavedTable {
    pub path: PathBuf,
    pub table_css: String,
}

impl SavedTable {
    pub fn new(path: PathBuf, table_css: &str) -> Self {
        Self {
            path,
            table_css: table_css.to_string(),
        }
    }
}

impl SourceReader for SavedTable {
    fn name(&self) -> &str {
        &self.table_css
    }

    async fn read<F: Fetch>(&self, _fetcher: &F) -> Result<Vec<Record>> {
        let html = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| HarvestError::unavailable(self.path.display().to_string(), e))?;
        let records = records_from_table(&html, &self.table_css)?;
        info!(path = %self.path.display(), count = records.len(), "Loaded saved table");
        Ok(records)
    }
}
