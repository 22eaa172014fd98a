//! French senators who sat between 1999 and 2024.
//!
//! The mandate list comes from a local CSV extract (`senmat.csv`, one row per
//! mandate) and the biographies from the Senate open-data `.xls` workbook
//! (one row per senator). Every mandate row receives its senator's biography.

use crate::error::{HarvestError, Result};
use crate::fetch::Fetch;
use crate::models::Record;
use crate::pipeline::join::{JoinPolicy, JoinSpec, KeySpec, left_join};
use crate::pipeline::normalize::{DateRule, FieldRules, SexRule, normalize_all};
use crate::readers::SourceReader;
use crate::readers::csv_table::records_from_csv;
use crate::readers::html_table::selector;
use crate::readers::spreadsheet::records_from_xls;
use scraper::Html;
use std::path::PathBuf;
use tracing::{info, instrument};
use url::Url;

pub const PAGE_URL: &str = "https://data.senat.fr/les-senateurs/";
pub const XLS_TITLE: &str = "Informations générales sur les sénateurs - Format .xls";
pub const OUTPUT_NAME: &str = "FR_senators_all_1999_2024.csv";

/// Biography columns, written first.
pub const COLUMNS: &[&str] = &[
    "Matriculation",
    "Civil Status",
    "Last Name",
    "First Name",
    "Sex",
    "Status",
    "Date of Birth",
    "Date of Death",
    "Political Group",
    "Type of membership in the political group",
    "Committee",
    "Constituency",
    "Position in the Senate Office",
    "Socio-Professional Category",
    "Professional category",
    "Profession Description",
];

const SHEET_RENAMES: &[(&str, &str)] = &[
    ("Matricule", "Matriculation"),
    ("Qualité", "Civil Status"),
    ("Nom usuel", "Last Name"),
    ("Prénom usuel", "First Name"),
    ("État", "Status"),
    ("Date naissance", "Date of Birth"),
    ("Date de décès", "Date of Death"),
    ("Groupe politique", "Political Group"),
    ("Type d'app au grp politique", "Type of membership in the political group"),
    ("Commission permanente", "Committee"),
    ("Circonscription", "Constituency"),
    ("Fonction au Bureau du Sénat", "Position in the Senate Office"),
    ("PCS INSEE", "Socio-Professional Category"),
    ("Catégorie professionnelle", "Professional category"),
    ("Description de la profession", "Profession Description"),
];

const MANDATE_RENAMES: &[(&str, &str)] = &[
    ("eludatdeb", "Mandate Start Date"),
    ("eludatelu", "Election Date"),
    ("eludatfin", "Mandate End Date"),
    ("etadebmancod", "Code Starting the Mandate"),
    ("etafinmancod", "Code Ending the Mandate"),
];

/// Absolute URL of the biography workbook linked from the open-data page.
pub fn find_xls_link(html: &str, page_url: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let anchor = selector(&format!(r#"a[title="{XLS_TITLE}"][href]"#))?;
    let href = document
        .select(&anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| HarvestError::unavailable(page_url, "no .xls link; the page structure may have changed"))?;
    Ok(Url::parse(page_url)?.join(href)?.to_string())
}

/// Clean the workbook rows: English names, normalized dates, derived `Sex`.
pub fn prepare_sheet(rows: Vec<Record>) -> Vec<Record> {
    let rules = FieldRules::new()
        .with_dates(DateRule::on(&["Date of Birth", "Date of Death"]))
        .with_sex(SexRule::civility("Civil Status", "Sex"));
    let renamed: Vec<Record> = rows
        .into_iter()
        .map(|mut r| {
            r.drop_fields(&["Courrier électronique"]);
            r.rename_all(SHEET_RENAMES);
            r
        })
        .collect();
    normalize_all(&renamed, &rules)
}

/// Clean the mandate extract: normalized dates, `"N/A"` for empty cells.
pub fn prepare_mandates(rows: Vec<Record>) -> Vec<Record> {
    let rules = FieldRules::new().with_dates(DateRule::on(&["eludatdeb", "eludatelu", "eludatfin"]));
    normalize_all(&rows, &rules)
        .into_iter()
        .map(|mut r| {
            r.fill_na();
            r.rename("senmat", "Matriculation");
            r
        })
        .collect()
}

/// Attach biographies to mandates and give the mandate fields English names.
pub fn merge(mandates: Vec<Record>, biographies: &[Record]) -> Vec<Record> {
    let spec = JoinSpec::new(
        KeySpec::on(&["Matriculation"]),
        KeySpec::on(&["Matriculation"]),
        JoinPolicy::AllMatches,
    );
    left_join(mandates, biographies, &spec)
        .into_iter()
        .map(|mut r| {
            r.rename_all(MANDATE_RENAMES);
            r
        })
        .collect()
}

/// The local mandate extract.
#[derive(Debug)]
pub struct MandateExtract {
    pub path: PathBuf,
}

impl SourceReader for MandateExtract {
    fn name(&self) -> &str {
        "senmat.csv"
    }

    async fn read<F: Fetch>(&self, _fetcher: &F) -> Result<Vec<Record>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| HarvestError::unavailable(self.path.display().to_string(), e))?;
        let rows = records_from_csv(&text)?;
        info!(path = %self.path.display(), count = rows.len(), "Loaded mandate extract");
        Ok(rows)
    }
}

/// The biography workbook from data.senat.fr.
#[derive(Debug)]
pub struct BiographySheet;

impl SourceReader for BiographySheet {
    fn name(&self) -> &str {
        "data.senat.fr"
    }

    async fn read<F: Fetch>(&self, fetcher: &F) -> Result<Vec<Record>> {
        let html = fetcher
            .get_text(PAGE_URL)
            .await
            .map_err(|e| HarvestError::unavailable(self.name(), e))?;
        let url = find_xls_link(&html, PAGE_URL)?;
        info!(%url, "Downloading the senators .xls dataset");
        let bytes = fetcher
            .get_bytes(&url)
            .await
            .map_err(|e| HarvestError::unavailable(self.name(), e))?;
        let rows = records_from_xls(&bytes)?;
        info!(count = rows.len(), "Loaded senator biographies");
        Ok(rows)
    }
}

/// Run the French Senate collection and return export-ready rows.
#[instrument(level = "info", skip_all, fields(filter_csv = %filter_csv.display()))]
pub async fn collect<F: Fetch>(fetcher: &F, filter_csv: PathBuf) -> Result<Vec<Record>> {
    let biographies = prepare_sheet(BiographySheet.read(fetcher).await?);
    let mandates = prepare_mandates(MandateExtract { path: filter_csv }.read(fetcher).await?);
    let rows = merge(mandates, &biographies);
    info!(rows = rows.len(), "Merged mandates with biographies");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StubFetch;
    use crate::models::NA;

    fn sheet() -> Vec<Record> {
        vec![
            Record::from_pairs([
                ("Matricule", "19010X"),
                ("Qualité", "Mme"),
                ("Nom usuel", "Curie"),
                ("Prénom usuel", "Marie"),
                ("Date naissance", "1867-11-07 00:00:00"),
                ("Courrier électronique", "m.curie@senat.fr"),
            ]),
            Record::from_pairs([
                ("Matricule", "21077M"),
                ("Qualité", "M."),
                ("Nom usuel", "Dupont"),
                ("Prénom usuel", "Jean"),
                ("Date naissance", "not a date"),
            ]),
        ]
    }

    #[test]
    fn test_find_xls_link() {
        let html = format!(r#"<a href="/a.csv" title="CSV">x</a><a title="{XLS_TITLE}" href="/data/senateurs/ODSEN_GENERAL.xls">xls</a>"#);
        assert_eq!(
            find_xls_link(&html, PAGE_URL).unwrap(),
            "https://data.senat.fr/data/senateurs/ODSEN_GENERAL.xls"
        );
        let err = find_xls_link("<a href='x.xls'>x</a>", PAGE_URL).unwrap_err();
        assert!(matches!(err, HarvestError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_prepare_sheet() {
        let rows = prepare_sheet(sheet());
        assert_eq!(rows[0].get("Civil Status"), Some("Mme"));
        assert_eq!(rows[0].get("Sex"), Some("Female"));
        assert_eq!(rows[0].get("Date of Birth"), Some("07/11/1867"));
        assert!(!rows[0].contains("Courrier électronique"));
        assert_eq!(rows[1].get("Sex"), Some("Male"));
        assert_eq!(rows[1].get("Date of Birth"), Some(NA));
    }

    #[test]
    fn test_merge_attaches_biography_to_every_mandate() {
        let csv = "senmat,eludatdeb,eludatelu,eludatfin,etadebmancod\n\
                   21077M,2001-10-01,2001-09-23,,ELU\n\
                   21077M,2008-10-01,2008-09-21,2014-09-30,ELU\n\
                   99999Z,2011-10-01,,,REMP\n";
        let mandates = prepare_mandates(records_from_csv(csv).unwrap());
        let rows = merge(mandates, &prepare_sheet(sheet()));

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("Last Name"), Some("Dupont"));
        assert_eq!(rows[0].get("Mandate Start Date"), Some("01/10/2001"));
        assert_eq!(rows[0].get("Mandate End Date"), Some(NA));
        assert_eq!(rows[1].get("Mandate End Date"), Some("30/09/2014"));
        assert_eq!(rows[1].get("Code Starting the Mandate"), Some("ELU"));
        assert_eq!(rows[2].get("Last Name"), Some(NA));
        assert_eq!(rows[2].get("Election Date"), Some(NA));
        assert!(rows.iter().all(|r| !r.contains("senmat") && !r.contains("eludatdeb")));
    }

    #[tokio::test]
    async fn test_mandate_extract_reads_local_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("senmat.csv");
        std::fs::write(&path, "\u{feff}senmat,eludatdeb\n21077M,2001-10-01\n").unwrap();
        let rows = MandateExtract { path }.read(&StubFetch::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("senmat"), Some("21077M"));
    }

    #[tokio::test]
    async fn test_missing_inputs_are_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = MandateExtract { path: tmp.path().join("nope.csv") };
        let err = missing.read(&StubFetch::new()).await.unwrap_err();
        assert!(matches!(err, HarvestError::SourceUnavailable { .. }));

        let stub = StubFetch::new().page(PAGE_URL, "<html>maintenance</html>");
        let err = collect(&stub, tmp.path().join("senmat.csv")).await.unwrap_err();
        assert!(matches!(err, HarvestError::SourceUnavailable { .. }));
    }
}
