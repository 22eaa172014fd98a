//! Deputies of the 17th legislature (sitting).
//!
//! The data.gouv.fr "députés actifs" CSV is the primary source; a saved
//! multi-criteria result table adds region, committee and socio-professional
//! classification.

use crate::error::{HarvestError, Result};
use crate::fetch::Fetch;
use crate::models::Record;
use crate::pipeline::join::{JoinPolicy, JoinSpec, KeySpec, left_join};
use crate::pipeline::normalize::{DateRule, FieldRules, SexRule, normalize, normalize_all};
use crate::readers::SourceReader;
use crate::readers::csv_table::records_from_csv;
use crate::readers::html_table::SavedTable;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::path::PathBuf;
use tracing::{info, instrument};
use url::Url;

pub const DATASET_URL: &str =
    "https://www.data.gouv.fr/datasets/deputes-actifs-de-lassemblee-nationale-informations-et-statistiques/";
const API_PREFIX: &str = "https://www.data.gouv.fr/api";
pub const OUTPUT_NAME: &str = "FR_dep17_full.csv";

pub const COLUMNS: &[&str] = &[
    "Deputy ID",
    "Legislature",
    "Last Name",
    "First Name",
    "Civil Status",
    "Sex",
    "Place of Birth",
    "Date of Birth",
    "Age",
    "Group",
    "Group Abbreviation",
    "Department",
    "Constituency",
    "Start Date of Current Mandate",
];

const GOUV_RENAMES: &[(&str, &str)] = &[
    ("id", "Deputy ID"),
    ("legislature", "Legislature"),
    ("civ", "Civil Status"),
    ("nom", "Last Name"),
    ("prenom", "First Name"),
    ("villeNaissance", "Place of Birth"),
    ("naissance", "Date of Birth"),
    ("age", "Age"),
    ("groupe", "Group"),
    ("groupeAbrev", "Group Abbreviation"),
    ("departementNom", "Department"),
    ("circo", "Constituency"),
    ("datePriseFonction", "Start Date of Current Mandate"),
    ("job", "Profession"),
    ("nombreMandats", "Number of Parliamentary Terms"),
    ("experienceDepute", "Parliamentary Experience (days/months/years)"),
    ("scoreParticipation", "Participation Score"),
    ("scoreParticipationSpecialite", "Speciality Participation Score"),
    ("scoreLoyaute", "Loyalty Score"),
    ("scoreMajorite", "Proximity to Majority"),
    ("dateMaj", "Last Update"),
];

const TABLE_RENAMES: &[(&str, &str)] = &[
    ("Prénom", "First Name"),
    ("Nom", "Last Name"),
    ("Civilite", "Civil Status"),
];

const TABLE_FIELDS: &[&str] = &["Région", "Commission", "Cat. socioprof.", "Fam. socioprof."];

const MERGED_RENAMES: &[(&str, &str)] = &[
    ("Région", "Region"),
    ("Cat. socioprof.", "Socio-Professional category"),
    ("Fam. socioprof.", "Socio-Professional family"),
];

/// Contact and social-media columns of the CSV, left out of the export.
pub const DROPPED: &[&str] = &["mail", "twitter", "facebook", "website"];

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// First data.gouv.fr API download link on the dataset page.
pub fn find_csv_link(html: &str, page_url: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let href = document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.starts_with(API_PREFIX))
        .ok_or_else(|| HarvestError::unavailable(page_url, "no data.gouv.fr API link on the dataset page"))?;
    Ok(Url::parse(page_url)?.join(href)?.to_string())
}

/// The active-deputies CSV from data.gouv.fr, with English field names.
#[derive(Debug)]
pub struct ActiveDeputies;

impl SourceReader for ActiveDeputies {
    fn name(&self) -> &str {
        "data.gouv.fr deputes-actifs"
    }

    async fn read<F: Fetch>(&self, fetcher: &F) -> Result<Vec<Record>> {
        let html = fetcher
            .get_text(DATASET_URL)
            .await
            .map_err(|e| HarvestError::unavailable(self.name(), e))?;
        let url = find_csv_link(&html, DATASET_URL)?;
        info!(%url, "Found CSV URL");
        let text = fetcher
            .get_text(&url)
            .await
            .map_err(|e| HarvestError::unavailable(self.name(), e))?;
        let rows = records_from_csv(&text)?;
        info!(count = rows.len(), "Loaded active deputies");
        Ok(rows)
    }
}

pub fn prepare_gouv(rows: Vec<Record>) -> Vec<Record> {
    let rules = FieldRules::new().with_sex(SexRule::civility("Civil Status", "Sex"));
    rows.into_iter()
        .map(|mut r| {
            r.rename_all(GOUV_RENAMES);
            normalize(&r, &rules)
        })
        .collect()
}

pub fn merge(gouv: Vec<Record>, table: &[Record]) -> Vec<Record> {
    let table: Vec<Record> = table
        .iter()
        .cloned()
        .map(|mut r| {
            r.rename_all(TABLE_RENAMES);
            r
        })
        .collect();
    let spec = JoinSpec::new(
        KeySpec::on(&["Last Name", "First Name"]),
        KeySpec::on(&["Last Name", "First Name"]),
        JoinPolicy::FirstMatch,
    )
    .with_fields(TABLE_FIELDS);
    let merged: Vec<Record> = left_join(gouv, &table, &spec)
        .into_iter()
        .map(|mut r| {
            r.rename_all(MERGED_RENAMES);
            r
        })
        .collect();
    let dates = FieldRules::new().with_dates(DateRule::on(&[
        "Date of Birth",
        "Start Date of Current Mandate",
        "Last Update",
    ]));
    normalize_all(&merged, &dates)
}

/// Run the 17th-legislature collection with a saved result table.
#[instrument(level = "info", skip_all, fields(table_html = %table_html.display()))]
pub async fn collect<F: Fetch>(fetcher: &F, table_html: PathBuf) -> Result<Vec<Record>> {
    let gouv = prepare_gouv(ActiveDeputies.read(fetcher).await?);
    let table = SavedTable::new(table_html, "table").read(fetcher).await?;
    let rows = merge(gouv, &table);
    info!(rows = rows.len(), "Merged deputies");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StubFetch;
    use crate::models::NA;
    use crate::outputs::csv::CsvExporter;

    const GOUV_CSV: &str = "id,legislature,civ,nom,prenom,naissance,datePriseFonction,mail,twitter,dateMaj\n\
        PA1,17,Mme,Curie,Marie,1967-11-07,2024-07-18,m@an.fr,@mc,2025-01-02T10:00:00.000Z\n\
        PA2,17,M.,Dupont,Jean,,2024-07-18,j@an.fr,,2025-01-02T10:00:00.000Z\n";

    const TABLE: &str = r#"<table>
        <thead><tr><th>Civilite</th><th>Prénom</th><th>Nom</th><th>Région</th><th>Commission</th><th>Cat. socioprof.</th><th>Fam. socioprof.</th></tr></thead>
        <tbody>
          <tr><td>Mme</td><td>Marie</td><td>CURIE</td><td>Île-de-France</td><td>Affaires culturelles</td><td>Cadres</td><td>Cadres et professions</td></tr>
        </tbody></table>"#;

    #[test]
    fn test_find_csv_link() {
        let html = r#"<a href="/fr/datasets/x">x</a><a href="https://www.data.gouv.fr/api/1/datasets/r/abc">csv</a>"#;
        assert_eq!(
            find_csv_link(html, DATASET_URL).unwrap(),
            "https://www.data.gouv.fr/api/1/datasets/r/abc"
        );
        assert!(find_csv_link("<p/>", DATASET_URL).is_err());
    }

    #[test]
    fn test_merge() {
        let gouv = prepare_gouv(records_from_csv(GOUV_CSV).unwrap());
        let table = crate::readers::html_table::records_from_table(TABLE, "table").unwrap();
        let rows = merge(gouv, &table);

        assert_eq!(rows.len(), 2);
        let r = &rows[0];
        assert_eq!(r.get("Deputy ID"), Some("PA1"));
        assert_eq!(r.get("Sex"), Some("Female"));
        assert_eq!(r.get("Region"), Some("Île-de-France"));
        assert_eq!(r.get("Socio-Professional family"), Some("Cadres et professions"));
        assert_eq!(r.get("Date of Birth"), Some("07/11/1967"));
        assert_eq!(r.get("Last Update"), Some("02/01/2025"));
        assert!(!r.contains("Région"));
        assert!(r.contains("mail"));

        assert_eq!(rows[1].get("Sex"), Some("Male"));
        assert_eq!(rows[1].get("Commission"), Some(NA));
        assert_eq!(rows[1].get("Date of Birth"), Some(NA));
    }

    #[tokio::test]
    async fn test_collect() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dep17.html");
        std::fs::write(&path, TABLE).unwrap();
        let stub = StubFetch::new()
            .page(DATASET_URL, r#"<a href="https://www.data.gouv.fr/api/1/datasets/r/abc">csv</a>"#)
            .page("https://www.data.gouv.fr/api/1/datasets/r/abc", GOUV_CSV);
        let rows = collect(&stub, path).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Commission"), Some("Affaires culturelles"));

        let header = CsvExporter::new(COLUMNS).dropping(DROPPED).schema(&rows);
        assert_eq!(header[0], "Deputy ID");
        assert!(!header.iter().any(|c| c == "mail" || c == "twitter"));
        assert!(header.iter().any(|c| c == "Region"));
    }
}
