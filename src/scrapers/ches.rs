//! Chapel Hill Expert Survey (CHES) party positions for France and the UK.
//!
//! The survey page links several CSV files; three are kept:
//! the 1999-2019 trend file, the 2024 wave (not the Ukraine supplement) and
//! the 2017 flash survey (not the combined-experts file). Each file is filtered
//! to French and British parties, its `family` code mapped to a label, and the
//! rows combined, labelled with party names and sorted.

use crate::error::{HarvestError, Result};
use crate::fetch::{Fetch, fetch_all};
use crate::models::{NA, Record};
use crate::pipeline::normalize::{CodeRule, FieldRules, normalize};
use crate::readers::SourceReader;
use crate::readers::csv_table::records_from_csv;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const INDEX_URL: &str = "https://www.chesdata.eu/ches-europe";
pub const OUTPUT_NAME: &str = "ches_parties_UK_FR.csv";
pub const COLUMNS: &[&str] = &[
    "country", "year", "party_id", "party_abb", "party_name", "family", "lrgen", "galtan",
];

const SELECTED: &[&str] = &["country", "year", "party_id", "family", "lrgen", "galtan"];
const DEFAULT_YEAR: i64 = 2024;

pub const FAMILIES: &[(i64, &str)] = &[
    (1, "Radical Right"),
    (2, "Conservatives"),
    (3, "Liberal"),
    (4, "Christian-Democratic"),
    (5, "Socialist"),
    (6, "Radical Left"),
    (7, "Green"),
    (8, "Regionalist"),
    (9, "No family"),
    (10, "Confessional"),
    (11, "Agrarian/Center"),
];

/// CHES `party_id` → (abbreviation, full name).
pub const PARTIES: &[(i64, &str, &str)] = &[
    (601, "PCF", "Parti Communiste Français"),
    (602, "PS", "Parti Socialiste"),
    (603, "PRG", "Parti Radical de Gauche"),
    (605, "VERTS; EELV", "Les Verts; Europe Écologie Les Verts"),
    (609, "RPR; UMP; LR", "Rassemblement pour la République; Union pour un Mouvement Populaire; Les Républicains"),
    (610, "FN; RN", "Front National; Rassemblement national"),
    (612, "RPF/MPF;MPF", "Rassemblement pour la France/Mouvement Pour la France;  Mouvement Pour la France"),
    (613, "UDF; MoDem", "Union pour la Démocratie Française; Mouvement Démocrate"),
    (614, "LO-LCR", "Lutte Ouvrière/Ligue communiste révolutionnaire"),
    (615, "DL", "Démocratie Libérale"),
    (617, "MEI", "Mouvement Ecologiste Indépendant"),
    (618, "D", "La Droite"),
    (619, "CPNT", "Chasse, Pêche, Nature, Traditions"),
    (620, "MN", "Mouvement National Républicain"),
    (621, "NC", "Nouveau Centre"),
    (622, "PRV", "Parti radical"),
    (623, "AC", "Alliance centriste"),
    (624, "PG", "Parti de Gauche"),
    (625, "Ens", "Ensemble"),
    (626, "RE; REM", "Rennaissance; La République En Marche"),
    (627, "FI", "La France Insourmise"),
    (628, "DLF", "Debout la France"),
    (630, "REC", "Reconquête"),
    (631, "Horizons", "Horizons"),
    (1101, "Cons", "Conservative Party"),
    (1102, "Lab", "Labour Party"),
    (1104, "LibDem", "Liberal Democratic Party"),
    (1105, "SNP", "Scottish National Party"),
    (1106, "Plaid", "Plaid Cymru"),
    (1107, "Green", "Green Party"),
    (1108, "UKIP", "United Kingdom Independence Party"),
    (1109, "BNP", "British National Party"),
    (1110, "Brexit; REF UK", "Brexit Party; Reform UK"),
    (1150, "SF", "Sinn Féin"),
    (1151, "DUP", "Democratic Unionist Party"),
];

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Survey CSV links worth downloading, resolved against the page URL.
pub fn select_csv_links(html: &str, page_url: &str) -> Result<Vec<String>> {
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for a in document.select(&LINK) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        if !href.to_lowercase().ends_with(".csv") {
            continue;
        }
        let wanted = href.contains("1999-2019")
            || (href.contains("2024") && !href.contains("Ukraine"))
            || (href.contains("2017") && !href.contains("combined_experts"));
        if !wanted {
            continue;
        }
        if let Ok(resolved) = base.join(href) {
            links.push(resolved.to_string());
        }
    }
    Ok(links)
}

fn as_int(value: Option<&str>) -> Option<i64> {
    let v = value?.trim();
    v.parse::<i64>().ok().or_else(|| {
        v.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Country code as it appears in the output (`fr`, `uk`), if the row is in scope.
fn country_of(raw: Option<&str>) -> Option<&'static str> {
    let raw = raw?.trim();
    match as_int(Some(raw)) {
        Some(6) => Some("fr"),
        Some(11) => Some("uk"),
        Some(_) => None,
        None => match raw.to_uppercase().as_str() {
            "FR" => Some("fr"),
            "UK" => Some("uk"),
            _ => None,
        },
    }
}

/// The 2024 wave file carries no `year` column; it is recognized by file name.
fn is_2024_wave(url: &str) -> bool {
    let file = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string)),
        Err(_) => url.rsplit('/').next().map(str::to_string),
    };
    file.is_some_and(|name| name.starts_with("CHES_2024"))
}

/// Keep French and British rows of one survey file, with the selected columns.
pub fn filter_survey(url: &str, records: &[Record]) -> Vec<Record> {
    let rules = FieldRules::new().with_code(CodeRule::new("family", FAMILIES));
    let wave_2024 = is_2024_wave(url);
    records
        .iter()
        .filter(|r| country_of(r.get("country")).is_some())
        .map(|r| {
            let mut row = Record::new();
            for column in SELECTED {
                if r.contains(column) {
                    row.set_opt(*column, r.get(column).map(str::to_string));
                }
            }
            if wave_2024 {
                row.set("year", DEFAULT_YEAR.to_string());
            }
            if row.contains("family") {
                row = normalize(&row, &rules);
            }
            row
        })
        .collect()
}

/// Combine filtered survey rows: canonical country, integer year and party id,
/// party labels, stable sort.
pub fn finalize(rows: Vec<Record>) -> Vec<Record> {
    let mut keyed: Vec<((&'static str, i64, i64), Record)> = Vec::new();
    for row in rows {
        let Some(country) = country_of(row.get("country")) else {
            continue;
        };
        let Some(party_id) = as_int(row.get("party_id")) else {
            debug!("Dropping CHES row without party_id");
            continue;
        };
        let year = as_int(row.get("year")).unwrap_or(DEFAULT_YEAR);
        let (abb, name) = PARTIES
            .iter()
            .find(|(id, _, _)| *id == party_id)
            .map(|(_, abb, name)| (*abb, *name))
            .unwrap_or((NA, NA));

        let mut out = Record::new();
        out.set("country", country);
        out.set("year", year.to_string());
        out.set("party_id", party_id.to_string());
        out.set("party_abb", abb);
        out.set("party_name", name);
        out.set("family", row.get_or_na("family"));
        out.set("lrgen", row.get_or_na("lrgen"));
        out.set("galtan", row.get_or_na("galtan"));
        keyed.push(((country, party_id, year), out));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, r)| r).collect()
}

/// All selected survey files, filtered to FR/UK rows.
#[derive(Debug)]
pub struct ChesSurveys {
    pub concurrency: usize,
}

impl SourceReader for ChesSurveys {
    fn name(&self) -> &str {
        "chesdata.eu"
    }

    async fn read<F: Fetch>(&self, fetcher: &F) -> Result<Vec<Record>> {
        let html = fetcher
            .get_text(INDEX_URL)
            .await
            .map_err(|e| HarvestError::unavailable(self.name(), e))?;
        let links = select_csv_links(&html, INDEX_URL)?;
        info!(count = links.len(), "Selected CHES survey files");
        if links.is_empty() {
            return Err(HarvestError::unavailable(self.name(), "no survey CSV links on the page"));
        }

        let per_file = fetch_all(links, self.concurrency, |url: String| async move {
            info!(%url, "Downloading survey file");
            let text = fetcher.get_text(&url).await?;
            let records = records_from_csv(&text)?;
            let kept = filter_survey(&url, &records);
            info!(%url, rows = records.len(), kept = kept.len(), "Filtered survey file");
            Ok::<_, HarvestError>(kept)
        })
        .await;

        if per_file.is_empty() {
            warn!("Every CHES survey download failed");
        }
        Ok(per_file.into_iter().flatten().collect())
    }
}

/// Run the whole CHES collection and return export-ready rows.
#[instrument(level = "info", skip_all)]
pub async fn collect<F: Fetch>(fetcher: &F, concurrency: usize) -> Result<Vec<Record>> {
    let surveys = ChesSurveys { concurrency }.read(fetcher).await?;
    let rows = finalize(surveys);
    info!(rows = rows.len(), "Combined CHES rows");
    Ok(rows)
}
