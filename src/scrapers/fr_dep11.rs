//! Deputies of the 11th legislature (1997-2002).
//!
//! The Assembly's multi-criteria search result table gives identity, group,
//! constituency and local mandates, but no mandate dates. Those, and the place
//! of birth, come from each deputy's profile page, listed on the alphabetical
//! index of the legislature.

use crate::error::{HarvestError, Result};
use crate::fetch::{Fetch, fetch_all};
use crate::models::{NA, Record};
use crate::pipeline::join::{JoinPolicy, JoinSpec, KeySpec, left_join};
use crate::pipeline::normalize::{DateRule, FieldRules, SexRule, normalize, normalize_all};
use crate::readers::SourceReader;
use crate::readers::html_table::{SavedTable, element_text};
use crate::utils::clean_text;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const LIST_URL: &str = "https://www.assemblee-nationale.fr/qui/xml/liste_alpha.asp?legislature=11";
pub const TABLE_CSS: &str = "table#tablesorter0";
pub const OUTPUT_NAME: &str = "FR_dep11_full.csv";

pub const COLUMNS: &[&str] = &[
    "Last Name",
    "First Name",
    "Civil Status",
    "Sex",
    "Date of Birth",
    "Place of Birth",
    "Political Group",
    "Mandate Start Date",
    "Mandate End Date",
    "Electoral Region",
    "Constituency Number",
    "Electoral Department",
    "Standing Committee",
    "Profession",
    "Socio-Professional category",
    "Socio-Professional family",
    "Departmental Council",
    "Regional Council",
    "Municipal Council",
    "Departmental Mandate",
    "Regional Mandate",
    "Municipal Mandate",
    "Other Local Mandate",
];

const DROPPED: &[&str] = &["Lien fiche", "Catégorie d'âge", "Age"];
const PROFILE_FIELDS: &[&str] = &["Place of Birth", "Mandate Start Date", "Mandate End Date"];

const RENAMES: &[(&str, &str)] = &[
    ("Prénom", "First Name"),
    ("Nom", "Last Name"),
    ("Civilite", "Civil Status"),
    ("Groupe", "Political Group"),
    ("Région d'élection", "Electoral Region"),
    ("N° circ.", "Constituency Number"),
    ("Commission permanente", "Standing Committee"),
    ("Catégorie socioprofessionnelle", "Socio-Professional category"),
    ("Famille socioprofessionnelle", "Socio-Professional family"),
    ("Date de naissance", "Date of Birth"),
    ("Conseil municipal", "Municipal Council"),
    ("Conseil régional", "Regional Council"),
    ("Autre mandat local", "Other Local Mandate"),
    ("Département d'élection", "Electoral Department"),
    ("Mandat communal", "Municipal Mandate"),
    ("Conseil départemental", "Departmental Council"),
    ("Mandat départemental", "Departmental Mandate"),
    ("Mandat régional", "Regional Mandate"),
];

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static B: Lazy<Selector> = Lazy::new(|| Selector::parse("b").unwrap());
static TITLE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(M(?:me)?\.?|MM\.?|AM)\s+").unwrap());
static MANDATE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)MANDAT À L'ASSEMBLÉE NATIONALE").unwrap());
static START_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)date de début de mandat\s*:\s*(\d{2}/\d{2}/\d{4})").unwrap());
static END_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)fin du mandat au\s*:\s*(\d{2}/\d{2}/\d{4})").unwrap());

/// One entry of the alphabetical index.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileLink {
    pub order: usize,
    pub name: String,
    pub url: String,
}

impl fmt::Display for ProfileLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Anchor text without the text of nested `<span>`s.
fn text_without_spans(a: ElementRef<'_>) -> String {
    let parts: Vec<&str> = a
        .descendants()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let in_span = node
                .ancestors()
                .take_while(|n| n.id() != a.id())
                .any(|n| n.value().as_element().is_some_and(|e| e.name() == "span"));
            (!in_span).then_some(&**text)
        })
        .collect();
    clean_text(&parts.join(" "))
}

/// `M. Jean Dupont` → `Jean Dupont`.
pub fn strip_title(raw: &str) -> String {
    TITLE_PREFIX.replace(raw, "").trim().to_string()
}

/// Profile links of the alphabetical index, in page order.
pub fn parse_profile_links(html: &str, list_url: &str) -> Result<Vec<ProfileLink>> {
    let base = Url::parse(list_url)?;
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for a in document.select(&ANCHOR) {
        let Some(href) = a.value().attr("href").filter(|h| h.contains("fiches_id")) else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            continue;
        };
        links.push(ProfileLink {
            order: links.len(),
            name: strip_title(&text_without_spans(a)),
            url: url.to_string(),
        });
    }
    Ok(links)
}

/// Place of birth and 11th-legislature mandate dates from one profile page.
pub fn parse_profile(html: &str, name: &str) -> Record {
    let document = Html::parse_document(html);

    let birth_place = document
        .select(&P)
        .map(element_text)
        .find(|t| t.contains("Né"))
        .and_then(|t| t.split_once(" à ").map(|(_, place)| place.trim().to_string()))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| NA.to_string());

    let mandate_text = document
        .select(&B)
        .find(|b| MANDATE_HEADER.is_match(&element_text(*b)))
        .and_then(|b| b.ancestors().filter_map(ElementRef::wrap).nth(3))
        .and_then(|section| {
            section
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "ul")
        })
        .map(|ul| ul.select(&P).map(element_text).collect::<Vec<_>>().join("\n"))
        .unwrap_or_default();
    let capture = |re: &Regex| {
        re.captures(&mandate_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| NA.to_string())
    };

    Record::from_pairs([
        ("Name", name.to_string()),
        ("Place of Birth", birth_place),
        ("Mandate Start Date", capture(&START_DATE)),
        ("Mandate End Date", capture(&END_DATE)),
    ])
}

/// Profile pages of every deputy on the alphabetical index.
#[derive(Debug)]
pub struct DeputyProfiles {
    pub concurrency: usize,
}

impl SourceReader for DeputyProfiles {
    fn name(&self) -> &str {
        "assemblee-nationale.fr liste_alpha"
    }

    async fn read<F: Fetch>(&self, fetcher: &F) -> Result<Vec<Record>> {
        let html = fetcher
            .get_text(LIST_URL)
            .await
            .map_err(|e| HarvestError::unavailable(self.name(), e))?;
        let links = parse_profile_links(&html, LIST_URL)?;
        info!(count = links.len(), "Scraping individual profiles");

        let mut profiles = fetch_all(links, self.concurrency, |link: ProfileLink| async move {
            let html = fetcher.get_text(&link.url).await?;
            let profile = parse_profile(&html, &link.name);
            debug!(name = %link.name, "Parsed profile");
            Ok::<_, HarvestError>((link.order, profile))
        })
        .await;
        profiles.sort_by_key(|(order, _)| *order);
        Ok(profiles.into_iter().map(|(_, p)| p).collect())
    }
}

/// Drop the unused columns of the search table and derive `Sex`.
pub fn prepare_table(rows: Vec<Record>) -> Vec<Record> {
    let rules = FieldRules::new().with_sex(SexRule::civility("Civilite", "Sex"));
    rows.into_iter()
        .map(|mut r| {
            r.drop_fields(DROPPED);
            normalize(&r, &rules)
        })
        .collect()
}

/// Join table rows with their profiles and rename to English.
pub fn merge(table: Vec<Record>, profiles: &[Record]) -> Vec<Record> {
    let spec = JoinSpec::new(
        KeySpec::on(&["Prénom", "Nom"]),
        KeySpec::on(&["Name"]),
        JoinPolicy::FirstMatch,
    )
    .with_fields(PROFILE_FIELDS);
    let rules = FieldRules::new().with_dates(DateRule::on(&["Mandate Start Date", "Mandate End Date"]));
    let merged: Vec<Record> = left_join(table, profiles, &spec)
        .into_iter()
        .map(|mut r| {
            r.rename_all(RENAMES);
            r
        })
        .collect();
    normalize_all(&merged, &rules)
}

/// Run the 11th-legislature collection from a saved search result page.
#[instrument(level = "info", skip_all, fields(table_html = %table_html.display()))]
pub async fn collect<F: Fetch>(fetcher: &F, table_html: PathBuf, concurrency: usize) -> Result<Vec<Record>> {
    let table = prepare_table(SavedTable::new(table_html, TABLE_CSS).read(fetcher).await?);
    let reader = DeputyProfiles { concurrency };
    let profiles = match reader.read(fetcher).await {
        Ok(profiles) => profiles,
        Err(e) => {
            warn!(error = %e, "Profile list unavailable; profile fields will be N/A");
            Vec::new()
        }
    };
    info!(table = table.len(), profiles = profiles.len(), "Merging table and profiles");
    Ok(merge(table, &profiles))
}
