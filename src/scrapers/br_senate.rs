//! Brazilian Federal Senate, legislatures 51 to 58.
//!
//! Three sources are reconciled:
//!
//! 1. **Search results** (`www6g.senado.leg.br/busca`): one page per 20
//!    senators, linking to personal profiles. Each profile gives identity,
//!    party (sitting senators only), commissions, mandates, education, ticket
//!    position and professions.
//! 2. **Previous legislatures** (`www25.senado.leg.br/.../legislaturas-anteriores`):
//!    short name → party abbreviation, used to fill the party of senators whose
//!    profile does not show one.
//! 3. **Party groups** on the same site: abbreviation → full party name.
//!
//! Output is long format: one row per mandate, with commissions joined into one
//! cell and professions spread over numbered columns.

use crate::error::{HarvestError, Result};
use crate::fetch::{Fetch, fetch_all};
use crate::models::{Entity, NA, Record};
use crate::pipeline::expand::{ListPolicy, SubItemSpec, expand_all, flatten_list, numbered_width};
use crate::pipeline::join::{JoinPolicy, JoinSpec, KeySpec, left_join};
use crate::pipeline::normalize::{DateRule, FieldRules, normalize};
use crate::readers::SourceReader;
use crate::readers::html_table::element_text;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const SEARCH_URL: &str = "https://www6g.senado.leg.br/busca/?colecao=Senadores";
pub const LEGISLATURES_URL: &str = "https://www25.senado.leg.br/web/senadores/legislaturas-anteriores/-/a";
pub const OUTPUT_NAME: &str = "br_senate.csv";

pub const SEARCH_LEGISLATURES: std::ops::RangeInclusive<u32> = 51..=58;
pub const ARCHIVE_LEGISLATURES: std::ops::RangeInclusive<u32> = 51..=56;
const MAX_SEARCH_PAGES: u32 = 16;

pub const COLUMNS: &[&str] = &[
    "Full Name",
    "Short Name",
    "Date of Birth",
    "Place of Birth",
    "Sex",
    "Status",
    "Party Abbreviation",
    "Party Full Name",
    "Position in party",
    "Education level",
    "Number of terms in Senate",
    "Position in the last ticket",
    "Commissions",
];

static RESULT_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("div.sf-busca-resultados-item").unwrap());
static H3: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static PERSONAL_DD: Lazy<Selector> = Lazy::new(|| Selector::parse("dl.dl-horizontal").unwrap());
static DD: Lazy<Selector> = Lazy::new(|| Selector::parse("dd").unwrap());
static HEAD_H1: Lazy<Selector> = Lazy::new(|| Selector::parse("div.head h1").unwrap());
static SMALL: Lazy<Selector> = Lazy::new(|| Selector::parse("small").unwrap());
static BIO: Lazy<Selector> = Lazy::new(|| Selector::parse("div#accordion-biografia").unwrap());
static COMMISSION_ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("div#comissoes tbody tr").unwrap());
static MANDATE_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"table.table.table-striped[title="Mandatos do(a) senador(a)"] tbody tr"#).unwrap()
});
static EDUCATION_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"table.table.table-striped[title="Histórico acadêmico do(a) senador(a)"] tbody tr"#).unwrap()
});
static TICKET_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"table.table.table-striped[title="Chapa eleitoral do Senador"] tbody tr"#).unwrap()
});
static TERMS: Lazy<Selector> = Lazy::new(|| Selector::parse("div#accordion-mandatos-exercicios").unwrap());
static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static LI: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static SENATOR_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table.table#senadoreslegislaturasanteriores-tabela-senadores tbody tr").unwrap()
});
static SENATOR_TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#senadoreslegislaturasanteriores-tabela-senadores").unwrap());
static GROUP_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table.table#senadoreslegislaturasanteriores-tabela-senadores tbody tr.search-group-row").unwrap()
});

/// Marker of a senator out of office, as it appears in the page text.
const OUT_OF_SERVICE: &str = " (Fora de Exercício) ";

fn search_page_url(legislature: u32, page: u32) -> String {
    let label = urlencoding::encode(&format!("{legislature}ª Legislatura")).into_owned();
    format!("{SEARCH_URL}&legislatura={label}&p={page}")
}

fn text_of(el: Option<ElementRef<'_>>) -> String {
    el.map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NA.to_string())
}

/// A profile link found on a search page, with the sex read from the result block.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub order: usize,
    pub profile_url: String,
    pub sex: String,
    /// Legislatures whose search listed this profile.
    pub legislatures: Vec<u32>,
}

impl fmt::Display for SearchHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.profile_url)
    }
}

/// Profile links on one search result page.
pub fn parse_search_results(html: &str, page_url: &str) -> Result<Vec<SearchHit>> {
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);
    let mut hits = Vec::new();
    for item in document.select(&RESULT_ITEM) {
        let Some(link) = item
            .select(&H3)
            .next()
            .and_then(|h3| h3.select(&ANCHOR).next())
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Ok(profile_url) = base.join(link) else {
            continue;
        };
        let block = element_text(item).to_lowercase();
        let sex = if block.contains("senadora") {
            "Female"
        } else if block.contains("senador") {
            "Male"
        } else {
            NA
        };
        hits.push(SearchHit {
            order: 0,
            profile_url: profile_url.to_string(),
            sex: sex.to_string(),
            legislatures: Vec::new(),
        });
    }
    Ok(hits)
}

/// Party and position inside the party from the header `<small>` text,
/// e.g. `"Senador - PT (Líder)"`.
fn party_and_position(party_tag: &str, out_of_service: bool) -> (String, String) {
    let parts: Vec<&str> = party_tag.split(" - ").map(str::trim).collect();
    let party = parts
        .get(1)
        .and_then(|p| p.split('(').next())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(NA)
        .to_string();
    let position = if out_of_service {
        NA
    } else if party_tag.contains("Líder") {
        "Leader"
    } else if party_tag.contains("1° Vice-líder") {
        "1st Vice-leader"
    } else if party_tag.contains("2° Vice-líder") {
        "2nd Vice-leader"
    } else {
        "Member"
    };
    (party, position.to_string())
}

/// Everything read from one profile page.
#[derive(Debug, Clone)]
pub struct SenatorProfile {
    pub record: Record,
    pub mandates: Vec<Record>,
    pub professions: Vec<String>,
    pub commissions: Vec<String>,
}

/// Parse one senator profile page.
pub fn parse_profile(html: &str, sex: &str) -> SenatorProfile {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let personal: Vec<ElementRef<'_>> = document
        .select(&PERSONAL_DD)
        .next()
        .map(|dl| dl.select(&DD).collect())
        .unwrap_or_default();
    let full_name = text_of(personal.first().copied());
    let birth_date = text_of(personal.get(1).copied());
    let birth_place = text_of(personal.get(2).copied());

    let short_name = document
        .select(&HEAD_H1)
        .next()
        .map(element_text)
        .and_then(|h1| h1.split(" -").next().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NA.to_string());

    let page_text: String = root.text().collect();
    let out_of_service = page_text.contains(OUT_OF_SERVICE);
    let party_tag = document.select(&SMALL).next().map(element_text).unwrap_or_default();
    let (party, position) = party_and_position(&party_tag, out_of_service);
    let status = if out_of_service { "Out of Service" } else { "Sitting" };

    let commissions: Vec<String> = document
        .select(&COMMISSION_ROWS)
        .filter_map(|tr| tr.select(&TD).next().map(element_text))
        .collect();

    let bio = document.select(&BIO).next();
    let mandates: Vec<Record> = bio
        .map(|b| {
            b.select(&MANDATE_ROWS)
                .filter_map(|tr| {
                    let cols: Vec<String> = tr.select(&TD).map(element_text).collect();
                    (cols.len() >= 3).then(|| {
                        Record::from_pairs([
                            ("Position", cols[0].as_str()),
                            ("Start date", cols[1].as_str()),
                            ("End date", cols[2].as_str()),
                        ])
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let terms = document
        .select(&TERMS)
        .next()
        .map(|d| d.text().collect::<String>().to_lowercase().matches("legislaturas").count())
        .unwrap_or(0);

    let degree = bio
        .and_then(|b| b.select(&EDUCATION_ROWS).last())
        .and_then(|tr| tr.select(&TD).nth(1))
        .map(element_text)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| NA.to_string());

    let ticket = document
        .select(&TICKET_ROWS)
        .enumerate()
        .find(|(_, tr)| short_name != NA && element_text(*tr).contains(&short_name))
        .map(|(idx, _)| match idx {
            0 => "Holder",
            1 => "1st alternate",
            2 => "2nd alternate",
            _ => NA,
        })
        .unwrap_or(NA);

    let professions = bio.map(professions_in).unwrap_or_default();

    let record = Record::from_pairs([
        ("Full Name", full_name.as_str()),
        ("Short Name", short_name.as_str()),
        ("Date of Birth", birth_date.as_str()),
        ("Place of Birth", birth_place.as_str()),
        ("Sex", sex),
        ("Status", status),
        ("Party", party.as_str()),
        ("Position in party", position.as_str()),
        ("Education level", degree.as_str()),
        ("Number of terms in Senate", terms.to_string().as_str()),
        ("Position in the last ticket", ticket),
    ]);

    SenatorProfile {
        record,
        mandates,
        professions,
        commissions,
    }
}

/// `<li>` items of the list following the "Profissões" heading.
fn professions_in(bio: ElementRef<'_>) -> Vec<String> {
    let Some(heading) = bio
        .select(&H3)
        .find(|h3| element_text(*h3).to_lowercase().contains("profissões"))
    else {
        return Vec::new();
    };
    heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "ul")
        .map(|ul| ul.select(&LI).map(element_text).collect())
        .unwrap_or_default()
}

/// Short name → party rows of one previous-legislature page.
pub fn parse_legislature_parties(html: &str) -> Option<Vec<Record>> {
    let document = Html::parse_document(html);
    let mut rows = document.select(&SENATOR_ROWS).peekable();
    rows.peek()?;
    let records = rows
        .filter(|tr| matches!(tr.value().attr("data-suplente"), Some("0") | Some("1")))
        .filter_map(|tr| {
            let cols: Vec<ElementRef<'_>> = tr.select(&TD).collect();
            let first = *cols.first()?;
            let name = first
                .select(&ANCHOR)
                .next()
                .map(element_text)
                .unwrap_or_else(|| element_text(first));
            if name.is_empty() {
                return None;
            }
            let party = match text_of(cols.get(1).copied()) {
                p if p == "-" => "S/Partido".to_string(),
                p => p,
            };
            Some(Record::from_pairs([("Short Name", name), ("Party", party)]))
        })
        .collect();
    Some(records)
}

/// `ABB - Full Name` group rows of one `por-partido` page.
pub fn parse_party_groups(html: &str) -> Option<Vec<(String, String)>> {
    let document = Html::parse_document(html);
    let mut rows = document.select(&GROUP_ROWS).peekable();
    if rows.peek().is_none() {
        // the table itself may be present with no group rows
        document.select(&SENATOR_TABLE).next()?;
    }
    Some(
        rows.filter_map(|tr| {
            let text = element_text(tr);
            let (abb, name) = text.split_once(" - ")?;
            Some((abb.trim().to_string(), name.trim().to_string()))
        })
        .collect(),
    )
}

/// Party abbreviation → full name pairs across the archive legislatures.
///
/// Pages that fail or lack the table are logged and skipped.
pub async fn read_party_groups<F: Fetch>(fetcher: &F) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for leg in ARCHIVE_LEGISLATURES {
        let url = format!("{LEGISLATURES_URL}/{leg}/por-partido");
        info!(legislature = leg, "Scraping party abbreviation-name pairs");
        match fetcher.get_text(&url).await {
            Ok(html) => match parse_party_groups(&html) {
                Some(found) => pairs.extend(found),
                None => warn!(legislature = leg, "Party table not found; page structure may have changed"),
            },
            Err(e) => warn!(legislature = leg, error = %e, "Failed to fetch party page"),
        }
    }
    pairs
}

/// Senators found through the search pages, with their profiles.
#[derive(Debug)]
pub struct SenateProfiles {
    pub concurrency: usize,
}

impl SenateProfiles {
    #[instrument(level = "info", skip_all)]
    async fn crawl_search<F: Fetch>(&self, fetcher: &F) -> Vec<SearchHit> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut hits: Vec<SearchHit> = Vec::new();
        for leg in SEARCH_LEGISLATURES {
            info!(legislature = leg, "Processing legislature");
            for page in 1..=MAX_SEARCH_PAGES {
                let url = search_page_url(leg, page);
                let html = match fetcher.get_text(&url).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(legislature = leg, page, error = %e, "Search request failed");
                        break;
                    }
                };
                let found = match parse_search_results(&html, SEARCH_URL) {
                    Ok(found) if !found.is_empty() => found,
                    _ => {
                        debug!(legislature = leg, page, "No more senators found");
                        break;
                    }
                };
                for mut hit in found {
                    match seen.get(&hit.profile_url) {
                        Some(&i) => hits[i].legislatures.push(leg),
                        None => {
                            hit.order = hits.len();
                            hit.legislatures.push(leg);
                            seen.insert(hit.profile_url.clone(), hit.order);
                            hits.push(hit);
                        }
                    }
                }
            }
        }
        info!(count = hits.len(), "Indexed senator profiles");
        hits
    }

    pub async fn read_profiles<F: Fetch>(&self, fetcher: &F) -> Result<Vec<SenatorProfile>> {
        let hits = self.crawl_search(fetcher).await;
        if hits.is_empty() {
            return Err(HarvestError::unavailable("senado.leg.br search", "no senator found"));
        }
        let mut profiles = fetch_all(hits, self.concurrency, |hit: SearchHit| async move {
            let html = fetcher.get_text(&hit.profile_url).await?;
            let profile = parse_profile(&html, &hit.sex);
            debug!(
                name = %profile.record.get_or_na("Short Name"),
                legislatures = ?hit.legislatures,
                "Processed senator"
            );
            Ok::<_, HarvestError>((hit.order, profile))
        })
        .await;
        profiles.sort_by_key(|(order, _)| *order);
        info!(count = profiles.len(), "Main scrape complete");
        Ok(profiles.into_iter().map(|(_, p)| p).collect())
    }
}

/// Short name → party rows in reverse reading order.
///
/// Legislatures are read oldest first and rows top to bottom; reversing the
/// whole list puts the last row read for a name first, so a first-match join
/// takes the most recent party.
#[derive(Debug)]
pub struct ArchiveParties;

impl SourceReader for ArchiveParties {
    fn name(&self) -> &str {
        "senado.leg.br legislaturas-anteriores"
    }

    async fn read<F: Fetch>(&self, fetcher: &F) -> Result<Vec<Record>> {
        let mut per_leg = Vec::new();
        for leg in ARCHIVE_LEGISLATURES {
            let url = format!("{LEGISLATURES_URL}/{leg}");
            info!(legislature = leg, "Updating party data");
            match fetcher.get_text(&url).await {
                Ok(html) => match parse_legislature_parties(&html) {
                    Some(rows) => per_leg.push(rows),
                    None => warn!(legislature = leg, "No senators table found; page structure may have changed"),
                },
                Err(e) => warn!(legislature = leg, error = %e, "Failed to fetch legislature page"),
            }
        }
        let mut rows: Vec<Record> = per_leg.into_iter().flatten().collect();
        rows.reverse();
        Ok(rows)
    }
}

/// Reconcile profiles with the archive party data and expand mandates.
pub fn reconcile(
    profiles: Vec<SenatorProfile>,
    archive_parties: &[Record],
    party_groups: &[(String, String)],
) -> Vec<Record> {
    let rules = FieldRules::new().with_dates(DateRule::on(&["Date of Birth"]));
    let (records, rest): (Vec<Record>, Vec<_>) = profiles
        .into_iter()
        .map(|p| (normalize(&p.record, &rules), (p.mandates, p.professions, p.commissions)))
        .unzip();

    // Archive rows arrive last-read first.
    let fill_party = JoinSpec::new(
        KeySpec::on(&["Short Name"]),
        KeySpec::on(&["Short Name"]),
        JoinPolicy::FirstMatch,
    )
    .with_fields(&["Party"]);
    let mut records = left_join(records, archive_parties, &fill_party);
    for r in records.iter_mut() {
        r.rename("Party", "Party Abbreviation");
    }

    // First pair seen for an abbreviation wins.
    let names: Vec<Record> = party_groups
        .iter()
        .map(|(abb, name)| Record::from_pairs([("abb", abb.as_str()), ("Party Full Name", name.as_str())]))
        .collect();
    let full_name = JoinSpec::new(
        KeySpec::on(&["Party Abbreviation"]),
        KeySpec::on(&["abb"]),
        JoinPolicy::FirstMatch,
    )
    .with_fields(&["Party Full Name"]);
    let records = left_join(records, &names, &full_name);

    let width = numbered_width(rest.iter().map(|(_, professions, _)| professions.as_slice()));
    let professions = ListPolicy::numbered("Profession", "Profession", width);
    let commissions = ListPolicy::joined("Commissions", ", ");

    let entities: Vec<Entity> = records
        .into_iter()
        .zip(rest)
        .map(|(mut record, (mandates, profs, comms))| {
            flatten_list(&mut record, &comms, &commissions);
            flatten_list(&mut record, &profs, &professions);
            Entity::new(record).with_sub_items(mandates)
        })
        .collect();

    let spec = SubItemSpec::new(
        "Mandate number",
        &[
            ("Position", "Mandate - Position"),
            ("Start date", "Mandate - Start date"),
            ("End date", "Mandate - End date"),
        ],
    );
    expand_all(&entities, &spec)
}

/// Run the whole Brazilian Senate collection and return export-ready rows.
#[instrument(level = "info", skip_all)]
pub async fn collect<F: Fetch>(fetcher: &F, concurrency: usize) -> Result<Vec<Record>> {
    let profiles = SenateProfiles { concurrency }.read_profiles(fetcher).await?;
    let archive = ArchiveParties.read(fetcher).await?;
    let groups = read_party_groups(fetcher).await;
    info!(
        senators = profiles.len(),
        archive_rows = archive.len(),
        party_pairs = groups.len(),
        "Merging Senate sources"
    );
    Ok(reconcile(profiles, &archive, &groups))
}
