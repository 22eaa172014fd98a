//! French deputies, full history, from the National Assembly open-data archive.
//!
//! The archive is a zip of one JSON document per actor (`json/acteur/*.json`).
//! Each actor yields one row per Assembly or Bureau mandate, carrying the
//! actor's identity and profession. Other mandate kinds (committees, groups,
//! outside bodies) are skipped.

use crate::error::{HarvestError, Result};
use crate::fetch::Fetch;
use crate::models::Record;
use crate::outputs::json::write_records;
use crate::pipeline::normalize::{DateRule, FieldRules, SexRule, normalize_all};
use crate::readers::SourceReader;
use crate::readers::json_tree::{as_list, node_at, text_at};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use url::Url;
use zip::ZipArchive;

pub const PAGE_URL: &str = "https://data.assemblee-nationale.fr/acteurs/historique-des-deputes";
pub const OUTPUT_NAME: &str = "FR_dep_combined.csv";

/// Mandate kinds kept, compared on the uppercased `typeOrgane`.
pub const ORGANE_TYPES: &[&str] = &["BUREAU", "ASSEMBLEE"];

pub const COLUMNS: &[&str] = &[
    "Last Name",
    "First Name",
    "Deputy ID",
    "Civil Status",
    "Sex",
    "Date of Birth",
    "Place of Birth",
    "Birth Department",
    "Profession",
    "Socio-Professional category",
    "Socio-Professional family",
    "Legislature",
    "Mandate Start Date",
    "Mandate End Date",
    "Type of Organe",
    "Position",
];

const RENAMES: &[(&str, &str)] = &[
    ("nom", "Last Name"),
    ("prenom", "First Name"),
    ("civ", "Civil Status"),
    ("dateNaissance", "Date of Birth"),
    ("lieuNaissance", "Place of Birth"),
    ("depNais", "Birth Department"),
    ("profession", "Profession"),
    ("catSocPro", "Socio-Professional category"),
    ("famSocPro", "Socio-Professional family"),
    ("acteurRef", "Deputy ID"),
    ("legislature", "Legislature"),
    ("typeOrgane", "Type of Organe"),
    ("dateDebut", "Mandate Start Date"),
    ("dateFin", "Mandate End Date"),
    ("libQualite", "Position"),
];

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Absolute URL of the first `.json.zip` link on the page.
pub fn find_archive_link(html: &str, page_url: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let href = document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.ends_with(".json.zip"))
        .ok_or_else(|| HarvestError::unavailable(page_url, "no .json.zip link found on the page"))?;
    Ok(Url::parse(page_url)?.join(href)?.to_string())
}

fn is_actor_entry(name: &str) -> bool {
    match name.rsplit_once('/') {
        Some((dir, file)) => {
            file.ends_with(".json") && (dir == "json/acteur" || dir.ends_with("/json/acteur"))
        }
        None => false,
    }
}

/// Raw mandate rows of one actor document, in source field names.
pub fn mandate_rows(doc: &Value) -> Vec<Record> {
    let Some(actor) = doc.get("acteur") else {
        return Vec::new();
    };
    let ident = |path: &[&str]| text_at(actor, path);
    let identity = [
        ("nom", ident(&["etatCivil", "ident", "nom"])),
        ("prenom", ident(&["etatCivil", "ident", "prenom"])),
        ("civ", ident(&["etatCivil", "ident", "civ"])),
        ("dateNaissance", ident(&["etatCivil", "infoNaissance", "dateNais"])),
        ("lieuNaissance", ident(&["etatCivil", "infoNaissance", "villeNais"])),
        ("depNais", ident(&["etatCivil", "infoNaissance", "depNais"])),
        ("profession", ident(&["profession", "libelleCourant"])),
        ("catSocPro", ident(&["profession", "socProcINSEE", "catSocPro"])),
        ("famSocPro", ident(&["profession", "socProcINSEE", "famSocPro"])),
    ];

    as_list(node_at(actor, &["mandats", "mandat"]))
        .into_iter()
        .filter_map(|mandate| {
            let organe = text_at(mandate, &["typeOrgane"])?.to_uppercase();
            if !ORGANE_TYPES.contains(&organe.as_str()) {
                return None;
            }
            let mut row = Record::new();
            for (field, value) in &identity {
                row.set_opt(*field, value.clone());
            }
            row.set_opt("uid", text_at(mandate, &["uid"]));
            row.set_opt("acteurRef", text_at(mandate, &["acteurRef"]));
            row.set_opt("legislature", text_at(mandate, &["legislature"]));
            row.set("typeOrgane", organe);
            row.set_opt("dateDebut", text_at(mandate, &["dateDebut"]));
            row.set_opt("dateFin", text_at(mandate, &["dateFin"]));
            row.set_opt("libQualite", text_at(mandate, &["infosQualite", "libQualite"]));
            row.set_opt("organeRef", text_at(mandate, &["organes", "organeRef"]));
            Some(row)
        })
        .collect()
}

/// Every kept mandate in the archive. Unreadable actor entries are logged and skipped.
pub fn rows_from_archive(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut rows = Vec::new();
    let mut actors = 0usize;
    let mut skipped = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || !is_actor_entry(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();
        let mut buf = Vec::new();
        let parsed = entry
            .read_to_end(&mut buf)
            .map_err(HarvestError::from)
            .and_then(|_| {
                let text = buf.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&buf);
                serde_json::from_slice::<Value>(text).map_err(HarvestError::from)
            });
        match parsed {
            Ok(doc) => {
                actors += 1;
                rows.extend(mandate_rows(&doc));
            }
            Err(e) => {
                skipped += 1;
                warn!(error = %HarvestError::record(&name, e), "Skipping actor entry");
            }
        }
    }
    info!(actors, skipped, mandates = rows.len(), "Read actor archive");
    Ok(rows)
}

/// English names, derived `Sex`, normalized dates, internal ids dropped.
pub fn finalize(rows: &[Record]) -> Vec<Record> {
    let rules = FieldRules::new()
        .with_sex(SexRule::civility("Civil Status", "Sex"))
        .with_dates(DateRule::on(&["Date of Birth", "Mandate Start Date", "Mandate End Date"]));
    let renamed: Vec<Record> = rows
        .iter()
        .cloned()
        .map(|mut r| {
            r.rename_all(RENAMES);
            r.drop_fields(&["uid", "organeRef"]);
            r
        })
        .collect();
    normalize_all(&renamed, &rules)
}

/// The deputies archive on data.assemblee-nationale.fr.
#[derive(Debug)]
pub struct ActorArchive;

impl SourceReader for ActorArchive {
    fn name(&self) -> &str {
        "data.assemblee-nationale.fr"
    }

    async fn read<F: Fetch>(&self, fetcher: &F) -> Result<Vec<Record>> {
        let html = fetcher
            .get_text(PAGE_URL)
            .await
            .map_err(|e| HarvestError::unavailable(self.name(), e))?;
        let url = find_archive_link(&html, PAGE_URL)?;
        info!(%url, "Downloading deputies archive");
        let bytes = fetcher
            .get_bytes(&url)
            .await
            .map_err(|e| HarvestError::unavailable(self.name(), e))?;
        debug!(bytes = bytes.len(), "Archive downloaded");
        rows_from_archive(&bytes)
    }
}

/// Run the deputies collection; `json_dump` receives the rows before renaming.
#[instrument(level = "info", skip_all)]
pub async fn collect<F: Fetch>(fetcher: &F, json_dump: Option<PathBuf>) -> Result<Vec<Record>> {
    let raw = ActorArchive.read(fetcher).await?;
    if let Some(path) = json_dump {
        write_records(&raw, &path).await?;
    }
    Ok(finalize(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StubFetch;
    use crate::models::NA;
    use serde_json::json;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn actor() -> Value {
        json!({"acteur": {
            "etatCivil": {
                "ident": {"civ": "Mme", "prenom": "Marie", "nom": "Curie"},
                "infoNaissance": {"dateNais": "1867-11-07", "villeNais": "Varsovie", "depNais": null}
            },
            "profession": {"libelleCourant": "Physicienne", "socProcINSEE": {"catSocPro": "Cadres", "famSocPro": "Cadres et professions"}},
            "mandats": {"mandat": [
                {"uid": "PM1", "acteurRef": "PA1", "legislature": "11", "typeOrgane": "ASSEMBLEE",
                 "dateDebut": "1997-06-01", "dateFin": null,
                 "infosQualite": {"libQualite": "membre"}, "organes": {"organeRef": "PO1"}},
                {"uid": "PM2", "typeOrgane": "COMPER"},
                {"uid": "PM3", "acteurRef": "PA1", "typeOrgane": "bureau", "dateDebut": "1998-01-01"}
            ]}
        }})
    }

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, body) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_find_archive_link() {
        let html = r#"<a href="/static/AMO10.xml.zip">xml</a><a href="/static/openData/repository/AMO10.json.zip">json</a>"#;
        assert_eq!(
            find_archive_link(html, PAGE_URL).unwrap(),
            "https://data.assemblee-nationale.fr/static/openData/repository/AMO10.json.zip"
        );
        assert!(find_archive_link("<p>none</p>", PAGE_URL).is_err());
    }

    #[test]
    fn test_actor_entry_names() {
        assert!(is_actor_entry("json/acteur/PA1.json"));
        assert!(is_actor_entry("export/json/acteur/PA1.json"));
        assert!(!is_actor_entry("json/organe/PO1.json"));
        assert!(!is_actor_entry("json/acteur/"));
        assert!(!is_actor_entry("PA1.json"));
    }

    #[test]
    fn test_mandate_rows_keep_assembly_and_bureau() {
        let rows = mandate_rows(&actor());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("nom"), Some("Curie"));
        assert_eq!(rows[0].get("depNais"), None);
        assert_eq!(rows[0].get("organeRef"), Some("PO1"));
        assert_eq!(rows[1].get("typeOrgane"), Some("BUREAU"));
        assert_eq!(rows[1].get("prenom"), Some("Marie"));
    }

    #[test]
    fn test_single_mandate_object_is_read() {
        let doc = json!({"acteur": {"mandats": {"mandat": {"typeOrgane": "ASSEMBLEE", "uid": "PM9"}}}});
        assert_eq!(mandate_rows(&doc).len(), 1);
        assert!(mandate_rows(&json!({"other": 1})).is_empty());
    }

    #[test]
    fn test_finalize() {
        let rows = finalize(&mandate_rows(&actor()));
        let r = &rows[0];
        assert_eq!(r.get("Last Name"), Some("Curie"));
        assert_eq!(r.get("Sex"), Some("Female"));
        assert_eq!(r.get("Date of Birth"), Some("07/11/1867"));
        assert_eq!(r.get("Mandate Start Date"), Some("01/06/1997"));
        assert_eq!(r.get("Mandate End Date"), Some(NA));
        assert_eq!(r.get("Deputy ID"), Some("PA1"));
        assert_eq!(r.get("Position"), Some("membre"));
        assert!(!r.contains("uid") && !r.contains("organeRef"));
    }

    #[test]
    fn test_rows_from_archive_skips_bad_entries() {
        let good = format!("\u{feff}{}", actor());
        let bytes = archive(&[
            ("json/acteur/PA1.json", good.as_bytes()),
            ("json/acteur/PA2.json", b"{not json"),
            ("json/organe/PO1.json", b"{}"),
        ]);
        let rows = rows_from_archive(&bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows_from_archive(b"not a zip").is_err());
    }

    #[tokio::test]
    async fn test_collect_writes_json_dump() {
        let tmp = tempfile::tempdir().unwrap();
        let dump = tmp.path().join("combined_filtered.json");
        let body = actor().to_string();
        let stub = StubFetch::new()
            .page(PAGE_URL, r#"<a href="/repo/AMO10.json.zip">zip</a>"#)
            .page(
                "https://data.assemblee-nationale.fr/repo/AMO10.json.zip",
                archive(&[("json/acteur/PA1.json", body.as_bytes())]),
            );
        let rows = collect(&stub, Some(dump.clone())).await.unwrap();
        assert_eq!(rows.len(), 2);

        let bytes = std::fs::read(&dump).unwrap();
        let dumped: Value = serde_json::from_slice(&bytes[crate::outputs::csv::UTF8_BOM.len()..]).unwrap();
        assert_eq!(dumped[0]["nom"], "Curie");
        assert_eq!(dumped[0]["uid"], "PM1");
    }
}
