//! Brazilian party list: distinct abbreviation / full name pairs from the
//! Senate's `por-partido` pages.

use crate::error::Result;
use crate::fetch::Fetch;
use crate::models::Record;
use crate::readers::SourceReader;
use crate::scrapers::br_senate::read_party_groups;
use itertools::Itertools;
use tracing::{info, instrument};

pub const OUTPUT_NAME: &str = "br_parties_data.csv";
pub const COLUMNS: &[&str] = &["Party Abbreviation", "Party Full Name"];

/// One record per distinct pair, in first-seen order.
pub fn distinct_parties(pairs: Vec<(String, String)>) -> Vec<Record> {
    pairs
        .into_iter()
        .unique()
        .map(|(abb, name)| Record::from_pairs([("Party Abbreviation", abb), ("Party Full Name", name)]))
        .collect()
}

#[derive(Debug)]
pub struct PartyGroups;

impl SourceReader for PartyGroups {
    fn name(&self) -> &str {
        "senado.leg.br por-partido"
    }

    async fn read<F: Fetch>(&self, fetcher: &F) -> Result<Vec<Record>> {
        Ok(distinct_parties(read_party_groups(fetcher).await))
    }
}

#[instrument(level = "info", skip_all)]
pub async fn collect<F: Fetch>(fetcher: &F) -> Result<Vec<Record>> {
    let parties = PartyGroups.read(fetcher).await?;
    info!(count = parties.len(), "Collected Brazilian parties");
    Ok(parties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StubFetch;
    use crate::scrapers::br_senate::LEGISLATURES_URL;

    fn group_page(rows: &[&str]) -> String {
        let body: String = rows
            .iter()
            .map(|r| format!(r#"<tr class="search-group-row"><td>{r}</td></tr>"#))
            .collect();
        format!(
            r#"<table class="table" id="senadoreslegislaturasanteriores-tabela-senadores"><tbody>{body}</tbody></table>"#
        )
    }

    #[test]
    fn test_distinct_parties_keeps_first_seen_order() {
        let pairs = vec![
            ("PT".to_string(), "Partido dos Trabalhadores".to_string()),
            ("PP".to_string(), "Progressistas".to_string()),
            ("PT".to_string(), "Partido dos Trabalhadores".to_string()),
            ("PP".to_string(), "Partido Progressista".to_string()),
        ];
        let rows = distinct_parties(pairs);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("Party Abbreviation"), Some("PT"));
        assert_eq!(rows[2].get("Party Full Name"), Some("Partido Progressista"));
    }

    #[tokio::test]
    async fn test_collect_skips_missing_pages() {
        let stub = StubFetch::new()
            .page(
                &format!("{LEGISLATURES_URL}/51/por-partido"),
                group_page(&["PT - Partido dos Trabalhadores", "PFL - Partido da Frente Liberal"]),
            )
            .page(&format!("{LEGISLATURES_URL}/52/por-partido"), "<p>maintenance</p>")
            .page(
                &format!("{LEGISLATURES_URL}/53/por-partido"),
                group_page(&["PT - Partido dos Trabalhadores"]),
            );
        let rows = collect(&stub).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("Party Abbreviation"), Some("PFL"));
    }
}
