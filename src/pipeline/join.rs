//! Record Joiner: left-outer-join of a primary record set against a secondary one.
//!
//! Both sides build their [`JoinKey`] with the same [`KeySpec`] normalization,
//! so `"  Jean  DUPONT"` and `"jean dupont"` meet. Every primary record survives
//! the join; fields a missing match would have contributed read `"N/A"`.

use crate::models::{NA, Record};
use crate::utils::clean_text;
use itertools::Itertools;
use std::collections::HashMap;
use tracing::info;

/// Normalized join key. Keys with a missing part never match anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinKey(String);

impl JoinKey {
    /// Build a key from its parts, in order.
    ///
    /// Each part is trimmed and its inner whitespace collapsed; the parts are
    /// joined with one space and lowercased.
    ///
    /// # Returns
    ///
    /// `None` when any part is empty or `"N/A"`. A missing first name must not
    /// let a surname meet a first name of the same spelling.
    pub fn from_parts<'a, I>(parts: I) -> Option<JoinKey>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let parts: Vec<String> = parts.into_iter().map(clean_text).collect();
        if parts.is_empty() || parts.iter().any(|p| p.is_empty() || p == NA) {
            return None;
        }
        Some(JoinKey(parts.join(" ").to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fields a key is built from, in concatenation order.
#[derive(Debug, Clone)]
pub struct KeySpec {
    pub fields: Vec<String>,
}

impl KeySpec {
    pub fn on(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn key_of(&self, record: &Record) -> Option<JoinKey> {
        JoinKey::from_parts(self.fields.iter().map(|f| record.get(f).unwrap_or("")))
    }
}

/// How many secondary matches a primary record takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Exactly one output row per primary record; the first secondary match wins.
    FirstMatch,
    /// One row per matching secondary record; still one row when nothing matches.
    AllMatches,
}

#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub left: KeySpec,
    pub right: KeySpec,
    /// Secondary fields to copy. `None` means every secondary field except the
    /// right key fields, in first-seen order.
    pub fields: Option<Vec<String>>,
    pub policy: JoinPolicy,
}

impl JoinSpec {
    pub fn new(left: KeySpec, right: KeySpec, policy: JoinPolicy) -> Self {
        Self {
            left,
            right,
            fields: None,
            policy,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    fn contributed_fields(&self, secondary: &[Record]) -> Vec<String> {
        match &self.fields {
            Some(fields) => fields.clone(),
            None => secondary
                .iter()
                .flat_map(|r| r.field_names())
                .filter(|name| !self.right.fields.iter().any(|k| k == name))
                .unique()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Left-outer-join `primary` with `secondary`.
///
/// On a field-name collision the primary value is kept unless it is absent or
/// `"N/A"`, in which case the secondary value fills it. A secondary value that is
/// itself absent becomes `"N/A"`.
///
/// # Arguments
///
/// * `primary` - Records that all survive the join, in order
/// * `secondary` - Lookup side, indexed once by its key
/// * `spec` - Keys of both sides, contributed fields and match policy
///
/// # Returns
///
/// One row per primary record under [`JoinPolicy::FirstMatch`]; one row per
/// match (at least one) under [`JoinPolicy::AllMatches`]. Every row carries the
/// same contributed fields.
pub fn left_join(primary: Vec<Record>, secondary: &[Record], spec: &JoinSpec) -> Vec<Record> {
    let fields = spec.contributed_fields(secondary);

    let mut index: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for (i, record) in secondary.iter().enumerate() {
        if let Some(key) = spec.right.key_of(record) {
            index.entry(key).or_default().push(i);
        }
    }

    let total = primary.len();
    let mut misses = 0usize;
    let mut out = Vec::with_capacity(total);
    for record in primary {
        let matches: &[usize] = spec
            .left
            .key_of(&record)
            .and_then(|key| index.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if matches.is_empty() {
            misses += 1;
            out.push(merge_fields(record, None, &fields));
            continue;
        }
        let taken = match spec.policy {
            JoinPolicy::FirstMatch => &matches[..1],
            JoinPolicy::AllMatches => matches,
        };
        for &i in taken {
            out.push(merge_fields(record.clone(), Some(&secondary[i]), &fields));
        }
    }

    info!(
        primary = total,
        secondary = secondary.len(),
        matched = total - misses,
        unmatched = misses,
        rows = out.len(),
        "Joined records"
    );
    out
}

fn merge_fields(mut record: Record, matched: Option<&Record>, fields: &[String]) -> Record {
    for field in fields {
        let incoming = matched.map(|m| m.get_or_na(field)).unwrap_or(NA);
        if record.has_value(field) {
            continue;
        }
        record.set(field.as_str(), incoming);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::{FieldRules, SexRule, normalize};

    fn names(records: &[Record], field: &str) -> Vec<String> {
        records.iter().map(|r| r.get_or_na(field).to_string()).collect()
    }

    #[test]
    fn test_join_key_normalization_is_symmetric() {
        let a = JoinKey::from_parts(["  Jean ", "\u{a0}DUPONT  "]);
        let b = JoinKey::from_parts(["jean   dupont"]);
        assert_eq!(a, b);
        assert_eq!(a.unwrap().as_str(), "jean dupont");
        assert_eq!(JoinKey::from_parts(["", "  "]), None);
        assert_eq!(JoinKey::from_parts([NA]), None);
    }

    #[test]
    fn test_key_with_a_missing_part_never_matches() {
        assert_eq!(JoinKey::from_parts([NA, "Jean"]), None);
        assert_eq!(JoinKey::from_parts(["Jean", ""]), None);

        let primary = vec![Record::from_pairs([("first", NA), ("last", "Jean"), ("id", "1")])];
        let secondary = vec![Record::from_pairs([("first", "Jean"), ("last", ""), ("pob", "Lyon")])];
        let spec = JoinSpec::new(
            KeySpec::on(&["first", "last"]),
            KeySpec::on(&["first", "last"]),
            JoinPolicy::FirstMatch,
        );
        let merged = left_join(primary, &secondary, &spec);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].get("pob"), Some(NA));
    }

    #[test]
    fn test_end_to_end_case_insensitive_join() {
        let rules = FieldRules::new().with_sex(SexRule::civility("civ", "sex"));
        let primary = vec![normalize(
            &Record::from_pairs([("key", "Jean Dupont"), ("civ", "M.")]),
            &rules,
        )];
        let secondary = vec![Record::from_pairs([("key", "jean dupont"), ("party", "PS")])];
        let spec = JoinSpec::new(KeySpec::on(&["key"]), KeySpec::on(&["key"]), JoinPolicy::FirstMatch);

        let merged = left_join(primary, &secondary, &spec);
        assert_eq!(
            merged,
            vec![Record::from_pairs([
                ("key", "Jean Dupont"),
                ("civ", "M."),
                ("sex", "Male"),
                ("party", "PS"),
            ])]
        );
    }

    #[test]
    fn test_messy_whitespace_and_casing_still_match() {
        let primary = vec![
            Record::from_pairs([("first", " Marie-Claire"), ("last", "LE  PEN ")]),
            Record::from_pairs([("first", "Jean"), ("last", "Dupont")]),
        ];
        let secondary = vec![
            Record::from_pairs([("name", "marie-claire le pen"), ("pob", "Paris")]),
            Record::from_pairs([("name", "JEAN\u{a0}DUPONT"), ("pob", "Lyon")]),
        ];
        let spec = JoinSpec::new(
            KeySpec::on(&["first", "last"]),
            KeySpec::on(&["name"]),
            JoinPolicy::FirstMatch,
        );
        let merged = left_join(primary, &secondary, &spec);
        assert_eq!(names(&merged, "pob"), vec!["Paris", "Lyon"]);
        assert!(!merged[0].contains("name"));
    }

    #[test]
    fn test_no_primary_record_is_dropped() {
        let primary = vec![
            Record::from_pairs([("id", "1")]),
            Record::from_pairs([("id", "2")]),
            Record::from_pairs([("id", "")]),
        ];
        let secondary = vec![Record::from_pairs([("id", "1"), ("x", "a")])];
        for policy in [JoinPolicy::FirstMatch, JoinPolicy::AllMatches] {
            let spec = JoinSpec::new(KeySpec::on(&["id"]), KeySpec::on(&["id"]), policy);
            let merged = left_join(primary.clone(), &secondary, &spec);
            assert_eq!(merged.len(), 3);
            assert_eq!(names(&merged, "x"), vec!["a", NA, NA]);
        }
    }

    #[test]
    fn test_unmatched_rows_share_the_schema() {
        let primary = vec![Record::from_pairs([("id", "1")]), Record::from_pairs([("id", "9")])];
        let secondary = vec![Record::from_pairs([("id", "1"), ("party", "PS"), ("group", "SOC")])];
        let spec = JoinSpec::new(KeySpec::on(&["id"]), KeySpec::on(&["id"]), JoinPolicy::FirstMatch);
        let merged = left_join(primary, &secondary, &spec);
        let schema: Vec<Vec<&str>> = merged.iter().map(|r| r.field_names().collect()).collect();
        assert_eq!(schema[0], schema[1]);
        assert_eq!(merged[1].get("group"), Some(NA));
    }

    #[test]
    fn test_first_match_vs_all_matches() {
        let primary = vec![Record::from_pairs([("id", "7"), ("name", "A")])];
        let secondary = vec![
            Record::from_pairs([("id", "7"), ("mandate", "1999")]),
            Record::from_pairs([("id", "07 "), ("mandate", "x")]),
            Record::from_pairs([("id", "7"), ("mandate", "2008")]),
        ];
        let first = JoinSpec::new(KeySpec::on(&["id"]), KeySpec::on(&["id"]), JoinPolicy::FirstMatch);
        let all = JoinSpec::new(KeySpec::on(&["id"]), KeySpec::on(&["id"]), JoinPolicy::AllMatches);
        assert_eq!(names(&left_join(primary.clone(), &secondary, &first), "mandate"), vec!["1999"]);
        assert_eq!(
            names(&left_join(primary, &secondary, &all), "mandate"),
            vec!["1999", "2008"]
        );
    }

    #[test]
    fn test_sequential_joins_keep_earlier_fields() {
        let primary = vec![Record::from_pairs([("name", "Ana"), ("party", NA)])];
        let parties = vec![Record::from_pairs([("name", "ana"), ("party", "PT"), ("state", "SP")])];
        let full_names = vec![Record::from_pairs([("abb", "pt"), ("party", "ignored"), ("full", "Partido dos Trabalhadores")])];

        let first = JoinSpec::new(KeySpec::on(&["name"]), KeySpec::on(&["name"]), JoinPolicy::FirstMatch);
        let merged = left_join(primary, &parties, &first);
        assert_eq!(merged[0].get("party"), Some("PT"));

        let second = JoinSpec::new(KeySpec::on(&["party"]), KeySpec::on(&["abb"]), JoinPolicy::FirstMatch);
        let merged = left_join(merged, &full_names, &second);
        assert_eq!(merged[0].get("party"), Some("PT"));
        assert_eq!(merged[0].get("state"), Some("SP"));
        assert_eq!(merged[0].get("full"), Some("Partido dos Trabalhadores"));
    }

    #[test]
    fn test_explicit_field_list() {
        let primary = vec![Record::from_pairs([("k", "a")])];
        let secondary = vec![Record::from_pairs([("k", "A"), ("keep", "1"), ("skip", "2")])];
        let spec = JoinSpec::new(KeySpec::on(&["k"]), KeySpec::on(&["k"]), JoinPolicy::FirstMatch)
            .with_fields(&["keep", "never_there"]);
        let merged = left_join(primary, &secondary, &spec);
        assert_eq!(merged[0].get("keep"), Some("1"));
        assert_eq!(merged[0].get("never_there"), Some(NA));
        assert!(!merged[0].contains("skip"));
    }
}
