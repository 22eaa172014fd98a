//! Field Normalizer: rewrite source-specific values into the canonical vocabulary.
//!
//! Every rule is a pure function of the input value and an immutable table that
//! the caller passes in. Nothing here returns an error: a value that cannot be
//! mapped or parsed becomes `"N/A"` and the record carries on.

use crate::models::{NA, Record};
use crate::utils::capitalize;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Canonical output format for every normalized date.
pub const DATE_OUTPUT_FORMAT: &str = "%d/%m/%Y";

const DATETIME_INPUT_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_INPUT_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// `"5. Socialist"`; the dot must not start a fractional part.
static CODE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s*\.\s*(?:[^\d.\s]|$)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Female,
    Male,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Female => write!(f, "Female"),
            Sex::Male => write!(f, "Male"),
        }
    }
}

/// Civility token → sex, read from `source` and written to `target`.
#[derive(Debug, Clone)]
pub struct SexRule {
    pub source: String,
    pub target: String,
    table: HashMap<String, Sex>,
}

impl SexRule {
    /// French civility tokens: `Mme` and `M.`.
    pub fn civility(source: &str, target: &str) -> Self {
        let table = HashMap::from([
            ("mme".to_string(), Sex::Female),
            ("m.".to_string(), Sex::Male),
        ]);
        Self {
            source: source.to_string(),
            target: target.to_string(),
            table,
        }
    }

    pub fn map(&self, raw: Option<&str>) -> String {
        raw.map(|v| v.trim().to_lowercase())
            .and_then(|token| self.table.get(&token).copied())
            .map(|sex| sex.to_string())
            .unwrap_or_else(|| NA.to_string())
    }
}

/// Date fields rewritten in place to `dd/mm/YYYY`.
#[derive(Debug, Clone)]
pub struct DateRule {
    pub fields: Vec<String>,
}

impl DateRule {
    pub fn on(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Parse a source date and render it as `dd/mm/YYYY`, or `"N/A"`.
///
/// Accepted inputs: RFC 3339 timestamps, `YYYY-MM-DD[ T]HH:MM:SS[.fff]`,
/// `YYYY-MM-DD` and `DD/MM/YYYY`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_date(Some("1967-11-07")), "07/11/1967");
/// assert_eq!(normalize_date(Some("31/02/2020")), "N/A");
/// ```
pub fn normalize_date(raw: Option<&str>) -> String {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty() && *v != NA) else {
        return NA.to_string();
    };
    match parse_date(value) {
        Some(date) => date.format(DATE_OUTPUT_FORMAT).to_string(),
        None => {
            debug!(value, "Unparsable date; using N/A");
            NA.to_string()
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_INPUT_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        })
}

/// Integer code → label, applied in place on one field.
#[derive(Debug, Clone)]
pub struct CodeRule {
    pub field: String,
    table: BTreeMap<i64, String>,
}

impl CodeRule {
    pub fn new(field: &str, table: &[(i64, &str)]) -> Self {
        Self {
            field: field.to_string(),
            table: table.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    /// Map a raw code (`5`, `"5.0"`, `"5. Socialist"`) to its label.
    ///
    /// Unmapped codes and free text fall back to the capitalized original; text
    /// that already equals a label maps to that label.
    pub fn map(&self, raw: Option<&str>) -> String {
        let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty() && *v != NA) else {
            return NA.to_string();
        };
        if let Some(label) = code_of(value).and_then(|code| self.table.get(&code)) {
            return label.clone();
        }
        if let Some(label) = self.table.values().find(|l| l.eq_ignore_ascii_case(value)) {
            return label.clone();
        }
        capitalize(value)
    }
}

fn code_of(value: &str) -> Option<i64> {
    if let Ok(code) = value.parse::<i64>() {
        return Some(code);
    }
    if let Ok(f) = value.parse::<f64>() {
        if f.is_finite() && f.fract() == 0.0 {
            return Some(f as i64);
        }
    }
    CODE_PREFIX
        .captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// The full rule table for one source.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    pub sex: Vec<SexRule>,
    pub dates: Vec<DateRule>,
    pub codes: Vec<CodeRule>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sex(mut self, rule: SexRule) -> Self {
        self.sex.push(rule);
        self
    }

    pub fn with_dates(mut self, rule: DateRule) -> Self {
        self.dates.push(rule);
        self
    }

    pub fn with_code(mut self, rule: CodeRule) -> Self {
        self.codes.push(rule);
        self
    }
}

/// Produce the canonical version of `record` under `rules`.
///
/// # Arguments
///
/// * `record` - The raw record, left untouched
/// * `rules` - Sex, date and code rules of the record's source
///
/// # Returns
///
/// A new record in which every rule target holds a value. Unmappable input
/// becomes `"N/A"`, so running it twice gives the same record.
pub fn normalize(record: &Record, rules: &FieldRules) -> Record {
    let mut out = record.clone();
    for rule in &rules.sex {
        let sex = rule.map(record.get(&rule.source));
        out.set(rule.target.as_str(), sex);
    }
    for rule in &rules.dates {
        for field in &rule.fields {
            if record.contains(field) {
                out.set(field.as_str(), normalize_date(record.get(field)));
            }
        }
    }
    for rule in &rules.codes {
        let label = rule.map(record.get(&rule.field));
        out.set(rule.field.as_str(), label);
    }
    out
}

pub fn normalize_all(records: &[Record], rules: &FieldRules) -> Vec<Record> {
    records.iter().map(|r| normalize(r, rules)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family_rule() -> CodeRule {
        CodeRule::new("family", &[(1, "Radical Right"), (5, "Socialist"), (6, "Radical Left")])
    }

    #[test]
    fn test_sex_rule_known_tokens() {
        let rule = SexRule::civility("civ", "sex");
        assert_eq!(rule.map(Some("Mme")), "Female");
        assert_eq!(rule.map(Some("  M. ")), "Male");
        assert_eq!(rule.map(Some("MME")), "Female");
    }

    #[test]
    fn test_sex_rule_everything_else_is_na() {
        let rule = SexRule::civility("civ", "sex");
        for token in ["", "M", "Mr.", "Madame", "mlle", "N/A", "m. dupont", "   "] {
            assert_eq!(rule.map(Some(token)), NA, "token {token:?}");
        }
        assert_eq!(rule.map(None), NA);
    }

    #[test]
    fn test_date_accepted_formats() {
        assert_eq!(normalize_date(Some("1955-03-12")), "12/03/1955");
        assert_eq!(normalize_date(Some("1955-03-12 00:00:00")), "12/03/1955");
        assert_eq!(normalize_date(Some("2017-06-21T00:00:00.000")), "21/06/2017");
        assert_eq!(normalize_date(Some("2017-06-21T10:00:00+02:00")), "21/06/2017");
        assert_eq!(normalize_date(Some(" 01/02/2000 ")), "01/02/2000");
    }

    #[test]
    fn test_malformed_dates_are_na() {
        for bad in ["", "not a date", "31/02/2000", "2000-13-01", "12/03", "1955-03-12xyz", "N/A"] {
            assert_eq!(normalize_date(Some(bad)), NA, "input {bad:?}");
        }
        assert_eq!(normalize_date(None), NA);
    }

    #[test]
    fn test_code_rule_integer_and_prefixed() {
        let rule = family_rule();
        assert_eq!(rule.map(Some("5")), "Socialist");
        assert_eq!(rule.map(Some("6.0")), "Radical Left");
        assert_eq!(rule.map(Some("1. radical right")), "Radical Right");
        assert_eq!(rule.map(Some(" 5 . soc ")), "Socialist");
        assert_eq!(rule.map(Some("5.")), "Socialist");
    }

    #[test]
    fn test_code_rule_fraction_is_not_a_prefix() {
        let rule = family_rule();
        assert_eq!(rule.map(Some("5.5")), "5.5");
        assert_eq!(rule.map(Some("6. 5")), "6. 5");
    }

    #[test]
    fn test_code_rule_fallbacks() {
        let rule = family_rule();
        assert_eq!(rule.map(Some("99")), "99");
        assert_eq!(rule.map(Some("green PARTY")), "Green party");
        assert_eq!(rule.map(Some("socialist")), "Socialist");
        assert_eq!(rule.map(Some("")), NA);
        assert_eq!(rule.map(None), NA);
    }

    #[test]
    fn test_normalize_is_idempotent_on_na() {
        let rules = FieldRules::new()
            .with_sex(SexRule::civility("civ", "sex"))
            .with_dates(DateRule::on(&["born"]))
            .with_code(family_rule());
        let raw = Record::from_pairs([("civ", NA), ("born", NA), ("family", NA)]);
        let once = normalize(&raw, &rules);
        let twice = normalize(&once, &rules);
        assert_eq!(once, twice);
        assert_eq!(twice.get("sex"), Some(NA));
        assert_eq!(twice.get("born"), Some(NA));
        assert_eq!(twice.get("family"), Some(NA));
    }

    #[test]
    fn test_normalize_returns_new_value() {
        let rules = FieldRules::new()
            .with_sex(SexRule::civility("civ", "sex"))
            .with_dates(DateRule::on(&["born", "died"]));
        let raw = Record::from_pairs([("civ", "Mme"), ("born", "1950-01-31")]);
        let canonical = normalize(&raw, &rules);
        assert_eq!(raw.get("born"), Some("1950-01-31"));
        assert!(!raw.contains("sex"));
        assert_eq!(canonical.get("born"), Some("31/01/1950"));
        assert_eq!(canonical.get("sex"), Some("Female"));
        // date fields the source never had are not invented
        assert!(!canonical.contains("died"));
    }
}
