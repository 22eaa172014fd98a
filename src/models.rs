//! Record types shared by every collection.
//!
//! - [`Record`]: one scraped entity (or entity sub-item) as an ordered
//!   field-name → value mapping. Raw, canonical and merged records all use this
//!   type; the pipeline stage that produced a record is what tells them apart.
//! - [`Entity`]: a record plus an ordered list of sub-items (mandates,
//!   professions, commissions) waiting to be expanded into long format.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Explicit marker for missing or unmappable data.
pub const NA: &str = "N/A";

/// Ordered mapping from field name to raw value.
///
/// Field order is insertion order and is reused as the default export order.
/// A value of `None` means the source did not provide the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(name, value)` pairs; empty strings stay empty.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Record::new();
        for (k, v) in pairs {
            record.set(k, v);
        }
        record
    }

    fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(name, _)| name == field)
    }

    /// Raw access: `None` if the field is missing or absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.position(field)
            .and_then(|i| self.fields[i].1.as_deref())
    }

    /// Uniform "get field or sentinel" accessor.
    ///
    /// Missing, absent and whitespace-only values all read as `"N/A"`.
    pub fn get_or_na(&self, field: &str) -> &str {
        match self.get(field) {
            Some(v) if !v.trim().is_empty() => v,
            _ => NA,
        }
    }

    /// True when the field holds a real value (not absent, empty or `"N/A"`).
    pub fn has_value(&self, field: &str) -> bool {
        self.get_or_na(field) != NA
    }

    pub fn contains(&self, field: &str) -> bool {
        self.position(field).is_some()
    }

    /// Insert or overwrite; a new field is appended at the end.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.set_opt(field, Some(value.into()));
    }

    pub fn set_opt(&mut self, field: impl Into<String>, value: Option<String>) {
        let field = field.into();
        match self.position(&field) {
            Some(i) => self.fields[i].1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Rename a field in place, keeping its position.
    ///
    /// If `to` already exists it is replaced by the renamed field.
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(i) = self.position(from) {
            if let Some(j) = self.position(to) {
                self.fields.remove(j);
                let i = if j < i { i - 1 } else { i };
                self.fields[i].0 = to.to_string();
            } else {
                self.fields[i].0 = to.to_string();
            }
        }
    }

    /// Apply a rename table; names not in the table are left alone.
    pub fn rename_all(&mut self, table: &[(&str, &str)]) {
        for (from, to) in table {
            self.rename(from, to);
        }
    }

    pub fn drop_fields(&mut self, names: &[&str]) {
        self.fields.retain(|(name, _)| !names.contains(&name.as_str()));
    }

    /// Replace every absent or blank value with `"N/A"`.
    pub fn fill_na(&mut self) {
        for (_, value) in self.fields.iter_mut() {
            let blank = value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true);
            if blank {
                *value = Some(NA.to_string());
            }
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A record with an attached, ordered list of sub-items.
#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub record: Record,
    pub sub_items: Vec<Record>,
}

impl Entity {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            sub_items: Vec::new(),
        }
    }

    pub fn with_sub_items(mut self, sub_items: Vec<Record>) -> Self {
        self.sub_items = sub_items;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_na_for_missing_blank_and_present() {
        let mut r = Record::from_pairs([("name", "Jean Dupont"), ("blank", "  ")]);
        r.set_opt("absent", None);
        assert_eq!(r.get_or_na("name"), "Jean Dupont");
        assert_eq!(r.get_or_na("blank"), NA);
        assert_eq!(r.get_or_na("absent"), NA);
        assert_eq!(r.get_or_na("nope"), NA);
        assert!(r.contains("absent"));
        assert!(!r.has_value("absent"));
    }

    #[test]
    fn test_set_keeps_insertion_order() {
        let mut r = Record::new();
        r.set("b", "1");
        r.set("a", "2");
        r.set("b", "3");
        assert_eq!(r.field_names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(r.get("b"), Some("3"));
    }

    #[test]
    fn test_rename_keeps_position() {
        let mut r = Record::from_pairs([("nom", "Dupont"), ("prenom", "Jean"), ("civ", "M.")]);
        r.rename_all(&[("nom", "Last Name"), ("prenom", "First Name"), ("missing", "X")]);
        assert_eq!(
            r.field_names().collect::<Vec<_>>(),
            vec!["Last Name", "First Name", "civ"]
        );
    }

    #[test]
    fn test_rename_onto_existing_field_replaces_it() {
        let mut r = Record::from_pairs([("Name", "old"), ("nom", "new")]);
        r.rename("nom", "Name");
        assert_eq!(r.field_names().count(), 1);
        assert_eq!(r.get("Name"), Some("new"));
    }

    #[test]
    fn test_fill_na_and_drop() {
        let mut r = Record::from_pairs([("a", ""), ("b", "x"), ("mail", "a@b.c")]);
        r.set_opt("c", None);
        r.fill_na();
        r.drop_fields(&["mail"]);
        assert_eq!(r.get("a"), Some(NA));
        assert_eq!(r.get("c"), Some(NA));
        assert_eq!(r.get("b"), Some("x"));
        assert!(!r.contains("mail"));
    }

    #[test]
    fn test_record_serializes_as_ordered_object() {
        let mut r = Record::from_pairs([("z", "1"), ("a", "2")]);
        r.set_opt("n", None);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"z":"1","a":"2","n":null}"#);
    }
}
