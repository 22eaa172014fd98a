//! Row Expander and list flattening.
//!
//! An [`Entity`] with N sub-items becomes N rows ("long format"); an entity with
//! none still becomes one row, with the ordinal and every sub-item attribute set
//! to `"N/A"`. List-valued fields that stay on the entity row are flattened by a
//! [`ListPolicy`] fixed per field.

use crate::models::{Entity, NA, Record};

/// Describes how sub-items turn into columns.
#[derive(Debug, Clone)]
pub struct SubItemSpec {
    /// Column receiving the 1-based ordinal.
    pub ordinal: String,
    /// `(sub-item attribute, output column)` pairs, in output order.
    pub attributes: Vec<(String, String)>,
}

impl SubItemSpec {
    pub fn new(ordinal: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            ordinal: ordinal.to_string(),
            attributes: attributes
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

/// Expand one entity into long format.
///
/// # Arguments
///
/// * `entity` - The parent record and its ordered sub-items
/// * `spec` - Ordinal column and the sub-item attributes to copy
///
/// # Returns
///
/// `max(1, sub_items.len())` rows, each a copy of the parent record plus the
/// 1-based ordinal and the attribute columns. An entity without sub-items gets
/// one row with all of those columns set to `"N/A"`.
pub fn expand(entity: &Entity, spec: &SubItemSpec) -> Vec<Record> {
    if entity.sub_items.is_empty() {
        let mut row = entity.record.clone();
        row.set(spec.ordinal.as_str(), NA);
        for (_, column) in &spec.attributes {
            row.set(column.as_str(), NA);
        }
        return vec![row];
    }

    entity
        .sub_items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut row = entity.record.clone();
            row.set(spec.ordinal.as_str(), (i + 1).to_string());
            for (attribute, column) in &spec.attributes {
                row.set(column.as_str(), item.get_or_na(attribute));
            }
            row
        })
        .collect()
}

pub fn expand_all(entities: &[Entity], spec: &SubItemSpec) -> Vec<Record> {
    entities.iter().flat_map(|e| expand(e, spec)).collect()
}

/// How a list-valued field is written into a flat row.
#[derive(Debug, Clone)]
pub enum ListPolicy {
    /// One cell, items joined by `separator`; an empty list is `"N/A"`.
    Joined { column: String, separator: String },
    /// One column per item: `first`, then `{prefix}_2`, `{prefix}_3`, …
    /// Missing positions up to `width` are `"N/A"`.
    Numbered {
        first: String,
        prefix: String,
        width: usize,
    },
}

impl ListPolicy {
    pub fn joined(column: &str, separator: &str) -> Self {
        ListPolicy::Joined {
            column: column.to_string(),
            separator: separator.to_string(),
        }
    }

    pub fn numbered(first: &str, prefix: &str, width: usize) -> Self {
        ListPolicy::Numbered {
            first: first.to_string(),
            prefix: prefix.to_string(),
            width,
        }
    }
}

fn numbered_column(first: &str, prefix: &str, i: usize) -> String {
    if i == 1 {
        first.to_string()
    } else {
        format!("{prefix}_{i}")
    }
}

/// Column count a `Numbered` policy needs to hold every list in the batch.
pub fn numbered_width<'a, I>(lists: I) -> usize
where
    I: IntoIterator<Item = &'a [String]>,
{
    lists.into_iter().map(<[String]>::len).max().unwrap_or(0)
}

/// Write `items` into `record` under `policy`.
///
/// Blank items are skipped. `Joined` writes one column (`"N/A"` for an empty
/// list); `Numbered` always writes `width` columns, padding with `"N/A"`.
///
/// # Arguments
///
/// * `record` - The row receiving the list columns
/// * `items` - List values in source order
/// * `policy` - Column layout, see [`ListPolicy`]
pub fn flatten_list(record: &mut Record, items: &[String], policy: &ListPolicy) {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    match policy {
        ListPolicy::Joined { column, separator } => {
            let value = if items.is_empty() {
                NA.to_string()
            } else {
                items.join(separator)
            };
            record.set(column.as_str(), value);
        }
        ListPolicy::Numbered { first, prefix, width } => {
            for i in 1..=*width {
                let value = items.get(i - 1).copied().unwrap_or(NA);
                record.set(numbered_column(first, prefix, i), value);
            }
        }
    }
}
