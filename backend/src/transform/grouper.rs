//! Filter and partition normalized wallets into ordered groups.
//!
//! ```text
//! Normalized records              →  Groups (key asc, members by name asc)
//! ┌──────────────────────────┐       ┌──────────────────────────┐
//! │ Hot B   0xBBB  Software  │       │ Hardware                 │
//! │ Cold A  0xAAA  Hardware  │  →    │   Cold A   0xAAA         │
//! │ Cold C  0xCCC  Hardware  │       │   Cold C   0xCCC         │
//! └──────────────────────────┘       ├──────────────────────────┤
//!                                    │ Software                 │
//!                                    │   Hot B    0xBBB         │
//!                                    └──────────────────────────┘
//! ```
//!
//! Filters run before grouping. Keys and names compare ordinally, so the
//! output is independent of input row order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::api::logs::log_warning;
use crate::error::EmptyResultError;
use crate::models::{Field, RecordGroup, RecordSet, WalletRecord};

/// Filter value meaning "do not filter".
pub const ALL: &str = "All";

/// Exact-match filter on one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: Field,
    /// Already normalized like the field's values.
    pub value: String,
}

impl Filter {
    /// Build a filter, or `None` when `value` is blank or [`ALL`].
    pub fn new(field: Field, value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL) {
            return None;
        }
        Some(Self {
            field,
            value: field.normalize_value(trimmed),
        })
    }

    pub fn matches(&self, record: &WalletRecord) -> bool {
        record.field(self.field) == self.value
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.field, self.value)
    }
}

/// Parses `field=value`. A value of `All` is accepted and yields a filter
/// that [`Selection::new`] drops.
impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", s))?;
        let field: Field = field.parse()?;
        Ok(Self {
            field,
            value: field.normalize_value(value),
        })
    }
}

/// Which records to render and how to partition them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub primary: Option<Filter>,
    pub secondary: Option<Filter>,
    pub group_by: Option<Field>,
}

impl Selection {
    pub fn new(primary: Option<Filter>, secondary: Option<Filter>, group_by: Option<Field>) -> Self {
        let active = |f: Option<Filter>| f.and_then(|f| Filter::new(f.field, &f.value));
        Self {
            primary: active(primary),
            secondary: active(secondary),
            group_by,
        }
    }

    /// Group by a dimension without filtering.
    pub fn grouped_by(field: Field) -> Self {
        Self {
            group_by: Some(field),
            ..Self::default()
        }
    }

    fn matches(&self, record: &WalletRecord) -> bool {
        self.primary.iter().chain(self.secondary.iter()).all(|f| f.matches(record))
    }

    fn describe(&self) -> String {
        let filters: Vec<String> = self
            .primary
            .iter()
            .chain(self.secondary.iter())
            .map(|f| f.to_string())
            .collect();
        if filters.is_empty() {
            "no filters".to_string()
        } else {
            filters.join(", ")
        }
    }
}

/// Filter, partition and order the record set.
///
/// Without a grouping field, or when the upload lacks that column, all
/// filtered records form one group with an empty key.
pub fn group_records(set: &RecordSet, selection: &Selection) -> Result<Vec<RecordGroup>, EmptyResultError> {
    let filtered: Vec<&WalletRecord> = set.records.iter().filter(|r| selection.matches(r)).collect();

    if filtered.is_empty() {
        return Err(EmptyResultError {
            selection: selection.describe(),
        });
    }

    let group_by = match selection.group_by {
        Some(field) if !set.has_column(field) => {
            log_warning(format!(
                "No '{}' column, showing all wallets in a single group",
                field.column()
            ));
            None
        }
        other => other,
    };

    let mut groups: BTreeMap<String, Vec<WalletRecord>> = BTreeMap::new();
    for record in filtered {
        let key = group_by.map(|f| record.field(f).to_string()).unwrap_or_default();
        groups.entry(key).or_default().push(record.clone());
    }

    Ok(groups
        .into_iter()
        .map(|(key, mut members)| {
            members.sort();
            RecordGroup { key, members }
        })
        .collect())
}

/// Sorted distinct non-empty values of a dimension, for filter pickers.
pub fn distinct_values(set: &RecordSet, field: Field) -> Vec<String> {
    set.records
        .iter()
        .map(|r| r.field(field))
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
