//! Label catalog: variable descriptions and code → label dictionaries.
//!
//! The catalog is the only source of category order. A dictionary iterates in
//! ascending code order and every axis in the dashboard is derived from it.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::error::Result;

/// A coded variable as listed on the landing page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    pub description: Option<String>,
}

impl Variable {
    /// Variables without a usable description are hidden from the variable list
    pub fn is_listed(&self) -> bool {
        match self.description.as_deref() {
            Some(d) => !d.trim().is_empty() && d != "NaN",
            None => false,
        }
    }
}

/// Ordered code → label mapping for one variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelDictionary {
    entries: BTreeMap<i64, String>,
}

impl LabelDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored mapping rows; later rows win on a duplicated key
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        let mut entries = BTreeMap::new();
        for (key, value) in pairs {
            entries.insert(key, value.into());
        }
        Self { entries }
    }

    pub fn get(&self, code: i64) -> Option<&str> {
        self.entries.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Labels in ascending key order
    pub fn labels(&self) -> Vec<String> {
        self.entries.values().cloned().collect()
    }

    /// Keep only entries whose key satisfies `keep`
    pub fn retain_keys(&self, keep: impl Fn(i64) -> bool) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| keep(**k))
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
        }
    }

    /// Drop the negative (sentinel) keys unless `keep_missing` is set
    pub fn without_sentinels(&self, keep_missing: bool) -> Self {
        if keep_missing {
            self.clone()
        } else {
            self.retain_keys(|k| k >= 0)
        }
    }

    /// Axis order: labels in key order, restricted to `present` when given.
    /// A label shared by several keys only takes its first slot.
    pub fn axis(&self, present: Option<&HashSet<String>>) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .values()
            .filter(|label| present.map_or(true, |p| p.contains(*label)))
            .filter(|label| seen.insert((*label).clone()))
            .cloned()
            .collect()
    }
}

/// A column of labels plus the dictionary's label order.
///
/// `values[i]` is `None` when the code at row `i` has no dictionary entry.
/// `levels` is the display order and does not depend on the data.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    pub values: Vec<Option<String>>,
    pub levels: Vec<String>,
}

impl Categorical {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distinct levels in display order for which `keep` holds
    pub fn axis(&self, keep: impl Fn(&str) -> bool) -> Vec<String> {
        let mut seen = HashSet::new();
        self.levels
            .iter()
            .filter(|level| keep(level) && seen.insert(level.as_str()))
            .cloned()
            .collect()
    }
}

/// Replace every code by its label
pub fn resolve_labels(codes: &[i64], dict: &LabelDictionary) -> Categorical {
    Categorical {
        values: codes
            .iter()
            .map(|c| dict.get(*c).map(str::to_string))
            .collect(),
        levels: dict.labels(),
    }
}

/// Read access to the variables and mappings tables
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fails with `VariableNotFound` for an unknown variable. A variable with
    /// no mappings yields an empty dictionary.
    async fn lookup_dictionary(&self, variable: &str) -> Result<LabelDictionary>;

    /// Fails with `VariableNotFound` for an unknown variable. A missing
    /// description reads as the empty string.
    async fn lookup_description(&self, variable: &str) -> Result<String>;

    async fn list_variables(&self) -> Result<Vec<Variable>>;
}
