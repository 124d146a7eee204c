//! Style presets.
//!
//! A catalog is an ordered list of records loaded from JSON. The presets
//! shipped with the studio are embedded; a deployment can swap in its own file
//! without changing how styles are looked up.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_STYLES_JSON: &str = include_str!("../resources/default_styles.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub prompt_modifier: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown style '{0}'")]
    UnknownStyle(String),
    #[error("duplicate style id '{0}'")]
    DuplicateId(String),
    #[error("style at position {0} has an empty id")]
    EmptyId(usize),
    #[error("style catalog is empty")]
    Empty,
    #[error("failed reading style catalog {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid style catalog JSON")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: IndexMap<String, StyleRecord>,
}

impl StyleCatalog {
    /// The presets compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(DEFAULT_STYLES_JSON)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let records: Vec<StyleRecord> = serde_json::from_str(raw)?;
        Self::from_records(records)
    }

    pub fn from_records(records: Vec<StyleRecord>) -> Result<Self, CatalogError> {
        if records.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut styles = IndexMap::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            if record.id.trim().is_empty() {
                return Err(CatalogError::EmptyId(idx));
            }
            if styles.contains_key(&record.id) {
                return Err(CatalogError::DuplicateId(record.id));
            }
            styles.insert(record.id.clone(), record);
        }
        Ok(Self { styles })
    }

    pub fn get(&self, id: &str) -> Result<&StyleRecord, CatalogError> {
        self.styles
            .get(id)
            .ok_or_else(|| CatalogError::UnknownStyle(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.styles.contains_key(id)
    }

    /// First record in catalog order; the initial selection of a fresh form.
    pub fn default_style(&self) -> &StyleRecord {
        self.styles
            .first()
            .map(|(_, record)| record)
            .expect("catalog is never empty")
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleRecord> {
        self.styles.values()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}
