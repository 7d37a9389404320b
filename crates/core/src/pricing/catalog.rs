//! Reference catalog of canonical product prices.
//!
//! The catalog is data, not logic: it ships as `data/catalog.json` (embedded
//! at compile time) and may be replaced by an operator-supplied file of the
//! same shape. Every record is validated once at load; afterwards the catalog
//! is immutable and shared read-only across requests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::product::{CatalogEntry, CatalogKey};

const EMBEDDED_CATALOG: &str = include_str!("../../data/catalog.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog entry `{key}` is invalid: {reason}")]
    Invariant { key: String, reason: String },
    #[error("catalog key `{0}` is defined more than once")]
    DuplicateKey(String),
}

/// Fallback record chosen when the category hint contains `pattern`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryDefault {
    pub pattern: String,
    pub entry: CatalogEntry,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    entries: Vec<CatalogEntry>,
    #[serde(default)]
    category_defaults: Vec<CategoryDefault>,
    generic_default: CatalogEntry,
}

#[derive(Clone, Debug)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<CatalogKey, usize>,
    category_defaults: Vec<CategoryDefault>,
    generic_default: CatalogEntry,
    fingerprint: String,
}

impl Catalog {
    pub fn new(
        entries: Vec<CatalogEntry>,
        category_defaults: Vec<CategoryDefault>,
        generic_default: CatalogEntry,
    ) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            validate_entry(entry)?;
            if index.insert(entry.key.clone(), position).is_some() {
                return Err(CatalogError::DuplicateKey(entry.key.0.clone()));
            }
        }

        let mut category_defaults = category_defaults;
        for default in &mut category_defaults {
            validate_entry(&default.entry)?;
            default.pattern = default.pattern.trim().to_lowercase();
            if default.pattern.is_empty() {
                return Err(CatalogError::Invariant {
                    key: default.entry.key.0.clone(),
                    reason: "category default pattern must not be empty".to_string(),
                });
            }
        }
        validate_entry(&generic_default)?;

        let fingerprint = fingerprint(&entries, &category_defaults, &generic_default);

        Ok(Self { entries, index, category_defaults, generic_default, fingerprint })
    }

    /// The catalog compiled into the binary.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json_str(EMBEDDED_CATALOG)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(raw)?;
        Self::new(document.entries, document.category_defaults, document.generic_default)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw)
    }

    /// Loads `path` when given, otherwise the embedded catalog.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::embedded(),
        }
    }

    /// Entries in definition order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.index.get(&CatalogKey(key.to_string())).map(|position| &self.entries[*position])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn category_defaults(&self) -> &[CategoryDefault] {
        &self.category_defaults
    }

    pub fn generic_default(&self) -> &CatalogEntry {
        &self.generic_default
    }

    /// First default whose pattern occurs in the hint, case-insensitively;
    /// the generic default when none does or no hint is given.
    pub fn category_default(&self, hint: Option<&str>) -> &CatalogEntry {
        let Some(hint) = hint else {
            return &self.generic_default;
        };
        let hint = hint.to_lowercase();

        self.category_defaults
            .iter()
            .find(|default| hint.contains(&default.pattern))
            .map(|default| &default.entry)
            .unwrap_or(&self.generic_default)
    }

    /// Hex blake3 digest identifying this catalog revision.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn validate_entry(entry: &CatalogEntry) -> Result<(), CatalogError> {
    let key = entry.key.as_str();
    let invalid =
        |reason: &str| CatalogError::Invariant { key: key.to_string(), reason: reason.to_string() };

    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if key.trim() != key || key.to_lowercase() != key {
        return Err(invalid("key must be lowercase and trimmed"));
    }
    if entry.reference_price <= 0 {
        return Err(invalid("reference_price must be greater than zero"));
    }
    if !(entry.variation > 0.0 && entry.variation <= 1.0) {
        return Err(invalid("variation must be in range (0, 1]"));
    }

    Ok(())
}

fn fingerprint(
    entries: &[CatalogEntry],
    category_defaults: &[CategoryDefault],
    generic_default: &CatalogEntry,
) -> String {
    fn absorb(hasher: &mut blake3::Hasher, entry: &CatalogEntry) {
        hasher.update(entry.key.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&entry.reference_price.to_le_bytes());
        hasher.update(&entry.variation.to_bits().to_le_bytes());
        hasher.update(entry.image_url.as_bytes());
        hasher.update(&[0]);
        hasher.update(entry.brand.as_deref().unwrap_or_default().as_bytes());
        hasher.update(&[0]);
    }

    let mut hasher = blake3::Hasher::new();
    for entry in entries {
        absorb(&mut hasher, entry);
    }
    for default in category_defaults {
        hasher.update(default.pattern.as_bytes());
        hasher.update(&[0]);
        absorb(&mut hasher, &default.entry);
    }
    absorb(&mut hasher, generic_default);
    hasher.finalize().to_hex().to_string()
}
