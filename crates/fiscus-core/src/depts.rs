//! Department name canonicalization.
//!
//! Reports print department names inconsistently across years. A packaged
//! alias table maps the observed spellings to a canonical name, two-digit
//! code, and abbreviation; spellings the table has never seen can be
//! resolved manually once and remembered in a JSON side-cache under the
//! interim data root. The cache file is read on first use and rewritten
//! after each recorded match; concurrent writers are not supported.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FiscusError, FiscusResult};

/// Packaged alias table, one row per known spelling.
const DEPARTMENTS_CSV: &str = include_str!("../data/departments.csv");

/// File name of the manual-match side-cache.
pub const MATCH_CACHE_FILE: &str = "dept-matches.json";

/// Canonical department identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeptInfo {
    pub dept_name: String,
    pub dept_code: String,
    pub abbreviation: String,
}

/// Outcome of an alias lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(DeptInfo),
    Unresolved,
}

#[derive(Debug, Deserialize)]
struct AliasRow {
    alias: String,
    dept_name: String,
    dept_code: String,
    abbreviation: String,
}

/// Resolves raw department spellings to canonical identities.
#[derive(Debug)]
pub struct DeptResolver {
    aliases: BTreeMap<String, DeptInfo>,
    cache_path: Option<PathBuf>,
    cached_matches: BTreeMap<String, DeptInfo>,
}

impl DeptResolver {
    /// Build a resolver from the packaged alias table.
    pub fn packaged() -> FiscusResult<Self> {
        let mut aliases = BTreeMap::new();
        let mut reader = csv::Reader::from_reader(DEPARTMENTS_CSV.as_bytes());
        for row in reader.deserialize() {
            let row: AliasRow = row?;
            aliases.insert(
                normalize_alias(&row.alias),
                DeptInfo {
                    dept_name: row.dept_name,
                    dept_code: row.dept_code,
                    abbreviation: row.abbreviation,
                },
            );
        }
        Ok(Self {
            aliases,
            cache_path: None,
            cached_matches: BTreeMap::new(),
        })
    }

    /// Attach a manual-match cache file, loading it when present.
    pub fn with_match_cache(mut self, path: impl AsRef<Path>) -> FiscusResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            self.cached_matches = serde_json::from_str(&contents)
                .map_err(|e| FiscusError::config(format!("bad match cache {path:?}: {e}")))?;
        }
        self.cache_path = Some(path);
        Ok(self)
    }

    /// Look up a raw spelling. Pure: a miss reports `Unresolved` and leaves
    /// interactive recovery to the caller.
    pub fn resolve(&self, alias: &str) -> Resolution {
        let key = normalize_alias(alias);
        if let Some(info) = self.aliases.get(&key) {
            return Resolution::Resolved(info.clone());
        }
        if let Some(info) = self.cached_matches.get(alias.trim()) {
            return Resolution::Resolved(info.clone());
        }
        Resolution::Unresolved
    }

    /// Record a manually chosen match and persist the cache file.
    pub fn record_match(&mut self, alias: &str, info: DeptInfo) -> FiscusResult<()> {
        self.cached_matches.insert(alias.trim().to_string(), info);
        if let Some(path) = &self.cache_path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(&self.cached_matches)
                .map_err(|e| FiscusError::config(format!("cannot serialize match cache: {e}")))?;
            fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Number of known aliases, packaged plus cached.
    pub fn len(&self) -> usize {
        self.aliases.len() + self.cached_matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty() && self.cached_matches.is_empty()
    }
}

fn normalize_alias(alias: &str) -> String {
    alias.trim().to_lowercase()
}
