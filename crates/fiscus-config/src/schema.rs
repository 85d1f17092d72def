//! Configuration schema for the report ETL.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::table::TableParams;

/// Environment variable overriding the data root directory.
pub const DATA_ROOT_ENV: &str = "FISCUS_DATA_ROOT";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Data directory layout
    pub data: DataRoots,
    /// Remote OCR provider settings
    #[serde(default)]
    pub remote: RemoteOcrSettings,
    /// Default clustering tolerances for geometric reconstruction
    #[serde(default)]
    pub table: TableDefaults,
}

/// The three data roots: read-only raw PDFs, write-only processed CSVs, and
/// the append-only interim cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRoots {
    pub raw: PathBuf,
    pub processed: PathBuf,
    pub interim: PathBuf,
}

impl DataRoots {
    /// Conventional layout under a single root: `raw/`, `processed/`,
    /// `interim/`.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            raw: root.join("raw"),
            processed: root.join("processed"),
            interim: root.join("interim"),
        }
    }
}

/// Remote OCR backend settings. Credentials are read from the conventional
/// AWS environment variables by the backend glue, never from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteOcrSettings {
    /// Upload bucket for rasterized pages
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Service region; `None` defers to the environment
    #[serde(default)]
    pub region: Option<String>,
    /// Seconds between completion polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Hard ceiling on total wait per page, in seconds
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
    /// Transient poll errors tolerated before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_bucket() -> String {
    "fiscus-ocr-interim".to_string()
}
fn default_poll_interval() -> u64 {
    5
}
fn default_deadline() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}

impl Default for RemoteOcrSettings {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: None,
            poll_interval_secs: default_poll_interval(),
            deadline_secs: default_deadline(),
            max_retries: default_max_retries(),
        }
    }
}

/// Default clustering tolerances, overridable per report family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefaults {
    #[serde(default = "default_text_tol_x")]
    pub text_tolerance_x: f64,
    #[serde(default = "default_text_tol_y")]
    pub text_tolerance_y: f64,
    #[serde(default = "default_column_tol")]
    pub column_tolerance: f64,
    #[serde(default = "default_min_col_sep")]
    pub min_col_sep: f64,
    #[serde(default = "default_row_header_tol")]
    pub row_header_tolerance: f64,
}

fn default_text_tol_x() -> f64 {
    3.0
}
fn default_text_tol_y() -> f64 {
    5.0
}
fn default_column_tol() -> f64 {
    20.0
}
fn default_min_col_sep() -> f64 {
    24.0
}
fn default_row_header_tol() -> f64 {
    10.0
}

impl Default for TableDefaults {
    fn default() -> Self {
        Self {
            text_tolerance_x: default_text_tol_x(),
            text_tolerance_y: default_text_tol_y(),
            column_tolerance: default_column_tol(),
            min_col_sep: default_min_col_sep(),
            row_header_tolerance: default_row_header_tol(),
        }
    }
}

impl TableDefaults {
    pub fn params(&self) -> TableParams {
        TableParams {
            text_tolerance_x: self.text_tolerance_x,
            text_tolerance_y: self.text_tolerance_y,
            column_tolerance: self.column_tolerance,
            min_col_sep: self.min_col_sep,
            row_header_tolerance: self.row_header_tolerance,
        }
    }
}

/// Credentials for the remote OCR transport, read from the conventional
/// environment variables. The transport itself lives behind the provider
/// seam; settings files never carry secrets.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: Option<String>,
}

impl AwsCredentials {
    /// Read `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` /
    /// `AWS_DEFAULT_REGION`; `None` when the key pair is not fully set.
    pub fn from_env() -> Option<Self> {
        let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(Self {
            access_key_id,
            secret_access_key,
            region: env::var("AWS_DEFAULT_REGION").ok(),
        })
    }
}

impl Settings {
    /// Settings rooted at a data directory with every other field at its
    /// default.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        Self {
            data: DataRoots::rooted_at(root),
            remote: RemoteOcrSettings::default(),
            table: TableDefaults::default(),
        }
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> FiscusResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FiscusError::file_not_found(path));
        }
        let contents = fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| FiscusError::config(format!("cannot parse {path:?}: {e}")))
    }

    /// Resolve settings from the environment: `FISCUS_DATA_ROOT` when set,
    /// otherwise `./data` under the working directory.
    pub fn from_env() -> Self {
        let root = env::var_os(DATA_ROOT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        Self::rooted_at(root)
    }

    /// Serialize a sample configuration for `init`-style scaffolding.
    pub fn to_yaml(&self) -> FiscusResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| FiscusError::config(format!("cannot serialize settings: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rooted_layout() {
        let s = Settings::rooted_at("/data");
        assert_eq!(s.data.raw, PathBuf::from("/data/raw"));
        assert_eq!(s.data.processed, PathBuf::from("/data/processed"));
        assert_eq!(s.data.interim, PathBuf::from("/data/interim"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fiscus.yaml");
        let settings = Settings::rooted_at("/data");
        std::fs::write(&path, settings.to_yaml().unwrap()).unwrap();

        let loaded = Settings::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.data.raw, settings.data.raw);
        assert_eq!(loaded.remote.poll_interval_secs, 5);
        assert_eq!(loaded.table.min_col_sep, 24.0);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fiscus.yaml");
        std::fs::write(
            &path,
            "data:\n  raw: /d/raw\n  processed: /d/processed\n  interim: /d/interim\n",
        )
        .unwrap();
        let loaded = Settings::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.remote.deadline_secs, 300);
        assert_eq!(loaded.table.text_tolerance_x, 3.0);
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(Settings::from_yaml_file("/no/such/fiscus.yaml").is_err());
    }
}
