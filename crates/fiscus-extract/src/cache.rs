//! On-disk cache for remote OCR results.
//!
//! Analyses are cached under the interim data root keyed by the source file
//! stem and page number; a cache hit bypasses the OCR call entirely. The
//! directory is append-only under per-page file names, so invocations over
//! disjoint parameters never collide. Alongside the block document, the
//! parsed per-page tables are materialized as CSV for inspection.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::grid::Grid;

use crate::blocks::BlockDocument;

/// Per-page analysis cache rooted at the interim data directory.
#[derive(Debug, Clone)]
pub struct InterimCache {
    root: PathBuf,
}

impl InterimCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stem(source: &Path) -> FiscusResult<&str> {
        source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FiscusError::provider(format!("bad source path {source:?}")))
    }

    /// Path of the cached block document for a page.
    pub fn document_path(&self, source: &Path, page: usize) -> FiscusResult<PathBuf> {
        Ok(self
            .root
            .join(format!("{}-pg-{page}.json", Self::stem(source)?)))
    }

    /// Path of the materialized table CSV for a page.
    pub fn table_path(&self, source: &Path, page: usize) -> FiscusResult<PathBuf> {
        Ok(self
            .root
            .join(format!("{}-pg-{page}.csv", Self::stem(source)?)))
    }

    /// Load a cached analysis, if one exists.
    pub fn load(&self, source: &Path, page: usize) -> FiscusResult<Option<BlockDocument>> {
        let path = self.document_path(source, page)?;
        if !path.exists() {
            return Ok(None);
        }
        debug!(?path, "OCR cache hit");
        let contents = fs::read_to_string(&path)?;
        let doc = serde_json::from_str(&contents)
            .map_err(|e| FiscusError::provider(format!("bad cached analysis {path:?}: {e}")))?;
        Ok(Some(doc))
    }

    /// Persist an analysis and its parsed tables. Existing entries are left
    /// alone.
    pub fn store(
        &self,
        source: &Path,
        page: usize,
        doc: &BlockDocument,
        tables: &[Grid],
    ) -> FiscusResult<()> {
        fs::create_dir_all(&self.root)?;

        let doc_path = self.document_path(source, page)?;
        if !doc_path.exists() {
            let contents = serde_json::to_string(doc)
                .map_err(|e| FiscusError::provider(format!("cannot serialize analysis: {e}")))?;
            fs::write(&doc_path, contents)?;
        }

        let table_path = self.table_path(source, page)?;
        if !table_path.exists() {
            if let Ok(stacked) = Grid::concat(tables.to_vec()) {
                let mut writer = csv::Writer::from_path(&table_path)?;
                for row in stacked.rows() {
                    writer.write_record(row)?;
                }
                writer.flush()?;
            }
        }
        Ok(())
    }
}
