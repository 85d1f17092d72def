//! Explicit runtime context.
//!
//! All process-wide state (data roots, the department resolver, and the
//! page-content providers) is initialized once from settings and threaded
//! through pipeline calls by reference. There are no hidden globals.

use std::path::Path;

use fiscus_config::Settings;
use fiscus_core::depts::{DeptResolver, MATCH_CACHE_FILE};
use fiscus_core::error::FiscusResult;
use fiscus_core::table::TableParams;
use fiscus_core::traits::{TableProvider, TokenProvider};

/// Shared state for one process worth of pipeline invocations.
pub struct Context {
    settings: Settings,
    tokens: Box<dyn TokenProvider>,
    tables: Box<dyn TableProvider>,
    depts: DeptResolver,
}

impl Context {
    /// Initialize from settings and the two providers.
    pub fn new(
        settings: Settings,
        tokens: Box<dyn TokenProvider>,
        tables: Box<dyn TableProvider>,
    ) -> FiscusResult<Self> {
        let depts = DeptResolver::packaged()?
            .with_match_cache(settings.data.interim.join(MATCH_CACHE_FILE))?;
        Ok(Self {
            settings,
            tokens,
            tables,
            depts,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn raw_root(&self) -> &Path {
        &self.settings.data.raw
    }

    pub fn processed_root(&self) -> &Path {
        &self.settings.data.processed
    }

    pub fn interim_root(&self) -> &Path {
        &self.settings.data.interim
    }

    pub fn tokens(&self) -> &dyn TokenProvider {
        self.tokens.as_ref()
    }

    pub fn tables(&self) -> &dyn TableProvider {
        self.tables.as_ref()
    }

    pub fn depts(&self) -> &DeptResolver {
        &self.depts
    }

    /// Default clustering tolerances from settings.
    pub fn table_params(&self) -> TableParams {
        self.settings.table.params()
    }
}
