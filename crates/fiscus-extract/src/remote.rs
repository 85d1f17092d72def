//! The remote OCR token path.
//!
//! A rasterized page is submitted to an OCR backend that returns a block
//! document (§ [`crate::blocks`]). The backend transport (upload, service
//! API) is an external collaborator behind [`OcrBackend`]; this module owns
//! the polling discipline and the cache. Polling is bounded: a fixed
//! interval, a hard deadline, and a retry budget for transient errors.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::grid::Grid;
use fiscus_core::token::Token;
use fiscus_core::traits::{TableProvider, TokenProvider};

use crate::blocks::{document_tables, document_tokens, BlockDocument};
use crate::cache::InterimCache;

/// State of an in-flight analysis job.
#[derive(Debug, Clone)]
pub enum PollState {
    InProgress,
    Complete(BlockDocument),
    Failed(String),
}

/// The OCR backend transport.
pub trait OcrBackend {
    /// Submit one page for analysis; returns an opaque job id.
    fn start_analysis(&self, source: &Path, page: usize) -> FiscusResult<String>;

    /// Check on a submitted job.
    fn poll(&self, job_id: &str) -> FiscusResult<PollState>;

    fn page_count(&self, source: &Path) -> FiscusResult<usize>;
}

/// Polling discipline for the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between polls.
    pub interval: Duration,
    /// Hard ceiling on total wait per page.
    pub deadline: Duration,
    /// Transient poll errors tolerated before giving up.
    pub max_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            deadline: Duration::from_secs(300),
            max_retries: 3,
        }
    }
}

/// Token and table provider backed by a remote OCR service.
pub struct RemoteTokens<B> {
    backend: B,
    cache: Option<InterimCache>,
    poll: PollConfig,
}

impl<B: OcrBackend> RemoteTokens<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: None,
            poll: PollConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: InterimCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Fetch one page's analysis, consulting the cache first.
    fn fetch_document(&self, source: &Path, page: usize) -> FiscusResult<BlockDocument> {
        if let Some(cache) = &self.cache {
            if let Some(doc) = cache.load(source, page)? {
                return Ok(doc);
            }
        }

        info!(?source, page, "submitting page for OCR analysis");
        let job_id = self.backend.start_analysis(source, page)?;
        let doc = self.await_completion(&job_id)?;

        if let Some(cache) = &self.cache {
            let tables = document_tables(&doc)?;
            cache.store(source, page, &doc, &tables)?;
        }
        Ok(doc)
    }

    fn await_completion(&self, job_id: &str) -> FiscusResult<BlockDocument> {
        let started = Instant::now();
        let mut retries = 0u32;
        loop {
            match self.backend.poll(job_id) {
                Ok(PollState::Complete(doc)) => return Ok(doc),
                Ok(PollState::Failed(reason)) => {
                    return Err(FiscusError::provider(format!(
                        "analysis job {job_id} failed: {reason}"
                    )));
                }
                Ok(PollState::InProgress) => {
                    debug!(job_id, elapsed = ?started.elapsed(), "analysis in progress");
                }
                Err(err) => {
                    retries += 1;
                    if retries > self.poll.max_retries {
                        return Err(FiscusError::provider(format!(
                            "analysis job {job_id} errored after {retries} attempts: {err}"
                        )));
                    }
                    warn!(job_id, retries, %err, "transient poll failure");
                }
            }

            if started.elapsed() + self.poll.interval > self.poll.deadline {
                return Err(FiscusError::provider(format!(
                    "analysis job {job_id} missed the {:?} deadline",
                    self.poll.deadline
                )));
            }
            std::thread::sleep(self.poll.interval);
        }
    }
}

impl<B: OcrBackend> TokenProvider for RemoteTokens<B> {
    fn tokens_of_page(&self, source: &Path, page: usize) -> FiscusResult<Vec<Token>> {
        let doc = self.fetch_document(source, page)?;
        document_tokens(&doc)
    }

    fn page_count(&self, source: &Path) -> FiscusResult<usize> {
        self.backend.page_count(source)
    }
}

impl<B: OcrBackend> TableProvider for RemoteTokens<B> {
    fn tables_of_page(&self, source: &Path, page: usize) -> FiscusResult<Vec<Grid>> {
        let doc = self.fetch_document(source, page)?;
        document_tables(&doc)
    }

    fn page_count(&self, source: &Path) -> FiscusResult<usize> {
        self.backend.page_count(source)
    }
}

/// Backend for deployments without an OCR transport: every analysis the
/// interim cache already holds is served by the provider layer in front of
/// this backend, and anything else fails with instructions.
#[derive(Debug, Clone)]
pub struct CacheOnlyBackend {
    interim_root: std::path::PathBuf,
}

impl CacheOnlyBackend {
    pub fn new(interim_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            interim_root: interim_root.into(),
        }
    }
}

impl OcrBackend for CacheOnlyBackend {
    fn start_analysis(&self, source: &Path, page: usize) -> FiscusResult<String> {
        Err(FiscusError::provider(format!(
            "no OCR backend configured for {source:?} page {page}; \
             populate the interim cache or wire a transport"
        )))
    }

    fn poll(&self, job_id: &str) -> FiscusResult<PollState> {
        Err(FiscusError::provider(format!(
            "no OCR backend configured; job {job_id} cannot exist"
        )))
    }

    fn page_count(&self, source: &Path) -> FiscusResult<usize> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FiscusError::provider(format!("bad source path {source:?}")))?;
        let prefix = format!("{stem}-pg-");
        let mut pages = 0;
        if self.interim_root.exists() {
            for entry in std::fs::read_dir(&self.interim_root)? {
                let name = entry?.file_name();
                let Some(name) = name.to_str() else { continue };
                if name.starts_with(&prefix) && name.ends_with(".json") {
                    pages += 1;
                }
            }
        }
        Ok(pages)
    }
}
