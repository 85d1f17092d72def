//! Batch execution over a family's raw directory.
//!
//! Walks the raw files for a report family, derives parameters from each
//! file stem, applies the caller's filters, and runs the pipelines
//! sequentially. Outputs newer than their raw file are skipped unless
//! forced; parameter tuples are deduplicated.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use fiscus_core::error::FiscusResult;

use crate::context::Context;
use crate::params::{params_from_stem, BudgetKind, ReportParams};
use crate::pipeline::{RunOptions, RunOutcome};
use crate::registry::ReportEntry;

/// What a batch run accomplished.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Parameter descriptions of the invocations that ran.
    pub processed: Vec<String>,
    /// Files skipped because their output was already fresh.
    pub fresh: usize,
    /// Files skipped because the raw file vanished or no convention
    /// matched.
    pub skipped: usize,
}

/// Run one family over every matching raw file.
pub fn run_batch(
    entry: &ReportEntry,
    ctx: &Context,
    filter: &ReportParams,
    options: &RunOptions,
) -> FiscusResult<BatchSummary> {
    let raw_dir = ctx.raw_root().join(entry.descriptor.raw_subdir);
    let mut summary = BatchSummary::default();
    let mut seen: HashSet<String> = HashSet::new();

    for pdf in walk_pdfs(&raw_dir)? {
        let Some(stem) = pdf.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !filter.selects_stem(stem) {
            continue;
        }
        let Some(stem_params) = params_from_stem(stem) else {
            warn!(?pdf, "no naming convention matches; skipping");
            summary.skipped += 1;
            continue;
        };
        let mut params = stem_params.merge(filter);
        if params.kind.is_none() {
            params.kind = kind_from_path(&pdf);
        }

        let key = params.describe();
        if !seen.insert(key.clone()) {
            continue;
        }

        let mut pipeline = match (entry.build)(ctx, &params) {
            Ok(p) => p,
            Err(err) if err.is_skippable() => {
                summary.skipped += 1;
                continue;
            }
            Err(err) => return Err(err),
        };

        if !options.force && is_fresh(&pipeline.output_path(ctx), &pdf) {
            summary.fresh += 1;
            continue;
        }

        info!(report = entry.descriptor.name, params = %key, "processing");
        match pipeline.run(ctx, options)? {
            RunOutcome::Extracted | RunOutcome::DryRun | RunOutcome::Loaded(_) => {
                summary.processed.push(key);
            }
        }
    }

    Ok(summary)
}

/// Every PDF under the directory, recursively, in sorted order.
fn walk_pdfs(dir: &Path) -> FiscusResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("pdf") {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Budget raw files live under a flavor directory; derive the kind from it.
fn kind_from_path(pdf: &Path) -> Option<BudgetKind> {
    let parent = pdf.parent()?.file_name()?.to_str()?;
    parent.parse().ok()
}

fn is_fresh(output: &Path, raw: &Path) -> bool {
    let (Ok(out_meta), Ok(raw_meta)) = (fs::metadata(output), fs::metadata(raw)) else {
        return false;
    };
    match (out_meta.modified(), raw_meta.modified()) {
        (Ok(out_time), Ok(raw_time)) => out_time >= raw_time,
        _ => false,
    }
}
