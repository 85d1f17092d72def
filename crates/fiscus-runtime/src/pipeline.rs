//! The extract-transform-validate-load state machine.
//!
//! One invocation moves `Created -> Extracted -> Transformed -> Validated
//! -> Loaded`; any error aborts before the load, and the sink's atomic
//! overwrite guarantees no partial output. Validation can be skipped by
//! flag, extraction can be run alone, and a dry run stops short of writing.

use std::path::PathBuf;

use tracing::info;

use fiscus_core::error::FiscusResult;
use fiscus_core::frame::Frame;
use fiscus_core::traits::RecordSink;
use fiscus_output::CsvRecordSink;

use crate::context::Context;

/// Flags controlling one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after validation without writing output.
    pub dry_run: bool,
    /// Skip the validation step.
    pub no_validate: bool,
    /// Stop after extraction; used to warm OCR caches.
    pub extract_only: bool,
    /// Re-run even when the output is newer than the raw file.
    pub force: bool,
}

/// Where an invocation stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Extraction finished; nothing transformed or written.
    Extracted,
    /// Transform (and validation, unless skipped) finished; dry run wrote
    /// nothing.
    DryRun,
    /// Output written.
    Loaded(PathBuf),
}

/// One report pipeline: a specialization plugs extraction, transformation,
/// validation, and its destination path into the provided `run` driver.
pub trait EtlPipeline {
    /// Report name, as registered.
    fn name(&self) -> &str;

    /// Pull the intermediate table out of the raw source.
    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame>;

    /// Clean, label, and reshape into the normalized record set.
    fn transform(&mut self, ctx: &Context, raw: Frame) -> FiscusResult<Frame>;

    /// Check the record set against the report's subtotal algebra. The
    /// default accepts everything.
    fn validate(&self, _data: &Frame) -> FiscusResult<()> {
        Ok(())
    }

    /// Destination of the processed CSV.
    fn output_path(&self, ctx: &Context) -> PathBuf;

    /// Extract and transform in sequence.
    fn extract_transform(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let raw = self.extract(ctx)?;
        self.transform(ctx, raw)
    }

    /// Drive the full state machine.
    fn run(&mut self, ctx: &Context, options: &RunOptions) -> FiscusResult<RunOutcome> {
        info!(report = self.name(), "extracting");
        let raw = self.extract(ctx)?;
        if options.extract_only {
            return Ok(RunOutcome::Extracted);
        }

        info!(report = self.name(), "transforming");
        let data = self.transform(ctx, raw)?;

        if !options.no_validate {
            info!(report = self.name(), "validating");
            self.validate(&data)?;
        }

        if options.dry_run {
            info!(report = self.name(), "dry run; skipping load");
            return Ok(RunOutcome::DryRun);
        }

        let destination = self.output_path(ctx);
        let mut sink = CsvRecordSink::new(&destination);
        sink.write_frame(&data)?;
        Ok(RunOutcome::Loaded(destination))
    }
}

impl std::fmt::Debug for dyn EtlPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtlPipeline").field("name", &self.name()).finish()
    }
}
