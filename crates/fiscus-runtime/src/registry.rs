//! Typed report registry.
//!
//! Report families are data: each registers a descriptor naming its
//! parameter schema, raw-path convention, and crop strategy, plus a
//! constructor producing the pipeline for a parameter tuple. The registry
//! is built once at startup by an explicit registration call and read-only
//! afterwards.

use std::collections::BTreeMap;

use fiscus_core::error::{FiscusError, FiscusResult};

use crate::context::Context;
use crate::params::ReportParams;
use crate::pipeline::EtlPipeline;

/// The three report groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportGroup {
    Collections,
    Qcmr,
    Budget,
}

impl ReportGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportGroup::Collections => "collections",
            ReportGroup::Qcmr => "qcmr",
            ReportGroup::Budget => "budget",
        }
    }
}

/// Which parameters a family requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSpec {
    /// `--year` and `--month`
    YearMonth,
    /// `--fiscal-year` and `--quarter`
    FiscalYearQuarter,
    /// `--fiscal-year`
    FiscalYear,
    /// `--fiscal-year` and `--kind`
    FiscalYearKind,
}

impl ParamSpec {
    pub fn describe(&self) -> &'static str {
        match self {
            ParamSpec::YearMonth => "--year --month",
            ParamSpec::FiscalYearQuarter => "--fiscal-year --quarter",
            ParamSpec::FiscalYear => "--fiscal-year",
            ParamSpec::FiscalYearKind => "--fiscal-year --kind",
        }
    }
}

/// How a family isolates its table on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropStrategy {
    /// Geometric reconstruction of the full page token set.
    FullPage,
    /// Geometric reconstruction between two anchor phrases.
    Anchored {
        top_anchor: &'static str,
        bottom_anchor: &'static str,
    },
    /// Take the OCR provider's tables from the given page (1-based).
    OcrTables { page: usize },
    /// OCR tables from every page, stitched vertically.
    OcrTablesAllPages,
}

/// Static description of one report family.
#[derive(Debug, Clone, Copy)]
pub struct ReportDescriptor {
    pub name: &'static str,
    pub group: ReportGroup,
    pub params: ParamSpec,
    /// Directory of raw files, relative to the raw data root.
    pub raw_subdir: &'static str,
    pub crop: CropStrategy,
    pub description: &'static str,
}

/// Constructor for a family's pipeline.
pub type BuildFn = fn(&Context, &ReportParams) -> FiscusResult<Box<dyn EtlPipeline>>;

/// Registry entry: descriptor plus constructor.
pub struct ReportEntry {
    pub descriptor: ReportDescriptor,
    pub build: BuildFn,
}

/// Process-wide name-to-report mapping.
#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<&'static str, ReportEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one family. Duplicate names are a configuration error.
    pub fn register(&mut self, entry: ReportEntry) -> FiscusResult<()> {
        let name = entry.descriptor.name;
        if self.entries.contains_key(name) {
            return Err(FiscusError::config(format!(
                "report '{name}' registered twice"
            )));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ReportEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.values()
    }

    /// Entries of one group, in name order.
    pub fn by_group(&self, group: ReportGroup) -> Vec<&ReportEntry> {
        self.entries
            .values()
            .filter(|e| e.descriptor.group == group)
            .collect()
    }

    /// Registered names, for CLI error messages.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscus_core::frame::Frame;
    use std::path::PathBuf;

    struct Noop;

    impl EtlPipeline for Noop {
        fn name(&self) -> &str {
            "Noop"
        }

        fn extract(&mut self, _ctx: &Context) -> FiscusResult<Frame> {
            Ok(Frame::default())
        }

        fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
            Ok(raw)
        }

        fn output_path(&self, _ctx: &Context) -> PathBuf {
            PathBuf::from("noop.csv")
        }
    }

    fn entry(name: &'static str) -> ReportEntry {
        ReportEntry {
            descriptor: ReportDescriptor {
                name,
                group: ReportGroup::Collections,
                params: ParamSpec::YearMonth,
                raw_subdir: "collections/monthly/city",
                crop: CropStrategy::FullPage,
                description: "test entry",
            },
            build: |_, _| Ok(Box::new(Noop)),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry.register(entry("CityTaxCollections")).unwrap();
        assert!(registry.get("CityTaxCollections").is_some());
        assert!(registry.get("Unknown").is_none());
        assert_eq!(registry.names(), vec!["CityTaxCollections"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = Registry::new();
        registry.register(entry("CityTaxCollections")).unwrap();
        assert!(registry.register(entry("CityTaxCollections")).is_err());
    }

    #[test]
    fn test_group_listing() {
        let mut registry = Registry::new();
        registry.register(entry("B")).unwrap();
        registry.register(entry("A")).unwrap();
        let group = registry.by_group(ReportGroup::Collections);
        let names: Vec<_> = group.iter().map(|e| e.descriptor.name).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(registry.by_group(ReportGroup::Budget).is_empty());
    }
}
