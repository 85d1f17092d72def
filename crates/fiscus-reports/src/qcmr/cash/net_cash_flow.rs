//! General Fund net cash flow.

use std::path::PathBuf;

use rust_decimal_macros::dec;

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::Frame;
use fiscus_core::validate::{check_group_totals, check_observation_counts, SumCheck};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::super::{stacked_tables, QcmrReport};
use super::{cash_melt, check_category_vocab, set_categories};

const CATEGORIES: [&str; 4] = [
    "excess_of_receipts_over_disbursements",
    "opening_balance",
    "tran",
    "closing_balance",
];

/// The net cash flow block at the bottom of the cash forecast page.
pub struct CashReportNetCashFlow {
    report: QcmrReport,
}

impl CashReportNetCashFlow {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            report: QcmrReport::resolve(ctx, params, "cash")?,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "CashReportNetCashFlow",
            group: ReportGroup::Qcmr,
            params: ParamSpec::FiscalYearQuarter,
            raw_subdir: "qcmr/cash",
            crop: CropStrategy::OcrTables { page: 1 },
            description: "General Fund net cash flow from the QCMR cash flow forecast",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    fn transform_impl(&self, raw: Frame) -> FiscusResult<Frame> {
        let mut frame = raw;
        set_categories(&mut frame, &CATEGORIES, "net cash flow", &self.report)?;
        let long = cash_melt(&frame)?;
        check_category_vocab(&long, &CATEGORIES)?;
        Ok(long)
    }
}

impl EtlPipeline for CashReportNetCashFlow {
    fn name(&self) -> &str {
        "CashReportNetCashFlow"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let frame = stacked_tables(ctx, &self.report, 1)?;

        // The block follows the disbursements total and runs to the end of
        // the page; it has no month-13 total column.
        let after = frame.find_single("0", "the TOTAL DISBURSEMENTS line", |v| {
            v.as_text()
                .is_some_and(|t| t.trim().starts_with("TOTAL DISBURSEMENTS"))
        })?;
        if after + 1 >= frame.nrows() {
            return Err(FiscusError::parse(
                "no rows after the disbursements total".to_string(),
            ));
        }
        if frame.ncols() < 13 {
            return Err(FiscusError::parse(format!(
                "net cash flow table has {} columns, expected at least 13",
                frame.ncols()
            )));
        }
        let keep: Vec<&str> = frame.columns()[..13].iter().map(String::as_str).collect();
        let mut section = frame
            .slice_rows(after + 1, frame.nrows() - 1)
            .select_columns(&keep)?;

        let data_cols: Vec<String> = section.columns()[1..].to_vec();
        let refs: Vec<&str> = data_cols.iter().map(String::as_str).collect();
        section.drop_missing_rows(Some(&refs));
        Ok(section)
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        self.transform_impl(raw)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        check_observation_counts(data, "category", 12)?;
        let closing = SumCheck::new(
            "closing_balance",
            &[
                "excess_of_receipts_over_disbursements",
                "opening_balance",
                "tran",
            ],
            dec!(0.3),
        );
        check_group_totals(data, "category", "fiscal_month", "amount", &closing)
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        self.report.output_path(ctx, "cash", Some("net-cash-flow"))
    }
}
