//! Fund balances from the cash flow forecast.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal_macros::dec;

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_core::validate::{check_group_totals, check_observation_counts, SumCheck};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::super::{stacked_tables, QcmrReport};
use super::cash_melt;

const CATEGORIES: [&str; 13] = [
    "vehicle_rental_tax",
    "community_development",
    "grants_revenue",
    "total_capital_funds",
    "total_fund_equity",
    "industrial_and_commercial_dev",
    "other_funds",
    "capital_improvement",
    "total_operating_funds",
    "general",
    "housing_trust_fund",
    "hospital_assessment_fund",
    "budget_stabilization_fund",
];

static PARENTHETICAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

/// Fund balances on the second page of the cash forecast.
pub struct CashReportFundBalances {
    report: QcmrReport,
}

impl CashReportFundBalances {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            report: QcmrReport::resolve(ctx, params, "cash")?,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "CashReportFundBalances",
            group: ReportGroup::Qcmr,
            params: ParamSpec::FiscalYearQuarter,
            raw_subdir: "qcmr/cash",
            crop: CropStrategy::OcrTables { page: 2 },
            description: "Operating and capital fund balances from the QCMR cash flow forecast",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    /// Snake-case a printed fund label the way the vocabulary spells it.
    fn canonical_label(raw: &str) -> String {
        let no_parens = PARENTHETICAL_RE.replace_all(raw, "");
        let lowered = no_parens.to_lowercase().replace('&', "and");
        let cleaned: String = lowered
            .chars()
            .filter(|c| !matches!(c, '\u{2010}' | ',' | '.' | '/'))
            .collect();
        cleaned.split_whitespace().collect::<Vec<_>>().join("_")
    }

    fn transform_impl(&self, raw: Frame) -> FiscusResult<Frame> {
        let mut frame = raw;
        let label_col = frame.columns()[0].clone();
        for i in 0..frame.nrows() {
            let printed = frame
                .value(i, &label_col)
                .map(CellValue::render)
                .unwrap_or_default();
            let label = Self::canonical_label(&printed);
            if !CATEGORIES.contains(&label.as_str()) {
                return Err(FiscusError::parse(format!(
                    "parsing error for fund balance data in {} cash report: \
                     unknown fund '{printed}'",
                    self.report.tag()
                )));
            }
            frame.set_value(i, &label_col, CellValue::Text(label))?;
        }

        // Row order varies by year, so only membership and count are
        // enforced.
        if frame.nrows() != CATEGORIES.len() {
            return Err(FiscusError::parse(format!(
                "parsing error for fund balance data in {} cash report: {} rows, expected {}",
                self.report.tag(),
                frame.nrows(),
                CATEGORIES.len()
            )));
        }
        cash_melt(&frame)
    }
}

impl EtlPipeline for CashReportFundBalances {
    fn name(&self) -> &str {
        "CashReportFundBalances"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let frame = stacked_tables(ctx, &self.report, 2)?;
        if frame.nrows() < 2 {
            return Err(FiscusError::parse(
                "fund balance table is empty".to_string(),
            ));
        }
        // Drop the header row, then fully empty rows.
        let mut section = frame.slice_rows(1, frame.nrows() - 1);
        section.drop_missing_rows(None);
        Ok(section)
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        self.transform_impl(raw)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        check_observation_counts(data, "category", 12)?;

        let operating = SumCheck::new(
            "total_operating_funds",
            &[
                "general",
                "grants_revenue",
                "community_development",
                "vehicle_rental_tax",
                "hospital_assessment_fund",
                "housing_trust_fund",
                "budget_stabilization_fund",
                "other_funds",
            ],
            dec!(0.3),
        );
        let capital = SumCheck::new(
            "total_capital_funds",
            &["capital_improvement", "industrial_and_commercial_dev"],
            dec!(0.3),
        );
        let equity = SumCheck::new(
            "total_fund_equity",
            &["total_operating_funds", "total_capital_funds"],
            dec!(0.3),
        );
        check_group_totals(data, "category", "fiscal_month", "amount", &operating)?;
        check_group_totals(data, "category", "fiscal_month", "amount", &capital)?;
        check_group_totals(data, "category", "fiscal_month", "amount", &equity)
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        self.report.output_path(ctx, "cash", Some("fund-balances"))
    }
}
