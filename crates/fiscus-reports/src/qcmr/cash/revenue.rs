//! General Fund cash revenue forecast.

use std::path::PathBuf;

use rust_decimal_macros::dec;

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_core::validate::{check_group_totals, check_observation_counts, SumCheck};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::super::{stacked_tables, QcmrReport};
use super::{cash_melt, check_category_vocab, check_month_totals, set_categories};

/// Revenue categories, page order. The beverage tax only exists from
/// fiscal 2017 on.
const CATEGORIES: [&str; 15] = [
    "real_estate_tax",
    "total_wage_earnings_net_profits",
    "realty_transfer_tax",
    "sales_tax",
    "business_income_and_receipts_tax",
    "beverage_tax",
    "other_taxes",
    "locally_generated_nontax",
    "total_other_governments",
    "total_pica_other_governments",
    "interfund_transfers",
    "total_current_revenue",
    "collection_of_prior_year_revenue",
    "other_fund_balance_adjustments",
    "total_cash_receipts",
];

const ADJUSTMENTS_ROW: &str = "Other fund balance adjustments";

/// The revenue section of the QCMR cash flow forecast.
pub struct CashReportRevenue {
    report: QcmrReport,
}

impl CashReportRevenue {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            report: QcmrReport::resolve(ctx, params, "cash")?,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "CashReportRevenue",
            group: ReportGroup::Qcmr,
            params: ParamSpec::FiscalYearQuarter,
            raw_subdir: "qcmr/cash",
            crop: CropStrategy::OcrTables { page: 1 },
            description: "General Fund cash revenue from the QCMR cash flow forecast",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    fn categories(&self) -> Vec<&'static str> {
        CATEGORIES
            .iter()
            .copied()
            .filter(|c| *c != "beverage_tax" || self.report.fiscal_year >= 2017)
            .collect()
    }

    fn transform_impl(&self, raw: Frame) -> FiscusResult<Frame> {
        let mut frame = raw;

        // Stray cross-reference lines in some years.
        frame.retain_rows(|row| {
            row[0]
                .as_text()
                .map_or(true, |t| !t.contains("Non-re") && !t.contains("Non-bu"))
        });

        // Old files print no adjustments line when it is zero.
        let has_adjustments = frame
            .rows()
            .any(|r| r[0].as_text() == Some(ADJUSTMENTS_ROW));
        if self.report.fiscal_year >= 2011 && !has_adjustments && frame.nrows() > 0 {
            let mut row = vec![CellValue::text(ADJUSTMENTS_ROW)];
            row.extend(std::iter::repeat(CellValue::text("0")).take(frame.ncols() - 1));
            frame.insert_row(frame.nrows() - 1, row)?;
        }

        let categories = self.categories();
        set_categories(&mut frame, &categories, "revenue", &self.report)?;

        let long = cash_melt(&frame)?;
        check_category_vocab(&long, &CATEGORIES)?;
        Ok(long)
    }
}

impl EtlPipeline for CashReportRevenue {
    fn name(&self) -> &str {
        "CashReportRevenue"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let frame = stacked_tables(ctx, &self.report, 1)?;

        let mut start = frame.find_single("0", "the REVENUES heading", |v| {
            v.as_text().is_some_and(|t| t.trim().starts_with("REVENUES"))
        })?;
        // The heading row itself carries no amounts in most years.
        let heading_empty = frame.columns()[1..]
            .iter()
            .all(|c| frame.value(start, c).map_or(true, CellValue::is_missing));
        if heading_empty {
            start += 1;
        }
        let stop = frame.find_single("0", "the TOTAL CASH RECEIPTS line", |v| {
            v.as_text().is_some_and(|t| t.contains("TOTAL CASH RECEIPTS"))
        })?;

        if frame.ncols() < 14 {
            return Err(FiscusError::parse(format!(
                "revenue table has {} columns, expected at least 14",
                frame.ncols()
            )));
        }
        let keep: Vec<&str> = frame.columns()[..14].iter().map(String::as_str).collect();
        let mut section = frame.slice_rows(start, stop).select_columns(&keep)?;
        section.drop_missing_rows(None);
        Ok(section)
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        self.transform_impl(raw)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        // Twelve months plus the parsed total.
        check_observation_counts(data, "category", 13)?;
        check_month_totals(data, dec!(0.401))?;

        let current_revenue = SumCheck::new(
            "total_current_revenue",
            &[
                "real_estate_tax",
                "total_wage_earnings_net_profits",
                "realty_transfer_tax",
                "sales_tax",
                "business_income_and_receipts_tax",
                "beverage_tax",
                "other_taxes",
                "locally_generated_nontax",
                "total_other_governments",
                "total_pica_other_governments",
                "interfund_transfers",
            ],
            dec!(0.401),
        );
        let cash_receipts = SumCheck::new(
            "total_cash_receipts",
            &[
                "total_current_revenue",
                "collection_of_prior_year_revenue",
                "other_fund_balance_adjustments",
            ],
            dec!(0.401),
        );
        check_group_totals(data, "category", "fiscal_month", "amount", &current_revenue)?;
        check_group_totals(data, "category", "fiscal_month", "amount", &cash_receipts)
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        self.report.output_path(ctx, "cash", Some("revenue"))
    }
}
