//! General Fund cash spending forecast.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal_macros::dec;

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::Frame;
use fiscus_core::validate::{check_group_totals, check_observation_counts, SumCheck};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::super::{stacked_tables, QcmrReport};
use super::{cash_melt, check_category_vocab, check_month_totals, set_categories};

const CATEGORIES: [&str; 14] = [
    "payroll",
    "employee_benefits",
    "pension",
    "purchases_of_services",
    "materials_equipment",
    "contributions_indemnities",
    "debt_service_short",
    "debt_service_long",
    "interfund_charges",
    "advances_misc_payments",
    "current_year_appropriation",
    "prior_year_encumbrances",
    "prior_year_vouchers_payable",
    "total_disbursements",
];

// OCR renders the payroll heading unreliably.
static PAYROLL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Payro.*l").unwrap());

/// The spending section of the QCMR cash flow forecast.
pub struct CashReportSpending {
    report: QcmrReport,
}

impl CashReportSpending {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            report: QcmrReport::resolve(ctx, params, "cash")?,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "CashReportSpending",
            group: ReportGroup::Qcmr,
            params: ParamSpec::FiscalYearQuarter,
            raw_subdir: "qcmr/cash",
            crop: CropStrategy::OcrTables { page: 1 },
            description: "General Fund cash spending from the QCMR cash flow forecast",
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
        set_categories(&mut frame, &CATEGORIES, "spending", &self.report)?;
        let long = cash_melt(&frame)?;
        check_category_vocab(&long, &CATEGORIES)?;
        Ok(long)
    }
}

impl EtlPipeline for CashReportSpending {
    fn name(&self) -> &str {
        "CashReportSpending"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let frame = stacked_tables(ctx, &self.report, 1)?;

        let start = frame.find_single("0", "the payroll line", |v| {
            v.as_text().is_some_and(|t| PAYROLL_RE.is_match(t))
        })?;
        let stop = frame.find_single("0", "the TOTAL DISBURSEMENTS line", |v| {
            v.as_text()
                .is_some_and(|t| t.trim().starts_with("TOTAL DISBURSEMENTS"))
        })?;

        if frame.ncols() < 14 {
            return Err(FiscusError::parse(format!(
                "spending table has {} columns, expected at least 14",
                frame.ncols()
            )));
        }
        let keep: Vec<&str> = frame.columns()[..14].iter().map(String::as_str).collect();
        let mut section = frame.slice_rows(start, stop).select_columns(&keep)?;

        let data_cols: Vec<String> = section.columns()[1..].to_vec();
        let refs: Vec<&str> = data_cols.iter().map(String::as_str).collect();
        section.drop_missing_rows(Some(&refs));
        Ok(section)
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        self.transform_impl(raw)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        check_observation_counts(data, "category", 13)?;
        check_month_totals(data, dec!(0.301))?;

        let appropriation = SumCheck::new(
            "current_year_appropriation",
            &[
                "payroll",
                "employee_benefits",
                "pension",
                "purchases_of_services",
                "materials_equipment",
                "contributions_indemnities",
                "debt_service_short",
                "debt_service_long",
                "interfund_charges",
                "advances_misc_payments",
            ],
            dec!(0.301),
        );
        let disbursements = SumCheck::new(
            "total_disbursements",
            &[
                "current_year_appropriation",
                "prior_year_encumbrances",
                "prior_year_vouchers_payable",
            ],
            dec!(0.301),
        );
        check_group_totals(data, "category", "fiscal_month", "amount", &appropriation)?;
        check_group_totals(data, "category", "fiscal_month", "amount", &disbursements)
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        self.report.output_path(ctx, "cash", Some("spending"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscus_core::frame::CellValue;
    use rust_decimal::Decimal;

    #[test]
    fn test_transform_and_validate_consistent_data() {
        // Ten appropriation lines at 1.0/month, three roll-forward lines,
        // and consistent totals.
        // Cash amounts always print with one decimal place.
        let columns: Vec<String> = (0..=13).map(|i| i.to_string()).collect();
        let mut rows = Vec::new();
        for i in 0..14 {
            let monthly: Decimal = match i {
                10 => rust_decimal_macros::dec!(10.0),
                13 => rust_decimal_macros::dec!(12.0),
                _ => rust_decimal_macros::dec!(1.0),
            };
            let mut row = vec![CellValue::text(format!("Printed {i}"))];
            row.extend((0..12).map(|_| CellValue::text(monthly.to_string())));
            row.push(CellValue::text((monthly * Decimal::from(12)).to_string()));
            rows.push(row);
        }
        let raw = Frame::with_rows(columns, rows).unwrap();

        let report = CashReportSpending {
            report: QcmrReport {
                fiscal_year: 2021,
                quarter: 2,
                path: PathBuf::new(),
            },
        };
        let long = report.transform_impl(raw).unwrap();
        assert_eq!(long.nrows(), 14 * 13);
        report.validate(&long).unwrap();
    }
}
