//! The QCMR cash flow forecast: four sub-reports parsed from the same
//! two-page table.
//!
//! Cash values print in thousands with one decimal place; the shared
//! transform repairs European decimal commas and lost decimal points,
//! coerces, zero-fills, and melts to `(category, fiscal_month, amount)`.

mod fund_balances;
mod net_cash_flow;
mod revenue;
mod spending;

pub use fund_balances::CashReportFundBalances;
pub use net_cash_flow::CashReportNetCashFlow;
pub use revenue::CashReportRevenue;
pub use spending::CashReportSpending;

use rust_decimal::Decimal;

use fiscus_core::clean::{apply_passes, coerce_to_frame, GridPass};
use fiscus_core::coerce::CoercionMode;
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};

use super::QcmrReport;

/// Shared tail of every cash sub-report transform: string repairs, numeric
/// coercion, zero fill, and the melt to long form. Column positions after
/// the category column become fiscal month numbers.
pub(crate) fn cash_melt(frame: &Frame) -> FiscusResult<Frame> {
    let grid = frame.to_text_grid();
    let cleaned = apply_passes(grid, &[GridPass::ReplaceCommas, GridPass::FixDecimals]);
    let mut frame = coerce_to_frame(&cleaned, CoercionMode::Coerce)?;

    let data_cols: Vec<String> = frame.columns()[1..].to_vec();
    for col in &data_cols {
        frame.map_column(col, |v| {
            if v.is_missing() {
                CellValue::Number(Decimal::ZERO)
            } else {
                v.clone()
            }
        })?;
    }

    let label_col = frame.columns()[0].clone();
    frame.rename_column(&label_col, "category")?;
    let mut long = frame.melt(&["category"], "fiscal_month", "amount")?;
    long.map_column("fiscal_month", |v| {
        match v.as_text().and_then(|t| t.parse::<i64>().ok()) {
            Some(n) => CellValue::Number(Decimal::from(n)),
            None => v.clone(),
        }
    })?;
    Ok(long)
}

/// Overwrite the category column with the canonical vocabulary after a
/// row-count check; a mismatch means the crop picked up the wrong rows.
pub(crate) fn set_categories(
    frame: &mut Frame,
    categories: &[&str],
    what: &str,
    report: &QcmrReport,
) -> FiscusResult<()> {
    if frame.nrows() != categories.len() {
        return Err(FiscusError::parse(format!(
            "parsing error for {what} data in {} cash report: {} rows, expected {}",
            report.tag(),
            frame.nrows(),
            categories.len()
        )));
    }
    let label_col = frame.columns()[0].clone();
    for (i, category) in categories.iter().enumerate() {
        frame.set_value(i, &label_col, CellValue::text(*category))?;
    }
    Ok(())
}

/// Every melted category must be in the closed vocabulary.
pub(crate) fn check_category_vocab(frame: &Frame, allowed: &[&str]) -> FiscusResult<()> {
    let idx = frame
        .col_index("category")
        .ok_or_else(|| FiscusError::schema("missing 'category' column"))?;
    for row in frame.rows() {
        let category = row[idx].render();
        if !allowed.contains(&category.as_str()) {
            return Err(FiscusError::schema(format!(
                "category '{category}' is not in the report vocabulary"
            )));
        }
    }
    Ok(())
}

/// Check that the twelve month amounts of each category sum to the parsed
/// month-13 total within tolerance.
pub(crate) fn check_month_totals(frame: &Frame, tolerance: Decimal) -> FiscusResult<()> {
    let cat_idx = frame
        .col_index("category")
        .ok_or_else(|| FiscusError::schema("missing 'category' column"))?;
    let month_idx = frame
        .col_index("fiscal_month")
        .ok_or_else(|| FiscusError::schema("missing 'fiscal_month' column"))?;

    for category in frame.distinct("category") {
        let months = frame.sum_where("amount", |f, i| {
            let row = f.row(i).unwrap();
            row[cat_idx].render() == category
                && row[month_idx].as_number() != Some(Decimal::from(13))
        });
        let total = frame.sum_where("amount", |f, i| {
            let row = f.row(i).unwrap();
            row[cat_idx].render() == category
                && row[month_idx].as_number() == Some(Decimal::from(13))
        });
        let diff = (months - total).abs();
        if diff > tolerance {
            return Err(FiscusError::validation(format!(
                "months of '{category}' sum to {months} but the total column has {total} \
                 (diff {diff} > {tolerance})"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wide() -> Frame {
        Frame::with_rows(
            vec!["0".into(), "1".into(), "2".into()],
            vec![
                vec![
                    CellValue::text("real_estate_tax"),
                    CellValue::text("10,5"),
                    CellValue::Missing,
                ],
                vec![
                    CellValue::text("sales_tax"),
                    CellValue::text("2005"),
                    CellValue::text("1.5"),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cash_melt_repairs_and_melts() {
        let long = cash_melt(&wide()).unwrap();
        assert_eq!(long.columns(), &["category", "fiscal_month", "amount"]);
        assert_eq!(long.nrows(), 4);

        // "10,5" is a mis-read decimal comma, "2005" a lost decimal point.
        let by_key = |cat: &str, month: i64| {
            long.rows()
                .find(|r| {
                    r[0].as_text() == Some(cat)
                        && r[1].as_number() == Some(Decimal::from(month))
                })
                .map(|r| r[2].clone())
                .unwrap()
        };
        assert_eq!(by_key("real_estate_tax", 1).as_number(), Some(dec!(10.5)));
        assert_eq!(by_key("sales_tax", 1).as_number(), Some(dec!(200.5)));
        // Missing cells zero-fill.
        assert_eq!(by_key("real_estate_tax", 2).as_number(), Some(dec!(0)));
        assert_eq!(by_key("sales_tax", 2).as_number(), Some(dec!(1.5)));
    }

    #[test]
    fn test_set_categories_checks_length() {
        let report = QcmrReport {
            fiscal_year: 2021,
            quarter: 2,
            path: std::path::PathBuf::new(),
        };
        let mut frame = wide();
        set_categories(&mut frame, &["a", "b"], "revenue", &report).unwrap();
        assert_eq!(frame.value(0, "0").unwrap().as_text(), Some("a"));

        let mut frame = wide();
        let err = set_categories(&mut frame, &["a"], "revenue", &report).unwrap_err();
        assert!(err.to_string().contains("FY21 Q2"), "{err}");
    }

    #[test]
    fn test_check_month_totals() {
        let mut rows = Vec::new();
        for month in 1..=12i64 {
            rows.push(vec![
                CellValue::text("payroll"),
                CellValue::Number(Decimal::from(month)),
                dec!(10).into(),
            ]);
        }
        rows.push(vec![
            CellValue::text("payroll"),
            CellValue::Number(Decimal::from(13)),
            dec!(120).into(),
        ]);
        let frame = Frame::with_rows(
            vec!["category".into(), "fiscal_month".into(), "amount".into()],
            rows,
        )
        .unwrap();
        check_month_totals(&frame, dec!(0.301)).unwrap();

        let mut broken = frame.clone();
        broken.set_value(12, "amount", dec!(121).into()).unwrap();
        assert!(check_month_totals(&broken, dec!(0.301)).is_err());
    }

    #[test]
    fn test_check_category_vocab() {
        let long = cash_melt(&wide()).unwrap();
        check_category_vocab(&long, &["real_estate_tax", "sales_tax"]).unwrap();
        assert!(check_category_vocab(&long, &["real_estate_tax"]).is_err());
    }
}
