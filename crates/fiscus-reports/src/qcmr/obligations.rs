//! Departmental obligations summary from the QCMR.
//!
//! Pages carry the obligations table split into side-by-side blocks; rows
//! mix departments with indented line items that must be pruned or
//! relabeled before the citywide totals make sense.

use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fiscus_core::clean::{apply_passes, coerce_to_frame, GridPass};
use fiscus_core::coerce::CoercionMode;
use fiscus_core::depts::DeptResolver;
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::{all_pages_side_by_side, QcmrReport};
use crate::dept_merge::merge_department_info;

/// One labeled value column: (fiscal year, variable, time period).
type PeriodLabel = (i32, &'static str, &'static str);

/// Umbrella departments whose indented line items are dropped; each entry
/// pairs the umbrella row's text with the row prefixes that end its block.
const LINE_ITEM_BLOCKS: [(&str, &[&str]); 4] = [
    ("Public Health", &["Public Property"]),
    ("Human Services", &["Indemnities", "Labor"]),
    ("First Judicial", &["Fleet"]),
    (
        "Streets",
        &["Streets", "Sanitation", "Youth Commission", "TOTAL GENERAL FUND"],
    ),
];

/// The Departmental Obligations Summary Report.
pub struct DepartmentObligations {
    report: QcmrReport,
    validation: Option<Frame>,
}

impl DepartmentObligations {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            report: QcmrReport::resolve(ctx, params, "obligations")?,
            validation: None,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "DepartmentObligations",
            group: ReportGroup::Qcmr,
            params: ParamSpec::FiscalYearQuarter,
            raw_subdir: "qcmr/obligations",
            crop: CropStrategy::OcrTablesAllPages,
            description: "Departmental obligations summary from the QCMR",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    /// Value-column labels in page order; `None` marks a placeholder
    /// column that carries no data. Fourth-quarter files from fiscal 2011
    /// on drop the year-to-date block.
    fn period_labels(fiscal_year: i32, quarter: u32) -> Vec<Option<PeriodLabel>> {
        let mut labels: Vec<Option<PeriodLabel>> =
            vec![Some((fiscal_year - 1, "Actual", "Full Year"))];
        if quarter != 4 || fiscal_year <= 2010 {
            labels.push(Some((fiscal_year, "Target Budget", "YTD")));
            labels.push(Some((fiscal_year, "Actual", "YTD")));
            labels.push(None);
        }
        labels.extend([
            Some((fiscal_year, "Adopted Budget", "Full Year")),
            Some((fiscal_year, "Target Budget", "Full Year")),
            Some((fiscal_year, "Current Projection", "Full Year")),
            None,
            None,
        ]);
        labels
    }

    fn transform_impl(&mut self, depts: &DeptResolver, raw: Frame) -> FiscusResult<Frame> {
        let grid = raw.to_text_grid();
        let cleaned = apply_passes(grid, &[GridPass::DecimalToComma, GridPass::ReplaceCommas]);
        let mut wide = coerce_to_frame(&cleaned, CoercionMode::Coerce)?;

        let labels = Self::period_labels(self.report.fiscal_year, self.report.quarter);
        let expected = labels.len() + 1;
        if wide.ncols() != expected {
            return Err(FiscusError::parse(format!(
                "unexpected number of columns: got {}, expected {expected}",
                wide.ncols()
            )));
        }

        // Zero-fill and keep only labeled columns.
        let data_cols: Vec<String> = wide.columns()[1..].to_vec();
        for col in &data_cols {
            wide.map_column(col, |v| {
                if v.is_missing() {
                    CellValue::Number(Decimal::ZERO)
                } else {
                    v.clone()
                }
            })?;
        }
        let mut keep: Vec<&str> = vec![wide.columns()[0].as_str()];
        let kept_labels: Vec<PeriodLabel> = labels.iter().flatten().copied().collect();
        for (i, label) in labels.iter().enumerate() {
            if label.is_some() {
                keep.push(wide.columns()[i + 1].as_str());
            }
        }
        let mut wide = wide.select_columns(&keep)?;

        trim_label_column(&mut wide)?;
        for (start, stops) in LINE_ITEM_BLOCKS {
            remove_line_items(&mut wide, start, stops)?;
        }
        prefix_employee_benefits(&mut wide)?;
        fix_pension_rows(&mut wide)?;

        // Unpivot into one row per department and period.
        let mut long = Frame::new(
            ["dept_name", "fiscal_year", "variable", "time_period", "total", "as_of_date"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let label_col = wide.columns()[0].clone();
        for (col_idx, (fy, variable, period)) in kept_labels.iter().enumerate() {
            let column = wide.columns()[col_idx + 1].clone();
            for i in 0..wide.nrows() {
                let dept = wide.value(i, &label_col).cloned().unwrap_or(CellValue::Missing);
                let total = wide.value(i, &column).cloned().unwrap_or(CellValue::Missing);
                let as_of = self.report.as_of_date(*fy, period)?;
                long.push_row(vec![
                    dept,
                    CellValue::Number(Decimal::from(*fy)),
                    CellValue::text(*variable),
                    CellValue::text(*period),
                    total,
                    CellValue::text(as_of.to_string()),
                ])?;
            }
        }

        // The General Fund total is the validation baseline, not data.
        let dept_idx = long.col_index("dept_name").unwrap();
        let mut baseline = long.clone();
        baseline.retain_rows(|r| {
            r[dept_idx]
                .as_text()
                .is_some_and(|t| t.to_lowercase().contains("general fund"))
        });
        long.retain_rows(|r| {
            !r[dept_idx]
                .as_text()
                .is_some_and(|t| t.to_lowercase().contains("general fund"))
        });
        self.validation = Some(baseline);

        merge_department_info(depts, long, "dept_name")
    }
}

/// Strip whitespace around the printed department names.
fn trim_label_column(frame: &mut Frame) -> FiscusResult<()> {
    let label_col = frame.columns()[0].clone();
    frame.map_column(&label_col, |v| match v.as_text() {
        Some(t) => CellValue::text(t.trim()),
        None => v.clone(),
    })
}

/// Drop the indented line items under an umbrella department: everything
/// after the first row containing `start` until a row starting with one of
/// `stops`.
fn remove_line_items(frame: &mut Frame, start: &str, stops: &[&str]) -> FiscusResult<()> {
    let label_idx = 0;
    let begin = frame
        .rows()
        .position(|r| r[label_idx].as_text().is_some_and(|t| t.contains(start)))
        .ok_or_else(|| {
            FiscusError::parse(format!("department block '{start}' not found"))
        })?;

    let mut remove = Vec::new();
    for i in begin + 1..frame.nrows() {
        let text = frame.row(i).unwrap()[label_idx].render();
        if stops.iter().any(|stop| text.starts_with(stop)) {
            break;
        }
        remove.push(i);
    }
    let mut index = 0;
    frame.retain_rows(|_| {
        let keep = !remove.contains(&index);
        index += 1;
        keep
    });
    Ok(())
}

/// Rows between the Employee Benefits umbrella and the next department get
/// the umbrella prefix so their labels stay unambiguous.
fn prefix_employee_benefits(frame: &mut Frame) -> FiscusResult<()> {
    let label_col = frame.columns()[0].clone();
    let begin = frame.find_single(&label_col, "the Employee Benefits row", |v| {
        v.as_text().is_some_and(|t| t.contains("Employee Benefits"))
    })?;
    for i in begin + 1..frame.nrows() {
        let text = frame.row(i).unwrap()[0].render();
        if text.starts_with("Finance") || text.starts_with("Fire") {
            break;
        }
        frame.set_value(
            i,
            &label_col,
            CellValue::text(format!("Employee Benefits: {text}")),
        )?;
    }
    Ok(())
}

/// Pension prints as several rows in some years; merge them into a single
/// `Employee Benefits: Pension` row (pension obligation bonds stay apart).
fn fix_pension_rows(frame: &mut Frame) -> FiscusResult<()> {
    let label_col = frame.columns()[0].clone();
    let pension_rows: Vec<usize> = frame
        .rows()
        .enumerate()
        .filter(|(_, r)| {
            r[0].as_text()
                .is_some_and(|t| t.contains("Pension") && !t.contains("Bond"))
        })
        .map(|(i, _)| i)
        .collect();

    for &i in &pension_rows {
        frame.set_value(i, &label_col, CellValue::text("Employee Benefits: Pension"))?;
    }
    if pension_rows.len() > 1 {
        let data_cols: Vec<String> = frame.columns()[1..].to_vec();
        for col in &data_cols {
            let total: Decimal = pension_rows
                .iter()
                .filter_map(|&i| frame.value(i, col).and_then(CellValue::as_number))
                .sum();
            frame.set_value(pension_rows[0], col, CellValue::Number(total))?;
        }
        let keep_first = pension_rows[0];
        let mut index = 0;
        frame.retain_rows(|_| {
            let keep = index == keep_first || !pension_rows.contains(&index);
            index += 1;
            keep
        });
    }
    Ok(())
}

impl EtlPipeline for DepartmentObligations {
    fn name(&self) -> &str {
        "DepartmentObligations"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let mut frame = all_pages_side_by_side(ctx, &self.report, true)?;
        frame.drop_missing_rows(None);
        Ok(frame)
    }

    fn transform(&mut self, ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        self.transform_impl(ctx.depts(), raw)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        let baseline = self
            .validation
            .as_ref()
            .ok_or_else(|| FiscusError::validation("transform must run before validation"))?;

        let raw_idx = data
            .col_index("dept_name_raw")
            .ok_or_else(|| FiscusError::schema("missing 'dept_name_raw' column"))?;

        for key in period_keys(data)? {
            let citywide = data.sum_where("total", |f, i| {
                let row = f.row(i).unwrap();
                !row[raw_idx]
                    .render()
                    .starts_with("Employee Benefits: ")
                    && row_matches_key(f, i, &key)
            });
            let total = baseline.sum_where("total", |f, i| row_matches_key(f, i, &key));
            let diff = (citywide - total).abs();
            if diff > dec!(3) {
                return Err(FiscusError::validation(format!(
                    "departments sum to {citywide} but the General Fund total is {total} for \
                     {} {} {} (diff {diff} > 3)",
                    key.0, key.1, key.2
                )));
            }
        }
        Ok(())
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        self.report.output_path(ctx, "obligations", None)
    }
}

type PeriodKey = (String, String, String);

fn period_keys(frame: &Frame) -> FiscusResult<Vec<PeriodKey>> {
    let fy_idx = frame
        .col_index("fiscal_year")
        .ok_or_else(|| FiscusError::schema("missing 'fiscal_year' column"))?;
    let var_idx = frame
        .col_index("variable")
        .ok_or_else(|| FiscusError::schema("missing 'variable' column"))?;
    let period_idx = frame
        .col_index("time_period")
        .ok_or_else(|| FiscusError::schema("missing 'time_period' column"))?;

    let mut keys = Vec::new();
    for row in frame.rows() {
        let key = (
            row[fy_idx].render(),
            row[var_idx].render(),
            row[period_idx].render(),
        );
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

fn row_matches_key(frame: &Frame, i: usize, key: &PeriodKey) -> bool {
    let fy_idx = frame.col_index("fiscal_year").unwrap();
    let var_idx = frame.col_index("variable").unwrap();
    let period_idx = frame.col_index("time_period").unwrap();
    let row = frame.row(i).unwrap();
    row[fy_idx].render() == key.0
        && row[var_idx].render() == key.1
        && row[period_idx].render() == key.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_labels_shapes() {
        let labels = DepartmentObligations::period_labels(2021, 2);
        assert_eq!(labels.len(), 9);
        assert_eq!(labels.iter().flatten().count(), 6);
        assert_eq!(labels[0], Some((2020, "Actual", "Full Year")));

        let q4 = DepartmentObligations::period_labels(2021, 4);
        assert_eq!(q4.len(), 6);
        assert_eq!(q4.iter().flatten().count(), 4);

        // Early fourth-quarter files keep the YTD block.
        let early_q4 = DepartmentObligations::period_labels(2009, 4);
        assert_eq!(early_q4.len(), 9);
    }

    fn wide(names: &[&str]) -> Frame {
        Frame::with_rows(
            vec!["0".into(), "1".into()],
            names
                .iter()
                .map(|n| vec![CellValue::text(*n), CellValue::Number(Decimal::ONE)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_remove_line_items() {
        let mut frame = wide(&[
            "Public Health",
            "Ambulatory Health Services",
            "Medical Examiner",
            "Public Property",
            "Police",
        ]);
        remove_line_items(&mut frame, "Public Health", &["Public Property"]).unwrap();
        let names: Vec<String> = frame.rows().map(|r| r[0].render()).collect();
        assert_eq!(names, vec!["Public Health", "Public Property", "Police"]);
    }

    #[test]
    fn test_prefix_employee_benefits() {
        let mut frame = wide(&["Employee Benefits", "FICA", "Group Life", "Fire"]);
        prefix_employee_benefits(&mut frame).unwrap();
        let names: Vec<String> = frame.rows().map(|r| r[0].render()).collect();
        assert_eq!(
            names,
            vec![
                "Employee Benefits",
                "Employee Benefits: FICA",
                "Employee Benefits: Group Life",
                "Fire"
            ]
        );
    }

    #[test]
    fn test_fix_pension_rows_merges() {
        let mut frame = Frame::with_rows(
            vec!["0".into(), "1".into()],
            vec![
                vec![CellValue::text("Pension"), dec!(10).into()],
                vec![CellValue::text("Pension - Sinking Fund"), dec!(5).into()],
                vec![
                    CellValue::text("Pension Obligation Bond"),
                    dec!(7).into(),
                ],
            ],
        )
        .unwrap();
        fix_pension_rows(&mut frame).unwrap();
        assert_eq!(frame.nrows(), 2);
        assert_eq!(
            frame.value(0, "0").unwrap().as_text(),
            Some("Employee Benefits: Pension")
        );
        assert_eq!(frame.value(0, "1").unwrap().as_number(), Some(dec!(15)));
        assert_eq!(
            frame.value(1, "0").unwrap().as_text(),
            Some("Pension Obligation Bond")
        );
    }

}
