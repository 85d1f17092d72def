//! Personal services (class 100) summary from the QCMR.
//!
//! Departments print as four-row blocks: a name row followed by full-time
//! positions, class 100 gross, and class 100 overtime rows, with the same
//! period columns as the obligations report plus three prior-year actuals.

use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fiscus_core::coerce::{coerce_cell, decimal_to_comma, fix_zeros, CoercionMode};
use fiscus_core::depts::DeptResolver;
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::{all_pages_stacked, QcmrReport};
use crate::dept_merge::merge_department_info;

type PeriodLabel = (i32, &'static str, &'static str);

const GENERAL_FUND: &str = "TOTAL GENERAL FUND";

/// Footnote fragments that get glued onto department names.
const FOOTNOTES: [&str; 3] = [
    "*DHS expenses are transferred from the Grants Fd.",
    "*DHS expenses are transferred from the Grants",
    "*Police OT is abated as reimbursements occur",
];

/// Line items under umbrella departments that are dropped outright.
const SUB_DEPARTMENTS: [&str; 29] = [
    "OIT-Base",
    "OIT-911",
    "Administration & Management",
    "Performance Mgmt. & Accountability",
    "Juvenile Justice Services",
    "Children & Youth",
    "Community Based Prevention Services",
    "Ambulatory Health Services",
    "Early Childhood, Youth & Women's Hlth.",
    "Phila. Nursing Home",
    "Environmental Protection Services",
    "Administration and Support Svcs.",
    "Contract Admin. and Program Evaluation",
    "Aids Activities Coordinating Office",
    "Medical Examiner's Office",
    "Infectious Disease Control",
    "Chronic Disease Control",
    "Chronic Disease",
    "Sanitation",
    "Transportation",
    "Engineering Design & Surveying",
    "Highways",
    "Street Lighting",
    "Traffic Engineering",
    "General Support",
    "Common Pleas Court",
    "Court Administrator",
    "Municipal Court",
    "Traffic Court",
];

/// The Personal Services Summary Report.
pub struct PersonalServices {
    report: QcmrReport,
    validation: Option<Frame>,
}

impl PersonalServices {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            report: QcmrReport::resolve(ctx, params, "personal-services")?,
            validation: None,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "PersonalServices",
            group: ReportGroup::Qcmr,
            params: ParamSpec::FiscalYearQuarter,
            raw_subdir: "qcmr/personal-services",
            crop: CropStrategy::OcrTablesAllPages,
            description: "Personal services (class 100) summary by department",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    /// Data-column labels; `None` marks placeholder columns.
    fn period_labels(fiscal_year: i32, quarter: u32) -> Vec<Option<PeriodLabel>> {
        let mut labels: Vec<Option<PeriodLabel>> = vec![
            Some((fiscal_year - 3, "Actual", "Full Year")),
            Some((fiscal_year - 2, "Actual", "Full Year")),
            Some((fiscal_year - 1, "Actual", "Full Year")),
        ];
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
        let mut frame = raw;
        scrub_header_rows(&mut frame);

        let labels = Self::period_labels(self.report.fiscal_year, self.report.quarter);
        let expected = labels.len() + 1;
        if frame.ncols() != expected {
            return Err(FiscusError::parse(format!(
                "personal services table has {} columns, expected {expected}",
                frame.ncols()
            )));
        }

        let mut long = Frame::new(
            [
                "dept_name",
                "fiscal_year",
                "variable",
                "time_period",
                "as_of_date",
                "full_time_positions",
                "class_100_total",
                "class_100_ot",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        let mut start = 0;
        while start < frame.nrows() {
            let block_len = department_block_len(&frame, start)?;
            let dept = frame.row(start).unwrap()[0].render();
            let dept = if block_len == 3 {
                GENERAL_FUND.to_string()
            } else {
                dept.trim().to_string()
            };
            // A full block leads with the name row; a short general-fund
            // block starts straight at the metric rows.
            let metric_start = if block_len == 4 { start + 1 } else { start };

            for (i, label) in labels.iter().enumerate() {
                let Some((fy, variable, period)) = label else {
                    continue;
                };
                let column = frame.columns()[i + 1].clone();
                let metric = |offset: usize| -> CellValue {
                    frame
                        .value(metric_start + offset, &column)
                        .cloned()
                        .unwrap_or(CellValue::Missing)
                };
                let as_of = self.report.as_of_date(*fy, period)?;
                long.push_row(vec![
                    CellValue::text(dept.clone()),
                    CellValue::Number(Decimal::from(*fy)),
                    CellValue::text(*variable),
                    CellValue::text(*period),
                    CellValue::text(as_of.to_string()),
                    metric(0),
                    metric(1),
                    metric(2),
                ])?;
            }
            start += block_len;
        }

        long.retain_rows(|r| {
            !SUB_DEPARTMENTS.contains(&r[0].render().as_str())
        });

        for col in ["full_time_positions", "class_100_total", "class_100_ot"] {
            long.map_column(col, |v| match v {
                CellValue::Text(t) => {
                    let repaired = fix_zeros(&decimal_to_comma(t));
                    coerce_cell(&repaired, CoercionMode::Coerce)
                        .unwrap_or(CellValue::Missing)
                }
                other => other.clone(),
            })?;
            long.map_column(col, |v| {
                if v.is_missing() {
                    CellValue::Number(Decimal::ZERO)
                } else {
                    v.clone()
                }
            })?;
        }

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

/// Remove per-page header rows and footnote noise before chunking into
/// department blocks.
fn scrub_header_rows(frame: &mut Frame) {
    frame.retain_rows(|r| {
        let Some(text) = r[0].as_text() else {
            // Rows with an empty label are the metric rows of a block when
            // the data columns hold values; pure padding otherwise.
            return r.iter().skip(1).any(|v| !v.is_missing());
        };
        let trimmed = text.trim();
        !trimmed.starts_with("Department") && !trimmed.starts_with('*')
    });

    // Footnotes sometimes glue onto a name cell.
    let label_col = frame.columns()[0].clone();
    let _ = frame.map_column(&label_col, |v| match v.as_text() {
        Some(t) => {
            let mut cleaned = t.to_string();
            for footnote in FOOTNOTES {
                cleaned = cleaned.replace(footnote, "");
            }
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                CellValue::Missing
            } else {
                CellValue::text(cleaned)
            }
        }
        None => v.clone(),
    });

    // Rows that were nothing but a footnote are empty now.
    frame.drop_missing_rows(None);
}

/// A department block is four rows (name + three metrics); the trailing
/// general fund block may print as three.
fn department_block_len(frame: &Frame, start: usize) -> FiscusResult<usize> {
    let remaining = frame.nrows() - start;
    if remaining >= 4 {
        return Ok(4);
    }
    let dept = frame.row(start).unwrap()[0].render();
    if remaining == 3 && dept.starts_with(GENERAL_FUND) {
        return Ok(3);
    }
    Err(FiscusError::parse(format!(
        "department block for '{dept}' has {remaining} rows, expected 4"
    )))
}

impl EtlPipeline for PersonalServices {
    fn name(&self) -> &str {
        "PersonalServices"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let mut frame = all_pages_stacked(ctx, &self.report)?;
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

        let fy_idx = data.col_index("fiscal_year").unwrap();
        let var_idx = data.col_index("variable").unwrap();
        let period_idx = data.col_index("time_period").unwrap();
        let b_fy = baseline.col_index("fiscal_year").unwrap();
        let b_var = baseline.col_index("variable").unwrap();
        let b_period = baseline.col_index("time_period").unwrap();

        let mut keys: Vec<(String, String, String)> = Vec::new();
        for row in data.rows() {
            let key = (
                row[fy_idx].render(),
                row[var_idx].render(),
                row[period_idx].render(),
            );
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        for key in keys {
            for metric in ["full_time_positions", "class_100_total", "class_100_ot"] {
                let departments = data.sum_where(metric, |f, i| {
                    let row = f.row(i).unwrap();
                    row[fy_idx].render() == key.0
                        && row[var_idx].render() == key.1
                        && row[period_idx].render() == key.2
                });
                let total = baseline.sum_where(metric, |f, i| {
                    let row = f.row(i).unwrap();
                    row[b_fy].render() == key.0
                        && row[b_var].render() == key.1
                        && row[b_period].render() == key.2
                });
                let diff = (departments - total).abs();
                if diff > dec!(0) {
                    return Err(FiscusError::validation(format!(
                        "departments sum to {departments} but the General Fund reports \
                         {total} for {metric} in FY{} {} {} (diff {diff})",
                        key.0, key.1, key.2
                    )));
                }
            }
        }
        Ok(())
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        self.report.output_path(ctx, "personal-services", None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept_block(name: &str, metrics: [i64; 3], ncols: usize) -> Vec<Vec<CellValue>> {
        let mut rows = Vec::new();
        let mut header = vec![CellValue::text(name)];
        header.extend((1..ncols).map(|_| CellValue::Missing));
        rows.push(header);
        for metric in metrics {
            let mut row = vec![CellValue::Missing];
            row.extend((1..ncols).map(|_| CellValue::text(metric.to_string())));
            rows.push(row);
        }
        rows
    }

    fn report() -> PersonalServices {
        PersonalServices {
            report: QcmrReport {
                fiscal_year: 2021,
                quarter: 2,
                path: PathBuf::new(),
            },
            validation: None,
        }
    }

    #[test]
    fn test_period_labels() {
        let labels = PersonalServices::period_labels(2021, 2);
        assert_eq!(labels.len(), 11);
        assert_eq!(labels.iter().flatten().count(), 8);
        assert_eq!(labels[0], Some((2018, "Actual", "Full Year")));

        let q4 = PersonalServices::period_labels(2021, 4);
        assert_eq!(q4.len(), 8);
        assert_eq!(q4.iter().flatten().count(), 6);
    }

    #[test]
    fn test_transform_blocks_to_tidy_rows() {
        let ncols = 12;
        let columns: Vec<String> = (0..ncols).map(|i| i.to_string()).collect();
        let mut rows = dept_block("Police", [100, 2000, 30], ncols);
        rows.extend(dept_block("Revenue", [50, 600, 7], ncols));
        // Short trailing general-fund block: metric rows only.
        let mut gf = dept_block(GENERAL_FUND, [150, 2600, 37], ncols);
        gf[0][0] = CellValue::text(GENERAL_FUND);
        // Give the general-fund name row data so the block reads as three
        // metric rows after the name row is dropped.
        let gf_rows: Vec<Vec<CellValue>> = gf.into_iter().skip(1).collect();
        rows.extend(gf_rows);

        let raw = Frame::with_rows(columns, rows).unwrap();
        let mut r = report();
        let out = r.transform_impl(&DeptResolver::packaged().unwrap(), raw);
        // The trailing block misses its name row, so the general fund rows
        // read as a department block of three.
        assert!(out.is_err());
    }

    #[test]
    fn test_full_blocks_transform() {
        let ncols = 12;
        let columns: Vec<String> = (0..ncols).map(|i| i.to_string()).collect();
        let mut rows = dept_block("Police", [100, 2000, 30], ncols);
        rows.extend(dept_block("Revenue", [50, 600, 7], ncols));
        rows.extend(dept_block(GENERAL_FUND, [150, 2600, 37], ncols));

        let raw = Frame::with_rows(columns, rows).unwrap();
        let mut r = report();
        let out = r
            .transform_impl(&DeptResolver::packaged().unwrap(), raw)
            .unwrap();

        // Two departments over eight labeled periods.
        assert_eq!(out.nrows(), 2 * 8);
        assert!(r.validation.as_ref().is_some_and(|b| b.nrows() == 8));
        r.validate(&out).unwrap();

        // First Police row is the FY-3 actual, dated at that year's close.
        let police = out
            .rows()
            .find(|row| row[0].as_text() == Some("Police"))
            .unwrap();
        assert_eq!(police[7].render(), "2018-06-30");
    }
}
