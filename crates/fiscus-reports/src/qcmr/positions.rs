//! Full-time positions report from the QCMR.
//!
//! Three column blocks (prior-year actual, adopted budget, current
//! year-to-date) each split positions by fund. Uniformed departments print
//! two extra rows separating civilian and uniformed counts.

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

/// Departments that split civilian and uniformed counts.
const UNIFORMED: [&str; 3] = ["Police", "Fire", "District Attorney"];

const FUNDS: [&str; 3] = ["General", "Other", "Total"];

/// One column block: starting data column and its reporting period.
struct ColumnBlock {
    first_col: usize,
    fiscal_year_offset: i32,
    variable: &'static str,
    time_period: &'static str,
    dated: bool,
}

/// The Full-Time Positions Report.
pub struct FullTimePositions {
    report: QcmrReport,
    validation: Option<Frame>,
}

impl FullTimePositions {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            report: QcmrReport::resolve(ctx, params, "positions")?,
            validation: None,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "FullTimePositions",
            group: ReportGroup::Qcmr,
            params: ParamSpec::FiscalYearQuarter,
            raw_subdir: "qcmr/positions",
            crop: CropStrategy::OcrTablesAllPages,
            description: "Full-time civilian and uniformed positions by department",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    fn blocks() -> [ColumnBlock; 3] {
        [
            ColumnBlock {
                first_col: 7,
                fiscal_year_offset: 0,
                variable: "Actual",
                time_period: "YTD",
                dated: true,
            },
            ColumnBlock {
                first_col: 1,
                fiscal_year_offset: -1,
                variable: "Actual",
                time_period: "Full Year",
                dated: true,
            },
            ColumnBlock {
                first_col: 4,
                fiscal_year_offset: 0,
                variable: "Adopted Budget",
                time_period: "Full Year",
                dated: false,
            },
        ]
    }

    fn transform_impl(&mut self, depts: &DeptResolver, raw: Frame) -> FiscusResult<Frame> {
        if raw.ncols() != 10 && raw.ncols() != 11 {
            return Err(FiscusError::parse(format!(
                "positions table has {} columns, expected 10 or 11",
                raw.ncols()
            )));
        }

        let mut long = Frame::new(
            [
                "dept_name",
                "fund",
                "fiscal_year",
                "variable",
                "time_period",
                "as_of_date",
                "civilian",
                "uniformed",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        for block in Self::blocks() {
            let fiscal_year = self.report.fiscal_year + block.fiscal_year_offset;
            let as_of = if block.dated {
                CellValue::text(
                    self.report
                        .as_of_date(fiscal_year, block.time_period)?
                        .to_string(),
                )
            } else {
                CellValue::Missing
            };
            tidy_block(&raw, &block, |dept, fund, civilian, uniformed| {
                long.push_row(vec![
                    CellValue::text(dept),
                    CellValue::text(fund),
                    CellValue::Number(Decimal::from(fiscal_year)),
                    CellValue::text(block.variable),
                    CellValue::text(block.time_period),
                    as_of.clone(),
                    civilian,
                    uniformed,
                ])
            })?;
        }

        // Position counts print with OCR letter-O and decimal-point noise.
        for col in ["civilian", "uniformed"] {
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

        let civ_idx = long.col_index("civilian").unwrap();
        let uni_idx = long.col_index("uniformed").unwrap();
        let totals: Vec<CellValue> = long
            .rows()
            .map(|r| {
                let civilian = r[civ_idx].as_number().unwrap_or(Decimal::ZERO);
                let uniformed = r[uni_idx].as_number().unwrap_or(Decimal::ZERO);
                CellValue::Number(civilian + uniformed)
            })
            .collect();
        long.push_column("total", totals)?;

        // The all-funds line is the validation baseline.
        let dept_idx = long.col_index("dept_name").unwrap();
        let mut baseline = long.clone();
        baseline.retain_rows(|r| {
            r[dept_idx]
                .as_text()
                .is_some_and(|t| t.to_lowercase().contains("all funds"))
        });
        long.retain_rows(|r| {
            !r[dept_idx]
                .as_text()
                .is_some_and(|t| t.to_lowercase().contains("all funds"))
        });
        self.validation = Some(baseline);

        merge_department_info(depts, long, "dept_name")
    }
}

/// Walk the wide rows for one column block, emitting (dept, fund,
/// civilian, uniformed) tuples. Uniformed departments contribute their two
/// detail rows; everyone else is all civilian.
fn tidy_block(
    raw: &Frame,
    block: &ColumnBlock,
    mut emit: impl FnMut(&str, &str, CellValue, CellValue) -> FiscusResult<()>,
) -> FiscusResult<()> {
    let mut i = 0;
    while i < raw.nrows() {
        let row = raw.row(i).unwrap();
        let dept = row[0].render();
        if dept.is_empty() {
            i += 1;
            continue;
        }

        if let Some(tag) = UNIFORMED.iter().find(|t| dept.starts_with(**t)) {
            if i + 2 >= raw.nrows() {
                return Err(FiscusError::parse(format!(
                    "uniformed department '{tag}' is missing its detail rows"
                )));
            }
            let civilian_row = raw.row(i + 1).unwrap();
            let uniformed_row = raw.row(i + 2).unwrap();
            for (offset, fund) in FUNDS.iter().enumerate() {
                let col = block.first_col + offset;
                emit(
                    tag,
                    fund,
                    civilian_row.get(col).cloned().unwrap_or(CellValue::Missing),
                    uniformed_row.get(col).cloned().unwrap_or(CellValue::Missing),
                )?;
            }
            i += 3;
        } else {
            for (offset, fund) in FUNDS.iter().enumerate() {
                let col = block.first_col + offset;
                emit(
                    &dept,
                    fund,
                    row.get(col).cloned().unwrap_or(CellValue::Missing),
                    CellValue::Number(Decimal::ZERO),
                )?;
            }
            i += 1;
        }
    }
    Ok(())
}

impl EtlPipeline for FullTimePositions {
    fn name(&self) -> &str {
        "FullTimePositions"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let frame = all_pages_stacked(ctx, &self.report)?;
        let mut out = frame;

        // Each page repeats a "Department" header row; drop everything up
        // to and including it, page by page, by filtering the label.
        out.retain_rows(|r| {
            r[0].as_text()
                .map_or(true, |t| !t.trim().starts_with("Department"))
        });
        out.drop_missing_rows(None);
        Ok(out)
    }

    fn transform(&mut self, ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        self.transform_impl(ctx.depts(), raw)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        let baseline = self
            .validation
            .as_ref()
            .ok_or_else(|| FiscusError::validation("transform must run before validation"))?;

        let fund_idx = data
            .col_index("fund")
            .ok_or_else(|| FiscusError::schema("missing 'fund' column"))?;
        let fy_idx = data
            .col_index("fiscal_year")
            .ok_or_else(|| FiscusError::schema("missing 'fiscal_year' column"))?;
        let var_idx = data
            .col_index("variable")
            .ok_or_else(|| FiscusError::schema("missing 'variable' column"))?;

        let b_fund = baseline.col_index("fund").unwrap();
        let b_fy = baseline.col_index("fiscal_year").unwrap();
        let b_var = baseline.col_index("variable").unwrap();

        let mut keys: Vec<(String, String, String)> = Vec::new();
        for row in data.rows() {
            let key = (
                row[fund_idx].render(),
                row[fy_idx].render(),
                row[var_idx].render(),
            );
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        for key in keys {
            let matches =
                |f: &Frame, i: usize, fund: usize, fy: usize, var: usize| -> bool {
                    let row = f.row(i).unwrap();
                    row[fund].render() == key.0
                        && row[fy].render() == key.1
                        && row[var].render() == key.2
                };
            let departments = data.sum_where("civilian", |f, i| {
                matches(f, i, fund_idx, fy_idx, var_idx)
            }) + data.sum_where("uniformed", |f, i| {
                matches(f, i, fund_idx, fy_idx, var_idx)
            });
            // The all-funds line prints its grand total in the civilian
            // column.
            let total = baseline.sum_where("civilian", |f, i| matches(f, i, b_fund, b_fy, b_var));
            let diff = (departments - total).abs();
            if diff > dec!(0) {
                return Err(FiscusError::validation(format!(
                    "departments sum to {departments} but All Funds reports {total} for \
                     fund {} FY{} {} (diff {diff})",
                    key.0, key.1, key.2
                )));
            }
        }
        Ok(())
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        self.report.output_path(ctx, "positions", None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> Frame {
        // Eleven columns: dept + 3 blocks of General/Other/Total + spare.
        let columns: Vec<String> = (0..11).map(|i| i.to_string()).collect();
        let dept_row = |name: &str, base: i64| {
            let mut row = vec![CellValue::text(name)];
            for block in 0..3 {
                for fund in 0..3i64 {
                    row.push(CellValue::text((base + block + fund).to_string()));
                }
            }
            row.push(CellValue::Missing);
            row
        };
        let blank_after = |name: &str| {
            let mut row = vec![CellValue::text(name)];
            row.extend((0..10).map(|_| CellValue::Missing));
            row
        };
        let mut rows = vec![dept_row("Revenue", 10)];
        rows.push(blank_after("Police"));
        rows.push(dept_row("", 20)); // civilian detail
        rows.push(dept_row("", 30)); // uniformed detail
        rows.push(dept_row("All Funds", 1000));
        // Detail rows carry an empty department label; rebuild them with
        // text in column 0 cleared.
        Frame::with_rows(columns, rows).unwrap()
    }

    #[test]
    fn test_tidy_block_uniformed_split() {
        let frame = raw();
        let block = ColumnBlock {
            first_col: 1,
            fiscal_year_offset: 0,
            variable: "Actual",
            time_period: "YTD",
            dated: false,
        };
        let mut seen = Vec::new();
        tidy_block(&frame, &block, |dept, fund, civ, uni| {
            seen.push((dept.to_string(), fund.to_string(), civ, uni));
            Ok(())
        })
        .unwrap();

        // Revenue, Police (split), All Funds, each over three funds.
        assert_eq!(seen.len(), 9);
        let police_general = seen
            .iter()
            .find(|(d, f, _, _)| d == "Police" && f == "General")
            .unwrap();
        assert_eq!(police_general.2.render(), "20");
        assert_eq!(police_general.3.render(), "30");
        let revenue_total = seen
            .iter()
            .find(|(d, f, _, _)| d == "Revenue" && f == "Total")
            .unwrap();
        assert_eq!(revenue_total.2.render(), "12");
        assert_eq!(revenue_total.3.render(), "0");
    }
}
