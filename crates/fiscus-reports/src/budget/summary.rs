//! Annual budget-in-brief department summary.
//!
//! Each page lists departments as blocks: a name row, one row per major
//! spending class, and a Total row. The grid is recovered geometrically;
//! names that wrap onto a second line are stitched back together before
//! the blocks are walked.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fiscus_core::calendar::fy_tag;
use fiscus_core::coerce::{coerce_cell, CoercionMode};
use fiscus_core::depts::DeptResolver;
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_core::grid::Grid;
use fiscus_core::table::tokens_to_grid;
use fiscus_runtime::{
    BudgetKind, Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry,
    ReportGroup, ReportParams,
};

use crate::dept_merge::merge_department_info;

/// Rows of page banner above the first department block.
const BANNER_ROWS: usize = 6;

static FOOTNOTE_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\d\)").unwrap());

/// Printed major-class labels and their canonical codes.
const CLASS_MAP: [(&str, &str); 9] = [
    ("Total", "total"),
    ("Personal Services", "class_100"),
    ("Pers. Svcs.-Emp.Benefits", "class_100"),
    ("Purchase of Services", "class_200"),
    ("Materials, Supplies & Equip.", "class_300_400"),
    ("Contrib., Indemnities & Taxes", "class_500"),
    ("Debt Service", "class_700"),
    ("Payments to Other Funds", "class_800"),
    ("Advances and Other Misc. Payments", "class_900"),
];

const CLASS_COLUMNS: [&str; 8] = [
    "class_100",
    "class_200",
    "class_300_400",
    "class_500",
    "class_700",
    "class_800",
    "class_900",
    "total",
];

/// The Budget Summary from the budget-in-brief.
pub struct BudgetSummary {
    fiscal_year: i32,
    kind: BudgetKind,
    path: PathBuf,
}

impl BudgetSummary {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        let fiscal_year = params.require_fiscal_year()?;
        let kind = params.require_kind()?;
        let path = ctx
            .raw_root()
            .join("budget-in-brief")
            .join(kind.as_str())
            .join(format!("FY{}.pdf", fy_tag(fiscal_year)));
        if !path.exists() {
            return Err(FiscusError::file_not_found(&path));
        }
        Ok(Self {
            fiscal_year,
            kind,
            path,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "BudgetSummary",
            group: ReportGroup::Budget,
            params: ParamSpec::FiscalYearKind,
            raw_subdir: "budget-in-brief",
            crop: CropStrategy::FullPage,
            description: "Department spending by major class from the budget-in-brief",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    fn transform_impl(&self, depts: &DeptResolver, raw: Frame) -> FiscusResult<Frame> {
        let mut blocks = raw;
        for col in ["actual", "budgeted"] {
            blocks.map_column(col, |v| match v {
                CellValue::Text(t) => {
                    coerce_cell(t, CoercionMode::Coerce).unwrap_or(CellValue::Missing)
                }
                other => other.clone(),
            })?;
            blocks.map_column(col, |v| {
                if v.is_missing() {
                    CellValue::Number(Decimal::ZERO)
                } else {
                    v.clone()
                }
            })?;
        }

        // Pivot wide by canonical class, summing split class 100 lines.
        let class_idx = blocks.col_index("major_class").unwrap();
        let dept_idx = blocks.col_index("dept_name").unwrap();
        let budget_idx = blocks.col_index("budgeted").unwrap();

        let mut columns = vec!["dept_name".to_string()];
        columns.extend(CLASS_COLUMNS.iter().map(|c| c.to_string()));
        columns.push("fiscal_year".to_string());
        let mut wide = Frame::new(columns);

        let mut dept_order: Vec<String> = Vec::new();
        for row in blocks.rows() {
            let dept = row[dept_idx].render();
            if !dept_order.contains(&dept) {
                dept_order.push(dept);
            }
        }

        for dept in dept_order {
            let mut values = vec![Decimal::ZERO; CLASS_COLUMNS.len()];
            for row in blocks.rows() {
                if row[dept_idx].render() != dept {
                    continue;
                }
                let printed = row[class_idx].render();
                let Some((_, code)) = CLASS_MAP
                    .iter()
                    .find(|(label, _)| *label == printed.trim())
                else {
                    return Err(FiscusError::schema(format!(
                        "unknown major class '{printed}' for department '{dept}'"
                    )));
                };
                let slot = CLASS_COLUMNS.iter().position(|c| c == code).unwrap();
                values[slot] += row[budget_idx].as_number().unwrap_or(Decimal::ZERO);
            }
            let mut cells = vec![CellValue::text(dept)];
            cells.extend(values.into_iter().map(CellValue::Number));
            cells.push(CellValue::Number(Decimal::from(self.fiscal_year)));
            wide.push_row(cells)?;
        }

        merge_department_info(depts, wide, "dept_name")
    }
}

/// Merge wrapped department names: a header row (no data) immediately
/// followed by another header row is one name split across two lines.
fn stitch_wrapped_names(frame: &mut Frame) -> FiscusResult<()> {
    let header_rows: Vec<usize> = (0..frame.nrows())
        .filter(|&i| is_header_row(frame, i))
        .collect();

    let label_col = frame.columns()[0].clone();
    let mut drop: Vec<usize> = Vec::new();
    for pair in header_rows.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if second == first + 1 && !drop.contains(&first) {
            let joined = format!(
                "{} {}",
                frame.value(first, &label_col).map(CellValue::render).unwrap_or_default(),
                frame.value(second, &label_col).map(CellValue::render).unwrap_or_default()
            );
            frame.set_value(first, &label_col, CellValue::text(joined.trim()))?;
            drop.push(second);
        }
    }
    let mut index = 0;
    frame.retain_rows(|_| {
        let keep = !drop.contains(&index);
        index += 1;
        keep
    });
    Ok(())
}

fn is_header_row(frame: &Frame, i: usize) -> bool {
    let row = frame.row(i).unwrap();
    !row[0].is_missing() && row.iter().skip(1).all(CellValue::is_missing)
}

/// Walk department blocks (header row through Total row) and emit the long
/// block table.
fn blocks_to_long(frame: &Frame) -> FiscusResult<Frame> {
    if frame.ncols() < 6 {
        return Err(FiscusError::parse(format!(
            "budget summary grid has {} columns, expected at least 6",
            frame.ncols()
        )));
    }

    let mut out = Frame::new(
        ["major_class", "actual", "budgeted", "dept_name"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );

    let starts: Vec<usize> = (0..frame.nrows())
        .filter(|&i| is_header_row(frame, i))
        .collect();
    let stops: Vec<usize> = (0..frame.nrows())
        .filter(|&i| frame.row(i).unwrap()[0].render().trim() == "Total")
        .collect();

    for (&start, &stop) in starts.iter().zip(stops.iter()) {
        if stop <= start {
            return Err(FiscusError::parse(
                "department block ends before it begins".to_string(),
            ));
        }
        let dept_raw = frame.row(start).unwrap()[0].render();
        let dept = FOOTNOTE_REF_RE.replace_all(&dept_raw, "").trim().to_string();
        for i in start + 1..=stop {
            let row = frame.row(i).unwrap();
            out.push_row(vec![
                row[0].clone(),
                row[1].clone(),
                row[5].clone(),
                CellValue::text(dept.clone()),
            ])?;
        }
    }

    // The page's final row is the General Fund grand total.
    if let Some(last) = frame.row(frame.nrows().saturating_sub(1)) {
        out.push_row(vec![
            CellValue::text("Total"),
            last[1].clone(),
            last[5].clone(),
            CellValue::text("General Fund"),
        ])?;
    }
    Ok(out)
}

impl EtlPipeline for BudgetSummary {
    fn name(&self) -> &str {
        "BudgetSummary"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let pages = ctx.tokens().page_count(&self.path)?;
        let mut params = ctx.table_params();
        params.min_col_sep = 30.0;

        let mut rows: Vec<Vec<String>> = Vec::new();
        for page in 1..=pages {
            let tokens = ctx.tokens().tokens_of_page(&self.path, page)?;
            let mut grid = tokens_to_grid(&tokens, &params);
            let mut index = 0;
            grid.retain_rows(|_| {
                let keep = index >= BANNER_ROWS;
                index += 1;
                keep
            });
            grid.drop_empty_columns();
            for row in grid.rows() {
                rows.push(row.to_vec());
            }
        }
        let mut frame = Frame::from_grid(&Grid::from_ragged_rows(rows));
        stitch_wrapped_names(&mut frame)?;
        blocks_to_long(&frame)
    }

    fn transform(&mut self, ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        self.transform_impl(ctx.depts(), raw)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        // Class columns must sum to each department's printed total.
        let total_idx = data
            .col_index("total")
            .ok_or_else(|| FiscusError::schema("missing 'total' column"))?;
        let dept_idx = data
            .col_index("dept_name_raw")
            .ok_or_else(|| FiscusError::schema("missing 'dept_name_raw' column"))?;

        for row in data.rows() {
            // The appended General Fund row carries only a grand total.
            if row[dept_idx].render() == "General Fund" {
                continue;
            }
            let mut classes = Decimal::ZERO;
            for col in CLASS_COLUMNS.iter().filter(|c| **c != "total") {
                let idx = data
                    .col_index(col)
                    .ok_or_else(|| FiscusError::schema(format!("missing '{col}' column")))?;
                classes += row[idx].as_number().unwrap_or(Decimal::ZERO);
            }
            let total = row[total_idx].as_number().unwrap_or(Decimal::ZERO);
            let diff = (classes - total).abs();
            if diff > dec!(1) {
                return Err(FiscusError::validation(format!(
                    "classes sum to {classes} but the Total line is {total} for '{}' \
                     (diff {diff} > 1)",
                    row[dept_idx].render()
                )));
            }
        }
        Ok(())
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        ctx.processed_root()
            .join("budget-in-brief")
            .join(self.kind.as_str())
            .join("budget")
            .join(format!("FY{}.csv", fy_tag(self.fiscal_year)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_frame(rows: Vec<Vec<&str>>) -> Frame {
        let ncols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let columns: Vec<String> = (0..ncols).map(|i| i.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|r| {
                (0..ncols)
                    .map(|i| match r.get(i) {
                        Some(s) if !s.is_empty() => CellValue::text(*s),
                        _ => CellValue::Missing,
                    })
                    .collect()
            })
            .collect();
        Frame::with_rows(columns, rows).unwrap()
    }

    #[test]
    fn test_stitch_wrapped_names() {
        let mut frame = text_frame(vec![
            vec!["Office of Homeless", "", "", "", "", ""],
            vec!["Services", "", "", "", "", ""],
            vec!["Personal Services", "1", "2", "3", "4", "5"],
            vec!["Total", "1", "2", "3", "4", "5"],
        ]);
        stitch_wrapped_names(&mut frame).unwrap();
        assert_eq!(frame.nrows(), 3);
        assert_eq!(
            frame.value(0, "0").unwrap().as_text(),
            Some("Office of Homeless Services")
        );
    }

    #[test]
    fn test_blocks_to_long() {
        let frame = text_frame(vec![
            vec!["Police (1)", "", "", "", "", ""],
            vec!["Personal Services", "$100", "x", "x", "x", "$110"],
            vec!["Purchase of Services", "$20", "x", "x", "x", "$22"],
            vec!["Total", "$120", "x", "x", "x", "$132"],
        ]);
        let long = blocks_to_long(&frame).unwrap();
        // Three block rows plus the appended General Fund total.
        assert_eq!(long.nrows(), 4);
        assert_eq!(long.value(0, "dept_name").unwrap().as_text(), Some("Police"));
        assert_eq!(long.value(0, "budgeted").unwrap().as_text(), Some("$110"));
        assert_eq!(
            long.value(3, "dept_name").unwrap().as_text(),
            Some("General Fund")
        );
    }

    #[test]
    fn test_transform_pivots_by_class() {
        let depts = DeptResolver::packaged().unwrap();
        let raw = Frame::with_rows(
            vec![
                "major_class".into(),
                "actual".into(),
                "budgeted".into(),
                "dept_name".into(),
            ],
            vec![
                vec![
                    CellValue::text("Personal Services"),
                    CellValue::text("$90"),
                    CellValue::text("$100"),
                    CellValue::text("Police"),
                ],
                vec![
                    CellValue::text("Pers. Svcs.-Emp.Benefits"),
                    CellValue::text("$9"),
                    CellValue::text("$10"),
                    CellValue::text("Police"),
                ],
                vec![
                    CellValue::text("Purchase of Services"),
                    CellValue::text("$18"),
                    CellValue::text("$20"),
                    CellValue::text("Police"),
                ],
                vec![
                    CellValue::text("Total"),
                    CellValue::text("$117"),
                    CellValue::text("$130"),
                    CellValue::text("Police"),
                ],
            ],
        )
        .unwrap();

        let report = BudgetSummary {
            fiscal_year: 2022,
            kind: BudgetKind::Adopted,
            path: PathBuf::new(),
        };
        let wide = report.transform_impl(&depts, raw).unwrap();
        assert_eq!(wide.nrows(), 1);
        assert_eq!(wide.value(0, "class_100").unwrap().as_number(), Some(dec!(110)));
        assert_eq!(wide.value(0, "class_200").unwrap().as_number(), Some(dec!(20)));
        assert_eq!(wide.value(0, "total").unwrap().as_number(), Some(dec!(130)));
        report.validate(&wide).unwrap();
    }
}
