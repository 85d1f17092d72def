//! Quarterly City Manager's Report families.
//!
//! QCMR layouts defeat geometric reconstruction, so every family here goes
//! through the table provider (the OCR path). Shared plumbing: raw/output
//! path conventions, page-table stitching, and as-of date assignment.

mod cash;
mod obligations;
mod personal_services;
mod positions;

pub use cash::{
    CashReportFundBalances, CashReportNetCashFlow, CashReportRevenue, CashReportSpending,
};
pub use obligations::DepartmentObligations;
pub use personal_services::PersonalServices;
pub use positions::FullTimePositions;

use std::path::PathBuf;

use chrono::NaiveDate;

use fiscus_core::calendar::{fiscal_year_end, fy_tag, quarter_end};
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::Frame;
use fiscus_core::grid::Grid;
use fiscus_runtime::{Context, ReportParams};

/// Resolved parameters for one QCMR invocation.
#[derive(Debug, Clone)]
pub(crate) struct QcmrReport {
    pub fiscal_year: i32,
    pub quarter: u32,
    pub path: PathBuf,
}

impl QcmrReport {
    /// Resolve `qcmr/{dtype}/FY{yy}_Q{n}.pdf` under the raw root.
    pub fn resolve(ctx: &Context, params: &ReportParams, dtype: &str) -> FiscusResult<Self> {
        let fiscal_year = params.require_fiscal_year()?;
        let quarter = params.require_quarter()?;
        if !(1..=4).contains(&quarter) {
            return Err(FiscusError::schema(format!("invalid quarter {quarter}")));
        }
        let path = ctx
            .raw_root()
            .join("qcmr")
            .join(dtype)
            .join(format!("FY{}_Q{quarter}.pdf", fy_tag(fiscal_year)));
        if !path.exists() {
            return Err(FiscusError::file_not_found(&path));
        }
        Ok(Self {
            fiscal_year,
            quarter,
            path,
        })
    }

    /// Output path `qcmr/{dtype}[/{subreport}]/FY{yy}-Q{n}.csv` under the
    /// processed root.
    pub fn output_path(&self, ctx: &Context, dtype: &str, subreport: Option<&str>) -> PathBuf {
        let mut dir = ctx.processed_root().join("qcmr").join(dtype);
        if let Some(sub) = subreport {
            dir = dir.join(sub);
        }
        dir.join(format!(
            "FY{}-Q{}.csv",
            fy_tag(self.fiscal_year),
            self.quarter
        ))
    }

    /// FY/quarter tag for error messages, e.g. `FY21 Q2`.
    pub fn tag(&self) -> String {
        format!("FY{} Q{}", fy_tag(self.fiscal_year), self.quarter)
    }

    /// The date a value was measured: rows from earlier fiscal years close
    /// on their June 30, current-year rows close on the report's quarter
    /// end.
    pub fn as_of_date(&self, row_fiscal_year: i32, time_period: &str) -> FiscusResult<NaiveDate> {
        if row_fiscal_year < self.fiscal_year {
            if time_period != "Full Year" {
                return Err(FiscusError::schema(format!(
                    "prior-year row for FY{row_fiscal_year} must be Full Year, got '{time_period}'"
                )));
            }
            fiscal_year_end(row_fiscal_year)
        } else {
            quarter_end(self.fiscal_year, self.quarter)
        }
    }
}

/// Stack a page's tables vertically, padding narrow tables with empty
/// cells, and lift into a positional frame.
pub(crate) fn stacked_tables(ctx: &Context, report: &QcmrReport, page: usize) -> FiscusResult<Frame> {
    let tables = ctx.tables().tables_of_page(&report.path, page)?;
    Ok(Frame::from_grid(&vstack(tables)))
}

/// Stack the tables of every page vertically.
pub(crate) fn all_pages_stacked(ctx: &Context, report: &QcmrReport) -> FiscusResult<Frame> {
    let pages = ctx.tables().page_count(&report.path)?;
    let mut grids = Vec::new();
    for page in 1..=pages {
        grids.extend(ctx.tables().tables_of_page(&report.path, page)?);
    }
    Ok(Frame::from_grid(&vstack(grids)))
}

/// Stack the tables of every page vertically, placing each page's tables
/// side by side first (multi-table pages split one logical table into
/// column blocks). `remove_headers` drops the leading row of every table.
pub(crate) fn all_pages_side_by_side(
    ctx: &Context,
    report: &QcmrReport,
    remove_headers: bool,
) -> FiscusResult<Frame> {
    let pages = ctx.tables().page_count(&report.path)?;
    let mut page_grids = Vec::new();
    for page in 1..=pages {
        let tables = ctx.tables().tables_of_page(&report.path, page)?;
        page_grids.push(hstack(tables, remove_headers));
    }
    Ok(Frame::from_grid(&vstack(page_grids)))
}

fn vstack(grids: Vec<Grid>) -> Grid {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for grid in grids {
        for row in grid.rows() {
            rows.push(row.to_vec());
        }
    }
    Grid::from_ragged_rows(rows)
}

fn hstack(grids: Vec<Grid>, remove_headers: bool) -> Grid {
    let grids: Vec<Grid> = grids
        .into_iter()
        .map(|mut g| {
            if remove_headers && g.nrows() > 0 {
                let mut first = true;
                g.retain_rows(|_| {
                    let keep = !first;
                    first = false;
                    keep
                });
            }
            g
        })
        .filter(|g| !g.is_empty())
        .collect();

    let height = grids.iter().map(Grid::nrows).max().unwrap_or(0);
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); height];
    for grid in &grids {
        for (i, row) in rows.iter_mut().enumerate() {
            match grid.row(i) {
                Some(cells) => row.extend(cells.iter().cloned()),
                None => row.extend(std::iter::repeat(String::new()).take(grid.ncols())),
            }
        }
    }
    Grid::from_ragged_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_vstack_pads_widths() {
        let stacked = vstack(vec![grid(&[&["a", "b"]]), grid(&[&["c", "d", "e"]])]);
        assert_eq!(stacked.nrows(), 2);
        assert_eq!(stacked.ncols(), 3);
        assert_eq!(stacked.get(0, 2), Some(""));
    }

    #[test]
    fn test_hstack_places_tables_side_by_side() {
        let left = grid(&[&["hdr1", "hdr2"], &["Police", "100"], &["Fire", "200"]]);
        let right = grid(&[&["hdr3"], &["300"], &["400"]]);
        let combined = hstack(vec![left, right], true);
        assert_eq!(combined.nrows(), 2);
        assert_eq!(combined.ncols(), 3);
        assert_eq!(combined.get(0, 0), Some("Police"));
        assert_eq!(combined.get(0, 2), Some("300"));
        assert_eq!(combined.get(1, 2), Some("400"));
    }

    #[test]
    fn test_hstack_pads_short_tables() {
        let left = grid(&[&["a"], &["b"]]);
        let right = grid(&[&["x"]]);
        let combined = hstack(vec![left, right], false);
        assert_eq!(combined.get(1, 0), Some("b"));
        assert_eq!(combined.get(1, 1), Some(""));
    }
}
