//! Shared plumbing for the monthly city collections reports.
//!
//! All three city reports (tax, non-tax, other governments) parse the same
//! PDF: every page is reconstructed geometrically, page-banner rows are
//! dropped, and the pages are stacked into one grid. The specializations
//! then crop their section, rename rows, and relabel columns.

use std::path::{Path, PathBuf};

use fiscus_core::calendar::month_abbr;
use fiscus_core::clean::{apply_passes, coerce_to_frame, monthly_collection_passes};
use fiscus_core::coerce::CoercionMode;
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::Frame;
use fiscus_core::geometry::footnote_cutoff;
use fiscus_core::grid::Grid;
use fiscus_core::table::tokens_to_grid;
use fiscus_runtime::{Context, ReportParams};

use crate::labels::collection_column_names;

/// Banner phrases that survive reconstruction at the top of a page.
const BANNER_PREFIXES: [&str; 3] = ["prelim", "final", "budget"];

/// Parameters and resolved path for one monthly city invocation.
#[derive(Debug, Clone)]
pub(crate) struct MonthlyCity {
    pub year: i32,
    pub month: u32,
    pub path: PathBuf,
}

impl MonthlyCity {
    /// Resolve the raw path `collections/monthly/city/{year}_{month}.pdf`
    /// and fail fast when it is absent.
    pub fn resolve(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        let year = params.require_year()?;
        let month = params.require_month()?;
        let path = ctx
            .raw_root()
            .join("collections/monthly/city")
            .join(format!("{year}_{month:02}.pdf"));
        if !path.exists() {
            return Err(FiscusError::file_not_found(&path));
        }
        Ok(Self { year, month, path })
    }

    pub fn month_name(&self) -> FiscusResult<&'static str> {
        month_abbr(self.month)
    }

    /// The two month-of-year value columns, `{mon}_fy{yy}` and the prior
    /// year's, used by the subtotal checks.
    pub fn month_columns(&self) -> FiscusResult<Vec<String>> {
        let names = collection_column_names(self.month, self.year)?;
        let mon = self.month_name()?;
        Ok(names
            .into_iter()
            .filter(|n| n.starts_with(mon))
            .collect())
    }

    /// Reconstruct and stack every page of the report.
    pub fn extract_grid(&self, ctx: &Context) -> FiscusResult<Frame> {
        let grid = extract_city_pages(ctx, &self.path)?;
        Ok(Frame::from_grid(&grid))
    }

    /// The shared cleaning for the city family: ordered passes, numeric
    /// coercion, and missing-row removal over the data columns.
    pub fn base_transform(&self, raw: &Frame) -> FiscusResult<Frame> {
        let grid = raw.to_text_grid();
        let cleaned = apply_passes(grid, &monthly_collection_passes());
        let mut frame = coerce_to_frame(&cleaned, CoercionMode::Coerce)?;
        let data_cols: Vec<String> = frame.columns()[1..].to_vec();
        let refs: Vec<&str> = data_cols.iter().map(String::as_str).collect();
        frame.drop_missing_rows(Some(&refs));
        Ok(frame)
    }

    /// Keep the name column plus the trailing seven value columns and label
    /// them from the report parameters.
    pub fn label_trailing_columns(&self, frame: &Frame) -> FiscusResult<Frame> {
        if frame.ncols() < 8 {
            return Err(FiscusError::parse(format!(
                "expected at least 8 columns, found {}",
                frame.ncols()
            )));
        }
        let mut keep: Vec<&str> = vec![frame.columns()[0].as_str()];
        let tail = &frame.columns()[frame.ncols() - 7..];
        keep.extend(tail.iter().map(String::as_str));
        let mut out = frame.select_columns(&keep)?;

        let names = collection_column_names(self.month, self.year)?;
        let mut columns = vec!["name".to_string()];
        columns.extend(names[names.len() - 7..].iter().cloned());
        out.set_column_names(columns)?;
        Ok(out)
    }
}

fn extract_city_pages(ctx: &Context, path: &Path) -> FiscusResult<Grid> {
    let pages = ctx.tokens().page_count(path)?;
    let mut grids: Vec<Grid> = Vec::new();

    let mut params = ctx.table_params();
    params.text_tolerance_x = 5.0;
    params.row_header_tolerance = 20.0;

    for page in 1..=pages {
        let tokens = ctx.tokens().tokens_of_page(path, page)?;
        let tokens = footnote_cutoff(tokens);
        let mut grid = tokens_to_grid(&tokens, &params);

        grid.retain_rows(|row| {
            let first = row.first().map(|c| c.to_lowercase()).unwrap_or_default();
            !BANNER_PREFIXES.iter().any(|p| first.starts_with(p))
        });
        grid.drop_empty_columns();
        tracing::debug!(page, rows = grid.nrows(), cols = grid.ncols(), "parsed page");
        if grid.is_empty() {
            continue;
        }

        if let Some(prev) = grids.last() {
            if prev.ncols() != grid.ncols() {
                return Err(FiscusError::parse(format!(
                    "column mismatch when parsing multiple pages: {} vs {}",
                    prev.ncols(),
                    grid.ncols()
                )));
            }
        }
        grids.push(grid);
    }
    Grid::concat(grids)
}
