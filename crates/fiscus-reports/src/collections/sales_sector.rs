//! Annual sales tax collections by sector.

use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fiscus_core::calendar::fy_tag;
use fiscus_core::clean::{apply_passes, coerce_to_frame, GridPass};
use fiscus_core::coerce::CoercionMode;
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_core::table::tokens_to_grid;
use fiscus_core::validate::{check_shape, ShapeCheck};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::wage_sector::crop_between_anchors;

/// The 27 sales-tax sectors, alphabetized; printed rows are matched to
/// these by sort order.
const SECTORS: [&str; 27] = [
    "All Other Sectors",
    "Appliance, other electronics, retail",
    "Car and truck rental",
    "Computer and software stores, retail",
    "Construction",
    "Convenience stores, retail",
    "Department stores, retail",
    "Furniture stores retail",
    "Home centers, retail",
    "Hotels",
    "Liquor and beer stores, retail",
    "Manufacturing",
    "Motor Vehicle Sales Tax",
    "Office supplies stores, retail",
    "Other retail",
    "Pharmacies, retail",
    "Public Utilities",
    "Rentals except car and truck rentals",
    "Repair services",
    "Restaurants, bars, concessionaires and caterers",
    "Services other than repair services",
    "Subtotal",
    "Supermarkets, retail",
    "Telecommunications",
    "Total Retail",
    "Unclassified",
    "Wholesale",
];

const RETAIL: [&str; 11] = [
    "Furniture stores retail",
    "Appliance, other electronics, retail",
    "Computer and software stores, retail",
    "Home centers, retail",
    "Supermarkets, retail",
    "Convenience stores, retail",
    "Liquor and beer stores, retail",
    "Pharmacies, retail",
    "Department stores, retail",
    "Office supplies stores, retail",
    "Other retail",
];

/// Fiscal-year Sales Collections by Sector.
pub struct SalesCollectionsBySector {
    fiscal_year: i32,
    path: PathBuf,
    /// Pre-2017 files use the four-column layout.
    legacy: bool,
}

impl SalesCollectionsBySector {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        let fiscal_year = params.require_fiscal_year()?;
        let path = ctx
            .raw_root()
            .join("collections/by-sector/sales")
            .join(format!("FY{}.pdf", fy_tag(fiscal_year)));
        if !path.exists() {
            return Err(FiscusError::file_not_found(&path));
        }
        Ok(Self {
            fiscal_year,
            path,
            legacy: fiscal_year < 2017,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "SalesCollectionsBySector",
            group: ReportGroup::Collections,
            params: ParamSpec::FiscalYear,
            raw_subdir: "collections/by-sector/sales",
            crop: CropStrategy::Anchored {
                top_anchor: "construction",
                bottom_anchor: "motor",
            },
            description: "Fiscal-year sales tax collections by sector",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }
}

impl EtlPipeline for SalesCollectionsBySector {
    fn name(&self) -> &str {
        "SalesCollectionsBySector"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let tokens = ctx.tokens().tokens_of_page(&self.path, 1)?;
        let cropped = crop_between_anchors(tokens, "construction", "motor")?;
        let grid = tokens_to_grid(&cropped, &ctx.table_params());
        Ok(Frame::from_grid(&grid))
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        let grid = raw.to_text_grid();
        let cleaned = apply_passes(
            grid,
            &[
                GridPass::RemoveSpaces,
                GridPass::FixPercentages,
                GridPass::StripDollarSigns,
                GridPass::ReplaceMissingCells,
            ],
        );
        let mut frame = coerce_to_frame(&cleaned, CoercionMode::Coerce)?;

        check_shape(
            &frame,
            &ShapeCheck {
                rows: Some(vec![SECTORS.len()]),
                columns: None,
            },
        )?;

        // The modern layout carries growth columns we do not keep.
        if !self.legacy {
            if frame.ncols() < 4 {
                return Err(FiscusError::parse(format!(
                    "expected at least 4 columns, found {}",
                    frame.ncols()
                )));
            }
            let keep: Vec<&str> = frame.columns()[..4].iter().map(String::as_str).collect();
            frame = frame.select_columns(&keep)?;
        } else if frame.ncols() != 4 {
            return Err(FiscusError::parse(format!(
                "legacy layout should have 4 columns, found {}",
                frame.ncols()
            )));
        }

        frame.set_column_names(vec![
            "sector".to_string(),
            "number_entities".to_string(),
            "total".to_string(),
            "percent_of_total".to_string(),
        ])?;

        // Match printed rows to the canonical names by sort order, leaving
        // row order untouched.
        let mut order: Vec<usize> = (0..frame.nrows()).collect();
        order.sort_by_key(|&i| {
            frame
                .value(i, "sector")
                .map(CellValue::render)
                .unwrap_or_default()
        });
        for (rank, row) in order.into_iter().enumerate() {
            frame.set_value(row, "sector", CellValue::text(SECTORS[rank]))?;
        }

        let parents: Vec<CellValue> = (0..frame.nrows())
            .map(|i| {
                let sector = frame.value(i, "sector").map(CellValue::render).unwrap_or_default();
                if RETAIL.contains(&sector.as_str()) {
                    CellValue::text("Total Retail")
                } else {
                    CellValue::Missing
                }
            })
            .collect();
        frame.push_column("parent_sector", parents)?;
        Ok(frame)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        let sector_idx = data
            .col_index("sector")
            .ok_or_else(|| FiscusError::schema("missing 'sector' column"))?;
        let parent_idx = data
            .col_index("parent_sector")
            .ok_or_else(|| FiscusError::schema("missing 'parent_sector' column"))?;

        // Top-level sectors must sum to the printed subtotal.
        let main_sum = data.sum_where("total", |f, i| {
            let row = f.row(i).unwrap();
            row[parent_idx].is_missing()
                && !matches!(
                    row[sector_idx].as_text(),
                    Some("Subtotal") | Some("Motor Vehicle Sales Tax") | Some("Total Retail")
                )
        });
        let subtotal = data.sum_where("total", |f, i| {
            f.row(i).unwrap()[sector_idx].as_text() == Some("Subtotal")
        });
        let diff: Decimal = (main_sum - subtotal).abs();
        if diff > dec!(5) {
            return Err(FiscusError::validation(format!(
                "sectors sum to {main_sum} but Subtotal is {subtotal} (diff {diff} > 5)"
            )));
        }

        // Retail subsectors must sum to the Total Retail line.
        let retail_sum = data.sum_where("total", |f, i| {
            f.row(i).unwrap()[parent_idx].as_text() == Some("Total Retail")
        });
        let retail_total = data.sum_where("total", |f, i| {
            f.row(i).unwrap()[sector_idx].as_text() == Some("Total Retail")
        });
        let diff: Decimal = (retail_sum - retail_total).abs();
        if diff > dec!(5) {
            return Err(FiscusError::validation(format!(
                "retail subsectors sum to {retail_sum} but Total Retail is {retail_total} \
                 (diff {diff} > 5)"
            )));
        }
        Ok(())
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        ctx.processed_root()
            .join("collections/by-sector/sales")
            .join(format!("FY{}.csv", fy_tag(self.fiscal_year)))
    }
}
