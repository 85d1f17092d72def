//! Monthly wage collections by sector.
//!
//! The wage report is a single dense page: sector rows between the
//! "Construction" and "Unclassified Accounts" anchors, four years of
//! monthly collections plus growth columns. Rows are recovered by line
//! clustering alone since every sector name is a full phrase.

use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fiscus_core::clean::{apply_passes, coerce_to_frame, GridPass};
use fiscus_core::coerce::CoercionMode;
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_core::geometry::{fuzzy_group_by, Axis};
use fiscus_core::grid::Grid;
use fiscus_core::token::Token;
use fiscus_core::validate::{check_shape, ShapeCheck};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use fiscus_core::calendar::month_abbr;

/// The 52 wage-tax sectors, in page order.
const SECTORS: [&str; 52] = [
    "Construction",
    "Manufacturing",
    "Chemicals, Petroleum Refining",
    "Pharmaceuticals",
    "Transportation Equipment",
    "Food & Beverage Products",
    "Machinery, Electronic, and Other Electric Equipment",
    "Metal Manufacturing",
    "Miscellaneous Manufacturing",
    "Public Utilities",
    "Transportation and Warehousing",
    "Telecommunication",
    "Publishing, Broadcasting, and Other Information",
    "Wholesale Trade",
    "Retail Trade",
    "Banking & Credit Unions",
    "Securities / Financial Investments",
    "Insurance",
    "Real Estate, Rental and Leasing",
    "Health and Social Services",
    "Hospitals",
    "Doctors, Dentists, and Other Health Practitioners",
    "Outpatient Care Centers and Other Health Services",
    "Nursing & Personal Care Facilities",
    "Social Services",
    "Education",
    "College and Universities",
    "Elementary, Secondary Schools",
    "Other Educational Services",
    "Professional Services",
    "Legal Services",
    "Management Consulting",
    "Engineering & Architectural Services",
    "Computer",
    "Accounting, Auditing, Bookkeeping",
    "Advertising and Other Professional Services",
    "Hotels",
    "Restaurants",
    "Sport Teams",
    "Arts, Entertainment, and Other Recreation",
    "Other Sectors",
    "Membership Organizations",
    "Employment/Outsourcing Agencies",
    "Security and Investigation Services",
    "Services to Buildings",
    "Miscellaneous Sectors",
    "Government",
    "State Government (PA)",
    "City, School District, Local Quasi Govt.",
    "Federal Government",
    "Other Governments",
    "Unclassified Accounts",
];

/// Parent sector for every subsector row; top-level rows map to `None`.
fn parent_sector(sector: &str) -> Option<&'static str> {
    const GROUPS: [(&str, &[&str]); 6] = [
        (
            "Manufacturing",
            &[
                "Chemicals, Petroleum Refining",
                "Pharmaceuticals",
                "Transportation Equipment",
                "Food & Beverage Products",
                "Machinery, Electronic, and Other Electric Equipment",
                "Metal Manufacturing",
                "Miscellaneous Manufacturing",
            ],
        ),
        (
            "Health and Social Services",
            &[
                "Hospitals",
                "Doctors, Dentists, and Other Health Practitioners",
                "Outpatient Care Centers and Other Health Services",
                "Nursing & Personal Care Facilities",
                "Social Services",
            ],
        ),
        (
            "Education",
            &[
                "College and Universities",
                "Elementary, Secondary Schools",
                "Other Educational Services",
            ],
        ),
        (
            "Professional Services",
            &[
                "Legal Services",
                "Management Consulting",
                "Engineering & Architectural Services",
                "Computer",
                "Accounting, Auditing, Bookkeeping",
                "Advertising and Other Professional Services",
            ],
        ),
        (
            "Other Sectors",
            &[
                "Membership Organizations",
                "Employment/Outsourcing Agencies",
                "Security and Investigation Services",
                "Services to Buildings",
                "Miscellaneous Sectors",
            ],
        ),
        (
            "Government",
            &[
                "State Government (PA)",
                "City, School District, Local Quasi Govt.",
                "Federal Government",
                "Other Governments",
            ],
        ),
    ];
    GROUPS
        .iter()
        .find(|(_, members)| members.contains(&sector))
        .map(|(parent, _)| *parent)
}

/// Monthly Wage Collections by Sector.
pub struct WageCollectionsBySector {
    year: i32,
    month: u32,
    path: PathBuf,
}

impl WageCollectionsBySector {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        let year = params.require_year()?;
        let month = params.require_month()?;
        let path = ctx
            .raw_root()
            .join("collections/by-sector/wage")
            .join(format!("{year}_{month:02}.pdf"));
        if !path.exists() {
            return Err(FiscusError::file_not_found(&path));
        }
        Ok(Self { year, month, path })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "WageCollectionsBySector",
            group: ReportGroup::Collections,
            params: ParamSpec::YearMonth,
            raw_subdir: "collections/by-sector/wage",
            crop: CropStrategy::Anchored {
                top_anchor: "construction",
                bottom_anchor: "unclassified",
            },
            description: "Monthly wage tax collections by industry sector",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    fn value_columns(&self) -> FiscusResult<Vec<String>> {
        let mon = month_abbr(self.month)?;
        let mut columns: Vec<String> = (0..4)
            .map(|i| format!("{mon}_{}", self.year - i))
            .collect();
        columns.extend((0..3).map(|i| format!("growth_yoy_{}", self.year - i)));
        columns.push("growth_3yr".to_string());
        columns.push("net_change".to_string());
        Ok(columns)
    }
}

/// Crop tokens to the rectangle spanned by two anchor phrases: everything
/// from the top anchor's line down to the bottom anchor's line, at or right
/// of the top anchor's left edge.
pub(crate) fn crop_between_anchors(
    tokens: Vec<Token>,
    top_anchor: &str,
    bottom_anchor: &str,
) -> FiscusResult<Vec<Token>> {
    let top = tokens
        .iter()
        .filter(|t| t.text().trim().to_lowercase().starts_with(top_anchor))
        .min_by(|a, b| a.x0().total_cmp(&b.x0()))
        .cloned()
        .ok_or_else(|| FiscusError::parse(format!("crop anchor '{top_anchor}' not found")))?;
    let bottom = tokens
        .iter()
        .filter(|t| t.text().trim().to_lowercase().starts_with(bottom_anchor))
        .min_by(|a, b| a.x0().total_cmp(&b.x0()))
        .cloned()
        .ok_or_else(|| {
            FiscusError::parse(format!("crop anchor '{bottom_anchor}' not found"))
        })?;

    Ok(tokens
        .into_iter()
        .filter(|t| {
            t.x0() >= top.x0() - 1.0
                && t.top() >= top.top() - 1.0
                && t.bottom() <= bottom.bottom() + 3.0
        })
        .collect())
}

/// Crop to the anchors and turn each clustered line into a row of cell
/// text.
fn rows_between_anchors(
    tokens: Vec<Token>,
    top_anchor: &str,
    bottom_anchor: &str,
) -> FiscusResult<Grid> {
    let cropped = crop_between_anchors(tokens, top_anchor, bottom_anchor)?;
    let rows = fuzzy_group_by(&cropped, Axis::Bottom, 3.0, 3.0);
    Ok(Grid::from_ragged_rows(
        rows.into_iter()
            .map(|line| line.tokens.iter().map(|t| t.text().to_string()).collect())
            .collect(),
    ))
}

impl EtlPipeline for WageCollectionsBySector {
    fn name(&self) -> &str {
        "WageCollectionsBySector"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        let tokens = ctx.tokens().tokens_of_page(&self.path, 1)?;
        let grid = rows_between_anchors(tokens, "construction", "unclassified")?;
        Ok(Frame::from_grid(&grid))
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        let grid = raw.to_text_grid();
        let cleaned = apply_passes(
            grid,
            &[
                GridPass::RemoveSpaces,
                GridPass::FixPercentages,
                GridPass::ReplaceMissingCells,
            ],
        );
        let mut frame = coerce_to_frame(&cleaned, CoercionMode::Coerce)?;

        check_shape(
            &frame,
            &ShapeCheck {
                rows: Some(vec![SECTORS.len()]),
                columns: Some(10),
            },
        )?;

        let mut columns = vec!["sector".to_string()];
        columns.extend(self.value_columns()?);
        frame.set_column_names(columns)?;

        // Printed sector names vary; positions do not.
        for (i, sector) in SECTORS.iter().enumerate() {
            frame.set_value(i, "sector", CellValue::text(*sector))?;
        }
        let parents: Vec<CellValue> = SECTORS
            .iter()
            .map(|s| match parent_sector(s) {
                Some(p) => CellValue::text(p),
                None => CellValue::Missing,
            })
            .collect();
        frame.push_column("parent_sector", parents)?;
        Ok(frame)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        let mon = month_abbr(self.month)?;
        let month_cols: Vec<String> = (0..4)
            .map(|i| format!("{mon}_{}", self.year - i))
            .collect();

        let sector_idx = data
            .col_index("sector")
            .ok_or_else(|| FiscusError::schema("missing 'sector' column"))?;
        let parent_idx = data
            .col_index("parent_sector")
            .ok_or_else(|| FiscusError::schema("missing 'parent_sector' column"))?;

        let parents: Vec<String> = data
            .rows()
            .filter_map(|r| r[parent_idx].as_text())
            .map(str::to_string)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        for col in &month_cols {
            for parent in &parents {
                let subtotal = data.sum_where(col, |f, i| {
                    f.row(i).unwrap()[parent_idx].as_text() == Some(parent)
                });
                let total = data.sum_where(col, |f, i| {
                    f.row(i).unwrap()[sector_idx].as_text() == Some(parent)
                });
                let diff: Decimal = (subtotal - total).abs();
                if diff > dec!(5) {
                    return Err(FiscusError::validation(format!(
                        "subsectors of '{parent}' sum to {subtotal} but the sector row has \
                         {total} in '{col}' (diff {diff} > 5)"
                    )));
                }
            }
        }
        Ok(())
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        ctx.processed_root()
            .join("collections/by-sector/wage")
            .join(format!("{}-{:02}.csv", self.year, self.month))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(x0: f64, top: f64, text: &str) -> Token {
        Token::new(x0, x0 + 40.0, top, top + 10.0, text).unwrap()
    }

    #[test]
    fn test_rows_between_anchors() {
        let tokens = vec![
            tok(0.0, 10.0, "Wage Collections Header"),
            tok(0.0, 100.0, "Construction"),
            tok(200.0, 100.0, "1,000"),
            tok(0.0, 130.0, "Manufacturing"),
            tok(200.0, 130.0, "2,000"),
            tok(0.0, 160.0, "Unclassified Accounts"),
            tok(200.0, 160.0, "3,000"),
            tok(0.0, 200.0, "Footer text"),
        ];
        let grid = rows_between_anchors(tokens, "construction", "unclassified").unwrap();
        assert_eq!(grid.nrows(), 3);
        assert_eq!(grid.get(0, 0), Some("Construction"));
        assert_eq!(grid.get(2, 1), Some("3,000"));
    }

    #[test]
    fn test_anchor_missing_is_parse_error() {
        let tokens = vec![tok(0.0, 10.0, "nothing here")];
        assert!(rows_between_anchors(tokens, "construction", "unclassified").is_err());
    }

    #[test]
    fn test_parent_sector_mapping() {
        assert_eq!(parent_sector("Hospitals"), Some("Health and Social Services"));
        assert_eq!(parent_sector("Construction"), None);
        assert_eq!(parent_sector("Federal Government"), Some("Government"));
    }

    #[test]
    fn test_sector_count() {
        assert_eq!(SECTORS.len(), 52);
        let subsectors = SECTORS.iter().filter(|s| parent_sector(s).is_some()).count();
        assert_eq!(subsectors, 30);
    }
}
