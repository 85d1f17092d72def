//! Monthly city non-tax collections.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal_macros::dec;

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_core::validate::{check_row_totals, check_shape, ShapeCheck, SumCheck};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::city::MonthlyCity;
use crate::labels::snake_label;

static STOP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"TOTAL LOCAL NON.*TAX").unwrap());

const TOTAL_ROW: &str = "total_local_nontax_revenue";

/// Historic label fixes for categories whose printed names drifted.
const RENAMES: [(&str, &str); 5] = [
    ("licenses_and_inspections", "licenses_and_inspection_fees"),
    ("nonprofit_contribution", "payments_in_lieu_of_taxes"),
    ("interest_income", "interest_earnings"),
    ("sale_of_assets", "asset_sales"),
    ("court_related", "court_related_costs"),
];

/// Monthly City Non-Tax Collections Report.
pub struct CityNonTaxCollections {
    inner: MonthlyCity,
}

impl CityNonTaxCollections {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            inner: MonthlyCity::resolve(ctx, params)?,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "CityNonTaxCollections",
            group: ReportGroup::Collections,
            params: ParamSpec::YearMonth,
            raw_subdir: "collections/monthly/city",
            crop: CropStrategy::FullPage,
            description: "Monthly city non-tax collections by category",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    fn canonicalize_names(frame: &mut Frame) -> FiscusResult<()> {
        let label_col = frame.columns()[0].clone();
        for i in 0..frame.nrows() {
            let raw = frame
                .value(i, &label_col)
                .map(CellValue::render)
                .unwrap_or_default();
            let mut name = snake_label(&raw.replace('-', ""), &[]);
            if name.starts_with("total_local_non") {
                name = TOTAL_ROW.to_string();
            } else if name.starts_with("emergency_medical") {
                name = "emergency_medical_services".to_string();
            } else if let Some((_, to)) = RENAMES.iter().find(|(from, _)| *from == name) {
                name = to.to_string();
            }
            frame.set_value(i, &label_col, CellValue::Text(name))?;
        }
        Ok(())
    }
}

impl EtlPipeline for CityNonTaxCollections {
    fn name(&self) -> &str {
        "CityNonTaxCollections"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        self.inner.extract_grid(ctx)
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        let frame = self.inner.base_transform(&raw)?;

        // The non-tax section sits between the tax grand total and its own
        // total line.
        let start = frame.find_single("0", "TOTAL TAX REVENUE", |v| {
            v.as_text().is_some_and(|t| t.contains("TOTAL TAX REVENUE"))
        })?;
        let stop = frame.find_single("0", "TOTAL LOCAL NON-TAX", |v| {
            v.as_text().is_some_and(|t| STOP_RE.is_match(t))
        })?;
        if stop <= start {
            return Err(FiscusError::parse(
                "non-tax section ends before it begins".to_string(),
            ));
        }
        let mut section = frame.slice_rows(start + 1, stop);

        check_shape(
            &section,
            &ShapeCheck {
                rows: Some(vec![10, 11, 17]),
                columns: None,
            },
        )?;
        if section.nrows() == 11 {
            // An extra carried-over header row leads the section.
            section = section.slice_rows(1, section.nrows() - 1);
        }

        Self::canonicalize_names(&mut section)?;
        self.inner.label_trailing_columns(&section)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        let name_idx = data
            .col_index("name")
            .ok_or_else(|| FiscusError::schema("missing 'name' column"))?;
        let components: Vec<String> = data
            .rows()
            .filter_map(|r| r[name_idx].as_text())
            .filter(|n| *n != TOTAL_ROW)
            .map(str::to_string)
            .collect();
        let refs: Vec<&str> = components.iter().map(String::as_str).collect();

        let month_cols = self.inner.month_columns()?;
        let col_refs: Vec<&str> = month_cols.iter().map(String::as_str).collect();
        let check = SumCheck::new(TOTAL_ROW, &refs, dec!(5));
        check_row_totals(data, "name", &check, &col_refs)
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        ctx.processed_root()
            .join("collections/monthly/city")
            .join(format!(
                "{}-{:02}-nontax.csv",
                self.inner.year, self.inner.month
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_names() {
        let mut frame = Frame::with_rows(
            vec!["0".into(), "1".into()],
            vec![
                vec![
                    CellValue::text("TOTAL LOCAL NON-TAX REVENUE"),
                    CellValue::Missing,
                ],
                vec![
                    CellValue::text("Licenses & Inspections"),
                    CellValue::Missing,
                ],
                vec![
                    CellValue::text("EMERGENCY MEDICAL SVCS."),
                    CellValue::Missing,
                ],
                vec![CellValue::text("Interest Income"), CellValue::Missing],
            ],
        )
        .unwrap();
        CityNonTaxCollections::canonicalize_names(&mut frame).unwrap();
        assert_eq!(frame.value(0, "0").unwrap().as_text(), Some(TOTAL_ROW));
        assert_eq!(
            frame.value(1, "0").unwrap().as_text(),
            Some("licenses_and_inspection_fees")
        );
        assert_eq!(
            frame.value(2, "0").unwrap().as_text(),
            Some("emergency_medical_services")
        );
        assert_eq!(
            frame.value(3, "0").unwrap().as_text(),
            Some("interest_earnings")
        );
    }
}
