//! Monthly city collections from other governments.

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

static START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"U\.S\. GOV").unwrap());
static STOP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"TOTAL.*REVENUE.*GOV.*").unwrap());

const TOTAL_ROW: &str = "total_revenue_other_govts";

/// Monthly City Other Governments Collections Report.
pub struct CityOtherGovtsCollections {
    inner: MonthlyCity,
}

impl CityOtherGovtsCollections {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            inner: MonthlyCity::resolve(ctx, params)?,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "CityOtherGovtsCollections",
            group: ReportGroup::Collections,
            params: ParamSpec::YearMonth,
            raw_subdir: "collections/monthly/city",
            crop: CropStrategy::FullPage,
            description: "Monthly city collections from other governments",
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
            let mut name = snake_label(&raw.replace('-', " "), &['.']);
            if name.starts_with("total_revenue_from") {
                name = TOTAL_ROW.to_string();
            } else if name.starts_with("other_authorized") {
                name = "other_authorized_adjustment".to_string();
            }
            frame.set_value(i, &label_col, CellValue::Text(name))?;
        }
        Ok(())
    }
}

impl EtlPipeline for CityOtherGovtsCollections {
    fn name(&self) -> &str {
        "CityOtherGovtsCollections"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        self.inner.extract_grid(ctx)
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        let frame = self.inner.base_transform(&raw)?;

        let start = frame.find_single("0", "U.S. GOVERNMENT", |v| {
            v.as_text().is_some_and(|t| START_RE.is_match(t))
        })?;
        let stop = frame.find_single("0", "TOTAL REVENUE FROM OTHER GOVERNMENTS", |v| {
            v.as_text().is_some_and(|t| STOP_RE.is_match(t))
        })?;
        if stop < start {
            return Err(FiscusError::parse(
                "other-governments section ends before it begins".to_string(),
            ));
        }
        let mut section = frame.slice_rows(start, stop);

        check_shape(
            &section,
            &ShapeCheck {
                rows: Some(vec![5, 7]),
                columns: None,
            },
        )?;

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
                "{}-{:02}-other-govts.csv",
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
            vec!["0".into()],
            vec![
                vec![CellValue::text("U.S. Government")],
                vec![CellValue::text("Other Authorized Adjust.")],
                vec![CellValue::text("TOTAL REVENUE FROM OTHER GOVERNMENTS")],
            ],
        )
        .unwrap();
        CityOtherGovtsCollections::canonicalize_names(&mut frame).unwrap();
        assert_eq!(frame.value(0, "0").unwrap().as_text(), Some("us_government"));
        assert_eq!(
            frame.value(1, "0").unwrap().as_text(),
            Some("other_authorized_adjustment")
        );
        assert_eq!(frame.value(2, "0").unwrap().as_text(), Some(TOTAL_ROW));
    }
}
