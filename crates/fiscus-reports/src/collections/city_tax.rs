//! Monthly city tax collections.

use std::path::PathBuf;

use rust_decimal_macros::dec;

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};
use fiscus_core::validate::{check_row_totals, check_shape, ShapeCheck, SumCheck};
use fiscus_runtime::{
    Context, CropStrategy, EtlPipeline, ParamSpec, ReportDescriptor, ReportEntry, ReportGroup,
    ReportParams,
};

use super::city::MonthlyCity;
use crate::labels::rename_tax_rows;

/// Taxes whose monthly totals must sum to the all-taxes line.
const TAXES: [&str; 14] = [
    "real_estate",
    "wage_city",
    "earnings_city",
    "net_profits_city",
    "birt",
    "sales",
    "amusement",
    "tobacco",
    "parking",
    "valet",
    "real_estate_transfer",
    "outdoor_ads",
    "soda",
    "other_taxes",
];

const OTHER_TAXES: [&str; 7] = [
    "sales",
    "amusement",
    "tobacco",
    "parking",
    "valet",
    "real_estate_transfer",
    "outdoor_ads",
];

/// Monthly City Tax Collections Report.
pub struct CityTaxCollections {
    inner: MonthlyCity,
}

impl CityTaxCollections {
    pub fn new(ctx: &Context, params: &ReportParams) -> FiscusResult<Self> {
        Ok(Self {
            inner: MonthlyCity::resolve(ctx, params)?,
        })
    }

    pub fn descriptor() -> ReportDescriptor {
        ReportDescriptor {
            name: "CityTaxCollections",
            group: ReportGroup::Collections,
            params: ParamSpec::YearMonth,
            raw_subdir: "collections/monthly/city",
            crop: CropStrategy::FullPage,
            description: "Monthly city tax collections by tax type",
        }
    }

    pub fn entry() -> ReportEntry {
        ReportEntry {
            descriptor: Self::descriptor(),
            build: |ctx, params| Ok(Box::new(Self::new(ctx, params)?)),
        }
    }

    /// Assign the canonical tax row names: triplets of
    /// current/prior/total for each tax, the combined wage lines, and the
    /// tail that varies with the soda-tax era.
    fn assign_row_names(frame: &mut Frame) -> FiscusResult<()> {
        let label_col = frame.columns()[0].clone();
        let mut index = rename_tax_rows(frame, 0, &["real_estate", "wage_city", "wage_pica"])?;
        frame.set_value(index, &label_col, CellValue::text("wage_total"))?;
        index += 1;

        index = rename_tax_rows(frame, index, &["earnings_city", "earnings_pica"])?;
        frame.set_value(index, &label_col, CellValue::text("earnings_total"))?;
        index += 1;

        index = rename_tax_rows(frame, index, &["net_profits_city", "net_profits_pica"])?;
        frame.set_value(index, &label_col, CellValue::text("net_profits_total"))?;
        index += 1;

        for suffix in ["total", "pica_total", "city_total"] {
            frame.set_value(
                index,
                &label_col,
                CellValue::text(format!("wage_earnings_net_profits_{suffix}")),
            )?;
            index += 1;
        }

        index = rename_tax_rows(frame, index, &["birt"])?;

        for name in OTHER_TAXES {
            frame.set_value(index, &label_col, CellValue::text(format!("{name}_total")))?;
            index += 1;
        }

        let remaining: &[&str] = match frame.nrows() {
            42 => &[
                "soda_current",
                "soda_prior",
                "soda_total",
                "other_taxes_total",
                "all_taxes_total",
            ],
            40 => &["soda_total", "other_taxes_total", "all_taxes_total"],
            _ => &["other_taxes_total", "all_taxes_total"],
        };
        for name in remaining {
            frame.set_value(index, &label_col, CellValue::text(*name))?;
            index += 1;
        }
        Ok(())
    }

    /// Split `{name}_{kind}` row labels into separate name and kind
    /// columns.
    fn split_kind(frame: &mut Frame) -> FiscusResult<()> {
        let mut kinds = Vec::with_capacity(frame.nrows());
        let mut names = Vec::with_capacity(frame.nrows());
        for row in frame.rows() {
            let label = row[0].render();
            let (name, kind) = label
                .rsplit_once('_')
                .map(|(n, k)| (n.to_string(), k.to_string()))
                .unwrap_or((label.clone(), String::new()));
            names.push(CellValue::Text(name));
            kinds.push(CellValue::Text(kind));
        }
        for (i, name) in names.into_iter().enumerate() {
            frame.set_value(i, "name", name)?;
        }
        frame.push_column("kind", kinds)?;
        Ok(())
    }
}

impl EtlPipeline for CityTaxCollections {
    fn name(&self) -> &str {
        "CityTaxCollections"
    }

    fn extract(&mut self, ctx: &Context) -> FiscusResult<Frame> {
        self.inner.extract_grid(ctx)
    }

    fn transform(&mut self, _ctx: &Context, raw: Frame) -> FiscusResult<Frame> {
        let frame = self.inner.base_transform(&raw)?;

        // Crop to the tax section, which ends at the grand total line.
        let stop = frame.find_single("0", "TOTAL TAX REVENUE", |v| {
            v.as_text().is_some_and(|t| t.contains("TOTAL TAX REVENUE"))
        })?;
        let mut tax = frame.slice_rows(0, stop);
        tax.drop_missing_columns();

        tax.retain_rows(|row| {
            row[0]
                .as_text()
                .map_or(true, |t| !t.contains("DATA WAREHOUSE"))
        });

        let mut tax = self.inner.label_trailing_columns(&tax)?;
        let data_cols: Vec<String> = tax.columns()[1..].to_vec();
        let refs: Vec<&str> = data_cols.iter().map(String::as_str).collect();
        tax.drop_missing_rows(Some(&refs));

        check_shape(
            &tax,
            &ShapeCheck {
                rows: Some(vec![39, 40, 42]),
                columns: Some(8),
            },
        )?;

        Self::assign_row_names(&mut tax)?;
        Self::split_kind(&mut tax)?;
        Ok(tax)
    }

    fn validate(&self, data: &Frame) -> FiscusResult<()> {
        let kind_idx = data
            .col_index("kind")
            .ok_or_else(|| FiscusError::schema("missing 'kind' column"))?;
        let mut totals = data.clone();
        totals.retain_rows(|row| row[kind_idx].as_text() == Some("total"));

        let month_cols = self.inner.month_columns()?;
        let refs: Vec<&str> = month_cols.iter().map(String::as_str).collect();
        let check = SumCheck::new("all_taxes", &TAXES, dec!(5));
        check_row_totals(&totals, "name", &check, &refs)
    }

    fn output_path(&self, ctx: &Context) -> PathBuf {
        ctx.processed_root()
            .join("collections/monthly/city")
            .join(format!(
                "{}-{:02}-tax.csv",
                self.inner.year, self.inner.month
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_rows(n: usize) -> Frame {
        Frame::with_rows(
            vec!["0".into(), "1".into()],
            (0..n)
                .map(|i| {
                    vec![
                        CellValue::text(format!("raw{i}")),
                        CellValue::Number(rust_decimal::Decimal::from(i as i64)),
                    ]
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_assign_row_names_39() {
        let mut frame = frame_with_rows(39);
        CityTaxCollections::assign_row_names(&mut frame).unwrap();
        assert_eq!(
            frame.value(0, "0").unwrap().as_text(),
            Some("real_estate_current")
        );
        assert_eq!(frame.value(9, "0").unwrap().as_text(), Some("wage_total"));
        assert_eq!(
            frame.value(38, "0").unwrap().as_text(),
            Some("all_taxes_total")
        );
        assert_eq!(
            frame.value(37, "0").unwrap().as_text(),
            Some("other_taxes_total")
        );
    }

    #[test]
    fn test_assign_row_names_42_includes_soda() {
        let mut frame = frame_with_rows(42);
        CityTaxCollections::assign_row_names(&mut frame).unwrap();
        assert_eq!(
            frame.value(37, "0").unwrap().as_text(),
            Some("soda_current")
        );
        assert_eq!(
            frame.value(41, "0").unwrap().as_text(),
            Some("all_taxes_total")
        );
    }
}
