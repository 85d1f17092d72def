//! Column and row labeling helpers shared across report families.

use fiscus_core::calendar::{fiscal_year_of, fy_tag, month_abbr};
use fiscus_core::error::FiscusResult;
use fiscus_core::frame::{CellValue, Frame};

/// The nine value columns of a monthly collections report, derived from the
/// report's calendar month and year: prior/current budget figures, the two
/// month columns, year-to-date columns, and the summary columns.
pub fn collection_column_names(month: u32, year: i32) -> FiscusResult<Vec<String>> {
    let fiscal_year = fiscal_year_of(month, year);
    let mon = month_abbr(month)?;
    let this_year = format!("fy{}", fy_tag(fiscal_year));
    let last_year = format!("fy{}", fy_tag(fiscal_year - 1));

    Ok(vec![
        format!("{last_year}_actual"),
        format!("{this_year}_budgeted"),
        format!("{mon}_{this_year}"),
        format!("{mon}_{last_year}"),
        format!("{this_year}_ytd"),
        format!("{last_year}_ytd"),
        "net_change".to_string(),
        "budget_requirement".to_string(),
        "pct_budgeted".to_string(),
    ])
}

/// Rename consecutive row triplets `{name}_current`, `{name}_prior`,
/// `{name}_total` starting at `index` in the frame's first column; returns
/// the index just past the renamed rows.
pub fn rename_tax_rows(
    frame: &mut Frame,
    mut index: usize,
    names: &[&str],
) -> FiscusResult<usize> {
    const SUFFIXES: [&str; 3] = ["current", "prior", "total"];
    let label_col = frame.columns()[0].clone();
    for name in names {
        for (offset, suffix) in SUFFIXES.iter().enumerate() {
            frame.set_value(
                index + offset,
                &label_col,
                CellValue::text(format!("{name}_{suffix}")),
            )?;
        }
        index += 3;
    }
    Ok(index)
}

/// Snake-case a printed category label: lower-case, `&` to `and`, listed
/// characters dropped, whitespace runs collapsed to underscores.
pub fn snake_label(raw: &str, drop: &[char]) -> String {
    let lowered = raw.trim().to_lowercase().replace('&', "and");
    let cleaned: String = lowered
        .chars()
        .filter(|c| !drop.contains(c))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_column_names() {
        let names = collection_column_names(3, 2021).unwrap();
        assert_eq!(
            names,
            vec![
                "fy20_actual",
                "fy21_budgeted",
                "mar_fy21",
                "mar_fy20",
                "fy21_ytd",
                "fy20_ytd",
                "net_change",
                "budget_requirement",
                "pct_budgeted",
            ]
        );

        // A July report belongs to the next fiscal year.
        let names = collection_column_names(7, 2021).unwrap();
        assert_eq!(names[2], "jul_fy22");
        assert_eq!(names[3], "jul_fy21");
    }

    #[test]
    fn test_rename_tax_rows() {
        let mut frame = Frame::with_rows(
            vec!["0".into(), "1".into()],
            (0..7)
                .map(|i| vec![CellValue::text(format!("row{i}")), CellValue::Missing])
                .collect(),
        )
        .unwrap();
        let next = rename_tax_rows(&mut frame, 0, &["real_estate", "wage_city"]).unwrap();
        assert_eq!(next, 6);
        assert_eq!(
            frame.value(0, "0").unwrap().as_text(),
            Some("real_estate_current")
        );
        assert_eq!(
            frame.value(2, "0").unwrap().as_text(),
            Some("real_estate_total")
        );
        assert_eq!(frame.value(5, "0").unwrap().as_text(), Some("wage_city_total"));
        assert_eq!(frame.value(6, "0").unwrap().as_text(), Some("row6"));
    }

    #[test]
    fn test_snake_label() {
        assert_eq!(
            snake_label("Licenses & Inspections", &[]),
            "licenses_and_inspections"
        );
        assert_eq!(
            snake_label("U.S. Govt - Other", &['.', '-']),
            "us_govt_other"
        );
    }
}
