//! Attaching canonical department identities to long-form frames.

use fiscus_core::depts::{DeptResolver, Resolution};
use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::frame::{CellValue, Frame};

/// Replace the raw department column with the canonical identity columns
/// `dept_name_raw`, `dept_code`, `abbreviation`, `dept_name`, keeping the
/// remaining columns in order. An unknown spelling is a schema failure;
/// interactive resolution happens outside the pipeline and lands in the
/// department match cache.
pub(crate) fn merge_department_info(
    depts: &DeptResolver,
    frame: Frame,
    dept_col: &str,
) -> FiscusResult<Frame> {
    let dept_idx = frame
        .col_index(dept_col)
        .ok_or_else(|| FiscusError::schema(format!("unknown column '{dept_col}'")))?;

    let mut columns = vec![
        "dept_name_raw".to_string(),
        "dept_code".to_string(),
        "abbreviation".to_string(),
        "dept_name".to_string(),
    ];
    columns.extend(
        frame
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != dept_idx)
            .map(|(_, c)| c.clone()),
    );

    let mut out = Frame::new(columns);
    for row in frame.rows() {
        let raw_name = row[dept_idx].render();
        let info = match depts.resolve(&raw_name) {
            Resolution::Resolved(info) => info,
            Resolution::Unresolved => {
                return Err(FiscusError::schema(format!(
                    "no canonical department for '{raw_name}'; \
                     record a match in the department cache"
                )));
            }
        };
        let mut cells = vec![
            CellValue::text(raw_name),
            CellValue::text(info.dept_code),
            CellValue::text(info.abbreviation),
            CellValue::text(info.dept_name),
        ];
        cells.extend(
            row.iter()
                .enumerate()
                .filter(|(i, _)| *i != dept_idx)
                .map(|(_, v)| v.clone()),
        );
        out.push_row(cells)?;
    }
    Ok(out)
}
