//! The subtotal validation algebra.
//!
//! Reports declare sum-to-total assertions: a set of component categories
//! whose sum must equal a parsed total within an absolute tolerance, checked
//! per period column (wide form) or per period group (long form). The first
//! failing assertion aborts the pipeline; validation never mutates data.

use rust_decimal::Decimal;

use crate::error::{FiscusError, FiscusResult};
use crate::frame::Frame;

/// One sum-to-total assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct SumCheck {
    /// Category holding the parsed total.
    pub total: String,
    /// Categories that must sum to the total.
    pub components: Vec<String>,
    /// Absolute difference bound.
    pub tolerance: Decimal,
}

impl SumCheck {
    pub fn new(total: impl Into<String>, components: &[&str], tolerance: Decimal) -> Self {
        Self {
            total: total.into(),
            components: components.iter().map(|s| s.to_string()).collect(),
            tolerance,
        }
    }
}

/// Expected dimensions of a reconstructed table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeCheck {
    /// Accepted row counts; `None` skips the check.
    pub rows: Option<Vec<usize>>,
    /// Expected total column count; `None` skips the check.
    pub columns: Option<usize>,
}

/// Check a frame's dimensions against the declaration.
pub fn check_shape(frame: &Frame, shape: &ShapeCheck) -> FiscusResult<()> {
    if let Some(allowed) = &shape.rows {
        if !allowed.contains(&frame.nrows()) {
            return Err(FiscusError::parse(format!(
                "unexpected row count {}: expected one of {allowed:?}",
                frame.nrows()
            )));
        }
    }
    if let Some(expected) = shape.columns {
        if frame.ncols() != expected {
            return Err(FiscusError::parse(format!(
                "unexpected column count {}: expected {expected}",
                frame.ncols()
            )));
        }
    }
    Ok(())
}

/// Wide-form check: for each value column, rows whose `key_col` is in the
/// component set must sum to the single row keyed by the total, within the
/// tolerance.
pub fn check_row_totals(
    frame: &Frame,
    key_col: &str,
    check: &SumCheck,
    value_cols: &[&str],
) -> FiscusResult<()> {
    let key_idx = frame
        .col_index(key_col)
        .ok_or_else(|| FiscusError::schema(format!("unknown column '{key_col}'")))?;

    let total_row = frame.find_single(key_col, &format!("total row '{}'", check.total), |v| {
        v.as_text() == Some(check.total.as_str())
    })?;

    for col in value_cols {
        let summed = frame.sum_where(col, |f, i| {
            f.row(i).unwrap()[key_idx]
                .as_text()
                .is_some_and(|t| check.components.iter().any(|c| c == t))
        });
        let total = frame
            .value(total_row, col)
            .and_then(|v| v.as_number())
            .unwrap_or(Decimal::ZERO);
        let diff = (summed - total).abs();
        if diff > check.tolerance {
            return Err(FiscusError::validation(format!(
                "sum({}) != {} for column '{col}': {summed} vs {total} (diff {diff} > {})",
                check.components.join(" + "),
                check.total,
                check.tolerance
            )));
        }
    }
    Ok(())
}

/// Long-form check: within every distinct value of `group_col`, component
/// categories must sum to the total category within tolerance.
pub fn check_group_totals(
    frame: &Frame,
    category_col: &str,
    group_col: &str,
    value_col: &str,
    check: &SumCheck,
) -> FiscusResult<()> {
    let cat_idx = frame
        .col_index(category_col)
        .ok_or_else(|| FiscusError::schema(format!("unknown column '{category_col}'")))?;
    let group_idx = frame
        .col_index(group_col)
        .ok_or_else(|| FiscusError::schema(format!("unknown column '{group_col}'")))?;
    let value_idx = frame
        .col_index(value_col)
        .ok_or_else(|| FiscusError::schema(format!("unknown column '{value_col}'")))?;

    for group in frame.distinct(group_col) {
        let mut summed = Decimal::ZERO;
        let mut total: Option<Decimal> = None;
        for row in frame.rows() {
            if row[group_idx].render() != group {
                continue;
            }
            let Some(category) = row[cat_idx].as_text() else {
                continue;
            };
            let value = row[value_idx].as_number().unwrap_or(Decimal::ZERO);
            if category == check.total {
                total = Some(total.unwrap_or(Decimal::ZERO) + value);
            } else if check.components.iter().any(|c| c == category) {
                summed += value;
            }
        }
        let Some(total) = total else {
            return Err(FiscusError::validation(format!(
                "total category '{}' absent for group '{group}'",
                check.total
            )));
        };
        let diff = (summed - total).abs();
        if diff > check.tolerance {
            return Err(FiscusError::validation(format!(
                "sum({}) != {} for group '{group}': {summed} vs {total} (diff {diff} > {})",
                check.components.join(" + "),
                check.total,
                check.tolerance
            )));
        }
    }
    Ok(())
}

/// Require every distinct category to appear exactly `expected` times.
pub fn check_observation_counts(
    frame: &Frame,
    category_col: &str,
    expected: usize,
) -> FiscusResult<()> {
    let cat_idx = frame
        .col_index(category_col)
        .ok_or_else(|| FiscusError::schema(format!("unknown column '{category_col}'")))?;
    for category in frame.distinct(category_col) {
        let count = frame
            .rows()
            .filter(|r| r[cat_idx].render() == category)
            .count();
        if count != expected {
            return Err(FiscusError::validation(format!(
                "category '{category}' has {count} observations, expected {expected}"
            )));
        }
    }
    Ok(())
}
