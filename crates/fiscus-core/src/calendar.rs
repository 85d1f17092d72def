//! The July-to-June fiscal calendar.
//!
//! The fiscal year is named for the calendar year it ends in: July 2020
//! opens fiscal 2021. Fiscal months count from July = 1.

use chrono::NaiveDate;

use crate::error::{FiscusError, FiscusResult};

/// Fiscal year containing the given calendar month.
pub fn fiscal_year_of(month: u32, calendar_year: i32) -> i32 {
    if month < 7 {
        calendar_year
    } else {
        calendar_year + 1
    }
}

/// Fiscal month number, with July = 1 and June = 12.
pub fn fiscal_month_of(month: u32) -> u32 {
    (month + 5) % 12 + 1
}

/// Fiscal quarter containing the given calendar month.
pub fn fiscal_quarter_of(month: u32) -> u32 {
    (fiscal_month_of(month) - 1) / 3 + 1
}

/// Lower-case three letter month abbreviation, `jan` through `dec`.
pub fn month_abbr(month: u32) -> FiscusResult<&'static str> {
    const ABBR: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    ABBR.get(month.checked_sub(1).unwrap_or(12) as usize)
        .copied()
        .ok_or_else(|| FiscusError::schema(format!("invalid calendar month {month}")))
}

/// Two-digit fiscal year tag, e.g. 2021 -> `21`.
pub fn fy_tag(fiscal_year: i32) -> String {
    format!("{:02}", fiscal_year.rem_euclid(100))
}

/// Closing date of the given quarter of a fiscal year.
pub fn quarter_end(fiscal_year: i32, quarter: u32) -> FiscusResult<NaiveDate> {
    let (year, month, day) = match quarter {
        1 => (fiscal_year - 1, 9, 30),
        2 => (fiscal_year - 1, 12, 31),
        3 => (fiscal_year, 3, 31),
        4 => (fiscal_year, 6, 30),
        _ => {
            return Err(FiscusError::schema(format!(
                "invalid fiscal quarter {quarter}"
            )))
        }
    };
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| FiscusError::schema(format!("invalid date {year}-{month}-{day}")))
}

/// Closing date of a full fiscal year (June 30).
pub fn fiscal_year_end(fiscal_year: i32) -> FiscusResult<NaiveDate> {
    quarter_end(fiscal_year, 4)
}
