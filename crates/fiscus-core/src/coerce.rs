//! Numeric coercion of cleaned cell text.
//!
//! Report cells arrive in accounting notation: `$1,234.50`, `(500.00)` for
//! negatives, `N/A` and `-` for absent values. Coercion strips the notation
//! and parses a signed [`Decimal`]; what it does with unparseable text
//! depends on the mode.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{FiscusError, FiscusResult};
use crate::frame::CellValue;

/// What to do when a cell fails to parse as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoercionMode {
    /// Unparseable cells become [`CellValue::Missing`].
    #[default]
    Coerce,
    /// Unparseable cells raise a coercion error.
    Strict,
}

/// Coerce one cell. Empty text, `N/A`, and a bare hyphen are missing in
/// either mode.
pub fn coerce_cell(raw: &str, mode: CoercionMode) -> FiscusResult<CellValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "N/A" || trimmed == "-" {
        return Ok(CellValue::Missing);
    }

    let mut s: String = trimmed
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    if s.ends_with(')') {
        s.pop();
    }
    if s.starts_with('(') {
        s.replace_range(0..1, "-");
    }

    match Decimal::from_str(&s) {
        Ok(value) => Ok(CellValue::Number(value)),
        Err(_) => match mode {
            CoercionMode::Coerce => Ok(CellValue::Missing),
            CoercionMode::Strict => Err(FiscusError::coercion(format!(
                "cannot coerce '{raw}' to a number"
            ))),
        },
    }
}

/// Turn a trailing European decimal comma into a period: `12,3` becomes
/// `12.3`. Thousands groups of three digits are left alone.
pub fn replace_commas(raw: &str) -> String {
    if let Some(pos) = raw.rfind(',') {
        let tail: &str = &raw[pos + 1..];
        let digits = tail.trim_end_matches(')');
        if !digits.is_empty()
            && digits.len() <= 2
            && digits.chars().all(|c| c.is_ascii_digit())
        {
            let mut out = String::with_capacity(raw.len());
            out.push_str(&raw[..pos]);
            out.push('.');
            out.push_str(tail);
            return out;
        }
    }
    raw.to_string()
}

/// Repair OCR output that lost its decimal point: strip everything except
/// digits, parentheses and minus signs, and when exactly one digit run
/// survives, re-insert a period before its final digit.
pub fn fix_decimals(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '(' | ')' | '-'))
        .collect();

    let runs: Vec<(usize, usize)> = digit_runs(&stripped);
    if runs.len() != 1 {
        return stripped;
    }
    let (start, end) = runs[0];
    if end - start < 2 {
        return stripped;
    }

    let mut out = String::with_capacity(stripped.len() + 1);
    out.push_str(&stripped[..end - 1]);
    out.push('.');
    out.push_str(&stripped[end - 1..]);
    out
}

/// Swap periods for commas; used when ingesting a source whose numbers were
/// already half-coerced.
pub fn decimal_to_comma(raw: &str) -> String {
    raw.replace('.', ",")
}

/// Replace letter O mis-reads with zeros.
pub fn fix_zeros(raw: &str) -> String {
    raw.replace(['O', 'o'], "0")
}

/// Strip a leading dollar sign.
pub fn strip_dollar_signs(raw: &str) -> String {
    raw.trim().trim_start_matches('$').to_string()
}

fn digit_runs(s: &str) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(st) = start.take() {
            runs.push((st, i));
        }
    }
    if let Some(st) = start {
        runs.push((st, s.len()));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn coerced(raw: &str) -> CellValue {
        coerce_cell(raw, CoercionMode::Coerce).unwrap()
    }

    #[test]
    fn test_currency_amounts() {
        assert_eq!(coerced("$1,234.00").as_number(), Some(dec!(1234.00)));
        assert_eq!(coerced("1,234,567"), CellValue::Number(dec!(1234567)));
        assert_eq!(coerced("12.5").as_number(), Some(dec!(12.5)));
    }

    #[test]
    fn test_accounting_negative() {
        assert_eq!(coerced("(500.00)").as_number(), Some(dec!(-500.00)));
        assert_eq!(coerced("(1,234.50)").as_number(), Some(dec!(-1234.50)));
    }

    #[test]
    fn test_missing_sentinels() {
        assert!(coerced("").is_missing());
        assert!(coerced("N/A").is_missing());
        assert!(coerced("-").is_missing());
    }

    #[test]
    fn test_mode_difference() {
        assert!(coerced("garbled").is_missing());
        assert!(coerce_cell("garbled", CoercionMode::Strict).is_err());
    }

    #[test]
    fn test_round_trip() {
        for value in [dec!(1234.50), dec!(-1234.50), dec!(0.07)] {
            let formatted = if value.is_sign_negative() {
                format!("({})", format_thousands(-value))
            } else {
                format!("${}", format_thousands(value))
            };
            assert_eq!(coerced(&formatted).as_number(), Some(value), "{formatted}");
        }
    }

    fn format_thousands(value: Decimal) -> String {
        let s = value.to_string();
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s.as_str(), ""));
        let mut grouped = String::new();
        for (i, c) in int_part.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let int_grouped: String = grouped.chars().rev().collect();
        if frac_part.is_empty() {
            int_grouped
        } else {
            format!("{int_grouped}.{frac_part}")
        }
    }

    #[test]
    fn test_replace_commas() {
        assert_eq!(replace_commas("12,3"), "12.3");
        assert_eq!(replace_commas("1,234"), "1,234");
        assert_eq!(replace_commas("(12,3)"), "(12.3)");
        assert_eq!(replace_commas("1,234,56"), "1,234.56");
        assert_eq!(replace_commas("plain"), "plain");
    }

    #[test]
    fn test_fix_decimals() {
        assert_eq!(fix_decimals("1 234 5"), "1234.5");
        assert_eq!(fix_decimals("(20345)"), "(2034.5)");
        // Two digit runs: ambiguous, leave the stripped text alone.
        assert_eq!(fix_decimals("12-34"), "12-34");
        assert_eq!(fix_decimals("7"), "7");
    }

    #[test]
    fn test_fix_zeros_and_dollar() {
        assert_eq!(fix_zeros("1O3"), "103");
        assert_eq!(fix_zeros("2oo"), "200");
        assert_eq!(strip_dollar_signs(" $450"), "450");
    }

    #[test]
    fn test_decimal_to_comma() {
        assert_eq!(decimal_to_comma("1.5"), "1,5");
    }
}
