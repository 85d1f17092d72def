//! Report parameters and file-stem parsing.
//!
//! Raw file names encode their parameters by convention: `FY{yy}_Q{n}` for
//! quarterly reports, `FY{yy}` for annual ones, `{YYYY}_{MM}` for monthly
//! ones. Patterns are tried in that order and the first match wins.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use fiscus_core::error::{FiscusError, FiscusResult};

/// Budget-in-brief flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    Adopted,
    Proposed,
}

impl BudgetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetKind::Adopted => "adopted",
            BudgetKind::Proposed => "proposed",
        }
    }
}

impl fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetKind {
    type Err = FiscusError;

    fn from_str(s: &str) -> FiscusResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "adopted" => Ok(BudgetKind::Adopted),
            "proposed" => Ok(BudgetKind::Proposed),
            other => Err(FiscusError::schema(format!(
                "kind must be 'adopted' or 'proposed', got '{other}'"
            ))),
        }
    }
}

/// Parameters selecting one report instance. Unused fields stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportParams {
    pub fiscal_year: Option<i32>,
    pub quarter: Option<u32>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub kind: Option<BudgetKind>,
}

static QUARTERLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FY(?P<fy>[0-9]{2})[_-]Q(?P<q>[1234])").unwrap());
static ANNUAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FY(?P<fy>[0-9]{2})").unwrap());
static MONTHLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<year>[0-9]{4})[_-](?P<month>[0-9]{2})").unwrap());

/// Extract parameters from a raw file stem. Returns `None` when no naming
/// convention matches.
pub fn params_from_stem(stem: &str) -> Option<ReportParams> {
    if let Some(caps) = QUARTERLY_RE.captures(stem) {
        return Some(ReportParams {
            fiscal_year: Some(2000 + caps["fy"].parse::<i32>().ok()?),
            quarter: Some(caps["q"].parse().ok()?),
            ..ReportParams::default()
        });
    }
    if let Some(caps) = ANNUAL_RE.captures(stem) {
        return Some(ReportParams {
            fiscal_year: Some(2000 + caps["fy"].parse::<i32>().ok()?),
            ..ReportParams::default()
        });
    }
    if let Some(caps) = MONTHLY_RE.captures(stem) {
        let month: u32 = caps["month"].parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        return Some(ReportParams {
            year: Some(caps["year"].parse().ok()?),
            month: Some(month),
            ..ReportParams::default()
        });
    }
    None
}

impl ReportParams {
    /// Fill unset fields from `defaults`.
    pub fn merge(mut self, defaults: &ReportParams) -> ReportParams {
        self.fiscal_year = self.fiscal_year.or(defaults.fiscal_year);
        self.quarter = self.quarter.or(defaults.quarter);
        self.year = self.year.or(defaults.year);
        self.month = self.month.or(defaults.month);
        self.kind = self.kind.or(defaults.kind);
        self
    }

    /// Whether a raw file stem is selected by this filter. Unset fields
    /// match everything.
    pub fn selects_stem(&self, stem: &str) -> bool {
        if let Some(fy) = self.fiscal_year {
            if !stem.contains(&format!("FY{:02}", fy.rem_euclid(100))) {
                return false;
            }
        }
        if let Some(q) = self.quarter {
            if !stem.contains(&format!("Q{q}")) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if !stem.contains(&year.to_string()) {
                return false;
            }
        }
        if let Some(month) = self.month {
            if !stem.contains(&format!("{month:02}")) {
                return false;
            }
        }
        true
    }

    pub fn require_fiscal_year(&self) -> FiscusResult<i32> {
        self.fiscal_year
            .ok_or_else(|| FiscusError::schema("missing required parameter --fiscal-year"))
    }

    pub fn require_quarter(&self) -> FiscusResult<u32> {
        self.quarter
            .ok_or_else(|| FiscusError::schema("missing required parameter --quarter"))
    }

    pub fn require_year(&self) -> FiscusResult<i32> {
        self.year
            .ok_or_else(|| FiscusError::schema("missing required parameter --year"))
    }

    pub fn require_month(&self) -> FiscusResult<u32> {
        let month = self
            .month
            .ok_or_else(|| FiscusError::schema("missing required parameter --month"))?;
        if !(1..=12).contains(&month) {
            return Err(FiscusError::schema(format!("invalid month {month}")));
        }
        Ok(month)
    }

    pub fn require_kind(&self) -> FiscusResult<BudgetKind> {
        self.kind
            .ok_or_else(|| FiscusError::schema("missing required parameter --kind"))
    }

    /// Compact `key=value` rendering for logs and dedupe keys.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(v) = self.fiscal_year {
            parts.push(format!("fiscal_year={v}"));
        }
        if let Some(v) = self.quarter {
            parts.push(format!("quarter={v}"));
        }
        if let Some(v) = self.year {
            parts.push(format!("year={v}"));
        }
        if let Some(v) = self.month {
            parts.push(format!("month={v}"));
        }
        if let Some(v) = self.kind {
            parts.push(format!("kind={v}"));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarterly_stem() {
        let p = params_from_stem("FY21_Q2").unwrap();
        assert_eq!(p.fiscal_year, Some(2021));
        assert_eq!(p.quarter, Some(2));
        assert_eq!(p.year, None);

        let p = params_from_stem("FY08-Q4").unwrap();
        assert_eq!(p.fiscal_year, Some(2008));
        assert_eq!(p.quarter, Some(4));
    }

    #[test]
    fn test_annual_stem() {
        let p = params_from_stem("FY22").unwrap();
        assert_eq!(p.fiscal_year, Some(2022));
        assert_eq!(p.quarter, None);
    }

    #[test]
    fn test_monthly_stem() {
        let p = params_from_stem("2021_03").unwrap();
        assert_eq!(p.year, Some(2021));
        assert_eq!(p.month, Some(3));
        assert!(params_from_stem("2021_13").is_none());
    }

    #[test]
    fn test_first_pattern_wins() {
        // A quarterly stem also matches the annual prefix; quarterly is
        // tried first.
        let p = params_from_stem("FY21_Q2").unwrap();
        assert!(p.quarter.is_some());
    }

    #[test]
    fn test_unmatched_stem() {
        assert!(params_from_stem("notes").is_none());
    }

    #[test]
    fn test_selects_stem() {
        let filter = ReportParams {
            fiscal_year: Some(2021),
            ..ReportParams::default()
        };
        assert!(filter.selects_stem("FY21_Q2"));
        assert!(!filter.selects_stem("FY20_Q2"));

        let all = ReportParams::default();
        assert!(all.selects_stem("anything"));

        let monthly = ReportParams {
            year: Some(2021),
            month: Some(3),
            ..ReportParams::default()
        };
        assert!(monthly.selects_stem("2021_03"));
        assert!(!monthly.selects_stem("2021_04"));
    }

    #[test]
    fn test_merge_fills_gaps() {
        let from_stem = params_from_stem("FY21").unwrap();
        let cli = ReportParams {
            kind: Some(BudgetKind::Adopted),
            ..ReportParams::default()
        };
        let merged = from_stem.merge(&cli);
        assert_eq!(merged.fiscal_year, Some(2021));
        assert_eq!(merged.kind, Some(BudgetKind::Adopted));
    }

    #[test]
    fn test_budget_kind_parsing() {
        assert_eq!("Adopted".parse::<BudgetKind>().unwrap(), BudgetKind::Adopted);
        assert!("draft".parse::<BudgetKind>().is_err());
    }
}
