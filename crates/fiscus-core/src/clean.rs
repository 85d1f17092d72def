//! The cell-cleaning pipeline.
//!
//! Every pass is a total, pure `Grid -> Grid` transform; a report composes
//! an ordered list of passes with a fold and the order is load-bearing (the
//! percent strip must run before numeric coercion, missing-row removal must
//! run after it). Cleaners never fail: unrecognizable text flows through
//! and is handled by coercion.
//!
//! Column 0 is the row-header column; passes that talk about "data columns"
//! leave it untouched.

use crate::coerce::{
    self, coerce_cell, decimal_to_comma, fix_zeros, replace_commas, strip_dollar_signs,
    CoercionMode,
};
use crate::error::FiscusResult;
use crate::frame::{CellValue, Frame};
use crate::grid::Grid;

/// One step of the cleaning pipeline, applied cell-wise unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridPass {
    /// Drop rows whose first-column text begins with `*`.
    RemoveFootnotes,
    /// Collapse OCR character stutter on rows detected via the second
    /// column.
    FixDuplicatedChars,
    /// Strip all whitespace inside data cells.
    RemoveSpaces,
    /// `((` becomes `(`, `))` becomes `)`.
    FixDuplicateParens,
    /// Strip trailing percent signs from data cells.
    FixPercentages,
    /// Map `N/A` and `-` placeholders to the empty (missing) cell.
    ReplaceMissingCells,
    /// Drop ASCII uppercase letters (footnote-marker artifacts) from the
    /// given column.
    RemoveExtraLetters(usize),
    /// Strip leading dollar signs from data cells.
    StripDollarSigns,
    /// Turn a trailing European decimal comma into a period.
    ReplaceCommas,
    /// Re-insert a lost decimal point into a single digit run.
    FixDecimals,
    /// Swap periods for commas in half-coerced sources.
    DecimalToComma,
    /// Replace letter-O mis-reads with zeros.
    FixZeros,
}

impl GridPass {
    /// Apply this pass to a grid.
    pub fn apply(&self, mut grid: Grid) -> Grid {
        let data_cols = 1..grid.ncols();
        match self {
            GridPass::RemoveFootnotes => {
                grid.retain_rows(|row| {
                    row.first().map_or(true, |c| !c.trim().starts_with('*'))
                });
            }
            GridPass::FixDuplicatedChars => fix_duplicated_chars(&mut grid),
            GridPass::RemoveSpaces => {
                grid.map_cells_in(data_cols, |s| {
                    s.chars().filter(|c| !c.is_whitespace()).collect()
                });
            }
            GridPass::FixDuplicateParens => {
                grid.map_cells_in(data_cols, |s| {
                    s.replace("((", "(").replace("))", ")")
                });
            }
            GridPass::FixPercentages => {
                grid.map_cells_in(data_cols, |s| {
                    s.trim().trim_end_matches('%').to_string()
                });
            }
            GridPass::ReplaceMissingCells => {
                grid.map_cells_in(data_cols, |s| {
                    if s == "N/A" || s == "-" {
                        String::new()
                    } else {
                        s.to_string()
                    }
                });
            }
            GridPass::RemoveExtraLetters(col) => {
                grid.map_cells_in(std::iter::once(*col), |s| {
                    s.chars().filter(|c| !c.is_ascii_uppercase()).collect()
                });
            }
            GridPass::StripDollarSigns => {
                grid.map_cells_in(data_cols, strip_dollar_signs);
            }
            GridPass::ReplaceCommas => {
                grid.map_cells_in(data_cols, replace_commas);
            }
            GridPass::FixDecimals => {
                grid.map_cells_in(data_cols, coerce::fix_decimals);
            }
            GridPass::DecimalToComma => {
                grid.map_cells_in(data_cols, decimal_to_comma);
            }
            GridPass::FixZeros => {
                grid.map_cells_in(data_cols, fix_zeros);
            }
        }
        grid
    }
}

/// Fold an ordered pass list over a grid.
pub fn apply_passes(grid: Grid, passes: &[GridPass]) -> Grid {
    passes.iter().fold(grid, |g, pass| pass.apply(g))
}

/// The shared pass order for the monthly collections family.
pub fn monthly_collection_passes() -> Vec<GridPass> {
    vec![
        GridPass::RemoveFootnotes,
        GridPass::FixDuplicatedChars,
        GridPass::RemoveSpaces,
        GridPass::FixDuplicateParens,
        GridPass::FixPercentages,
        GridPass::ReplaceMissingCells,
        GridPass::RemoveExtraLetters(1),
    ]
}

/// Coerce a cleaned grid into a typed frame: column 0 stays text, every
/// data column parses as a number. Rows whose data cells are all missing
/// are dropped afterwards via [`Frame::drop_missing_rows`] by the caller
/// that knows its id columns.
pub fn coerce_to_frame(grid: &Grid, mode: CoercionMode) -> FiscusResult<Frame> {
    let mut rows = Vec::with_capacity(grid.nrows());
    for row in grid.rows() {
        let mut out = Vec::with_capacity(row.len());
        for (col, cell) in row.iter().enumerate() {
            if col == 0 {
                if cell.trim().is_empty() {
                    out.push(CellValue::Missing);
                } else {
                    out.push(CellValue::Text(cell.trim().to_string()));
                }
            } else {
                out.push(coerce_cell(cell, mode)?);
            }
        }
        rows.push(out);
    }
    let columns = (0..grid.ncols()).map(|i| i.to_string()).collect();
    Frame::with_rows(columns, rows)
}

// A row is OCR stutter when collapsing every repeated-character run in its
// second column leaves nothing behind; the repair collapses runs of two or
// three identical characters to one across the whole row.
fn fix_duplicated_chars(grid: &mut Grid) {
    let stuttered: Vec<usize> = grid
        .rows()
        .enumerate()
        .filter(|(_, row)| {
            row.get(1).is_some_and(|c| {
                !c.is_empty() && strip_repeated_runs(c).replace(',', "").is_empty()
            })
        })
        .map(|(i, _)| i)
        .collect();

    for index in stuttered {
        grid.map_row(index, collapse_runs);
    }
}

fn is_stutter_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '%' | ',' | '.')
}

/// Delete every run of two or more identical stutter-class characters.
fn strip_repeated_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        if !(is_stutter_char(c) && run >= 2) {
            for _ in 0..run {
                out.push(c);
            }
        }
        i += run;
    }
    out
}

/// Collapse runs of two or three identical stutter-class characters to one;
/// longer runs shrink proportionally.
fn collapse_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        let keep = if is_stutter_char(c) {
            run.div_ceil(3)
        } else {
            run
        };
        for _ in 0..keep {
            out.push(c);
        }
        i += run;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_remove_footnotes() {
        let g = grid(&[&["Wage", "1"], &["* Preliminary", ""]]);
        let cleaned = GridPass::RemoveFootnotes.apply(g);
        assert_eq!(cleaned.nrows(), 1);
    }

    #[test]
    fn test_remove_spaces_data_columns_only() {
        let g = grid(&[&["Real Estate", "1 234"]]);
        let cleaned = GridPass::RemoveSpaces.apply(g);
        assert_eq!(cleaned.get(0, 0), Some("Real Estate"));
        assert_eq!(cleaned.get(0, 1), Some("1234"));
    }

    #[test]
    fn test_fix_duplicate_parens_and_percent() {
        let g = grid(&[&["Wage", "((500))", "98.6%"]]);
        let cleaned = apply_passes(
            g,
            &[GridPass::FixDuplicateParens, GridPass::FixPercentages],
        );
        assert_eq!(cleaned.get(0, 1), Some("(500)"));
        assert_eq!(cleaned.get(0, 2), Some("98.6"));
    }

    #[test]
    fn test_replace_missing_cells() {
        let g = grid(&[&["Wage", "N/A", "-", "7"]]);
        let cleaned = GridPass::ReplaceMissingCells.apply(g);
        assert_eq!(cleaned.get(0, 1), Some(""));
        assert_eq!(cleaned.get(0, 2), Some(""));
        assert_eq!(cleaned.get(0, 3), Some("7"));
    }

    #[test]
    fn test_remove_extra_letters() {
        let g = grid(&[&["Wage", "1,234A"]]);
        let cleaned = GridPass::RemoveExtraLetters(1).apply(g);
        assert_eq!(cleaned.get(0, 1), Some("1,234"));
    }

    #[test]
    fn test_fix_duplicated_chars_detects_stutter() {
        // Second column is pure stutter, so the whole row collapses.
        let g = grid(&[&["WWaaggee", "11,,223344", "5566"]]);
        let cleaned = GridPass::FixDuplicatedChars.apply(g);
        assert_eq!(cleaned.get(0, 0), Some("Wage"));
        assert_eq!(cleaned.get(0, 1), Some("1,234"));
        assert_eq!(cleaned.get(0, 2), Some("56"));
    }

    #[test]
    fn test_fix_duplicated_chars_leaves_clean_rows() {
        let g = grid(&[&["Committee", "1,100"]]);
        let cleaned = GridPass::FixDuplicatedChars.apply(g);
        assert_eq!(cleaned.get(0, 0), Some("Committee"));
        assert_eq!(cleaned.get(0, 1), Some("1,100"));
    }

    #[test]
    fn test_coerce_to_frame() {
        let g = grid(&[&["Wage", "$1,234.00", ""], &["Sales", "(500)", "12.5"]]);
        let frame = coerce_to_frame(&g, CoercionMode::Coerce).unwrap();
        assert_eq!(frame.value(0, "1").unwrap().as_number(), Some(dec!(1234.00)));
        assert!(frame.value(0, "2").unwrap().is_missing());
        assert_eq!(frame.value(1, "1").unwrap().as_number(), Some(dec!(-500)));
        assert_eq!(frame.value(0, "0").unwrap().as_text(), Some("Wage"));
    }

    #[test]
    fn test_pipeline_is_stable() {
        let passes = monthly_collection_passes();
        let g = grid(&[
            &["Wage Tax", " 1 234 ", "98.6%", "N/A"],
            &["* footnote", "", "", ""],
            &["Sales", "((500))", "-", "77A"],
        ]);
        let once = apply_passes(g.clone(), &passes);
        let twice = apply_passes(once.clone(), &passes);
        assert_eq!(once, twice);
    }
}
