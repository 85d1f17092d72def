//! Table recovery: turn a cloud of positioned tokens into a dense grid.
//!
//! The pass works from geometry alone. Tokens are clustered into lines on
//! their bottom edge, split into row headers (alphabetic-leading first token)
//! and a numeric data pool, and the pool is clustered into column stacks on
//! the right edge. Each data token is then assigned to the mutually nearest
//! row header within tolerance, which resolves the ambiguity of a token
//! sitting between two cramped lines.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::geometry::{
    drop_alpha_columns, drop_orphan_columns, fuzzy_group_by, merge_close_columns, merge_phrases,
    Axis, Cluster,
};
use crate::grid::Grid;
use crate::token::Token;

/// Clustering tolerances for one reconstruction pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableParams {
    /// Horizontal gap below which adjacent tokens merge into a phrase.
    pub text_tolerance_x: f64,
    /// Vertical tolerance when grouping tokens into lines.
    pub text_tolerance_y: f64,
    /// Tolerance when grouping data tokens into columns by right edge.
    pub column_tolerance: f64,
    /// Minimum separation between adjacent column pivots; closer columns
    /// merge.
    pub min_col_sep: f64,
    /// Maximum vertical distance for a data token to claim a row header.
    pub row_header_tolerance: f64,
}

impl Default for TableParams {
    fn default() -> Self {
        Self {
            text_tolerance_x: 3.0,
            text_tolerance_y: 5.0,
            column_tolerance: 20.0,
            min_col_sep: 24.0,
            row_header_tolerance: 10.0,
        }
    }
}

// Accepts signed integers with thousands separators, decimals, percentages,
// currency amounts, a bare hyphen placeholder, or N/A, optionally
// parenthesized. Matched against the token text with spaces removed; a
// leading match is enough since stray footnote markers can trail the number.
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(?\$?-?(\d+(?:\.\d+)?%|\d{1,3}(?:,\d{3})*(?:\.\d+)?|-|N/A)\)?").unwrap()
});

/// Whether a token looks like table data rather than label text.
pub fn looks_numeric(text: &str) -> bool {
    let squeezed: String = text.chars().filter(|c| *c != ' ').collect();
    NUMERIC_RE.is_match(&squeezed)
}

/// Reconstruct a dense grid from a token set.
///
/// Column 0 of the result carries the row-header text; value columns follow
/// in page order. An empty token set yields an empty grid, and a table whose
/// every candidate column was cleaned away yields a header-only grid.
pub fn tokens_to_grid(tokens: &[Token], params: &TableParams) -> Grid {
    if tokens.is_empty() {
        return Grid::default();
    }

    let lines = fuzzy_group_by(
        tokens,
        Axis::Bottom,
        params.text_tolerance_y,
        params.text_tolerance_y,
    );

    let mut headers: Vec<Token> = Vec::new();
    let mut pool: Vec<Token> = Vec::new();

    for line in lines {
        let row = merge_phrases(line.tokens, params.text_tolerance_x);
        let Some(first) = row.first() else { continue };

        // Footnote lines carry no table data.
        if first.text().starts_with('*') {
            continue;
        }

        if first.text().chars().next().is_some_and(char::is_alphabetic) {
            headers.push(row[0].clone());
            pool.extend(row.into_iter().skip(1).filter(|t| looks_numeric(t.text())));
        } else {
            pool.extend(row);
        }
    }

    let columns = fuzzy_group_by(
        &pool,
        Axis::RightEdge,
        params.column_tolerance,
        params.column_tolerance,
    );
    let columns = drop_orphan_columns(columns);
    let columns = merge_close_columns(columns, params.min_col_sep);
    let columns = drop_alpha_columns(columns);
    tracing::debug!(
        headers = headers.len(),
        columns = columns.len(),
        pool = pool.len(),
        "reconstructed table layout"
    );

    let mut grid = assemble(&headers, &columns, params.row_header_tolerance);
    grid.replace_cells("-", "");
    grid.drop_empty_columns();
    grid
}

/// Fill the header/column grid using mutual-nearest matching.
fn assemble(headers: &[Token], columns: &[Cluster], match_tol: f64) -> Grid {
    let mut grid = Grid::new(headers.len(), columns.len() + 1);
    for (r, h) in headers.iter().enumerate() {
        grid.set(r, 0, h.text());
    }

    for (c, column) in columns.iter().enumerate() {
        for (r, header) in headers.iter().enumerate() {
            // Candidate tokens close enough to this header, nearest first.
            let mut candidates: Vec<&Token> = column
                .tokens
                .iter()
                .filter(|t| (t.top() - header.top()).abs() <= match_tol)
                .collect();
            candidates
                .sort_by(|a, b| {
                    let da = (a.top() - header.top()).abs();
                    let db = (b.top() - header.top()).abs();
                    da.total_cmp(&db)
                });

            // A token within tolerance of two headers belongs to whichever
            // is closer; ties go to the topmost header.
            for token in candidates {
                if nearest_header(headers, token.top()) == r {
                    grid.set(r, c + 1, token.text());
                    break;
                }
            }
        }
    }
    grid
}

fn nearest_header(headers: &[Token], token_top: f64) -> usize {
    let mut best = 0;
    let mut best_diff = f64::INFINITY;
    for (i, h) in headers.iter().enumerate() {
        let diff = (h.top() - token_top).abs();
        if diff < best_diff {
            best = i;
            best_diff = diff;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(x0: f64, x1: f64, top: f64, bottom: f64, text: &str) -> Token {
        Token::new(x0, x1, top, bottom, text).unwrap()
    }

    #[test]
    fn test_looks_numeric() {
        for text in [
            "1,234",
            "1,234.56",
            "(1,234)",
            "12.3%",
            "(12.3%)",
            "-",
            "N/A",
            "1 234",
            "$1,234.00",
            "(500.00)",
        ] {
            assert!(looks_numeric(text), "{text} should look numeric");
        }
        for text in ["Wage", "Total", "FY21"] {
            assert!(!looks_numeric(text), "{text} should not look numeric");
        }
    }

    #[test]
    fn test_single_row_two_columns() {
        let tokens = vec![
            tok(0.0, 40.0, 100.0, 112.0, "Wage"),
            tok(200.0, 260.0, 101.0, 113.0, "$1,234.00"),
        ];
        let params = TableParams {
            row_header_tolerance: 20.0,
            ..TableParams::default()
        };
        let grid = tokens_to_grid(&tokens, &params);
        assert_eq!(grid.nrows(), 1);
        assert_eq!(grid.ncols(), 2);
        assert_eq!(grid.get(0, 0), Some("Wage"));
        assert_eq!(grid.get(0, 1), Some("$1,234.00"));
    }

    #[test]
    fn test_empty_input_yields_empty_grid() {
        let grid = tokens_to_grid(&[], &TableParams::default());
        assert!(grid.is_empty());
        assert_eq!(grid.ncols(), 0);
    }

    #[test]
    fn test_header_only_when_no_columns_survive() {
        // A single header line and no data tokens at all.
        let tokens = vec![tok(0.0, 60.0, 100.0, 112.0, "Departments")];
        let grid = tokens_to_grid(&tokens, &TableParams::default());
        assert_eq!(grid.nrows(), 1);
        assert_eq!(grid.ncols(), 1);
        assert_eq!(grid.get(0, 0), Some("Departments"));
    }

    #[test]
    fn test_header_row_preserved_with_empty_cells() {
        // Two headers, but only the first has a value; the second keeps an
        // empty data cell rather than vanishing.
        let tokens = vec![
            tok(0.0, 40.0, 100.0, 112.0, "Wage"),
            tok(200.0, 260.0, 101.0, 113.0, "1,000"),
            tok(0.0, 40.0, 140.0, 152.0, "Sales"),
        ];
        let params = TableParams {
            row_header_tolerance: 20.0,
            ..TableParams::default()
        };
        let grid = tokens_to_grid(&tokens, &params);
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.get(0, 1), Some("1,000"));
        assert_eq!(grid.get(1, 1), Some(""));
    }

    #[test]
    fn test_token_between_two_headers_goes_to_nearest() {
        // The value at top=118 is within tolerance of both headers but
        // closer to the second.
        let tokens = vec![
            tok(0.0, 40.0, 100.0, 112.0, "Wage"),
            tok(0.0, 40.0, 120.0, 132.0, "Sales"),
            tok(200.0, 260.0, 118.0, 130.0, "5,000"),
        ];
        let params = TableParams {
            row_header_tolerance: 20.0,
            ..TableParams::default()
        };
        let grid = tokens_to_grid(&tokens, &params);
        assert_eq!(grid.get(0, 1), Some(""));
        assert_eq!(grid.get(1, 1), Some("5,000"));
    }

    #[test]
    fn test_equidistant_token_goes_to_topmost_header() {
        let tokens = vec![
            tok(0.0, 40.0, 100.0, 112.0, "Wage"),
            tok(0.0, 40.0, 120.0, 132.0, "Sales"),
            tok(200.0, 260.0, 110.0, 122.0, "5,000"),
        ];
        let params = TableParams {
            row_header_tolerance: 20.0,
            ..TableParams::default()
        };
        let grid = tokens_to_grid(&tokens, &params);
        assert_eq!(grid.get(0, 1), Some("5,000"));
        assert_eq!(grid.get(1, 1), Some(""));
    }

    #[test]
    fn test_hyphen_only_column_dropped() {
        let tokens = vec![
            tok(0.0, 40.0, 100.0, 112.0, "Wage"),
            tok(100.0, 110.0, 101.0, 113.0, "-"),
            tok(200.0, 260.0, 101.0, 113.0, "1,234"),
            tok(0.0, 40.0, 140.0, 152.0, "Sales"),
            tok(102.0, 112.0, 141.0, 153.0, "-"),
            tok(200.0, 260.0, 141.0, 153.0, "2,000"),
        ];
        let params = TableParams {
            row_header_tolerance: 20.0,
            ..TableParams::default()
        };
        let grid = tokens_to_grid(&tokens, &params);
        assert_eq!(grid.ncols(), 2);
        assert_eq!(grid.get(0, 1), Some("1,234"));
        assert_eq!(grid.get(1, 1), Some("2,000"));
    }

    #[test]
    fn test_grid_shape_matches_headers_and_columns() {
        let tokens = vec![
            tok(0.0, 40.0, 100.0, 112.0, "Wage"),
            tok(150.0, 180.0, 101.0, 113.0, "1,000"),
            tok(250.0, 280.0, 101.0, 113.0, "2,000"),
            tok(0.0, 40.0, 140.0, 152.0, "Sales"),
            tok(151.0, 181.0, 141.0, 153.0, "3,000"),
            tok(251.0, 281.0, 141.0, 153.0, "4,000"),
        ];
        let params = TableParams {
            row_header_tolerance: 20.0,
            ..TableParams::default()
        };
        let grid = tokens_to_grid(&tokens, &params);
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.ncols(), 3);
        assert_eq!(grid.get(0, 0), Some("Wage"));
        assert_eq!(grid.get(1, 0), Some("Sales"));
        assert_eq!(grid.get(1, 2), Some("4,000"));
    }
}
