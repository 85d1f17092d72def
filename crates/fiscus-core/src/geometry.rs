//! Fuzzy geometric clustering of positioned tokens.
//!
//! Tokens on a scanned or vector page rarely share exact coordinates, so
//! grouping into lines and column stacks is done with interval overlap: each
//! token spans `[key - lower_tol, key + upper_tol]` on the clustering axis,
//! and every distinct key value collects the tokens whose interval contains
//! it. Duplicate groups (same member set) are dropped, which keeps the
//! result stable when several tokens seed the same line.

use crate::token::Token;

/// The spatial axis used to key a clustering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Token top edge; groups tokens into lines.
    Top,
    /// Token bottom edge; groups tokens into lines anchored on baselines.
    Bottom,
    /// Token right edge; groups tokens into column stacks.
    RightEdge,
}

impl Axis {
    fn key(&self, token: &Token) -> f64 {
        match self {
            Axis::Top => token.top(),
            Axis::Bottom => token.bottom(),
            Axis::RightEdge => token.x1(),
        }
    }

    /// Members of a group are ordered on the axis orthogonal to the
    /// clustering axis: left-to-right for line groups, top-to-bottom for
    /// column groups.
    fn orthogonal_key(&self, token: &Token) -> f64 {
        match self {
            Axis::Top | Axis::Bottom => token.x(),
            Axis::RightEdge => token.top(),
        }
    }
}

/// A transient group of tokens sharing one spatial axis value.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// The key value the group was collected around.
    pub pivot: f64,
    /// Members, sorted on the orthogonal axis.
    pub tokens: Vec<Token>,
}

impl Cluster {
    /// Mean key value of the members on the given axis.
    pub fn centroid(&self, axis: Axis) -> f64 {
        if self.tokens.is_empty() {
            return self.pivot;
        }
        let sum: f64 = self.tokens.iter().map(|t| axis.key(t)).sum();
        sum / self.tokens.len() as f64
    }
}

/// Group tokens whose axis value lies within `[key - lower_tol, key +
/// upper_tol]` of any member's key. Groups are emitted in ascending pivot
/// order with members sorted on the orthogonal axis; groups with identical
/// member sets appear once.
pub fn fuzzy_group_by(
    tokens: &[Token],
    axis: Axis,
    lower_tol: f64,
    upper_tol: f64,
) -> Vec<Cluster> {
    let mut pivots: Vec<f64> = tokens.iter().map(|t| axis.key(t)).collect();
    pivots.sort_by(f64::total_cmp);
    pivots.dedup();

    let mut groups: Vec<Cluster> = Vec::new();
    for pivot in pivots {
        let mut members: Vec<Token> = tokens
            .iter()
            .filter(|t| {
                let key = axis.key(t);
                key - lower_tol <= pivot && pivot < key + upper_tol
            })
            .cloned()
            .collect();
        members.sort_by(|a, b| axis.orthogonal_key(a).total_cmp(&axis.orthogonal_key(b)));

        if !groups.iter().any(|g| g.tokens == members) {
            groups.push(Cluster {
                pivot,
                tokens: members,
            });
        }
    }
    groups
}

/// Merge horizontally adjacent tokens of a line into phrases. Scanning right
/// to left, a token is folded into its left neighbor when the gap between
/// them is below `text_tolerance_x`; the merged token inherits the right
/// token's `x1` and joins the texts with one space.
pub fn merge_phrases(mut row: Vec<Token>, text_tolerance_x: f64) -> Vec<Token> {
    let mut i = row.len();
    while i > 1 {
        i -= 1;
        if row[i].x0() - row[i - 1].x1() < text_tolerance_x {
            let right = row.remove(i);
            row[i - 1].absorb_right(&right);
        }
    }
    row
}

/// Drop any column whose member set is a full subset of another column's.
/// Fuzzy matching can seed a column twice with partial membership; the
/// orphan carries no information of its own.
pub fn drop_orphan_columns(columns: Vec<Cluster>) -> Vec<Cluster> {
    let keep: Vec<bool> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            !columns.iter().enumerate().any(|(j, other)| {
                i != j
                    && col
                        .tokens
                        .iter()
                        .all(|t| other.tokens.contains(t))
            })
        })
        .collect();
    columns
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect()
}

/// Merge adjacent columns whose pivots are closer than `min_col_sep`. The
/// smaller column folds into the larger one; when both have the same member
/// count the left column keeps the tokens. Merged members are re-sorted top
/// to bottom.
pub fn merge_close_columns(mut columns: Vec<Cluster>, min_col_sep: f64) -> Vec<Cluster> {
    columns.sort_by(|a, b| a.pivot.total_cmp(&b.pivot));

    let mut i = 0;
    while i + 1 < columns.len() {
        if columns[i + 1].pivot - columns[i].pivot < min_col_sep {
            if columns[i + 1].tokens.len() > columns[i].tokens.len() {
                let absorbed = columns.remove(i);
                columns[i].tokens.extend(absorbed.tokens);
                sort_column(&mut columns[i]);
            } else {
                let absorbed = columns.remove(i + 1);
                columns[i].tokens.extend(absorbed.tokens);
                sort_column(&mut columns[i]);
            }
        } else {
            i += 1;
        }
    }
    columns
}

/// Drop columns in which every member, after removing spaces, is purely
/// alphabetic. Split header text sometimes strands word fragments in a
/// column of their own.
pub fn drop_alpha_columns(columns: Vec<Cluster>) -> Vec<Cluster> {
    columns
        .into_iter()
        .filter(|col| {
            !col.tokens.iter().all(|t| {
                let squeezed: String = t.text().chars().filter(|c| *c != ' ').collect();
                !squeezed.is_empty() && squeezed.chars().all(char::is_alphabetic)
            })
        })
        .collect()
}

/// Discard every token at or below the first footnote marker (a token whose
/// text begins with `*`). Returns the input unchanged when no marker exists.
pub fn footnote_cutoff(tokens: Vec<Token>) -> Vec<Token> {
    let cutoff = tokens
        .iter()
        .filter(|t| t.text().starts_with('*'))
        .map(|t| t.bottom())
        .min_by(f64::total_cmp);

    match cutoff {
        Some(limit) => tokens.into_iter().filter(|t| t.bottom() < limit).collect(),
        None => tokens,
    }
}

fn sort_column(column: &mut Cluster) {
    column
        .tokens
        .sort_by(|a, b| a.top().total_cmp(&b.top()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(x0: f64, x1: f64, top: f64, bottom: f64, text: &str) -> Token {
        Token::new(x0, x1, top, bottom, text).unwrap()
    }

    fn col(pivot: f64, tokens: Vec<Token>) -> Cluster {
        Cluster { pivot, tokens }
    }

    #[test]
    fn test_fuzzy_rows_by_bottom() {
        // Two lines 30 apart, members jittered by less than the tolerance.
        let tokens = vec![
            tok(0.0, 10.0, 90.0, 100.0, "a"),
            tok(20.0, 30.0, 91.0, 101.0, "b"),
            tok(0.0, 10.0, 120.0, 130.0, "c"),
        ];
        let rows = fuzzy_group_by(&tokens, Axis::Bottom, 5.0, 5.0);
        assert_eq!(rows.len(), 2);
        let texts: Vec<_> = rows[0].tokens.iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(rows[1].tokens[0].text(), "c");
    }

    #[test]
    fn test_fuzzy_groups_deduplicate() {
        // Both keys see the same member set; only one group survives.
        let tokens = vec![
            tok(0.0, 10.0, 0.0, 100.0, "a"),
            tok(20.0, 30.0, 0.0, 101.0, "b"),
        ];
        let rows = fuzzy_group_by(&tokens, Axis::Bottom, 5.0, 5.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tokens.len(), 2);
    }

    #[test]
    fn test_fuzzy_groups_sorted_by_orthogonal_axis() {
        let tokens = vec![
            tok(50.0, 60.0, 0.0, 10.0, "right"),
            tok(0.0, 10.0, 1.0, 11.0, "left"),
        ];
        let rows = fuzzy_group_by(&tokens, Axis::Bottom, 5.0, 5.0);
        assert_eq!(rows[0].tokens[0].text(), "left");

        let cols = fuzzy_group_by(
            &[
                tok(0.0, 60.0, 50.0, 55.0, "lower"),
                tok(0.0, 61.0, 10.0, 15.0, "upper"),
            ],
            Axis::RightEdge,
            5.0,
            5.0,
        );
        assert_eq!(cols[0].tokens[0].text(), "upper");
    }

    #[test]
    fn test_merge_phrases_adjacent() {
        let row = vec![
            tok(0.0, 20.0, 0.0, 10.0, "Real"),
            tok(22.0, 50.0, 0.0, 10.0, "Estate"),
            tok(200.0, 240.0, 0.0, 10.0, "1,234"),
        ];
        let merged = merge_phrases(row, 3.0);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text(), "Real Estate");
        assert_eq!(merged[0].x1(), 50.0);
        assert_eq!(merged[1].text(), "1,234");
    }

    #[test]
    fn test_merge_phrases_chain() {
        // A three-token phrase collapses in a single right-to-left pass.
        let row = vec![
            tok(0.0, 20.0, 0.0, 10.0, "Net"),
            tok(21.0, 50.0, 0.0, 10.0, "Cash"),
            tok(51.0, 80.0, 0.0, 10.0, "Flow"),
        ];
        let merged = merge_phrases(row, 3.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text(), "Net Cash Flow");
    }

    #[test]
    fn test_drop_orphan_columns() {
        let shared = tok(0.0, 200.0, 10.0, 20.0, "1");
        let extra = tok(0.0, 201.0, 30.0, 40.0, "2");
        let full = col(201.0, vec![shared.clone(), extra]);
        let orphan = col(200.0, vec![shared]);
        let kept = drop_orphan_columns(vec![orphan, full]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].tokens.len(), 2);
    }

    #[test]
    fn test_merge_close_columns_prefers_larger() {
        let small = col(
            200.0,
            vec![
                tok(0.0, 200.0, 0.0, 10.0, "1"),
                tok(0.0, 200.0, 20.0, 30.0, "2"),
            ],
        );
        let large = col(
            218.0,
            (0..5)
                .map(|i| tok(0.0, 218.0, i as f64 * 20.0 + 5.0, i as f64 * 20.0 + 15.0, "9"))
                .collect(),
        );
        let merged = merge_close_columns(vec![small, large], 24.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pivot, 218.0);
        assert_eq!(merged[0].tokens.len(), 7);
    }

    #[test]
    fn test_merge_close_columns_keeps_distant() {
        let a = col(100.0, vec![tok(0.0, 100.0, 0.0, 10.0, "1")]);
        let b = col(160.0, vec![tok(0.0, 160.0, 0.0, 10.0, "2")]);
        assert_eq!(merge_close_columns(vec![a, b], 24.0).len(), 2);
    }

    #[test]
    fn test_drop_alpha_columns() {
        let alpha = col(
            100.0,
            vec![
                tok(0.0, 100.0, 0.0, 10.0, "Total"),
                tok(0.0, 100.0, 20.0, 30.0, "Sub total"),
            ],
        );
        let numeric = col(200.0, vec![tok(0.0, 200.0, 0.0, 10.0, "1,234")]);
        let kept = drop_alpha_columns(vec![alpha, numeric]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].pivot, 200.0);
    }

    #[test]
    fn test_footnote_cutoff() {
        let tokens = vec![
            tok(0.0, 10.0, 700.0, 710.0, "data"),
            tok(0.0, 10.0, 790.0, 800.0, "* Preliminary"),
            tok(0.0, 10.0, 810.0, 820.0, "below"),
        ];
        let kept = footnote_cutoff(tokens);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text(), "data");
    }

    #[test]
    fn test_clustering_idempotent() {
        let tokens = vec![
            tok(0.0, 10.0, 90.0, 100.0, "a"),
            tok(20.0, 30.0, 91.0, 101.0, "b"),
            tok(0.0, 10.0, 120.0, 130.0, "c"),
        ];
        let once = fuzzy_group_by(&tokens, Axis::Bottom, 5.0, 5.0);
        let again = fuzzy_group_by(&tokens, Axis::Bottom, 5.0, 5.0);
        assert_eq!(once, again);
    }
}
