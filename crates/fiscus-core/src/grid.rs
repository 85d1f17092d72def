//! Dense rectangular reconstruction output.
//!
//! A [`Grid`] is the raw result of table recovery: a rectangle of strings
//! where the empty string means "no value observed". Column 0 always holds
//! the row-header text; value columns follow in left-to-right page order.

use crate::error::{FiscusError, FiscusResult};

/// Dense rectangular array of cell strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    cells: Vec<Vec<String>>,
    ncols: usize,
}

impl Grid {
    /// An `nrows x ncols` grid of empty cells.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            cells: vec![vec![String::new(); ncols]; nrows],
            ncols,
        }
    }

    /// Build from row vectors, which must all share one width.
    pub fn from_rows(rows: Vec<Vec<String>>) -> FiscusResult<Self> {
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
            return Err(FiscusError::parse(format!(
                "ragged grid: expected {ncols} columns, found a row with {}",
                bad.len()
            )));
        }
        Ok(Self { cells: rows, ncols })
    }

    /// Build from possibly ragged rows, padding short rows with empty cells.
    pub fn from_ragged_rows(rows: Vec<Vec<String>>) -> Self {
        let ncols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let cells = rows
            .into_iter()
            .map(|mut r| {
                r.resize(ncols, String::new());
                r
            })
            .collect();
        Self { cells, ncols }
    }

    pub fn nrows(&self) -> usize {
        self.cells.len()
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.cells.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value.into();
        }
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.cells.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.cells.iter().map(Vec::as_slice)
    }

    /// Apply a transform to every cell in the given column range.
    pub fn map_cells_in(
        &mut self,
        cols: impl Iterator<Item = usize> + Clone,
        f: impl Fn(&str) -> String,
    ) {
        for row in &mut self.cells {
            for col in cols.clone() {
                if let Some(cell) = row.get_mut(col) {
                    *cell = f(cell);
                }
            }
        }
    }

    /// Apply a transform to every cell of one row.
    pub fn map_row(&mut self, index: usize, f: impl Fn(&str) -> String) {
        if let Some(row) = self.cells.get_mut(index) {
            for cell in row {
                *cell = f(cell);
            }
        }
    }

    /// Keep only the rows the predicate accepts.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[String]) -> bool) {
        self.cells.retain(|r| keep(r));
    }

    /// Replace every cell equal to `from` with `to`.
    pub fn replace_cells(&mut self, from: &str, to: &str) {
        for row in &mut self.cells {
            for cell in row {
                if cell == from {
                    *cell = to.to_string();
                }
            }
        }
    }

    /// Drop columns that contain no text at all. Used after hyphen blanking,
    /// where a placeholder-only column should vanish from the result.
    pub fn drop_empty_columns(&mut self) {
        if self.cells.is_empty() {
            return;
        }
        let keep: Vec<bool> = (0..self.ncols)
            .map(|c| self.cells.iter().any(|r| !r[c].is_empty()))
            .collect();
        if keep.iter().all(|k| *k) {
            return;
        }
        for row in &mut self.cells {
            let mut idx = 0;
            row.retain(|_| {
                let k = keep[idx];
                idx += 1;
                k
            });
        }
        self.ncols = keep.iter().filter(|k| **k).count();
    }

    /// Keep only the listed columns, in the given order.
    pub fn select_columns(&self, cols: &[usize]) -> Grid {
        let cells = self
            .cells
            .iter()
            .map(|r| {
                cols.iter()
                    .map(|&c| r.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Grid {
            cells,
            ncols: cols.len(),
        }
    }

    /// Stack grids vertically. Fails when widths disagree.
    pub fn concat(grids: Vec<Grid>) -> FiscusResult<Grid> {
        let mut grids = grids.into_iter().filter(|g| !g.is_empty());
        let Some(mut out) = grids.next() else {
            return Ok(Grid::default());
        };
        for g in grids {
            if g.ncols != out.ncols {
                return Err(FiscusError::parse(format!(
                    "column mismatch when stacking grids: {} vs {}",
                    out.ncols, g.ncols
                )));
            }
            out.cells.extend(g.cells);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let rows = vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]];
        assert!(Grid::from_rows(rows).is_err());
    }

    #[test]
    fn test_from_ragged_rows_pads() {
        let g = Grid::from_ragged_rows(vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
        ]);
        assert_eq!(g.ncols(), 2);
        assert_eq!(g.get(0, 1), Some(""));
    }

    #[test]
    fn test_drop_empty_columns() {
        let mut g = grid(&[&["Wage", "", "100"], &["Sales", "", "200"]]);
        g.drop_empty_columns();
        assert_eq!(g.ncols(), 2);
        assert_eq!(g.get(0, 1), Some("100"));
    }

    #[test]
    fn test_replace_then_drop_removes_hyphen_column() {
        let mut g = grid(&[&["Wage", "-", "100"], &["Sales", "-", "200"]]);
        g.replace_cells("-", "");
        g.drop_empty_columns();
        assert_eq!(g.ncols(), 2);
    }

    #[test]
    fn test_select_columns() {
        let g = grid(&[&["a", "b", "c"], &["d", "e", "f"]]);
        let s = g.select_columns(&[0, 2]);
        assert_eq!(s.get(1, 1), Some("f"));
        assert_eq!(s.ncols(), 2);
    }

    #[test]
    fn test_concat_checks_width() {
        let a = grid(&[&["a", "b"]]);
        let b = grid(&[&["c", "d"]]);
        let c = Grid::concat(vec![a.clone(), b]).unwrap();
        assert_eq!(c.nrows(), 2);

        let wide = grid(&[&["x", "y", "z"]]);
        assert!(Grid::concat(vec![a, wide]).is_err());
    }
}
