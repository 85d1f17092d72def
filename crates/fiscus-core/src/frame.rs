//! A small typed table with named columns.
//!
//! The intermediate between reconstruction and the CSV record set. Rows hold
//! [`CellValue`] variants; transforms are explicit operations (select,
//! slice, rename, melt) rather than string-indexed queries, and melting a
//! wide frame produces another frame in long form.

use rust_decimal::Decimal;

use crate::error::{FiscusError, FiscusResult};
use crate::grid::Grid;

/// One typed cell after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// No value observed.
    Missing,
    /// A signed decimal. Percent magnitudes are stored as parsed, without
    /// dividing by 100; the report schema carries the unit.
    Number(Decimal),
    /// Uncoerced text, e.g. category labels.
    Text(String),
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            CellValue::Number(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render for CSV output. Missing cells render as the empty string.
    pub fn render(&self) -> String {
        match self {
            CellValue::Missing => String::new(),
            CellValue::Number(d) => d.normalize().to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn number(value: Decimal) -> Self {
        CellValue::Number(value)
    }
}

impl From<Decimal> for CellValue {
    fn from(d: Decimal) -> Self {
        CellValue::Number(d)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Number(Decimal::from(v))
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// A typed table: named columns over rows of cell values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Frame {
    /// An empty frame with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build from columns and rows; every row must match the column count.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> FiscusResult<Self> {
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(FiscusError::parse(format!(
                "frame row has {} cells, expected {}",
                bad.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Lift a raw grid into a frame of text cells with positional column
    /// names `"0"`, `"1"`, ...
    pub fn from_grid(grid: &Grid) -> Self {
        let columns = (0..grid.ncols()).map(|i| i.to_string()).collect();
        let rows = grid
            .rows()
            .map(|r| {
                r.iter()
                    .map(|s| {
                        if s.is_empty() {
                            CellValue::Missing
                        } else {
                            CellValue::Text(s.clone())
                        }
                    })
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.col_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn set_value(&mut self, row: usize, column: &str, value: CellValue) -> FiscusResult<()> {
        let col = self
            .col_index(column)
            .ok_or_else(|| FiscusError::schema(format!("unknown column '{column}'")))?;
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or_else(|| FiscusError::schema(format!("row {row} out of bounds")))?;
        *cell = value;
        Ok(())
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) -> FiscusResult<()> {
        if row.len() != self.columns.len() {
            return Err(FiscusError::parse(format!(
                "frame row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Replace all column names. The count must match.
    pub fn set_column_names(&mut self, names: Vec<String>) -> FiscusResult<()> {
        if names.len() != self.columns.len() {
            return Err(FiscusError::schema(format!(
                "expected {} column names, got {}",
                self.columns.len(),
                names.len()
            )));
        }
        self.columns = names;
        Ok(())
    }

    /// Rename one column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> FiscusResult<()> {
        let idx = self
            .col_index(from)
            .ok_or_else(|| FiscusError::schema(format!("unknown column '{from}'")))?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// Keep only the listed columns, in the given order.
    pub fn select_columns(&self, names: &[&str]) -> FiscusResult<Frame> {
        let indices: Vec<usize> = names
            .iter()
            .map(|n| {
                self.col_index(n)
                    .ok_or_else(|| FiscusError::schema(format!("unknown column '{n}'")))
            })
            .collect::<FiscusResult<_>>()?;
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(Frame {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }

    /// Keep the row range `start..=stop`.
    pub fn slice_rows(&self, start: usize, stop: usize) -> Frame {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= start && *i <= stop)
            .map(|(_, r)| r.clone())
            .collect();
        Frame {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Keep only rows the predicate accepts.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[CellValue]) -> bool) {
        self.rows.retain(|r| keep(r));
    }

    /// Insert a row before the given index.
    pub fn insert_row(&mut self, index: usize, row: Vec<CellValue>) -> FiscusResult<()> {
        if row.len() != self.columns.len() {
            return Err(FiscusError::parse(format!(
                "frame row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        if index > self.rows.len() {
            return Err(FiscusError::parse(format!(
                "insert index {index} out of bounds"
            )));
        }
        self.rows.insert(index, row);
        Ok(())
    }

    /// Drop columns whose every cell is missing.
    pub fn drop_missing_columns(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|c| self.rows.iter().any(|r| !r[c].is_missing()))
            .collect();
        if keep.iter().all(|k| *k) {
            return;
        }
        let mut idx = 0;
        self.columns.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        for row in &mut self.rows {
            let mut idx = 0;
            row.retain(|_| {
                let k = keep[idx];
                idx += 1;
                k
            });
        }
    }

    /// Render back into a raw string grid; missing cells become empty
    /// strings. Used when a provider hands back an intermediate frame that
    /// still needs the string-level cleaning passes.
    pub fn to_text_grid(&self) -> Grid {
        Grid::from_ragged_rows(
            self.rows
                .iter()
                .map(|r| r.iter().map(CellValue::render).collect())
                .collect(),
        )
    }

    /// Index of the single row whose cell in `column` satisfies the
    /// predicate. Zero or multiple matches is a parse failure, mirroring
    /// crop-anchor lookups.
    pub fn find_single(
        &self,
        column: &str,
        what: &str,
        pred: impl Fn(&CellValue) -> bool,
    ) -> FiscusResult<usize> {
        let col = self
            .col_index(column)
            .ok_or_else(|| FiscusError::schema(format!("unknown column '{column}'")))?;
        let matches: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| pred(&r[col]))
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [i] => Ok(*i),
            [] => Err(FiscusError::parse(format!("no row matching {what}"))),
            _ => Err(FiscusError::parse(format!(
                "multiple rows matching {what}"
            ))),
        }
    }

    /// Drop rows where every cell (or every cell in `subset`, when given) is
    /// missing.
    pub fn drop_missing_rows(&mut self, subset: Option<&[&str]>) {
        let indices: Vec<usize> = match subset {
            Some(names) => names
                .iter()
                .filter_map(|n| self.col_index(n))
                .collect(),
            None => (0..self.columns.len()).collect(),
        };
        if indices.is_empty() {
            return;
        }
        self.rows
            .retain(|r| !indices.iter().all(|&i| r[i].is_missing()));
    }

    /// Apply a transform to every cell of one column.
    pub fn map_column(
        &mut self,
        column: &str,
        f: impl Fn(&CellValue) -> CellValue,
    ) -> FiscusResult<()> {
        let col = self
            .col_index(column)
            .ok_or_else(|| FiscusError::schema(format!("unknown column '{column}'")))?;
        for row in &mut self.rows {
            row[col] = f(&row[col]);
        }
        Ok(())
    }

    /// Append a column with one value per existing row.
    pub fn push_column(&mut self, name: &str, values: Vec<CellValue>) -> FiscusResult<()> {
        if values.len() != self.rows.len() {
            return Err(FiscusError::schema(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name.to_string());
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
        Ok(())
    }

    /// Unpivot to long form: one output row per (id, value column) pair,
    /// with the value column's name under `var_name` and its cell under
    /// `value_name`.
    pub fn melt(&self, id_vars: &[&str], var_name: &str, value_name: &str) -> FiscusResult<Frame> {
        let id_indices: Vec<usize> = id_vars
            .iter()
            .map(|n| {
                self.col_index(n)
                    .ok_or_else(|| FiscusError::schema(format!("unknown column '{n}'")))
            })
            .collect::<FiscusResult<_>>()?;
        let value_indices: Vec<usize> = (0..self.columns.len())
            .filter(|i| !id_indices.contains(i))
            .collect();

        let mut columns: Vec<String> = id_vars.iter().map(|n| n.to_string()).collect();
        columns.push(var_name.to_string());
        columns.push(value_name.to_string());

        let mut rows = Vec::with_capacity(self.rows.len() * value_indices.len());
        for &vi in &value_indices {
            for row in &self.rows {
                let mut out: Vec<CellValue> =
                    id_indices.iter().map(|&i| row[i].clone()).collect();
                out.push(CellValue::text(self.columns[vi].clone()));
                out.push(row[vi].clone());
                rows.push(out);
            }
        }
        Ok(Frame { columns, rows })
    }

    /// Stack frames vertically; column names must agree.
    pub fn concat(frames: Vec<Frame>) -> FiscusResult<Frame> {
        let mut frames = frames.into_iter();
        let Some(mut out) = frames.next() else {
            return Ok(Frame::default());
        };
        for f in frames {
            if f.columns != out.columns {
                return Err(FiscusError::parse(
                    "column mismatch when stacking frames".to_string(),
                ));
            }
            out.rows.extend(f.rows);
        }
        Ok(out)
    }

    /// Sum the numeric values of `value_col` over rows passing the filter.
    pub fn sum_where(
        &self,
        value_col: &str,
        mut filter: impl FnMut(&Frame, usize) -> bool,
    ) -> Decimal {
        let Some(col) = self.col_index(value_col) else {
            return Decimal::ZERO;
        };
        let mut total = Decimal::ZERO;
        for i in 0..self.rows.len() {
            if filter(self, i) {
                if let Some(v) = self.rows[i][col].as_number() {
                    total += v;
                }
            }
        }
        total
    }

    /// Distinct rendered values of a column, in first-seen order.
    pub fn distinct(&self, column: &str) -> Vec<String> {
        let Some(col) = self.col_index(column) else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        for row in &self.rows {
            let v = row[col].render();
            if !seen.contains(&v) {
                seen.push(v);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Frame {
        Frame::with_rows(
            vec!["name".into(), "jan".into(), "feb".into()],
            vec![
                vec!["wage".into(), dec!(100).into(), dec!(110).into()],
                vec!["sales".into(), dec!(50).into(), CellValue::Missing],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_grid_maps_empty_to_missing() {
        let grid = Grid::from_rows(vec![vec!["Wage".into(), "".into(), "1".into()]]).unwrap();
        let frame = Frame::from_grid(&grid);
        assert_eq!(frame.columns(), &["0", "1", "2"]);
        assert!(frame.value(0, "1").unwrap().is_missing());
        assert_eq!(frame.value(0, "2").unwrap().as_text(), Some("1"));
    }

    #[test]
    fn test_melt_long_form() {
        let long = sample().melt(&["name"], "month", "amount").unwrap();
        assert_eq!(long.columns(), &["name", "month", "amount"]);
        assert_eq!(long.nrows(), 4);
        // Value columns are emitted column-major: all jan rows, then feb.
        assert_eq!(long.value(0, "month").unwrap().as_text(), Some("jan"));
        assert_eq!(long.value(0, "amount").unwrap().as_number(), Some(dec!(100)));
        assert_eq!(long.value(3, "month").unwrap().as_text(), Some("feb"));
        assert!(long.value(3, "amount").unwrap().is_missing());
    }

    #[test]
    fn test_drop_missing_rows_subset() {
        let mut frame = sample();
        frame
            .set_value(1, "jan", CellValue::Missing)
            .unwrap();
        frame.drop_missing_rows(Some(&["jan", "feb"]));
        assert_eq!(frame.nrows(), 1);
        assert_eq!(frame.value(0, "name").unwrap().as_text(), Some("wage"));
    }

    #[test]
    fn test_find_single() {
        let frame = sample();
        let idx = frame
            .find_single("name", "the sales row", |v| v.as_text() == Some("sales"))
            .unwrap();
        assert_eq!(idx, 1);
        assert!(frame
            .find_single("name", "missing row", |v| v.as_text() == Some("x"))
            .is_err());
    }

    #[test]
    fn test_sum_where() {
        let frame = sample();
        let name = frame.col_index("name").unwrap();
        let total = frame.sum_where("jan", |f, i| {
            f.row(i).unwrap()[name].as_text() != Some("sales")
        });
        assert_eq!(total, dec!(100));
    }

    #[test]
    fn test_select_and_slice() {
        let frame = sample();
        let sel = frame.select_columns(&["name", "feb"]).unwrap();
        assert_eq!(sel.ncols(), 2);
        let sliced = frame.slice_rows(1, 1);
        assert_eq!(sliced.nrows(), 1);
        assert_eq!(sliced.value(0, "name").unwrap().as_text(), Some("sales"));
    }

    #[test]
    fn test_concat_requires_matching_columns() {
        let a = sample();
        let b = sample();
        assert_eq!(Frame::concat(vec![a.clone(), b]).unwrap().nrows(), 4);
        let other = Frame::new(vec!["x".into()]);
        assert!(Frame::concat(vec![a, other]).is_err());
    }

    #[test]
    fn test_render_normalizes_decimals() {
        assert_eq!(CellValue::Number(dec!(1234.50)).render(), "1234.5");
        assert_eq!(CellValue::Missing.render(), "");
    }
}
