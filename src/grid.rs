use crate::cell::CellValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static EMPTY: CellValue = CellValue::Empty;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("{axis} index must be >= 0 (got {index})")]
    InvalidIndex { axis: &'static str, index: i64 },
}

impl GridError {
    pub fn code(&self) -> &'static str {
        match self {
            GridError::InvalidIndex { .. } => "invalid_index",
        }
    }
}

fn to_index(axis: &'static str, index: i64) -> Result<usize, GridError> {
    usize::try_from(index).map_err(|_| GridError::InvalidIndex { axis, index })
}

/// One worksheet worth of cells.
///
/// Rows may be ragged. The column count is the longest stored row and any
/// read past a row's stored length sees an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabularGrid {
    rows: Vec<Vec<CellValue>>,
}

impl TabularGrid {
    pub fn create(rows: i64, cols: i64) -> Result<Self, GridError> {
        let rows = to_index("row", rows)?;
        let cols = to_index("column", cols)?;
        Ok(Self {
            rows: vec![vec![CellValue::Empty; cols]; rows],
        })
    }

    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(CellValue::normalized).collect())
            .collect();
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Width of row 0. Ratio displays treat this as the sheet width.
    pub fn first_row_width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(CellValue::is_empty))
    }

    /// Tolerant read by unsigned position.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn get_cell(&self, row: i64, col: i64) -> Result<&CellValue, GridError> {
        let r = to_index("row", row)?;
        let c = to_index("column", col)?;
        Ok(self.cell(r, c))
    }

    /// Writes a cell, growing the grid when the position is out of bounds.
    /// Rows added on the way stay unallocated; only the target row is widened.
    pub fn set_cell(
        &mut self,
        row: i64,
        col: i64,
        value: impl Into<CellValue>,
    ) -> Result<(), GridError> {
        let r = to_index("row", row)?;
        let c = to_index("column", col)?;
        if r >= self.rows.len() {
            self.rows.resize(r + 1, Vec::new());
        }
        let target = &mut self.rows[r];
        if c >= target.len() {
            target.resize(c + 1, CellValue::Empty);
        }
        target[c] = value.into().normalized();
        Ok(())
    }

    /// Inserts an empty row below `index` (`-1` inserts at the top, an index
    /// past the end appends). Returns the new row's index.
    pub fn insert_row_after(&mut self, index: i64) -> Result<usize, GridError> {
        if index < -1 {
            return Err(GridError::InvalidIndex { axis: "row", index });
        }
        let at = ((index + 1) as usize).min(self.rows.len());
        let width = self.column_count();
        self.rows.insert(at, vec![CellValue::Empty; width]);
        Ok(at)
    }

    /// Inserts an empty column right of `index` across every row, with the
    /// same `-1` / past-the-end conventions as [`Self::insert_row_after`].
    pub fn insert_column_after(&mut self, index: i64) -> Result<usize, GridError> {
        if index < -1 {
            return Err(GridError::InvalidIndex {
                axis: "column",
                index,
            });
        }
        let width = self.column_count();
        let at = ((index + 1) as usize).min(width);
        // Rows that end before `at` already read as empty there.
        for row in self.rows.iter_mut().filter(|r| r.len() >= at) {
            row.insert(at, CellValue::Empty);
        }
        Ok(at)
    }

    /// Deep copy of the stored rows, ragged as stored.
    pub fn to_rows(&self) -> Vec<Vec<CellValue>> {
        self.rows.clone()
    }

    /// Rectangular bounding box of the non-empty cells, anchored at (0, 0).
    pub fn trimmed(&self) -> TabularGrid {
        let mut last_row = None;
        let mut last_col = None;
        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if !cell.is_empty() {
                    last_row = Some(r);
                    last_col = Some(last_col.map_or(c, |lc: usize| lc.max(c)));
                }
            }
        }
        let (Some(last_row), Some(last_col)) = (last_row, last_col) else {
            return TabularGrid::default();
        };
        let rows = (0..=last_row)
            .map(|r| (0..=last_col).map(|c| self.cell(r, c).clone()).collect())
            .collect();
        TabularGrid { rows }
    }

    /// Every stored cell with its position, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &CellValue)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, v)| (r, c, v)))
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }
}
