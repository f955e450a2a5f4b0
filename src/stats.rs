use crate::grid::TabularGrid;
use serde::{Deserialize, Serialize};

/// Round half away from zero to 2 decimals.
pub fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRange {
    pub row_start: i64,
    pub col_start: i64,
    pub row_end: i64,
    pub col_end: i64,
}

impl SelectionRange {
    pub fn new(row_start: i64, col_start: i64, row_end: i64, col_end: i64) -> Self {
        Self {
            row_start,
            col_start,
            row_end,
            col_end,
        }
    }

    /// Endpoints ordered so start <= end on both axes.
    pub fn normalized(self) -> Self {
        Self {
            row_start: self.row_start.min(self.row_end),
            col_start: self.col_start.min(self.col_end),
            row_end: self.row_start.max(self.row_end),
            col_end: self.col_start.max(self.col_end),
        }
    }

    /// A selection touching a negative index means "nothing selected".
    pub fn is_selection(&self) -> bool {
        self.row_start >= 0 && self.col_start >= 0 && self.row_end >= 0 && self.col_end >= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeStats {
    pub sum: f64,
    pub average: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
}

pub fn compute(grid: &TabularGrid, range: SelectionRange) -> RangeStats {
    if !range.is_selection() {
        return RangeStats::default();
    }
    let range = range.normalized();

    // Cells past the stored area read as empty, so clamp to it.
    let last_row = (grid.row_count() as i64 - 1).min(range.row_end);
    let last_col = (grid.column_count() as i64 - 1).min(range.col_end);

    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for r in range.row_start..=last_row {
        for c in range.col_start..=last_col {
            let Some(v) = grid.cell(r as usize, c as usize).as_number() else {
                continue;
            };
            sum += v;
            count += 1;
            min = min.min(v);
            max = max.max(v);
        }
    }

    if count == 0 {
        return RangeStats::default();
    }

    RangeStats {
        sum: round_2(sum),
        average: round_2(sum / count as f64),
        count,
        min: round_2(min),
        max: round_2(max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;

    fn sample() -> TabularGrid {
        TabularGrid::from_rows(vec![
            vec!["Name".into(), "Math".into(), "Science".into()],
            vec!["Ali".into(), CellValue::Number(70.0), CellValue::Number(81.5)],
            vec!["Sara".into(), "95".into(), "absent".into()],
            vec!["Omar".into(), CellValue::Number(60.125), CellValue::Empty],
        ])
    }

    #[test]
    fn aggregates_only_numeric_cells() {
        let s = compute(&sample(), SelectionRange::new(1, 1, 3, 2));
        assert_eq!(s.count, 4);
        assert_eq!(s.sum, 306.63);
        assert_eq!(s.average, 76.66);
        assert_eq!(s.min, 60.13);
        assert_eq!(s.max, 95.0);
    }

    #[test]
    fn reversed_endpoints_are_normalized() {
        let forward = compute(&sample(), SelectionRange::new(1, 1, 3, 1));
        let reversed = compute(&sample(), SelectionRange::new(3, 1, 1, 1));
        assert_eq!(forward, reversed);
        assert_eq!(forward.count, 3);
    }

    #[test]
    fn empty_results_are_all_zero() {
        let grid = sample();
        let zero = RangeStats::default();
        assert_eq!(compute(&grid, SelectionRange::new(0, 0, 0, 0)), zero);
        assert_eq!(compute(&grid, SelectionRange::new(10, 10, 20, 20)), zero);
        assert_eq!(compute(&grid, SelectionRange::new(-1, -1, -1, -1)), zero);
        assert_eq!(compute(&grid, SelectionRange::new(-1, 0, 3, 2)), zero);
        assert_eq!(compute(&TabularGrid::default(), SelectionRange::new(0, 0, 5, 5)), zero);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_2(2.375), 2.38);
        assert_eq!(round_2(-2.375), -2.38);
        assert_eq!(round_2(0.125), 0.13);
    }
}
