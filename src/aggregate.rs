use crate::cell::CellValue;
use crate::grid::TabularGrid;
use crate::stats::round_2;
use crate::workbook::Workbook;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;

const WELL_FILLED_RATIO: f64 = 0.80;
const SPARSE_RATIO: f64 = 0.30;
const NUMERIC_HEAVY_RATIO: f64 = 0.70;
const TEXT_HEAVY_RATIO: f64 = 0.30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStats {
    pub index: usize,
    pub count: usize,
    pub numeric_count: usize,
    /// `None` when the column holds no numbers.
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// "-" for a column aggregate that does not apply.
pub fn display_stat(v: Option<f64>) -> String {
    v.map(|n| CellValue::Number(n).to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub row_count: usize,
    /// Width of the first row.
    pub column_count: usize,
    pub total_cells: usize,
    pub filled_count: usize,
    pub empty_count: usize,
    pub numeric_count: usize,
    pub text_count: usize,
    pub unique_value_count: usize,
    pub columns: Vec<ColumnStats>,
}

impl SheetSummary {
    pub fn fill_ratio(&self) -> Option<f64> {
        (self.total_cells > 0).then(|| self.filled_count as f64 / self.total_cells as f64)
    }

    pub fn numeric_ratio(&self) -> Option<f64> {
        (self.filled_count > 0).then(|| self.numeric_count as f64 / self.filled_count as f64)
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum UniqueKey<'a> {
    Number(u64),
    Text(&'a str),
}

fn unique_key(v: &CellValue) -> Option<UniqueKey<'_>> {
    match v {
        CellValue::Empty => None,
        CellValue::Text(s) if s.is_empty() => None,
        CellValue::Text(s) => Some(UniqueKey::Text(s)),
        // -0.0 and 0.0 are the same value.
        CellValue::Number(n) if *n == 0.0 => Some(UniqueKey::Number(0.0_f64.to_bits())),
        CellValue::Number(n) => Some(UniqueKey::Number(n.to_bits())),
    }
}

fn column_stats(grid: &TabularGrid, index: usize) -> ColumnStats {
    let mut count = 0;
    let mut numbers: Vec<f64> = Vec::new();
    for r in 0..grid.row_count() {
        let v = grid.cell(r, index);
        if v.is_empty() {
            continue;
        }
        count += 1;
        if let Some(n) = v.as_number() {
            numbers.push(n);
        }
    }

    let (average, min, max) = if numbers.is_empty() {
        (None, None, None)
    } else {
        let sum: f64 = numbers.iter().sum();
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (
            Some(round_2(sum / numbers.len() as f64)),
            Some(round_2(min)),
            Some(round_2(max)),
        )
    };

    ColumnStats {
        index,
        count,
        numeric_count: numbers.len(),
        average,
        min,
        max,
    }
}

pub fn summarize(grid: &TabularGrid) -> SheetSummary {
    let row_count = grid.row_count();
    let column_count = grid.first_row_width();
    let total_cells = row_count * column_count;

    let mut filled_count = 0;
    let mut numeric_count = 0;
    let mut unique: HashSet<UniqueKey<'_>> = HashSet::new();
    for (_, _, v) in grid.cells() {
        let Some(key) = unique_key(v) else {
            continue;
        };
        filled_count += 1;
        if v.is_numeric() {
            numeric_count += 1;
        }
        unique.insert(key);
    }

    SheetSummary {
        row_count,
        column_count,
        total_cells,
        filled_count,
        empty_count: total_cells.saturating_sub(filled_count),
        numeric_count,
        text_count: filled_count - numeric_count,
        unique_value_count: unique.len(),
        columns: (0..column_count).map(|c| column_stats(grid, c)).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsightKind {
    WellFilled,
    TooManyEmptyCells,
    PredominantlyNumeric,
    PredominantlyTextual,
    MultiSheet,
    ReadyForAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

fn pct(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Rule-based observations about one sheet.
///
/// Rules are evaluated in a fixed order and every match is collected. Fill
/// rate (well filled / too sparse) and content mix (numeric / textual) are
/// each an if/else-if pair; the sheet-count rule is independent; the
/// fallback fires only when nothing else did. A ratio whose denominator is
/// zero matches nothing.
pub fn insights(summary: &SheetSummary, sheet_count: usize) -> Vec<Insight> {
    let mut out = Vec::new();

    if let Some(fill) = summary.fill_ratio() {
        if fill > WELL_FILLED_RATIO {
            out.push(Insight {
                kind: InsightKind::WellFilled,
                message: format!("Data is well filled ({} of cells have values)", pct(fill)),
            });
        } else if fill < SPARSE_RATIO {
            out.push(Insight {
                kind: InsightKind::TooManyEmptyCells,
                message: format!("Too many empty cells (only {} filled)", pct(fill)),
            });
        }
    }

    if let Some(numeric) = summary.numeric_ratio() {
        if numeric > NUMERIC_HEAVY_RATIO {
            out.push(Insight {
                kind: InsightKind::PredominantlyNumeric,
                message: format!(
                    "Data is predominantly numeric ({} of filled cells)",
                    pct(numeric)
                ),
            });
        } else if numeric < TEXT_HEAVY_RATIO {
            out.push(Insight {
                kind: InsightKind::PredominantlyTextual,
                message: format!(
                    "Data is predominantly textual ({} numeric)",
                    pct(numeric)
                ),
            });
        }
    }

    if sheet_count > 1 {
        out.push(Insight {
            kind: InsightKind::MultiSheet,
            message: format!("Workbook contains {} sheets", sheet_count),
        });
    }

    if out.is_empty() {
        out.push(Insight {
            kind: InsightKind::ReadyForAnalysis,
            message: "Data is ready for analysis".to_string(),
        });
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetReport {
    pub name: String,
    pub summary: SheetSummary,
    pub insights: Vec<Insight>,
}

pub fn summarize_workbook(workbook: &Workbook) -> Vec<SheetReport> {
    workbook
        .sheets()
        .iter()
        .map(|s| {
            let summary = summarize(&s.grid);
            let insights = insights(&summary, workbook.len());
            SheetReport {
                name: s.name.clone(),
                summary,
                insights,
            }
        })
        .collect()
}

/// Snapshot handed to a text-generation service as context.
pub fn analysis_context(report: &SheetReport, sheet_names: &[String]) -> serde_json::Value {
    json!({
        "sheet": report.name,
        "sheets": sheet_names,
        "summary": report.summary,
        "insights": report.insights.iter().map(|i| &i.message).collect::<Vec<_>>(),
    })
}
