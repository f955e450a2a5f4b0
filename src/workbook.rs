use crate::grid::{GridError, TabularGrid};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkbookError {
    #[error("sheet name must not be blank")]
    BlankName,
    #[error("invalid sheet name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("sheet already exists: {0}")]
    DuplicateSheet(String),
    #[error("sheet not found: {0}")]
    UnknownSheet(String),
    #[error("workbook has no sheets")]
    Empty,
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl WorkbookError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkbookError::BlankName
            | WorkbookError::InvalidName { .. }
            | WorkbookError::DuplicateSheet(_) => "bad_params",
            WorkbookError::UnknownSheet(_) => "sheet_not_found",
            WorkbookError::Empty => "empty_workbook",
            WorkbookError::Grid(e) => e.code(),
        }
    }
}

/// Longest sheet name a spreadsheet file accepts.
pub const MAX_SHEET_NAME_CHARS: usize = 31;
const FORBIDDEN_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Checks a sheet name against the xlsx naming rules.
pub fn validate_sheet_name(name: &str) -> Result<(), WorkbookError> {
    let invalid = |reason| WorkbookError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(WorkbookError::BlankName);
    }
    if name.chars().count() > MAX_SHEET_NAME_CHARS {
        return Err(invalid("longer than 31 characters"));
    }
    if name.contains(FORBIDDEN_NAME_CHARS) {
        return Err(invalid("contains one of [ ] : * ? / \\"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid("starts or ends with an apostrophe"));
    }
    if name.eq_ignore_ascii_case("history") {
        return Err(invalid("reserved name"));
    }
    Ok(())
}

/// Turns free text into a valid sheet name: forbidden characters become
/// `-`, edge apostrophes are dropped and the result is cut to length.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if FORBIDDEN_NAME_CHARS.contains(&c) { '-' } else { c })
        .collect();
    let mut name: String = replaced
        .trim_matches(|c: char| c == '\'' || c.is_whitespace())
        .chars()
        .take(MAX_SHEET_NAME_CHARS)
        .collect();
    name = name.trim_end_matches('\'').to_string();
    if name.trim().is_empty() || name.eq_ignore_ascii_case("history") {
        name = format!("Sheet {}", name.trim()).trim().to_string();
    }
    name
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub grid: TabularGrid,
}

/// Named sheets in insertion order. Names are unique; order drives both
/// display and export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-sheet workbook with a blank `rows` x `cols` template.
    pub fn blank(name: &str, rows: i64, cols: i64) -> Result<Self, WorkbookError> {
        let mut wb = Self::new();
        wb.add_sheet(name, TabularGrid::create(rows, cols)?)?;
        Ok(wb)
    }

    pub fn add_sheet(&mut self, name: &str, grid: TabularGrid) -> Result<(), WorkbookError> {
        validate_sheet_name(name)?;
        if self.sheet(name).is_some() {
            return Err(WorkbookError::DuplicateSheet(name.to_string()));
        }
        self.sheets.push(Sheet {
            name: name.to_string(),
            grid,
        });
        Ok(())
    }

    pub fn sheet(&self, name: &str) -> Option<&TabularGrid> {
        self.sheets.iter().find(|s| s.name == name).map(|s| &s.grid)
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

/// The workbook an editor is working on, plus which sheet is showing.
///
/// Always holds at least one sheet. Sheets are never removed, so the
/// active index stays in range.
#[derive(Debug, Clone)]
pub struct WorkbookSession {
    workbook: Workbook,
    active: usize,
}

impl WorkbookSession {
    pub fn new(workbook: Workbook) -> Result<Self, WorkbookError> {
        if workbook.is_empty() {
            return Err(WorkbookError::Empty);
        }
        Ok(Self {
            workbook,
            active: 0,
        })
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn active_name(&self) -> &str {
        &self.workbook.sheets[self.active].name
    }

    pub fn active_grid(&self) -> &TabularGrid {
        &self.workbook.sheets[self.active].grid
    }

    pub fn active_grid_mut(&mut self) -> &mut TabularGrid {
        &mut self.workbook.sheets[self.active].grid
    }

    pub fn select(&mut self, name: &str) -> Result<(), WorkbookError> {
        self.active = self
            .workbook
            .sheets
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| WorkbookError::UnknownSheet(name.to_string()))?;
        Ok(())
    }

    pub fn add_sheet(&mut self, name: &str, grid: TabularGrid) -> Result<(), WorkbookError> {
        self.workbook.add_sheet(name, grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_ordered() {
        let mut wb = Workbook::new();
        wb.add_sheet("Term 1", TabularGrid::default()).expect("t1");
        wb.add_sheet("Term 2", TabularGrid::default()).expect("t2");
        assert_eq!(
            wb.add_sheet("Term 1", TabularGrid::default()),
            Err(WorkbookError::DuplicateSheet("Term 1".into()))
        );
        assert_eq!(wb.add_sheet("  ", TabularGrid::default()), Err(WorkbookError::BlankName));
        assert_eq!(wb.sheet_names(), vec!["Term 1", "Term 2"]);
    }

    #[test]
    fn names_a_spreadsheet_cannot_store_are_refused() {
        let mut wb = Workbook::new();
        for bad in ["2024/2025 T1", "a:b", "[x]", "'quoted'", "History", "x".repeat(32).as_str()] {
            let err = wb.add_sheet(bad, TabularGrid::default()).expect_err(bad);
            assert!(matches!(err, WorkbookError::InvalidName { .. }), "{bad}");
            assert_eq!(err.code(), "bad_params");
        }
        wb.add_sheet(&"ع".repeat(31), TabularGrid::default()).expect("31 chars");
        assert_eq!(wb.len(), 1);
    }

    #[test]
    fn sanitized_names_always_validate() {
        assert_eq!(sanitize_sheet_name("2024/2025 T1"), "2024-2025 T1");
        assert_eq!(sanitize_sheet_name("'Q1'"), "Q1");
        assert_eq!(sanitize_sheet_name("history"), "Sheet history");
        assert_eq!(sanitize_sheet_name("///").chars().count(), 3);
        for raw in ["", "  ", "a*b?c", "long name ".repeat(10).as_str(), "'", "x'"] {
            let name = sanitize_sheet_name(raw);
            assert_eq!(validate_sheet_name(&name), Ok(()), "{raw:?} -> {name:?}");
        }
    }

    #[test]
    fn session_requires_a_sheet_and_tracks_active() {
        assert!(matches!(
            WorkbookSession::new(Workbook::new()),
            Err(WorkbookError::Empty)
        ));

        let mut wb = Workbook::blank("Sheet1", 3, 3).expect("blank");
        wb.add_sheet("Sheet2", TabularGrid::default()).expect("add");
        let mut session = WorkbookSession::new(wb).expect("session");
        assert_eq!(session.active_name(), "Sheet1");
        assert_eq!(session.active_grid().row_count(), 3);

        session.select("Sheet2").expect("select");
        assert_eq!(session.active_name(), "Sheet2");
        assert!(session.select("Nope").is_err());
        assert_eq!(session.active_name(), "Sheet2");

        session
            .active_grid_mut()
            .set_cell(0, 0, "x")
            .expect("set");
        assert_eq!(session.workbook().sheet("Sheet2").expect("s2").row_count(), 1);
    }
}
