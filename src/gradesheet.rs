use crate::cell::CellValue;
use crate::codec::{self, CodecError};
use crate::grid::TabularGrid;
use crate::merge::MergedGridRow;
use serde::{Deserialize, Serialize};

/// Where an imported column lands on a grade row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TargetField {
    Name,
    Grade { subject: String },
    AcademicStatus,
    SocialStatus,
    EmotionalStatus,
    EconomicStatus,
    Notes,
    Absences,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub target: TargetField,
    pub aliases: Vec<String>,
}

/// Header aliases per target field. Matching trims and ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldMapping {
    pub fields: Vec<FieldRule>,
}

fn header_key(s: &str) -> String {
    s.trim().to_lowercase()
}

fn aliases(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl FieldMapping {
    /// English and Arabic headers used by the school's own sheets.
    pub fn builtin() -> Self {
        let mut m = Self::default();
        m.push(TargetField::Name, &["Name", "Student", "Student Name", "الاسم", "اسم الطالب"]);
        m.push_subject("Math", &["رياضيات", "الرياضيات"]);
        m.push_subject("Arabic", &["عربي", "اللغة العربية"]);
        m.push_subject("English", &["انجليزي", "اللغة الإنجليزية"]);
        m.push_subject("Science", &["علوم", "العلوم"]);
        m.push(TargetField::AcademicStatus, &["Academic Status", "الحالة الأكاديمية"]);
        m.push(TargetField::SocialStatus, &["Social Status", "الحالة الاجتماعية"]);
        m.push(TargetField::EmotionalStatus, &["Emotional Status", "الحالة النفسية"]);
        m.push(TargetField::EconomicStatus, &["Economic Status", "الحالة الاقتصادية"]);
        m.push(TargetField::Absences, &["Absences", "الغياب", "أيام الغياب"]);
        m.push(TargetField::Notes, &["Notes", "ملاحظات"]);
        m
    }

    pub fn push(&mut self, target: TargetField, names: &[&str]) {
        self.fields.push(FieldRule {
            target,
            aliases: aliases(names),
        });
    }

    /// Adds a grade column; the subject name itself is always an alias.
    pub fn push_subject(&mut self, subject: &str, extra: &[&str]) {
        let mut names = vec![subject.to_string()];
        names.extend(extra.iter().map(|s| s.to_string()));
        self.fields.push(FieldRule {
            target: TargetField::Grade {
                subject: subject.to_string(),
            },
            aliases: names,
        });
    }

    /// The mapping extended with any subjects it does not know yet, each
    /// matched by its own name.
    pub fn with_subjects(mut self, subjects: &[String]) -> Self {
        for s in subjects {
            let known = self
                .fields
                .iter()
                .any(|f| matches!(&f.target, TargetField::Grade { subject } if subject == s));
            if !known {
                self.push_subject(s, &[]);
            }
        }
        self
    }

    pub fn resolve(&self, header: &str) -> Option<&TargetField> {
        let key = header_key(header);
        if key.is_empty() {
            return None;
        }
        self.fields
            .iter()
            .find(|f| f.aliases.iter().any(|a| header_key(a) == key))
            .map(|f| &f.target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedRecord {
    /// Zero-based sheet row the record came from.
    pub row: usize,
    pub name: String,
    pub values: Vec<(TargetField, CellValue)>,
}

fn absences_from(cell: &CellValue, row: usize, header: &str) -> Result<u32, CodecError> {
    let invalid = |message: &str| CodecError::InvalidField {
        row,
        header: header.to_string(),
        message: message.to_string(),
    };
    let n = cell
        .as_number()
        .ok_or_else(|| invalid("absences must be a number"))?;
    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(invalid("absences must be a whole number >= 0"));
    }
    Ok(n as u32)
}

/// Reads a sheet whose row 0 is a header row into per-student records.
///
/// Columns whose header the mapping does not know are ignored. Rows with a
/// blank name are skipped. Empty cells are left out of a record so they do
/// not overwrite anything. Any invalid cell fails the whole sheet.
pub fn import_rows(grid: &TabularGrid, mapping: &FieldMapping) -> Result<Vec<ImportedRecord>, CodecError> {
    let headers: Vec<(usize, String, &TargetField)> = grid
        .row(0)
        .iter()
        .enumerate()
        .filter_map(|(c, h)| {
            let header = h.to_string();
            mapping.resolve(&header).map(|t| (c, header, t))
        })
        .collect();
    let Some(name_col) = headers
        .iter()
        .find(|(_, _, t)| **t == TargetField::Name)
        .map(|(c, _, _)| *c)
    else {
        return Err(CodecError::MissingColumn("name".to_string()));
    };

    let mut out = Vec::new();
    for r in 1..grid.row_count() {
        let name = grid.cell(r, name_col).to_string().trim().to_string();
        if name.is_empty() {
            continue;
        }
        let mut values = Vec::new();
        for (c, header, target) in &headers {
            let cell = grid.cell(r, *c);
            if cell.is_empty() || **target == TargetField::Name {
                continue;
            }
            if **target == TargetField::Absences {
                absences_from(cell, r, header)?;
            }
            values.push(((*target).clone(), cell.clone()));
        }
        out.push(ImportedRecord { row: r, name, values });
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub matched: usize,
    pub unmatched: Vec<String>,
}

fn apply_value(row: &mut MergedGridRow, target: &TargetField, value: &CellValue) {
    match target {
        TargetField::Name => {}
        TargetField::Grade { subject } => {
            row.grades.insert(subject.clone(), value.clone());
        }
        TargetField::AcademicStatus => row.academic_status = value.to_string(),
        TargetField::SocialStatus => row.social_status = value.to_string(),
        TargetField::EmotionalStatus => row.emotional_status = value.to_string(),
        TargetField::EconomicStatus => row.economic_status = value.to_string(),
        TargetField::Notes => row.notes = value.to_string(),
        TargetField::Absences => {
            // Validated in import_rows.
            if let Some(n) = value.as_number() {
                row.absences = n as u32;
            }
        }
    }
}

/// Overwrites only the fields each record carries, on the first row whose
/// trimmed name equals the record's name. Records without a match are
/// listed in the report and otherwise ignored.
pub fn apply_import(rows: &mut [MergedGridRow], records: &[ImportedRecord]) -> ImportReport {
    let mut report = ImportReport::default();
    for rec in records {
        let Some(row) = rows.iter_mut().find(|r| r.name.trim() == rec.name) else {
            tracing::warn!(name = %rec.name, row = rec.row, "imported row matches no student");
            report.unmatched.push(rec.name.clone());
            continue;
        };
        for (target, value) in &rec.values {
            apply_value(row, target, value);
        }
        report.matched += 1;
    }
    report
}

/// Decodes `bytes`, reads `sheet` (or the first sheet) and applies it to
/// `rows`. `rows` is untouched unless the whole file decodes and validates.
pub fn import_workbook(
    bytes: &[u8],
    sheet: Option<&str>,
    mapping: &FieldMapping,
    rows: &mut [MergedGridRow],
) -> Result<ImportReport, CodecError> {
    let grid = match sheet {
        Some(name) => codec::decode_sheet(bytes, name)?,
        None => {
            let wb = codec::decode(bytes)?;
            wb.sheets()
                .first()
                .map(|s| s.grid.clone())
                .ok_or_else(|| CodecError::Decode("workbook contains no sheets".into()))?
        }
    };
    let records = import_rows(&grid, mapping)?;
    Ok(apply_import(rows, &records))
}

/// Header row plus one row per student, for export.
pub fn export_rows(rows: &[MergedGridRow], subjects: &[String]) -> TabularGrid {
    let mut header: Vec<CellValue> = vec!["Name".into()];
    header.extend(subjects.iter().map(|s| CellValue::from(s.as_str())));
    for h in [
        "Academic Status",
        "Social Status",
        "Emotional Status",
        "Economic Status",
        "Absences",
        "Notes",
    ] {
        header.push(h.into());
    }

    let mut out = vec![header];
    for row in rows {
        let mut cells: Vec<CellValue> = vec![row.name.as_str().into()];
        cells.extend(
            subjects
                .iter()
                .map(|s| row.grades.get(s).cloned().unwrap_or_default()),
        );
        cells.push(row.academic_status.as_str().into());
        cells.push(row.social_status.as_str().into());
        cells.push(row.emotional_status.as_str().into());
        cells.push(row.economic_status.as_str().into());
        cells.push(CellValue::Number(row.absences as f64));
        cells.push(row.notes.as_str().into());
        out.push(cells);
    }
    TabularGrid::from_rows(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ali() -> MergedGridRow {
        let mut row = MergedGridRow {
            student_id: "s1".into(),
            name: "Ali".into(),
            roster_name: "Ali".into(),
            ..Default::default()
        };
        row.grades.insert("Math".into(), CellValue::Number(70.0));
        row.grades.insert("Arabic".into(), CellValue::Number(80.0));
        row
    }

    #[test]
    fn headers_resolve_in_either_language() {
        let m = FieldMapping::builtin();
        assert_eq!(m.resolve(" الاسم "), Some(&TargetField::Name));
        assert_eq!(
            m.resolve("math"),
            Some(&TargetField::Grade {
                subject: "Math".into()
            })
        );
        assert_eq!(
            m.resolve("رياضيات"),
            Some(&TargetField::Grade {
                subject: "Math".into()
            })
        );
        assert_eq!(m.resolve("Shoe size"), None);
        assert_eq!(m.resolve(""), None);
    }

    #[test]
    fn extra_subjects_resolve_by_their_own_name() {
        let m = FieldMapping::builtin().with_subjects(&["History".to_string(), "Math".to_string()]);
        assert_eq!(
            m.resolve("History"),
            Some(&TargetField::Grade {
                subject: "History".into()
            })
        );
        let math_rules = m
            .fields
            .iter()
            .filter(|f| matches!(&f.target, TargetField::Grade { subject } if subject == "Math"))
            .count();
        assert_eq!(math_rules, 1);
    }

    #[test]
    fn import_overwrites_only_present_fields() {
        let sheet = TabularGrid::from_rows(vec![
            vec!["الاسم".into(), "رياضيات".into()],
            vec!["Ali".into(), CellValue::Number(95.0)],
        ]);
        let records = import_rows(&sheet, &FieldMapping::builtin()).expect("import");
        let mut rows = vec![ali()];
        let report = apply_import(&mut rows, &records);

        assert_eq!(report.matched, 1);
        assert_eq!(rows[0].name, "Ali");
        assert_eq!(rows[0].grades.get("Math"), Some(&CellValue::Number(95.0)));
        assert_eq!(rows[0].grades.get("Arabic"), Some(&CellValue::Number(80.0)));
    }

    #[test]
    fn blank_cells_do_not_erase_and_unmatched_rows_are_reported() {
        let sheet = TabularGrid::from_rows(vec![
            vec!["Name".into(), "Math".into(), "Notes".into()],
            vec!["Ali".into(), CellValue::Empty, "improving".into()],
            vec!["Nobody".into(), CellValue::Number(50.0)],
            vec![CellValue::Empty, CellValue::Number(99.0)],
        ]);
        let records = import_rows(&sheet, &FieldMapping::builtin()).expect("import");
        assert_eq!(records.len(), 2);

        let mut rows = vec![ali()];
        let report = apply_import(&mut rows, &records);
        assert_eq!(report.unmatched, vec!["Nobody".to_string()]);
        assert_eq!(rows[0].grades.get("Math"), Some(&CellValue::Number(70.0)));
        assert_eq!(rows[0].notes, "improving");
    }

    #[test]
    fn duplicate_names_update_the_first_match_only() {
        let sheet = TabularGrid::from_rows(vec![
            vec!["Name".into(), "Math".into()],
            vec!["Ali".into(), CellValue::Number(99.0)],
        ]);
        let records = import_rows(&sheet, &FieldMapping::builtin()).expect("import");
        let mut rows = vec![ali(), ali()];
        apply_import(&mut rows, &records);
        assert_eq!(rows[0].grades.get("Math"), Some(&CellValue::Number(99.0)));
        assert_eq!(rows[1].grades.get("Math"), Some(&CellValue::Number(70.0)));
    }

    #[test]
    fn invalid_absences_fail_the_whole_sheet() {
        let sheet = TabularGrid::from_rows(vec![
            vec!["Name".into(), "Absences".into()],
            vec!["Ali".into(), CellValue::Number(2.0)],
            vec!["Sara".into(), "many".into()],
        ]);
        let err = import_rows(&sheet, &FieldMapping::builtin()).expect_err("invalid");
        assert!(matches!(err, CodecError::InvalidField { row: 2, .. }));
    }

    #[test]
    fn sheet_without_name_column_is_rejected() {
        let sheet = TabularGrid::from_rows(vec![vec!["Math".into()], vec![CellValue::Number(1.0)]]);
        assert!(matches!(
            import_rows(&sheet, &FieldMapping::builtin()),
            Err(CodecError::MissingColumn(_))
        ));
    }

    #[test]
    fn export_has_header_and_one_row_per_student() {
        let grid = export_rows(&[ali()], &["Math".to_string(), "History".to_string()]);
        assert_eq!(grid.row_count(), 2);
        assert_eq!(grid.cell(0, 0), &CellValue::from("Name"));
        assert_eq!(grid.cell(0, 2), &CellValue::from("History"));
        assert_eq!(grid.cell(1, 1), &CellValue::Number(70.0));
        assert!(grid.cell(1, 2).is_empty());
    }
}
