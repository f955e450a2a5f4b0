use crate::cell::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const TERMS_PER_YEAR: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("year must not be blank")]
    BlankYear,
    #[error("term must be between 1 and 4 (got {0})")]
    InvalidTerm(i64),
}

/// A grading period: school year plus one of its four terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcademicPeriod {
    pub year: String,
    pub term: u8,
}

impl AcademicPeriod {
    pub fn new(year: impl Into<String>, term: i64) -> Result<Self, PeriodError> {
        let year = year.into().trim().to_string();
        if year.is_empty() {
            return Err(PeriodError::BlankYear);
        }
        if !(1..=TERMS_PER_YEAR as i64).contains(&term) {
            return Err(PeriodError::InvalidTerm(term));
        }
        Ok(Self {
            year,
            term: term as u8,
        })
    }
}

/// Document key of a student's record for one period.
pub fn assessment_key(student_id: &str, period: &AcademicPeriod) -> String {
    format!("{}_{}_{}", student_id, period.year, period.term)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRosterRecord {
    pub id: String,
    pub name: String,
    pub class_id: String,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermAssessmentRecord {
    /// Key the record is stored under, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub student_id: String,
    pub year: String,
    pub term: u8,
    #[serde(default)]
    pub grades: BTreeMap<String, CellValue>,
    #[serde(default)]
    pub academic_status: String,
    #[serde(default)]
    pub social_status: String,
    #[serde(default)]
    pub emotional_status: String,
    #[serde(default)]
    pub economic_status: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub absences: u32,
}

impl TermAssessmentRecord {
    pub fn is_for(&self, student_id: &str, period: &AcademicPeriod) -> bool {
        self.student_id == student_id && self.year == period.year && self.term == period.term
    }
}

/// What a grade grid shows and edits for one student in one period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedGridRow {
    pub student_id: String,
    #[serde(default)]
    pub class_id: String,
    pub name: String,
    /// Roster name at load time.
    #[serde(default)]
    pub roster_name: String,
    #[serde(default)]
    pub assessment_id: Option<String>,
    #[serde(default)]
    pub grades: BTreeMap<String, CellValue>,
    #[serde(default)]
    pub academic_status: String,
    #[serde(default)]
    pub social_status: String,
    #[serde(default)]
    pub emotional_status: String,
    #[serde(default)]
    pub economic_status: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub absences: u32,
}

/// One row per roster entry, in roster order. Students without a record for
/// `period` get defaults rather than being dropped.
pub fn merge(
    roster: &[StudentRosterRecord],
    assessments: &[TermAssessmentRecord],
    period: &AcademicPeriod,
) -> Vec<MergedGridRow> {
    let mut by_student: HashMap<&str, &TermAssessmentRecord> = HashMap::new();
    for a in assessments {
        if a.year == period.year && a.term == period.term {
            by_student.entry(a.student_id.as_str()).or_insert(a);
        }
    }

    roster
        .iter()
        .map(|s| {
            let mut row = MergedGridRow {
                student_id: s.id.clone(),
                class_id: s.class_id.clone(),
                name: s.name.clone(),
                roster_name: s.name.clone(),
                ..MergedGridRow::default()
            };
            if let Some(a) = by_student.get(s.id.as_str()) {
                row.assessment_id = a.id.clone();
                row.grades = a.grades.clone();
                row.academic_status = a.academic_status.clone();
                row.social_status = a.social_status.clone();
                row.emotional_status = a.emotional_status.clone();
                row.economic_status = a.economic_status.clone();
                row.notes = a.notes.clone();
                row.absences = a.absences;
            }
            row
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterUpdate {
    pub student_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentUpsert {
    pub id: String,
    pub record: TermAssessmentRecord,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResult {
    pub roster_updates: Vec<RosterUpdate>,
    pub assessment_upserts: Vec<AssessmentUpsert>,
    /// Rows the filter kept out of the assessment upserts.
    pub skipped: usize,
}

/// Grade rows are saved only when they name a student.
pub fn has_name(row: &MergedGridRow) -> bool {
    !row.name.trim().is_empty()
}

/// Plan-style rows are saved when anything at all was entered.
pub fn has_any_field(row: &MergedGridRow) -> bool {
    has_name(row)
        || row.grades.values().any(|v| !v.is_empty())
        || [
            &row.academic_status,
            &row.social_status,
            &row.emotional_status,
            &row.economic_status,
            &row.notes,
        ]
        .iter()
        .any(|s| !s.trim().is_empty())
        || row.absences > 0
}

/// Splits edited rows back into roster renames and per-period upserts.
///
/// Upsert ids are the row's known assessment id, otherwise the derived
/// [`assessment_key`], so saving the same rows twice targets the same
/// records. `keep` decides which rows produce an upsert. Renames are only
/// emitted for non-blank names that differ from the loaded roster name.
pub fn split<F>(rows: &[MergedGridRow], period: &AcademicPeriod, keep: F) -> SplitResult
where
    F: Fn(&MergedGridRow) -> bool,
{
    let mut out = SplitResult::default();
    for row in rows {
        let name = row.name.trim();
        if !row.student_id.is_empty() && !name.is_empty() && name != row.roster_name.trim() {
            out.roster_updates.push(RosterUpdate {
                student_id: row.student_id.clone(),
                name: name.to_string(),
            });
        }

        if row.student_id.is_empty() || !keep(row) {
            out.skipped += 1;
            continue;
        }
        let id = row
            .assessment_id
            .clone()
            .unwrap_or_else(|| assessment_key(&row.student_id, period));
        let grades = row
            .grades
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.assessment_upserts.push(AssessmentUpsert {
            id: id.clone(),
            record: TermAssessmentRecord {
                id: Some(id),
                student_id: row.student_id.clone(),
                year: period.year.clone(),
                term: period.term,
                grades,
                academic_status: row.academic_status.clone(),
                social_status: row.social_status.clone(),
                emotional_status: row.emotional_status.clone(),
                economic_status: row.economic_status.clone(),
                notes: row.notes.clone(),
                absences: row.absences,
            },
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn period() -> AcademicPeriod {
        AcademicPeriod::new("2024-2025", 2).expect("period")
    }

    fn roster() -> Vec<StudentRosterRecord> {
        ["Ali", "Sara", ""]
            .iter()
            .enumerate()
            .map(|(i, n)| StudentRosterRecord {
                id: format!("s{i}"),
                name: n.to_string(),
                class_id: "c1".into(),
                sort_order: i as i64,
            })
            .collect()
    }

    #[test]
    fn period_validates_term_and_year() {
        assert_eq!(AcademicPeriod::new("2024", 0), Err(PeriodError::InvalidTerm(0)));
        assert_eq!(AcademicPeriod::new("2024", 5), Err(PeriodError::InvalidTerm(5)));
        assert_eq!(AcademicPeriod::new(" ", 1), Err(PeriodError::BlankYear));
        assert_eq!(assessment_key("s1", &period()), "s1_2024-2025_2");
    }

    #[test]
    fn every_roster_student_appears_with_defaults() {
        let mut math = TermAssessmentRecord {
            student_id: "s1".into(),
            year: "2024-2025".into(),
            term: 2,
            absences: 3,
            ..Default::default()
        };
        math.grades.insert("Math".into(), CellValue::Number(88.0));
        let other_term = TermAssessmentRecord {
            student_id: "s0".into(),
            year: "2024-2025".into(),
            term: 1,
            absences: 9,
            ..Default::default()
        };

        let rows = merge(&roster(), &[math, other_term], &period());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].name, "Ali");
        assert_eq!(rows[0].absences, 0);
        assert!(rows[0].grades.is_empty());
        assert_eq!(rows[1].absences, 3);
        assert_eq!(rows[1].grades.get("Math"), Some(&CellValue::Number(88.0)));
        assert_eq!(rows[2].student_id, "s2");
    }

    #[test]
    fn split_twice_yields_the_same_ids() {
        let rows = merge(&roster(), &[], &period());
        let a = split(&rows, &period(), has_name);
        let b = split(&rows, &period(), has_name);
        let ids = |s: &SplitResult| s.assessment_upserts.iter().map(|u| u.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), vec!["s0_2024-2025_2", "s1_2024-2025_2"]);
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.skipped, 1);
    }

    #[test]
    fn known_assessment_id_is_reused() {
        let mut rows = merge(&roster(), &[], &period());
        rows[0].assessment_id = Some("legacy-123".into());
        let s = split(&rows, &period(), has_name);
        assert_eq!(s.assessment_upserts[0].id, "legacy-123");
    }

    #[test]
    fn filter_predicate_is_pluggable() {
        let mut rows = merge(&roster(), &[], &period());
        rows[2].notes = "needs follow-up".into();
        assert_eq!(split(&rows, &period(), has_name).assessment_upserts.len(), 2);
        assert_eq!(split(&rows, &period(), has_any_field).assessment_upserts.len(), 3);
    }

    #[test]
    fn only_changed_names_become_roster_updates() {
        let mut rows = merge(&roster(), &[], &period());
        rows[1].name = "Sara K.".into();
        rows[0].name = "  ".into();
        let s = split(&rows, &period(), has_name);
        assert_eq!(
            s.roster_updates,
            vec![RosterUpdate {
                student_id: "s1".into(),
                name: "Sara K.".into()
            }]
        );
    }
}
