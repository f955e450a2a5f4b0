use crate::merge::{
    self, assessment_key, AcademicPeriod, MergedGridRow, SplitResult, StudentRosterRecord,
    TermAssessmentRecord,
};
use anyhow::{anyhow, Context};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub const STUDENTS: &str = "students";
pub const ASSESSMENTS: &str = "assessments";

/// Key-value document store the grade core persists through.
///
/// Writes are last-write-wins per key; there is no concurrency token.
pub trait DocumentStore {
    fn get_document(&self, collection: &str, key: &str) -> anyhow::Result<Option<Value>>;
    fn upsert_document(&mut self, collection: &str, key: &str, doc: &Value) -> anyhow::Result<()>;
    /// All documents of a collection, ordered by key.
    fn list_documents(&self, collection: &str) -> anyhow::Result<Vec<(String, Value)>>;
    fn delete_document(&mut self, collection: &str, key: &str) -> anyhow::Result<bool>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl DocumentStore for SqliteStore {
    fn get_document(&self, collection: &str, key: &str) -> anyhow::Result<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ? AND key = ?",
                (collection, key),
                |r| r.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).context("corrupt document body"))
            .transpose()
    }

    fn upsert_document(&mut self, collection: &str, key: &str, doc: &Value) -> anyhow::Result<()> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO documents(collection, key, body, updated_at)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(collection, key) DO UPDATE SET
               body = excluded.body,
               updated_at = excluded.updated_at",
            (collection, key, serde_json::to_string(doc)?, updated_at),
        )?;
        Ok(())
    }

    fn list_documents(&self, collection: &str) -> anyhow::Result<Vec<(String, Value)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, body FROM documents WHERE collection = ? ORDER BY key")?;
        let rows = stmt
            .query_map([collection], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(k, b)| -> anyhow::Result<(String, Value)> {
                let v: Value = serde_json::from_str(&b)
                    .with_context(|| format!("corrupt document {collection}/{k}"))?;
                Ok((k, v))
            })
            .collect()
    }

    fn delete_document(&mut self, collection: &str, key: &str) -> anyhow::Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM documents WHERE collection = ? AND key = ?",
            (collection, key),
        )?;
        Ok(n > 0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    docs: BTreeMap<(String, String), Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.docs.keys().filter(|(c, _)| c == collection).count()
    }
}

impl DocumentStore for MemoryStore {
    fn get_document(&self, collection: &str, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self
            .docs
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }

    fn upsert_document(&mut self, collection: &str, key: &str, doc: &Value) -> anyhow::Result<()> {
        self.docs
            .insert((collection.to_string(), key.to_string()), doc.clone());
        Ok(())
    }

    fn list_documents(&self, collection: &str) -> anyhow::Result<Vec<(String, Value)>> {
        Ok(self
            .docs
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }

    fn delete_document(&mut self, collection: &str, key: &str) -> anyhow::Result<bool> {
        Ok(self
            .docs
            .remove(&(collection.to_string(), key.to_string()))
            .is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveStage {
    RosterUpdate,
    AssessmentUpsert,
}

impl fmt::Display for SaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStage::RosterUpdate => f.write_str("roster update"),
            SaveStage::AssessmentUpsert => f.write_str("assessment upsert"),
        }
    }
}

/// A store failure with the save step and document key it happened on.
/// Writes made before the failure are not rolled back.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed for {key}: {cause:#}")]
pub struct SaveError {
    pub stage: SaveStage,
    pub key: String,
    pub cause: anyhow::Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub roster_updated: usize,
    pub assessments_upserted: usize,
    pub skipped: usize,
}

pub fn list_roster(store: &dyn DocumentStore, class_id: &str) -> anyhow::Result<Vec<StudentRosterRecord>> {
    let mut roster = Vec::new();
    for (key, doc) in store.list_documents(STUDENTS)? {
        let rec: StudentRosterRecord = serde_json::from_value(doc)
            .with_context(|| format!("bad student document {key}"))?;
        if rec.class_id == class_id {
            roster.push(rec);
        }
    }
    roster.sort_by_key(|s| s.sort_order);
    Ok(roster)
}

pub fn create_student(
    store: &mut dyn DocumentStore,
    class_id: &str,
    name: &str,
) -> anyhow::Result<StudentRosterRecord> {
    let next_order = list_roster(store, class_id)?
        .last()
        .map(|s| s.sort_order + 1)
        .unwrap_or(0);
    let rec = StudentRosterRecord {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        class_id: class_id.to_string(),
        sort_order: next_order,
    };
    store.upsert_document(STUDENTS, &rec.id, &serde_json::to_value(&rec)?)?;
    Ok(rec)
}

pub fn rename_student(
    store: &mut dyn DocumentStore,
    student_id: &str,
    name: &str,
) -> anyhow::Result<StudentRosterRecord> {
    let doc = store
        .get_document(STUDENTS, student_id)?
        .ok_or_else(|| anyhow!("student not found: {student_id}"))?;
    let mut rec: StudentRosterRecord = serde_json::from_value(doc)?;
    rec.name = name.trim().to_string();
    store.upsert_document(STUDENTS, student_id, &serde_json::to_value(&rec)?)?;
    Ok(rec)
}

/// Removes the roster entry and every per-period record keyed to it.
/// Returns false when the student did not exist.
pub fn delete_student(store: &mut dyn DocumentStore, student_id: &str) -> anyhow::Result<bool> {
    if !store.delete_document(STUDENTS, student_id)? {
        return Ok(false);
    }
    let prefix = format!("{student_id}_");
    let keys: Vec<String> = store
        .list_documents(ASSESSMENTS)?
        .into_iter()
        .map(|(k, _)| k)
        .filter(|k| k.starts_with(&prefix))
        .collect();
    for k in keys {
        store.delete_document(ASSESSMENTS, &k)?;
    }
    Ok(true)
}

/// Roster of `class_id` joined with its records for `period`.
pub fn load_period(
    store: &dyn DocumentStore,
    class_id: &str,
    period: &AcademicPeriod,
) -> anyhow::Result<Vec<MergedGridRow>> {
    let roster = list_roster(store, class_id)?;
    let mut assessments = Vec::new();
    for s in &roster {
        let key = assessment_key(&s.id, period);
        let Some(doc) = store.get_document(ASSESSMENTS, &key)? else {
            continue;
        };
        let mut rec: TermAssessmentRecord = serde_json::from_value(doc)
            .with_context(|| format!("bad assessment document {key}"))?;
        if !rec.is_for(&s.id, period) {
            tracing::warn!(%key, "assessment document does not match its key; ignored");
            continue;
        }
        if rec.id.is_none() {
            rec.id = Some(key);
        }
        assessments.push(rec);
    }
    Ok(merge::merge(&roster, &assessments, period))
}

/// Splits `rows` and writes renames then upserts, stopping at the first
/// store failure.
pub fn save_period<F>(
    store: &mut dyn DocumentStore,
    rows: &[MergedGridRow],
    period: &AcademicPeriod,
    keep: F,
) -> Result<SaveSummary, SaveError>
where
    F: Fn(&MergedGridRow) -> bool,
{
    let SplitResult {
        roster_updates,
        assessment_upserts,
        skipped,
    } = merge::split(rows, period, keep);

    for u in &roster_updates {
        rename_student(store, &u.student_id, &u.name).map_err(|cause| SaveError {
            stage: SaveStage::RosterUpdate,
            key: u.student_id.clone(),
            cause,
        })?;
    }
    for u in &assessment_upserts {
        serde_json::to_value(&u.record)
            .map_err(anyhow::Error::from)
            .and_then(|doc| store.upsert_document(ASSESSMENTS, &u.id, &doc))
            .map_err(|cause| SaveError {
                stage: SaveStage::AssessmentUpsert,
                key: u.id.clone(),
                cause,
            })?;
    }

    let summary = SaveSummary {
        roster_updated: roster_updates.len(),
        assessments_upserted: assessment_upserts.len(),
        skipped,
    };
    tracing::info!(
        year = %period.year,
        term = period.term,
        roster_updated = summary.roster_updated,
        upserted = summary.assessments_upserted,
        skipped = summary.skipped,
        "saved grade rows"
    );
    Ok(summary)
}
