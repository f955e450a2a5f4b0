use crate::codec;
use crate::config;
use crate::gradesheet::{self, FieldMapping, TargetField};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_err, io_err, opt_param, param, param_str, period, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::merge::{self, MergedGridRow};
use crate::store;
use crate::workbook::{self, Workbook};
use serde_json::json;
use std::collections::BTreeSet;

/// Sorted union of the grade keys present in `rows`.
fn known_subjects(rows: &[MergedGridRow]) -> Vec<String> {
    rows.iter()
        .flat_map(|r| r.grades.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn assessments_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_id = param_str(req, "classId")?;
    let period = period(req)?;
    let docs = store_mut(state)?;
    let rows = store::load_period(docs, class_id, &period).map_err(db_err)?;
    Ok(json!({ "period": period, "rows": rows }))
}

fn assessments_save(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let period = period(req)?;
    let rows: Vec<MergedGridRow> = param(req, "rows")?;
    let keep: fn(&MergedGridRow) -> bool =
        match req.params.get("filter").and_then(|v| v.as_str()).unwrap_or("name") {
            "name" => merge::has_name,
            "anyField" => merge::has_any_field,
            other => {
                return Err(HandlerErr::bad_params(format!(
                    "unknown filter: {other} (expected name or anyField)"
                )))
            }
        };
    let docs = store_mut(state)?;
    let summary = store::save_period(docs, &rows, &period, keep)?;
    Ok(json!(summary))
}

fn assessments_import_sheet(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_id = param_str(req, "classId")?;
    let period = period(req)?;
    let path = param_str(req, "path")?;
    let sheet = req.params.get("sheet").and_then(|v| v.as_str());
    let mapping: Option<FieldMapping> = opt_param(req, "mapping")?;
    let extra_subjects: Option<Vec<String>> = opt_param(req, "subjects")?;

    let docs = store_mut(state)?;
    let mapping = match mapping {
        Some(m) => m,
        None => config::field_mapping(docs.conn()).map_err(db_err)?,
    };
    let mut rows = store::load_period(docs, class_id, &period).map_err(db_err)?;
    // Columns for subjects the period already grades import under their own name.
    let mut subjects = known_subjects(&rows);
    subjects.extend(extra_subjects.unwrap_or_default());
    let mapping = mapping.with_subjects(&subjects);
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let report = gradesheet::import_workbook(&bytes, sheet, &mapping, &mut rows)?;
    tracing::info!(
        path,
        matched = report.matched,
        unmatched = report.unmatched.len(),
        "grade sheet imported"
    );
    // Not persisted here; the caller reviews the rows and saves them.
    Ok(json!({ "rows": rows, "report": report }))
}

fn assessments_export_sheet(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_id = param_str(req, "classId")?;
    let period = period(req)?;
    let path = param_str(req, "path")?;
    let subjects: Option<Vec<String>> = opt_param(req, "subjects")?;

    let docs = store_mut(state)?;
    let rows = store::load_period(docs, class_id, &period).map_err(db_err)?;
    let subjects = subjects.unwrap_or_else(|| known_subjects(&rows));

    let sheet_name = workbook::sanitize_sheet_name(&format!("{} T{}", period.year, period.term));
    let mut workbook = Workbook::new();
    workbook.add_sheet(&sheet_name, gradesheet::export_rows(&rows, &subjects))?;
    let bytes = codec::encode(&workbook)?;
    std::fs::write(path, &bytes).map_err(|e| io_err(path, e))?;
    tracing::info!(path, students = rows.len(), "grade sheet exported");
    Ok(json!({ "path": path, "sheet": sheet_name, "rowsExported": rows.len() }))
}

fn mapping_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let docs = store_mut(state)?;
    let mapping = config::field_mapping(docs.conn()).map_err(db_err)?;
    Ok(json!({ "mapping": mapping }))
}

fn mapping_set(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let mapping: FieldMapping = param(req, "mapping")?;
    // Import cannot work without a name column.
    if !mapping.fields.iter().any(|f| f.target == TargetField::Name) {
        return Err(HandlerErr::bad_params("mapping must include a name field"));
    }
    let docs = store_mut(state)?;
    config::save_field_mapping(docs.conn(), &mapping).map_err(db_err)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assessments.open" => assessments_open(state, req),
        "assessments.save" => assessments_save(state, req),
        "assessments.importSheet" => assessments_import_sheet(state, req),
        "assessments.exportSheet" => assessments_export_sheet(state, req),
        "settings.importMapping.get" => mapping_get(state, req),
        "settings.importMapping.set" => mapping_set(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
