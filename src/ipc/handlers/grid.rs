use crate::cell::CellValue;
use crate::codec::{MAX_COLS, MAX_ROWS};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{opt_i64, param_i64, session, session_mut};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Accepts `null`, a number or a string; anything else is rejected.
fn cell_from_json(v: Option<&serde_json::Value>) -> Result<CellValue, HandlerErr> {
    match v {
        None | Some(serde_json::Value::Null) => Ok(CellValue::Empty),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .map(CellValue::Number)
            .ok_or_else(|| HandlerErr::bad_params("value is not a representable number")),
        Some(serde_json::Value::String(s)) => Ok(CellValue::text(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(
            "value must be null, a number or a string",
        )),
    }
}

/// Writes past what a sheet can hold are refused before the grid grows.
fn check_bounds(row: i64, col: i64) -> Result<(), HandlerErr> {
    if row >= MAX_ROWS as i64 || col >= MAX_COLS as i64 {
        return Err(HandlerErr::new("invalid_index", "cell lies outside the sheet limits")
            .with_details(json!({ "row": row, "col": col, "maxRows": MAX_ROWS, "maxCols": MAX_COLS })));
    }
    Ok(())
}

fn grid_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let max_rows = state.config.max_grid_rows;
    let max_cols = state.config.max_grid_cols;
    let session = session(state)?;
    let grid = session.active_grid();

    let row_start = opt_i64(req, "rowStart")?.unwrap_or(0);
    let col_start = opt_i64(req, "colStart")?.unwrap_or(0);
    if row_start < 0 || col_start < 0 {
        return Err(HandlerErr::bad_params("rowStart/colStart must be >= 0")
            .with_details(json!({ "rowStart": row_start, "colStart": col_start })));
    }
    if row_start >= MAX_ROWS as i64 || col_start >= MAX_COLS as i64 {
        return Err(HandlerErr::bad_params("rowStart/colStart lie outside the sheet limits")
            .with_details(json!({
                "rowStart": row_start,
                "colStart": col_start,
                "maxRows": MAX_ROWS,
                "maxCols": MAX_COLS
            })));
    }
    let row_count_req = opt_i64(req, "rowCount")?;
    let col_count_req = opt_i64(req, "colCount")?;
    if row_count_req.is_some_and(|n| n < 0) || col_count_req.is_some_and(|n| n < 0) {
        return Err(HandlerErr::bad_params("rowCount/colCount must be >= 0")
            .with_details(json!({ "rowCount": row_count_req, "colCount": col_count_req })));
    }
    if row_count_req.is_some_and(|n| n > max_rows) || col_count_req.is_some_and(|n| n > max_cols) {
        return Err(HandlerErr::bad_params("requested grid range is too large").with_details(json!({
            "rowCount": row_count_req,
            "colCount": col_count_req,
            "maxRows": max_rows,
            "maxCols": max_cols
        })));
    }

    // Without explicit counts the window covers the rest of the sheet, capped.
    let total_rows = grid.row_count() as i64;
    let total_cols = grid.column_count() as i64;
    let rest_rows = (total_rows - row_start).max(0);
    let rest_cols = (total_cols - col_start).max(0);
    let row_count = row_count_req.unwrap_or(rest_rows.min(max_rows));
    let col_count = col_count_req.unwrap_or(rest_cols.min(max_cols));
    let truncated = (row_count_req.is_none() && rest_rows > max_rows)
        || (col_count_req.is_none() && rest_cols > max_cols);

    let cells: Vec<Vec<CellValue>> = (row_start..row_start.saturating_add(row_count))
        .map(|r| {
            (col_start..col_start.saturating_add(col_count))
                .map(|c| grid.cell(r as usize, c as usize).clone())
                .collect()
        })
        .collect();

    Ok(json!({
        "sheet": session.active_name(),
        "rowCount": total_rows,
        "colCount": total_cols,
        "rowStart": row_start,
        "colStart": col_start,
        "truncated": truncated,
        "cells": cells,
    }))
}

fn grid_set_cell(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let row = param_i64(req, "row")?;
    let col = param_i64(req, "col")?;
    check_bounds(row, col)?;
    let value = cell_from_json(req.params.get("value"))?;
    let grid = session_mut(state)?.active_grid_mut();
    grid.set_cell(row, col, value)?;
    Ok(json!({
        "ok": true,
        "rowCount": grid.row_count(),
        "colCount": grid.column_count(),
    }))
}

fn edit_error(row: i64, col: i64, code: &str, message: String) -> serde_json::Value {
    json!({ "row": row, "col": col, "code": code, "message": message })
}

fn grid_bulk_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let max_edits = state.config.max_bulk_edits;
    let Some(edits_arr) = req.params.get("edits").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing edits[]"));
    };
    let grid = session_mut(state)?.active_grid_mut();

    if edits_arr.len() > max_edits {
        let rejected = edits_arr.len();
        tracing::warn!(rejected, max_edits, "bulk update over limit; nothing applied");
        return Ok(json!({
            "ok": true,
            "updated": 0,
            "rejected": rejected,
            "limitExceeded": true,
            "errors": [edit_error(
                -1,
                -1,
                "too_many_edits",
                format!("bulk payload exceeds max edits: {} > {}", rejected, max_edits),
            )]
        }));
    }

    let mut updated: usize = 0;
    let mut errors: Vec<serde_json::Value> = Vec::new();

    for (i, edit) in edits_arr.iter().enumerate() {
        let Some(obj) = edit.as_object() else {
            errors.push(edit_error(-1, -1, "bad_params", format!("edit at index {} must be an object", i)));
            continue;
        };
        let row = match obj.get("row").and_then(|v| v.as_i64()) {
            Some(v) if v >= 0 => v,
            _ => {
                errors.push(edit_error(-1, -1, "bad_params", format!("edit at index {} missing/invalid row", i)));
                continue;
            }
        };
        let col = match obj.get("col").and_then(|v| v.as_i64()) {
            Some(v) if v >= 0 => v,
            _ => {
                errors.push(edit_error(row, -1, "bad_params", format!("edit at index {} missing/invalid col", i)));
                continue;
            }
        };
        if let Err(e) = check_bounds(row, col) {
            errors.push(edit_error(row, col, e.code, e.message));
            continue;
        }
        let value = match cell_from_json(obj.get("value")) {
            Ok(v) => v,
            Err(e) => {
                errors.push(edit_error(row, col, e.code, e.message));
                continue;
            }
        };
        match grid.set_cell(row, col, value) {
            Ok(()) => updated += 1,
            Err(e) => errors.push(edit_error(row, col, e.code(), e.to_string())),
        }
    }

    let rejected = errors.len();
    if rejected > 0 {
        tracing::warn!(updated, rejected, "bulk update rejected some edits");
        return Ok(json!({
            "ok": true,
            "updated": updated,
            "rejected": rejected,
            "errors": errors,
        }));
    }
    Ok(json!({ "ok": true, "updated": updated }))
}

fn grid_insert_row(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let after = param_i64(req, "after")?;
    let grid = session_mut(state)?.active_grid_mut();
    let index = grid.insert_row_after(after)?;
    Ok(json!({ "index": index, "rowCount": grid.row_count() }))
}

fn grid_insert_column(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let after = param_i64(req, "after")?;
    let grid = session_mut(state)?.active_grid_mut();
    let index = grid.insert_column_after(after)?;
    Ok(json!({ "index": index, "colCount": grid.column_count() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grid.get" => grid_get(state, req),
        "grid.setCell" => grid_set_cell(state, req),
        "grid.bulkUpdate" => grid_bulk_update(state, req),
        "grid.insertRow" => grid_insert_row(state, req),
        "grid.insertColumn" => grid_insert_column(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
