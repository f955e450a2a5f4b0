use crate::codec;
use crate::grid::TabularGrid;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{io_err, opt_i64, param_str, session, session_mut};
use crate::ipc::types::{AppState, Request};
use crate::workbook::{Workbook, WorkbookSession};
use serde_json::json;

/// Size of the blank template behind `workbook.new` and `workbook.addSheet`.
const BLANK_ROWS: i64 = 20;
const BLANK_COLS: i64 = 10;
const DEFAULT_SHEET_NAME: &str = "Sheet1";

fn sheets_json(session: &WorkbookSession) -> serde_json::Value {
    let sheets: Vec<serde_json::Value> = session
        .workbook()
        .sheets()
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "rowCount": s.grid.row_count(),
                "colCount": s.grid.column_count(),
            })
        })
        .collect();
    json!({ "sheets": sheets, "active": session.active_name() })
}

fn blank_dims(req: &Request) -> Result<(i64, i64), HandlerErr> {
    Ok((
        opt_i64(req, "rows")?.unwrap_or(BLANK_ROWS),
        opt_i64(req, "cols")?.unwrap_or(BLANK_COLS),
    ))
}

fn workbook_new(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = req
        .params
        .get("sheetName")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_SHEET_NAME);
    let (rows, cols) = blank_dims(req)?;
    let session = WorkbookSession::new(Workbook::blank(name, rows, cols)?)?;
    let out = sheets_json(&session);
    state.session = Some(session);
    Ok(out)
}

fn workbook_import(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = param_str(req, "path")?;
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    // Decode fully before replacing the open workbook.
    let workbook = codec::decode(&bytes)?;
    let session = WorkbookSession::new(workbook)?;
    tracing::info!(path, sheets = session.workbook().len(), "workbook imported");
    let out = sheets_json(&session);
    state.session = Some(session);
    Ok(out)
}

fn workbook_export(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = param_str(req, "path")?;
    let session = session(state)?;
    let bytes = codec::encode(session.workbook())?;
    std::fs::write(path, &bytes).map_err(|e| io_err(path, e))?;
    tracing::info!(path, sheets = session.workbook().len(), bytes = bytes.len(), "workbook exported");
    Ok(json!({ "path": path, "bytes": bytes.len() }))
}

fn workbook_sheets(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(sheets_json(session(state)?))
}

fn workbook_select_sheet(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = param_str(req, "name")?;
    let session = session_mut(state)?;
    session.select(name)?;
    Ok(sheets_json(session))
}

fn workbook_add_sheet(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = param_str(req, "name")?;
    let (rows, cols) = blank_dims(req)?;
    let grid = TabularGrid::create(rows, cols)?;
    let session = session_mut(state)?;
    session.add_sheet(name, grid)?;
    Ok(sheets_json(session))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "workbook.new" => workbook_new(state, req),
        "workbook.import" => workbook_import(state, req),
        "workbook.export" => workbook_export(state, req),
        "workbook.sheets" => workbook_sheets(state, req),
        "workbook.selectSheet" => workbook_select_sheet(state, req),
        "workbook.addSheet" => workbook_add_sheet(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
