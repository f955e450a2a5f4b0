use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::merge::AcademicPeriod;
use crate::store::SqliteStore;
use crate::workbook::WorkbookSession;
use serde::de::DeserializeOwned;

pub fn param_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn param_i64(req: &Request, key: &str) -> Result<i64, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing/invalid {key}")))
}

pub fn opt_i64(req: &Request, key: &str) -> Result<Option<i64>, HandlerErr> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be an integer"))),
    }
}

/// Deserializes `params[key]`, or `None` when absent.
pub fn opt_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<Option<T>, HandlerErr> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| HandlerErr::bad_params(format!("invalid {key}: {e}"))),
    }
}

pub fn param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, HandlerErr> {
    opt_param(req, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn period(req: &Request) -> Result<AcademicPeriod, HandlerErr> {
    let year = match req.params.get("year") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Err(HandlerErr::bad_params("missing year")),
    };
    let term = param_i64(req, "term")?;
    Ok(AcademicPeriod::new(year, term)?)
}

pub fn store_mut(state: &mut AppState) -> Result<&mut SqliteStore, HandlerErr> {
    state
        .store
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn session(state: &AppState) -> Result<&WorkbookSession, HandlerErr> {
    state
        .session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workbook", "open or create a workbook first"))
}

pub fn session_mut(state: &mut AppState) -> Result<&mut WorkbookSession, HandlerErr> {
    state
        .session
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workbook", "open or create a workbook first"))
}

pub fn db_err(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", format!("{e:#}"))
}

pub fn io_err(path: &str, e: std::io::Error) -> HandlerErr {
    HandlerErr::new("io_failed", format!("{path}: {e}"))
        .with_details(serde_json::json!({ "path": path }))
}
