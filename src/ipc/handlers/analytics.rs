use crate::aggregate::{self, SheetReport};
use crate::band;
use crate::cell::CellValue;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{param, param_i64, session};
use crate::ipc::types::{AppState, Request};
use crate::stats::{self, SelectionRange};
use crate::workbook::WorkbookSession;
use serde_json::json;

fn active_report(session: &WorkbookSession) -> SheetReport {
    let summary = aggregate::summarize(session.active_grid());
    let insights = aggregate::insights(&summary, session.workbook().len());
    SheetReport {
        name: session.active_name().to_string(),
        summary,
        insights,
    }
}

fn stats_range(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let range = SelectionRange::new(
        param_i64(req, "rowStart")?,
        param_i64(req, "colStart")?,
        param_i64(req, "rowEnd")?,
        param_i64(req, "colEnd")?,
    );
    let grid = session(state)?.active_grid();
    Ok(json!(stats::compute(grid, range)))
}

fn stats_sheet(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let report = active_report(session(state)?);
    let columns: Vec<serde_json::Value> = report
        .summary
        .columns
        .iter()
        .map(|c| {
            json!({
                "index": c.index,
                "count": c.count,
                "numericCount": c.numeric_count,
                "average": aggregate::display_stat(c.average),
                "min": aggregate::display_stat(c.min),
                "max": aggregate::display_stat(c.max),
            })
        })
        .collect();
    Ok(json!({
        "sheet": report.name,
        "summary": report.summary,
        "fillRatio": report.summary.fill_ratio(),
        "numericRatio": report.summary.numeric_ratio(),
        "columns": columns,
        "insights": report.insights,
    }))
}

fn stats_workbook(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let reports = aggregate::summarize_workbook(session(state)?.workbook());
    Ok(json!({ "sheets": reports }))
}

fn analysis_context(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session(state)?;
    let report = active_report(session);
    Ok(aggregate::analysis_context(
        &report,
        &session.workbook().sheet_names(),
    ))
}

fn grades_classify(_state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let values: Vec<CellValue> = param(req, "values")?;
    let bands: Vec<&str> = values.iter().map(|v| band::classify(v).as_str()).collect();
    let distribution: Vec<serde_json::Value> = band::distribution(&values)
        .into_iter()
        .map(|(b, count)| json!({ "band": b, "count": count }))
        .collect();
    Ok(json!({ "bands": bands, "distribution": distribution }))
}

fn grades_rates(_state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let values: Vec<CellValue> = param(req, "values")?;
    Ok(json!(band::rates(&values)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "stats.range" => stats_range(state, req),
        "stats.sheet" => stats_sheet(state, req),
        "stats.workbook" => stats_workbook(state, req),
        "analysis.context" => analysis_context(state, req),
        "grades.classify" => grades_classify(state, req),
        "grades.rates" => grades_rates(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
