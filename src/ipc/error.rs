use crate::codec::CodecError;
use crate::grid::GridError;
use crate::merge::PeriodError;
use crate::store::SaveError;
use crate::workbook::WorkbookError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

/// Collapses a handler body into one response frame.
pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

impl From<GridError> for HandlerErr {
    fn from(e: GridError) -> Self {
        let GridError::InvalidIndex { axis, index } = &e;
        let details = json!({ "axis": axis, "index": index });
        Self::new(e.code(), e.to_string()).with_details(details)
    }
}

impl From<WorkbookError> for HandlerErr {
    fn from(e: WorkbookError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<CodecError> for HandlerErr {
    fn from(e: CodecError) -> Self {
        let code = e.code();
        match &e {
            CodecError::InvalidField { row, header, .. } => {
                let details = json!({ "row": row, "header": header });
                Self::new(code, e.to_string()).with_details(details)
            }
            _ => Self::new(code, e.to_string()),
        }
    }
}

impl From<PeriodError> for HandlerErr {
    fn from(e: PeriodError) -> Self {
        Self::bad_params(e.to_string())
    }
}

impl From<SaveError> for HandlerErr {
    fn from(e: SaveError) -> Self {
        let details = json!({ "stage": e.stage, "key": e.key });
        Self::new("save_failed", e.to_string()).with_details(details)
    }
}
