use std::path::PathBuf;

use crate::config::DaemonConfig;
use crate::store::SqliteStore;
use crate::workbook::WorkbookSession;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    /// Workbook currently open for grid editing and analytics.
    pub session: Option<WorkbookSession>,
    pub config: DaemonConfig,
}

impl AppState {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            workspace: None,
            store: None,
            session: None,
            config,
        }
    }
}
