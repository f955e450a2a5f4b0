use crate::db;
use crate::gradesheet::FieldMapping;
use anyhow::Context;
use rusqlite::Connection;
use std::str::FromStr;

pub const LOG_ENV: &str = "GRADEBOOKD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Workspace setting holding the saved import `FieldMapping`.
pub const FIELD_MAPPING_KEY: &str = "import.fieldMapping";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub log_filter: String,
    pub max_grid_rows: i64,
    pub max_grid_cols: i64,
    pub max_bulk_edits: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            max_grid_rows: 2000,
            max_grid_cols: 256,
            max_bulk_edits: 5000,
        }
    }
}

fn parse_limit<T: FromStr + PartialOrd + Default>(key: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => v,
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid limit; using default");
            default
        }
    }
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            log_filter: lookup(LOG_ENV)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(d.log_filter),
            max_grid_rows: parse_limit(
                "GRADEBOOKD_MAX_GRID_ROWS",
                lookup("GRADEBOOKD_MAX_GRID_ROWS"),
                d.max_grid_rows,
            ),
            max_grid_cols: parse_limit(
                "GRADEBOOKD_MAX_GRID_COLS",
                lookup("GRADEBOOKD_MAX_GRID_COLS"),
                d.max_grid_cols,
            ),
            max_bulk_edits: parse_limit(
                "GRADEBOOKD_MAX_BULK_EDITS",
                lookup("GRADEBOOKD_MAX_BULK_EDITS"),
                d.max_bulk_edits,
            ),
        }
    }
}

/// The saved import mapping, or the built-in one when none is stored.
pub fn field_mapping(conn: &Connection) -> anyhow::Result<FieldMapping> {
    match db::settings_get_json(conn, FIELD_MAPPING_KEY)? {
        Some(v) => serde_json::from_value(v).context("invalid saved import mapping"),
        None => Ok(FieldMapping::builtin()),
    }
}

pub fn save_field_mapping(conn: &Connection, mapping: &FieldMapping) -> anyhow::Result<()> {
    db::settings_set_json(conn, FIELD_MAPPING_KEY, &serde_json::to_value(mapping)?)
}
