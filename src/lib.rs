pub mod aggregate;
pub mod band;
pub mod cell;
pub mod codec;
pub mod config;
pub mod db;
pub mod gradesheet;
pub mod grid;
pub mod ipc;
pub mod merge;
pub mod stats;
pub mod store;
pub mod workbook;
