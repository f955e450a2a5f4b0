pub mod analytics;
pub mod assessments;
pub mod core;
pub mod grid;
pub mod students;
pub mod workbook;
