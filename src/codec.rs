use crate::cell::CellValue;
use crate::grid::TabularGrid;
use crate::workbook::{Workbook, WorkbookError};
use calamine::{Data, Range, Reader, Xlsx};
use std::io::Cursor;
use thiserror::Error;

/// xlsx sheet limits.
pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_COLS: usize = 16_384;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not a readable workbook: {0}")]
    Decode(String),
    #[error("sheet not found: {0}")]
    SheetNotFound(String),
    #[error("failed to write workbook: {0}")]
    Encode(String),
    #[error("sheet {0} exceeds spreadsheet size limits")]
    TooLarge(String),
    #[error("missing required column: {0}")]
    MissingColumn(String),
    #[error("row {row}, column {header}: {message}")]
    InvalidField {
        row: usize,
        header: String,
        message: String,
    },
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

impl CodecError {
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::Decode(_) => "decode_failed",
            CodecError::SheetNotFound(_) => "sheet_not_found",
            CodecError::Encode(_) | CodecError::TooLarge(_) => "encode_failed",
            CodecError::MissingColumn(_) | CodecError::InvalidField { .. } => "invalid_import",
            CodecError::Workbook(e) => e.code(),
        }
    }
}

/// Undoes the `_xHHHH_` escaping xlsx writers apply to control characters
/// and to literal `_xHHHH_` text (written as `_x005F_xHHHH_`).
fn unescape_xml_text(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = tail
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .filter(|_| tail.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[7..];
            }
            None => {
                out.push_str("_x");
                rest = &tail[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn cell_from_data(d: &Data) -> CellValue {
    match d {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(unescape_xml_text(s)),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.clone()),
        Data::Error(e) => CellValue::text(e.to_string()),
    }
}

/// Places the used range at its absolute position so that the first
/// physical row and column of the sheet are row 0 and column 0. Blank
/// cells inside the used area come through as `Empty`.
fn grid_from_range(range: &Range<Data>) -> TabularGrid {
    let Some((row0, col0)) = range.start() else {
        return TabularGrid::default();
    };
    let (row0, col0) = (row0 as usize, col0 as usize);
    let width = col0 + range.width();

    let mut rows: Vec<Vec<CellValue>> = Vec::with_capacity(row0 + range.height());
    rows.resize(row0, vec![CellValue::Empty; width]);
    for r in range.rows() {
        let mut out = Vec::with_capacity(width);
        out.resize(col0, CellValue::Empty);
        out.extend(r.iter().map(cell_from_data));
        rows.push(out);
    }
    TabularGrid::from_rows(rows)
}

fn open(bytes: &[u8]) -> Result<Xlsx<Cursor<&[u8]>>, CodecError> {
    Xlsx::new(Cursor::new(bytes)).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Decodes every sheet, in file order. Nothing is returned unless every
/// sheet decodes.
pub fn decode(bytes: &[u8]) -> Result<Workbook, CodecError> {
    let mut xlsx = open(bytes)?;
    let names: Vec<String> = xlsx.sheet_names().to_vec();

    let mut workbook = Workbook::new();
    for name in names {
        let range = xlsx
            .worksheet_range(&name)
            .map_err(|e| CodecError::Decode(format!("sheet {name}: {e}")))?;
        workbook.add_sheet(&name, grid_from_range(&range))?;
    }
    if workbook.is_empty() {
        return Err(CodecError::Decode("workbook contains no sheets".into()));
    }
    Ok(workbook)
}

pub fn decode_sheet(bytes: &[u8], name: &str) -> Result<TabularGrid, CodecError> {
    let mut xlsx = open(bytes)?;
    if !xlsx.sheet_names().iter().any(|n| n == name) {
        return Err(CodecError::SheetNotFound(name.to_string()));
    }
    let range = xlsx
        .worksheet_range(name)
        .map_err(|e| CodecError::Decode(format!("sheet {name}: {e}")))?;
    Ok(grid_from_range(&range))
}

/// Writes every sheet in workbook order. Empty cells are left unwritten.
pub fn encode(workbook: &Workbook) -> Result<Vec<u8>, CodecError> {
    if workbook.is_empty() {
        return Err(WorkbookError::Empty.into());
    }

    let enc = |e: rust_xlsxwriter::XlsxError| CodecError::Encode(e.to_string());
    let mut out = rust_xlsxwriter::Workbook::new();
    for sheet in workbook.sheets() {
        let rows = sheet.grid.to_rows();
        if rows.len() > MAX_ROWS || sheet.grid.column_count() > MAX_COLS {
            return Err(CodecError::TooLarge(sheet.name.clone()));
        }

        let ws = out.add_worksheet();
        ws.set_name(&sheet.name).map_err(enc)?;
        for (r, row) in rows.iter().enumerate() {
            let r = r as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(s) if s.is_empty() => {}
                    CellValue::Text(s) => {
                        ws.write_string(r, c, s).map_err(enc)?;
                    }
                    CellValue::Number(n) if n.is_finite() => {
                        ws.write_number(r, c, *n).map_err(enc)?;
                    }
                    CellValue::Number(n) => {
                        ws.write_string(r, c, n.to_string()).map_err(enc)?;
                    }
                }
            }
        }
    }
    out.save_to_buffer().map_err(enc)
}
