use rust_xlsxwriter::{Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::model::{CellValue, Table};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Download formats for the annotated table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn all() -> &'static [ExportFormat] {
        &[ExportFormat::Xlsx, ExportFormat::Csv, ExportFormat::Json]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "Excel",
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE,
            ExportFormat::Csv => CSV_CONTENT_TYPE,
            ExportFormat::Json => JSON_CONTENT_TYPE,
        }
    }
}

/// Naming used for exported files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// File name without extension
    pub file_stem: String,
    pub sheet_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            file_stem: "标注结果".to_string(),
            sheet_name: "标注结果".to_string(),
        }
    }
}

/// Encoded file ready to be written or offered as a download
#[derive(Debug, Clone)]
pub struct ExportPayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a table. Column order is kept as-is in every format.
pub fn encode(
    table: &Table,
    format: ExportFormat,
    settings: &ExportSettings,
) -> Result<ExportPayload, ExportError> {
    let bytes = match format {
        ExportFormat::Xlsx => to_xlsx(table, &settings.sheet_name)?,
        ExportFormat::Csv => to_csv(table)?,
        ExportFormat::Json => to_json(table)?,
    };

    Ok(ExportPayload {
        bytes,
        filename: format!("{}.{}", settings.file_stem, format.extension()),
        content_type: format.content_type(),
    })
}

/// UTF-8 CSV with a header row; empty cells become empty fields
pub fn to_csv(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))
}

/// Pretty-printed array of records; non-ASCII text is written as-is
pub fn to_json(table: &Table) -> Result<Vec<u8>, ExportError> {
    let records: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let record: Map<String, Value> = table
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(json_value))
                .collect();
            Value::Object(record)
        })
        .collect();

    Ok(serde_json::to_vec_pretty(&records)?)
}

fn json_value(cell: &CellValue) -> Value {
    match cell {
        CellValue::Empty => Value::Null,
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Int(i) => Value::Number((*i).into()),
        CellValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        CellValue::Text(s) => Value::String(s.clone()),
    }
}

/// Single-sheet workbook with the header in row 0
pub fn to_xlsx(table: &Table, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet_name)?;

    for (c, name) in table.columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, name)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let xr = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let xc = c as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Bool(b) => {
                    worksheet.write_boolean(xr, xc, *b)?;
                }
                CellValue::Int(i) => {
                    worksheet.write_number(xr, xc, *i as f64)?;
                }
                CellValue::Float(f) => {
                    worksheet.write_number(xr, xc, *f)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(xr, xc, s)?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    Ok(workbook.save_to_buffer()?)
}
