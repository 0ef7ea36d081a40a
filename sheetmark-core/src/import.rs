//! Reading uploaded files into a [`Table`].

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{CellValue, Table};

/// Upload formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xlsx,
    Csv,
    Json,
}

impl FileFormat {
    pub fn all() -> &'static [FileFormat] {
        &[FileFormat::Xlsx, FileFormat::Csv, FileFormat::Json]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Xlsx => "xlsx",
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }

    /// Detect the format from a file name, case-insensitively
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::all()
            .iter()
            .copied()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }
}

/// Errors raised while reading an uploaded file
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported file format: {filename} (expected .xlsx, .csv or .json)")]
    UnsupportedFormat { filename: String },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read workbook: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("workbook has no worksheet")]
    NoWorksheet,

    #[error("file has no header row")]
    Empty,

    #[error("JSON input must be an array of objects")]
    NotRecords,
}

pub type Result<T> = std::result::Result<T, ImportError>;

/// Read an uploaded file, dispatching on its extension
pub fn read_table(filename: &str, bytes: &[u8]) -> Result<Table> {
    let format = FileFormat::from_filename(filename).ok_or_else(|| {
        warn!(filename, "rejected upload with unsupported extension");
        ImportError::UnsupportedFormat {
            filename: filename.to_string(),
        }
    })?;

    let table = match format {
        FileFormat::Xlsx => read_xlsx(bytes)?,
        FileFormat::Csv => read_csv(bytes)?,
        FileFormat::Json => read_json(bytes)?,
    };

    debug!(
        filename,
        rows = table.row_count(),
        columns = table.column_count(),
        "read table"
    );
    Ok(table)
}

/// CSV with a header row. A UTF-8 BOM is skipped and short rows are padded.
pub fn read_csv(bytes: &[u8]) -> Result<Table> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?;
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(ImportError::Empty);
    }
    let columns = header_names(headers.iter().map(String::from));

    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(CellValue::infer).collect());
    }
    Ok(table)
}

/// A JSON array of objects. Columns are the union of keys in first-seen order.
pub fn read_json(bytes: &[u8]) -> Result<Table> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(records) = value else {
        return Err(ImportError::NotRecords);
    };

    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        let Value::Object(map) = record else {
            return Err(ImportError::NotRecords);
        };
        for key in map.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = Table::new(columns);
    for record in &records {
        if let Value::Object(map) = record {
            let row = table
                .columns
                .iter()
                .map(|c| map.get(c).map(json_cell).unwrap_or(CellValue::Empty))
                .collect();
            table.push_row(row);
        }
    }
    Ok(table)
}

/// Blank headers become `Unnamed: <i>`; repeated names get `.1`, `.2`, ... suffixes
pub fn header_names(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for (i, name) in raw.into_iter().enumerate() {
        let name = if name.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            name
        };
        let mut candidate = name.clone();
        let mut suffix = 0;
        while columns.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}.{}", name, suffix);
        }
        columns.push(candidate);
    }
    columns
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => n
                .as_f64()
                .map(CellValue::Float)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
        },
        Value::String(s) => CellValue::Text(s.clone()),
        nested => CellValue::Text(nested.to_string()),
    }
}

/// First worksheet of an XLSX workbook, first row as header
pub fn read_xlsx(bytes: &[u8]) -> Result<Table> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoWorksheet)??;

    let mut rows = range.rows();
    let header = rows.next().ok_or(ImportError::Empty)?;
    let columns = header_names(header.iter().map(|cell| match xlsx_cell(cell) {
        CellValue::Empty => String::new(),
        value => value.to_string(),
    }));

    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.iter().map(xlsx_cell).collect());
    }
    Ok(table)
}

fn xlsx_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        // Whole numbers come back as floats from most writers
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => CellValue::Int(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_filename("data.XLSX"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_filename("a.b.csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_filename("records.json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_filename("notes.txt"), None);
        assert_eq!(FileFormat::from_filename("no_extension"), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_table("table.xls", b"").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_read_csv() {
        let csv = "\u{feff}q,score,ok\n你好,3,true\n\"a, b\",2.5\n";
        let table = read_table("in.csv", csv.as_bytes()).unwrap();
        assert_eq!(table.columns, vec!["q", "score", "ok"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0][1], CellValue::Int(3));
        assert_eq!(table.rows[0][2], CellValue::Bool(true));
        assert_eq!(table.rows[1][0], CellValue::from("a, b"));
        assert_eq!(table.rows[1][2], CellValue::Empty);
    }

    #[test]
    fn test_header_names() {
        let raw = ["a", "a", "", "a.1", "a"].map(String::from);
        assert_eq!(
            header_names(raw),
            vec!["a", "a.1", "Unnamed: 2", "a.1.1", "a.2"]
        );
    }

    #[test]
    fn test_csv_duplicate_and_blank_headers() {
        let table = read_csv(b"a,a,\n1,2,3\n").unwrap();
        assert_eq!(table.columns, vec!["a", "a.1", "Unnamed: 2"]);
        assert_eq!(table.cell(0, "a"), Some(&CellValue::Int(1)));
        assert_eq!(table.cell(0, "a.1"), Some(&CellValue::Int(2)));
        assert_eq!(table.cell(0, "Unnamed: 2"), Some(&CellValue::Int(3)));
    }

    #[test]
    fn test_read_json_records() {
        let json = r#"[{"q": "一", "n": 1}, {"n": 2.5, "extra": null, "tags": ["x"]}]"#;
        let table = read_table("in.json", json.as_bytes()).unwrap();
        assert_eq!(table.columns, vec!["q", "n", "extra", "tags"]);
        assert_eq!(table.rows[0][0], CellValue::from("一"));
        assert_eq!(table.rows[1][0], CellValue::Empty);
        assert_eq!(table.rows[1][1], CellValue::Float(2.5));
        assert_eq!(table.rows[1][3], CellValue::from(r#"["x"]"#));
    }

    #[test]
    fn test_read_json_rejects_non_records() {
        assert!(matches!(read_json(b"{\"a\": 1}"), Err(ImportError::NotRecords)));
        assert!(matches!(read_json(b"[1, 2]"), Err(ImportError::NotRecords)));
        assert!(matches!(read_json(b"not json"), Err(ImportError::Json(_))));
    }

    #[test]
    fn test_read_xlsx_from_writer_output() {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "q").unwrap();
        sheet.write_string(0, 1, "n").unwrap();
        sheet.write_string(1, 0, "问题").unwrap();
        sheet.write_number(1, 1, 4.0).unwrap();
        sheet.write_number(2, 1, 0.5).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = read_table("sheet.xlsx", &bytes).unwrap();
        assert_eq!(table.columns, vec!["q", "n"]);
        assert_eq!(table.rows[0], vec![CellValue::from("问题"), CellValue::Int(4)]);
        assert_eq!(table.rows[1], vec![CellValue::Empty, CellValue::Float(0.5)]);
    }
}
