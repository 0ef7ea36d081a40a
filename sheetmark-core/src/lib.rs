//! Sheetmark Core - Platform-agnostic spreadsheet annotation library
//!
//! This crate provides the table model, import/export codecs, the model
//! output formatter and the session state behind the Sheetmark annotation
//! tool. It's designed to work both in native CLI and WASM environments.

pub mod actions;
pub mod app;
pub mod config;
pub mod cursor;
pub mod export;
pub mod format;
pub mod import;
pub mod model;
pub mod session;

pub use app::{App, InputTarget, Mode};
pub use config::{AnnotatorConfig, ReconfigurePolicy};
pub use cursor::RowCursor;
pub use export::{encode, ExportError, ExportFormat, ExportPayload, ExportSettings};
pub use format::{format_cell, format_text};
pub use import::{read_table, FileFormat, ImportError};
pub use model::{AnnotationStore, CellValue, ColumnRole, RoleConfig, RoleKind, Table};
pub use session::{Command, FieldKind, FieldView, Render, RowView, Session, SessionError, Step};
