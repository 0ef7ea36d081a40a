//! Explicit session context and command dispatch.
//!
//! A [`Session`] owns everything one annotator works with: the uploaded
//! table, column roles, row cursor and entered values. Front-ends turn user
//! actions into [`Command`]s and draw whatever [`Render`] comes back.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AnnotatorConfig;
use crate::cursor::RowCursor;
use crate::export::{self, ExportError, ExportFormat, ExportPayload};
use crate::format::format_cell;
use crate::import::{self, ImportError};
use crate::model::{AnnotationEntry, AnnotationStore, ColumnRole, LoadedTable, RoleConfig, Table};

/// Wizard step reached by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Upload,
    Configure,
    Annotate,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Upload => "upload",
            Step::Configure => "configure",
            Step::Annotate => "annotate",
        }
    }
}

/// A discrete user action
#[derive(Debug, Clone)]
pub enum Command {
    Upload { filename: String, bytes: Vec<u8> },
    Configure(RoleConfig),
    Prev,
    Next,
    First,
    Last,
    Goto(usize),
    /// Store values for the current row
    Save(AnnotationEntry),
    Export(ExportFormat),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Upload { .. } => "upload",
            Command::Configure(_) => "configure",
            Command::Prev => "prev",
            Command::Next => "next",
            Command::First => "first",
            Command::Last => "last",
            Command::Goto(_) => "goto",
            Command::Save(_) => "save",
            Command::Export(_) => "export",
        }
    }
}

/// What the front-end should show after a command
#[derive(Debug, Clone)]
pub enum Render {
    /// A table was loaded; show the first rows
    Preview {
        filename: String,
        row_count: usize,
        head: Table,
        /// The same table was uploaded again and progress was kept
        unchanged: bool,
    },
    Row(RowView),
    Saved(RowView),
    Download(ExportPayload),
}

/// Everything needed to draw the current row
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub index: usize,
    pub total: usize,
    pub fields: Vec<FieldView>,
}

impl RowView {
    /// 1-based position
    pub fn position(&self) -> usize {
        self.index + 1
    }

    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.position() as f64 / self.total as f64
        }
    }

    pub fn field(&self, column: &str) -> Option<&FieldView> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Label and note fields, in render order
    pub fn editable_fields(&self) -> impl Iterator<Item = &FieldView> {
        self.fields.iter().filter(|f| f.kind.is_editable())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub column: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Display { text: String },
    Formatted { text: String },
    Label { options: Vec<String>, selected: Option<String> },
    Note { text: String, max_chars: usize },
}

impl FieldKind {
    pub fn is_editable(&self) -> bool {
        matches!(self, FieldKind::Label { .. } | FieldKind::Note { .. })
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("finish the {} step first", .required.as_str())]
    MissingStep { required: Step },

    #[error("column '{column}' is not in the table")]
    UnknownColumn { column: String },

    #[error("column '{column}' is not a label or note column")]
    NotEditable { column: String },

    #[error("'{value}' is not an option for '{column}'")]
    InvalidChoice { column: String, value: String },

    #[error("assign a role to at least one column")]
    NoRoles,

    #[error("the table has no rows to annotate")]
    NoRows,

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl SessionError {
    /// Warnings leave the session usable as-is; everything else is an error to report
    pub fn is_warning(&self) -> bool {
        matches!(self, SessionError::MissingStep { .. })
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// One annotator's working state
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: AnnotatorConfig,
    loaded: Option<LoadedTable>,
    roles: RoleConfig,
    cursor: RowCursor,
    store: AnnotationStore,
    step: Step,
}

impl Session {
    pub fn new(config: AnnotatorConfig) -> Self {
        let store = AnnotationStore::with_prefix(config.annotation_prefix.clone());
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            loaded: None,
            roles: RoleConfig::new(),
            cursor: RowCursor::default(),
            store,
            step: Step::Upload,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn table(&self) -> Option<&Table> {
        self.loaded.as_ref().map(|l| &l.table)
    }

    pub fn filename(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.filename.as_str())
    }

    pub fn roles(&self) -> &RoleConfig {
        &self.roles
    }

    pub fn cursor(&self) -> &RowCursor {
        &self.cursor
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Handle one command. On error the session is left as it was.
    pub fn dispatch(&mut self, command: Command) -> Result<Render> {
        debug!(session = %self.id, command = command.name(), "dispatch");
        let result = match command {
            Command::Upload { filename, bytes } => self.upload(filename, &bytes),
            Command::Configure(roles) => self.configure(roles),
            Command::Prev => self.navigate(RowCursor::prev),
            Command::Next => self.navigate(RowCursor::next),
            Command::First => self.navigate(RowCursor::first),
            Command::Last => self.navigate(RowCursor::last),
            Command::Goto(row) => self.navigate(|c| c.jump_to(row)),
            Command::Save(entry) => self.save(entry),
            Command::Export(format) => self.export(format),
        };

        if let Err(e) = &result {
            if e.is_warning() {
                warn!(session = %self.id, "{}", e);
            } else {
                warn!(session = %self.id, error = %e, "command failed");
            }
        }
        result
    }

    fn require(&self, required: Step) -> Result<()> {
        if self.step < required {
            return Err(SessionError::MissingStep { required });
        }
        Ok(())
    }

    fn upload(&mut self, filename: String, bytes: &[u8]) -> Result<Render> {
        let table = import::read_table(&filename, bytes)?;
        let row_count = table.row_count();
        let head = table.head(self.config.preview_rows);

        let unchanged = self.table() == Some(&table);
        if unchanged {
            info!(session = %self.id, filename = %filename, "same table uploaded again, keeping progress");
            if let Some(loaded) = self.loaded.as_mut() {
                loaded.filename = filename.clone();
            }
        } else {
            info!(session = %self.id, filename = %filename, rows = row_count, "loaded table");
            self.loaded = Some(LoadedTable::new(filename.clone(), table));
            self.roles = RoleConfig::new();
            self.cursor.reset(row_count);
            self.store.clear();
            self.step = Step::Configure;
        }

        Ok(Render::Preview {
            filename,
            row_count,
            head,
            unchanged,
        })
    }

    fn configure(&mut self, roles: RoleConfig) -> Result<Render> {
        self.require(Step::Configure)?;
        let table = self
            .table()
            .ok_or(SessionError::MissingStep { required: Step::Upload })?;

        if let Some(column) = roles.missing_columns(table).into_iter().next() {
            return Err(SessionError::UnknownColumn { column });
        }
        if roles.is_empty() {
            return Err(SessionError::NoRoles);
        }
        if table.is_empty() {
            return Err(SessionError::NoRows);
        }

        let roles = self.fill_role_defaults(roles);
        let reconfiguring = self.step == Step::Annotate;
        let policy = self.config.reconfigure;
        let row_count = table.row_count();

        self.roles = roles;
        if reconfiguring && policy.resets_cursor() {
            self.cursor.reset(row_count);
        }
        if reconfiguring && policy.resets_annotations() {
            self.store.clear();
        }
        self.drop_stale_labels();
        self.step = Step::Annotate;

        info!(
            session = %self.id,
            columns = self.roles.len(),
            reconfiguring,
            "column roles configured"
        );
        Ok(Render::Row(self.row_view()))
    }

    /// Remove stored labels that are no longer among their column's options
    fn drop_stale_labels(&mut self) {
        for (column, role) in self.roles.iter() {
            if let ColumnRole::SingleChoiceLabel { options } = role {
                let removed = self
                    .store
                    .retain_values(column, |value| options.iter().any(|o| o == value));
                if removed > 0 {
                    warn!(
                        session = %self.id,
                        column = %column,
                        removed,
                        "dropped labels outside the new option list"
                    );
                }
            }
        }
    }

    fn fill_role_defaults(&self, roles: RoleConfig) -> RoleConfig {
        let mut filled = RoleConfig::new();
        for (column, role) in roles.iter() {
            let role = match role {
                ColumnRole::SingleChoiceLabel { options } if options.is_empty() => {
                    ColumnRole::SingleChoiceLabel {
                        options: self.config.label_options.clone(),
                    }
                }
                ColumnRole::FreeTextNote { max_chars: 0 } => ColumnRole::FreeTextNote {
                    max_chars: self.config.note_max_chars,
                },
                other => other.clone(),
            };
            filled.assign(column.clone(), role);
        }
        filled
    }

    fn navigate(&mut self, step: impl FnOnce(&mut RowCursor)) -> Result<Render> {
        self.require(Step::Annotate)?;
        step(&mut self.cursor);
        debug!(session = %self.id, row = self.cursor.index(), "moved");
        Ok(Render::Row(self.row_view()))
    }

    fn save(&mut self, entry: AnnotationEntry) -> Result<Render> {
        self.require(Step::Annotate)?;
        let row = self.cursor.index();

        let mut accepted = Vec::with_capacity(entry.len());
        for (column, value) in entry {
            let value = self.validate_value(&column, value)?;
            accepted.push((column, value));
        }
        for (column, value) in accepted {
            self.store.set(row, column, value);
        }

        debug!(session = %self.id, row, "saved row");
        Ok(Render::Saved(self.row_view()))
    }

    fn validate_value(&self, column: &str, value: String) -> Result<String> {
        match self.roles.role(column) {
            Some(ColumnRole::SingleChoiceLabel { options }) => {
                if options.contains(&value) {
                    Ok(value)
                } else {
                    Err(SessionError::InvalidChoice {
                        column: column.to_string(),
                        value,
                    })
                }
            }
            Some(ColumnRole::FreeTextNote { max_chars }) => {
                Ok(value.chars().take(*max_chars).collect())
            }
            Some(_) => Err(SessionError::NotEditable {
                column: column.to_string(),
            }),
            None => Err(SessionError::UnknownColumn {
                column: column.to_string(),
            }),
        }
    }

    fn export(&self, format: ExportFormat) -> Result<Render> {
        self.require(Step::Annotate)?;
        let merged = self.merged_table()?;
        let payload = export::encode(&merged, format, &self.config.export)?;
        info!(
            session = %self.id,
            filename = %payload.filename,
            bytes = payload.bytes.len(),
            "exported annotations"
        );
        Ok(Render::Download(payload))
    }

    /// The uploaded table with entered values merged in
    pub fn merged_table(&self) -> Result<Table> {
        let table = self
            .table()
            .ok_or(SessionError::MissingStep { required: Step::Upload })?;
        let declared = self.roles.editable_columns(table);
        Ok(self.store.merge_with(table, &declared))
    }

    /// View of the current row, once roles are configured
    pub fn current_view(&self) -> Option<RowView> {
        (self.step == Step::Annotate).then(|| self.row_view())
    }

    fn row_view(&self) -> RowView {
        let index = self.cursor.index();
        let Some(table) = self.table() else {
            return RowView {
                index,
                total: 0,
                fields: Vec::new(),
            };
        };
        let stored = self.store.get(index);

        let fields = self
            .roles
            .ordered_columns(table)
            .into_iter()
            .map(|(column, role)| {
                let cell = table.cell(index, column).cloned().unwrap_or_default();
                let kind = match role {
                    ColumnRole::Display => FieldKind::Display {
                        text: cell.to_string(),
                    },
                    ColumnRole::FormattedDisplay => FieldKind::Formatted {
                        text: format_cell(&cell).to_string(),
                    },
                    ColumnRole::SingleChoiceLabel { options } => {
                        let source = cell.to_string();
                        let selected = stored
                            .get(column)
                            .filter(|value| options.contains(value))
                            .cloned()
                            .or_else(|| options.contains(&source).then_some(source));
                        FieldKind::Label {
                            options: options.clone(),
                            selected,
                        }
                    }
                    ColumnRole::FreeTextNote { max_chars } => FieldKind::Note {
                        text: stored.get(column).cloned().unwrap_or_else(|| cell.to_string()),
                        max_chars: *max_chars,
                    },
                };
                FieldView {
                    column: column.to_string(),
                    kind,
                }
            })
            .collect();

        RowView {
            index,
            total: table.row_count(),
            fields,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(AnnotatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconfigurePolicy;
    use crate::model::CellValue;

    const CSV: &str = "q,model_out,verdict,comment\n问题一,###Header\\ntext,,\n问题二,plain,错误,\n";

    fn uploaded() -> Session {
        let mut session = Session::default();
        session
            .dispatch(Command::Upload {
                filename: "data.csv".into(),
                bytes: CSV.as_bytes().to_vec(),
            })
            .unwrap();
        session
    }

    fn roles() -> RoleConfig {
        RoleConfig::new()
            .with("q", ColumnRole::Display)
            .with("model_out", ColumnRole::FormattedDisplay)
            .with("verdict", ColumnRole::label_from_list("正确,错误,不确定"))
            .with("comment", ColumnRole::FreeTextNote { max_chars: 5 })
    }

    fn configured() -> Session {
        let mut session = uploaded();
        session.dispatch(Command::Configure(roles())).unwrap();
        session
    }

    fn entry(pairs: &[(&str, &str)]) -> AnnotationEntry {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_upload_moves_to_configure() {
        let session = uploaded();
        assert_eq!(session.step(), Step::Configure);
        assert_eq!(session.table().map(Table::row_count), Some(2));
    }

    #[test]
    fn test_unsupported_upload_leaves_state() {
        let mut session = configured();
        session.dispatch(Command::Next).unwrap();
        let err = session
            .dispatch(Command::Upload {
                filename: "data.txt".into(),
                bytes: b"x".to_vec(),
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::Import(ImportError::UnsupportedFormat { .. })));
        assert_eq!(session.step(), Step::Annotate);
        assert_eq!(session.cursor().index(), 1);
    }

    #[test]
    fn test_missing_steps_are_warnings() {
        let mut session = Session::default();
        let err = session.dispatch(Command::Configure(roles())).unwrap_err();
        assert!(err.is_warning());

        let mut session = uploaded();
        let err = session.dispatch(Command::Next).unwrap_err();
        assert!(matches!(err, SessionError::MissingStep { required: Step::Annotate }));
        assert!(session.dispatch(Command::Export(ExportFormat::Csv)).is_err());
    }

    #[test]
    fn test_configure_checks_columns() {
        let mut session = uploaded();
        let err = session
            .dispatch(Command::Configure(RoleConfig::new().with("nope", ColumnRole::Display)))
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownColumn { .. }));
        assert!(matches!(
            session.dispatch(Command::Configure(RoleConfig::new())),
            Err(SessionError::NoRoles)
        ));
        assert_eq!(session.step(), Step::Configure);
    }

    #[test]
    fn test_row_view_fields() {
        let session = configured();
        let view = session.current_view().unwrap();
        assert_eq!(view.total, 2);
        let columns: Vec<&str> = view.fields.iter().map(|f| f.column.as_str()).collect();
        assert_eq!(columns, vec!["q", "model_out", "verdict", "comment"]);
        assert_eq!(
            view.field("model_out").map(|f| &f.kind),
            Some(&FieldKind::Formatted {
                text: "**Header**\ntext".into()
            })
        );
        assert_eq!(view.editable_fields().count(), 2);
    }

    #[test]
    fn test_label_preselects_source_value() {
        let mut session = configured();
        let render = session.dispatch(Command::Next).unwrap();
        let Render::Row(view) = render else {
            panic!("expected a row");
        };
        match &view.field("verdict").unwrap().kind {
            FieldKind::Label { selected, .. } => assert_eq!(selected.as_deref(), Some("错误")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_save_validates_before_writing() {
        let mut session = configured();
        let err = session
            .dispatch(Command::Save(entry(&[("comment", "ok"), ("verdict", "maybe")])))
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidChoice { .. }));
        assert!(session.store().get(0).is_empty());

        let err = session.dispatch(Command::Save(entry(&[("q", "x")]))).unwrap_err();
        assert!(matches!(err, SessionError::NotEditable { .. }));
    }

    #[test]
    fn test_note_is_truncated() {
        let mut session = configured();
        session
            .dispatch(Command::Save(entry(&[("comment", "一二三四五六七")])))
            .unwrap();
        assert_eq!(session.store().value(0, "comment"), Some("一二三四五"));
    }

    #[test]
    fn test_reupload_same_table_keeps_progress() {
        let mut session = configured();
        session.dispatch(Command::Save(entry(&[("verdict", "正确")]))).unwrap();
        let render = session
            .dispatch(Command::Upload {
                filename: "copy.csv".into(),
                bytes: CSV.as_bytes().to_vec(),
            })
            .unwrap();
        assert!(matches!(render, Render::Preview { unchanged: true, .. }));
        assert_eq!(session.step(), Step::Annotate);
        assert_eq!(session.store().value(0, "verdict"), Some("正确"));
    }

    #[test]
    fn test_new_table_resets_everything() {
        let mut session = configured();
        session.dispatch(Command::Save(entry(&[("verdict", "正确")]))).unwrap();
        session
            .dispatch(Command::Upload {
                filename: "other.csv".into(),
                bytes: b"a\n1\n2\n3\n".to_vec(),
            })
            .unwrap();
        assert_eq!(session.step(), Step::Configure);
        assert!(session.store().is_empty());
        assert!(session.roles().is_empty());
        assert_eq!(session.cursor().len(), 3);
    }

    #[test]
    fn test_reconfigure_policies() {
        for (policy, row, kept) in [
            (ReconfigurePolicy::KeepProgress, 1, true),
            (ReconfigurePolicy::ResetCursor, 0, true),
            (ReconfigurePolicy::ResetAll, 0, false),
        ] {
            let config = AnnotatorConfig {
                reconfigure: policy,
                ..AnnotatorConfig::default()
            };
            let mut session = Session::new(config);
            session
                .dispatch(Command::Upload {
                    filename: "data.csv".into(),
                    bytes: CSV.as_bytes().to_vec(),
                })
                .unwrap();
            session.dispatch(Command::Configure(roles())).unwrap();
            session.dispatch(Command::Save(entry(&[("verdict", "正确")]))).unwrap();
            session.dispatch(Command::Next).unwrap();

            session.dispatch(Command::Configure(roles())).unwrap();
            assert_eq!(session.cursor().index(), row, "{:?}", policy);
            assert_eq!(session.store().value(0, "verdict").is_some(), kept, "{:?}", policy);
        }
    }

    #[test]
    fn test_empty_options_take_config_defaults() {
        let mut session = uploaded();
        session
            .dispatch(Command::Configure(RoleConfig::new().with(
                "verdict",
                ColumnRole::SingleChoiceLabel { options: Vec::new() },
            )))
            .unwrap();
        assert_eq!(
            session.roles().role("verdict"),
            Some(&ColumnRole::default_label())
        );
    }

    #[test]
    fn test_changed_options_drop_stale_labels() {
        let mut session = configured();
        session.dispatch(Command::Save(entry(&[("verdict", "错误")]))).unwrap();

        let roles = roles().with("verdict", ColumnRole::label_from_list("yes,no"));
        let Render::Row(view) = session.dispatch(Command::Configure(roles)).unwrap() else {
            panic!("expected a row view");
        };

        assert_eq!(session.store().value(0, "verdict"), None);
        assert_eq!(
            view.field("verdict").map(|f| f.kind.clone()),
            Some(FieldKind::Label {
                options: vec!["yes".into(), "no".into()],
                selected: None,
            })
        );
        let merged = session.merged_table().unwrap();
        assert_eq!(merged.cell(0, "标注_verdict"), Some(&CellValue::Empty));
    }
}
