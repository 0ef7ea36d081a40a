use crate::actions;
use crate::config::AnnotatorConfig;
use crate::export::{ExportFormat, ExportPayload};
use crate::model::{AnnotationEntry, ColumnRole, RoleConfig, RoleKind, Table};
use crate::session::{Command, FieldKind, FieldView, Render, RowView, Session, SessionError, Step};

/// Application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Configure,
    LabelPicker,
    ExportPicker,
    Input,
    Help,
}

/// Input target for text input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget {
    Note,
    LabelOptions,
    FilePath,
}

/// Platform-agnostic application state
pub struct App {
    pub session: Session,
    pub mode: Mode,
    pub running: bool,

    // Upload preview
    pub preview: Option<Table>,

    // Configure screen
    pub column_selected: usize,
    pub pending_roles: RoleConfig,

    // Annotation screen
    pub view: Option<RowView>,
    pub field_selected: usize,
    pub draft: AnnotationEntry,
    pub scroll: u16,

    // Picker state
    pub label_selected: usize,
    pub export_selected: usize,

    // Input state
    pub input_buffer: String,
    pub input_target: InputTarget,
    pub pending_column: Option<String>,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: AnnotatorConfig) -> Self {
        Self {
            session: Session::new(config),
            mode: Mode::Normal,
            running: true,

            preview: None,

            column_selected: 0,
            pending_roles: RoleConfig::new(),

            view: None,
            field_selected: 0,
            draft: AnnotationEntry::new(),
            scroll: 0,

            label_selected: 0,
            export_selected: 0,

            input_buffer: String::new(),
            input_target: InputTarget::Note,
            pending_column: None,

            status_message: None,
        }
    }

    /// Load an uploaded file into the session
    pub fn upload(&mut self, filename: &str, bytes: Vec<u8>) -> bool {
        let command = Command::Upload {
            filename: filename.to_string(),
            bytes,
        };
        match self.session.dispatch(command) {
            Ok(Render::Preview {
                row_count,
                head,
                unchanged,
                ..
            }) => {
                self.preview = Some(head);
                self.pending_roles = self.session.roles().clone();
                self.column_selected = 0;
                if unchanged && self.session.step() == Step::Annotate {
                    self.set_status("Same file loaded again, progress kept");
                } else {
                    self.view = None;
                    self.draft.clear();
                    self.mode = Mode::Configure;
                    self.set_status(&format!("Loaded {} rows from {}", row_count, filename));
                }
                true
            }
            Ok(_) => false,
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Column names of the loaded table
    pub fn columns(&self) -> &[String] {
        self.session
            .table()
            .map(|t| t.columns.as_slice())
            .unwrap_or_default()
    }

    /// Open the configure screen with the current roles
    pub fn start_configure(&mut self) {
        if self.session.table().is_none() {
            self.set_status("Open a file first");
            return;
        }
        self.pending_roles = self.session.roles().clone();
        self.column_selected = 0;
        self.mode = Mode::Configure;
    }

    pub fn move_column(&mut self, forward: bool) {
        let count = self.columns().len();
        if count == 0 {
            return;
        }
        self.column_selected = if forward {
            (self.column_selected + 1) % count
        } else if self.column_selected == 0 {
            count - 1
        } else {
            self.column_selected - 1
        };
    }

    pub fn selected_column(&self) -> Option<String> {
        self.columns().get(self.column_selected).cloned()
    }

    /// Assign a role kind to the selected column; `None` clears it.
    /// Label columns then ask for their option list.
    pub fn assign_role(&mut self, kind: Option<RoleKind>) {
        let Some(column) = self.selected_column() else {
            return;
        };
        let config = self.session.config();
        match kind {
            None => {
                self.pending_roles.unassign(&column);
            }
            Some(RoleKind::Display) => self.pending_roles.assign(column, ColumnRole::Display),
            Some(RoleKind::FormattedDisplay) => {
                self.pending_roles.assign(column, ColumnRole::FormattedDisplay)
            }
            Some(RoleKind::FreeTextNote) => {
                let max_chars = config.note_max_chars;
                self.pending_roles
                    .assign(column, ColumnRole::FreeTextNote { max_chars });
            }
            Some(RoleKind::SingleChoiceLabel) => {
                self.input_buffer = match self.pending_roles.role(&column) {
                    Some(ColumnRole::SingleChoiceLabel { options }) => options.join(","),
                    _ => config.label_option_list(),
                };
                self.pending_column = Some(column);
                self.input_target = InputTarget::LabelOptions;
                self.mode = Mode::Input;
            }
        }
    }

    /// Confirm the configure screen
    pub fn confirm_roles(&mut self) -> bool {
        let roles = self.pending_roles.clone();
        match self.session.dispatch(Command::Configure(roles)) {
            Ok(Render::Row(view)) => {
                self.show_row(view);
                self.mode = Mode::Normal;
                self.set_status("Configuration confirmed");
                true
            }
            Ok(_) => false,
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    fn show_row(&mut self, view: RowView) {
        self.draft = actions::initial_draft(&view);
        self.scroll = 0;
        let editable = view.editable_fields().count();
        if self.field_selected >= editable {
            self.field_selected = 0;
        }
        self.view = Some(view);
    }

    /// Scroll the row view by `delta` lines
    pub fn scroll_by(&mut self, delta: i32) {
        self.scroll = (i32::from(self.scroll) + delta).clamp(0, i32::from(u16::MAX)) as u16;
    }

    /// Editable field under the selection marker
    pub fn selected_field(&self) -> Option<&FieldView> {
        self.view
            .as_ref()?
            .editable_fields()
            .nth(self.field_selected)
    }

    pub fn move_field(&mut self, forward: bool) {
        let count = self
            .view
            .as_ref()
            .map(|v| v.editable_fields().count())
            .unwrap_or(0);
        if count == 0 {
            return;
        }
        self.field_selected = if forward {
            (self.field_selected + 1) % count
        } else if self.field_selected == 0 {
            count - 1
        } else {
            self.field_selected - 1
        };
    }

    /// Open the picker or input box for the selected field
    pub fn edit_selected_field(&mut self) {
        let Some(field) = self.selected_field().cloned() else {
            return;
        };
        match field.kind {
            FieldKind::Label { options, .. } => {
                let current = self.draft.get(&field.column);
                self.label_selected = current
                    .and_then(|c| options.iter().position(|o| o == c))
                    .unwrap_or_else(|| actions::default_label_index(&options));
                self.pending_column = Some(field.column);
                self.mode = Mode::LabelPicker;
            }
            FieldKind::Note { .. } => {
                self.input_buffer = self.draft.get(&field.column).cloned().unwrap_or_default();
                self.pending_column = Some(field.column);
                self.input_target = InputTarget::Note;
                self.mode = Mode::Input;
            }
            _ => {}
        }
    }

    /// Options of the label column being picked
    pub fn picker_options(&self) -> Vec<String> {
        let column = self.pending_column.as_deref();
        self.view
            .as_ref()
            .and_then(|v| column.and_then(|c| v.field(c)))
            .map(|f| match &f.kind {
                FieldKind::Label { options, .. } => options.clone(),
                _ => Vec::new(),
            })
            .unwrap_or_default()
    }

    pub fn move_label(&mut self, forward: bool) {
        let count = self.picker_options().len();
        if count == 0 {
            return;
        }
        self.label_selected = if forward {
            (self.label_selected + 1) % count
        } else if self.label_selected == 0 {
            count - 1
        } else {
            self.label_selected - 1
        };
    }

    /// Put the highlighted option into the draft
    pub fn choose_label(&mut self) {
        let options = self.picker_options();
        if let (Some(column), Some(option)) =
            (self.pending_column.take(), options.get(self.label_selected))
        {
            self.draft.insert(column, option.clone());
        }
        self.mode = Mode::Normal;
    }

    /// Max characters accepted by the input box, if capped
    pub fn input_limit(&self) -> Option<usize> {
        if self.input_target != InputTarget::Note {
            return None;
        }
        match self.selected_field().map(|f| &f.kind) {
            Some(FieldKind::Note { max_chars, .. }) => Some(*max_chars),
            _ => None,
        }
    }

    /// Append a typed character, respecting the note cap
    pub fn push_input(&mut self, c: char) {
        if let Some(limit) = self.input_limit() {
            if self.input_buffer.chars().count() >= limit {
                return;
            }
        }
        self.input_buffer.push(c);
    }

    /// Finish note or label-option input. File paths are handled by the front-end.
    pub fn complete_input(&mut self) {
        let text = std::mem::take(&mut self.input_buffer);
        match (self.input_target, self.pending_column.take()) {
            (InputTarget::Note, Some(column)) => {
                self.draft.insert(column, text);
                self.mode = Mode::Normal;
            }
            (InputTarget::LabelOptions, Some(column)) => {
                self.pending_roles
                    .assign(column, ColumnRole::label_from_list(&text));
                self.mode = Mode::Configure;
            }
            _ => self.mode = self.idle_mode(),
        }
    }

    pub fn cancel_input(&mut self) {
        self.input_buffer.clear();
        self.mode = match self.input_target {
            InputTarget::LabelOptions => Mode::Configure,
            _ => self.idle_mode(),
        };
        self.pending_column = None;
    }

    /// Mode to fall back to when a dialog closes
    fn idle_mode(&self) -> Mode {
        if self.session.step() == Step::Configure {
            Mode::Configure
        } else {
            Mode::Normal
        }
    }

    /// Write the draft for the current row into the session
    pub fn save(&mut self) -> bool {
        if self.draft.is_empty() {
            return true;
        }
        match self.session.dispatch(Command::Save(self.draft.clone())) {
            Ok(Render::Saved(view)) => {
                self.view = Some(view);
                true
            }
            Ok(_) => false,
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Save, then move. Nothing moves if saving fails.
    fn navigate(&mut self, command: Command) {
        if !self.save() {
            return;
        }
        match self.session.dispatch(command) {
            Ok(Render::Row(view)) => self.show_row(view),
            Ok(_) => {}
            Err(e) => self.report(&e),
        }
    }

    pub fn next_row(&mut self) {
        self.navigate(Command::Next);
    }

    pub fn prev_row(&mut self) {
        self.navigate(Command::Prev);
    }

    pub fn first_row(&mut self) {
        self.navigate(Command::First);
    }

    pub fn last_row(&mut self) {
        self.navigate(Command::Last);
    }

    pub fn open_export_picker(&mut self) {
        if self.session.step() < Step::Annotate {
            self.set_status("Confirm the column configuration first");
            return;
        }
        self.mode = Mode::ExportPicker;
    }

    pub fn move_export(&mut self, forward: bool) {
        let len = ExportFormat::all().len();
        self.export_selected = if forward {
            (self.export_selected + 1) % len
        } else if self.export_selected == 0 {
            len - 1
        } else {
            self.export_selected - 1
        };
    }

    /// Save the current row and encode the merged table
    pub fn export(&mut self, format: ExportFormat) -> Option<ExportPayload> {
        self.mode = Mode::Normal;
        if !self.save() {
            return None;
        }
        match self.session.dispatch(Command::Export(format)) {
            Ok(Render::Download(payload)) => Some(payload),
            Ok(_) => None,
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    /// Start typing a file path to open
    pub fn start_open(&mut self) {
        self.input_buffer.clear();
        self.pending_column = None;
        self.input_target = InputTarget::FilePath;
        self.mode = Mode::Input;
    }

    fn report(&mut self, error: &SessionError) {
        if error.is_warning() {
            self.set_status(&format!("Warning: {}", error));
        } else {
            self.set_status(&format!("Error: {}", error));
        }
    }

    /// Set status message
    pub fn set_status(&mut self, msg: &str) {
        self.status_message = Some(msg.to_string());
    }

    /// Clear status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Get title for display
    pub fn title(&self) -> String {
        self.session
            .filename()
            .map(String::from)
            .unwrap_or_else(|| "No file".to_string())
    }

    /// Draft value for a column, falling back to what the view shows
    pub fn draft_value(&self, column: &str) -> Option<&str> {
        self.draft.get(column).map(String::as_str)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(AnnotatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "q,verdict,comment\none,,\ntwo,,\nthree,,\n";

    fn ready() -> App {
        let mut app = App::default();
        assert!(app.upload("rows.csv", CSV.as_bytes().to_vec()));
        assert_eq!(app.mode, Mode::Configure);

        app.column_selected = 0;
        app.assign_role(Some(RoleKind::Display));
        app.column_selected = 1;
        app.assign_role(Some(RoleKind::SingleChoiceLabel));
        assert_eq!(app.mode, Mode::Input);
        assert_eq!(app.input_buffer, "正确,错误,不确定");
        app.complete_input();
        assert_eq!(app.mode, Mode::Configure);
        app.column_selected = 2;
        app.assign_role(Some(RoleKind::FreeTextNote));

        assert!(app.confirm_roles());
        app
    }

    #[test]
    fn test_untouched_row_has_empty_draft() {
        let mut app = ready();
        assert!(app.draft.is_empty());
        app.next_row();
        assert!(app.session.store().is_empty());
    }

    #[test]
    fn test_label_picker_starts_on_last_option() {
        let mut app = ready();
        app.field_selected = 0;
        app.edit_selected_field();
        assert_eq!(app.label_selected, 2);
        app.choose_label();
        assert_eq!(app.draft_value("verdict"), Some("不确定"));
    }

    #[test]
    fn test_pick_label_and_navigate_saves() {
        let mut app = ready();
        app.field_selected = 0;
        app.edit_selected_field();
        assert_eq!(app.mode, Mode::LabelPicker);
        app.move_label(false);
        app.choose_label();
        assert_eq!(app.draft_value("verdict"), Some("错误"));

        app.next_row();
        assert_eq!(app.session.cursor().index(), 1);
        assert_eq!(app.session.store().value(0, "verdict"), Some("错误"));

        app.prev_row();
        assert_eq!(app.draft_value("verdict"), Some("错误"));
    }

    #[test]
    fn test_note_input_is_capped() {
        let mut app = ready();
        app.field_selected = 1;
        app.edit_selected_field();
        assert_eq!(app.input_target, InputTarget::Note);
        for _ in 0..80 {
            app.push_input('x');
        }
        assert_eq!(app.input_buffer.chars().count(), 50);
        app.complete_input();
        assert_eq!(app.draft_value("comment").map(str::len), Some(50));
    }

    #[test]
    fn test_export_includes_draft() {
        let mut app = ready();
        app.draft.insert("verdict".into(), "正确".into());
        let payload = app.export(ExportFormat::Csv).unwrap();
        let text = String::from_utf8(payload.bytes).unwrap();
        assert!(text.starts_with("q,verdict,comment,标注_verdict,标注_comment\n"));
        assert!(text.contains("one,,,正确,\n"));
        assert!(text.contains("two,,,,\n"));
    }

    #[test]
    fn test_changed_label_options_keep_navigation_working() {
        let mut app = ready();
        app.field_selected = 0;
        app.edit_selected_field();
        app.move_label(false);
        app.choose_label();
        app.next_row();
        app.prev_row();
        assert_eq!(app.draft_value("verdict"), Some("错误"));

        app.start_configure();
        app.column_selected = 1;
        app.assign_role(Some(RoleKind::SingleChoiceLabel));
        app.input_buffer = "yes,no".to_string();
        app.complete_input();
        assert!(app.confirm_roles());
        assert!(app.draft.is_empty());

        app.next_row();
        assert_eq!(app.session.cursor().index(), 1);
        let payload = app.export(ExportFormat::Csv).unwrap();
        let text = String::from_utf8(payload.bytes).unwrap();
        assert!(text.contains("one,,,,\n"));
    }

    #[test]
    fn test_scroll_resets_on_new_row() {
        let mut app = ready();
        app.scroll_by(-3);
        assert_eq!(app.scroll, 0);
        app.scroll_by(5);
        assert_eq!(app.scroll, 5);
        app.next_row();
        assert_eq!(app.scroll, 0);
    }

    #[test]
    fn test_export_before_configure_warns() {
        let mut app = App::default();
        app.open_export_picker();
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.status_message.is_some());
    }

    #[test]
    fn test_bad_upload_reports_error() {
        let mut app = App::default();
        assert!(!app.upload("notes.md", b"# hi".to_vec()));
        assert!(app
            .status_message
            .as_deref()
            .is_some_and(|m| m.starts_with("Error: unsupported file format")));
    }
}
