use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Table;

/// Options offered when a label column is configured without its own list
pub const DEFAULT_LABEL_OPTIONS: [&str; 3] = ["正确", "错误", "不确定"];

/// Character cap for free-text notes
pub const DEFAULT_NOTE_MAX_CHARS: usize = 50;

/// Semantic role assigned to a column for the annotation view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum ColumnRole {
    /// Shown as-is
    Display,
    /// Shown through the text formatter
    FormattedDisplay,
    SingleChoiceLabel { options: Vec<String> },
    FreeTextNote { max_chars: usize },
}

impl ColumnRole {
    /// Kinds in picker order, without their parameters
    pub fn kinds() -> &'static [RoleKind] {
        &[
            RoleKind::Display,
            RoleKind::FormattedDisplay,
            RoleKind::SingleChoiceLabel,
            RoleKind::FreeTextNote,
        ]
    }

    /// Label role from a comma-separated option list; an empty list falls back to the defaults
    pub fn label_from_list(list: &str) -> Self {
        ColumnRole::SingleChoiceLabel {
            options: parse_option_list(list),
        }
    }

    pub fn default_label() -> Self {
        ColumnRole::SingleChoiceLabel {
            options: DEFAULT_LABEL_OPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn default_note() -> Self {
        ColumnRole::FreeTextNote {
            max_chars: DEFAULT_NOTE_MAX_CHARS,
        }
    }

    pub fn kind(&self) -> RoleKind {
        match self {
            ColumnRole::Display => RoleKind::Display,
            ColumnRole::FormattedDisplay => RoleKind::FormattedDisplay,
            ColumnRole::SingleChoiceLabel { .. } => RoleKind::SingleChoiceLabel,
            ColumnRole::FreeTextNote { .. } => RoleKind::FreeTextNote,
        }
    }

    /// Whether values for this column are entered by the annotator
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            ColumnRole::SingleChoiceLabel { .. } | ColumnRole::FreeTextNote { .. }
        )
    }
}

/// Parameterless role tag, used by pickers and for render ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleKind {
    Display,
    FormattedDisplay,
    SingleChoiceLabel,
    FreeTextNote,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Display => "Display",
            RoleKind::FormattedDisplay => "Formatted",
            RoleKind::SingleChoiceLabel => "Label",
            RoleKind::FreeTextNote => "Note",
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            RoleKind::Display => "SHOW",
            RoleKind::FormattedDisplay => "FMT",
            RoleKind::SingleChoiceLabel => "LABEL",
            RoleKind::FreeTextNote => "NOTE",
        }
    }
}

/// Split an option list on ASCII or full-width commas
pub fn parse_option_list(list: &str) -> Vec<String> {
    let options: Vec<String> = list
        .split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if options.is_empty() {
        DEFAULT_LABEL_OPTIONS.iter().map(|s| s.to_string()).collect()
    } else {
        options
    }
}

/// Column name to role mapping. Columns without an entry are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    roles: BTreeMap<String, ColumnRole>,
}

impl RoleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style assignment, replacing any previous role of the column
    pub fn with(mut self, column: impl Into<String>, role: ColumnRole) -> Self {
        self.assign(column, role);
        self
    }

    pub fn assign(&mut self, column: impl Into<String>, role: ColumnRole) {
        self.roles.insert(column.into(), role);
    }

    pub fn unassign(&mut self, column: &str) -> Option<ColumnRole> {
        self.roles.remove(column)
    }

    pub fn role(&self, column: &str) -> Option<&ColumnRole> {
        self.roles.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnRole)> {
        self.roles.iter()
    }

    /// Configured columns that the table does not have
    pub fn missing_columns(&self, table: &Table) -> Vec<String> {
        self.roles
            .keys()
            .filter(|c| !table.has_column(c))
            .cloned()
            .collect()
    }

    /// Columns in render order: grouped by role kind, then by table column order
    pub fn ordered_columns<'a>(&'a self, table: &'a Table) -> Vec<(&'a str, &'a ColumnRole)> {
        let mut ordered: Vec<(RoleKind, usize, &str, &ColumnRole)> = self
            .roles
            .iter()
            .filter_map(|(name, role)| {
                table
                    .column_index(name)
                    .map(|idx| (role.kind(), idx, name.as_str(), role))
            })
            .collect();
        ordered.sort_by_key(|(kind, idx, _, _)| (*kind, *idx));
        ordered.into_iter().map(|(_, _, name, role)| (name, role)).collect()
    }

    /// Label and note columns, in table column order
    pub fn editable_columns(&self, table: &Table) -> Vec<String> {
        table
            .columns
            .iter()
            .filter(|c| self.roles.get(*c).is_some_and(ColumnRole::is_editable))
            .cloned()
            .collect()
    }
}
