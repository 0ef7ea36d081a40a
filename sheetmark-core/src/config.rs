use serde::{Deserialize, Serialize};

use crate::export::ExportSettings;
use crate::model::{DEFAULT_ANNOTATION_PREFIX, DEFAULT_LABEL_OPTIONS, DEFAULT_NOTE_MAX_CHARS};

/// What happens to progress when column roles are configured again
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReconfigurePolicy {
    /// Keep the current row and every entered value
    #[default]
    KeepProgress,
    /// Go back to the first row, keep entered values
    ResetCursor,
    /// Go back to the first row and drop entered values
    ResetAll,
}

impl ReconfigurePolicy {
    pub fn resets_cursor(&self) -> bool {
        !matches!(self, ReconfigurePolicy::KeepProgress)
    }

    pub fn resets_annotations(&self) -> bool {
        matches!(self, ReconfigurePolicy::ResetAll)
    }
}

/// Session-wide settings, loadable from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Options used when a label column is configured without its own list
    pub label_options: Vec<String>,
    pub note_max_chars: usize,
    /// Prefix of the output columns holding entered values
    pub annotation_prefix: String,
    pub export: ExportSettings,
    pub reconfigure: ReconfigurePolicy,
    /// Rows shown in the upload preview
    pub preview_rows: usize,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            label_options: DEFAULT_LABEL_OPTIONS.iter().map(|s| s.to_string()).collect(),
            note_max_chars: DEFAULT_NOTE_MAX_CHARS,
            annotation_prefix: DEFAULT_ANNOTATION_PREFIX.to_string(),
            export: ExportSettings::default(),
            reconfigure: ReconfigurePolicy::default(),
            preview_rows: 5,
        }
    }
}

impl AnnotatorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Label options joined the way the configuration form shows them
    pub fn label_option_list(&self) -> String {
        self.label_options.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AnnotatorConfig::from_json(r#"{"note_max_chars": 120, "reconfigure": "reset-all"}"#)
            .unwrap();
        assert_eq!(config.note_max_chars, 120);
        assert_eq!(config.reconfigure, ReconfigurePolicy::ResetAll);
        assert_eq!(config.annotation_prefix, "标注_");
        assert_eq!(config.label_option_list(), "正确,错误,不确定");
        assert_eq!(config.export.file_stem, "标注结果");
    }

    #[test]
    fn test_policy_flags() {
        assert!(!ReconfigurePolicy::KeepProgress.resets_cursor());
        assert!(ReconfigurePolicy::ResetCursor.resets_cursor());
        assert!(!ReconfigurePolicy::ResetCursor.resets_annotations());
        assert!(ReconfigurePolicy::ResetAll.resets_annotations());
    }

    #[test]
    fn test_round_trip_json() {
        let config = AnnotatorConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(AnnotatorConfig::from_json(&json).unwrap(), config);
    }
}
