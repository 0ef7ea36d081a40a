use crate::model::AnnotationEntry;
use crate::session::{FieldKind, RowView};

/// Draft values a row starts with: whatever is already stored or present in the source
pub fn initial_draft(view: &RowView) -> AnnotationEntry {
    view.editable_fields()
        .filter_map(|f| match &f.kind {
            FieldKind::Label { selected, .. } => selected.clone().map(|s| (f.column.clone(), s)),
            FieldKind::Note { text, .. } if !text.is_empty() => {
                Some((f.column.clone(), text.clone()))
            }
            _ => None,
        })
        .collect()
}

/// Picker position for an unanswered label: the last option ("不确定" by default)
pub fn default_label_index(options: &[String]) -> usize {
    options.len().saturating_sub(1)
}

/// Number of rows with at least one entered value, for the progress line
pub fn answered_rows(view: &RowView, answered: usize) -> String {
    format!("{}/{} answered", answered, view.total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FieldView;

    #[test]
    fn test_initial_draft_skips_unanswered() {
        let view = RowView {
            index: 0,
            total: 1,
            fields: vec![
                FieldView {
                    column: "q".into(),
                    kind: FieldKind::Display { text: "x".into() },
                },
                FieldView {
                    column: "label".into(),
                    kind: FieldKind::Label {
                        options: vec!["a".into(), "b".into()],
                        selected: None,
                    },
                },
                FieldView {
                    column: "note".into(),
                    kind: FieldKind::Note {
                        text: "kept".into(),
                        max_chars: 50,
                    },
                },
            ],
        };
        let draft = initial_draft(&view);
        assert_eq!(draft.len(), 1);
        assert_eq!(draft.get("note").map(String::as_str), Some("kept"));
        assert_eq!(answered_rows(&view, 0), "0/1 answered");
    }

    #[test]
    fn test_default_label_index() {
        assert_eq!(default_label_index(&["a".into(), "b".into(), "c".into()]), 2);
        assert_eq!(default_label_index(&[]), 0);
    }
}
