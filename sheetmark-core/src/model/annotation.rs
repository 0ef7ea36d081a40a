use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CellValue, Table};

/// Prefix for the output columns produced by [`AnnotationStore::merge`]
pub const DEFAULT_ANNOTATION_PREFIX: &str = "标注_";

/// Values entered for one row, keyed by column name
pub type AnnotationEntry = BTreeMap<String, String>;

/// Row-indexed annotation values, independent of any UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationStore {
    prefix: String,
    entries: BTreeMap<usize, AnnotationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_ANNOTATION_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name of the merged output column for `column`
    pub fn output_column(&self, column: &str) -> String {
        format!("{}{}", self.prefix, column)
    }

    /// Entry for a row, empty if nothing was entered
    pub fn get(&self, row: usize) -> AnnotationEntry {
        self.entries.get(&row).cloned().unwrap_or_default()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        self.entries
            .get(&row)
            .and_then(|e| e.get(column))
            .map(String::as_str)
    }

    /// Upsert a value, creating the row entry if needed
    pub fn set(&mut self, row: usize, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        let entry = self.entries.entry(row).or_default();
        if entry.get(&column) == Some(&value) {
            return;
        }
        entry.insert(column, value);
        self.updated_at = Some(Utc::now());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.updated_at = None;
    }

    /// Drop values of `column` that fail `keep`. Returns how many were removed.
    pub fn retain_values(&mut self, column: &str, keep: impl Fn(&str) -> bool) -> usize {
        let mut removed = 0;
        for entry in self.entries.values_mut() {
            if entry.get(column).is_some_and(|v| !keep(v)) {
                entry.remove(column);
                removed += 1;
            }
        }
        self.entries.retain(|_, e| !e.is_empty());
        if removed > 0 {
            self.updated_at = Some(Utc::now());
        }
        removed
    }

    /// Rows with at least one entered value
    pub fn annotated_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| !e.is_empty())
            .map(|(row, _)| *row)
    }

    pub fn len(&self) -> usize {
        self.annotated_rows().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names that have at least one stored value
    pub fn columns(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|e| e.keys().map(String::as_str))
            .collect()
    }

    /// Copy of `table` with one prefixed column per annotated column
    pub fn merge(&self, table: &Table) -> Table {
        self.merge_with(table, &[])
    }

    /// Like [`merge`](Self::merge), but `declared` columns always get an output
    /// column even if nothing was entered for them yet.
    ///
    /// Output columns follow the table's column order; annotated names the
    /// table does not know are appended after them in name order. An output
    /// column that already exists is overwritten, so merging a merged table
    /// yields the same table.
    pub fn merge_with(&self, table: &Table, declared: &[String]) -> Table {
        let mut merged = table.clone();

        let annotated = self.columns();
        let mut wanted: Vec<&str> = table
            .columns
            .iter()
            .map(String::as_str)
            .filter(|c| annotated.contains(c) || declared.iter().any(|d| d == c))
            .collect();
        let mut unknown: BTreeSet<&str> = annotated.clone();
        unknown.extend(declared.iter().map(String::as_str));
        wanted.extend(unknown.into_iter().filter(|c| !table.has_column(c)));

        for column in wanted {
            let out = self.output_column(column);
            let col = merged.ensure_column(&out);
            for row in 0..merged.row_count() {
                let value = self
                    .value(row, column)
                    .map(|v| CellValue::Text(v.to_string()))
                    .unwrap_or(CellValue::Empty);
                merged.set_cell(row, col, value);
            }
        }

        merged
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> Table {
        Table::from_rows(
            vec!["q".into(), "label".into()],
            vec![
                vec![CellValue::from("a"), CellValue::Empty],
                vec![CellValue::from("b"), CellValue::Empty],
                vec![CellValue::from("c"), CellValue::Empty],
            ],
        )
    }

    #[test]
    fn test_retain_values_drops_rejected() {
        let mut store = AnnotationStore::new();
        store.set(0, "label", "old");
        store.set(1, "label", "yes");
        store.set(1, "note", "keep");

        assert_eq!(store.retain_values("label", |v| v == "yes"), 1);
        assert_eq!(store.value(0, "label"), None);
        assert_eq!(store.value(1, "label"), Some("yes"));
        assert_eq!(store.value(1, "note"), Some("keep"));
        assert_eq!(store.annotated_rows().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_get_untouched_row_is_empty() {
        let store = AnnotationStore::new();
        assert!(store.get(7).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let mut store = AnnotationStore::new();
        store.set(1, "label", "错误");
        assert_eq!(store.get(1).get("label").map(String::as_str), Some("错误"));
        assert!(store.get(0).is_empty());
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let mut store = AnnotationStore::new();
        store.set(0, "label", "ok");
        let stamp = store.updated_at;
        store.set(0, "label", "ok");
        assert_eq!(store.updated_at, stamp);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_merge_adds_prefixed_column() {
        let mut store = AnnotationStore::new();
        store.set(0, "label", "错误");
        let t = table();
        let merged = store.merge(&t);

        assert_eq!(merged.columns, vec!["q", "label", "标注_label"]);
        assert_eq!(merged.cell(0, "标注_label"), Some(&CellValue::from("错误")));
        assert_eq!(merged.cell(1, "标注_label"), Some(&CellValue::Empty));
        // The source table is left untouched
        assert_eq!(t.column_count(), 2);
    }

    #[test]
    fn test_merge_declared_columns() {
        let store = AnnotationStore::with_prefix("ann_");
        let merged = store.merge_with(&table(), &["label".to_string()]);
        assert_eq!(merged.columns, vec!["q", "label", "ann_label"]);
        assert!(merged.rows.iter().all(|r| r[2].is_empty()));
    }

    #[test]
    fn test_merge_of_merged_table_is_stable() {
        let mut store = AnnotationStore::new();
        store.set(2, "label", "x");
        let once = store.merge(&table());
        let twice = store.merge(&once);
        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn prop_set_then_get_returns_value(row in 0usize..50, col in "[a-z]{1,8}", value in "\\PC{0,20}") {
            let mut store = AnnotationStore::new();
            store.set(row, col.clone(), value.clone());
            prop_assert_eq!(store.get(row).get(&col).cloned(), Some(value));
        }

        #[test]
        fn prop_merge_is_repeatable(values in proptest::collection::vec((0usize..3, "[a-z]{0,5}"), 0..10)) {
            let mut store = AnnotationStore::new();
            for (row, v) in &values {
                store.set(*row, "label", v.clone());
            }
            let t = table();
            prop_assert_eq!(store.merge(&t), store.merge(&t));
        }
    }
}
