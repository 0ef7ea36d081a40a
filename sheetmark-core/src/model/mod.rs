pub mod annotation;
pub mod role;
pub mod table;

pub use annotation::{AnnotationEntry, AnnotationStore, DEFAULT_ANNOTATION_PREFIX};
pub use role::{
    parse_option_list, ColumnRole, RoleConfig, RoleKind, DEFAULT_LABEL_OPTIONS,
    DEFAULT_NOTE_MAX_CHARS,
};
pub use table::{CellValue, LoadedTable, Table};
