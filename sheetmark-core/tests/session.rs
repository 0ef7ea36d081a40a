//! End-to-end flows through the command interface.

use sheetmark_core::model::AnnotationEntry;
use sheetmark_core::{
    read_table, AnnotatorConfig, CellValue, ColumnRole, Command, ExportFormat, FieldKind, Render,
    RoleConfig, Session, Step,
};

fn upload(session: &mut Session, filename: &str, bytes: &[u8]) -> Render {
    session
        .dispatch(Command::Upload {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
        })
        .unwrap()
}

fn download(render: Render) -> Vec<u8> {
    match render {
        Render::Download(payload) => payload.bytes,
        other => panic!("expected a download, got {:?}", other),
    }
}

#[test]
fn formatted_display_renders_heading() {
    let json = r####"[{"q": "What?", "model_out": "###Header\ntext"}]"####;
    let mut session = Session::default();
    upload(&mut session, "one.json", json.as_bytes());

    let roles = RoleConfig::new()
        .with("q", ColumnRole::Display)
        .with("model_out", ColumnRole::FormattedDisplay);
    let Render::Row(view) = session.dispatch(Command::Configure(roles)).unwrap() else {
        panic!("expected a row view");
    };

    assert_eq!(
        view.field("q").map(|f| f.kind.clone()),
        Some(FieldKind::Display {
            text: "What?".to_string()
        })
    );
    assert_eq!(
        view.field("model_out").map(|f| f.kind.clone()),
        Some(FieldKind::Formatted {
            text: "**Header**\ntext".to_string()
        })
    );
}

#[test]
fn label_value_is_exported_in_new_column() {
    let csv = "q,verdict\na,\nb,\nc,\n";
    let mut session = Session::default();
    upload(&mut session, "rows.csv", csv.as_bytes());

    let roles = RoleConfig::new()
        .with("q", ColumnRole::Display)
        .with("verdict", ColumnRole::label_from_list("正确,错误,不确定"));
    session.dispatch(Command::Configure(roles)).unwrap();

    let mut entry = AnnotationEntry::new();
    entry.insert("verdict".to_string(), "错误".to_string());
    session.dispatch(Command::Save(entry)).unwrap();

    let merged = session.merged_table().unwrap();
    assert_eq!(merged.columns, vec!["q", "verdict", "标注_verdict"]);
    assert_eq!(merged.cell(0, "标注_verdict"), Some(&CellValue::from("错误")));
    assert_eq!(merged.cell(1, "标注_verdict"), Some(&CellValue::Empty));
    assert_eq!(merged.cell(2, "标注_verdict"), Some(&CellValue::Empty));

    for format in ExportFormat::all() {
        let bytes = download(session.dispatch(Command::Export(*format)).unwrap());
        let filename = format!("out.{}", format.extension());
        let back = read_table(&filename, &bytes).unwrap();
        assert_eq!(back.columns, merged.columns, "{:?}", format);
        assert_eq!(back.cell(0, "标注_verdict"), Some(&CellValue::from("错误")), "{:?}", format);
        assert_eq!(back.cell(1, "标注_verdict"), Some(&CellValue::Empty), "{:?}", format);
    }
}

#[test]
fn next_clamps_at_last_row() {
    let csv = "n\n1\n2\n3\n4\n5\n";
    let mut session = Session::default();
    upload(&mut session, "five.csv", csv.as_bytes());
    session
        .dispatch(Command::Configure(RoleConfig::new().with("n", ColumnRole::Display)))
        .unwrap();

    for _ in 0..5 {
        session.dispatch(Command::Next).unwrap();
    }
    assert_eq!(session.cursor().index(), 4);

    let Render::Row(view) = session.dispatch(Command::Next).unwrap() else {
        panic!("expected a row view");
    };
    assert_eq!(view.position(), 5);
    assert_eq!(view.total, 5);
}

#[test]
fn export_is_repeatable() {
    let csv = "q,note\nx,\ny,\n";
    let mut session = Session::new(AnnotatorConfig::default());
    upload(&mut session, "rows.csv", csv.as_bytes());
    session
        .dispatch(Command::Configure(
            RoleConfig::new().with("note", ColumnRole::default_note()),
        ))
        .unwrap();
    session.dispatch(Command::Last).unwrap();

    let mut entry = AnnotationEntry::new();
    entry.insert("note".to_string(), "需要复核".to_string());
    session.dispatch(Command::Save(entry)).unwrap();

    let first = download(session.dispatch(Command::Export(ExportFormat::Json)).unwrap());
    let second = download(session.dispatch(Command::Export(ExportFormat::Json)).unwrap());
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    assert!(text.contains("\"标注_note\": \"需要复核\""));
    assert!(text.contains("\"标注_note\": null"));
    assert_eq!(session.step(), Step::Annotate);
}

#[test]
fn duplicate_headers_survive_json_export() {
    let mut session = Session::default();
    upload(&mut session, "dup.csv", b"a,a\n1,2\n");
    session
        .dispatch(Command::Configure(RoleConfig::new().with("a", ColumnRole::Display)))
        .unwrap();

    let bytes = download(session.dispatch(Command::Export(ExportFormat::Json)).unwrap());
    let back = read_table("out.json", &bytes).unwrap();
    assert_eq!(back.columns, vec!["a", "a.1"]);
    assert_eq!(back.cell(0, "a"), Some(&CellValue::Int(1)));
    assert_eq!(back.cell(0, "a.1"), Some(&CellValue::Int(2)));
}
