//! Display formatting for model-output columns.
//!
//! Literal escapes are the two-character sequences backslash-`n` and
//! backslash-`t`; text that already carries real newlines is left alone.

pub mod answer;

use std::borrow::Cow;

use crate::model::CellValue;

pub use answer::{find_marker, split_answers, Answers, Marker, MarkerMatch};

const TEXT_PREFIX: &str = "{text:";
const ARTIFACT_CHARS: [char; 4] = ['"', '\'', '{', '}'];

/// Format a cell for rich-text display. Non-text cells are returned unchanged.
pub fn format_cell(value: &CellValue) -> CellValue {
    match value {
        CellValue::Text(text) => CellValue::Text(format_text(text)),
        other => other.clone(),
    }
}

/// Format model output: unescape, strip wrapper artifacts, split out
/// labelled answers, or fall back to converting `#` headings to bold.
pub fn format_text(text: &str) -> String {
    let text = unescape(text);
    let text = strip_artifacts(&text);
    let text = answer::insert_line_breaks(&text);

    match split_answers(&text) {
        Some(answers) => answers.render(),
        None => convert_headings(&text),
    }
}

/// Replace literal `\n` with a newline and literal `\t` with two spaces
pub fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('\\') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\\n", "\n").replace("\\t", "  "))
}

/// Drop a leading `{text:` wrapper and quote/brace debris around it, or a
/// single matched pair of quotes or braces around the whole text
pub fn strip_artifacts(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim();
    if let Some(body) = strip_prefix_ignore_ascii_case(trimmed, TEXT_PREFIX) {
        return Cow::Owned(
            body.trim_matches(|c: char| ARTIFACT_CHARS.contains(&c) || c.is_whitespace())
                .to_string(),
        );
    }

    match unwrap_pair(trimmed) {
        Some(inner) => Cow::Owned(inner.trim().to_string()),
        None => Cow::Borrowed(text),
    }
}

/// Inner text when `text` opens and closes with a matching pair
fn unwrap_pair(text: &str) -> Option<&str> {
    let close = match text.chars().next()? {
        '"' => '"',
        '\'' => '\'',
        '{' => '}',
        _ => return None,
    };
    let inner = text.get(1..)?.strip_suffix(close)?;
    Some(inner)
}

fn strip_prefix_ignore_ascii_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.as_bytes().get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix.as_bytes()) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Turn `#`, `##` and `###` line prefixes into bold text
pub fn convert_headings(text: &str) -> String {
    text.split('\n')
        .map(convert_heading_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn convert_heading_line(line: &str) -> Cow<'_, str> {
    let rest = line
        .strip_prefix("###")
        .or_else(|| line.strip_prefix("##"))
        .or_else(|| line.strip_prefix('#'));

    match rest.map(str::trim) {
        Some("") => Cow::Borrowed(""),
        Some(title) => Cow::Owned(format!("**{}**", title)),
        None => Cow::Borrowed(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_heading_scenario() {
        assert_eq!(format_text("###Header\ntext"), "**Header**\ntext");
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(
            convert_headings("# One\n## Two\n### Three\n#### Four\nplain"),
            "**One**\n**Two**\n**Three**\n**# Four**\nplain"
        );
        assert_eq!(convert_headings("#"), "");
    }

    #[test]
    fn test_literal_escapes() {
        assert_eq!(format_text(r"line one\nline two\tend"), "line one\nline two  end");
        // Real newlines need no transformation
        assert_eq!(format_text("a\nb"), "a\nb");
    }

    #[test]
    fn test_strip_wrapper() {
        assert_eq!(format_text(r#"{TEXT: "hello world"}"#), "hello world");
        assert_eq!(format_text("\"quoted\""), "quoted");
        assert_eq!(format_text("  keep leading space"), "  keep leading space");
    }

    #[test]
    fn test_inner_quotes_are_content() {
        assert_eq!(format_text(r#"He said "hi""#), r#"He said "hi""#);
        assert_eq!(format_text(r#""open only"#), r#""open only"#);
        assert_eq!(format_text("'single'"), "single");
        assert_eq!(format_text("{braced}"), "braced");
    }

    #[test]
    fn test_private_public_extraction() {
        let raw = r#"{text: "private_answer: 内部依据\n原始条款编号: [4.2] public_answer：对外回复"}"#;
        assert_eq!(
            format_text(raw),
            "**private_answer:** 内部依据\n原始条款编号: [4.2]\n**public_answer:** 对外回复"
        );
    }

    #[test]
    fn test_public_only_falls_back_to_headings() {
        assert_eq!(
            format_text("# Title public_answer: ok"),
            "**Title**\npublic_answer: ok"
        );
    }

    #[test]
    fn test_non_text_cells_unchanged() {
        for value in [
            CellValue::Empty,
            CellValue::Int(3),
            CellValue::Float(1.5),
            CellValue::Bool(true),
        ] {
            assert_eq!(format_cell(&value), value);
        }
        assert_eq!(format_cell(&CellValue::from("##x")), CellValue::from("**x**"));
    }

    fn plain_line() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ,.]{0,24}"
    }

    proptest! {
        #[test]
        fn prop_non_text_cells_unchanged(i in any::<i64>(), f in any::<f64>(), b in any::<bool>()) {
            prop_assert_eq!(format_cell(&CellValue::Int(i)), CellValue::Int(i));
            prop_assert_eq!(format_cell(&CellValue::Bool(b)), CellValue::Bool(b));
            let formatted = format_cell(&CellValue::Float(f));
            match formatted {
                CellValue::Float(g) => prop_assert!(g.to_bits() == f.to_bits()),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        #[test]
        fn prop_plain_lines_unchanged(lines in proptest::collection::vec(plain_line(), 1..8)) {
            let text = lines.join("\n");
            prop_assert_eq!(convert_headings(&text), text.clone());
            prop_assert_eq!(format_text(&text), text);
        }

        #[test]
        fn prop_headings_bolded(level in 1usize..=3, title in "[a-zA-Z0-9]{1,16}", tail in plain_line()) {
            let text = format!("{}{}\n{}", "#".repeat(level), title, tail);
            prop_assert_eq!(format_text(&text), format!("**{}**\n{}", title, tail));
        }
    }
}
