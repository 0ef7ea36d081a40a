//! Marker-token parser for model outputs that carry labelled sub-answers.
//!
//! Recognised markers (ASCII case-insensitive, followed by `:` or `：`):
//!
//! - `private_answer`
//! - `public_answer`
//! - `原始条款编号`, only when the colon is followed by a `[` citation
//!
//! Extraction takes the first `private_answer` marker, its body running up to
//! the next `public_answer` marker (or the end of the text). The public body
//! is everything after that `public_answer` marker.

/// A marker keyword recognised in model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    PrivateAnswer,
    PublicAnswer,
    ClauseCitation,
}

impl Marker {
    pub fn keyword(&self) -> &'static str {
        match self {
            Marker::PrivateAnswer => "private_answer",
            Marker::PublicAnswer => "public_answer",
            Marker::ClauseCitation => "原始条款编号",
        }
    }

    /// Markers that start a new line when rendered
    pub fn breaks_line(&self) -> bool {
        matches!(self, Marker::PublicAnswer | Marker::ClauseCitation)
    }
}

/// Byte span of a marker occurrence, colon included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerMatch {
    pub marker: Marker,
    pub start: usize,
    pub end: usize,
}

/// Find the first occurrence of `marker` at or after byte offset `from`
pub fn find_marker(text: &str, marker: Marker, from: usize) -> Option<MarkerMatch> {
    let keyword = marker.keyword().as_bytes();
    let bytes = text.as_bytes();

    for (start, _) in text.char_indices().filter(|(i, _)| *i >= from) {
        let Some(candidate) = bytes.get(start..start + keyword.len()) else {
            break;
        };
        if !candidate.eq_ignore_ascii_case(keyword) {
            continue;
        }
        let after = start + keyword.len();
        let Some(end) = colon_end(text, after) else {
            continue;
        };
        if marker == Marker::ClauseCitation && !text[end..].trim_start().starts_with('[') {
            continue;
        }
        return Some(MarkerMatch { marker, start, end });
    }
    None
}

fn colon_end(text: &str, at: usize) -> Option<usize> {
    let rest = text.get(at..)?;
    if rest.starts_with(':') {
        Some(at + 1)
    } else if rest.starts_with('：') {
        Some(at + '：'.len_utf8())
    } else {
        None
    }
}

/// Put `public_answer` and clause citation markers on their own line
pub fn insert_line_breaks(text: &str) -> String {
    let mut starts: Vec<usize> = Vec::new();
    let markers = [Marker::PrivateAnswer, Marker::PublicAnswer, Marker::ClauseCitation];
    for marker in markers.into_iter().filter(Marker::breaks_line) {
        let mut from = 0;
        while let Some(m) = find_marker(text, marker, from) {
            starts.push(m.start);
            from = m.end;
        }
    }
    starts.sort_unstable();

    let mut out = String::with_capacity(text.len() + starts.len());
    let mut last = 0;
    for start in starts {
        let before = &text[last..start];
        let head = text[..start].trim_end_matches([' ', '\t']);
        if head.is_empty() || head.ends_with('\n') {
            out.push_str(before);
        } else {
            out.push_str(before.trim_end_matches([' ', '\t']));
            out.push('\n');
        }
        last = start;
    }
    out.push_str(&text[last..]);
    out
}

/// Private and public answer bodies, untrimmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Answers<'a> {
    pub private: &'a str,
    pub public: Option<&'a str>,
}

impl Answers<'_> {
    /// Bold labels with trimmed bodies, private first, one per line
    pub fn render(&self) -> String {
        let mut out = format!(
            "**{}:** {}",
            Marker::PrivateAnswer.keyword(),
            self.private.trim()
        );
        if let Some(public) = self.public {
            out.push('\n');
            out.push_str(&format!(
                "**{}:** {}",
                Marker::PublicAnswer.keyword(),
                public.trim()
            ));
        }
        out
    }
}

/// Split text into answer bodies; `None` when there is no `private_answer` marker
pub fn split_answers(text: &str) -> Option<Answers<'_>> {
    let private = find_marker(text, Marker::PrivateAnswer, 0)?;
    match find_marker(text, Marker::PublicAnswer, private.end) {
        Some(public) => Some(Answers {
            private: &text[private.end..public.start],
            public: Some(&text[public.end..]),
        }),
        None => Some(Answers {
            private: &text[private.end..],
            public: None,
        }),
    }
}
