//! Applies a removal plan to the original text.
//!
//! The tree is never re-printed. Every edit is a byte range of the original source, so
//! everything outside the edited ranges (comments, formatting, line breaks) is copied as is.

use std::cmp::Reverse;

use crate::model::{CallSite, Position, TextSpan};

/// Expression-position stand-in for a removed call.
pub const PLACEHOLDER: &str = "void 0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Drop the statement together with the whitespace that only existed for it.
    RemoveStatement,
    /// Replace a control-flow body statement with `;`.
    EmptyStatement,
    /// Replace the call expression with [`PLACEHOLDER`].
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub span: TextSpan,
    pub kind: EditKind,
}

impl Edit {
    pub fn for_site(site: &CallSite) -> Self {
        match site.position {
            Position::Statement { statement, in_list: true } => Self {
                span: statement,
                kind: EditKind::RemoveStatement,
            },
            Position::Statement { statement, in_list: false } => Self {
                span: statement,
                kind: EditKind::EmptyStatement,
            },
            Position::Expression => Self {
                span: site.span,
                kind: EditKind::Placeholder,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Splice {
    start: usize,
    end: usize,
    text: &'static str,
    deletion: bool,
}

/// Applies `edits` to `source`. Edits nested inside another edit are dropped since the outer
/// one already covers them.
pub fn apply_edits(source: &str, edits: &[Edit]) -> String {
    let mut sorted = edits.to_vec();
    sorted.sort_by_key(|e| (e.span.start, Reverse(e.span.end)));

    let mut outermost: Vec<Edit> = Vec::with_capacity(sorted.len());
    for edit in sorted {
        if outermost.last().is_some_and(|last| last.span.contains(edit.span)) {
            continue;
        }
        outermost.push(edit);
    }

    let mut splices: Vec<Splice> = Vec::with_capacity(outermost.len());
    for edit in outermost {
        let (start, end) = (edit.span.start as usize, edit.span.end as usize);
        let splice = match edit.kind {
            EditKind::RemoveStatement => Splice { start, end, text: "", deletion: true },
            EditKind::EmptyStatement => Splice { start, end, text: ";", deletion: false },
            EditKind::Placeholder => Splice {
                start,
                end,
                text: placeholder_before(&source[end..]),
                deletion: false,
            },
        };

        if let Some(prev) = splices.last_mut() {
            if prev.deletion && splice.deletion && is_horizontal_space(&source[prev.end..splice.start]) {
                prev.end = splice.end;
                continue;
            }
        }
        splices.push(splice);
    }

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for splice in splices {
        let before = preceding(&out, &source[cursor..splice.start.max(cursor)]);

        if splice.deletion && !before.ends_statement() && starts_continuation(&source[splice.end..]) {
            // The next line would glue onto the previous statement; leave an empty statement.
            let start = splice.start.max(cursor);
            out.push_str(&source[cursor..start]);
            out.push(';');
            cursor = splice.end.max(cursor);
            continue;
        }

        let (start, end) = if splice.deletion {
            widen_deletion(source, splice.start, splice.end)
        } else {
            (splice.start, splice.end)
        };
        let start = start.max(cursor);
        out.push_str(&source[cursor..start]);
        if splice.text.starts_with('(') && before.line_break && before.ends_expression() {
            out.push(';');
        }
        out.push_str(splice.text);
        cursor = end.max(cursor);
    }
    out.push_str(&source[cursor..]);
    out
}

/// Last non-whitespace character emitted before a splice, and whether a line break follows it.
#[derive(Debug, Clone, Copy)]
struct Preceding {
    ch: Option<char>,
    line_break: bool,
}

impl Preceding {
    fn ends_statement(&self) -> bool {
        matches!(self.ch, None | Some(';' | '{' | '}'))
    }

    fn ends_expression(&self) -> bool {
        self.ch
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | ')' | ']' | '\'' | '"' | '`'))
    }
}

fn preceding(out: &str, gap: &str) -> Preceding {
    let mut line_break = false;
    for part in [gap, out] {
        let trimmed = part.trim_end();
        line_break |= part[trimmed.len()..].contains('\n');
        if let Some(ch) = trimmed.chars().next_back() {
            return Preceding { ch: Some(ch), line_break };
        }
    }
    Preceding { ch: None, line_break }
}

/// True when the code after a removed statement would continue the previous expression once
/// the statement is gone.
fn starts_continuation(rest: &str) -> bool {
    let mut rest = rest;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |i| &after[i..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]);
        } else {
            return rest.starts_with(['[', '(', '`', '+', '-', '/']);
        }
    }
}

/// `void 0` binds looser than member access, calls, tagged templates and `**`.
fn placeholder_before(rest: &str) -> &'static str {
    let next = rest.trim_start();
    let binds_tighter = next.starts_with(['.', '[', '(', '`']) || next.starts_with("?.") || next.starts_with("**");
    if binds_tighter { "(void 0)" } else { PLACEHOLDER }
}

fn widen_deletion(source: &str, start: usize, end: usize) -> (usize, usize) {
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[end..].find('\n').map_or(source.len(), |i| end + i);

    let blank_before = is_blank(&source[line_start..start]);
    let blank_after = is_blank(&source[end..line_end]);

    if blank_before && blank_after {
        let stop = if line_end < source.len() { line_end + 1 } else { line_end };
        return (line_start, stop);
    }

    let trailing = horizontal_run(&source[end..line_end]);
    if !blank_after && trailing > 0 {
        return (start, end + trailing);
    }
    if blank_after {
        let leading = source[line_start..start]
            .bytes()
            .rev()
            .take_while(|b| matches!(b, b' ' | b'\t'))
            .count();
        return (start - leading, end + trailing);
    }
    (start, end)
}

fn horizontal_run(s: &str) -> usize {
    s.bytes().take_while(|b| matches!(b, b' ' | b'\t')).count()
}

fn is_horizontal_space(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t'))
}

fn is_blank(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_of(source: &str, needle: &str) -> TextSpan {
        let start = source.find(needle).expect("needle") as u32;
        TextSpan::new(start, start + needle.len() as u32)
    }

    fn remove(source: &str, needle: &str) -> Edit {
        Edit { span: span_of(source, needle), kind: EditKind::RemoveStatement }
    }

    #[test]
    fn whole_line_statement_drops_line() {
        let src = "a();\n    console.log(1);\nb();\n";
        assert_eq!(apply_edits(src, &[remove(src, "console.log(1);")]), "a();\nb();\n");
    }

    #[test]
    fn crlf_lines_are_dropped_whole() {
        let src = "a();\r\nconsole.log(1);\r\nb();\r\n";
        assert_eq!(apply_edits(src, &[remove(src, "console.log(1);")]), "a();\r\nb();\r\n");
    }

    #[test]
    fn inline_statement_takes_trailing_space() {
        let src = "foo(); console.log(\"hi\"); bar();";
        assert_eq!(apply_edits(src, &[remove(src, "console.log(\"hi\");")]), "foo(); bar();");
    }

    #[test]
    fn last_statement_on_line_takes_leading_space() {
        let src = "foo(); console.log(1);\nbar();";
        assert_eq!(apply_edits(src, &[remove(src, "console.log(1);")]), "foo();\nbar();");
    }

    #[test]
    fn adjacent_deletions_merge_into_whole_line() {
        let src = "x();\n  console.log(1); console.log(2);\ny();";
        let edits = [remove(src, "console.log(1);"), remove(src, "console.log(2);")];
        assert_eq!(apply_edits(src, &edits), "x();\ny();");
    }

    #[test]
    fn multi_line_statement_removed() {
        let src = "a();\nconsole.log(\n  1,\n  2\n);\nb();";
        assert_eq!(apply_edits(src, &[remove(src, "console.log(\n  1,\n  2\n);")]), "a();\nb();");
    }

    #[test]
    fn trailing_comment_is_kept() {
        let src = "console.log(1); // note\n";
        assert_eq!(apply_edits(src, &[remove(src, "console.log(1);")]), "// note\n");
    }

    #[test]
    fn placeholder_and_empty_statement() {
        let src = "const x = console.log(y);\nif (a) console.log(2);";
        let edits = [
            Edit { span: span_of(src, "console.log(y)"), kind: EditKind::Placeholder },
            Edit { span: span_of(src, "console.log(2);"), kind: EditKind::EmptyStatement },
        ];
        assert_eq!(apply_edits(src, &edits), "const x = void 0;\nif (a) ;");
    }

    #[test]
    fn placeholder_parenthesized_before_member_access() {
        let src = "a = console.log(1).b;";
        let edits = [Edit { span: span_of(src, "console.log(1)"), kind: EditKind::Placeholder }];
        assert_eq!(apply_edits(src, &edits), "a = (void 0).b;");
    }

    #[test]
    fn deletion_keeps_neighbours_apart() {
        let src = "const a = b\nconsole.log(1);\n[1, 2].forEach(f)\n";
        assert_eq!(
            apply_edits(src, &[remove(src, "console.log(1);")]),
            "const a = b\n;\n[1, 2].forEach(f)\n"
        );
    }

    #[test]
    fn consecutive_deletions_keep_neighbours_apart() {
        let src = "let t = x\nconsole.log(1);\nconsole.log(2);\n// note\n`tpl`.trim()\n";
        let edits = [remove(src, "console.log(1);"), remove(src, "console.log(2);")];
        assert_eq!(apply_edits(src, &edits), "let t = x\n;\n// note\n`tpl`.trim()\n");
    }

    #[test]
    fn deletion_after_terminated_statement_drops_line() {
        let src = "const a = b;\nconsole.log(1);\n(f)();\n";
        assert_eq!(apply_edits(src, &[remove(src, "console.log(1);")]), "const a = b;\n(f)();\n");
    }

    #[test]
    fn comment_after_deletion_is_not_a_continuation() {
        let src = "const a = b\nconsole.log(1);\n// (later)\nc()\n";
        assert_eq!(apply_edits(src, &[remove(src, "console.log(1);")]), "const a = b\n// (later)\nc()\n");
    }

    #[test]
    fn parenthesized_placeholder_on_new_line_is_guarded() {
        let src = "const a = b\nconsole.log(1).x\n";
        let edits = [Edit { span: span_of(src, "console.log(1)"), kind: EditKind::Placeholder }];
        assert_eq!(apply_edits(src, &edits), "const a = b\n;(void 0).x\n");
    }

    #[test]
    fn nested_edit_is_subsumed() {
        let src = "console.log(console.count());\nz();";
        let edits = [
            remove(src, "console.log(console.count());"),
            Edit { span: span_of(src, "console.count()"), kind: EditKind::Placeholder },
        ];
        assert_eq!(apply_edits(src, &edits), "z();");
    }
}
