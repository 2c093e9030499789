//! Diagnostics and the caret-style error rendering used by every stage of
//! the pipeline (lexer, parser, code generator).
//!
//! The source compiler reports errors by pointing a raw `char*` back into
//! the original input buffer (`error_at(loc, msg)`) and printing a `^`
//! under the offending column. `Span`/`Diagnostic` here keep the same
//! user-facing shape, but as a byte offset into a `Source` that owns its
//! text, instead of a pointer into a buffer that is never freed until
//! process exit.

use std::fmt;
use std::path::PathBuf;

/// The full text of the file under compilation, kept around so that
/// diagnostics can slice out the offending source line.
#[derive(Debug, Clone)]
pub struct Source {
    pub file_name: PathBuf,
    pub text: String,
}

impl Source {
    pub fn new(file_name: PathBuf, text: String) -> Self {
        Source { file_name, text }
    }

    /// 1-based line number and the full text of the line containing `offset`.
    fn line_at(&self, offset: usize) -> (usize, &str, usize) {
        let offset = offset.min(self.text.len());
        let line_start = self.text[..offset]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let line_end = self.text[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(self.text.len());
        let line_num = self.text[..line_start].matches('\n').count() + 1;
        (line_num, &self.text[line_start..line_end], offset - line_start)
    }
}

/// A byte range in the source file. Code generation diagnostics, which the
/// original compiler cannot emit at all (codegen assumes a well-typed
/// tree), reuse the span of the node that failed to fit an assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn point(at: usize) -> Self {
        Span { start: at, end: at }
    }
}

/// A single fatal error. The pipeline has no error recovery: the first
/// `Diagnostic` produced anywhere aborts the compilation.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            span,
            message: message.into(),
        }
    }

    /// Render as `<file>:<line>: <source line>\n<spaces>^ <message>`,
    /// matching `error_at`'s layout.
    pub fn render(&self, source: &Source) -> String {
        let (line_num, line_text, col) = source.line_at(self.span.start);
        let prefix = format!("{}:{}: ", source.file_name.display(), line_num);
        let indent = prefix.len() + col;
        format!(
            "{prefix}{line_text}\n{:indent$}^ {msg}",
            "",
            indent = indent,
            msg = self.message
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_caret_under_offending_column() {
        let source = Source::new(PathBuf::from("foo.c"), "int main() {\n  x + + 5;\n}\n".into());
        let offset = source.text.find("+ 5").unwrap() + 2;
        let diag = Diagnostic::new(Span::point(offset), "expected an expression");
        let rendered = diag.render(&source);
        assert!(rendered.contains("foo.c:2:"));
        assert!(rendered.ends_with("^ expected an expression"));
    }

    #[test]
    fn line_number_counts_preceding_newlines() {
        let source = Source::new(PathBuf::from("foo.c"), "a;\nb;\nc + ;\n".into());
        let offset = source.text.rfind("c +").unwrap() + 4;
        let diag = Diagnostic::new(Span::point(offset), "bad");
        assert!(diag.render(&source).contains("foo.c:3:"));
    }
}
