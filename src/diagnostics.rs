use std::fmt;

use thiserror::Error;

/// Represents a byte span within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: SourceSpan) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// 1-based line and column of the span start within `source`.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let offset = self.start.min(source.len());
        let mut line = 1;
        let mut column = 1;
        for (idx, ch) in source.char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        (line, column)
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Runtime,
}

impl DiagnosticKind {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Lexer => "lexical",
            DiagnosticKind::Parser => "parse",
            DiagnosticKind::Runtime => "runtime",
        }
    }
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn lexer(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Lexer, message)
    }

    pub fn parser(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Parser, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Runtime, message)
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Attaches `span` unless a more precise one is already present.
    pub fn or_span(mut self, span: SourceSpan) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Single-line rendering with the span resolved against `source`.
    pub fn render(&self, source: &str) -> String {
        let mut line = match self.span {
            Some(span) => {
                let (line, column) = span.line_col(source);
                format!(
                    "{} error at {line}:{column}: {}",
                    self.kind.label(),
                    self.message
                )
            }
            None => format!("{} error: {}", self.kind.label(), self.message),
        };
        for note in &self.notes {
            line.push_str(" (note: ");
            line.push_str(note);
            line.push(')');
        }
        line
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.label(), self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the Manifast interpreter.
#[derive(Debug, Error)]
pub enum ManifastError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("assertion failed: {message}")]
    Assertion {
        message: String,
        span: Option<SourceSpan>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManifastError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Diagnostic(Diagnostic::runtime(message))
    }

    pub fn runtime_at(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::Diagnostic(Diagnostic::runtime(message).with_span(span))
    }

    /// Fills in a span on diagnostics raised without one (e.g. by natives).
    pub fn or_span(self, span: SourceSpan) -> Self {
        match self {
            ManifastError::Diagnostic(diag) => ManifastError::Diagnostic(diag.or_span(span)),
            ManifastError::Assertion {
                message,
                span: None,
            } => ManifastError::Assertion {
                message,
                span: Some(span),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ManifastError>;
