use std::fmt;

use thiserror::Error;

use crate::native::TypeTag;

/// Represents a byte span within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// One-based line and column of `start` within `source`.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let offset = self.start.min(source.len());
        let prefix = &source[..offset];
        let line = prefix.matches('\n').count() + 1;
        let column = match prefix.rfind('\n') {
            Some(newline) => prefix[newline + 1..].chars().count() + 1,
            None => prefix.chars().count() + 1,
        };
        (line, column)
    }
}

/// Classification of a front-end diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    /// A native declaration that could not be turned into a callable.
    Declaration,
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

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Renders the diagnostic as a single `origin:line:col: message` line.
    pub fn render(&self, origin: &str, source: &str) -> String {
        let mut line = match self.span {
            Some(span) => {
                let (line, column) = span.line_col(source);
                format!("{origin}:{line}:{column}: {}", self.message)
            }
            None => format!("{origin}: {}", self.message),
        };
        for note in &self.notes {
            line.push_str(" (");
            line.push_str(note);
            line.push(')');
        }
        line
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        for note in &self.notes {
            write!(f, "; note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Failures raised while declaring, evaluating or calling.
///
/// None of these are recoverable from inside a script; they unwind to whoever
/// started the evaluation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("error opening library {}", display_library(.path))]
    LibraryLoad {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("error resolving symbol {symbol} in {}", display_library(.library))]
    SymbolResolve {
        library: String,
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    #[error("error initializing call signature for {name}: {reason}")]
    Signature { name: String, reason: String },

    #[error("wrong number of arguments to {name}; expected: {expected}, but got: {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported argument type {tag} in declaration of native function {name}")]
    UnsupportedArgument { name: String, tag: TypeTag },

    #[error("text argument to {name} contains an interior NUL byte")]
    InteriorNul { name: String },

    #[error("native function {name} returned a null text pointer")]
    NullText { name: String },

    #[error("undefined function or variable: {name}")]
    Undefined { name: String },

    #[error("value of type {type_name} is not callable")]
    NotCallable { type_name: &'static str },

    #[error("no implicit text to number conversion (requested {kind})")]
    TextToNumber { kind: &'static str },

    #[error("cannot convert callable to {kind}")]
    CallableConversion { kind: &'static str },

    #[error("cannot pop the root scope")]
    RootScope,

    #[error("function main() not found")]
    MainNotFound,
}

fn display_library(path: &str) -> &str {
    if path.is_empty() {
        "<current process>"
    } else {
        path
    }
}

/// Unified error type for the FiffiScript toolchain.
#[derive(Debug, Error)]
pub enum FiffiError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FiffiError {
    /// Renders the error as the single line printed at the process boundary.
    pub fn render(&self, origin: &str, source: &str) -> String {
        match self {
            FiffiError::Diagnostic(diag) => diag.render(origin, source),
            FiffiError::Runtime(err) => match std::error::Error::source(err) {
                Some(cause) => format!("{origin}: {err}: {cause}"),
                None => format!("{origin}: {err}"),
            },
            FiffiError::Io(err) => format!("{origin}: I/O error: {err}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, FiffiError>;
