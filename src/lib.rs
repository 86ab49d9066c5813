//! Core library for the FiffiScript language: a small expression language whose
//! functions can be declared directly against symbols exported by native shared
//! libraries.

pub mod ast;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod native;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod value;

pub use ast::{Definition, Expr, Program};
pub use diagnostics::{Diagnostic, DiagnosticKind, FiffiError, RuntimeError, SourceSpan};
pub use environment::Environment;
pub use native::{NativeFunction, NativeSignature, TypeTag};
pub use repl::Repl;
pub use runtime::{Interpreter, run_source};
pub use value::{Callable, UserFunction, Value, ValueKind};
