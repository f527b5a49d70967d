//! Interpreter for Manifast, a small Lua-like scripting language with
//! Indonesian keywords. Lexing, parsing, tree-walking evaluation, the
//! native `math`/`string`/`os` modules, and a REPL.

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod execute;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stack;
pub mod stdlib;
pub mod value;

pub use config::InterpreterConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, ManifastError, SourceSpan};
pub use execute::{
    ASSERTION_FAILURE_MARKER, ExecutionOutcome, ExecutionStatus, RUNTIME_ERROR_MARKER, execute,
    execute_with_config,
};
pub use repl::Repl;
pub use runtime::{ExecutionContext, Interpreter};
