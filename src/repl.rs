use rustyline::{DefaultEditor, error::ReadlineError};

use crate::{
    config::InterpreterConfig,
    diagnostics::{ManifastError, Result},
    execute::ASSERTION_FAILURE_MARKER,
    runtime::Interpreter,
};

/// Line-at-a-time session sharing one global scope across inputs.
pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self {
            interpreter: Interpreter::with_config(config.with_echo_output(true)),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(|err| ManifastError::from(std::io::Error::other(err)))?;
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    self.eval_line(trimmed);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(ManifastError::from(std::io::Error::other(err))),
            }
        }
        Ok(())
    }

    /// Evaluates one input, printing its value (unless nil) or its error.
    pub fn eval_line(&mut self, line: &str) {
        let result = self.interpreter.eval_source(line);
        let printed = self.interpreter.take_output();
        if !printed.is_empty() && !printed.ends_with('\n') {
            println!();
        }
        match result {
            Ok(value) if value.is_nil() => {}
            Ok(value) => println!("{value:?}"),
            Err(ManifastError::Diagnostic(diag)) => eprintln!("{}", diag.render(line)),
            Err(ManifastError::Assertion { message, .. }) => {
                eprintln!("{ASSERTION_FAILURE_MARKER}: {message}")
            }
            Err(other) => eprintln!("error: {other}"),
        }
    }
}
