use crate::{config::InterpreterConfig, diagnostics::ManifastError, runtime::Interpreter};

/// Prefix of the line appended when a run stops on an error.
pub const RUNTIME_ERROR_MARKER: &str = "[ERROR RUNTIME]";
/// Phrase identifying a failed `assert` in rendered output.
pub const ASSERTION_FAILURE_MARKER: &str = "Assertion Failed";
const ASSERTION_PREFIX: &str = "[ASSERT GAGAL]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Ok,
    /// Rendered diagnostic, e.g. `runtime error at 3:5: division by zero`.
    RuntimeError(String),
    AssertionFailure(String),
}

/// Everything a run printed plus how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub output: String,
    pub status: ExecutionStatus,
}

impl ExecutionOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, ExecutionStatus::Ok)
    }

    /// The marker line for a failed run, without a trailing newline.
    pub fn diagnostic_line(&self) -> Option<String> {
        match &self.status {
            ExecutionStatus::Ok => None,
            ExecutionStatus::RuntimeError(message) => {
                Some(format!("{RUNTIME_ERROR_MARKER} {message}"))
            }
            ExecutionStatus::AssertionFailure(message) => Some(format!(
                "{ASSERTION_PREFIX} {ASSERTION_FAILURE_MARKER}: {message}"
            )),
        }
    }

    /// Output followed by the marker line, starting on a fresh line.
    pub fn rendered(&self) -> String {
        let mut text = self.output.clone();
        if let Some(line) = self.diagnostic_line() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&line);
            text.push('\n');
        }
        text
    }
}

/// Runs `source` in a fresh interpreter and returns the captured output with
/// any diagnostic appended as a marker line.
pub fn execute(source: &str) -> String {
    execute_with_config(source, InterpreterConfig::default()).rendered()
}

#[tracing::instrument(level = "debug", skip_all, fields(bytes = source.len()))]
pub fn execute_with_config(source: &str, config: InterpreterConfig) -> ExecutionOutcome {
    let mut interpreter = Interpreter::with_config(config);
    let result = interpreter.eval_source(source);
    let output = interpreter.take_output();
    let status = match result {
        Ok(_) => ExecutionStatus::Ok,
        Err(err) => classify(err, source),
    };
    if !matches!(status, ExecutionStatus::Ok) {
        tracing::debug!(?status, "run stopped");
    }
    ExecutionOutcome { output, status }
}

fn classify(err: ManifastError, source: &str) -> ExecutionStatus {
    match err {
        ManifastError::Diagnostic(diagnostic) => {
            ExecutionStatus::RuntimeError(diagnostic.render(source))
        }
        ManifastError::Assertion { message, .. } => ExecutionStatus::AssertionFailure(message),
        ManifastError::Io(err) => ExecutionStatus::RuntimeError(format!("runtime error: {err}")),
    }
}
