/// Tunables for a single interpreter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Calls nested deeper than this abort with a runtime error.
    pub max_call_depth: usize,
    /// Maximum number of statements executed before the run is aborted.
    pub step_budget: Option<u64>,
    /// Mirror printed text to the process stdout as it is produced.
    pub echo_output: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 10_000,
            step_budget: None,
            echo_output: false,
        }
    }
}

impl InterpreterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_step_budget(mut self, budget: Option<u64>) -> Self {
        self.step_budget = budget;
        self
    }

    pub fn with_echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }
}
