//! Runtime configuration options

/// Configuration options for the pith runtime
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    /// Print a summary of each program before it runs
    pub debug_mode: bool,
    /// Print every fetched instruction together with the operand stack
    pub stack_trace: bool,
}

impl RuntimeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug mode
    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    /// Enable or disable stack trace
    pub fn with_stack_trace(mut self, stack_trace: bool) -> Self {
        self.stack_trace = stack_trace;
        self
    }
}
