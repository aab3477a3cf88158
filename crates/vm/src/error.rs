//! Runtime errors (spec.md §7): a message plus a frame-by-frame stack
//! trace, formatted and printed once before the VM resets its stack.

use std::fmt;

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    /// Rendered top-to-bottom, each entry already formatted as
    /// `[line L] in <fn-name|script>`.
    pub stack_trace: Vec<String>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError { message: message.into(), stack_trace: Vec::new() }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        for (i, line) in self.stack_trace.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}
