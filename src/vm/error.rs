use thiserror::Error;

/// Error type for VM operations
#[derive(Error, Debug)]
pub enum VMError {
    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Undefined variable: {0}")]
    UnboundVariable(String),

    #[error("Undefined key: {0}")]
    UndefinedKey(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Opcode not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Invalid program counter: {0}")]
    InvalidProgramCounter(usize),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    /// A fault annotated with where it was raised
    #[error("{source} [{program}@{pc}: {instruction}]")]
    Fault {
        program: String,
        pc: usize,
        instruction: String,
        source: Box<VMError>,
    },
}

impl VMError {
    /// Attach the failing instruction's location, unless an inner frame already did
    pub fn at(self, program: &str, pc: usize, instruction: impl ToString) -> Self {
        match self {
            fault @ VMError::Fault { .. } => fault,
            other => VMError::Fault {
                program: program.to_string(),
                pc,
                instruction: instruction.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying fault, without location annotations
    pub fn root_cause(&self) -> &VMError {
        match self {
            VMError::Fault { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for VM operations
pub type VMResult<T> = Result<T, VMError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_error_display() {
        assert_eq!(VMError::StackUnderflow.to_string(), "Stack underflow");
        assert_eq!(VMError::DivisionByZero.to_string(), "Division by zero");
        assert_eq!(VMError::UnboundVariable("x".to_string()).to_string(), "Undefined variable: x");
        assert_eq!(VMError::UndefinedKey("7".to_string()).to_string(), "Undefined key: 7");
        assert_eq!(
            VMError::TypeMismatch("Cannot index into integer".to_string()).to_string(),
            "Type mismatch: Cannot index into integer"
        );
        assert_eq!(VMError::NotImplemented("MOD").to_string(), "Opcode not implemented: MOD");
        assert_eq!(VMError::InvalidProgramCounter(42).to_string(), "Invalid program counter: 42");
    }

    #[test]
    fn test_fault_display_includes_location() {
        let fault = VMError::DivisionByZero.at("main", 3, "DIV");
        assert_eq!(fault.to_string(), "Division by zero [main@3: DIV]");
    }

    #[test]
    fn test_at_keeps_innermost_location() {
        let inner = VMError::StackUnderflow.at("callee", 1, "ADD");
        let outer = inner.at("main", 7, "CALL");
        match &outer {
            VMError::Fault { program, pc, instruction, .. } => {
                assert_eq!(program, "callee");
                assert_eq!(*pc, 1);
                assert_eq!(instruction, "ADD");
            }
            other => panic!("Expected Fault, got {:?}", other),
        }
        assert!(matches!(outer.root_cause(), VMError::StackUnderflow));
    }

    #[test]
    fn test_root_cause_of_plain_error_is_itself() {
        let error = VMError::UndefinedKey("k".to_string());
        assert!(matches!(error.root_cause(), VMError::UndefinedKey(key) if key == "k"));
    }

    #[test]
    fn test_fault_exposes_source() {
        use std::error::Error;
        let fault = VMError::DivisionByZero.at("main", 0, "DIV");
        let source = fault.source().expect("fault should have a source");
        assert_eq!(source.to_string(), "Division by zero");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let error: VMError = io.into();
        assert!(error.to_string().starts_with("Output error:"));
    }
}
