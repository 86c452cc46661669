use crate::compat::{String, fmt};
use crate::tokenizer::SourcePos;

// Every fallible core operation returns this. Variants that mention an atom
// carry its rendered text rather than a live reference, since the atom may be
// released before the caller gets to print the error.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    StackUnderflow {
        context: String,
    },
    StackUnderflowAt {
        pos: SourcePos,
        context: String,
    },
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    ResolutionFailure {
        name: String,
        pos: Option<SourcePos>,
    },
    AllocationFailure {
        requested: usize,
    },
    UserAssertion(String),
    DivisionByZero,
    Syntax {
        pos: SourcePos,
        message: String,
    },
    Corrupt(String),
}

impl RuntimeError {
    pub fn underflow(context: &str) -> Self {
        RuntimeError::StackUnderflow {
            context: context.into(),
        }
    }

    pub fn mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            expected,
            found: found.into(),
        }
    }

    /// Fatal errors halt the whole runtime; the rest only end the thread
    /// that raised them.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RuntimeError::StackUnderflow { .. }
                | RuntimeError::StackUnderflowAt { .. }
                | RuntimeError::ResolutionFailure { .. }
                | RuntimeError::UserAssertion(_)
        )
    }

    /// Attach a source position to errors raised while a token was running.
    pub fn at(self, pos: &SourcePos) -> Self {
        match self {
            RuntimeError::StackUnderflow { context } => RuntimeError::StackUnderflowAt {
                pos: pos.clone(),
                context,
            },
            RuntimeError::ResolutionFailure { name, pos: None } => {
                RuntimeError::ResolutionFailure {
                    name,
                    pos: Some(pos.clone()),
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackUnderflow { context } => write!(f, "Stack underflow: {}", context),
            RuntimeError::StackUnderflowAt { pos, context } => write!(
                f,
                "Stack underflow at line {}, column {}: {}",
                pos.line, pos.column, context
            ),
            RuntimeError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            RuntimeError::ResolutionFailure { name, pos: Some(pos) } => write!(
                f,
                "Unresolved name '{}' at line {}, column {}",
                name, pos.line, pos.column
            ),
            RuntimeError::ResolutionFailure { name, pos: None } => {
                write!(f, "Unresolved name '{}'", name)
            }
            RuntimeError::AllocationFailure { requested } => {
                write!(f, "Arena exhausted allocating {} bytes", requested)
            }
            RuntimeError::UserAssertion(msg) => write!(f, "Assertion failed: {}", msg),
            RuntimeError::DivisionByZero => write!(f, "Division by zero"),
            RuntimeError::Syntax { pos, message } => write!(
                f,
                "Syntax error at line {}, column {}: {}",
                pos.line, pos.column, message
            ),
            RuntimeError::Corrupt(msg) => write!(f, "Corrupt snapshot: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_classification() {
        assert!(!RuntimeError::underflow("x").is_fatal());
        assert!(!RuntimeError::UserAssertion("nope".into()).is_fatal());
        assert!(RuntimeError::mismatch("integer", "\"a\"").is_fatal());
        assert!(RuntimeError::AllocationFailure { requested: 24 }.is_fatal());
    }

    #[test]
    fn test_position_attachment() {
        let pos = SourcePos::new(3, 7, 20);
        let err = RuntimeError::underflow("'+' needs two integers").at(&pos);
        assert_eq!(
            err.to_string(),
            "Stack underflow at line 3, column 7: '+' needs two integers"
        );
    }
}
