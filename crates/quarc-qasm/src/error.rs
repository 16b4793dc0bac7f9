//! Error types for the QASM parser and unroller.

use thiserror::Error;

/// Errors that can occur during parsing or unrolling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Lexer error (invalid token).
    #[error("Invalid token at line {line}: {message}")]
    LexerError { line: usize, message: String },

    /// Unexpected token.
    #[error("Unexpected token at line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input: {0}")]
    UnexpectedEof(String),

    /// Invalid version.
    #[error("Unsupported OPENQASM version: {0}")]
    InvalidVersion(String),

    /// Register declared twice.
    #[error("Register '{0}' already declared")]
    RegisterRedeclaration(String),

    /// Register size outside the representable range.
    #[error("Register '{name}' has invalid size {size}")]
    InvalidRegisterSize { name: String, size: u64 },

    /// Gate defined twice.
    #[error("Gate '{0}' already defined")]
    GateRedefinition(String),

    /// Register referenced but never declared.
    #[error("Register '{0}' not declared")]
    UndeclaredRegister(String),

    /// Gate name with no basis match and no definition.
    #[error("Unrecognized operation: '{0}'")]
    UndefinedGate(String),

    /// Wrong number of qubit arguments.
    #[error("Gate '{gate}' expects {expected} qubits, got {got}")]
    WrongQubitCount {
        gate: String,
        expected: usize,
        got: usize,
    },

    /// Wrong number of parameters.
    #[error("Gate '{gate}' expects {expected} parameters, got {got}")]
    WrongParameterCount {
        gate: String,
        expected: usize,
        got: usize,
    },

    /// Index out of bounds.
    #[error("Index {index} out of bounds for register '{register}' of size {size}")]
    IndexOutOfBounds {
        register: String,
        index: u32,
        size: u32,
    },

    /// Register arguments of mismatched sizes in one broadcast call.
    #[error("Register arguments of gate '{gate}' have mismatched sizes")]
    BroadcastMismatch { gate: String },

    /// Identifier with no binding in the active scope chain.
    #[error("Parameter '{0}' is unbound")]
    UnboundParameter(String),

    /// Wrong argument kind (qubit where bit expected, or vice versa).
    #[error("Argument '{argument}' of '{context}' must be a {expected} register")]
    WrongRegisterKind {
        argument: String,
        context: String,
        expected: String,
    },

    /// IR error during circuit construction.
    #[error("Circuit error: {0}")]
    CircuitError(#[from] quarc_ir::IrError),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;
