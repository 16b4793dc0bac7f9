//! Error types for the IR crate.

use crate::bit::RegBit;
use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// A graph algorithm that requires a DAG found a cycle.
    #[error("Graph contains a cycle; {emitted} of {total} vertices sorted")]
    Cycle {
        /// Vertices emitted before the sort stalled.
        emitted: usize,
        /// Total vertices in the graph.
        total: usize,
    },

    /// Vertex key not present in the graph.
    #[error("Vertex {0} not found in graph")]
    VertexNotFound(usize),

    /// Wire (qubit or classical bit) not present in the circuit.
    #[error("Wire {wire} not found in circuit{}", format_gate_context(.gate_name))]
    WireNotFound {
        /// The missing wire.
        wire: RegBit,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Register declared twice.
    #[error("Register '{0}' already declared")]
    DuplicateRegister(String),

    /// Register referenced but never declared.
    #[error("Register '{0}' not declared")]
    UnknownRegister(String),

    /// Node index does not refer to an operation node.
    #[error("Node {0} is not an operation node")]
    NotAnOp(usize),

    /// Gate signature conflicts with an earlier use of the same name.
    #[error("Gate '{gate_name}' signature mismatch: expected {expected}, got {got}")]
    SignatureMismatch {
        /// Name of the gate.
        gate_name: String,
        /// Signature recorded on first use, as (qubits, clbits, params).
        expected: String,
        /// Signature of the conflicting call.
        got: String,
    },

    /// Substitution wire list does not match the replaced node.
    #[error("Substitution expects {expected} wires, got {got}")]
    WireCountMismatch {
        /// Wires the replaced node touches.
        expected: usize,
        /// Wires supplied by the caller.
        got: usize,
    },

    /// Duplicate wire argument in a single operation.
    #[error("Duplicate wire {wire} in operation{}", format_gate_context(.gate_name))]
    DuplicateWire {
        /// The duplicate wire.
        wire: RegBit,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },
}

/// Helper function to format optional gate context.
#[allow(clippy::ref_option)]
fn format_gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" (gate: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
