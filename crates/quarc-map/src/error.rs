//! Error types for the mapping and optimization passes.

use quarc_ir::{IrError, RegBit};
use quarc_qasm::ParseError;
use thiserror::Error;

/// Errors that can occur while mapping a circuit onto a coupling graph.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MapError {
    /// More circuit qubits than physical qubits.
    #[error("Circuit has {circuit} qubits but the coupling graph has {coupling}")]
    TooManyQubits { circuit: usize, coupling: usize },

    /// Initial-layout key that is not a circuit qubit.
    #[error("Layout qubit {0} is not a qubit of the circuit")]
    NotInCircuit(RegBit),

    /// Qubit that is not part of the coupling graph.
    #[error("Qubit {0} is not in the coupling graph")]
    NotInCoupling(RegBit),

    /// Circuit qubit with no layout assignment.
    #[error("Qubit {0} has no layout assignment")]
    Unmapped(RegBit),

    /// Physical qubits with no connecting path.
    #[error("No path between {a} and {b} in the coupling graph")]
    Disconnected { a: RegBit, b: RegBit },

    /// Scheduling layer with an operation wider than two qubits.
    #[error("Layer contains an operation on {0} qubits")]
    WideLayerOperation(usize),

    /// The randomized search found no swap circuit for a layer.
    #[error("Swap mapping failed at layer {layer}, serial layer {serial_layer}: \"{qasm}\"")]
    MappingFailed {
        layer: usize,
        serial_layer: usize,
        qasm: String,
    },

    /// A two-qubit gate on a pair with no coupling edge in either
    /// direction.
    #[error("Gate on {a},{b} violates the coupling graph")]
    CouplingViolation { a: RegBit, b: RegBit },

    /// A `cx` recorded with something other than a plain two-qubit
    /// signature.
    #[error("Gate 'cx' has signature ({n_qubits},{n_clbits},{n_params}), expected (2,0,0)")]
    BadGateSignature {
        n_qubits: usize,
        n_clbits: usize,
        n_params: usize,
    },

    /// The Euler-angle solver found no solution within tolerance.
    #[error("No Euler-angle solution for xi={xi}, theta1={theta1}, theta2={theta2}")]
    TrigSolution { xi: f64, theta1: f64, theta2: f64 },

    /// Circuit error from the IR layer.
    #[error("Circuit error: {0}")]
    Circuit(#[from] IrError),

    /// QASM parse or unroll error.
    #[error("QASM error: {0}")]
    Parse(#[from] ParseError),
}

/// Result type for mapping operations.
pub type MapResult<T> = Result<T, MapError>;
