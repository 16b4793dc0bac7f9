//! Quarc Circuit Intermediate Representation
//!
//! Core data structures for the Quarc compilation pipeline: register
//! bits, symbolic gate parameters, a generic integer-keyed directed
//! multigraph, and the DAG circuit built on top of it.
//!
//! # Overview
//!
//! A circuit is a DAG whose vertices are operations and whose edges carry
//! the qubit or classical-bit wire creating the dependency. The
//! [`DagCircuit`] owns the registers, the gate-declaration table used for
//! QASM re-emission, and the arity signatures the mapper consults. The
//! underlying [`Graph`] is usable on its own and provides the
//! deterministic topological sort, ancestor/descendant queries, and
//! longest-path computation the compilation passes rely on.
//!
//! # Example
//!
//! ```rust
//! use quarc_ir::{DagCircuit, RegBit, Register};
//!
//! let mut dag = DagCircuit::new();
//! dag.add_register(Register::quantum("q", 2)).unwrap();
//! dag.apply_operation("h", vec![], vec![RegBit::new("q", 0)], vec![], None)
//!     .unwrap();
//! dag.apply_operation(
//!     "cx",
//!     vec![],
//!     vec![RegBit::new("q", 0), RegBit::new("q", 1)],
//!     vec![],
//!     None,
//! )
//! .unwrap();
//!
//! assert_eq!(dag.num_ops(), 2);
//! assert_eq!(dag.depth().unwrap(), 2);
//! ```

pub mod bit;
pub mod dag;
pub mod error;
pub mod graph;
pub mod value;

pub use bit::{RegBit, Register, RegisterKind};
pub use dag::{
    Condition, DagCircuit, DagNode, GateDecl, GateSignature, Layer, OpData, QasmOptions,
};
pub use error::{IrError, IrResult};
pub use graph::{Edge, Graph};
pub use value::SymbolicValue;
