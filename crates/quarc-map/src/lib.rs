//! Quarc Mapper
//!
//! Compilation passes that adapt a circuit to a physical device: swap
//! insertion against a [`CouplingGraph`], CNOT direction correction, and
//! peephole optimization of the result.
//!
//! # Example
//!
//! ```rust
//! use quarc_map::{swap_mapper, CouplingGraph, DEFAULT_BASIS, DEFAULT_TRIALS};
//! use quarc_qasm::unroll_to_dag;
//!
//! let source = r#"OPENQASM 2.0;
//! include "qelib1.inc";
//! qreg q[3];
//! cx q[0],q[2];
//! "#;
//! let dag = unroll_to_dag(source, &["cx"]).unwrap();
//! let coupling = CouplingGraph::linear(3);
//! let (mapped, layout) =
//!     swap_mapper(&dag, &coupling, None, DEFAULT_BASIS, DEFAULT_TRIALS, Some(0)).unwrap();
//! assert_eq!(layout.len(), 3);
//! for key in mapped.topological_op_keys().unwrap() {
//!     let op = mapped.op(key).unwrap();
//!     if op.qargs.len() == 2 {
//!         assert!(coupling.connected(&op.qargs[0], &op.qargs[1]));
//!     }
//! }
//! ```

pub mod coupling;
pub mod error;
pub mod layout;
pub mod mapper;
pub mod optimize;

pub use coupling::CouplingGraph;
pub use error::{MapError, MapResult};
pub use layout::Layout;
pub use mapper::{direction_mapper, swap_mapper, DEFAULT_BASIS, DEFAULT_TRIALS};
pub use optimize::{compose_u3, cx_cancellation, optimize_1q_gates, yzy_to_zyz};
