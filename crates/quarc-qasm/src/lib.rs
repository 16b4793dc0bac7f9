//! Quarc QASM Frontend
//!
//! Lexer, recursive-descent parser, and basis unroller for the
//! `OpenQASM` 2.0 dialect. Source text is parsed into a [`Program`],
//! then flattened to a target basis through an [`UnrollBackend`]; the
//! bundled [`DagBackend`] produces a [`quarc_ir::DagCircuit`].
//!
//! # Example
//!
//! ```rust
//! use quarc_qasm::unroll_to_dag;
//!
//! let source = r#"OPENQASM 2.0;
//! include "qelib1.inc";
//! qreg q[2];
//! h q[0];
//! cx q[0],q[1];
//! "#;
//! let dag = unroll_to_dag(source, &["h", "cx"]).unwrap();
//! assert_eq!(dag.num_ops(), 2);
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod stdlib;
pub mod unroll;

pub use ast::{Argument, BinOp, Expression, GateCall, MathFn, Program, Scope, Statement};
pub use error::{ParseError, ParseResult};
pub use lexer::{tokenize, SpannedToken, Token};
pub use parser::parse;
pub use stdlib::STANDARD_GATES;
pub use unroll::{unroll_to_dag, DagBackend, UnrollBackend, Unroller};
