//! Unrolling of parsed programs down to a target basis.
//!
//! The unroller walks a [`Program`] and expands every gate call through
//! its definition until it reaches a gate named in the basis, feeding the
//! resulting flat operation stream to an [`UnrollBackend`]. The `U` and
//! `CX` primitives pass through under their own names when the basis does
//! not claim them.

use crate::ast::{Argument, GateCall, Program, Scope, Statement};
use crate::error::{ParseError, ParseResult};
use crate::parser::parse;
use crate::stdlib::standard_gate_statements;
use quarc_ir::{Condition, DagCircuit, GateDecl, RegBit, Register, SymbolicValue};
use rustc_hash::{FxHashMap, FxHashSet};

/// Consumer of the flattened operation stream.
pub trait UnrollBackend {
    /// A quantum register was declared.
    fn new_qreg(&mut self, register: &Register) -> ParseResult<()>;
    /// A classical register was declared.
    fn new_creg(&mut self, register: &Register) -> ParseResult<()>;
    /// A gate was defined or declared opaque.
    fn define_gate(&mut self, decl: &GateDecl) -> ParseResult<()>;
    /// A basis gate application.
    fn emit_gate(
        &mut self,
        name: &str,
        params: &[SymbolicValue],
        qubits: &[RegBit],
        condition: Option<&Condition>,
    ) -> ParseResult<()>;
    /// A measurement.
    fn measure(
        &mut self,
        qubit: RegBit,
        bit: RegBit,
        condition: Option<&Condition>,
    ) -> ParseResult<()>;
    /// A reset.
    fn reset(&mut self, qubit: RegBit, condition: Option<&Condition>) -> ParseResult<()>;
    /// A barrier across the given qubits.
    fn barrier(&mut self, qubits: &[RegBit]) -> ParseResult<()>;
}

/// Recorded gate definition; `body` is `None` for opaque gates.
struct GateDef {
    params: Vec<String>,
    qubits: Vec<String>,
    body: Option<Vec<Statement>>,
}

/// Expands a program to a basis, emitting into a backend.
pub struct Unroller {
    program: Program,
    basis: FxHashSet<String>,
    gates: FxHashMap<String, GateDef>,
    reg_sizes: FxHashMap<String, u32>,
}

impl Unroller {
    /// Create an unroller targeting the given basis gate names.
    pub fn new(program: Program, basis: &[&str]) -> Self {
        Self {
            program,
            basis: basis.iter().map(|s| (*s).to_string()).collect(),
            gates: FxHashMap::default(),
            reg_sizes: FxHashMap::default(),
        }
    }

    /// Walk the program and emit the flattened operations.
    pub fn execute<B: UnrollBackend>(&mut self, backend: &mut B) -> ParseResult<()> {
        let statements = std::mem::take(&mut self.program.statements);
        for statement in &statements {
            self.process(statement, None, backend)?;
        }
        self.program.statements = statements;
        Ok(())
    }

    fn process<B: UnrollBackend>(
        &mut self,
        statement: &Statement,
        condition: Option<&Condition>,
        backend: &mut B,
    ) -> ParseResult<()> {
        match statement {
            Statement::Include(path) => {
                if path == "qelib1.inc" {
                    for stmt in standard_gate_statements()? {
                        self.process(&stmt, None, backend)?;
                    }
                }
                Ok(())
            }
            Statement::QRegDecl { name, size } => {
                self.reg_sizes.insert(name.clone(), *size);
                backend.new_qreg(&Register::quantum(name, *size))
            }
            Statement::CRegDecl { name, size } => {
                self.reg_sizes.insert(name.clone(), *size);
                backend.new_creg(&Register::classical(name, *size))
            }
            Statement::GateDef {
                name,
                params,
                qubits,
                body,
            } => {
                let text: Vec<String> = body.iter().map(|s| s.qasm(15)).collect();
                backend.define_gate(&GateDecl {
                    name: name.clone(),
                    params: params.clone(),
                    qubits: qubits.clone(),
                    body: Some(text.join(" ")),
                })?;
                self.gates.insert(
                    name.clone(),
                    GateDef {
                        params: params.clone(),
                        qubits: qubits.clone(),
                        body: Some(body.clone()),
                    },
                );
                Ok(())
            }
            Statement::Opaque {
                name,
                params,
                qubits,
            } => {
                backend.define_gate(&GateDecl {
                    name: name.clone(),
                    params: params.clone(),
                    qubits: qubits.clone(),
                    body: None,
                })?;
                self.gates.insert(
                    name.clone(),
                    GateDef {
                        params: params.clone(),
                        qubits: qubits.clone(),
                        body: None,
                    },
                );
                Ok(())
            }
            Statement::Gate(call) => self.process_call(call, condition, backend),
            Statement::Measure { qubit, bit } => {
                for pair in self.broadcast("measure", &[qubit.clone(), bit.clone()])? {
                    let [q, c] = <[RegBit; 2]>::try_from(pair)
                        .map_err(|_| ParseError::BroadcastMismatch {
                            gate: "measure".to_string(),
                        })?;
                    backend.measure(q, c, condition)?;
                }
                Ok(())
            }
            Statement::Reset { qubit } => {
                for app in self.broadcast("reset", std::slice::from_ref(qubit))? {
                    for q in app {
                        backend.reset(q, condition)?;
                    }
                }
                Ok(())
            }
            Statement::Barrier { qubits } => {
                let mut bits = Vec::new();
                for arg in qubits {
                    self.expand_argument(arg, &mut bits)?;
                }
                backend.barrier(&bits)
            }
            Statement::If {
                register,
                value,
                body,
            } => {
                let cond = Condition {
                    register: register.clone(),
                    value: *value,
                };
                self.process(body, Some(&cond), backend)
            }
        }
    }

    fn process_call<B: UnrollBackend>(
        &mut self,
        call: &GateCall,
        condition: Option<&Condition>,
        backend: &mut B,
    ) -> ParseResult<()> {
        let params = call
            .params
            .iter()
            .map(|p| p.real(&[]))
            .collect::<ParseResult<Vec<_>>>()?;
        for qubits in self.broadcast(&call.name, &call.qubits)? {
            self.expand_call(&call.name, &params, &qubits, condition, backend)?;
        }
        Ok(())
    }

    /// Expand one fully-resolved gate application down to the basis.
    fn expand_call<B: UnrollBackend>(
        &self,
        name: &str,
        params: &[SymbolicValue],
        qubits: &[RegBit],
        condition: Option<&Condition>,
        backend: &mut B,
    ) -> ParseResult<()> {
        if self.basis.contains(name) {
            return backend.emit_gate(name, params, qubits, condition);
        }
        match self.gates.get(name) {
            Some(def) => {
                let Some(body) = &def.body else {
                    // Opaque gates cannot be expanded.
                    return Err(ParseError::UndefinedGate(name.to_string()));
                };
                let mut scope = Scope::default();
                for (formal, value) in def.params.iter().zip(params) {
                    scope.insert(formal.clone(), *value);
                }
                let wire_map: FxHashMap<&str, &RegBit> = def
                    .qubits
                    .iter()
                    .map(String::as_str)
                    .zip(qubits)
                    .collect();
                for statement in body {
                    self.expand_body_statement(statement, &scope, &wire_map, condition, backend)?;
                }
                Ok(())
            }
            None if name == "U" || name == "CX" => {
                backend.emit_gate(name, params, qubits, condition)
            }
            None => Err(ParseError::UndefinedGate(name.to_string())),
        }
    }

    fn expand_body_statement<B: UnrollBackend>(
        &self,
        statement: &Statement,
        scope: &Scope,
        wire_map: &FxHashMap<&str, &RegBit>,
        condition: Option<&Condition>,
        backend: &mut B,
    ) -> ParseResult<()> {
        let resolve = |arg: &Argument| -> ParseResult<RegBit> {
            wire_map
                .get(arg.register_name())
                .map(|b| (*b).clone())
                .ok_or_else(|| ParseError::UndeclaredRegister(arg.register_name().to_string()))
        };
        match statement {
            Statement::Gate(inner) => {
                let inner_params = inner
                    .params
                    .iter()
                    .map(|p| p.real(std::slice::from_ref(scope)))
                    .collect::<ParseResult<Vec<_>>>()?;
                let inner_qubits = inner
                    .qubits
                    .iter()
                    .map(resolve)
                    .collect::<ParseResult<Vec<_>>>()?;
                self.expand_call(&inner.name, &inner_params, &inner_qubits, condition, backend)
            }
            Statement::Barrier { qubits } => {
                let bits = qubits.iter().map(resolve).collect::<ParseResult<Vec<_>>>()?;
                backend.barrier(&bits)
            }
            other => Err(ParseError::UnexpectedEof(format!(
                "unsupported statement in gate body: {}",
                other.qasm(6)
            ))),
        }
    }

    /// Resolve register arguments into per-bit applications.
    ///
    /// Whole-register arguments broadcast bitwise; every register argument
    /// in one call must have the same size.
    fn broadcast(&self, gate: &str, args: &[Argument]) -> ParseResult<Vec<Vec<RegBit>>> {
        let mut width: Option<u32> = None;
        for arg in args {
            if let Argument::Register(name) = arg {
                let size = *self
                    .reg_sizes
                    .get(name)
                    .ok_or_else(|| ParseError::UndeclaredRegister(name.clone()))?;
                match width {
                    None => width = Some(size),
                    Some(w) if w != size => {
                        return Err(ParseError::BroadcastMismatch {
                            gate: gate.to_string(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }
        let Some(width) = width else {
            let bits = args
                .iter()
                .map(|arg| match arg {
                    Argument::Bit { register, index } => RegBit::new(register, *index),
                    Argument::Register(name) => RegBit::new(name, 0),
                })
                .collect();
            return Ok(vec![bits]);
        };
        Ok((0..width)
            .map(|i| {
                args.iter()
                    .map(|arg| match arg {
                        Argument::Register(name) => RegBit::new(name, i),
                        Argument::Bit { register, index } => RegBit::new(register, *index),
                    })
                    .collect()
            })
            .collect())
    }

    fn expand_argument(&self, arg: &Argument, out: &mut Vec<RegBit>) -> ParseResult<()> {
        match arg {
            Argument::Register(name) => {
                let size = *self
                    .reg_sizes
                    .get(name)
                    .ok_or_else(|| ParseError::UndeclaredRegister(name.clone()))?;
                out.extend((0..size).map(|i| RegBit::new(name, i)));
            }
            Argument::Bit { register, index } => out.push(RegBit::new(register, *index)),
        }
        Ok(())
    }
}

/// Backend that builds a [`DagCircuit`].
#[derive(Debug, Default)]
pub struct DagBackend {
    circuit: DagCircuit,
}

impl DagBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the built circuit.
    pub fn into_circuit(self) -> DagCircuit {
        self.circuit
    }
}

impl UnrollBackend for DagBackend {
    fn new_qreg(&mut self, register: &Register) -> ParseResult<()> {
        Ok(self.circuit.add_register(register.clone())?)
    }

    fn new_creg(&mut self, register: &Register) -> ParseResult<()> {
        Ok(self.circuit.add_register(register.clone())?)
    }

    fn define_gate(&mut self, decl: &GateDecl) -> ParseResult<()> {
        self.circuit.add_gate_decl(decl.clone());
        Ok(())
    }

    fn emit_gate(
        &mut self,
        name: &str,
        params: &[SymbolicValue],
        qubits: &[RegBit],
        condition: Option<&Condition>,
    ) -> ParseResult<()> {
        self.circuit.apply_operation(
            name,
            params.to_vec(),
            qubits.to_vec(),
            vec![],
            condition.cloned(),
        )?;
        Ok(())
    }

    fn measure(
        &mut self,
        qubit: RegBit,
        bit: RegBit,
        condition: Option<&Condition>,
    ) -> ParseResult<()> {
        self.circuit
            .apply_operation("measure", vec![], vec![qubit], vec![bit], condition.cloned())?;
        Ok(())
    }

    fn reset(&mut self, qubit: RegBit, condition: Option<&Condition>) -> ParseResult<()> {
        self.circuit
            .apply_operation("reset", vec![], vec![qubit], vec![], condition.cloned())?;
        Ok(())
    }

    fn barrier(&mut self, qubits: &[RegBit]) -> ParseResult<()> {
        self.circuit
            .apply_operation("barrier", vec![], qubits.to_vec(), vec![], None)?;
        Ok(())
    }
}

/// Parse `source` and unroll it to `basis`, producing a DAG circuit.
pub fn unroll_to_dag(source: &str, basis: &[&str]) -> ParseResult<DagCircuit> {
    let program = parse(source)?;
    let mut backend = DagBackend::new();
    Unroller::new(program, basis).execute(&mut backend)?;
    Ok(backend.into_circuit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELL: &str = r#"OPENQASM 2.0;
include "qelib1.inc";
qreg q[2];
creg c[2];
h q[0];
cx q[0],q[1];
measure q[0] -> c[0];
measure q[1] -> c[1];
"#;

    #[test]
    fn test_unroll_to_native_basis() {
        let dag = unroll_to_dag(BELL, &["h", "cx"]).unwrap();
        assert_eq!(dag.num_ops(), 4);
        let names: Vec<String> = dag
            .topological_op_keys()
            .unwrap()
            .into_iter()
            .map(|k| dag.op(k).unwrap().name.clone())
            .collect();
        assert_eq!(names, ["h", "cx", "measure", "measure"]);
    }

    #[test]
    fn test_unroll_through_definitions() {
        // h expands through u2 down to the U primitive.
        let dag = unroll_to_dag(BELL, &["cx"]).unwrap();
        let keys = dag.named_op_keys("U").unwrap();
        assert_eq!(keys.len(), 1);
        let op = dag.op(keys[0]).unwrap();
        let values: Vec<f64> = op.params.iter().map(|p| p.value()).collect();
        assert!((values[0] - std::f64::consts::PI / 2.0).abs() < 1e-12);
        assert!(values[1].abs() < 1e-12);
        assert!((values[2] - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_unroll_stops_at_basis() {
        let dag = unroll_to_dag(BELL, &["u2", "cx"]).unwrap();
        assert_eq!(dag.named_op_keys("u2").unwrap().len(), 1);
        assert!(dag.named_op_keys("U").unwrap().is_empty());
    }

    #[test]
    fn test_broadcast_register_argument() {
        let source = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[3];\nh q;\n";
        let dag = unroll_to_dag(source, &["h"]).unwrap();
        assert_eq!(dag.num_ops(), 3);
    }

    #[test]
    fn test_broadcast_two_registers() {
        let source = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\nqreg r[2];\ncx q,r;\n";
        let dag = unroll_to_dag(source, &["cx"]).unwrap();
        let keys = dag.named_op_keys("cx").unwrap();
        assert_eq!(keys.len(), 2);
        let op = dag.op(keys[0]).unwrap();
        assert_eq!(op.qargs, [RegBit::new("q", 0), RegBit::new("r", 0)]);
    }

    #[test]
    fn test_broadcast_mismatch() {
        let source = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\nqreg r[3];\ncx q,r;\n";
        assert!(matches!(
            unroll_to_dag(source, &["cx"]),
            Err(ParseError::BroadcastMismatch { .. })
        ));
    }

    #[test]
    fn test_condition_propagates_through_expansion() {
        let source = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[1];\ncreg c[1];\nif(c==1) x q[0];\n";
        let dag = unroll_to_dag(source, &["u3"]).unwrap();
        let keys = dag.named_op_keys("u3").unwrap();
        assert_eq!(keys.len(), 1);
        let op = dag.op(keys[0]).unwrap();
        let cond = op.condition.as_ref().unwrap();
        assert_eq!(cond.register, "c");
        assert_eq!(cond.value, 1);
    }

    #[test]
    fn test_opaque_outside_basis_fails() {
        let source = "OPENQASM 2.0;\nopaque magic q;\nqreg q[1];\nmagic q[0];\n";
        assert!(matches!(
            unroll_to_dag(source, &[]),
            Err(ParseError::UndefinedGate(_))
        ));
        assert!(unroll_to_dag(source, &["magic"]).is_ok());
    }

    #[test]
    fn test_measure_broadcast() {
        let source = "OPENQASM 2.0;\nqreg q[2];\ncreg c[2];\nmeasure q -> c;\n";
        let dag = unroll_to_dag(source, &[]).unwrap();
        assert_eq!(dag.named_op_keys("measure").unwrap().len(), 2);
    }

    #[test]
    fn test_barrier_spans_register() {
        let source = "OPENQASM 2.0;\nqreg q[3];\nbarrier q;\n";
        let dag = unroll_to_dag(source, &[]).unwrap();
        let keys = dag.named_op_keys("barrier").unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(dag.op(keys[0]).unwrap().qargs.len(), 3);
    }

    #[test]
    fn test_gate_decls_recorded() {
        let dag = unroll_to_dag(BELL, &["h", "cx"]).unwrap();
        assert!(dag.gate_decls().iter().any(|d| d.name == "h"));
        assert!(dag.gate_decls().iter().any(|d| d.name == "cx"));
    }
}
