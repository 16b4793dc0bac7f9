//! DAG circuit representation.
//!
//! Each operation is a vertex; edges carry the qubit or classical-bit wire
//! that creates the data dependency. Every wire starts at an `In` vertex
//! and ends at an `Out` vertex, with the operations on that wire threaded
//! between them in program order. Appending is O(1) per wire through a
//! front-edge map; removal and substitution splice edges in place.

use crate::bit::{RegBit, Register, RegisterKind};
use crate::error::{IrError, IrResult};
use crate::graph::Graph;
use crate::value::SymbolicValue;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A classical condition on an operation: `if(register == value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Classical register compared against.
    pub register: String,
    /// Value the register must hold.
    pub value: u64,
}

/// Payload of an operation vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpData {
    /// Gate or directive name.
    pub name: String,
    /// Angle parameters.
    pub params: Vec<SymbolicValue>,
    /// Qubit arguments in call order.
    pub qargs: Vec<RegBit>,
    /// Classical-bit arguments in call order.
    pub cargs: Vec<RegBit>,
    /// Optional classical condition.
    pub condition: Option<Condition>,
}

/// A vertex of the circuit DAG.
#[derive(Debug, Clone)]
pub enum DagNode {
    /// Wire entry point.
    In(RegBit),
    /// Wire exit point.
    Out(RegBit),
    /// An operation.
    Op(OpData),
}

/// Arity signature of a gate: qubits, classical bits, parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSignature {
    /// Number of qubit arguments.
    pub n_qubits: usize,
    /// Number of classical-bit arguments.
    pub n_clbits: usize,
    /// Number of parameters.
    pub n_params: usize,
}

/// A gate declaration carried for re-emission.
///
/// `body` holds the definition statements as preformatted QASM text;
/// `None` marks an opaque gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecl {
    /// Gate name.
    pub name: String,
    /// Formal parameter names.
    pub params: Vec<String>,
    /// Formal qubit names.
    pub qubits: Vec<String>,
    /// Definition body text, `None` for opaque gates.
    pub body: Option<String>,
}

impl GateDecl {
    /// Emit the declaration as QASM text.
    pub fn qasm(&self) -> String {
        let params = if self.params.is_empty() {
            String::new()
        } else {
            format!("({})", self.params.join(","))
        };
        let qubits = self.qubits.join(",");
        match &self.body {
            Some(body) => format!("gate {}{params} {qubits} {{ {body} }}", self.name),
            None => format!("opaque {}{params} {qubits};", self.name),
        }
    }
}

/// Options controlling [`DagCircuit::qasm`] emission.
#[derive(Debug, Clone, Copy)]
pub struct QasmOptions<'a> {
    /// Emit only the header, gate, and register declarations.
    pub decls_only: bool,
    /// Emit only the operation body.
    pub no_decls: bool,
    /// Include a `swap` gate definition in the declarations.
    pub add_swap: bool,
    /// Rename qubit wires through this map before emission; quantum
    /// register declarations are derived from the map's codomain.
    pub aliases: Option<&'a FxHashMap<RegBit, RegBit>>,
    /// Decimal precision for real literals.
    pub precision: usize,
}

impl Default for QasmOptions<'_> {
    fn default() -> Self {
        Self {
            decls_only: false,
            no_decls: false,
            add_swap: false,
            aliases: None,
            precision: 15,
        }
    }
}

/// One scheduling layer: a slice of the circuit plus the qubit groups its
/// operations touch.
#[derive(Debug, Clone)]
pub struct Layer {
    /// The layer as a standalone circuit sharing the parent's registers
    /// and gate table.
    pub circuit: DagCircuit,
    /// Qubit arguments of each operation in the layer, in order.
    pub partition: Vec<Vec<RegBit>>,
}

/// A quantum circuit as a DAG of operations over register-bit wires.
#[derive(Debug, Clone, Default)]
pub struct DagCircuit {
    graph: Graph<DagNode, RegBit>,
    next_key: usize,
    wire_in: FxHashMap<RegBit, usize>,
    wire_out: FxHashMap<RegBit, usize>,
    front_edge: FxHashMap<RegBit, usize>,
    registers: Vec<Register>,
    register_index: FxHashMap<String, usize>,
    gates: Vec<GateDecl>,
    gate_index: FxHashMap<String, usize>,
    basis: Vec<(String, GateSignature)>,
    basis_index: FxHashMap<String, usize>,
}

impl DagCircuit {
    /// Create an empty circuit with no registers.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_key(&mut self) -> usize {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    /// Declare a register and create its wires.
    pub fn add_register(&mut self, register: Register) -> IrResult<()> {
        if self.register_index.contains_key(&register.name) {
            return Err(IrError::DuplicateRegister(register.name));
        }
        for bit in register.bits() {
            let in_key = self.alloc_key();
            let out_key = self.alloc_key();
            self.graph.add_vertex(in_key, DagNode::In(bit.clone()));
            self.graph.add_vertex(out_key, DagNode::Out(bit.clone()));
            let edge = self.graph.connect(in_key, out_key, bit.clone())?;
            self.wire_in.insert(bit.clone(), in_key);
            self.wire_out.insert(bit.clone(), out_key);
            self.front_edge.insert(bit, edge);
        }
        self.register_index
            .insert(register.name.clone(), self.registers.len());
        self.registers.push(register);
        Ok(())
    }

    /// Registers in declaration order.
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    /// Look up a register by name.
    pub fn register(&self, name: &str) -> Option<&Register> {
        self.register_index.get(name).map(|&i| &self.registers[i])
    }

    /// Qubit wires in declaration order.
    pub fn qubits(&self) -> Vec<RegBit> {
        self.registers
            .iter()
            .filter(|r| r.kind == RegisterKind::Quantum)
            .flat_map(Register::bits)
            .collect()
    }

    /// Classical-bit wires in declaration order.
    pub fn clbits(&self) -> Vec<RegBit> {
        self.registers
            .iter()
            .filter(|r| r.kind == RegisterKind::Classical)
            .flat_map(Register::bits)
            .collect()
    }

    /// Number of qubit wires.
    pub fn width(&self) -> usize {
        self.qubits().len()
    }

    /// Record a gate declaration for re-emission. First declaration of a
    /// name wins.
    pub fn add_gate_decl(&mut self, decl: GateDecl) {
        if !self.gate_index.contains_key(&decl.name) {
            self.gate_index.insert(decl.name.clone(), self.gates.len());
            self.gates.push(decl);
        }
    }

    /// Gate declarations in definition order.
    pub fn gate_decls(&self) -> &[GateDecl] {
        &self.gates
    }

    /// Arity signature recorded for a gate name, if any operation with
    /// that name was applied.
    pub fn basis_signature(&self, name: &str) -> Option<GateSignature> {
        self.basis_index.get(name).map(|&i| self.basis[i].1)
    }

    fn record_signature(&mut self, name: &str, sig: GateSignature) -> IrResult<()> {
        // Barrier arity varies per call; it carries no signature.
        if name == "barrier" {
            return Ok(());
        }
        match self.basis_index.get(name) {
            Some(&i) => {
                let expected = self.basis[i].1;
                if expected != sig {
                    return Err(IrError::SignatureMismatch {
                        gate_name: name.to_string(),
                        expected: format!(
                            "({},{},{})",
                            expected.n_qubits, expected.n_clbits, expected.n_params
                        ),
                        got: format!("({},{},{})", sig.n_qubits, sig.n_clbits, sig.n_params),
                    });
                }
            }
            None => {
                self.basis_index
                    .insert(name.to_string(), self.basis.len());
                self.basis.push((name.to_string(), sig));
            }
        }
        Ok(())
    }

    fn condition_wires(&self, condition: &Condition, cargs: &[RegBit]) -> IrResult<Vec<RegBit>> {
        let register = self
            .register(&condition.register)
            .ok_or_else(|| IrError::UnknownRegister(condition.register.clone()))?;
        Ok(register
            .bits()
            .filter(|b| !cargs.contains(b))
            .collect())
    }

    /// Append an operation behind the current front of each argument wire.
    ///
    /// Classical-condition bits count as data wires: a conditioned
    /// operation depends on everything that previously wrote the
    /// condition register.
    pub fn apply_operation(
        &mut self,
        name: impl Into<String>,
        params: Vec<SymbolicValue>,
        qargs: Vec<RegBit>,
        cargs: Vec<RegBit>,
        condition: Option<Condition>,
    ) -> IrResult<usize> {
        let name = name.into();
        let mut unique = FxHashSet::default();
        for q in &qargs {
            if !unique.insert(q.clone()) {
                return Err(IrError::DuplicateWire {
                    wire: q.clone(),
                    gate_name: Some(name.clone()),
                });
            }
        }

        let mut wires: Vec<RegBit> = qargs.iter().chain(cargs.iter()).cloned().collect();
        if let Some(cond) = &condition {
            wires.extend(self.condition_wires(cond, &cargs)?);
        }
        for wire in &wires {
            if !self.front_edge.contains_key(wire) {
                return Err(IrError::WireNotFound {
                    wire: wire.clone(),
                    gate_name: Some(name.clone()),
                });
            }
        }

        self.record_signature(
            &name,
            GateSignature {
                n_qubits: qargs.len(),
                n_clbits: cargs.len(),
                n_params: params.len(),
            },
        )?;

        let key = self.alloc_key();
        self.graph.add_vertex(
            key,
            DagNode::Op(OpData {
                name,
                params,
                qargs,
                cargs,
                condition,
            }),
        );
        for wire in wires {
            let front = self.front_edge[&wire];
            let edge = self
                .graph
                .remove_edge(front)
                .ok_or(IrError::VertexNotFound(front))?;
            self.graph.connect(edge.source, key, wire.clone())?;
            let out = self.wire_out[&wire];
            let new_front = self.graph.connect(key, out, wire.clone())?;
            self.front_edge.insert(wire, new_front);
        }
        Ok(key)
    }

    /// Whether `key` is an operation vertex.
    pub fn is_op(&self, key: usize) -> bool {
        matches!(self.graph.vertex(key), Some(DagNode::Op(_)))
    }

    /// Operation payload at `key`.
    pub fn op(&self, key: usize) -> IrResult<&OpData> {
        match self.graph.vertex(key) {
            Some(DagNode::Op(op)) => Ok(op),
            Some(_) => Err(IrError::NotAnOp(key)),
            None => Err(IrError::VertexNotFound(key)),
        }
    }

    /// Mutable operation payload at `key`.
    pub fn op_mut(&mut self, key: usize) -> IrResult<&mut OpData> {
        match self.graph.vertex_mut(key) {
            Some(DagNode::Op(op)) => Ok(op),
            Some(_) => Err(IrError::NotAnOp(key)),
            None => Err(IrError::VertexNotFound(key)),
        }
    }

    /// Number of operation vertices.
    pub fn num_ops(&self) -> usize {
        self.graph
            .keys()
            .filter(|&k| self.is_op(k))
            .count()
    }

    /// The underlying graph, for read-only algorithms.
    pub fn graph(&self) -> &Graph<DagNode, RegBit> {
        &self.graph
    }

    /// Operation keys in dependency order (layered, ascending key within
    /// a layer).
    pub fn topological_op_keys(&self) -> IrResult<Vec<usize>> {
        Ok(self.layered_op_keys()?.into_iter().flatten().collect())
    }

    /// Operation keys with the given name, in dependency order.
    pub fn named_op_keys(&self, name: &str) -> IrResult<Vec<usize>> {
        Ok(self
            .topological_op_keys()?
            .into_iter()
            .filter(|&k| self.op(k).map(|op| op.name == name).unwrap_or(false))
            .collect())
    }

    /// Group operation keys into dependency layers.
    fn layered_op_keys(&self) -> IrResult<Vec<Vec<usize>>> {
        let mut in_degree: FxHashMap<usize, usize> = FxHashMap::default();
        let mut total = 0;
        for key in self.graph.keys() {
            if !self.is_op(key) {
                continue;
            }
            total += 1;
            let deps = self
                .graph
                .in_edges(key)
                .iter()
                .filter(|(_, e)| self.is_op(e.source))
                .count();
            in_degree.insert(key, deps);
        }

        let mut current: Vec<usize> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&k, _)| k)
            .collect();
        current.sort_unstable();

        let mut rounds = Vec::new();
        let mut emitted = 0;
        while !current.is_empty() {
            emitted += current.len();
            let mut next = Vec::new();
            for &v in &current {
                for (_, edge) in self.graph.out_edges(v) {
                    if !self.is_op(edge.target) {
                        continue;
                    }
                    let d = in_degree
                        .get_mut(&edge.target)
                        .ok_or(IrError::VertexNotFound(edge.target))?;
                    *d -= 1;
                    if *d == 0 {
                        next.push(edge.target);
                    }
                }
            }
            next.sort_unstable();
            next.dedup();
            rounds.push(std::mem::take(&mut current));
            current = next;
        }
        if emitted != total {
            return Err(IrError::Cycle {
                emitted,
                total,
            });
        }
        Ok(rounds)
    }

    /// An empty circuit sharing this circuit's registers, gate table, and
    /// recorded signatures.
    pub fn clone_empty(&self) -> IrResult<DagCircuit> {
        let mut circuit = DagCircuit::new();
        for register in &self.registers {
            circuit.add_register(register.clone())?;
        }
        for decl in &self.gates {
            circuit.add_gate_decl(decl.clone());
        }
        circuit.basis = self.basis.clone();
        circuit.basis_index = self.basis_index.clone();
        Ok(circuit)
    }

    /// Partition the circuit into the minimum number of sequential layers
    /// of mutually independent operations.
    pub fn layers(&self) -> IrResult<Vec<Layer>> {
        let mut layers = Vec::new();
        for round in self.layered_op_keys()? {
            let mut circuit = self.clone_empty()?;
            let mut partition = Vec::with_capacity(round.len());
            for key in round {
                let op = self.op(key)?.clone();
                partition.push(op.qargs.clone());
                circuit.apply_operation(
                    op.name,
                    op.params,
                    op.qargs,
                    op.cargs,
                    op.condition,
                )?;
            }
            layers.push(Layer { circuit, partition });
        }
        Ok(layers)
    }

    /// One operation per layer, in dependency order. The mapper's
    /// fallback granularity.
    pub fn serial_layers(&self) -> IrResult<Vec<Layer>> {
        let mut layers = Vec::new();
        for key in self.topological_op_keys()? {
            let op = self.op(key)?.clone();
            let mut circuit = self.clone_empty()?;
            let partition = vec![op.qargs.clone()];
            circuit.apply_operation(op.name, op.params, op.qargs, op.cargs, op.condition)?;
            layers.push(Layer { circuit, partition });
        }
        Ok(layers)
    }

    /// Number of dependency layers.
    pub fn depth(&self) -> IrResult<usize> {
        Ok(self.layered_op_keys()?.len())
    }

    /// Maximal chains of unconditioned operations whose names are in
    /// `names`, linked by direct dependency edges.
    ///
    /// A chain extends only while its tail has exactly one distinct
    /// operation successor and that successor qualifies; this keeps
    /// parallel CNOT fan-out from being folded into one run.
    pub fn collect_runs(&self, names: &[&str]) -> IrResult<Vec<Vec<usize>>> {
        let name_set: FxHashSet<&str> = names.iter().copied().collect();
        let qualifies = |op: &OpData| name_set.contains(op.name.as_str()) && op.condition.is_none();

        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut runs = Vec::new();
        for key in self.topological_op_keys()? {
            if seen.contains(&key) || !qualifies(self.op(key)?) {
                continue;
            }
            let mut run = vec![key];
            seen.insert(key);
            loop {
                let tail = *run.last().unwrap_or(&key);
                let succs: Vec<usize> = self
                    .graph
                    .successors(tail)
                    .into_iter()
                    .filter(|&s| self.is_op(s))
                    .collect();
                let [next] = succs[..] else { break };
                if seen.contains(&next) || !qualifies(self.op(next)?) {
                    break;
                }
                run.push(next);
                seen.insert(next);
            }
            runs.push(run);
        }
        Ok(runs)
    }

    /// In/out boundary of an op on each of its wires: `wire -> (pred,
    /// succ)`.
    fn wire_boundary(&self, key: usize) -> IrResult<Vec<(RegBit, usize, usize)>> {
        let mut boundary = Vec::new();
        for (_, in_edge) in self.graph.in_edges(key) {
            let wire = in_edge.data.clone();
            let succ = self
                .graph
                .out_edges(key)
                .iter()
                .find(|(_, e)| e.data == wire)
                .map(|(_, e)| e.target)
                .ok_or_else(|| IrError::WireNotFound {
                    wire: wire.clone(),
                    gate_name: None,
                })?;
            boundary.push((wire, in_edge.source, succ));
        }
        Ok(boundary)
    }

    /// Remove an operation vertex, reconnecting each wire's predecessor
    /// to its successor.
    pub fn remove_op_node(&mut self, key: usize) -> IrResult<OpData> {
        let op = self.op(key)?.clone();
        let boundary = self.wire_boundary(key)?;
        self.graph
            .remove_vertex(key)
            .ok_or(IrError::VertexNotFound(key))?;
        for (wire, pred, succ) in boundary {
            let edge = self.graph.connect(pred, succ, wire.clone())?;
            if self.wire_out.get(&wire) == Some(&succ) {
                self.front_edge.insert(wire, edge);
            }
        }
        Ok(op)
    }

    /// Splice `replacement` into the graph in place of the operation at
    /// `key`.
    ///
    /// `wires[i]` names the replacement wire standing in for the node's
    /// i-th argument wire (qubit arguments first, then classical). The
    /// replaced node's condition, if any, is propagated onto every gate
    /// operation of the replacement.
    pub fn substitute_circuit_one(
        &mut self,
        key: usize,
        replacement: &DagCircuit,
        wires: &[RegBit],
    ) -> IrResult<()> {
        let node = self.op(key)?.clone();
        let node_wires: Vec<RegBit> = node
            .qargs
            .iter()
            .chain(node.cargs.iter())
            .cloned()
            .collect();
        if wires.len() != node_wires.len() {
            return Err(IrError::WireCountMismatch {
                expected: node_wires.len(),
                got: wires.len(),
            });
        }
        let mut wire_map: FxHashMap<RegBit, RegBit> = FxHashMap::default();
        for (rep_wire, host_wire) in wires.iter().zip(node_wires.iter()) {
            if !replacement.front_edge.contains_key(rep_wire) {
                return Err(IrError::WireNotFound {
                    wire: rep_wire.clone(),
                    gate_name: None,
                });
            }
            wire_map.insert(rep_wire.clone(), host_wire.clone());
        }

        // Cut the node out, remembering each wire's open ends.
        let boundary = self.wire_boundary(key)?;
        self.graph
            .remove_vertex(key)
            .ok_or(IrError::VertexNotFound(key))?;
        let mut front: FxHashMap<RegBit, usize> = FxHashMap::default();
        let mut tail: FxHashMap<RegBit, usize> = FxHashMap::default();
        for (wire, pred, succ) in boundary {
            front.insert(wire.clone(), pred);
            tail.insert(wire, succ);
        }

        for rep_key in replacement.topological_op_keys()? {
            let rep_op = replacement.op(rep_key)?;
            let map_bits = |bits: &[RegBit]| -> IrResult<Vec<RegBit>> {
                bits.iter()
                    .map(|b| {
                        wire_map.get(b).cloned().ok_or_else(|| IrError::WireNotFound {
                            wire: b.clone(),
                            gate_name: Some(rep_op.name.clone()),
                        })
                    })
                    .collect()
            };
            let qargs = map_bits(&rep_op.qargs)?;
            let cargs = map_bits(&rep_op.cargs)?;
            let condition = node.condition.clone();

            let mut op_wires: Vec<RegBit> = qargs.iter().chain(cargs.iter()).cloned().collect();
            if condition.is_some() {
                // Thread the condition bits through every conditioned op.
                for (wire, _) in tail.iter() {
                    if !node_wires.contains(wire) && !op_wires.contains(wire) {
                        op_wires.push(wire.clone());
                    }
                }
            }

            let new_key = self.alloc_key();
            self.record_signature(
                &rep_op.name,
                GateSignature {
                    n_qubits: qargs.len(),
                    n_clbits: cargs.len(),
                    n_params: rep_op.params.len(),
                },
            )?;
            self.graph.add_vertex(
                new_key,
                DagNode::Op(OpData {
                    name: rep_op.name.clone(),
                    params: rep_op.params.clone(),
                    qargs,
                    cargs,
                    condition,
                }),
            );
            for wire in op_wires {
                let pred = *front
                    .get(&wire)
                    .ok_or_else(|| IrError::WireNotFound {
                        wire: wire.clone(),
                        gate_name: Some(rep_op.name.clone()),
                    })?;
                self.graph.connect(pred, new_key, wire.clone())?;
                front.insert(wire, new_key);
            }
        }

        for (wire, succ) in tail {
            let pred = front[&wire];
            let edge = self.graph.connect(pred, succ, wire.clone())?;
            if self.wire_out.get(&wire) == Some(&succ) {
                self.front_edge.insert(wire, edge);
            }
        }
        Ok(())
    }

    fn alias_bit(bit: &RegBit, aliases: Option<&FxHashMap<RegBit, RegBit>>) -> RegBit {
        aliases
            .and_then(|m| m.get(bit))
            .cloned()
            .unwrap_or_else(|| bit.clone())
    }

    fn emit_op(op: &OpData, opts: &QasmOptions<'_>) -> String {
        let mut line = String::new();
        if let Some(cond) = &op.condition {
            let _ = write!(line, "if({}=={}) ", cond.register, cond.value);
        }
        let q = |b: &RegBit| Self::alias_bit(b, opts.aliases).to_string();
        match op.name.as_str() {
            "measure" => {
                let _ = write!(line, "measure {} -> {};", q(&op.qargs[0]), op.cargs[0]);
            }
            "reset" => {
                let _ = write!(line, "reset {};", q(&op.qargs[0]));
            }
            "barrier" => {
                let args: Vec<String> = op.qargs.iter().map(|b| q(b)).collect();
                let _ = write!(line, "barrier {};", args.join(","));
            }
            name => {
                let _ = write!(line, "{name}");
                if !op.params.is_empty() {
                    let params: Vec<String> =
                        op.params.iter().map(|p| p.qasm(opts.precision)).collect();
                    let _ = write!(line, "({})", params.join(","));
                }
                let args: Vec<String> = op
                    .qargs
                    .iter()
                    .map(|b| q(b))
                    .chain(op.cargs.iter().map(ToString::to_string))
                    .collect();
                let _ = write!(line, " {};", args.join(","));
            }
        }
        line
    }

    /// Re-emit the circuit as QASM text.
    pub fn qasm(&self, opts: &QasmOptions<'_>) -> IrResult<String> {
        let mut out = String::new();
        if !opts.no_decls {
            out.push_str("OPENQASM 2.0;\n");
            for decl in &self.gates {
                out.push_str(&decl.qasm());
                out.push('\n');
            }
            if opts.add_swap && !self.gate_index.contains_key("swap") {
                out.push_str("gate swap a,b { cx a,b; cx b,a; cx a,b; }\n");
            }
            if let Some(aliases) = opts.aliases {
                let mut sizes: BTreeMap<String, u32> = BTreeMap::new();
                for target in aliases.values() {
                    let size = sizes.entry(target.register.clone()).or_insert(0);
                    *size = (*size).max(target.index + 1);
                }
                for (name, size) in sizes {
                    let _ = writeln!(out, "qreg {name}[{size}];");
                }
                for register in &self.registers {
                    if register.kind == RegisterKind::Classical {
                        let _ = writeln!(out, "creg {}[{}];", register.name, register.size);
                    }
                }
            } else {
                for register in &self.registers {
                    let keyword = match register.kind {
                        RegisterKind::Quantum => "qreg",
                        RegisterKind::Classical => "creg",
                    };
                    let _ = writeln!(out, "{keyword} {}[{}];", register.name, register.size);
                }
            }
        }
        if !opts.decls_only {
            for round in self.layered_op_keys()? {
                for key in round {
                    out.push_str(&Self::emit_op(self.op(key)?, opts));
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }
}
