//! Property-based tests for QASM roundtrip conversion.
//!
//! Tests that source → DAG → QASM → DAG preserves circuit structure.

use proptest::prelude::*;
use quarc_ir::QasmOptions;
use quarc_qasm::unroll_to_dag;

const BASIS: &[&str] = &["h", "x", "y", "z", "cx", "rz"];

/// Gate operations rendered into generated source text.
#[derive(Debug, Clone)]
enum GateOp {
    H(u32),
    X(u32),
    Y(u32),
    Z(u32),
    Rz(u32, f64),
    CX(u32, u32),
    Measure(u32),
}

impl GateOp {
    fn render(&self) -> String {
        match self {
            GateOp::H(q) => format!("h q[{q}];"),
            GateOp::X(q) => format!("x q[{q}];"),
            GateOp::Y(q) => format!("y q[{q}];"),
            GateOp::Z(q) => format!("z q[{q}];"),
            GateOp::Rz(q, angle) => format!("rz({angle:.6}) q[{q}];"),
            GateOp::CX(c, t) => format!("cx q[{c}],q[{t}];"),
            GateOp::Measure(q) => format!("measure q[{q}] -> c[{q}];"),
        }
    }
}

/// Generate a random gate operation for a circuit with given width.
fn arb_gate_op(num_qubits: u32) -> BoxedStrategy<GateOp> {
    if num_qubits < 2 {
        prop_oneof![
            (0..num_qubits).prop_map(GateOp::H),
            (0..num_qubits).prop_map(GateOp::X),
            (0..num_qubits).prop_map(GateOp::Y),
            (0..num_qubits).prop_map(GateOp::Z),
            (0..num_qubits, 0.0_f64..6.28).prop_map(|(q, a)| GateOp::Rz(q, a)),
            (0..num_qubits).prop_map(GateOp::Measure),
        ]
        .boxed()
    } else {
        prop_oneof![
            (0..num_qubits).prop_map(GateOp::H),
            (0..num_qubits).prop_map(GateOp::X),
            (0..num_qubits).prop_map(GateOp::Y),
            (0..num_qubits).prop_map(GateOp::Z),
            (0..num_qubits, 0.0_f64..6.28).prop_map(|(q, a)| GateOp::Rz(q, a)),
            (0..num_qubits, 0..num_qubits)
                .prop_filter("Control and target must differ", |(c, t)| c != t)
                .prop_map(|(c, t)| GateOp::CX(c, t)),
            (0..num_qubits).prop_map(GateOp::Measure),
        ]
        .boxed()
    }
}

/// Generate random QASM source over one quantum and one classical register.
fn arb_source() -> impl Strategy<Value = String> {
    (1_u32..=5).prop_flat_map(|num_qubits| {
        prop::collection::vec(arb_gate_op(num_qubits), 1..=12).prop_map(move |ops| {
            let mut source = String::from("OPENQASM 2.0;\ninclude \"qelib1.inc\";\n");
            source.push_str(&format!("qreg q[{num_qubits}];\n"));
            source.push_str(&format!("creg c[{num_qubits}];\n"));
            for op in &ops {
                source.push_str(&op.render());
                source.push('\n');
            }
            source
        })
    })
}

proptest! {
    /// Parsing the emitted QASM of a circuit reproduces its structure.
    ///
    /// Properties verified:
    /// - Qubit and classical-bit counts are preserved
    /// - Operation count and depth are preserved
    /// - The per-wire operation sequence is preserved
    #[test]
    fn test_qasm_roundtrip_preserves_structure(source in arb_source()) {
        let dag = unroll_to_dag(&source, BASIS).expect("Failed to build DAG from source");
        let qasm = dag.qasm(&QasmOptions::default()).expect("Failed to emit QASM");
        let reparsed = unroll_to_dag(&qasm, BASIS).expect("Failed to re-parse emitted QASM");

        prop_assert_eq!(reparsed.qubits().len(), dag.qubits().len(),
            "Qubit count mismatch after roundtrip");
        prop_assert_eq!(reparsed.clbits().len(), dag.clbits().len(),
            "Classical bit count mismatch after roundtrip");
        prop_assert_eq!(reparsed.num_ops(), dag.num_ops(),
            "Operation count mismatch after roundtrip");
        prop_assert_eq!(reparsed.depth().unwrap(), dag.depth().unwrap(),
            "Circuit depth mismatch after roundtrip");

        let signature = |d: &quarc_ir::DagCircuit| -> Vec<(String, Vec<String>)> {
            d.topological_op_keys()
                .unwrap()
                .into_iter()
                .map(|k| {
                    let op = d.op(k).unwrap();
                    (
                        op.name.clone(),
                        op.qargs.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect()
        };
        prop_assert_eq!(signature(&reparsed), signature(&dag),
            "Operation sequence mismatch after roundtrip");
    }

    /// An empty circuit survives the roundtrip.
    #[test]
    fn test_empty_circuit_roundtrip(num_qubits in 1_u32..=10, num_clbits in 1_u32..=10) {
        let source = format!(
            "OPENQASM 2.0;\nqreg q[{num_qubits}];\ncreg c[{num_clbits}];\n"
        );
        let dag = unroll_to_dag(&source, BASIS).expect("Failed to build DAG");
        let qasm = dag.qasm(&QasmOptions::default()).expect("Failed to emit QASM");
        let reparsed = unroll_to_dag(&qasm, BASIS).expect("Failed to re-parse");

        prop_assert_eq!(reparsed.qubits().len(), num_qubits as usize);
        prop_assert_eq!(reparsed.clbits().len(), num_clbits as usize);
        prop_assert_eq!(reparsed.num_ops(), 0);
    }

    /// QASM emission is deterministic.
    #[test]
    fn test_qasm_emission_is_deterministic(source in arb_source()) {
        let dag = unroll_to_dag(&source, BASIS).expect("Failed to build DAG");
        let qasm1 = dag.qasm(&QasmOptions::default()).expect("First emission failed");
        let qasm2 = dag.qasm(&QasmOptions::default()).expect("Second emission failed");

        prop_assert_eq!(qasm1, qasm2, "QASM emission is not deterministic");
    }
}
