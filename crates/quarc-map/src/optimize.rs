//! Peephole optimization passes: CNOT cancellation and single-qubit
//! gate merging over the u1/u2/u3 basis.

use crate::error::{MapError, MapResult};
use quarc_ir::{DagCircuit, QasmOptions, SymbolicValue};
use quarc_qasm::unroll_to_dag;
use std::f64::consts::PI;
use tracing::debug;

const EPSILON: f64 = 1e-9;
const QX_BASIS: &[&str] = &["u1", "u2", "u3", "cx", "id"];

/// Distance of `x` to the nearest multiple of `modulus` is below
/// [`EPSILON`].
fn near_zero_mod(x: f64, modulus: f64) -> bool {
    let r = x.rem_euclid(modulus);
    r.min(modulus - r) < EPSILON
}

/// Maximum residual of the YZY-to-ZYZ trigonometric system:
///
/// ```text
/// cos(phi+lambda) cos(theta) = cos(xi) cos(theta1+theta2)
/// sin(phi+lambda) cos(theta) = sin(xi) cos(theta1-theta2)
/// cos(phi-lambda) sin(theta) = cos(xi) sin(theta1+theta2)
/// sin(phi-lambda) sin(theta) = sin(xi) sin(-theta1+theta2)
/// ```
fn test_trig_solution(theta: f64, phi: f64, lambda: f64, xi: f64, theta1: f64, theta2: f64) -> f64 {
    let d1 = (phi + lambda).cos() * theta.cos() - xi.cos() * (theta1 + theta2).cos();
    let d2 = (phi + lambda).sin() * theta.cos() - xi.sin() * (theta1 - theta2).cos();
    let d3 = (phi - lambda).cos() * theta.sin() - xi.cos() * (theta1 + theta2).sin();
    let d4 = (phi - lambda).sin() * theta.sin() - xi.sin() * (-theta1 + theta2).sin();
    d1.abs().max(d2.abs()).max(d3.abs()).max(d4.abs())
}

/// Express a Y.Z.Y single-qubit rotation as Z.Y.Z.
///
/// Solves `Ry(2 theta1).Rz(2 xi).Ry(2 theta2) =
/// Rz(2 phi).Ry(2 theta).Rz(2 lambda)` for `(theta, phi, lambda)`.
/// Candidate solutions from four non-singular parameterizations are
/// checked against the trigonometric system; the first within tolerance
/// wins.
pub fn yzy_to_zyz(xi: f64, theta1: f64, theta2: f64) -> MapResult<(f64, f64, f64)> {
    let mut solutions: Vec<(f64, f64, f64)> = Vec::new();
    if xi.cos().abs() < EPSILON / 10.0 {
        solutions.push((theta2 - theta1, xi, 0.0));
    } else if (theta1 + theta2).sin().abs() < EPSILON / 10.0 {
        let phi_minus_lambda = [PI / 2.0, 3.0 * PI / 2.0, PI / 2.0, 3.0 * PI / 2.0];
        let s1 = (xi.sin() * (-theta1 + theta2).sin()).asin();
        let s2 = (-xi.sin() * (-theta1 + theta2).sin()).asin();
        let stheta = [s1, s2, PI - s1, PI - s2];
        for (st, pml) in stheta.into_iter().zip(phi_minus_lambda) {
            let ppl = ((theta1 + theta2).cos() * xi.cos() / st.cos()).acos();
            solutions.push((st, (ppl + pml) / 2.0, (ppl - pml) / 2.0));
        }
    } else if (theta1 + theta2).cos().abs() < EPSILON / 10.0 {
        let phi_plus_lambda = [PI / 2.0, 3.0 * PI / 2.0, PI / 2.0, 3.0 * PI / 2.0];
        let s1 = (xi.sin() * (theta1 - theta2).cos()).acos();
        let s2 = (-xi.sin() * (theta1 - theta2).cos()).acos();
        let stheta = [s1, s2, -s1, -s2];
        for (st, ppl) in stheta.into_iter().zip(phi_plus_lambda) {
            let pml = ((theta1 + theta2).sin() * xi.cos() / st.sin()).acos();
            solutions.push((st, (ppl + pml) / 2.0, (ppl - pml) / 2.0));
        }
    } else {
        let ppl = (xi.sin() * (theta1 - theta2).cos() / (xi.cos() * (theta1 + theta2).cos())).atan();
        let pml =
            (xi.sin() * (-theta1 + theta2).sin() / (xi.cos() * (theta1 + theta2).sin())).atan();
        let sphi = (ppl + pml) / 2.0;
        let slam = (ppl - pml) / 2.0;
        let base = xi.cos() * (theta1 + theta2).cos();
        solutions.push(((base / (sphi + slam).cos()).acos(), sphi, slam));
        solutions.push((
            (base / (sphi + slam + PI).cos()).acos(),
            sphi + PI / 2.0,
            slam + PI / 2.0,
        ));
        solutions.push((
            (base / (sphi + slam).cos()).acos(),
            sphi + PI / 2.0,
            slam - PI / 2.0,
        ));
        solutions.push(((base / (sphi + slam + PI).cos()).acos(), sphi + PI, slam));
    }

    for (theta, phi, lambda) in solutions {
        if test_trig_solution(theta, phi, lambda, xi, theta1, theta2) < EPSILON {
            return Ok((theta, phi, lambda));
        }
    }
    Err(MapError::TrigSolution { xi, theta1, theta2 })
}

/// Euler angles of the product `u3(theta1,phi1,lambda1) .
/// u3(theta2,phi2,lambda2)`, where the first operand is the later gate.
pub fn compose_u3(
    theta1: f64,
    phi1: f64,
    lambda1: f64,
    theta2: f64,
    phi2: f64,
    lambda2: f64,
) -> MapResult<(f64, f64, f64)> {
    // Careful with the factor of two in yzy_to_zyz.
    let (theta, phi, lambda) = yzy_to_zyz((lambda1 + phi2) / 2.0, theta1 / 2.0, theta2 / 2.0)?;
    Ok((2.0 * theta, phi1 + 2.0 * phi, lambda2 + 2.0 * lambda))
}

/// Cancel back-to-back `cx` gates acting on the same qubit pair.
pub fn cx_cancellation(circuit: &mut DagCircuit) -> MapResult<()> {
    let runs = circuit.collect_runs(&["cx"])?;
    for run in runs {
        // Partition the run into chunks with equal gate arguments.
        let mut partition: Vec<Vec<usize>> = Vec::new();
        let mut chunk: Vec<usize> = Vec::new();
        for i in 0..run.len() - 1 {
            chunk.push(run[i]);
            if circuit.op(run[i])?.qargs != circuit.op(run[i + 1])?.qargs {
                partition.push(std::mem::take(&mut chunk));
            }
        }
        chunk.push(run[run.len() - 1]);
        partition.push(chunk);

        for chunk in partition {
            let keep = chunk.len() % 2;
            debug!(len = chunk.len(), keep, "cx chunk");
            for &key in &chunk[keep..] {
                circuit.remove_op_node(key)?;
            }
        }
    }
    Ok(())
}

/// Merge runs of single-qubit gates over the `u1`/`u2`/`u3` basis.
///
/// The circuit is first unrolled to that basis; each maximal run then
/// folds right-to-left into a single gate, which is canonicalized to the
/// cheapest form (`u3` to `u2` to `u1`, or removed entirely when it
/// reduces to the identity). Returns the optimized circuit.
pub fn optimize_1q_gates(circuit: &DagCircuit) -> MapResult<DagCircuit> {
    let qasm = circuit.qasm(&QasmOptions::default())?;
    let mut unrolled = unroll_to_dag(&qasm, QX_BASIS)?;

    let runs = unrolled.collect_runs(&["u1", "u2", "u3", "id"])?;
    for run in runs {
        let mut right_name = "u1".to_string();
        // (theta, phi, lambda) of the accumulated gate.
        let mut right = (0.0_f64, 0.0_f64, 0.0_f64);
        for &key in &run {
            let node = unrolled.op(key)?;
            debug_assert!(node.condition.is_none());
            debug_assert_eq!(node.qargs.len(), 1);
            let (left_name, left) = match node.name.as_str() {
                "u1" => ("u1", (0.0, 0.0, node.params[0].value())),
                "u2" => (
                    "u2",
                    (PI / 2.0, node.params[0].value(), node.params[1].value()),
                ),
                "u3" => (
                    "u3",
                    (
                        node.params[0].value(),
                        node.params[1].value(),
                        node.params[2].value(),
                    ),
                ),
                // id is the identity u1.
                _ => ("u1", (0.0, 0.0, 0.0)),
            };
            match (left_name, right_name.as_str()) {
                // u1(a) * u1(b) = u1(a + b)
                ("u1", "u1") => right = (0.0, 0.0, right.2 + left.2),
                // u1(a) * u2(phi, lambda) = u2(phi + a, lambda)
                ("u1", "u2") => right = (PI / 2.0, right.1 + left.2, right.2),
                // u2(phi, a) * u1(b) = u2(phi, a + b)
                ("u2", "u1") => {
                    right_name = "u2".to_string();
                    right = (PI / 2.0, left.1, right.2 + left.2);
                }
                // u1(a) * u3(theta, phi, lambda) = u3(theta, phi + a, lambda)
                ("u1", "u3") => right = (right.0, right.1 + left.2, right.2),
                // u3(theta, phi, a) * u1(b) = u3(theta, phi, a + b)
                ("u3", "u1") => {
                    right_name = "u3".to_string();
                    right = (left.0, left.1, right.2 + left.2);
                }
                // Ry(pi/2).Rz(2a).Ry(pi/2) = Rz(pi/2).Ry(pi-2a).Rz(pi/2)
                ("u2", "u2") => {
                    right_name = "u3".to_string();
                    right = (
                        PI - left.2 - right.1,
                        left.1 + PI / 2.0,
                        right.2 + PI / 2.0,
                    );
                }
                (_, "nop") => {
                    right_name = left_name.to_string();
                    right = left;
                }
                // General composition through the ZYZ decomposition,
                // treating u2(phi, lambda) as u3(pi/2, phi, lambda).
                _ => {
                    right_name = "u3".to_string();
                    right = compose_u3(left.0, left.1, left.2, right.0, right.1, right.2)?;
                }
            }
            // Canonicalize: fold theta into lambda so the global phase is
            // preserved when the rotation degenerates.
            if right_name != "u1" && near_zero_mod(right.0, 2.0 * PI) {
                right_name = "u1".to_string();
                right = (0.0, 0.0, right.1 + right.2 + right.0);
            }
            if right_name == "u3" {
                // theta = pi/2 + 2k pi
                if near_zero_mod(right.0 - PI / 2.0, 2.0 * PI) {
                    right_name = "u2".to_string();
                    right = (PI / 2.0, right.1, right.2 + (right.0 - PI / 2.0));
                }
                // theta = -pi/2 + 2k pi
                if near_zero_mod(right.0 + PI / 2.0, 2.0 * PI) {
                    right_name = "u2".to_string();
                    right = (
                        PI / 2.0,
                        right.1 + PI,
                        right.2 - PI + (right.0 + PI / 2.0),
                    );
                }
            }
            // u1 with lambda = 0 mod 4 pi is the identity.
            if right_name == "u1" && near_zero_mod(right.2, 4.0 * PI) {
                right_name = "nop".to_string();
            }
        }

        if right_name == "nop" {
            debug!(gates = run.len(), "run folds to the identity");
            for &key in &run {
                unrolled.remove_op_node(key)?;
            }
        } else {
            let params = match right_name.as_str() {
                "u1" => vec![SymbolicValue::new(right.2)],
                "u2" => vec![SymbolicValue::new(right.1), SymbolicValue::new(right.2)],
                _ => vec![
                    SymbolicValue::new(right.0),
                    SymbolicValue::new(right.1),
                    SymbolicValue::new(right.2),
                ],
            };
            debug!(gates = run.len(), into = %right_name, "run merged");
            let op = unrolled.op_mut(run[0])?;
            op.name = right_name;
            op.params = params;
            for &key in &run[1..] {
                unrolled.remove_op_node(key)?;
            }
        }
    }
    Ok(unrolled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn circuit(body: &str, basis: &[&str]) -> DagCircuit {
        let source = format!(
            "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\ncreg c[2];\n{body}"
        );
        unroll_to_dag(&source, basis).unwrap()
    }

    #[test]
    fn test_cx_cancellation_even_pair() {
        let mut dag = circuit("cx q[0],q[1];\ncx q[0],q[1];\n", &["cx"]);
        cx_cancellation(&mut dag).unwrap();
        assert_eq!(dag.num_ops(), 0);
    }

    #[test]
    fn test_cx_cancellation_odd_chunk() {
        let mut dag = circuit(
            "cx q[0],q[1];\ncx q[0],q[1];\ncx q[0],q[1];\n",
            &["cx"],
        );
        cx_cancellation(&mut dag).unwrap();
        assert_eq!(dag.num_ops(), 1);
    }

    #[test]
    fn test_cx_cancellation_distinct_pairs_kept() {
        let mut dag = circuit("cx q[0],q[1];\ncx q[1],q[0];\n", &["cx"]);
        cx_cancellation(&mut dag).unwrap();
        assert_eq!(dag.num_ops(), 2);
    }

    #[test]
    fn test_cx_cancellation_is_idempotent() {
        let mut dag = circuit(
            "cx q[0],q[1];\ncx q[0],q[1];\ncx q[0],q[1];\ncx q[1],q[0];\n",
            &["cx"],
        );
        cx_cancellation(&mut dag).unwrap();
        let once = dag.num_ops();
        cx_cancellation(&mut dag).unwrap();
        assert_eq!(dag.num_ops(), once);
        assert_eq!(once, 2);
    }

    #[test]
    fn test_optimize_merges_hh() {
        let dag = circuit("h q[0];\nh q[0];\n", &["h"]);
        let optimized = optimize_1q_gates(&dag).unwrap();
        assert_eq!(optimized.num_ops(), 1);
        let keys = optimized.named_op_keys("u1").unwrap();
        assert_eq!(keys.len(), 1);
        let op = optimized.op(keys[0]).unwrap();
        assert!((op.params[0].value() - 2.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_optimize_merges_xx() {
        let dag = circuit("x q[0];\nx q[0];\n", &["x"]);
        let optimized = optimize_1q_gates(&dag).unwrap();
        assert_eq!(optimized.num_ops(), 1);
        let keys = optimized.named_op_keys("u1").unwrap();
        assert_eq!(keys.len(), 1);
        let op = optimized.op(keys[0]).unwrap();
        assert!((op.params[0].value() - 2.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_optimize_sums_u1() {
        let dag = circuit("u1(0.5) q[0];\nu1(0.25) q[0];\n", &["u1"]);
        let optimized = optimize_1q_gates(&dag).unwrap();
        assert_eq!(optimized.num_ops(), 1);
        let keys = optimized.named_op_keys("u1").unwrap();
        let op = optimized.op(keys[0]).unwrap();
        assert!((op.params[0].value() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_optimize_folds_u1_into_u2() {
        let dag = circuit("u1(0.5) q[0];\nu2(0.3,0.7) q[0];\n", &["u1", "u2"]);
        let optimized = optimize_1q_gates(&dag).unwrap();
        assert_eq!(optimized.num_ops(), 1);
        let keys = optimized.named_op_keys("u2").unwrap();
        assert_eq!(keys.len(), 1);
        let op = optimized.op(keys[0]).unwrap();
        assert!((op.params[0].value() - 0.3).abs() < 1e-12);
        assert!((op.params[1].value() - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_optimize_removes_identity() {
        let dag = circuit("id q[0];\n", &["id"]);
        let optimized = optimize_1q_gates(&dag).unwrap();
        assert_eq!(optimized.num_ops(), 0);
    }

    #[test]
    fn test_optimize_preserves_cx() {
        let dag = circuit("h q[0];\ncx q[0],q[1];\nh q[1];\n", &["h", "cx"]);
        let optimized = optimize_1q_gates(&dag).unwrap();
        assert_eq!(optimized.named_op_keys("cx").unwrap().len(), 1);
    }

    #[test]
    fn test_compose_u3_identity() {
        // u3(t,p,l) * u1(0) keeps the rotation.
        let (theta, phi, lambda) = compose_u3(0.7, 0.2, 0.4, 0.0, 0.0, 0.0).unwrap();
        assert!((theta - 0.7).abs() < 1e-9);
        assert!((phi - 0.2).abs() < 1e-9);
        assert!((lambda - 0.4).abs() < 1e-9);
    }

    proptest! {
        /// Any solution the solver returns satisfies the trigonometric
        /// system it was derived from.
        #[test]
        fn test_yzy_solution_satisfies_equations(
            xi in -3.0_f64..3.0,
            theta1 in -3.0_f64..3.0,
            theta2 in -3.0_f64..3.0,
        ) {
            if let Ok((theta, phi, lambda)) = yzy_to_zyz(xi, theta1, theta2) {
                prop_assert!(test_trig_solution(theta, phi, lambda, xi, theta1, theta2) < 1e-9);
            }
        }
    }
}
