//! Coupling-aware swap insertion and CNOT direction correction.
//!
//! `swap_mapper` schedules the circuit into layers and, for each layer,
//! searches for a swap circuit that brings interacting qubits onto
//! coupled pairs (Bravyi's randomized algorithm). The rewritten program
//! is re-emitted as QASM under the evolving layout and unrolled back
//! into a DAG. `direction_mapper` then flips CNOTs that run against the
//! coupling direction using Hadamard conjugation.
//!
//! Measurements may be followed by inserted swaps, producing repeated
//! measurement of a physical qubit. Swaps that a later layer makes
//! redundant are not removed, nor are initial swaps that the all-zero
//! starting state would allow.

use crate::coupling::CouplingGraph;
use crate::error::{MapError, MapResult};
use crate::layout::Layout;
use quarc_ir::{DagCircuit, Layer, QasmOptions, RegBit};
use quarc_qasm::unroll_to_dag;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rustc_hash::FxHashSet;
use std::fmt::Write as _;
use tracing::{debug, trace};

/// Default output basis of the swap mapper.
pub const DEFAULT_BASIS: &[&str] = &["cx", "u1", "u2", "u3", "id"];

/// Default number of randomized trials per layer.
pub const DEFAULT_TRIALS: usize = 20;

const FLIPPED_CX: &str = "OPENQASM 2.0;\n\
gate cx c,t { CX c,t; }\n\
gate u2(phi,lambda) q { U(pi/2,phi,lambda) q; }\n\
gate h a { u2(0,pi) a; }\n\
gate cx_flipped a,b { h a; h b; cx b,a; h a; h b; }\n\
qreg q[2];\n\
cx_flipped q[0],q[1];\n";

/// Swap circuit found for one layer.
#[derive(Debug)]
struct LayerSolution {
    /// Inserted swaps as QASM text over physical qubit names.
    swaps: String,
    /// Depth of the swap circuit; 0 when the layer already fits.
    depth: usize,
    /// Qubit positions after the swaps.
    layout: Layout,
    /// The layer contained no two-qubit gates.
    trivial: bool,
}

/// Find a swap circuit that makes every two-qubit gate of the layer act
/// on a coupled pair. Returns `None` when no trial succeeds.
fn layer_permutation(
    layer_partition: &[Vec<RegBit>],
    layout: &Layout,
    qubit_subset: &[RegBit],
    coupling: &CouplingGraph,
    trials: usize,
    rng: &mut StdRng,
) -> MapResult<Option<LayerSolution>> {
    let mut gates: Vec<(RegBit, RegBit)> = Vec::new();
    for group in layer_partition {
        if group.len() > 2 {
            return Err(MapError::WideLayerOperation(group.len()));
        }
        if let [a, b] = &group[..] {
            gates.push((a.clone(), b.clone()));
        }
    }
    trace!(gates = gates.len(), "layer_permutation");

    let physical = |layout: &Layout, q: &RegBit| -> MapResult<RegBit> {
        layout
            .get(q)
            .cloned()
            .ok_or_else(|| MapError::Unmapped(q.clone()))
    };
    let phys_index = |layout: &Layout, q: &RegBit| -> MapResult<usize> {
        let p = physical(layout, q)?;
        coupling
            .index_of(&p)
            .ok_or(MapError::NotInCoupling(p))
    };
    let total_distance = |layout: &Layout| -> MapResult<usize> {
        let mut dist = 0;
        for (a, b) in &gates {
            dist += coupling.distance(&physical(layout, a)?, &physical(layout, b)?)?;
        }
        Ok(dist)
    };

    // Already applicable?
    if total_distance(layout)? == gates.len() {
        trace!("layer already fits the coupling");
        return Ok(Some(LayerSolution {
            swaps: String::new(),
            depth: 0,
            layout: layout.clone(),
            trivial: gates.is_empty(),
        }));
    }

    let n = coupling.size();
    let mut best: Option<LayerSolution> = None;
    let mut best_depth = usize::MAX;
    for trial in 0..trials {
        trace!(trial, "layer_permutation trial");
        let mut trial_layout = layout.clone();
        let mut trial_swaps = String::new();

        // Randomized squared-distance cost table.
        #[allow(clippy::cast_precision_loss)]
        let mut xi = vec![vec![0.0_f64; n]; n];
        for i in 0..n {
            for j in 0..n {
                let noise: f64 = rng.sample(StandardNormal);
                let scale = 1.0 + noise / n as f64;
                let d = coupling.distance(&coupling.qubits()[i], &coupling.qubits()[j])? as f64;
                xi[i][j] = scale * d * d;
                xi[j][i] = xi[i][j];
            }
        }
        let cost = |layout: &Layout| -> MapResult<f64> {
            let mut c = 0.0;
            for (a, b) in &gates {
                c += xi[phys_index(layout, a)?][phys_index(layout, b)?];
            }
            Ok(c)
        };

        // Grow the swap circuit one slice at a time, up to depth 2n.
        let mut depth = 1;
        let mut swaps = String::new();
        let mut success = false;
        while depth < 2 * n + 1 {
            let mut available: FxHashSet<RegBit> = qubit_subset.iter().cloned().collect();
            // Greedily pick cost-reducing swaps on disjoint edges.
            while !available.is_empty() {
                let mut min_cost = cost(&trial_layout)?;
                let mut chosen: Option<((RegBit, RegBit), Layout)> = None;
                for (a, b) in coupling.edges() {
                    if available.contains(a) && available.contains(b) {
                        let mut candidate = trial_layout.clone();
                        candidate.swap(a, b);
                        let candidate_cost = cost(&candidate)?;
                        if candidate_cost < min_cost {
                            min_cost = candidate_cost;
                            chosen = Some(((a.clone(), b.clone()), candidate));
                        }
                    }
                }
                let Some(((a, b), next_layout)) = chosen else {
                    break;
                };
                available.remove(&a);
                available.remove(&b);
                trial_layout = next_layout;
                let _ = write!(swaps, "swap {a},{b}; ");
                trace!(%a, %b, "chose swap");
            }
            // Finished if every gate now acts on a coupled pair.
            if total_distance(&trial_layout)? == gates.len() {
                trial_swaps.push_str(&swaps);
                success = true;
                break;
            }
            depth += 1;
        }

        if success && depth < best_depth {
            trace!(depth, "trial succeeded");
            best_depth = depth;
            best = Some(LayerSolution {
                swaps: trial_swaps,
                depth,
                layout: trial_layout,
                trivial: false,
            });
        }
    }
    Ok(best)
}

/// QASM emitted for one mapped layer.
///
/// The first mapped layer triggers emission of the declarations and of
/// every layer up to this point under the chosen layout; its swaps are
/// discarded because the initial layout absorbs them.
fn update_qasm(
    i: usize,
    first_layer: bool,
    solution: &LayerSolution,
    circuit: &DagCircuit,
    layer_list: &[Layer],
) -> MapResult<String> {
    let aliases = solution.layout.as_alias_map();
    let mut out = String::new();
    if first_layer {
        debug!(layer = i, "first mapped layer, emitting declarations");
        out.push_str(&circuit.qasm(&QasmOptions {
            decls_only: true,
            add_swap: true,
            aliases: Some(&aliases),
            ..QasmOptions::default()
        })?);
        for layer in &layer_list[..=i] {
            out.push_str(&layer.circuit.qasm(&QasmOptions {
                no_decls: true,
                aliases: Some(&aliases),
                ..QasmOptions::default()
            })?);
        }
    } else {
        if solution.depth > 0 {
            debug!(depth = solution.depth, "swaps precede this layer");
            out.push_str(&solution.swaps);
        }
        out.push_str(&layer_list[i].circuit.qasm(&QasmOptions {
            no_decls: true,
            aliases: Some(&aliases),
            ..QasmOptions::default()
        })?);
    }
    Ok(out)
}

/// Map a circuit onto a coupling graph by inserting swap gates.
///
/// Returns the mapped circuit, unrolled to `basis` plus `swap`, and the
/// initial layout actually used. The layout may differ from
/// `initial_layout` when the first layer of two-qubit gates cannot be
/// executed on it.
pub fn swap_mapper(
    circuit: &DagCircuit,
    coupling: &CouplingGraph,
    initial_layout: Option<Layout>,
    basis: &[&str],
    trials: usize,
    seed: Option<u64>,
) -> MapResult<(DagCircuit, Layout)> {
    if circuit.width() > coupling.size() {
        return Err(MapError::TooManyQubits {
            circuit: circuit.width(),
            coupling: coupling.size(),
        });
    }
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let layers = circuit.layers()?;
    debug!(layers = layers.len(), "swap_mapper schedule");

    // Check the input layout, or assign circuit qubits onto the first
    // physical qubits in order.
    let circ_qubits = circuit.qubits();
    let mut qubit_subset: Vec<RegBit> = Vec::new();
    let mut initial_layout = match initial_layout {
        Some(layout) => {
            let circ_set: FxHashSet<&RegBit> = circ_qubits.iter().collect();
            for (logical, physical) in layout.iter() {
                qubit_subset.push(physical.clone());
                if !circ_set.contains(logical) {
                    return Err(MapError::NotInCircuit(logical.clone()));
                }
                if coupling.index_of(physical).is_none() {
                    return Err(MapError::NotInCoupling(physical.clone()));
                }
            }
            layout
        }
        None => {
            qubit_subset = coupling.qubits()[..circuit.width()].to_vec();
            let mut layout = Layout::new();
            for (logical, physical) in circ_qubits.iter().zip(&qubit_subset) {
                layout.insert(logical.clone(), physical.clone());
            }
            layout
        }
    };
    debug!(layout = ?initial_layout, "initial layout");

    let mut layout = initial_layout.clone();
    let mut qasm_out = String::new();
    let mut first_layer = true;

    for (i, layer) in layers.iter().enumerate() {
        let solution = layer_permutation(
            &layer.partition,
            &layout,
            &qubit_subset,
            coupling,
            trials,
            &mut rng,
        )?;
        if let Some(solution) = solution {
            debug!(
                layer = i,
                depth = solution.depth,
                trivial = solution.trivial,
                "layer mapped"
            );
            layout = solution.layout.clone();
            qasm_out.push_str(&update_qasm(i, first_layer, &solution, circuit, &layers)?);
            if first_layer {
                initial_layout = layout.clone();
                first_layer = false;
            }
        } else {
            // Retry the layer one operation at a time.
            debug!(layer = i, "layer failed, retrying serially");
            let serial = layer.circuit.serial_layers()?;
            for (j, serial_layer) in serial.iter().enumerate() {
                let Some(solution) = layer_permutation(
                    &serial_layer.partition,
                    &layout,
                    &qubit_subset,
                    coupling,
                    trials,
                    &mut rng,
                )?
                else {
                    let aliases = layout.as_alias_map();
                    let qasm = serial_layer.circuit.qasm(&QasmOptions {
                        no_decls: true,
                        aliases: Some(&aliases),
                        ..QasmOptions::default()
                    })?;
                    return Err(MapError::MappingFailed {
                        layer: i,
                        serial_layer: j,
                        qasm,
                    });
                };
                // Single-qubit sublayers before any gates were placed are
                // deferred to the first-layer backfill.
                if solution.trivial && first_layer {
                    continue;
                }
                layout = solution.layout.clone();
                qasm_out.push_str(&update_qasm(j, first_layer, &solution, circuit, &serial)?);
                if first_layer {
                    initial_layout = layout.clone();
                    first_layer = false;
                }
            }
        }
    }

    // Only single-qubit gates in the whole circuit; emit everything under
    // the initial layout.
    if first_layer {
        let aliases = initial_layout.as_alias_map();
        qasm_out.push_str(&circuit.qasm(&QasmOptions {
            decls_only: true,
            add_swap: true,
            aliases: Some(&aliases),
            ..QasmOptions::default()
        })?);
        for layer in &layers {
            qasm_out.push_str(&layer.circuit.qasm(&QasmOptions {
                no_decls: true,
                aliases: Some(&aliases),
                ..QasmOptions::default()
            })?);
        }
    }

    let mut output_basis: Vec<&str> = basis.to_vec();
    if !output_basis.contains(&"swap") {
        output_basis.push("swap");
    }
    let mapped = unroll_to_dag(&qasm_out, &output_basis)?;
    Ok((mapped, initial_layout))
}

/// Flip CNOT gates that run against the coupling direction.
///
/// Adds `h` to the circuit basis. Fails if a CNOT acts on a pair with no
/// coupling edge in either direction.
pub fn direction_mapper(
    mut circuit: DagCircuit,
    coupling: &CouplingGraph,
) -> MapResult<DagCircuit> {
    let Some(sig) = circuit.basis_signature("cx") else {
        return Ok(circuit);
    };
    if (sig.n_qubits, sig.n_clbits, sig.n_params) != (2, 0, 0) {
        return Err(MapError::BadGateSignature {
            n_qubits: sig.n_qubits,
            n_clbits: sig.n_clbits,
            n_params: sig.n_params,
        });
    }
    let flipped = unroll_to_dag(FLIPPED_CX, &["cx", "h"])?;
    let wires = [RegBit::new("q", 0), RegBit::new("q", 1)];
    for key in circuit.named_op_keys("cx")? {
        let op = circuit.op(key)?;
        let (a, b) = (op.qargs[0].clone(), op.qargs[1].clone());
        if coupling.has_edge(&a, &b) {
            debug!(%a, %b, "cx direction ok");
        } else if coupling.has_edge(&b, &a) {
            debug!(%a, %b, "cx direction flipped");
            circuit.substitute_circuit_one(key, &flipped, &wires)?;
        } else {
            return Err(MapError::CouplingViolation { a, b });
        }
    }
    Ok(circuit)
}
