//! Coupling graph of physical qubits.
//!
//! Edges are directed (control, target) pairs; distance is computed over
//! the undirected skeleton with an all-pairs BFS at construction time.

use crate::error::{MapError, MapResult};
use quarc_ir::RegBit;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

const UNREACHABLE: usize = usize::MAX;

/// Directed connectivity of a physical qubit register.
#[derive(Debug, Clone)]
pub struct CouplingGraph {
    qubits: Vec<RegBit>,
    index: FxHashMap<RegBit, usize>,
    edges: Vec<(RegBit, RegBit)>,
    edge_set: FxHashSet<(RegBit, RegBit)>,
    dist: Vec<Vec<usize>>,
}

impl CouplingGraph {
    /// Build from directed (control, target) pairs of physical qubits.
    pub fn from_pairs(pairs: Vec<(RegBit, RegBit)>) -> Self {
        let mut qubits: Vec<RegBit> = pairs
            .iter()
            .flat_map(|(a, b)| [a.clone(), b.clone()])
            .collect();
        qubits.sort();
        qubits.dedup();
        let index: FxHashMap<RegBit, usize> = qubits
            .iter()
            .enumerate()
            .map(|(i, q)| (q.clone(), i))
            .collect();
        let edge_set: FxHashSet<(RegBit, RegBit)> = pairs.iter().cloned().collect();

        // Undirected adjacency for distance queries.
        let mut adjacency = vec![Vec::new(); qubits.len()];
        for (a, b) in &pairs {
            let (i, j) = (index[a], index[b]);
            adjacency[i].push(j);
            adjacency[j].push(i);
        }
        let dist = (0..qubits.len())
            .map(|source| bfs_distances(source, &adjacency))
            .collect();

        Self {
            qubits,
            index,
            edges: pairs,
            edge_set,
            dist,
        }
    }

    /// Build over register `q` from directed pairs of indices.
    pub fn from_edges(pairs: &[(u32, u32)]) -> Self {
        Self::from_pairs(
            pairs
                .iter()
                .map(|&(a, b)| (RegBit::new("q", a), RegBit::new("q", b)))
                .collect(),
        )
    }

    /// A line of `n` qubits coupled in index order.
    pub fn linear(n: u32) -> Self {
        Self::from_pairs(
            (0..n.saturating_sub(1))
                .map(|i| (RegBit::new("q", i), RegBit::new("q", i + 1)))
                .collect(),
        )
    }

    /// Number of physical qubits.
    pub fn size(&self) -> usize {
        self.qubits.len()
    }

    /// Physical qubits in sorted order.
    pub fn qubits(&self) -> &[RegBit] {
        &self.qubits
    }

    /// Dense index of a physical qubit.
    pub fn index_of(&self, qubit: &RegBit) -> Option<usize> {
        self.index.get(qubit).copied()
    }

    /// Directed edges in declaration order.
    pub fn edges(&self) -> &[(RegBit, RegBit)] {
        &self.edges
    }

    /// Whether the directed edge (a, b) exists.
    pub fn has_edge(&self, a: &RegBit, b: &RegBit) -> bool {
        self.edge_set.contains(&(a.clone(), b.clone()))
    }

    /// Whether an edge exists in either direction.
    pub fn connected(&self, a: &RegBit, b: &RegBit) -> bool {
        self.has_edge(a, b) || self.has_edge(b, a)
    }

    /// Undirected shortest-path distance between two physical qubits.
    pub fn distance(&self, a: &RegBit, b: &RegBit) -> MapResult<usize> {
        let i = self
            .index_of(a)
            .ok_or_else(|| MapError::NotInCoupling(a.clone()))?;
        let j = self
            .index_of(b)
            .ok_or_else(|| MapError::NotInCoupling(b.clone()))?;
        let d = self.dist[i][j];
        if d == UNREACHABLE {
            return Err(MapError::Disconnected {
                a: a.clone(),
                b: b.clone(),
            });
        }
        Ok(d)
    }
}

fn bfs_distances(source: usize, adjacency: &[Vec<usize>]) -> Vec<usize> {
    let mut dist = vec![UNREACHABLE; adjacency.len()];
    dist[source] = 0;
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        for &next in &adjacency[v] {
            if dist[next] == UNREACHABLE {
                dist[next] = dist[v] + 1;
                queue.push_back(next);
            }
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_distances() {
        let coupling = CouplingGraph::linear(4);
        assert_eq!(coupling.size(), 4);
        let q = |i| RegBit::new("q", i);
        assert_eq!(coupling.distance(&q(0), &q(3)).unwrap(), 3);
        assert_eq!(coupling.distance(&q(1), &q(2)).unwrap(), 1);
        assert_eq!(coupling.distance(&q(2), &q(2)).unwrap(), 0);
    }

    #[test]
    fn test_direction_preserved() {
        let coupling = CouplingGraph::from_edges(&[(0, 1), (2, 1)]);
        let q = |i| RegBit::new("q", i);
        assert!(coupling.has_edge(&q(0), &q(1)));
        assert!(!coupling.has_edge(&q(1), &q(0)));
        assert!(coupling.connected(&q(1), &q(0)));
        // Distance ignores direction.
        assert_eq!(coupling.distance(&q(0), &q(2)).unwrap(), 2);
    }

    #[test]
    fn test_qubits_sorted() {
        let coupling = CouplingGraph::from_edges(&[(3, 1), (1, 0)]);
        let indices: Vec<u32> = coupling.qubits().iter().map(|q| q.index).collect();
        assert_eq!(indices, [0, 1, 3]);
    }

    #[test]
    fn test_not_in_coupling() {
        let coupling = CouplingGraph::linear(2);
        let err = coupling
            .distance(&RegBit::new("q", 0), &RegBit::new("q", 9))
            .unwrap_err();
        assert!(matches!(err, MapError::NotInCoupling(_)));
    }

    #[test]
    fn test_disconnected() {
        let coupling = CouplingGraph::from_edges(&[(0, 1), (2, 3)]);
        let err = coupling
            .distance(&RegBit::new("q", 0), &RegBit::new("q", 3))
            .unwrap_err();
        assert!(matches!(err, MapError::Disconnected { .. }));
    }
}
