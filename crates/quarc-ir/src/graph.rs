//! Generic directed multigraph keyed by caller-chosen integer ids.
//!
//! The engine underneath [`crate::dag::DagCircuit`]. Vertices are keyed by
//! `usize` keys supplied by the caller (keys need not be dense), vertex and
//! edge payloads are arbitrary, and parallel edges are allowed. All
//! observable orderings are deterministic: successors enumerate in
//! ascending key order, predecessors in descending key order, and the
//! topological sort breaks ties by largest ready key first.

use crate::error::{IrError, IrResult};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

/// A directed edge with payload.
#[derive(Debug, Clone)]
pub struct Edge<E> {
    /// Source vertex key.
    pub source: usize,
    /// Target vertex key.
    pub target: usize,
    /// Edge payload.
    pub data: E,
}

/// Directed multigraph with integer vertex keys.
#[derive(Debug, Clone)]
pub struct Graph<N, E> {
    vertices: BTreeMap<usize, N>,
    edges: FxHashMap<usize, Edge<E>>,
    out_edges: FxHashMap<usize, Vec<usize>>,
    in_edges: FxHashMap<usize, Vec<usize>>,
    next_edge_id: usize,
}

impl<N, E> Default for Graph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> Graph<N, E> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            vertices: BTreeMap::new(),
            edges: FxHashMap::default(),
            out_edges: FxHashMap::default(),
            in_edges: FxHashMap::default(),
            next_edge_id: 0,
        }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Vertex keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.vertices.keys().copied()
    }

    /// Whether `key` is a vertex.
    pub fn contains_vertex(&self, key: usize) -> bool {
        self.vertices.contains_key(&key)
    }

    /// Insert a vertex, replacing any existing payload under the same key.
    pub fn add_vertex(&mut self, key: usize, data: N) {
        self.vertices.insert(key, data);
        self.out_edges.entry(key).or_default();
        self.in_edges.entry(key).or_default();
    }

    /// Vertex payload.
    pub fn vertex(&self, key: usize) -> Option<&N> {
        self.vertices.get(&key)
    }

    /// Mutable vertex payload.
    pub fn vertex_mut(&mut self, key: usize) -> Option<&mut N> {
        self.vertices.get_mut(&key)
    }

    /// Add a directed edge, inserting missing endpoint vertices with
    /// default payloads. Returns the edge id.
    pub fn add_edge(&mut self, source: usize, target: usize, data: E) -> usize
    where
        N: Default,
    {
        if !self.vertices.contains_key(&source) {
            self.add_vertex(source, N::default());
        }
        if !self.vertices.contains_key(&target) {
            self.add_vertex(target, N::default());
        }
        self.push_edge(source, target, data)
    }

    /// Add a directed edge between two existing vertices.
    pub fn connect(&mut self, source: usize, target: usize, data: E) -> IrResult<usize> {
        if !self.vertices.contains_key(&source) {
            return Err(IrError::VertexNotFound(source));
        }
        if !self.vertices.contains_key(&target) {
            return Err(IrError::VertexNotFound(target));
        }
        Ok(self.push_edge(source, target, data))
    }

    fn push_edge(&mut self, source: usize, target: usize, data: E) -> usize {
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        self.edges.insert(
            id,
            Edge {
                source,
                target,
                data,
            },
        );
        self.out_edges.entry(source).or_default().push(id);
        self.in_edges.entry(target).or_default().push(id);
        id
    }

    /// Edge by id.
    pub fn edge(&self, id: usize) -> Option<&Edge<E>> {
        self.edges.get(&id)
    }

    /// Remove an edge by id.
    pub fn remove_edge(&mut self, id: usize) -> Option<Edge<E>> {
        let edge = self.edges.remove(&id)?;
        if let Some(out) = self.out_edges.get_mut(&edge.source) {
            out.retain(|&e| e != id);
        }
        if let Some(inc) = self.in_edges.get_mut(&edge.target) {
            inc.retain(|&e| e != id);
        }
        Some(edge)
    }

    /// Remove a vertex and all incident edges.
    pub fn remove_vertex(&mut self, key: usize) -> Option<N> {
        let data = self.vertices.remove(&key)?;
        let incident: Vec<usize> = self
            .out_edges
            .remove(&key)
            .unwrap_or_default()
            .into_iter()
            .chain(self.in_edges.remove(&key).unwrap_or_default())
            .collect();
        for id in incident {
            self.remove_edge(id);
        }
        Some(data)
    }

    /// Outgoing edges of `key` as `(edge id, edge)` in insertion order.
    pub fn out_edges(&self, key: usize) -> Vec<(usize, &Edge<E>)> {
        self.out_edges
            .get(&key)
            .map(|ids| {
                ids.iter()
                    .filter_map(|&id| self.edges.get(&id).map(|e| (id, e)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Incoming edges of `key` as `(edge id, edge)` in insertion order.
    pub fn in_edges(&self, key: usize) -> Vec<(usize, &Edge<E>)> {
        self.in_edges
            .get(&key)
            .map(|ids| {
                ids.iter()
                    .filter_map(|&id| self.edges.get(&id).map(|e| (id, e)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct successors, ascending key order, parallel edges collapsed.
    pub fn successors(&self, key: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .out_edges(key)
            .iter()
            .map(|(_, e)| e.target)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Direct predecessors, descending key order, parallel edges collapsed.
    pub fn predecessors(&self, key: usize) -> Vec<usize> {
        let mut inc: Vec<usize> = self
            .in_edges(key)
            .iter()
            .map(|(_, e)| e.source)
            .collect();
        inc.sort_unstable_by(|a, b| b.cmp(a));
        inc.dedup();
        inc
    }

    /// Transitive predecessors of `key`, excluding `key` itself, each
    /// vertex reported once. Only set membership is a contract; the
    /// returned order is the BFS visit order.
    pub fn ancestors(&self, key: usize) -> Vec<usize> {
        self.closure(key, |g, k| g.predecessors(k))
    }

    /// Transitive successors of `key`, excluding `key` itself, each vertex
    /// reported once. Only set membership is a contract.
    pub fn descendants(&self, key: usize) -> Vec<usize> {
        self.closure(key, |g, k| g.successors(k))
    }

    fn closure(&self, key: usize, step: impl Fn(&Self, usize) -> Vec<usize>) -> Vec<usize> {
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(key);
        seen.insert(key);
        while let Some(v) = queue.pop_front() {
            for next in step(self, v) {
                if seen.insert(next) {
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Topological sort via Kahn's algorithm.
    ///
    /// Among simultaneously ready vertices the largest key is emitted
    /// first; this exact tie-break is pinned by tests. `reverse` reverses
    /// the final sequence without changing the tie-break. Fails with
    /// [`IrError::Cycle`] when the graph is not a DAG.
    pub fn topological_sort(&self, reverse: bool) -> IrResult<Vec<usize>> {
        let mut in_degree: FxHashMap<usize, usize> = FxHashMap::default();
        for &key in self.vertices.keys() {
            in_degree.insert(key, 0);
        }
        for edge in self.edges.values() {
            *in_degree.entry(edge.target).or_insert(0) += 1;
        }

        let mut ready: BinaryHeap<usize> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&k, _)| k)
            .collect();
        let mut order = Vec::with_capacity(self.vertices.len());

        while let Some(v) = ready.pop() {
            order.push(v);
            for (_, edge) in self.out_edges(v) {
                let d = in_degree
                    .get_mut(&edge.target)
                    .ok_or(IrError::VertexNotFound(edge.target))?;
                *d -= 1;
                if *d == 0 {
                    ready.push(edge.target);
                }
            }
        }

        if order.len() != self.vertices.len() {
            return Err(IrError::Cycle {
                emitted: order.len(),
                total: self.vertices.len(),
            });
        }
        if reverse {
            order.reverse();
        }
        Ok(order)
    }

    /// Number of weakly connected components (edges treated as
    /// undirected for this computation only).
    pub fn number_weakly_connected_components(&self) -> usize {
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut components = 0;
        for &start in self.vertices.keys() {
            if !seen.insert(start) {
                continue;
            }
            components += 1;
            let mut queue = VecDeque::from([start]);
            while let Some(v) = queue.pop_front() {
                for next in self
                    .successors(v)
                    .into_iter()
                    .chain(self.predecessors(v))
                {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        components
    }

    /// Longest path in the DAG, measured in edges, as a vertex sequence.
    ///
    /// Computed over the topological order with `best[v] = max over
    /// predecessors u of best[u] + 1`; ties keep the first predecessor in
    /// iteration order. Fails on a non-DAG.
    pub fn dag_longest_path(&self) -> IrResult<Vec<usize>> {
        let order = self.topological_sort(false)?;
        if order.is_empty() {
            return Ok(Vec::new());
        }

        let mut best: FxHashMap<usize, usize> = FxHashMap::default();
        let mut parent: FxHashMap<usize, usize> = FxHashMap::default();
        for &v in &order {
            let mut best_v = 0;
            for u in self.predecessors(v) {
                let candidate = best[&u] + 1;
                if candidate > best_v {
                    best_v = candidate;
                    parent.insert(v, u);
                }
            }
            best.insert(v, best_v);
        }

        let mut end = order[0];
        for &v in &order {
            if best[&v] > best[&end] {
                end = v;
            }
        }

        let mut path = vec![end];
        let mut cursor = end;
        while let Some(&u) = parent.get(&cursor) {
            path.push(u);
            cursor = u;
        }
        path.reverse();
        Ok(path)
    }

    /// Length in edges of the longest path in the DAG.
    pub fn dag_longest_path_length(&self) -> IrResult<usize> {
        Ok(self.dag_longest_path()?.len().saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> Graph<(), ()> {
        let mut g = Graph::new();
        g.add_edge(5, 2, ());
        g.add_edge(5, 0, ());
        g.add_edge(4, 0, ());
        g.add_edge(4, 1, ());
        g.add_edge(2, 3, ());
        g.add_edge(3, 1, ());
        g
    }

    fn as_set(v: Vec<usize>) -> FxHashSet<usize> {
        v.into_iter().collect()
    }

    #[test]
    fn test_topological_sort() {
        let g = sample_graph();
        assert_eq!(g.topological_sort(false).unwrap(), vec![5, 4, 2, 3, 1, 0]);
        assert_eq!(g.topological_sort(true).unwrap(), vec![0, 1, 3, 2, 4, 5]);
    }

    #[test]
    fn test_cycle_detection() {
        let mut g: Graph<(), ()> = Graph::new();
        g.add_edge(0, 1, ());
        g.add_edge(1, 2, ());
        g.add_edge(2, 0, ());
        assert!(matches!(
            g.topological_sort(false),
            Err(IrError::Cycle { .. })
        ));
        assert!(g.dag_longest_path().is_err());
    }

    #[test]
    fn test_neighbors() {
        let g = sample_graph();
        assert_eq!(g.successors(5), vec![0, 2]);
        assert_eq!(g.successors(4), vec![0, 1]);
        assert_eq!(g.predecessors(0), vec![5, 4]);
        assert_eq!(g.predecessors(1), vec![4, 3]);
    }

    #[test]
    fn test_ancestors_descendants() {
        let g = sample_graph();
        assert_eq!(as_set(g.ancestors(1)), as_set(vec![3, 2, 5, 4]));
        assert_eq!(as_set(g.ancestors(3)), as_set(vec![2, 5]));
        assert_eq!(as_set(g.descendants(5)), as_set(vec![0, 2, 3, 1]));
        assert_eq!(as_set(g.descendants(2)), as_set(vec![3, 1]));
        assert!(g.descendants(1).is_empty());
    }

    #[test]
    fn test_weakly_connected_components() {
        let mut g: Graph<(), ()> = Graph::new();
        g.add_edge(1, 0, ());
        g.add_edge(2, 3, ());
        g.add_edge(3, 4, ());
        assert_eq!(g.number_weakly_connected_components(), 2);
    }

    #[test]
    fn test_longest_path() {
        let mut g: Graph<(), ()> = Graph::new();
        for (u, v) in [
            (0, 1),
            (0, 2),
            (1, 3),
            (1, 2),
            (2, 4),
            (2, 5),
            (2, 3),
            (3, 5),
            (3, 4),
            (4, 5),
        ] {
            g.add_edge(u, v, ());
        }
        assert_eq!(g.dag_longest_path().unwrap(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(g.dag_longest_path_length().unwrap(), 5);
    }

    #[test]
    fn test_longest_path_sample() {
        let g = sample_graph();
        assert_eq!(g.dag_longest_path().unwrap(), vec![5, 2, 3, 1]);
        assert_eq!(g.dag_longest_path_length().unwrap(), 3);
    }

    #[test]
    fn test_remove_vertex() {
        let mut g = sample_graph();
        assert!(g.remove_vertex(3).is_some());
        assert_eq!(g.num_vertices(), 5);
        assert_eq!(g.predecessors(1), vec![4]);
        assert_eq!(g.successors(2), Vec::<usize>::new());
        assert!(g.remove_vertex(3).is_none());
    }

    #[test]
    fn test_parallel_edges() {
        let mut g: Graph<(), u32> = Graph::new();
        g.add_edge(0, 1, 7);
        g.add_edge(0, 1, 8);
        assert_eq!(g.num_edges(), 2);
        assert_eq!(g.successors(0), vec![1]);
        assert_eq!(g.out_edges(0).len(), 2);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_toposort_is_a_linear_extension(
                edges in proptest::collection::vec((0usize..12, 0usize..12), 0..40),
            ) {
                // Keep only forward edges so the graph is acyclic by construction.
                let edges: Vec<(usize, usize)> =
                    edges.into_iter().filter(|(a, b)| a < b).collect();
                let mut g: Graph<(), ()> = Graph::new();
                for &(a, b) in &edges {
                    g.add_edge(a, b, ());
                }
                let order = g.topological_sort(false).unwrap();
                prop_assert_eq!(order.len(), g.num_vertices());
                let position: FxHashMap<usize, usize> =
                    order.into_iter().enumerate().map(|(i, v)| (v, i)).collect();
                for (a, b) in edges {
                    prop_assert!(position[&a] < position[&b]);
                }
            }
        }
    }
}
