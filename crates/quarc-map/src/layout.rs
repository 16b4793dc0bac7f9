//! Bidirectional assignment of circuit qubits to physical qubits.

use quarc_ir::RegBit;
use rustc_hash::FxHashMap;

/// Maps logical circuit qubits onto physical coupling-graph qubits.
///
/// Iteration follows insertion order, so the default layout enumerates
/// circuit qubits the way they were assigned.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    forward: FxHashMap<RegBit, RegBit>,
    reverse: FxHashMap<RegBit, RegBit>,
    order: Vec<RegBit>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `logical` to `physical`, displacing any previous pairing of
    /// either side.
    pub fn insert(&mut self, logical: RegBit, physical: RegBit) {
        if let Some(old_physical) = self.forward.remove(&logical) {
            self.reverse.remove(&old_physical);
        } else {
            self.order.push(logical.clone());
        }
        if let Some(old_logical) = self.reverse.remove(&physical) {
            self.forward.remove(&old_logical);
            self.order.retain(|q| *q != old_logical);
        }
        self.forward.insert(logical.clone(), physical.clone());
        self.reverse.insert(physical, logical);
    }

    /// Physical position of a logical qubit.
    pub fn get(&self, logical: &RegBit) -> Option<&RegBit> {
        self.forward.get(logical)
    }

    /// Logical qubit held at a physical position.
    pub fn logical(&self, physical: &RegBit) -> Option<&RegBit> {
        self.reverse.get(physical)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// (logical, physical) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&RegBit, &RegBit)> {
        self.order.iter().map(|q| (q, &self.forward[q]))
    }

    /// Exchange the contents of two physical positions. A position with
    /// no logical qubit simply receives the other's occupant.
    pub fn swap(&mut self, physical_a: &RegBit, physical_b: &RegBit) {
        let logical_a = self.reverse.get(physical_a).cloned();
        let logical_b = self.reverse.get(physical_b).cloned();
        if let Some(l) = &logical_a {
            self.forward.remove(l);
            self.reverse.remove(physical_a);
        }
        if let Some(l) = &logical_b {
            self.forward.remove(l);
            self.reverse.remove(physical_b);
        }
        if let Some(l) = logical_a {
            self.forward.insert(l.clone(), physical_b.clone());
            self.reverse.insert(physical_b.clone(), l);
        }
        if let Some(l) = logical_b {
            self.forward.insert(l.clone(), physical_a.clone());
            self.reverse.insert(physical_a.clone(), l);
        }
    }

    /// The logical-to-physical map, for QASM alias emission.
    pub fn as_alias_map(&self) -> FxHashMap<RegBit, RegBit> {
        self.forward.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(i: u32) -> RegBit {
        RegBit::new("q", i)
    }

    fn p(i: u32) -> RegBit {
        RegBit::new("p", i)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut layout = Layout::new();
        layout.insert(q(0), p(1));
        layout.insert(q(1), p(0));
        assert_eq!(layout.get(&q(0)), Some(&p(1)));
        assert_eq!(layout.logical(&p(0)), Some(&q(1)));
        assert_eq!(layout.len(), 2);
    }

    #[test]
    fn test_insert_displaces() {
        let mut layout = Layout::new();
        layout.insert(q(0), p(0));
        layout.insert(q(1), p(0));
        assert_eq!(layout.get(&q(0)), None);
        assert_eq!(layout.logical(&p(0)), Some(&q(1)));
        assert_eq!(layout.len(), 1);
    }

    #[test]
    fn test_iteration_order() {
        let mut layout = Layout::new();
        layout.insert(q(2), p(0));
        layout.insert(q(0), p(1));
        layout.insert(q(1), p(2));
        let logicals: Vec<u32> = layout.iter().map(|(l, _)| l.index).collect();
        assert_eq!(logicals, [2, 0, 1]);
    }

    #[test]
    fn test_swap() {
        let mut layout = Layout::new();
        layout.insert(q(0), p(0));
        layout.insert(q(1), p(1));
        layout.swap(&p(0), &p(1));
        assert_eq!(layout.get(&q(0)), Some(&p(1)));
        assert_eq!(layout.get(&q(1)), Some(&p(0)));
    }

    #[test]
    fn test_swap_with_empty_position() {
        let mut layout = Layout::new();
        layout.insert(q(0), p(0));
        layout.swap(&p(0), &p(1));
        assert_eq!(layout.get(&q(0)), Some(&p(1)));
        assert_eq!(layout.logical(&p(0)), None);
    }
}
