//! Registers and register bits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a register holds qubits or classical bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterKind {
    /// A quantum register (`qreg`).
    Quantum,
    /// A classical register (`creg`).
    Classical,
}

/// A named, sized register of qubits or classical bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    /// Register name.
    pub name: String,
    /// Number of bits in the register.
    pub size: u32,
    /// Quantum or classical.
    pub kind: RegisterKind,
}

impl Register {
    /// Create a quantum register.
    pub fn quantum(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            size,
            kind: RegisterKind::Quantum,
        }
    }

    /// Create a classical register.
    pub fn classical(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            size,
            kind: RegisterKind::Classical,
        }
    }

    /// Iterate the bits of this register in index order.
    pub fn bits(&self) -> impl Iterator<Item = RegBit> + '_ {
        (0..self.size).map(|i| RegBit::new(&self.name, i))
    }
}

/// One bit of a register: a `(register name, index)` pair.
///
/// Used as the wire identity throughout the DAG circuit and as the key
/// type of layouts and coupling graphs. Equality and hashing follow the
/// `(name, index)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegBit {
    /// Name of the register this bit belongs to.
    pub register: String,
    /// Index within the register.
    pub index: u32,
}

impl RegBit {
    /// Create a register bit.
    pub fn new(register: impl Into<String>, index: u32) -> Self {
        Self {
            register: register.into(),
            index,
        }
    }
}

impl fmt::Display for RegBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.register, self.index)
    }
}

impl From<(&str, u32)> for RegBit {
    fn from((register, index): (&str, u32)) -> Self {
        RegBit::new(register, index)
    }
}
