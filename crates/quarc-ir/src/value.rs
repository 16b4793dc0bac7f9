//! Symbolic real values for gate angles.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A real value used for gate parameters.
///
/// Representation is exact (a plain `f64`); comparisons made by consuming
/// algorithms are epsilon-bounded via [`SymbolicValue::close_to`]. The QASM
/// emission prints common multiples of π symbolically so that optimizer
/// output stays readable and round-trips through the parser.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SymbolicValue(f64);

/// Tolerance for recognizing π fractions during emission.
const PI_MATCH_EPS: f64 = 1e-10;

impl SymbolicValue {
    /// Zero.
    pub const ZERO: SymbolicValue = SymbolicValue(0.0);

    /// Create a value.
    pub fn new(value: f64) -> Self {
        SymbolicValue(value)
    }

    /// π.
    pub fn pi() -> Self {
        SymbolicValue(PI)
    }

    /// The underlying floating-point value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Approximate equality within `eps`.
    pub fn close_to(self, other: SymbolicValue, eps: f64) -> bool {
        (self.0 - other.0).abs() < eps
    }

    /// Sine.
    pub fn sin(self) -> Self {
        SymbolicValue(self.0.sin())
    }

    /// Cosine.
    pub fn cos(self) -> Self {
        SymbolicValue(self.0.cos())
    }

    /// Tangent.
    pub fn tan(self) -> Self {
        SymbolicValue(self.0.tan())
    }

    /// Natural exponential.
    pub fn exp(self) -> Self {
        SymbolicValue(self.0.exp())
    }

    /// Natural logarithm.
    pub fn ln(self) -> Self {
        SymbolicValue(self.0.ln())
    }

    /// Square root.
    pub fn sqrt(self) -> Self {
        SymbolicValue(self.0.sqrt())
    }

    /// Raise to a power.
    pub fn pow(self, exponent: SymbolicValue) -> Self {
        SymbolicValue(self.0.powf(exponent.0))
    }

    /// Emit as QASM text at the given decimal precision.
    ///
    /// Common π fractions are printed symbolically (`pi`, `-pi/2`, ...);
    /// anything else is a decimal literal with `precision` fractional
    /// digits.
    pub fn qasm(self, precision: usize) -> String {
        let v = self.0;
        let fractions: [(f64, &str); 8] = [
            (PI, "pi"),
            (-PI, "-pi"),
            (PI / 2.0, "pi/2"),
            (-PI / 2.0, "-pi/2"),
            (PI / 4.0, "pi/4"),
            (-PI / 4.0, "-pi/4"),
            (2.0 * PI, "2*pi"),
            (-2.0 * PI, "-2*pi"),
        ];
        for (value, text) in fractions {
            if (v - value).abs() < PI_MATCH_EPS {
                return text.to_string();
            }
        }
        if v == 0.0 {
            return "0".to_string();
        }
        format!("{v:.precision$}")
    }
}

impl From<f64> for SymbolicValue {
    fn from(value: f64) -> Self {
        SymbolicValue(value)
    }
}

impl fmt::Display for SymbolicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for SymbolicValue {
    type Output = SymbolicValue;
    fn add(self, rhs: SymbolicValue) -> SymbolicValue {
        SymbolicValue(self.0 + rhs.0)
    }
}

impl Sub for SymbolicValue {
    type Output = SymbolicValue;
    fn sub(self, rhs: SymbolicValue) -> SymbolicValue {
        SymbolicValue(self.0 - rhs.0)
    }
}

impl Mul for SymbolicValue {
    type Output = SymbolicValue;
    fn mul(self, rhs: SymbolicValue) -> SymbolicValue {
        SymbolicValue(self.0 * rhs.0)
    }
}

impl Div for SymbolicValue {
    type Output = SymbolicValue;
    fn div(self, rhs: SymbolicValue) -> SymbolicValue {
        SymbolicValue(self.0 / rhs.0)
    }
}

impl Neg for SymbolicValue {
    type Output = SymbolicValue;
    fn neg(self) -> SymbolicValue {
        SymbolicValue(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = SymbolicValue::new(1.5);
        let b = SymbolicValue::new(0.5);
        assert_eq!((a + b).value(), 2.0);
        assert_eq!((a - b).value(), 1.0);
        assert_eq!((a * b).value(), 0.75);
        assert_eq!((a / b).value(), 3.0);
        assert_eq!((-a).value(), -1.5);
    }

    #[test]
    fn test_qasm_pi_fractions() {
        assert_eq!(SymbolicValue::pi().qasm(15), "pi");
        assert_eq!(SymbolicValue::new(-PI / 2.0).qasm(15), "-pi/2");
        assert_eq!(SymbolicValue::new(PI / 4.0).qasm(15), "pi/4");
        assert_eq!(SymbolicValue::new(2.0 * PI).qasm(15), "2*pi");
        assert_eq!(SymbolicValue::ZERO.qasm(15), "0");
    }

    #[test]
    fn test_qasm_decimal() {
        assert_eq!(SymbolicValue::new(0.5).qasm(6), "0.500000");
        assert_eq!(SymbolicValue::new(-1.25).qasm(2), "-1.25");
    }

    #[test]
    fn test_close_to() {
        let a = SymbolicValue::new(1.0);
        let b = SymbolicValue::new(1.0 + 1e-12);
        assert!(a.close_to(b, 1e-9));
        assert!(!a.close_to(SymbolicValue::new(1.1), 1e-9));
    }

    #[test]
    fn test_trig() {
        let v = SymbolicValue::new(PI / 2.0);
        assert!((v.sin().value() - 1.0).abs() < 1e-12);
        assert!(v.cos().value().abs() < 1e-12);
    }
}
