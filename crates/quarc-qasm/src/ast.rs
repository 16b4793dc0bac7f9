//! Abstract syntax tree for the `OpenQASM` 2.0 dialect.
//!
//! Every node can re-emit itself as QASM text at a chosen decimal
//! precision, and expression nodes evaluate to a [`SymbolicValue`] given
//! a scope chain of parameter bindings.

use crate::error::{ParseError, ParseResult};
use quarc_ir::SymbolicValue;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parameter binding scope; chains are searched innermost-last.
pub type Scope = FxHashMap<String, SymbolicValue>;

/// A complete QASM program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// QASM version (always "2.0" for this dialect).
    pub version: String,
    /// Statements in source order.
    pub statements: Vec<Statement>,
}

impl Program {
    /// Re-emit the program as QASM text.
    pub fn qasm(&self, precision: usize) -> String {
        let mut out = format!("OPENQASM {};\n", self.version);
        for statement in &self.statements {
            out.push_str(&statement.qasm(precision));
            out.push('\n');
        }
        out
    }
}

/// A statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    /// Include directive; recorded and otherwise ignored.
    Include(String),

    /// Quantum register declaration: `qreg name[size];`
    QRegDecl { name: String, size: u32 },

    /// Classical register declaration: `creg name[size];`
    CRegDecl { name: String, size: u32 },

    /// Gate definition with formal parameter and qubit lists.
    GateDef {
        name: String,
        params: Vec<String>,
        qubits: Vec<String>,
        body: Vec<Statement>,
    },

    /// Opaque gate declaration (signature only, no body).
    Opaque {
        name: String,
        params: Vec<String>,
        qubits: Vec<String>,
    },

    /// Gate application.
    Gate(GateCall),

    /// Measurement: `measure q -> c;`
    Measure { qubit: Argument, bit: Argument },

    /// Reset: `reset q;`
    Reset { qubit: Argument },

    /// Barrier: `barrier q, r[0];`
    Barrier { qubits: Vec<Argument> },

    /// Conditioned statement: `if(creg==value) <statement>`
    If {
        register: String,
        value: u64,
        body: Box<Statement>,
    },
}

impl Statement {
    /// Re-emit this statement as QASM text.
    pub fn qasm(&self, precision: usize) -> String {
        match self {
            Statement::Include(path) => format!("include \"{path}\";"),
            Statement::QRegDecl { name, size } => format!("qreg {name}[{size}];"),
            Statement::CRegDecl { name, size } => format!("creg {name}[{size}];"),
            Statement::GateDef {
                name,
                params,
                qubits,
                body,
            } => {
                let params = if params.is_empty() {
                    String::new()
                } else {
                    format!("({})", params.join(","))
                };
                let body: Vec<String> = body.iter().map(|s| s.qasm(precision)).collect();
                format!(
                    "gate {name}{params} {} {{ {} }}",
                    qubits.join(","),
                    body.join(" ")
                )
            }
            Statement::Opaque {
                name,
                params,
                qubits,
            } => {
                let params = if params.is_empty() {
                    String::new()
                } else {
                    format!("({})", params.join(","))
                };
                format!("opaque {name}{params} {};", qubits.join(","))
            }
            Statement::Gate(call) => call.qasm(precision),
            Statement::Measure { qubit, bit } => format!("measure {qubit} -> {bit};"),
            Statement::Reset { qubit } => format!("reset {qubit};"),
            Statement::Barrier { qubits } => {
                let args: Vec<String> = qubits.iter().map(ToString::to_string).collect();
                format!("barrier {};", args.join(","))
            }
            Statement::If {
                register,
                value,
                body,
            } => format!("if({register}=={value}) {}", body.qasm(precision)),
        }
    }
}

/// A gate call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCall {
    /// Gate name (`U` and `CX` are the built-in primitives).
    pub name: String,
    /// Parameter expressions.
    pub params: Vec<Expression>,
    /// Qubit arguments.
    pub qubits: Vec<Argument>,
}

impl GateCall {
    /// Re-emit this call as QASM text.
    pub fn qasm(&self, precision: usize) -> String {
        let params = if self.params.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = self.params.iter().map(|p| p.qasm(precision)).collect();
            format!("({})", parts.join(","))
        };
        let args: Vec<String> = self.qubits.iter().map(ToString::to_string).collect();
        format!("{}{params} {};", self.name, args.join(","))
    }
}

/// A register argument: a whole register or one indexed bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Argument {
    /// Entire register: `q`.
    Register(String),
    /// One bit: `q[i]`.
    Bit { register: String, index: u32 },
}

impl Argument {
    /// The register name of this argument.
    pub fn register_name(&self) -> &str {
        match self {
            Argument::Register(name) => name,
            Argument::Bit { register, .. } => register,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Register(name) => write!(f, "{name}"),
            Argument::Bit { register, index } => write!(f, "{register}[{index}]"),
        }
    }
}

/// Built-in external real functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathFn {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
}

impl MathFn {
    /// Look up a function by its QASM name.
    pub fn from_name(name: &str) -> Option<MathFn> {
        match name {
            "sin" => Some(MathFn::Sin),
            "cos" => Some(MathFn::Cos),
            "tan" => Some(MathFn::Tan),
            "exp" => Some(MathFn::Exp),
            "ln" => Some(MathFn::Ln),
            "sqrt" => Some(MathFn::Sqrt),
            _ => None,
        }
    }

    /// The QASM name of this function.
    pub fn name(self) -> &'static str {
        match self {
            MathFn::Sin => "sin",
            MathFn::Cos => "cos",
            MathFn::Tan => "tan",
            MathFn::Exp => "exp",
            MathFn::Ln => "ln",
            MathFn::Sqrt => "sqrt",
        }
    }

    fn apply(self, value: SymbolicValue) -> SymbolicValue {
        match self {
            MathFn::Sin => value.sin(),
            MathFn::Cos => value.cos(),
            MathFn::Tan => value.tan(),
            MathFn::Exp => value.exp(),
            MathFn::Ln => value.ln(),
            MathFn::Sqrt => value.sqrt(),
        }
    }
}

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
            BinOp::Pow => 3,
        }
    }
}

/// An expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expression {
    /// Integer literal.
    Int(i64),
    /// Real literal.
    Real(f64),
    /// π.
    Pi,
    /// Formal parameter reference.
    Identifier(String),
    /// Unary negation.
    Neg(Box<Expression>),
    /// Binary operation.
    BinOp {
        left: Box<Expression>,
        op: BinOp,
        right: Box<Expression>,
    },
    /// External function call: `sin(expr)` etc.
    FnCall { func: MathFn, arg: Box<Expression> },
}

impl Expression {
    /// Evaluate against a scope chain; innermost scope is last and is
    /// searched first.
    #[allow(clippy::cast_precision_loss)]
    pub fn real(&self, scopes: &[Scope]) -> ParseResult<SymbolicValue> {
        match self {
            Expression::Int(v) => Ok(SymbolicValue::new(*v as f64)),
            Expression::Real(v) => Ok(SymbolicValue::new(*v)),
            Expression::Pi => Ok(SymbolicValue::pi()),
            Expression::Identifier(name) => scopes
                .iter()
                .rev()
                .find_map(|scope| scope.get(name).copied())
                .ok_or_else(|| ParseError::UnboundParameter(name.clone())),
            Expression::Neg(inner) => Ok(-inner.real(scopes)?),
            Expression::BinOp { left, op, right } => {
                let l = left.real(scopes)?;
                let r = right.real(scopes)?;
                Ok(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                    BinOp::Pow => l.pow(r),
                })
            }
            Expression::FnCall { func, arg } => Ok(func.apply(arg.real(scopes)?)),
        }
    }

    /// Re-emit this expression as QASM text.
    pub fn qasm(&self, precision: usize) -> String {
        self.qasm_prec(precision, 0)
    }

    fn qasm_prec(&self, precision: usize, parent: u8) -> String {
        match self {
            Expression::Int(v) => format!("{v}"),
            Expression::Real(v) => SymbolicValue::new(*v).qasm(precision),
            Expression::Pi => "pi".to_string(),
            Expression::Identifier(name) => name.clone(),
            Expression::Neg(inner) => {
                let text = format!("-{}", inner.qasm_prec(precision, 4));
                if parent > 0 {
                    format!("({text})")
                } else {
                    text
                }
            }
            Expression::BinOp { left, op, right } => {
                let prec = op.precedence();
                let text = format!(
                    "{}{}{}",
                    left.qasm_prec(precision, prec),
                    op.symbol(),
                    right.qasm_prec(precision, prec + 1)
                );
                if prec < parent {
                    format!("({text})")
                } else {
                    text
                }
            }
            Expression::FnCall { func, arg } => {
                format!("{}({})", func.name(), arg.qasm_prec(precision, 0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_expression_eval() {
        let expr = Expression::BinOp {
            left: Box::new(Expression::Pi),
            op: BinOp::Div,
            right: Box::new(Expression::Int(2)),
        };
        let value = expr.real(&[]).unwrap();
        assert!((value.value() - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_scope_chain_shadowing() {
        let mut outer = Scope::default();
        outer.insert("theta".to_string(), SymbolicValue::new(1.0));
        let mut inner = Scope::default();
        inner.insert("theta".to_string(), SymbolicValue::new(2.0));

        let expr = Expression::Identifier("theta".to_string());
        let value = expr.real(&[outer, inner]).unwrap();
        assert_eq!(value.value(), 2.0);
    }

    #[test]
    fn test_unbound_parameter() {
        let expr = Expression::Identifier("phi".to_string());
        assert!(matches!(
            expr.real(&[]),
            Err(ParseError::UnboundParameter(_))
        ));
    }

    #[test]
    fn test_fn_call_eval() {
        let expr = Expression::FnCall {
            func: MathFn::Cos,
            arg: Box::new(Expression::Pi),
        };
        assert!((expr.real(&[]).unwrap().value() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_expression_emission_precedence() {
        // (1+2)*3 keeps its parentheses, 1+2*3 does not gain any.
        let sum = Expression::BinOp {
            left: Box::new(Expression::Int(1)),
            op: BinOp::Add,
            right: Box::new(Expression::Int(2)),
        };
        let grouped = Expression::BinOp {
            left: Box::new(sum.clone()),
            op: BinOp::Mul,
            right: Box::new(Expression::Int(3)),
        };
        assert_eq!(grouped.qasm(6), "(1+2)*3");

        let flat = Expression::BinOp {
            left: Box::new(Expression::Int(1)),
            op: BinOp::Add,
            right: Box::new(Expression::BinOp {
                left: Box::new(Expression::Int(2)),
                op: BinOp::Mul,
                right: Box::new(Expression::Int(3)),
            }),
        };
        assert_eq!(flat.qasm(6), "1+2*3");
    }

    #[test]
    fn test_statement_emission() {
        let call = Statement::Gate(GateCall {
            name: "rx".to_string(),
            params: vec![Expression::BinOp {
                left: Box::new(Expression::Pi),
                op: BinOp::Div,
                right: Box::new(Expression::Int(2)),
            }],
            qubits: vec![Argument::Bit {
                register: "q".to_string(),
                index: 0,
            }],
        });
        assert_eq!(call.qasm(6), "rx(pi/2) q[0];");

        let cond = Statement::If {
            register: "c".to_string(),
            value: 1,
            body: Box::new(call),
        };
        assert_eq!(cond.qasm(6), "if(c==1) rx(pi/2) q[0];");
    }
}
