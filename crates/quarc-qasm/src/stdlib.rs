//! The standard gate library, spliced in for `include "qelib1.inc";`.

use crate::ast::Statement;
use crate::error::ParseResult;
use crate::parser::parse;

/// Definitions of the standard gates on top of the `U`/`CX` primitives.
pub const STANDARD_GATES: &str = r"gate u3(theta,phi,lambda) q { U(theta,phi,lambda) q; }
gate u2(phi,lambda) q { U(pi/2,phi,lambda) q; }
gate u1(lambda) q { U(0,0,lambda) q; }
gate cx c,t { CX c,t; }
gate id a { U(0,0,0) a; }
gate x a { u3(pi,0,pi) a; }
gate y a { u3(pi,pi/2,pi/2) a; }
gate z a { u1(pi) a; }
gate h a { u2(0,pi) a; }
gate s a { u1(pi/2) a; }
gate sdg a { u1(-pi/2) a; }
gate t a { u1(pi/4) a; }
gate tdg a { u1(-pi/4) a; }
gate rx(theta) a { u3(theta,-pi/2,pi/2) a; }
gate ry(theta) a { u3(theta,0,0) a; }
gate rz(phi) a { u1(phi) a; }
gate swap a,b { cx a,b; cx b,a; cx a,b; }
";

/// Name and (parameter, qubit) arity of each standard gate, in
/// definition order. The parser registers these when it sees the
/// include directive so call sites can be checked before the unroller
/// splices the definitions in.
pub(crate) const STANDARD_GATE_ARITIES: &[(&str, usize, usize)] = &[
    ("u3", 3, 1),
    ("u2", 2, 1),
    ("u1", 1, 1),
    ("cx", 0, 2),
    ("id", 0, 1),
    ("x", 0, 1),
    ("y", 0, 1),
    ("z", 0, 1),
    ("h", 0, 1),
    ("s", 0, 1),
    ("sdg", 0, 1),
    ("t", 0, 1),
    ("tdg", 0, 1),
    ("rx", 1, 1),
    ("ry", 1, 1),
    ("rz", 1, 1),
    ("swap", 0, 2),
];

/// Parse the standard library into gate-definition statements.
pub(crate) fn standard_gate_statements() -> ParseResult<Vec<Statement>> {
    let program = parse(&format!("OPENQASM 2.0;\n{STANDARD_GATES}"))?;
    Ok(program.statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdlib_parses() {
        let statements = standard_gate_statements().unwrap();
        assert_eq!(statements.len(), 17);
        assert!(statements
            .iter()
            .all(|s| matches!(s, Statement::GateDef { .. })));
    }

    #[test]
    fn test_arity_table_matches_definitions() {
        let statements = standard_gate_statements().unwrap();
        assert_eq!(statements.len(), STANDARD_GATE_ARITIES.len());
        for (statement, &(name, params, qubits)) in statements.iter().zip(STANDARD_GATE_ARITIES) {
            let Statement::GateDef {
                name: def_name,
                params: def_params,
                qubits: def_qubits,
                ..
            } = statement
            else {
                panic!("expected gate definition");
            };
            assert_eq!(def_name, name);
            assert_eq!(def_params.len(), params);
            assert_eq!(def_qubits.len(), qubits);
        }
    }
}
