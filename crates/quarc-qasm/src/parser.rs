//! Recursive-descent parser for the `OpenQASM` 2.0 dialect.
//!
//! Single pass with bounded lookahead. Register declarations, gate-call
//! arity, argument kinds, and index ranges are validated during the
//! parse so that every error carries a source line.

use crate::ast::{Argument, BinOp, Expression, GateCall, MathFn, Program, Statement};
use crate::error::{ParseError, ParseResult};
use crate::lexer::{tokenize, SpannedToken, Token};
use rustc_hash::FxHashMap;

/// Parse QASM source text into a [`Program`].
pub fn parse(source: &str) -> ParseResult<Program> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_program()
}

/// Arity of a defined gate: parameters, qubits.
#[derive(Debug, Clone, Copy)]
struct GateArity {
    params: usize,
    qubits: usize,
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    qregs: FxHashMap<String, u32>,
    cregs: FxHashMap<String, u32>,
    gates: FxHashMap<String, GateArity>,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            qregs: FxHashMap::default(),
            cregs: FxHashMap::default(),
            gates: FxHashMap::default(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map_or(0, |t| t.line)
    }

    fn advance(&mut self) -> ParseResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|t| t.token.clone())
            .ok_or_else(|| ParseError::UnexpectedEof("statement".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self, expected: &str, found: &Token) -> ParseError {
        ParseError::UnexpectedToken {
            line: self.line(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    fn expect(&mut self, token: &Token) -> ParseResult<()> {
        let found = self.advance()?;
        if &found == token {
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string(), &found))
        }
    }

    fn consume(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.advance()? {
            Token::Identifier(name) => Ok(name),
            found => Err(self.unexpected("identifier", &found)),
        }
    }

    fn expect_int(&mut self) -> ParseResult<u64> {
        match self.advance()? {
            Token::IntLiteral(v) => Ok(v),
            found => Err(self.unexpected("integer", &found)),
        }
    }

    fn parse_program(mut self) -> ParseResult<Program> {
        self.expect(&Token::OpenQasm)?;
        let version = match self.advance()? {
            Token::RealLiteral(v) if (v - 2.0).abs() < f64::EPSILON => "2.0".to_string(),
            found => return Err(ParseError::InvalidVersion(found.to_string())),
        };
        self.expect(&Token::Semicolon)?;

        let mut statements = Vec::new();
        while self.peek().is_some() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program {
            version,
            statements,
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.advance()? {
            Token::Include => {
                let path = match self.advance()? {
                    Token::StringLiteral(path) => path,
                    found => return Err(self.unexpected("string literal", &found)),
                };
                self.expect(&Token::Semicolon)?;
                // The library body is spliced in at unroll time; the
                // call checker still needs its signatures.
                if path == "qelib1.inc" {
                    for &(name, params, qubits) in crate::stdlib::STANDARD_GATE_ARITIES {
                        self.gates
                            .entry(name.to_string())
                            .or_insert(GateArity { params, qubits });
                    }
                }
                Ok(Statement::Include(path))
            }
            Token::QReg => self.parse_register_decl(true),
            Token::CReg => self.parse_register_decl(false),
            Token::Gate => self.parse_gate_def(),
            Token::Opaque => self.parse_opaque(),
            Token::If => self.parse_if(),
            Token::Measure => {
                let qubit = self.parse_argument()?;
                self.expect(&Token::Arrow)?;
                let bit = self.parse_argument()?;
                self.expect(&Token::Semicolon)?;
                self.check_argument(&qubit, true, "measure")?;
                self.check_argument(&bit, false, "measure")?;
                Ok(Statement::Measure { qubit, bit })
            }
            Token::Reset => {
                let qubit = self.parse_argument()?;
                self.expect(&Token::Semicolon)?;
                self.check_argument(&qubit, true, "reset")?;
                Ok(Statement::Reset { qubit })
            }
            Token::Barrier => {
                let qubits = self.parse_argument_list()?;
                self.expect(&Token::Semicolon)?;
                for q in &qubits {
                    self.check_argument(q, true, "barrier")?;
                }
                Ok(Statement::Barrier { qubits })
            }
            Token::GateU => self.parse_gate_call("U".to_string()),
            Token::GateCX => self.parse_gate_call("CX".to_string()),
            Token::Identifier(name) => self.parse_gate_call(name),
            found => Err(self.unexpected("statement", &found)),
        }
    }

    fn parse_register_decl(&mut self, quantum: bool) -> ParseResult<Statement> {
        let name = self.expect_identifier()?;
        self.expect(&Token::LBracket)?;
        let raw = self.expect_int()?;
        let size = u32::try_from(raw).map_err(|_| ParseError::InvalidRegisterSize {
            name: name.clone(),
            size: raw,
        })?;
        self.expect(&Token::RBracket)?;
        self.expect(&Token::Semicolon)?;

        if self.qregs.contains_key(&name) || self.cregs.contains_key(&name) {
            return Err(ParseError::RegisterRedeclaration(name));
        }
        if quantum {
            self.qregs.insert(name.clone(), size);
            Ok(Statement::QRegDecl { name, size })
        } else {
            self.cregs.insert(name.clone(), size);
            Ok(Statement::CRegDecl { name, size })
        }
    }

    fn parse_id_list(&mut self) -> ParseResult<Vec<String>> {
        let mut names = vec![self.expect_identifier()?];
        while self.consume(&Token::Comma) {
            names.push(self.expect_identifier()?);
        }
        Ok(names)
    }

    fn parse_gate_def(&mut self) -> ParseResult<Statement> {
        let name = self.expect_identifier()?;
        let params = if self.consume(&Token::LParen) {
            let params = if self.peek() == Some(&Token::RParen) {
                Vec::new()
            } else {
                self.parse_id_list()?
            };
            self.expect(&Token::RParen)?;
            params
        } else {
            Vec::new()
        };
        let qubits = self.parse_id_list()?;
        self.expect(&Token::LBrace)?;

        let mut body = Vec::new();
        while self.peek() != Some(&Token::RBrace) {
            body.push(self.parse_body_statement(&name, &params, &qubits)?);
        }
        self.expect(&Token::RBrace)?;

        if self.gates.contains_key(&name) {
            return Err(ParseError::GateRedefinition(name));
        }
        self.gates.insert(
            name.clone(),
            GateArity {
                params: params.len(),
                qubits: qubits.len(),
            },
        );
        Ok(Statement::GateDef {
            name,
            params,
            qubits,
            body,
        })
    }

    fn parse_opaque(&mut self) -> ParseResult<Statement> {
        let name = self.expect_identifier()?;
        let params = if self.consume(&Token::LParen) {
            let params = if self.peek() == Some(&Token::RParen) {
                Vec::new()
            } else {
                self.parse_id_list()?
            };
            self.expect(&Token::RParen)?;
            params
        } else {
            Vec::new()
        };
        let qubits = self.parse_id_list()?;
        self.expect(&Token::Semicolon)?;

        self.gates.insert(
            name.clone(),
            GateArity {
                params: params.len(),
                qubits: qubits.len(),
            },
        );
        Ok(Statement::Opaque {
            name,
            params,
            qubits,
        })
    }

    /// A statement inside a gate body: gate calls over the formal qubits,
    /// or barriers.
    fn parse_body_statement(
        &mut self,
        gate: &str,
        formal_params: &[String],
        formal_qubits: &[String],
    ) -> ParseResult<Statement> {
        let name = match self.advance()? {
            Token::Barrier => {
                let args = self.parse_id_list()?;
                self.expect(&Token::Semicolon)?;
                let qubits = args
                    .into_iter()
                    .map(|a| self.check_formal_qubit(a, formal_qubits))
                    .collect::<ParseResult<Vec<_>>>()?;
                return Ok(Statement::Barrier { qubits });
            }
            Token::GateU => "U".to_string(),
            Token::GateCX => "CX".to_string(),
            Token::Identifier(name) => name,
            found => return Err(self.unexpected("gate call", &found)),
        };

        let params = self.parse_call_params()?;
        for param in &params {
            check_identifiers(param, formal_params)?;
        }
        let args = self.parse_id_list()?;
        self.expect(&Token::Semicolon)?;
        let qubits = args
            .into_iter()
            .map(|a| self.check_formal_qubit(a, formal_qubits))
            .collect::<ParseResult<Vec<_>>>()?;

        self.check_arity(&name, params.len(), qubits.len())?;
        let _ = gate;
        Ok(Statement::Gate(GateCall {
            name,
            params,
            qubits,
        }))
    }

    fn check_formal_qubit(
        &self,
        name: String,
        formal_qubits: &[String],
    ) -> ParseResult<Argument> {
        if formal_qubits.contains(&name) {
            Ok(Argument::Register(name))
        } else {
            Err(ParseError::UndeclaredRegister(name))
        }
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::LParen)?;
        let register = self.expect_identifier()?;
        self.expect(&Token::EqEq)?;
        let value = self.expect_int()?;
        self.expect(&Token::RParen)?;
        if !self.cregs.contains_key(&register) {
            return Err(ParseError::UndeclaredRegister(register));
        }
        let body = self.parse_statement()?;
        match body {
            Statement::Gate(_) | Statement::Measure { .. } | Statement::Reset { .. } => {
                Ok(Statement::If {
                    register,
                    value,
                    body: Box::new(body),
                })
            }
            other => Err(ParseError::UnexpectedToken {
                line: self.line(),
                expected: "quantum operation after if(...)".to_string(),
                found: other.qasm(6),
            }),
        }
    }

    fn parse_call_params(&mut self) -> ParseResult<Vec<Expression>> {
        if !self.consume(&Token::LParen) {
            return Ok(Vec::new());
        }
        if self.consume(&Token::RParen) {
            return Ok(Vec::new());
        }
        let mut params = vec![self.parse_expression()?];
        while self.consume(&Token::Comma) {
            params.push(self.parse_expression()?);
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    fn parse_gate_call(&mut self, name: String) -> ParseResult<Statement> {
        let params = self.parse_call_params()?;
        // Top-level parameters must be constant.
        for param in &params {
            check_identifiers(param, &[])?;
        }
        let qubits = self.parse_argument_list()?;
        self.expect(&Token::Semicolon)?;

        self.check_arity(&name, params.len(), qubits.len())?;
        for q in &qubits {
            self.check_argument(q, true, &name)?;
        }
        Ok(Statement::Gate(GateCall {
            name,
            params,
            qubits,
        }))
    }

    fn check_arity(&self, name: &str, params: usize, qubits: usize) -> ParseResult<()> {
        let arity = match name {
            "U" => GateArity {
                params: 3,
                qubits: 1,
            },
            "CX" => GateArity {
                params: 0,
                qubits: 2,
            },
            _ => *self
                .gates
                .get(name)
                .ok_or_else(|| ParseError::UndefinedGate(name.to_string()))?,
        };
        if arity.params != params {
            return Err(ParseError::WrongParameterCount {
                gate: name.to_string(),
                expected: arity.params,
                got: params,
            });
        }
        if arity.qubits != qubits {
            return Err(ParseError::WrongQubitCount {
                gate: name.to_string(),
                expected: arity.qubits,
                got: qubits,
            });
        }
        Ok(())
    }

    fn parse_argument_list(&mut self) -> ParseResult<Vec<Argument>> {
        let mut args = vec![self.parse_argument()?];
        while self.consume(&Token::Comma) {
            args.push(self.parse_argument()?);
        }
        Ok(args)
    }

    fn parse_argument(&mut self) -> ParseResult<Argument> {
        let register = self.expect_identifier()?;
        if self.consume(&Token::LBracket) {
            let index = u32::try_from(self.expect_int()?).map_err(|_| {
                ParseError::IndexOutOfBounds {
                    register: register.clone(),
                    index: u32::MAX,
                    size: 0,
                }
            })?;
            self.expect(&Token::RBracket)?;
            Ok(Argument::Bit { register, index })
        } else {
            Ok(Argument::Register(register))
        }
    }

    fn check_argument(&self, arg: &Argument, quantum: bool, context: &str) -> ParseResult<()> {
        let name = arg.register_name();
        let (table, kind) = if quantum {
            (&self.qregs, "quantum")
        } else {
            (&self.cregs, "classical")
        };
        let Some(&size) = table.get(name) else {
            // Declared, but of the wrong kind?
            let other = if quantum { &self.cregs } else { &self.qregs };
            if other.contains_key(name) {
                return Err(ParseError::WrongRegisterKind {
                    argument: name.to_string(),
                    context: context.to_string(),
                    expected: kind.to_string(),
                });
            }
            return Err(ParseError::UndeclaredRegister(name.to_string()));
        };
        if let Argument::Bit { index, .. } = arg {
            if *index >= size {
                return Err(ParseError::IndexOutOfBounds {
                    register: name.to_string(),
                    index: *index,
                    size,
                });
            }
        }
        Ok(())
    }

    // Expression grammar: additive < multiplicative < unary < power.
    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expression::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_factor()?;
            left = Expression::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> ParseResult<Expression> {
        if self.consume(&Token::Minus) {
            return Ok(Expression::Neg(Box::new(self.parse_factor()?)));
        }
        if self.consume(&Token::Plus) {
            return self.parse_factor();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> ParseResult<Expression> {
        let base = self.parse_atom()?;
        if self.consume(&Token::Caret) {
            // Right associative.
            let exponent = self.parse_factor()?;
            return Ok(Expression::BinOp {
                left: Box::new(base),
                op: BinOp::Pow,
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> ParseResult<Expression> {
        match self.advance()? {
            Token::IntLiteral(v) => {
                let v = i64::try_from(v).map_err(|_| {
                    ParseError::UnexpectedEof("integer literal out of range".to_string())
                })?;
                Ok(Expression::Int(v))
            }
            Token::RealLiteral(v) => Ok(Expression::Real(v)),
            Token::Pi => Ok(Expression::Pi),
            Token::Identifier(name) => {
                if let Some(func) = MathFn::from_name(&name) {
                    if self.consume(&Token::LParen) {
                        let arg = self.parse_expression()?;
                        self.expect(&Token::RParen)?;
                        return Ok(Expression::FnCall {
                            func,
                            arg: Box::new(arg),
                        });
                    }
                }
                Ok(Expression::Identifier(name))
            }
            Token::LParen => {
                let inner = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            found => Err(self.unexpected("expression", &found)),
        }
    }
}

/// Reject expression identifiers outside the allowed formal parameters.
fn check_identifiers(expr: &Expression, allowed: &[String]) -> ParseResult<()> {
    match expr {
        Expression::Identifier(name) => {
            if allowed.contains(name) {
                Ok(())
            } else {
                Err(ParseError::UnboundParameter(name.clone()))
            }
        }
        Expression::Neg(inner) | Expression::FnCall { arg: inner, .. } => {
            check_identifiers(inner, allowed)
        }
        Expression::BinOp { left, right, .. } => {
            check_identifiers(left, allowed)?;
            check_identifiers(right, allowed)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELL: &str = r#"OPENQASM 2.0;
gate u2(phi,lambda) q { U(pi/2,phi,lambda) q; }
gate h a { u2(0,pi) a; }
gate cx c,t { CX c,t; }
qreg q[2];
creg c[2];
h q[0];
cx q[0],q[1];
measure q[0] -> c[0];
measure q[1] -> c[1];
"#;

    #[test]
    fn test_parse_bell() {
        let program = parse(BELL).unwrap();
        assert_eq!(program.version, "2.0");
        assert_eq!(program.statements.len(), 9);
        let calls: Vec<_> = program
            .statements
            .iter()
            .filter(|s| matches!(s, Statement::Gate(_)))
            .collect();
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn test_include_registers_standard_gates() {
        let source =
            "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\nh q[0];\ncx q[0],q[1];\n";
        let program = parse(source).unwrap();
        assert!(matches!(program.statements[0], Statement::Include(_)));
        assert_eq!(program.statements.len(), 4);
    }

    #[test]
    fn test_include_then_redefinition_rejected() {
        let source = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\ngate h a { U(0,0,0) a; }\n";
        assert!(matches!(parse(source), Err(ParseError::GateRedefinition(_))));
    }

    #[test]
    fn test_other_include_provides_no_gates() {
        let source = "OPENQASM 2.0;\ninclude \"other.inc\";\nqreg q[1];\nh q[0];\n";
        assert!(matches!(parse(source), Err(ParseError::UndefinedGate(_))));
    }

    #[test]
    fn test_register_redeclaration() {
        let source = "OPENQASM 2.0;\nqreg q[2];\ncreg q[2];\n";
        assert!(matches!(
            parse(source),
            Err(ParseError::RegisterRedeclaration(_))
        ));
    }

    #[test]
    fn test_gate_redefinition() {
        let source = "OPENQASM 2.0;\ngate g a { U(0,0,0) a; }\ngate g a,b { CX a,b; }\n";
        assert!(matches!(parse(source), Err(ParseError::GateRedefinition(_))));
    }

    #[test]
    fn test_undefined_gate() {
        let source = "OPENQASM 2.0;\nqreg q[1];\nh q[0];\n";
        assert!(matches!(parse(source), Err(ParseError::UndefinedGate(_))));
    }

    #[test]
    fn test_arity_mismatch() {
        let source = "OPENQASM 2.0;\nqreg q[2];\nU(0,0) q[0];\n";
        assert!(matches!(
            parse(source),
            Err(ParseError::WrongParameterCount { .. })
        ));
        let source = "OPENQASM 2.0;\nqreg q[2];\nCX q[0];\n";
        assert!(matches!(
            parse(source),
            Err(ParseError::WrongQubitCount { .. })
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let source = "OPENQASM 2.0;\nqreg q[2];\nU(0,0,0) q[5];\n";
        assert!(matches!(
            parse(source),
            Err(ParseError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_undeclared_register() {
        let source = "OPENQASM 2.0;\nqreg q[1];\nU(0,0,0) r[0];\n";
        assert!(matches!(
            parse(source),
            Err(ParseError::UndeclaredRegister(_))
        ));
    }

    #[test]
    fn test_measure_kind_check() {
        let source = "OPENQASM 2.0;\nqreg q[1];\ncreg c[1];\nmeasure c[0] -> q[0];\n";
        assert!(matches!(
            parse(source),
            Err(ParseError::WrongRegisterKind { .. })
        ));
    }

    #[test]
    fn test_conditioned_call() {
        let source = "OPENQASM 2.0;\ngate x a { U(pi,0,pi) a; }\nqreg q[1];\ncreg c[1];\nif(c==1) x q[0];\n";
        let program = parse(source).unwrap();
        let Statement::If {
            register, value, ..
        } = program.statements.last().unwrap()
        else {
            panic!("expected if statement");
        };
        assert_eq!(register, "c");
        assert_eq!(*value, 1);
    }

    #[test]
    fn test_unbound_parameter_at_top_level() {
        let source = "OPENQASM 2.0;\nqreg q[1];\nU(theta,0,0) q[0];\n";
        assert!(matches!(
            parse(source),
            Err(ParseError::UnboundParameter(_))
        ));
    }

    #[test]
    fn test_gate_body_qubit_check() {
        let source = "OPENQASM 2.0;\ngate h a { U(0,0,0) b; }\n";
        assert!(matches!(
            parse(source),
            Err(ParseError::UndeclaredRegister(_))
        ));
    }

    #[test]
    fn test_expression_precedence() {
        let source = "OPENQASM 2.0;\nqreg q[1];\nU(1+2*3,2^2^3,-pi/2) q[0];\n";
        let program = parse(source).unwrap();
        let Statement::Gate(call) = program.statements.last().unwrap() else {
            panic!("expected gate call");
        };
        assert!((call.params[0].real(&[]).unwrap().value() - 7.0).abs() < 1e-12);
        assert!((call.params[1].real(&[]).unwrap().value() - 256.0).abs() < 1e-12);
        assert!(
            (call.params[2].real(&[]).unwrap().value() + std::f64::consts::PI / 2.0).abs() < 1e-12
        );
    }

    #[test]
    fn test_external_functions() {
        let source = "OPENQASM 2.0;\nqreg q[1];\nU(sin(pi/2),cos(0),sqrt(4)) q[0];\n";
        let program = parse(source).unwrap();
        let Statement::Gate(call) = program.statements.last().unwrap() else {
            panic!("expected gate call");
        };
        assert!((call.params[0].real(&[]).unwrap().value() - 1.0).abs() < 1e-12);
        assert!((call.params[1].real(&[]).unwrap().value() - 1.0).abs() < 1e-12);
        assert!((call.params[2].real(&[]).unwrap().value() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_roundtrip_emission() {
        let program = parse(BELL).unwrap();
        let emitted = program.qasm(6);
        let reparsed = parse(&emitted).unwrap();
        assert_eq!(program.statements.len(), reparsed.statements.len());
    }
}
