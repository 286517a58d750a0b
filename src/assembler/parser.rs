//! Turns the tokens of one line into a typed [`Line`]
//!
//! The grammar is line-oriented:
//!
//! ```text
//! line       ::= directive | label_only | [label_def] instruction
//! directive  ::= ('.blocks' | '.warps') number
//! instruction::= mnemonic operands
//! operands   ::= e                         halt
//!              | reg ',' reg ',' imm       arithmetic immediate
//!              | reg ',' reg ',' reg       register-register
//!              | reg ',' imm '(' reg ')'   load / store
//! ```
//!
//! Register-type and range checks run after the structure is parsed and
//! keep going past the first failure, so a line like `addi s5, s6, 0`
//! reports both offending registers at once.

use super::token::{self, Mnemonic, Register, RegisterKind, Token, TokenKind, TokenSpan};
use super::{Error, ErrorKind};
use crate::isa::{self, InstructionClass};

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub span: TokenSpan,
}

/// An immediate operand: a literal, or (arithmetic I-type only) a label
/// reference the encoder resolves PC-relative.
#[derive(Debug, Clone, PartialEq)]
pub enum Immediate {
    Literal(i32),
    Label(Label),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operands {
    /// Arithmetic immediates and loads
    Itype { rd: Register, rs1: Register, imm: Immediate },
    Rtype { rd: Register, rs1: Register, rs2: Register },
    /// Stores; `rs2` is the register written first in the source text
    /// (the address base), `rs1` the parenthesized one (the value).
    Stype { rs1: Register, rs2: Register, imm: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    JustLabel(Label),
    Blocks { number: u32, span: TokenSpan },
    Warps { number: u32, span: TokenSpan },
    Instruction {
        label: Option<Label>,
        mnemonic: Mnemonic,
        operands: Option<Operands>,
    },
}

/// Parse one line worth of tokens. On any error the line is dropped and
/// every error found on it is returned.
pub fn parse_line(tokens: &[Token], line_number: usize, line: &str) -> Result<Line, Vec<Error>> {
    LineParser {
        tokens,
        position: 0,
        line_number,
        line,
        errors: Vec::new(),
    }
    .parse()
}

/// Which side of an instruction a register sits on; cross-width opcodes
/// type-check the two sides differently.
#[derive(Clone, Copy, PartialEq)]
enum Role {
    Destination,
    Source,
}

struct LineParser<'a> {
    tokens: &'a [Token],
    position: usize,
    line_number: usize,
    line: &'a str,
    errors: Vec<Error>,
}

impl<'a> LineParser<'a> {
    fn parse(mut self) -> Result<Line, Vec<Error>> {
        match self.parse_inner() {
            Some(line) if self.errors.is_empty() => Ok(line),
            _ => Err(self.errors),
        }
    }

    fn parse_inner(&mut self) -> Option<Line> {
        let Some(first) = self.advance() else {
            self.report_at_end("a statement");
            return None;
        };
        match &first.kind {
            TokenKind::BlocksDirective => {
                let (number, span) = self.parse_directive(".blocks", first.span)?;
                Some(Line::Blocks { number, span })
            }
            TokenKind::WarpsDirective => {
                let (number, span) = self.parse_directive(".warps", first.span)?;
                Some(Line::Warps { number, span })
            }
            TokenKind::LabelDef(name) => {
                let label = Label { name: name.clone(), span: first.span };
                match self.advance() {
                    None => Some(Line::JustLabel(label)),
                    Some(token) => match token.kind {
                        TokenKind::Mnemonic(mnemonic) => {
                            self.parse_instruction(Some(label), mnemonic)
                        }
                        _ => {
                            self.report(token.span, ErrorKind::UnexpectedToken {
                                expected: "a mnemonic",
                                found: token::describe(&token.kind),
                            });
                            None
                        }
                    },
                }
            }
            TokenKind::Mnemonic(mnemonic) => self.parse_instruction(None, *mnemonic),
            TokenKind::LabelRef(name) => {
                self.report(first.span, ErrorKind::UnknownMnemonic(name.clone()));
                None
            }
            _ => {
                self.report(first.span, ErrorKind::UnexpectedToken {
                    expected: "a mnemonic, label or directive",
                    found: token::describe(&first.kind),
                });
                None
            }
        }
    }

    fn parse_directive(
        &mut self,
        directive: &'static str,
        span: TokenSpan,
    ) -> Option<(u32, TokenSpan)> {
        let (value, value_span) = self.expect_immediate()?;
        self.expect_end()?;
        if value < 1 {
            self.report(value_span, ErrorKind::InvalidDirectiveValue { directive, value });
            return None;
        }
        Some((value as u32, span))
    }

    fn parse_instruction(&mut self, label: Option<Label>, mnemonic: Mnemonic) -> Option<Line> {
        // (register, span, role) triples for the type checks below
        let mut registers: Vec<(Register, TokenSpan, Role)> = Vec::new();

        let operands = match mnemonic.opcode.class() {
            InstructionClass::Halt => {
                self.expect_end()?;
                None
            }
            InstructionClass::AluImmediate => {
                let (rd, rd_span) = self.expect_register()?;
                self.expect_comma()?;
                let (rs1, rs1_span) = self.expect_register()?;
                self.expect_comma()?;
                let (imm, imm_span) = self.expect_immediate_or_label()?;
                self.expect_end()?;
                registers.push((rd, rd_span, Role::Destination));
                registers.push((rs1, rs1_span, Role::Source));
                if let Immediate::Literal(value) = imm {
                    self.check_immediate(value, imm_span);
                }
                Some(Operands::Itype { rd, rs1, imm })
            }
            InstructionClass::AluRegister => {
                let (rd, rd_span) = self.expect_register()?;
                self.expect_comma()?;
                let (rs1, rs1_span) = self.expect_register()?;
                self.expect_comma()?;
                let (rs2, rs2_span) = self.expect_register()?;
                self.expect_end()?;
                registers.push((rd, rd_span, Role::Destination));
                registers.push((rs1, rs1_span, Role::Source));
                registers.push((rs2, rs2_span, Role::Source));
                Some(Operands::Rtype { rd, rs1, rs2 })
            }
            InstructionClass::Load => {
                let (rd, rd_span) = self.expect_register()?;
                self.expect_comma()?;
                let (imm, imm_span) = self.expect_immediate()?;
                self.expect_lparen()?;
                let (rs1, rs1_span) = self.expect_register()?;
                self.expect_rparen()?;
                self.expect_end()?;
                registers.push((rd, rd_span, Role::Destination));
                registers.push((rs1, rs1_span, Role::Source));
                self.check_immediate(imm, imm_span);
                Some(Operands::Itype { rd, rs1, imm: Immediate::Literal(imm) })
            }
            InstructionClass::Store => {
                let (rs2, rs2_span) = self.expect_register()?;
                self.expect_comma()?;
                let (imm, imm_span) = self.expect_immediate()?;
                self.expect_lparen()?;
                let (rs1, rs1_span) = self.expect_register()?;
                self.expect_rparen()?;
                self.expect_end()?;
                registers.push((rs2, rs2_span, Role::Source));
                registers.push((rs1, rs1_span, Role::Source));
                self.check_immediate(imm, imm_span);
                Some(Operands::Stype { rs1, rs2, imm })
            }
        };

        self.check_register_types(&mnemonic, &registers);

        if self.errors.is_empty() {
            Some(Line::Instruction { label, mnemonic, operands })
        } else {
            None
        }
    }

    fn check_register_types(&mut self, mnemonic: &Mnemonic, registers: &[(Register, TokenSpan, Role)]) {
        for (register, span, role) in registers {
            let expected = if mnemonic.opcode.is_cross() {
                match role {
                    Role::Destination => RegisterKind::Scalar,
                    Role::Source => RegisterKind::Vector,
                }
            } else if mnemonic.scalar {
                RegisterKind::Scalar
            } else {
                RegisterKind::Vector
            };
            if register.kind != expected {
                self.report(*span, ErrorKind::RegisterTypeMismatch {
                    register: register.to_string(),
                    expected: expected.name(),
                });
                continue;
            }
            // x0-x3 hold zero, thread id, block id and block size; only
            // arithmetic destinations are rejected here, because a load's
            // destination is rerouted to the scalar file whenever the
            // scalar bit ends up set on the encoded word.
            let arithmetic = !matches!(
                mnemonic.opcode.class(),
                InstructionClass::Load | InstructionClass::Store
            );
            if arithmetic
                && *role == Role::Destination
                && register.kind == RegisterKind::Vector
                && register.number <= 3
            {
                self.report(*span, ErrorKind::ReservedRegister(register.number));
            }
        }
    }

    fn check_immediate(&mut self, value: i32, span: TokenSpan) {
        if !(isa::IMM_MIN..=isa::IMM_MAX).contains(&value) {
            self.report(span, ErrorKind::ImmediateOutOfRange(value));
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    fn end_span(&self) -> TokenSpan {
        TokenSpan::new(self.line.len(), self.line.len() + 1)
    }

    fn report(&mut self, span: TokenSpan, kind: ErrorKind) {
        self.errors.push(Error::new(kind, span, self.line_number, self.line));
    }

    fn report_at_end(&mut self, expected: &'static str) {
        let span = self.end_span();
        self.report(span, ErrorKind::UnexpectedEnd { expected });
    }

    fn expect_register(&mut self) -> Option<(Register, TokenSpan)> {
        match self.advance() {
            Some(token) => match token.kind {
                TokenKind::Register(register) => Some((register, token.span)),
                _ => {
                    self.report(token.span, ErrorKind::UnexpectedToken {
                        expected: "a register",
                        found: token::describe(&token.kind),
                    });
                    None
                }
            },
            None => {
                self.report_at_end("a register");
                None
            }
        }
    }

    fn expect_immediate(&mut self) -> Option<(i32, TokenSpan)> {
        match self.advance() {
            Some(token) => match token.kind {
                TokenKind::Immediate(value) => Some((value, token.span)),
                _ => {
                    self.report(token.span, ErrorKind::UnexpectedToken {
                        expected: "a number",
                        found: token::describe(&token.kind),
                    });
                    None
                }
            },
            None => {
                self.report_at_end("a number");
                None
            }
        }
    }

    fn expect_immediate_or_label(&mut self) -> Option<(Immediate, TokenSpan)> {
        match self.advance() {
            Some(token) => match &token.kind {
                TokenKind::Immediate(value) => Some((Immediate::Literal(*value), token.span)),
                TokenKind::LabelRef(name) => Some((
                    Immediate::Label(Label { name: name.clone(), span: token.span }),
                    token.span,
                )),
                _ => {
                    self.report(token.span, ErrorKind::UnexpectedToken {
                        expected: "a number or label",
                        found: token::describe(&token.kind),
                    });
                    None
                }
            },
            None => {
                self.report_at_end("a number or label");
                None
            }
        }
    }

    fn expect_punct(&mut self, kind: TokenKind, expected: &'static str) -> Option<()> {
        match self.advance() {
            Some(token) if token.kind == kind => Some(()),
            Some(token) => {
                self.report(token.span, ErrorKind::UnexpectedToken {
                    expected,
                    found: token::describe(&token.kind),
                });
                None
            }
            None => {
                self.report_at_end(expected);
                None
            }
        }
    }

    fn expect_comma(&mut self) -> Option<()> {
        self.expect_punct(TokenKind::Comma, "\",\"")
    }

    fn expect_lparen(&mut self) -> Option<()> {
        self.expect_punct(TokenKind::LParen, "\"(\"")
    }

    fn expect_rparen(&mut self) -> Option<()> {
        self.expect_punct(TokenKind::RParen, "\")\"")
    }

    fn expect_end(&mut self) -> Option<()> {
        match self.peek() {
            None => Some(()),
            Some(token) => {
                self.report(token.span, ErrorKind::UnexpectedToken {
                    expected: "end of line",
                    found: token::describe(&token.kind),
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer;
    use super::*;
    use crate::isa::Opcode;

    fn parse(line: &str) -> Result<Line, Vec<Error>> {
        let tokens = lexer::lex(line, 1).expect("line should lex");
        parse_line(&tokens, 1, line)
    }

    fn parse_errors(line: &str) -> Vec<ErrorKind> {
        parse(line)
            .expect_err("line should not parse")
            .into_iter()
            .map(|error| error.kind)
            .collect()
    }

    #[test]
    fn arithmetic_immediate() {
        let line = parse("addi x5, x1, -3").unwrap();
        assert_eq!(line, Line::Instruction {
            label: None,
            mnemonic: Mnemonic { opcode: Opcode::Addi, scalar: false },
            operands: Some(Operands::Itype {
                rd: Register::vector(5),
                rs1: Register::vector(1),
                imm: Immediate::Literal(-3),
            }),
        });
    }

    #[test]
    fn register_register() {
        let line = parse("add x7, x6, x5").unwrap();
        assert_eq!(line, Line::Instruction {
            label: None,
            mnemonic: Mnemonic { opcode: Opcode::Add, scalar: false },
            operands: Some(Operands::Rtype {
                rd: Register::vector(7),
                rs1: Register::vector(6),
                rs2: Register::vector(5),
            }),
        });
    }

    #[test]
    fn load_and_store_shapes() {
        let line = parse("lw x6, 8(x1)").unwrap();
        assert_eq!(line, Line::Instruction {
            label: None,
            mnemonic: Mnemonic { opcode: Opcode::Lw, scalar: false },
            operands: Some(Operands::Itype {
                rd: Register::vector(6),
                rs1: Register::vector(1),
                imm: Immediate::Literal(8),
            }),
        });

        // the first register of a store is rs2, the address base
        let line = parse("sw x5, 0(x1)").unwrap();
        assert_eq!(line, Line::Instruction {
            label: None,
            mnemonic: Mnemonic { opcode: Opcode::Sw, scalar: false },
            operands: Some(Operands::Stype {
                rs1: Register::vector(1),
                rs2: Register::vector(5),
                imm: 0,
            }),
        });
    }

    #[test]
    fn halt_takes_no_operands() {
        let line = parse("halt").unwrap();
        assert_eq!(line, Line::Instruction {
            label: None,
            mnemonic: Mnemonic { opcode: Opcode::Halt, scalar: false },
            operands: None,
        });
        assert!(matches!(
            parse_errors("halt x5")[0],
            ErrorKind::UnexpectedToken { expected: "end of line", .. }
        ));
    }

    #[test]
    fn labels() {
        let line = parse("loop:").unwrap();
        assert!(matches!(line, Line::JustLabel(ref label) if label.name == "loop"));

        let line = parse("loop: halt").unwrap();
        assert!(matches!(
            line,
            Line::Instruction { label: Some(ref label), .. } if label.name == "loop"
        ));
    }

    #[test]
    fn label_reference_as_immediate() {
        let line = parse("addi x5, x1, target").unwrap();
        let Line::Instruction { operands: Some(Operands::Itype { imm, .. }), .. } = line else {
            panic!("expected an I-type instruction");
        };
        assert!(matches!(imm, Immediate::Label(ref label) if label.name == "target"));
    }

    #[test]
    fn directives() {
        assert!(matches!(parse(".blocks 2"), Ok(Line::Blocks { number: 2, .. })));
        assert!(matches!(parse(".warps 1"), Ok(Line::Warps { number: 1, .. })));
        assert!(matches!(
            parse_errors(".blocks 0")[0],
            ErrorKind::InvalidDirectiveValue { directive: ".blocks", value: 0 }
        ));
        assert!(matches!(
            parse_errors(".warps 0")[0],
            ErrorKind::InvalidDirectiveValue { directive: ".warps", value: 0 }
        ));
        assert!(matches!(
            parse_errors(".warps 1 x5")[0],
            ErrorKind::UnexpectedToken { expected: "end of line", .. }
        ));
    }

    #[test]
    fn register_type_enforcement() {
        let errors = parse_errors("addi s5, x1, 0");
        assert_eq!(errors, vec![ErrorKind::RegisterTypeMismatch {
            register: "s5".to_string(),
            expected: "vector",
        }]);

        // both wrong registers are reported, not just the first
        let errors = parse_errors("addi s5, s6, 0");
        assert_eq!(errors.len(), 2);

        let errors = parse_errors("s_add s4, x6, s7");
        assert_eq!(errors, vec![ErrorKind::RegisterTypeMismatch {
            register: "x6".to_string(),
            expected: "scalar",
        }]);
    }

    #[test]
    fn cross_width_rules() {
        assert!(parse("sx_slti s1, x5, 5").is_ok());
        assert!(parse("sx_slt s1, x5, x6").is_ok());

        let errors = parse_errors("sx_slti x1, x5, 5");
        assert_eq!(errors, vec![ErrorKind::RegisterTypeMismatch {
            register: "x1".to_string(),
            expected: "scalar",
        }]);

        let errors = parse_errors("sx_slt s1, s5, x6");
        assert_eq!(errors, vec![ErrorKind::RegisterTypeMismatch {
            register: "s5".to_string(),
            expected: "vector",
        }]);
    }

    #[test]
    fn pc_is_not_an_operand() {
        let errors = parse_errors("add x5, pc, x6");
        assert_eq!(errors, vec![ErrorKind::RegisterTypeMismatch {
            register: "pc".to_string(),
            expected: "vector",
        }]);
    }

    #[test]
    fn reserved_destinations() {
        assert_eq!(parse_errors("addi x2, x5, 0"), vec![ErrorKind::ReservedRegister(2)]);
        assert_eq!(parse_errors("add x0, x5, x6"), vec![ErrorKind::ReservedRegister(0)]);
        // reads are fine
        assert!(parse("addi x5, x1, 0").is_ok());
        // load destinations are exempt (the scalar bit reroutes them)
        assert!(parse("lw x1, 0(x0)").is_ok());
        // scalar destinations are not reserved
        assert!(parse("sx_slti s1, x5, 5").is_ok());
    }

    #[test]
    fn immediate_range() {
        assert!(parse("addi x5, x1, 2047").is_ok());
        assert!(parse("addi x5, x1, -2048").is_ok());
        assert_eq!(parse_errors("addi x5, x1, 2048"), vec![ErrorKind::ImmediateOutOfRange(2048)]);
        assert_eq!(parse_errors("sw x5, -2049(x1)"), vec![ErrorKind::ImmediateOutOfRange(-2049)]);
    }

    #[test]
    fn structural_errors() {
        assert!(matches!(
            parse_errors("addi x5, x1")[0],
            ErrorKind::UnexpectedEnd { expected: "\",\"" }
        ));
        assert!(matches!(
            parse_errors("addi x5, x1,")[0],
            ErrorKind::UnexpectedEnd { expected: "a number or label" }
        ));
        assert!(matches!(
            parse_errors("lw x6, 0 x1")[0],
            ErrorKind::UnexpectedToken { expected: "\"(\"", .. }
        ));
        assert!(matches!(
            parse_errors("unknown_op x5, x1, 0")[0],
            ErrorKind::UnknownMnemonic(_)
        ));
        assert!(matches!(
            parse_errors("loop: 5")[0],
            ErrorKind::UnexpectedToken { expected: "a mnemonic", .. }
        ));
    }
}
