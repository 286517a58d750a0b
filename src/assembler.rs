//! Converts SIMT assembly into 32-bit instruction words in a two-pass manner
//!
//! Each line is lexed and parsed on its own; the first encoding pass then
//! resolves labels into a symbol table and the second emits the words.
//!
//! Comments start with a semicolon (`;`) and continue to the end of the
//! line, both on their own and after a statement. Mnemonics, register
//! names and directives are case-insensitive; labels are case-sensitive
//! and are defined with a colon:
//!
//! ```ignore
//! .blocks 2
//! .warps  4
//! loop:
//!     addi    x5, x1, 0   ; x1 holds the thread id
//!     lw      x6, 0(x1)
//!     sw      x5, 4(x1)
//!     sx_slt  s1, x5, x6
//!     halt
//! ```
//!
//! The assembler supports the following instructions, each in a vector
//! form (`x` registers, one value per thread) and a scalar form spelled
//! with an `s_` prefix (`s` registers, one value per warp):
//! - ADDI, SLTI, XORI, ORI, ANDI, SLLI, SRLI, SRAI: `op rd, rs1, imm`
//! - ADD, SUB, SLL, SLT, XOR, SRL, SRA, OR, AND: `op rd, rs1, rs2`
//! - LB, LH, LW: `op rd, imm(rs1)` loads from `rs1 + imm`
//! - SB, SH, SW: `op rs2, imm(rs1)` stores the value of `rs1` at `rs2 + imm`
//! - SX_SLTI, SX_SLT: compare per thread, pack the result bits into a
//!   scalar register (`sx_slt s1, x5, x6`); writing s1 narrows the warp's
//!   execution mask
//! - HALT: retire the warp
//!
//! Directives:
//! - .BLOCKS n: number of blocks to launch (default 1)
//! - .WARPS n: warps per block (default 1)
//!
//! Both directives must appear before the first instruction, at most once.
//! Vector registers x0-x3 are read-only (zero, thread id, block id and
//! block size) and are rejected as arithmetic destinations.

pub mod encoder;
pub mod lexer;
pub mod numbers;
pub mod parser;
pub mod token;

use std::fmt;

use colored::Colorize;

use encoder::Program;
use numbers::NumberError;
use parser::Line;
use token::TokenSpan;

/// A parsed line together with where it came from, kept for error
/// reporting during encoding.
#[derive(Debug, Clone)]
pub struct Statement {
    pub line: Line,
    pub number: usize,
    pub text: String,
}

impl Statement {
    pub(crate) fn error(&self, span: TokenSpan, kind: ErrorKind) -> Error {
        Error::new(kind, span, self.number, &self.text)
    }
}

/// Assemble source code into a [`Program`].
///
/// The lexer and parser collect every error they can find before giving
/// up; the encoder stops at the first.
pub fn assemble(source: &str) -> Result<Program, Vec<Error>> {
    let mut statements = Vec::new();
    let mut errors = Vec::new();

    for (index, text) in source.lines().enumerate() {
        let number = index + 1;
        let tokens = match lexer::lex(text, number) {
            Ok(tokens) => tokens,
            Err(mut line_errors) => {
                errors.append(&mut line_errors);
                continue;
            }
        };
        if tokens.is_empty() {
            continue;
        }
        match parser::parse_line(&tokens, number, text) {
            Ok(line) => statements.push(Statement {
                line,
                number,
                text: text.to_string(),
            }),
            Err(mut line_errors) => errors.append(&mut line_errors),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    encoder::encode(&statements).map_err(|error| vec![error])
}

/// An error that can occur during the assembly process
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub span: TokenSpan,
    pub line_number: usize,
    pub line: String,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, span: TokenSpan, line_number: usize, line: &str) -> Error {
        Error {
            kind,
            span,
            line_number,
            line: line.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// A `.something` that is neither `.blocks` nor `.warps`
    UnknownDirective(String),
    /// A lexeme that fits no token class
    MalformedToken(String),
    /// A register index outside 0..32
    InvalidRegisterNumber(i32),
    /// A broken number literal
    Number(NumberError),
    /// A line starting with something that is not in the mnemonic table
    UnknownMnemonic(String),
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    /// An operand register from the wrong register file
    RegisterTypeMismatch {
        register: String,
        expected: &'static str,
    },
    /// An arithmetic destination naming x0-x3
    ReservedRegister(i32),
    ImmediateOutOfRange(i32),
    InvalidDirectiveValue {
        directive: &'static str,
        value: i32,
    },
    DuplicateLabel(String),
    UnresolvedLabel(String),
    DirectiveAfterInstruction(&'static str),
    DuplicateDirective(&'static str),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnknownDirective(directive) => {
                write!(f, "unknown directive \"{}\"", directive)
            }
            ErrorKind::MalformedToken(token) => write!(f, "malformed token \"{}\"", token),
            ErrorKind::InvalidRegisterNumber(number) => {
                write!(f, "register number {} out of range (0-31)", number)
            }
            ErrorKind::Number(error) => write!(f, "{}", error),
            ErrorKind::UnknownMnemonic(name) => write!(f, "unknown mnemonic \"{}\"", name),
            ErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "unexpected token, expected {}, got {}", expected, found)
            }
            ErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of line, expected {}", expected)
            }
            ErrorKind::RegisterTypeMismatch { register, expected } => {
                write!(f, "register \"{}\" has the wrong type, expected a {} register", register, expected)
            }
            ErrorKind::ReservedRegister(number) => {
                write!(
                    f,
                    "x{} is read-only (x0-x3 hold zero, thread id, block id and block size)",
                    number
                )
            }
            ErrorKind::ImmediateOutOfRange(value) => {
                write!(f, "immediate {} does not fit in 12 bits (-2048 to 2047)", value)
            }
            ErrorKind::InvalidDirectiveValue { directive, value } => {
                write!(f, "{} expects a value of at least 1, got {}", directive, value)
            }
            ErrorKind::DuplicateLabel(label) => write!(f, "duplicate label \"{}\"", label),
            ErrorKind::UnresolvedLabel(label) => write!(f, "unresolved label \"{}\"", label),
            ErrorKind::DirectiveAfterInstruction(directive) => {
                write!(f, "{} must appear before the first instruction", directive)
            }
            ErrorKind::DuplicateDirective(directive) => {
                write!(f, "{} may appear at most once", directive)
            }
        }
    }
}

impl std::error::Error for Error {}

fn underline_span(line: &str, span: TokenSpan) -> String {
    let mut underline = vec![' '; line.len()];
    for i in span.start()..span.end() {
        if i < underline.len() {
            underline[i] = '^';
        }
    }
    underline.into_iter().collect()
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:{}: {}", self.line_number, self.span.column(), self.kind)?;
        write!(f, "{}\t{}", self.line_number, self.line)?;
        if self.span.start() < self.line.len() {
            writeln!(f)?;
            write!(f, "\t{}", underline_span(&self.line, self.span).green())?;
        }
        Ok(())
    }
}
