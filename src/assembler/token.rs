//! Token types produced by the lexer

use crate::isa::{self, Opcode};
use std::fmt;

/// A span of text in the source line. Used to neatly underline errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    start: usize,
    end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> TokenSpan {
        TokenSpan { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// 1-based column of the first character
    pub fn column(&self) -> usize {
        self.start + 1
    }
}

/// Which register file an operand addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// 32 per-thread values, `x0`..`x31`
    Vector,
    /// One value shared across the warp, `s0`..`s31`
    Scalar,
    /// The program counter, read-only
    Pc,
}

impl RegisterKind {
    pub fn name(self) -> &'static str {
        match self {
            RegisterKind::Vector => "vector",
            RegisterKind::Scalar => "scalar",
            RegisterKind::Pc => "pc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub kind: RegisterKind,
    pub number: i32,
}

impl Register {
    pub fn vector(number: i32) -> Register {
        Register { kind: RegisterKind::Vector, number }
    }

    pub fn scalar(number: i32) -> Register {
        Register { kind: RegisterKind::Scalar, number }
    }

    /// The `number` field is meaningless for the program counter and is
    /// always zero.
    pub fn pc() -> Register {
        Register { kind: RegisterKind::Pc, number: 0 }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RegisterKind::Vector => write!(f, "x{}", self.number),
            RegisterKind::Scalar => write!(f, "s{}", self.number),
            RegisterKind::Pc => write!(f, "pc"),
        }
    }
}

/// A mnemonic as written in the source: the opcode plus whether the
/// scalar-form spelling (`s_` prefix) was used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mnemonic {
    pub opcode: Opcode,
    pub scalar: bool,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scalar {
            write!(f, "s_{}", self.opcode.name())
        } else {
            write!(f, "{}", self.opcode.name())
        }
    }
}

/// Look a lexeme up in the mnemonic table, case-insensitively.
///
/// `s_addi` etc. select the scalar form; `halt` and the cross-width
/// `sx_*` opcodes have no scalar spelling.
pub fn lookup_mnemonic(text: &str) -> Option<Mnemonic> {
    let lower = text.to_ascii_lowercase();
    let (name, scalar) = match lower.strip_prefix("s_") {
        Some(rest) => (rest, true),
        None => (lower.as_str(), false),
    };
    let opcode = match name {
        "addi" => Opcode::Addi,
        "slti" => Opcode::Slti,
        "xori" => Opcode::Xori,
        "ori" => Opcode::Ori,
        "andi" => Opcode::Andi,
        "slli" => Opcode::Slli,
        "srli" => Opcode::Srli,
        "srai" => Opcode::Srai,
        "sx_slti" => Opcode::SxSlti,
        "add" => Opcode::Add,
        "sub" => Opcode::Sub,
        "sll" => Opcode::Sll,
        "slt" => Opcode::Slt,
        "xor" => Opcode::Xor,
        "srl" => Opcode::Srl,
        "sra" => Opcode::Sra,
        "or" => Opcode::Or,
        "and" => Opcode::And,
        "sx_slt" => Opcode::SxSlt,
        "lb" => Opcode::Lb,
        "lh" => Opcode::Lh,
        "lw" => Opcode::Lw,
        "sb" => Opcode::Sb,
        "sh" => Opcode::Sh,
        "sw" => Opcode::Sw,
        "halt" => Opcode::Halt,
        _ => return None,
    };
    if scalar && !opcode.has_scalar_form() {
        return None;
    }
    Some(Mnemonic { opcode, scalar })
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Mnemonic(Mnemonic),
    Register(Register),
    Immediate(i32),
    LabelDef(String),
    LabelRef(String),
    Comma,
    LParen,
    RParen,
    BlocksDirective,
    WarpsDirective,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TokenSpan,
}

/// Describe a token for "expected X, got Y" messages
pub fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Mnemonic(mnemonic) => format!("mnemonic \"{}\"", mnemonic),
        TokenKind::Register(register) => format!("register \"{}\"", register),
        TokenKind::Immediate(value) => format!("immediate {}", value),
        TokenKind::LabelDef(name) => format!("label definition \"{}:\"", name),
        TokenKind::LabelRef(name) => format!("\"{}\"", name),
        TokenKind::Comma => "\",\"".to_string(),
        TokenKind::LParen => "\"(\"".to_string(),
        TokenKind::RParen => "\")\"".to_string(),
        TokenKind::BlocksDirective => "\".blocks\"".to_string(),
        TokenKind::WarpsDirective => "\".warps\"".to_string(),
    }
}

/// Upper bound (exclusive) for register numbers
pub const REGISTER_COUNT: i32 = isa::NUM_REGISTERS as i32;
