//! Lowers parsed lines into instruction words and the kernel config
//!
//! The first pass walks the statements assigning a PC (a word index) to
//! every instruction and recording label definitions. The second pass
//! folds the `.blocks`/`.warps` directives into the kernel config and
//! packs each instruction, resolving label immediates PC-relative.
//! Unlike the lexer and parser, the encoder stops at the first error.

use std::collections::HashMap;

use super::parser::{Immediate, Line, Operands};
use super::{Error, ErrorKind, Statement};
use crate::isa;

/// A symbol table is a mapping of labels to their instruction addresses
pub type SymbolTable = HashMap<String, u32>;

/// Launch parameters handed to the device over the kernel-config bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub num_blocks: u32,
    pub num_warps_per_block: u32,
    pub base_instructions_addr: u32,
    pub base_data_addr: u32,
}

impl Default for KernelConfig {
    fn default() -> KernelConfig {
        KernelConfig {
            num_blocks: 1,
            num_warps_per_block: 1,
            base_instructions_addr: 0,
            base_data_addr: 0,
        }
    }
}

/// The assembler's output: the instruction stream and the kernel config
/// derived from the directives.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub instructions: Vec<u32>,
    pub config: KernelConfig,
}

pub fn encode(statements: &[Statement]) -> Result<Program, Error> {
    let symbols = first_pass(statements)?;
    second_pass(statements, &symbols)
}

fn first_pass(statements: &[Statement]) -> Result<SymbolTable, Error> {
    let mut symbols = SymbolTable::new();
    let mut pc: u32 = 0;
    for statement in statements {
        let label = match &statement.line {
            Line::JustLabel(label) => Some(label),
            Line::Instruction { label, .. } => label.as_ref(),
            _ => None,
        };
        if let Some(label) = label {
            if symbols.insert(label.name.clone(), pc).is_some() {
                return Err(statement.error(label.span, ErrorKind::DuplicateLabel(label.name.clone())));
            }
        }
        if matches!(statement.line, Line::Instruction { .. }) {
            pc += 1;
        }
    }
    Ok(symbols)
}

fn second_pass(statements: &[Statement], symbols: &SymbolTable) -> Result<Program, Error> {
    let mut instructions = Vec::new();
    let mut config = KernelConfig::default();
    let mut seen_blocks = false;
    let mut seen_warps = false;

    for statement in statements {
        match &statement.line {
            Line::JustLabel(_) => {}
            Line::Blocks { number, span } => {
                if !instructions.is_empty() {
                    return Err(statement.error(*span, ErrorKind::DirectiveAfterInstruction(".blocks")));
                }
                if seen_blocks {
                    return Err(statement.error(*span, ErrorKind::DuplicateDirective(".blocks")));
                }
                seen_blocks = true;
                config.num_blocks = *number;
            }
            Line::Warps { number, span } => {
                if !instructions.is_empty() {
                    return Err(statement.error(*span, ErrorKind::DirectiveAfterInstruction(".warps")));
                }
                if seen_warps {
                    return Err(statement.error(*span, ErrorKind::DuplicateDirective(".warps")));
                }
                seen_warps = true;
                config.num_warps_per_block = *number;
            }
            Line::Instruction { mnemonic, operands, .. } => {
                let pc = instructions.len() as u32;
                let opcode = mnemonic.opcode;
                let word = match operands {
                    None => opcode.bits(),
                    Some(Operands::Itype { rd, rs1, imm }) => {
                        let imm = resolve_immediate(statement, imm, pc, symbols)?;
                        isa::encode_itype(
                            opcode,
                            mnemonic.scalar,
                            rd.number as u32,
                            rs1.number as u32,
                            imm,
                        )
                    }
                    Some(Operands::Rtype { rd, rs1, rs2 }) => isa::encode_rtype(
                        opcode,
                        mnemonic.scalar,
                        rd.number as u32,
                        rs1.number as u32,
                        rs2.number as u32,
                    ),
                    Some(Operands::Stype { rs1, rs2, imm }) => isa::encode_stype(
                        opcode,
                        mnemonic.scalar,
                        rs1.number as u32,
                        rs2.number as u32,
                        *imm,
                    ),
                };
                instructions.push(word);
            }
        }
    }

    Ok(Program { instructions, config })
}

/// Literals were range-checked by the parser; label references resolve to
/// the distance from the current instruction and are checked here.
fn resolve_immediate(
    statement: &Statement,
    imm: &Immediate,
    pc: u32,
    symbols: &SymbolTable,
) -> Result<i32, Error> {
    match imm {
        Immediate::Literal(value) => Ok(*value),
        Immediate::Label(label) => {
            let target = symbols
                .get(&label.name)
                .copied()
                .ok_or_else(|| statement.error(label.span, ErrorKind::UnresolvedLabel(label.name.clone())))?;
            let offset = target as i64 - pc as i64;
            if offset < isa::IMM_MIN as i64 || offset > isa::IMM_MAX as i64 {
                return Err(statement.error(label.span, ErrorKind::ImmediateOutOfRange(offset as i32)));
            }
            Ok(offset as i32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::assemble;
    use super::*;
    use crate::isa::{Opcode, SCALAR_FLAG};

    fn encode_source(source: &str) -> Result<Program, Vec<Error>> {
        assemble(source)
    }

    fn words(source: &str) -> Vec<u32> {
        encode_source(source).expect("program should assemble").instructions
    }

    fn first_error(source: &str) -> ErrorKind {
        let mut errors = encode_source(source).expect_err("program should not assemble");
        errors.remove(0).kind
    }

    #[test]
    fn packs_each_class() {
        assert_eq!(words("addi x5, x1, 7"), vec![0x0070_1281]);
        assert_eq!(
            words("add x7, x6, x5"),
            vec![Opcode::Add.bits() | 7 << 7 | 6 << 12 | 5 << 17]
        );
        assert_eq!(
            words("lw x6, 4(x1)"),
            vec![Opcode::Lw.bits() | 6 << 7 | 1 << 12 | 4 << 20]
        );
        // stores pack the first register (the address base) in the rd slot
        assert_eq!(
            words("sw x5, 4(x1)"),
            vec![Opcode::Sw.bits() | 5 << 7 | 1 << 12 | 4 << 20]
        );
        assert_eq!(words("halt"), vec![Opcode::Halt.bits()]);
    }

    #[test]
    fn scalar_forms_set_bit_six() {
        let vector = words("addi x5, x1, 0")[0];
        let scalar = words("s_addi s5, s1, 0")[0];
        assert_eq!(scalar, vector | SCALAR_FLAG);
    }

    #[test]
    fn negative_immediates() {
        let word = words("addi x5, x1, -1")[0];
        assert_eq!(crate::isa::imm12(word), -1);
    }

    #[test]
    fn encoding_is_deterministic() {
        let source = ".blocks 2\nstart: addi x5, x1, 0\nsw x5, 0(x1)\nhalt\n";
        assert_eq!(encode_source(source).unwrap(), encode_source(source).unwrap());
    }

    #[test]
    fn labels_resolve_pc_relative() {
        // the label lives at pc 2; the reference sits in the word at pc 0
        let program = words("addi x5, x1, done\nhalt\ndone: halt");
        assert_eq!(crate::isa::imm12(program[0]), 2);

        // backward reference
        let program = words("start: halt\naddi x5, x1, start");
        assert_eq!(crate::isa::imm12(program[1]), -1);
    }

    #[test]
    fn bare_and_attached_labels_share_a_pc() {
        let program = encode_source("top:\nfirst: addi x5, x1, top\nhalt").unwrap();
        assert_eq!(crate::isa::imm12(program.instructions[0]), 0);
    }

    #[test]
    fn duplicate_label_is_fatal() {
        assert_eq!(
            first_error("loop: halt\nloop: halt"),
            ErrorKind::DuplicateLabel("loop".to_string())
        );
    }

    #[test]
    fn unresolved_label_is_fatal() {
        assert_eq!(
            first_error("addi x5, x1, nowhere\nhalt"),
            ErrorKind::UnresolvedLabel("nowhere".to_string())
        );
    }

    #[test]
    fn directives_fill_the_config() {
        let program = encode_source(".blocks 3\n.warps 4\nhalt").unwrap();
        assert_eq!(program.config.num_blocks, 3);
        assert_eq!(program.config.num_warps_per_block, 4);
        assert_eq!(program.config.base_instructions_addr, 0);
        assert_eq!(program.config.base_data_addr, 0);

        let program = encode_source("halt").unwrap();
        assert_eq!(program.config, KernelConfig::default());
    }

    #[test]
    fn directive_placement() {
        assert_eq!(
            first_error("halt\n.blocks 2"),
            ErrorKind::DirectiveAfterInstruction(".blocks")
        );
        assert_eq!(
            first_error(".warps 2\n.warps 2\nhalt"),
            ErrorKind::DuplicateDirective(".warps")
        );
        // a directive after a bare label is still before the first instruction
        assert!(encode_source("top:\n.blocks 2\nhalt").is_ok());
    }
}
