use std::{env, fs};
use simtvm::isa::{self, InstructionClass, Opcode};
use simtvm::logging::error;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input.bin> <output.asm>", args[0]);
        return;
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let bytes = fs::read(input_path)
        .unwrap_or_else(|e| {
            error(format!("failed to read input file: {}", e));
            std::process::exit(1);
        });
    let asm = disassemble(&bytes);

    fs::write(output_path, asm)
        .unwrap_or_else(|e| {
            error(format!("failed to write to output file: {}", e));
            std::process::exit(2);
        });
}

fn disassemble(bytes: &[u8]) -> String {
    let mut result = String::new();

    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        result.push_str(&decode_instruction(word));
        result.push('\n');
    }
    for byte in chunks.remainder() {
        result.push_str(&format!(".byte 0x{:02X}\n", byte));
    }

    result
}

fn decode_instruction(word: u32) -> String {
    let Some(opcode) = Opcode::decode(word) else {
        return format!(".word 0x{:08X}", word);
    };
    let scalar = isa::scalar_flag(word);
    let mnemonic = if scalar {
        format!("s_{}", opcode.name())
    } else {
        opcode.name().to_string()
    };
    // cross-width destinations live in the scalar file; otherwise the
    // scalar bit picks the file for every operand
    let dest_prefix = if scalar || opcode.is_cross() { "s" } else { "x" };
    let src_prefix = if scalar && !opcode.is_cross() { "s" } else { "x" };

    let rd = isa::rd(word);
    let rs1 = isa::rs1(word);
    let rs2 = isa::rs2(word);
    let imm = isa::imm12(word);

    match opcode.class() {
        InstructionClass::Halt => mnemonic,
        InstructionClass::AluImmediate => {
            format!("{} {}{}, {}{}, {}", mnemonic, dest_prefix, rd, src_prefix, rs1, imm)
        }
        InstructionClass::AluRegister => {
            format!("{} {}{}, {}{}, {}{}", mnemonic, dest_prefix, rd, src_prefix, rs1, src_prefix, rs2)
        }
        InstructionClass::Load => {
            format!("{} {}{}, {}({}{})", mnemonic, dest_prefix, rd, imm, src_prefix, rs1)
        }
        // the rd slot of a store holds the address base, printed first
        InstructionClass::Store => {
            format!("{} {}{}, {}({}{})", mnemonic, src_prefix, rd, imm, src_prefix, rs1)
        }
    }
}
