use std::{env, fs};
use simtvm::assembler;
use simtvm::logging::error;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input.asm> <output.bin>", args[0]);
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let source = fs::read_to_string(input_path)
        .unwrap_or_else(|e| {
            error(format!("failed to read input file: {}", e));
            std::process::exit(1);
        });

    let program = assembler::assemble(&source)
        .unwrap_or_else(|errors| {
            for e in errors {
                error(e.to_string());
            }
            std::process::exit(2);
        });

    let bytes: Vec<u8> = program
        .instructions
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect();

    fs::write(output_path, bytes)
        .unwrap_or_else(|e| {
            error(format!("failed to write to output file: {}", e));
            std::process::exit(3);
        });
}
