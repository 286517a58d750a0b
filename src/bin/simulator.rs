use std::{env, fs};
use simtvm::assembler;
use simtvm::logging::error;
use simtvm::simulator::memory::{DATA_MEMORY_SIZE, INSTRUCTION_MEMORY_SIZE};
use simtvm::simulator::{self, DEFAULT_MAX_CYCLES, DataMemory, Gpu, InstructionMemory};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <input.asm>", args[0]);
        std::process::exit(1);
    }

    let source = fs::read_to_string(&args[1])
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

    let mut instruction_memory = InstructionMemory::new(INSTRUCTION_MEMORY_SIZE);
    for word in &program.instructions {
        instruction_memory.push(*word);
    }
    let mut data_memory = DataMemory::new(DATA_MEMORY_SIZE);
    let mut gpu = Gpu::new();

    let config = program.config;
    simulator::set_kernel_config(
        &mut gpu,
        config.base_instructions_addr,
        config.base_data_addr,
        config.num_blocks,
        config.num_warps_per_block,
    );

    println!(
        "Loaded {} instructions, launching {} block(s) x {} warp(s)",
        program.instructions.len(),
        config.num_blocks,
        config.num_warps_per_block
    );

    let done = simulator::simulate(
        &mut gpu,
        &mut instruction_memory,
        &mut data_memory,
        DEFAULT_MAX_CYCLES,
    );
    if !done {
        error(format!("kernel did not finish within {} cycles", DEFAULT_MAX_CYCLES));
        std::process::exit(1);
    }
    println!("Kernel finished");
}
