//! Cycle-driven co-simulation around the GPU device model
//!
//! The driver owns nothing about the device beyond its signal contract:
//! a clock, an execution start/done handshake, the kernel-config bus and
//! the instruction/data memory request channels. Each simulated cycle it
//! settles the device's combinational outputs, lets the memory models
//! service the pending requests, settles again so the responses
//! propagate, and pulses the clock.

pub mod gpu;
pub mod memory;

pub use gpu::Gpu;
pub use memory::{DataMemory, InstructionMemory};

/// Cycle budget used by the `simulator` binary
pub const DEFAULT_MAX_CYCLES: u32 = 10_000;

/// Width of the kernel-config bus
pub const CONFIG_SLOTS: usize = 4;

pub const SLOT_NUM_WARPS: usize = 0;
pub const SLOT_NUM_BLOCKS: usize = 1;
pub const SLOT_BASE_DATA: usize = 2;
pub const SLOT_BASE_INSTRUCTIONS: usize = 3;

/// The signal contract of the device under simulation.
///
/// `ready`/`valid` registers are bitmasks with one bit per channel. The
/// driver and the memory models talk to the device exclusively through
/// this trait; nothing outside the device itself may peek at its
/// internals.
pub trait Device {
    /// Instruction-memory read channels
    const INST_CHANNELS: usize;
    /// Data-memory read and write channels
    const DATA_CHANNELS: usize;

    /// Settle the device: apply a rising clock edge if one is pending,
    /// then recompute combinational outputs.
    fn eval(&mut self);
    fn set_clock(&mut self, level: bool);

    fn set_execution_start(&mut self, start: bool);
    fn execution_done(&self) -> bool;
    fn set_kernel_config_slot(&mut self, slot: usize, value: u32);

    fn inst_read_valid(&self) -> u32;
    fn inst_read_address(&self, channel: usize) -> u32;
    fn set_inst_read_data(&mut self, channel: usize, word: u32);
    fn set_inst_read_ready(&mut self, channel: usize, ready: bool);

    fn data_read_valid(&self) -> u32;
    fn data_read_address(&self, channel: usize) -> u32;
    fn set_data_read_data(&mut self, channel: usize, word: u32);
    fn set_data_read_ready(&mut self, channel: usize, ready: bool);

    fn data_write_valid(&self) -> u32;
    fn data_write_address(&self, channel: usize) -> u32;
    fn data_write_data(&self, channel: usize) -> u32;
    fn set_data_write_ready(&mut self, channel: usize, ready: bool);
}

/// Drive the kernel-config bus.
///
/// The slot assignment is part of the device's contract and must not be
/// reordered: slot 3 is the instruction base address, slot 2 the data
/// base address, slot 1 the block count, slot 0 the warps per block.
pub fn set_kernel_config<D: Device>(
    device: &mut D,
    base_instructions: u32,
    base_data: u32,
    num_blocks: u32,
    num_warps: u32,
) {
    device.set_kernel_config_slot(SLOT_BASE_INSTRUCTIONS, base_instructions);
    device.set_kernel_config_slot(SLOT_BASE_DATA, base_data);
    device.set_kernel_config_slot(SLOT_NUM_BLOCKS, num_blocks);
    device.set_kernel_config_slot(SLOT_NUM_WARPS, num_warps);
}

/// Run the device until it signals done or the cycle budget runs out.
///
/// Returns whether the kernel finished. On time-out nothing is torn
/// down; the memories stay inspectable.
pub fn simulate<D: Device>(
    device: &mut D,
    instruction_memory: &mut InstructionMemory,
    data_memory: &mut DataMemory,
    max_cycles: u32,
) -> bool {
    device.set_execution_start(true);

    for _cycle in 0..max_cycles {
        device.eval();
        if device.execution_done() {
            return true;
        }

        instruction_memory.process(device);
        data_memory.process(device);
        device.eval();

        device.set_clock(false);
        device.eval();
        device.set_clock(true);
        device.eval();
    }

    false
}
