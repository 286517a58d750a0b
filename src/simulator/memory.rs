//! Instruction and data memory models
//!
//! Both memories are sparse word maps serviced once per simulated cycle:
//! every channel whose `valid` bit is set gets its request handled and
//! its `ready` bit raised in the same cycle. The data memory services
//! writes before reads, so a store is visible to a load of the same
//! address within one cycle.

use std::collections::HashMap;

use super::Device;
use crate::logging;

/// Default capacity of the `simulator` binary's instruction memory, in words
pub const INSTRUCTION_MEMORY_SIZE: u32 = 4096;
/// Default capacity of the `simulator` binary's data memory, in words
pub const DATA_MEMORY_SIZE: u32 = 4096;

/// A sparse word-addressed memory. Cells read as zero until written.
#[derive(Debug, Clone)]
pub struct MemoryModel {
    cells: HashMap<u32, u32>,
    push_ptr: u32,
    size: u32,
}

impl MemoryModel {
    pub fn new(size: u32) -> MemoryModel {
        MemoryModel {
            cells: HashMap::new(),
            push_ptr: 0,
            size,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn in_range(&self, address: u32) -> bool {
        address < self.size
    }

    pub fn read(&self, address: u32) -> u32 {
        self.cells.get(&address).copied().unwrap_or(0)
    }

    pub fn write(&mut self, address: u32, word: u32) {
        self.cells.insert(address, word);
    }

    /// Append `word` at the push pointer and advance it.
    ///
    /// The push pointer moves only through this call; direct `write`s
    /// never advance or reset it, even when they land at or past it.
    pub fn push(&mut self, word: u32) {
        self.cells.insert(self.push_ptr, word);
        self.push_ptr += 1;
    }

    pub fn push_ptr(&self) -> u32 {
        self.push_ptr
    }
}

/// Read-only program memory with per-channel request servicing
#[derive(Debug, Clone)]
pub struct InstructionMemory {
    model: MemoryModel,
}

impl InstructionMemory {
    pub fn new(size: u32) -> InstructionMemory {
        InstructionMemory { model: MemoryModel::new(size) }
    }

    pub fn push(&mut self, word: u32) {
        self.model.push(word);
    }

    pub fn read(&self, address: u32) -> u32 {
        self.model.read(address)
    }

    /// Service this cycle's fetch requests. Out-of-range addresses read
    /// as zero and are logged; `ready` mirrors `valid` either way.
    pub fn process<D: Device>(&mut self, device: &mut D) {
        let valid = device.inst_read_valid();
        for channel in 0..D::INST_CHANNELS {
            let requested = valid & (1 << channel) != 0;
            if requested {
                let address = device.inst_read_address(channel);
                let word = if self.model.in_range(address) {
                    self.model.read(address)
                } else {
                    logging::warning(format!(
                        "instruction read from out-of-range address {:#x} on channel {}",
                        address, channel
                    ));
                    0
                };
                device.set_inst_read_data(channel, word);
            }
            device.set_inst_read_ready(channel, requested);
        }
    }
}

/// Read-write memory with per-channel request servicing
#[derive(Debug, Clone)]
pub struct DataMemory {
    model: MemoryModel,
}

impl DataMemory {
    pub fn new(size: u32) -> DataMemory {
        DataMemory { model: MemoryModel::new(size) }
    }

    pub fn push(&mut self, word: u32) {
        self.model.push(word);
    }

    pub fn read(&self, address: u32) -> u32 {
        self.model.read(address)
    }

    pub fn write(&mut self, address: u32, word: u32) {
        self.model.write(address, word);
    }

    /// Service this cycle's requests, writes first: a store must be
    /// visible to a read of the same address issued in the same cycle.
    pub fn process<D: Device>(&mut self, device: &mut D) {
        let write_valid = device.data_write_valid();
        for channel in 0..D::DATA_CHANNELS {
            let requested = write_valid & (1 << channel) != 0;
            if requested {
                let address = device.data_write_address(channel);
                if self.model.in_range(address) {
                    self.model.write(address, device.data_write_data(channel));
                } else {
                    logging::warning(format!(
                        "data write to out-of-range address {:#x} on channel {}",
                        address, channel
                    ));
                }
            }
            device.set_data_write_ready(channel, requested);
        }

        let read_valid = device.data_read_valid();
        for channel in 0..D::DATA_CHANNELS {
            let requested = read_valid & (1 << channel) != 0;
            if requested {
                let address = device.data_read_address(channel);
                let word = if self.model.in_range(address) {
                    self.model.read(address)
                } else {
                    logging::warning(format!(
                        "data read from out-of-range address {:#x} on channel {}",
                        address, channel
                    ));
                    0
                };
                device.set_data_read_data(channel, word);
            }
            device.set_data_read_ready(channel, requested);
        }
    }
}
