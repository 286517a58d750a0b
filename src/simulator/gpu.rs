//! Behavioral model of the SIMT GPU core
//!
//! The model is driven purely through the [`Device`] signal contract: the
//! harness toggles the clock and fills in memory responses, the model
//! raises request signals and eventually `execution_done`. Internally it
//! runs the launched warps one after another, each through a two-stage
//! fetch/memory state machine:
//!
//! - in the fetch stage the model requests `base_instructions + pc` on
//!   instruction channel 0 and retires the word on the next rising edge;
//!   ALU instructions execute immediately, loads and stores latch a
//!   memory request
//! - in the memory stage the per-lane addresses sit on the data channels
//!   (one channel per lane, channel 0 for scalar accesses) until every
//!   requested lane is ready
//!
//! Vector registers x0-x3 read as zero, thread id, block id and block
//! size; writes to them are ignored. Scalar register s1 is the warp's
//! execution mask: vector ALU ops, loads and stores only touch lanes
//! whose bit in s1 is set. It starts all-ones, so a freshly launched
//! warp runs all 32 threads.

use crate::isa::{self, InstructionClass, Opcode, WARP_SIZE};
use crate::logging;

use super::{CONFIG_SLOTS, Device, SLOT_BASE_DATA, SLOT_BASE_INSTRUCTIONS, SLOT_NUM_BLOCKS, SLOT_NUM_WARPS};

/// Instruction-memory channels exposed by the core
pub const INST_CHANNELS: usize = 4;
/// Data-memory channels exposed by the core, one per lane
pub const DATA_CHANNELS: usize = WARP_SIZE;

/// Scalar register read as the execution mask
const MASK_REGISTER: usize = 1;

/// The raw port bundle. The harness only touches it through the
/// [`Device`] accessors.
#[derive(Debug, Default)]
struct Ports {
    clock: bool,
    execution_start: bool,
    execution_done: bool,
    kernel_config: [u32; CONFIG_SLOTS],

    inst_read_valid: u32,
    inst_read_address: [u32; INST_CHANNELS],
    inst_read_data: [u32; INST_CHANNELS],
    inst_read_ready: u32,

    data_read_valid: u32,
    data_read_address: [u32; DATA_CHANNELS],
    data_read_data: [u32; DATA_CHANNELS],
    data_read_ready: u32,

    data_write_valid: u32,
    data_write_address: [u32; DATA_CHANNELS],
    data_write_data: [u32; DATA_CHANNELS],
    data_write_ready: u32,
}

/// Architectural state of the warp currently on the core
struct Warp {
    pc: u32,
    /// `vector[register][lane]`
    vector: [[i32; WARP_SIZE]; isa::NUM_REGISTERS],
    scalar: [i32; isa::NUM_REGISTERS],
}

impl Warp {
    fn launch(block: u32, warp_in_block: u32, block_size: u32) -> Warp {
        let mut warp = Warp {
            pc: 0,
            vector: [[0; WARP_SIZE]; isa::NUM_REGISTERS],
            scalar: [0; isa::NUM_REGISTERS],
        };
        for lane in 0..WARP_SIZE {
            warp.vector[1][lane] = (warp_in_block * WARP_SIZE as u32 + lane as u32) as i32;
            warp.vector[2][lane] = block as i32;
            warp.vector[3][lane] = block_size as i32;
        }
        warp.scalar[MASK_REGISTER] = u32::MAX as i32;
        warp.scalar[2] = block as i32;
        warp.scalar[3] = block_size as i32;
        warp
    }

    fn exec_mask(&self) -> u32 {
        self.scalar[MASK_REGISTER] as u32
    }

    /// x0-x3 are hardwired; writes to them are dropped
    fn write_vector(&mut self, rd: usize, lane: usize, value: i32) {
        if rd > 3 {
            self.vector[rd][lane] = value;
        }
    }

    /// s0 is hardwired zero
    fn write_scalar(&mut self, rd: usize, value: i32) {
        if rd != 0 {
            self.scalar[rd] = value;
        }
    }
}

/// A latched load or store waiting on the data channels
struct MemRequest {
    opcode: Opcode,
    scalar: bool,
    rd: usize,
    /// Channels that must come back ready
    lanes: u32,
    addresses: [u32; DATA_CHANNELS],
    values: [u32; DATA_CHANNELS],
}

impl MemRequest {
    fn is_store(&self) -> bool {
        self.opcode.class() == InstructionClass::Store
    }
}

enum Stage {
    Fetch,
    Memory(MemRequest),
}

/// What retiring one instruction does to the warp
enum Outcome {
    Next,
    Halt,
    Wait(MemRequest),
}

pub struct Gpu {
    ports: Ports,
    prev_clock: bool,
    stage: Stage,
    warp: Option<Warp>,
    next_warp: u32,
}

impl Default for Gpu {
    fn default() -> Gpu {
        Gpu::new()
    }
}

impl Gpu {
    pub fn new() -> Gpu {
        Gpu {
            ports: Ports::default(),
            prev_clock: false,
            stage: Stage::Fetch,
            warp: None,
            next_warp: 0,
        }
    }

    /// Rising-edge state update
    fn posedge(&mut self) {
        if !self.ports.execution_start || self.ports.execution_done {
            return;
        }
        let Some(mut warp) = self.warp.take() else {
            self.launch_next_warp();
            return;
        };
        let base_data = self.ports.kernel_config[SLOT_BASE_DATA];

        match std::mem::replace(&mut self.stage, Stage::Fetch) {
            Stage::Fetch => {
                if self.ports.inst_read_ready & 1 == 0 {
                    self.warp = Some(warp);
                    return;
                }
                let word = self.ports.inst_read_data[0];
                match Self::issue(&mut warp, base_data, word) {
                    Outcome::Next => self.warp = Some(warp),
                    Outcome::Halt => {} // warp retired; the next edge launches its successor
                    Outcome::Wait(request) => {
                        self.stage = Stage::Memory(request);
                        self.warp = Some(warp);
                    }
                }
            }
            Stage::Memory(request) => {
                let ready = if request.is_store() {
                    self.ports.data_write_ready
                } else {
                    self.ports.data_read_ready
                };
                if ready & request.lanes == request.lanes {
                    Self::complete_memory(&mut warp, &request, &self.ports);
                } else {
                    self.stage = Stage::Memory(request);
                }
                self.warp = Some(warp);
            }
        }
    }

    fn launch_next_warp(&mut self) {
        let num_warps = self.ports.kernel_config[SLOT_NUM_WARPS];
        let num_blocks = self.ports.kernel_config[SLOT_NUM_BLOCKS];
        let total = num_blocks.saturating_mul(num_warps);
        if self.next_warp >= total {
            self.ports.execution_done = true;
            return;
        }
        let index = self.next_warp;
        self.next_warp += 1;
        let block = index / num_warps;
        let warp_in_block = index % num_warps;
        let block_size = num_warps * WARP_SIZE as u32;
        self.warp = Some(Warp::launch(block, warp_in_block, block_size));
        self.stage = Stage::Fetch;
    }

    /// Decode and retire one fetched word
    fn issue(warp: &mut Warp, base_data: u32, word: u32) -> Outcome {
        let Some(opcode) = Opcode::decode(word) else {
            logging::warning(format!(
                "undecodable instruction word {:#010x} at pc {}, halting warp",
                word, warp.pc
            ));
            return Outcome::Halt;
        };
        let scalar = isa::scalar_flag(word);
        let rd = isa::rd(word);
        let rs1 = isa::rs1(word);
        let rs2 = isa::rs2(word);
        let imm = isa::imm12(word);
        let mask = warp.exec_mask();

        match opcode.class() {
            InstructionClass::Halt => Outcome::Halt,
            InstructionClass::AluImmediate | InstructionClass::AluRegister => {
                let register_form = opcode.class() == InstructionClass::AluRegister;
                if opcode.is_cross() {
                    // pack the per-lane predicate into the scalar destination
                    let mut bits: u32 = 0;
                    for lane in 0..WARP_SIZE {
                        if mask & (1 << lane) == 0 {
                            continue;
                        }
                        let a = warp.vector[rs1][lane];
                        let b = if register_form { warp.vector[rs2][lane] } else { imm };
                        if alu(opcode, a, b) != 0 {
                            bits |= 1 << lane;
                        }
                    }
                    warp.write_scalar(rd, bits as i32);
                } else if scalar {
                    let a = warp.scalar[rs1];
                    let b = if register_form { warp.scalar[rs2] } else { imm };
                    warp.write_scalar(rd, alu(opcode, a, b));
                } else {
                    for lane in 0..WARP_SIZE {
                        if mask & (1 << lane) == 0 {
                            continue;
                        }
                        let a = warp.vector[rs1][lane];
                        let b = if register_form { warp.vector[rs2][lane] } else { imm };
                        warp.write_vector(rd, lane, alu(opcode, a, b));
                    }
                }
                warp.pc += 1;
                Outcome::Next
            }
            InstructionClass::Load => {
                let mut request = MemRequest {
                    opcode,
                    scalar,
                    rd,
                    lanes: 0,
                    addresses: [0; DATA_CHANNELS],
                    values: [0; DATA_CHANNELS],
                };
                if scalar {
                    request.lanes = 1;
                    request.addresses[0] =
                        base_data.wrapping_add(warp.scalar[rs1].wrapping_add(imm) as u32);
                } else {
                    for lane in 0..WARP_SIZE {
                        if mask & (1 << lane) == 0 {
                            continue;
                        }
                        request.lanes |= 1 << lane;
                        request.addresses[lane] =
                            base_data.wrapping_add(warp.vector[rs1][lane].wrapping_add(imm) as u32);
                    }
                }
                Outcome::Wait(request)
            }
            InstructionClass::Store => {
                // the rd slot of a store holds rs2, the address base; the
                // stored value comes from rs1
                let base_register = rd;
                let mut request = MemRequest {
                    opcode,
                    scalar,
                    rd,
                    lanes: 0,
                    addresses: [0; DATA_CHANNELS],
                    values: [0; DATA_CHANNELS],
                };
                if scalar {
                    request.lanes = 1;
                    request.addresses[0] =
                        base_data.wrapping_add(warp.scalar[base_register].wrapping_add(imm) as u32);
                    request.values[0] = store_value(opcode, warp.scalar[rs1]);
                } else {
                    for lane in 0..WARP_SIZE {
                        if mask & (1 << lane) == 0 {
                            continue;
                        }
                        request.lanes |= 1 << lane;
                        request.addresses[lane] = base_data
                            .wrapping_add(warp.vector[base_register][lane].wrapping_add(imm) as u32);
                        request.values[lane] = store_value(opcode, warp.vector[rs1][lane]);
                    }
                }
                Outcome::Wait(request)
            }
        }
    }

    fn complete_memory(warp: &mut Warp, request: &MemRequest, ports: &Ports) {
        if !request.is_store() {
            if request.scalar {
                let value = load_value(request.opcode, ports.data_read_data[0]);
                warp.write_scalar(request.rd, value);
            } else {
                for lane in 0..WARP_SIZE {
                    if request.lanes & (1 << lane) == 0 {
                        continue;
                    }
                    let value = load_value(request.opcode, ports.data_read_data[lane]);
                    warp.write_vector(request.rd, lane, value);
                }
            }
        }
        warp.pc += 1;
    }

    /// Recompute the request outputs from the current stage
    fn update_comb(&mut self) {
        self.ports.inst_read_valid = 0;
        self.ports.data_read_valid = 0;
        self.ports.data_write_valid = 0;

        if !self.ports.execution_start || self.ports.execution_done {
            return;
        }
        let Some(warp) = &self.warp else {
            return;
        };
        match &self.stage {
            Stage::Fetch => {
                self.ports.inst_read_valid = 1;
                self.ports.inst_read_address[0] =
                    self.ports.kernel_config[SLOT_BASE_INSTRUCTIONS].wrapping_add(warp.pc);
            }
            Stage::Memory(request) => {
                if request.is_store() {
                    self.ports.data_write_valid = request.lanes;
                    for lane in 0..DATA_CHANNELS {
                        if request.lanes & (1 << lane) != 0 {
                            self.ports.data_write_address[lane] = request.addresses[lane];
                            self.ports.data_write_data[lane] = request.values[lane];
                        }
                    }
                } else {
                    self.ports.data_read_valid = request.lanes;
                    for lane in 0..DATA_CHANNELS {
                        if request.lanes & (1 << lane) != 0 {
                            self.ports.data_read_address[lane] = request.addresses[lane];
                        }
                    }
                }
            }
        }
    }
}

fn alu(opcode: Opcode, a: i32, b: i32) -> i32 {
    match opcode {
        Opcode::Addi | Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Slti | Opcode::Slt | Opcode::SxSlti | Opcode::SxSlt => (a < b) as i32,
        Opcode::Xori | Opcode::Xor => a ^ b,
        Opcode::Ori | Opcode::Or => a | b,
        Opcode::Andi | Opcode::And => a & b,
        Opcode::Slli | Opcode::Sll => a.wrapping_shl(b as u32),
        Opcode::Srli | Opcode::Srl => (a as u32).wrapping_shr(b as u32) as i32,
        Opcode::Srai | Opcode::Sra => a.wrapping_shr(b as u32),
        _ => unreachable!("not an ALU opcode: {:?}", opcode),
    }
}

/// Narrow loads sign-extend the low bits of the addressed word
fn load_value(opcode: Opcode, word: u32) -> i32 {
    match opcode {
        Opcode::Lb => word as u8 as i8 as i32,
        Opcode::Lh => word as u16 as i16 as i32,
        _ => word as i32,
    }
}

/// Narrow stores keep the low bits, zero-extended; memory stays
/// word-addressed
fn store_value(opcode: Opcode, value: i32) -> u32 {
    match opcode {
        Opcode::Sb => value as u8 as u32,
        Opcode::Sh => value as u16 as u32,
        _ => value as u32,
    }
}

impl Device for Gpu {
    const INST_CHANNELS: usize = self::INST_CHANNELS;
    const DATA_CHANNELS: usize = self::DATA_CHANNELS;

    fn eval(&mut self) {
        if self.ports.clock && !self.prev_clock {
            self.posedge();
        }
        self.prev_clock = self.ports.clock;
        self.update_comb();
    }

    fn set_clock(&mut self, level: bool) {
        self.ports.clock = level;
    }

    fn set_execution_start(&mut self, start: bool) {
        self.ports.execution_start = start;
    }

    fn execution_done(&self) -> bool {
        self.ports.execution_done
    }

    fn set_kernel_config_slot(&mut self, slot: usize, value: u32) {
        self.ports.kernel_config[slot] = value;
    }

    fn inst_read_valid(&self) -> u32 {
        self.ports.inst_read_valid
    }

    fn inst_read_address(&self, channel: usize) -> u32 {
        self.ports.inst_read_address[channel]
    }

    fn set_inst_read_data(&mut self, channel: usize, word: u32) {
        self.ports.inst_read_data[channel] = word;
    }

    fn set_inst_read_ready(&mut self, channel: usize, ready: bool) {
        if ready {
            self.ports.inst_read_ready |= 1 << channel;
        } else {
            self.ports.inst_read_ready &= !(1 << channel);
        }
    }

    fn data_read_valid(&self) -> u32 {
        self.ports.data_read_valid
    }

    fn data_read_address(&self, channel: usize) -> u32 {
        self.ports.data_read_address[channel]
    }

    fn set_data_read_data(&mut self, channel: usize, word: u32) {
        self.ports.data_read_data[channel] = word;
    }

    fn set_data_read_ready(&mut self, channel: usize, ready: bool) {
        if ready {
            self.ports.data_read_ready |= 1 << channel;
        } else {
            self.ports.data_read_ready &= !(1 << channel);
        }
    }

    fn data_write_valid(&self) -> u32 {
        self.ports.data_write_valid
    }

    fn data_write_address(&self, channel: usize) -> u32 {
        self.ports.data_write_address[channel]
    }

    fn data_write_data(&self, channel: usize) -> u32 {
        self.ports.data_write_data[channel]
    }

    fn set_data_write_ready(&mut self, channel: usize, ready: bool) {
        if ready {
            self.ports.data_write_ready |= 1 << channel;
        } else {
            self.ports.data_write_ready &= !(1 << channel);
        }
    }
}
