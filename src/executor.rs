//! The machine: one owning struct holding every piece of simulator
//! state, and the fetch-decode-execute loop that mutates it. No
//! operator reaches for anything outside `Machine` — every helper
//! takes `&mut self`.

use std::collections::HashMap;
use std::io::Write;

use tracing::{debug, warn};

use crate::alu::{alu_op, branch_taken, idx_op, mul_op};
use crate::decode::{Instr, Kind};
use crate::disasm;
use crate::dmpu::{Dmpu, PERM_READ, PERM_WRITE};
use crate::error::SimError;
use crate::exception::{self, Cause};
use crate::memory::{region_of, MemoryFabric, Region, ROM_BASE};
use crate::peripherals::Peripherals;
use crate::regs::{ConfigRegisters, Registers};
use crate::size::Size;

/// Reset PC: the first program-ROM word.
pub const RESET_PC: u32 = ROM_BASE;
/// Reset stack pointer: top of data RAM.
pub const RESET_SP: u32 = 0x0400_0000;
/// r31 is used as the stack pointer by convention; the reset value is
/// seeded there, not enforced afterward.
const STACK_REGISTER: u32 = 31;

pub enum StepOutcome {
    Continue,
    Halted,
}

pub struct Machine {
    pub regs: Registers,
    pub cfg: ConfigRegisters,
    pub dmpu: Dmpu,
    pub mem: MemoryFabric,
    pub pc: u32,
    pub exception: bool,
    pub abort_on_exception: bool,
    pub labels: HashMap<u32, String>,
    pub trace_sink: Option<Box<dyn Write + Send>>,
    pub reg_sink: Option<Box<dyn Write + Send>>,
}

impl Machine {
    pub fn new(peripherals: Peripherals) -> Self {
        Machine {
            regs: Registers::new(),
            cfg: ConfigRegisters::new(),
            dmpu: Dmpu::new(),
            mem: MemoryFabric::new(peripherals),
            pc: RESET_PC,
            exception: false,
            abort_on_exception: false,
            labels: HashMap::new(),
            trace_sink: None,
            reg_sink: None,
        }
        .with_reset_registers()
    }

    fn with_reset_registers(mut self) -> Self {
        self.regs.write(STACK_REGISTER, RESET_SP as i32);
        self
    }

    pub fn load_program(&mut self, words: &[u32]) {
        for (i, &word) in words.iter().enumerate() {
            if i < self.mem.rom.len() {
                self.mem.rom[i] = word;
            }
        }
    }

    /// Run until halt (PC becomes 0), a runaway timeout, or — when
    /// `abort_on_exception` is set — the first in-machine exception.
    pub fn run(&mut self, timeout: u64) -> Result<(), SimError> {
        for _ in 0..timeout {
            match self.step()? {
                StepOutcome::Halted => return Ok(()),
                StepOutcome::Continue => {}
            }
        }
        Err(SimError::RunawayExecution(timeout))
    }

    pub fn step(&mut self) -> Result<StepOutcome, SimError> {
        self.exception = false;

        let faulting_pc = self.pc;
        let word = self.mem.read_word(self.pc);
        self.pc = self.pc.wrapping_add(4);
        let instr = Instr::decode(word);

        if let Some(sink) = self.trace_sink.as_mut() {
            let line = disasm::render(faulting_pc, &instr, &self.labels);
            let _ = writeln!(sink, "{line}");
        }

        self.execute(instr, faulting_pc)?;

        if let Some(sink) = self.reg_sink.as_mut() {
            let _ = writeln!(sink, "pc={:#010x}", self.pc);
        }

        // Timer interrupts are delivered between instructions: the
        // countdown reflects completed fetches, and a transition to
        // zero reroutes the *next* fetch rather than this one.
        if let Some(new_pc) = exception::tick_timer(&mut self.cfg, self.pc) {
            debug!(pc = format_args!("{new_pc:#010x}"), "timer interrupt");
            self.pc = new_pc;
        }

        if self.exception && self.abort_on_exception {
            return Err(SimError::Aborted {
                cause: self.cfg.ecause,
                edata: self.cfg.edata,
                epc: self.cfg.epc,
            });
        }

        if self.pc == 0 {
            return Ok(StepOutcome::Halted);
        }
        Ok(StepOutcome::Continue)
    }

    fn writeback(&mut self, d: u32, value: i32) {
        if !self.exception {
            self.regs.write(d, value);
        }
    }

    fn execute(&mut self, instr: Instr, faulting_pc: u32) -> Result<(), SimError> {
        let Some(kind) = instr.kind else {
            self.pc = exception::raise(&mut self.cfg, Cause::IllegalInstruction, instr.word, faulting_pc);
            self.exception = true;
            return Ok(());
        };

        let ra = self.regs.read(instr.a);
        let rb = self.regs.read(instr.b);

        match kind {
            Kind::Alu => {
                let result = alu_op(instr.i, ra, rb, instr.c);
                self.writeback(instr.d, result);
            }
            Kind::Alui => {
                let result = alu_op(instr.i, ra, instr.n13, instr.c);
                self.writeback(instr.d, result);
            }
            Kind::Bra => {
                if branch_taken(instr.i, ra, rb) {
                    self.pc = self.pc.wrapping_add((instr.n13s as u32).wrapping_mul(4));
                }
            }
            Kind::Ld => {
                let Some(size) = Size::from_field(instr.i) else {
                    return Err(SimError::InvalidSizeField(instr.i));
                };
                let addr = ra.wrapping_add(instr.n13) as u32;
                let value = self.do_load(addr, size, faulting_pc);
                self.writeback(instr.d, value);
            }
            Kind::St => {
                let Some(size) = Size::from_field(instr.i) else {
                    return Err(SimError::InvalidSizeField(instr.i));
                };
                let addr = ra.wrapping_add(instr.n13s) as u32;
                self.do_store(addr, size, rb, faulting_pc);
            }
            Kind::Jmp => {
                let link = self.pc as i32;
                self.pc = self.pc.wrapping_add((instr.n21 as u32).wrapping_mul(4));
                self.writeback(instr.d, link);
            }
            Kind::Jmpr => {
                let link = self.pc as i32;
                self.pc = (ra.wrapping_add(instr.n13.wrapping_mul(4))) as u32;
                self.writeback(instr.d, link);
            }
            Kind::Ldu => {
                let result = (instr.n21 as u32).wrapping_shl(11) as i32;
                self.writeback(instr.d, result);
            }
            Kind::Ldpc => {
                let result = self.pc.wrapping_add((instr.n21 as u32).wrapping_mul(4)) as i32;
                self.writeback(instr.d, result);
            }
            Kind::Mul => {
                let result = mul_op(instr.i, ra, rb)?;
                self.writeback(instr.d, result);
            }
            Kind::Muli => {
                let result = mul_op(instr.i, ra, instr.n13)?;
                self.writeback(instr.d, result);
            }
            Kind::Cfg => self.execute_cfg(instr, ra, faulting_pc),
            Kind::Idx => match idx_op(instr.i, ra, rb) {
                Ok(result) => self.writeback(instr.d, result),
                Err(edata) => {
                    self.pc = exception::raise(&mut self.cfg, Cause::IndexOutOfRange, edata, faulting_pc);
                    self.exception = true;
                }
            },
        }
        Ok(())
    }

    fn execute_cfg(&mut self, instr: Instr, ra: i32, faulting_pc: u32) {
        match instr.i & 0x3 {
            0 => {
                let value = self.cfg.read(instr.n13 as u32) as i32;
                self.writeback(instr.d, value);
            }
            1 => {
                let index = instr.n13 as u32;
                let old = match index {
                    0xD => {
                        self.dmpu.clear();
                        0
                    }
                    0xE => {
                        self.dmpu.push(ra as u32);
                        0
                    }
                    _ => {
                        let old = self.cfg.read(index);
                        self.cfg.write(index, ra as u32);
                        old
                    }
                };
                self.writeback(instr.d, old as i32);
            }
            2 => {
                self.pc = exception::cfg_return(&mut self.cfg, instr.n13);
            }
            3 => {
                self.pc = exception::raise(&mut self.cfg, Cause::SystemCall, instr.n13 as u32, faulting_pc);
                self.exception = true;
            }
            _ => unreachable!("two-bit mask"),
        }
    }

    fn do_load(&mut self, addr: u32, size: Size, faulting_pc: u32) -> i32 {
        if addr & size.align_mask() != 0 {
            self.pc = exception::raise(&mut self.cfg, Cause::LoadAddressMisaligned, addr, faulting_pc);
            self.exception = true;
            return 0xEEEE_EEEEu32 as i32;
        }
        if region_of(addr) == Region::Data && !self.cfg.supervisor() && !self.dmpu.permits(addr, PERM_READ) {
            warn!(addr = format_args!("{addr:#010x}"), "load access fault");
            self.pc = exception::raise(&mut self.cfg, Cause::LoadAccessFault, addr, faulting_pc);
            self.exception = true;
            return 0xEEEE_EEEEu32 as i32;
        }
        let word = self.mem.read_word(addr);
        let raw = size.extract_lane(word, addr);
        size.sign_extend(raw)
    }

    fn do_store(&mut self, addr: u32, size: Size, value: i32, faulting_pc: u32) {
        if addr & size.align_mask() != 0 {
            self.pc = exception::raise(&mut self.cfg, Cause::StoreAddressMisaligned, addr, faulting_pc);
            self.exception = true;
            return;
        }
        if region_of(addr) == Region::Data && !self.cfg.supervisor() && !self.dmpu.permits(addr, PERM_WRITE) {
            warn!(addr = format_args!("{addr:#010x}"), "store access fault");
            self.pc = exception::raise(&mut self.cfg, Cause::StoreAccessFault, addr, faulting_pc);
            self.exception = true;
            return;
        }
        let mask = size.write_mask(addr);
        let lane_shift = (addr & 0b11) * 8;
        let shifted = (value as u32).wrapping_shl(lane_shift);
        self.mem.write_word_masked(addr, mask, shifted);
    }
}
