//! Synchronous exception and timer interrupt dispatch.
//!
//! Both are state transitions applied directly to the machine's
//! config registers and program counter — never a Rust-level error
//! thrown across an instruction boundary. The per-instruction
//! `exception` flag is how a fault suppresses that instruction's
//! writeback without unwinding anything.

use crate::regs::{ConfigRegisters, RESET_EVEC, STATUS_INTERRUPT, STATUS_SUPERVISOR};

/// The nine synchronous exception causes, numbered per the table this
/// expansion fixes in DESIGN.md (only "Illegal Instruction = 2" is
/// pinned down by the original tooling; the rest are this
/// implementation's own consistent assignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    InstructionAccessFault = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadAddressMisaligned = 4,
    StoreAddressMisaligned = 5,
    LoadAccessFault = 6,
    StoreAccessFault = 7,
    SystemCall = 8,
    IndexOutOfRange = 9,
}

impl Cause {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Cause::InstructionAccessFault => "instruction access fault",
            Cause::IllegalInstruction => "illegal instruction",
            Cause::Breakpoint => "breakpoint",
            Cause::LoadAddressMisaligned => "load address misaligned",
            Cause::StoreAddressMisaligned => "store address misaligned",
            Cause::LoadAccessFault => "load access fault",
            Cause::StoreAccessFault => "store access fault",
            Cause::SystemCall => "system call",
            Cause::IndexOutOfRange => "index out of range",
        }
    }
}

/// The literal exception vector the dispatcher always routes to. EVEC
/// is readable/writable and resets to the same value, but writing it
/// never changes where a real exception lands — see DESIGN.md.
pub const EXCEPTION_PC: u32 = RESET_EVEC;

/// Apply a synchronous exception: snapshot STATUS into ESTATUS, latch
/// cause and fault datum, rewind EPC to the faulting instruction,
/// force supervisor mode, and hand back the new PC. The caller is
/// responsible for setting its own `exception` flag so writeback is
/// suppressed.
pub fn raise(cfg: &mut ConfigRegisters, cause: Cause, edata: u32, faulting_pc: u32) -> u32 {
    cfg.estatus = cfg.status;
    cfg.ecause = cause.code();
    cfg.edata = edata;
    cfg.epc = faulting_pc;
    cfg.status |= STATUS_SUPERVISOR;
    EXCEPTION_PC
}

/// Called once per fetch cycle, before the instruction at `pc` runs.
/// Decrements TIMER; on the transition to zero, dispatches the timer
/// interrupt and returns the new PC. `next_pc` is the address that
/// will be fetched after the one about to execute, i.e. what IPC
/// should record.
pub fn tick_timer(cfg: &mut ConfigRegisters, next_pc: u32) -> Option<u32> {
    if cfg.timer == 0 {
        return None;
    }
    cfg.timer -= 1;
    if cfg.timer != 0 {
        return None;
    }
    cfg.istatus = cfg.status;
    cfg.icause = 1;
    cfg.ipc = next_pc;
    cfg.status |= STATUS_SUPERVISOR | STATUS_INTERRUPT;
    Some(cfg.intvec)
}

/// CFG return (`i=2`): odd `n13` is RTI (return from interrupt), even
/// is RTE (return from exception). Returns the restored PC.
pub fn cfg_return(cfg: &mut ConfigRegisters, n13: i32) -> u32 {
    if n13 & 1 != 0 {
        cfg.status = cfg.istatus;
        cfg.ipc
    } else {
        cfg.status = cfg.estatus;
        cfg.epc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_sets_supervisor_and_routes_to_fixed_pc() {
        let mut cfg = ConfigRegisters::new();
        cfg.status = 0; // pretend we were in user mode
        let pc = raise(&mut cfg, Cause::LoadAddressMisaligned, 0x1001, 0x1000);
        assert_eq!(pc, EXCEPTION_PC);
        assert_eq!(cfg.ecause, Cause::LoadAddressMisaligned.code());
        assert_eq!(cfg.edata, 0x1001);
        assert_eq!(cfg.epc, 0x1000);
        assert_eq!(cfg.estatus, 0);
        assert!(cfg.supervisor());
    }

    #[test]
    fn timer_fires_on_transition_to_zero() {
        let mut cfg = ConfigRegisters::new();
        cfg.timer = 1;
        cfg.intvec = 0x2000;
        let fired = tick_timer(&mut cfg, 0x100);
        assert_eq!(fired, Some(0x2000));
        assert_eq!(cfg.icause, 1);
        assert_eq!(cfg.ipc, 0x100);
    }

    #[test]
    fn timer_does_not_fire_early() {
        let mut cfg = ConfigRegisters::new();
        cfg.timer = 3;
        assert_eq!(tick_timer(&mut cfg, 0x10), None);
        assert_eq!(tick_timer(&mut cfg, 0x14), None);
        assert_eq!(tick_timer(&mut cfg, 0x18), Some(cfg.intvec));
    }

    #[test]
    fn rte_and_rti_restore_distinct_state() {
        let mut cfg = ConfigRegisters::new();
        cfg.epc = 0x10;
        cfg.estatus = 0x5;
        cfg.ipc = 0x20;
        cfg.istatus = 0x7;
        assert_eq!(cfg_return(&mut cfg, 0), 0x10);
        assert_eq!(cfg.status, 0x5);
        assert_eq!(cfg_return(&mut cfg, 1), 0x20);
        assert_eq!(cfg.status, 0x7);
    }
}
