//! `f32sim`: loads an F32 program and runs it to completion, logging
//! to the five named sinks the original tooling produced.

use std::io::Write;

use clap::Parser;
use tracing::{error, info};

use f32sys::error::SimError;
use f32sys::executor::Machine;
use f32sys::logging::{self, LogSinks};
use f32sys::{loader, peripherals::Peripherals};

/// Default bound on the number of fetch cycles before the simulator
/// gives up on a program that never halts.
const DEFAULT_TIMEOUT: u64 = 10_000_000;

#[derive(Parser, Debug)]
#[command(name = "f32sim", about = "F32 instruction set simulator")]
struct Args {
    /// Abort immediately when the program raises an in-machine exception.
    #[arg(short = 'a', long = "abort-on-exception")]
    abort_on_exception: bool,

    /// Write a disassembled trace of every executed instruction to sim_trace.log.
    #[arg(short = 't', long = "trace")]
    trace: bool,

    /// Maximum number of fetch cycles before giving up on a runaway program.
    #[arg(long = "timeout", default_value_t = DEFAULT_TIMEOUT)]
    timeout: u64,

    /// ASCII hex program file.
    program: String,
}

fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let args = Args::parse();

    let words = loader::load_hex_words(&args.program)?;
    let labels = loader::load_labels("asm.labels");
    let uart_replay = loader::load_uart_replay("uart_input.hex");

    let sinks = LogSinks::open(args.trace)?;

    let peripherals = Peripherals::with_sinks(Box::new(sinks.uart), Box::new(sinks.blit), uart_replay);
    let mut machine = Machine::new(peripherals);
    machine.load_program(&words);
    machine.labels = labels;
    machine.abort_on_exception = args.abort_on_exception;
    machine.reg_sink = Some(Box::new(sinks.reg));
    if let Some(trace_file) = sinks.trace {
        machine.trace_sink = Some(Box::new(trace_file));
    }

    info!(program = %args.program, words = words.len(), "loaded program");

    match machine.run(args.timeout) {
        Ok(()) => {
            info!("program halted");
            Ok(())
        }
        Err(SimError::Aborted { cause, edata, epc }) => {
            error!(cause, edata = format_args!("{edata:#010x}"), epc = format_args!("{epc:#010x}"), "aborted on exception");
            dump_registers(&machine);
            std::process::exit(1);
        }
        Err(other) => Err(other.into()),
    }
}

fn dump_registers(machine: &Machine) {
    let mut out = std::io::stderr();
    for i in 0..32u32 {
        let _ = writeln!(out, "r{i:<2} = {:#010x}", machine.regs.read(i) as u32);
    }
}
