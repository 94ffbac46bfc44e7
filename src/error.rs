//! Typed error surfaces for the core and for the host companion.
//!
//! In-machine faults (the nine exception causes) are not represented
//! here: they are state transitions handled entirely inside
//! [`crate::exception`], never an `Err` returned across an instruction
//! boundary. These types cover everything that stops the simulator or
//! host from making progress at all.

use thiserror::Error;

/// Errors that abort the simulator outright rather than being routed
/// to the in-machine exception dispatcher.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("could not read program file {path}: {source}")]
    ProgramRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed hex word on line {line} of {path}: {text:?}")]
    MalformedHexWord {
        path: String,
        line: usize,
        text: String,
    },

    #[error("could not open log sink {path}: {source}")]
    LogSink {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("instruction decode produced an impossible size field {0}")]
    InvalidSizeField(u32),

    #[error("instruction decode produced an impossible MUL sub-opcode {0}")]
    InvalidMulOp(u32),

    #[error("execution did not halt within {0} fetch cycles")]
    RunawayExecution(u64),

    #[error(
        "program halted on an in-machine exception (cause={cause}, edata={edata:#010x}, epc={epc:#010x})"
    )]
    Aborted { cause: u8, edata: u32, epc: u32 },
}

/// Errors raised by the host-side framing protocol and serial I/O.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame checksum mismatch: expected {expected:#010x}, got {got:#010x}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("serial link closed while reading a frame")]
    LinkClosed,

    #[error("boot image {path} contained a malformed hex word on line {line}")]
    MalformedBootImage { path: String, line: usize },
}
