//! Ambient logging setup. Structured diagnostics go through `tracing`;
//! the five plaintext sinks the original tooling wrote
//! (`sim_reg.log`, `sim_uart.log`, `sim_blit.log`, `sim_mem.log`,
//! `sim_trace.log`) are a distinct, literal feature and are opened and
//! written directly.

use std::fs::File;
use std::io;

use tracing_subscriber::EnvFilter;

use crate::error::SimError;

/// Install a `tracing` subscriber reading `RUST_LOG`, defaulting to
/// `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn open(path: &str) -> Result<File, SimError> {
    File::create(path).map_err(|source| SimError::LogSink {
        path: path.to_string(),
        source,
    })
}

/// The five named log sinks, opened (truncated) in the current
/// directory, matching where the original tooling wrote them.
pub struct LogSinks {
    pub reg: File,
    pub uart: File,
    pub blit: File,
    pub mem: File,
    pub trace: Option<File>,
}

impl LogSinks {
    pub fn open(trace_enabled: bool) -> Result<LogSinks, SimError> {
        Ok(LogSinks {
            reg: open("sim_reg.log")?,
            uart: open("sim_uart.log")?,
            blit: open("sim_blit.log")?,
            mem: open("sim_mem.log")?,
            trace: if trace_enabled {
                Some(open("sim_trace.log")?)
            } else {
                None
            },
        })
    }
}

/// A writer that silently discards everything, used when a sink is
/// disabled (e.g. tracing is off) but the caller still needs a
/// `Write` to hand to a component.
pub fn null_sink() -> Box<dyn io::Write + Send> {
    Box::new(io::sink())
}
