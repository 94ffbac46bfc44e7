//! A minimal trace disassembler: renders a decoded instruction as a
//! short mnemonic line for the trace log. Fidelity is deliberately low
//! — the only consumer is a human reading `sim_trace.log`.

use std::collections::HashMap;

use crate::decode::{Instr, Kind};

/// Look up a label for an address, falling back to raw hex.
pub fn symbol<'a>(labels: &'a HashMap<u32, String>, addr: u32) -> std::borrow::Cow<'a, str> {
    match labels.get(&addr) {
        Some(name) => std::borrow::Cow::Borrowed(name.as_str()),
        None => std::borrow::Cow::Owned(format!("{addr:#010x}")),
    }
}

/// Render `instr`, fetched from `pc`, as a one-line trace entry.
pub fn render(pc: u32, instr: &Instr, labels: &HashMap<u32, String>) -> String {
    let Some(kind) = instr.kind else {
        return format!("{pc:#010x}: .word {:#010x}  ; illegal", instr.word);
    };
    let body = match kind {
        Kind::Alu | Kind::Alui => {
            format!("{} r{}, r{}, {}", kind.mnemonic(), instr.d, instr.a, operand(kind, instr))
        }
        Kind::Bra => format!(
            "bra.{} r{}, r{}, {}",
            instr.i,
            instr.a,
            instr.b,
            symbol(labels, pc.wrapping_add((instr.n13s * 4) as u32))
        ),
        Kind::Ld => format!("ld.{} r{}, {}(r{})", instr.i, instr.d, instr.n13, instr.a),
        Kind::St => format!("st.{} {}(r{}), r{}", instr.i, instr.n13s, instr.a, instr.b),
        Kind::Jmp => format!("jmp r{}, {}", instr.d, symbol(labels, pc.wrapping_add((instr.n21 * 4) as u32))),
        Kind::Jmpr => format!("jmpr r{}, r{}, {}", instr.d, instr.a, instr.n13),
        Kind::Ldu => format!("ldu r{}, {:#010x}", instr.d, (instr.n21 as u32) << 11),
        Kind::Ldpc => format!("ldpc r{}, {}", instr.d, instr.n21),
        Kind::Mul | Kind::Muli => {
            format!("{} r{}, r{}, {}", kind.mnemonic(), instr.d, instr.a, operand(kind, instr))
        }
        Kind::Cfg => format!("cfg.{} r{}, r{}, #{}", instr.i, instr.d, instr.a, instr.n13),
        Kind::Idx => format!("idx.{} r{}, r{}, r{}", instr.i, instr.d, instr.a, instr.b),
    };
    format!("{pc:#010x}: {body}")
}

fn operand(kind: Kind, instr: &Instr) -> String {
    match kind {
        Kind::Alui | Kind::Muli => format!("#{}", instr.n13),
        _ => format!("r{}", instr.b),
    }
}
