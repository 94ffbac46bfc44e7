//! Reads the ASCII hex program file, the optional label table, and
//! the optional UART replay stream.

use std::collections::{HashMap, VecDeque};
use std::fs;

use crate::error::SimError;

/// Parse `path` as one hex word per line and return them in file
/// order, ready to drop into program ROM starting at word 0.
pub fn load_hex_words(path: &str) -> Result<Vec<u32>, SimError> {
    let text = fs::read_to_string(path).map_err(|source| SimError::ProgramRead {
        path: path.to_string(),
        source,
    })?;
    let mut words = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let trimmed = trimmed.trim_start_matches("0x").trim_start_matches("0X");
        let word = u32::from_str_radix(trimmed, 16).map_err(|_| SimError::MalformedHexWord {
            path: path.to_string(),
            line: lineno + 1,
            text: line.to_string(),
        })?;
        words.push(word);
    }
    Ok(words)
}

/// Parse `asm.labels`: one `<hex address> <name>` pair per line.
/// Missing file is not an error — the label table is a diagnostic aid.
pub fn load_labels(path: &str) -> HashMap<u32, String> {
    let mut labels = HashMap::new();
    let Ok(text) = fs::read_to_string(path) else {
        return labels;
    };
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let Some(addr_str) = parts.next() else { continue };
        let Some(name) = parts.next() else { continue };
        let addr_str = addr_str.trim_start_matches("0x").trim_start_matches("0X");
        if let Ok(addr) = u32::from_str_radix(addr_str, 16) {
            labels.insert(addr, name.trim().to_string());
        }
    }
    labels
}

/// Parse `uart_input.hex` into the replay queue the UART RX register
/// drains from. Missing file means an empty replay stream (every read
/// is immediately idle).
pub fn load_uart_replay(path: &str) -> VecDeque<u32> {
    match load_hex_words(path) {
        Ok(words) => words.into_iter().collect(),
        Err(_) => VecDeque::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_plain_and_prefixed_hex() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "ABCD1234").unwrap();
        writeln!(f, "0x1").unwrap();
        writeln!(f).unwrap();
        let words = load_hex_words(f.path().to_str().unwrap()).unwrap();
        assert_eq!(words, vec![0xABCD1234, 1]);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "not-hex").unwrap();
        assert!(load_hex_words(f.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn missing_label_file_yields_empty_map() {
        assert!(load_labels("/nonexistent/asm.labels").is_empty());
    }

    #[test]
    fn parses_labels() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "FFFF0000 _start").unwrap();
        let labels = load_labels(f.path().to_str().unwrap());
        assert_eq!(labels.get(&0xFFFF_0000).map(String::as_str), Some("_start"));
    }
}
