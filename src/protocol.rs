//! The host framing protocol: command-mode escape detection, packet
//! assembly, and the running checksum. The checksum is a property of
//! the byte stream, so it's modeled as a small reader whose
//! `read_byte` updates a running sum as it goes.

use std::io::{self, Read, Write};

use crate::error::HostError;

pub const ESCAPE_BYTE: u8 = 0xB0;

pub const CMD_BOOT: u32 = 0x0000_02B0;
pub const CMD_OPEN: u32 = 0x0101_02B0;
pub const CMD_CLOSE: u32 = 0x0102_02B0;
pub const CMD_READ: u32 = 0x0103_02B0;
pub const CMD_WRITE: u32 = 0x0104_02B0;

pub const REPLY_OPEN_OK: u32 = 0x0201_02B0;
pub const REPLY_OPEN_ERR: u32 = 0x0202_02B0;

pub const BOOT_START_MARKER: u32 = 0x0100_02B0;

/// Open-file mode carried in an OPEN request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    pub fn from_u32(value: u32) -> Option<OpenMode> {
        match value {
            0 => Some(OpenMode::Read),
            1 => Some(OpenMode::Write),
            2 => Some(OpenMode::Append),
            _ => None,
        }
    }
}

/// Wraps any byte source and tallies a running 32-bit sum of every
/// byte pulled through it, starting from whenever the caller resets
/// the tally (at the start of a command).
pub struct ChecksumReader<R> {
    inner: R,
    sum: u32,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(inner: R) -> Self {
        ChecksumReader { inner, sum: 0 }
    }

    pub fn reset(&mut self, seed_byte: u8) {
        self.sum = seed_byte as u32;
    }

    pub fn checksum(&self) -> u32 {
        self.sum
    }

    pub fn read_byte(&mut self) -> Result<u8, HostError> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf).map_err(|_| HostError::LinkClosed)?;
        self.sum = self.sum.wrapping_add(buf[0] as u32);
        Ok(buf[0])
    }

    pub fn read_u32_le(&mut self) -> Result<u32, HostError> {
        let mut word = 0u32;
        for i in 0..4 {
            word |= (self.read_byte()? as u32) << (8 * i);
        }
        Ok(word)
    }

    /// Read a length-prefixed frame body: already past command+length,
    /// reads `length` payload bytes then the trailing checksum word
    /// and verifies it against the running tally.
    pub fn read_payload_and_verify(&mut self, length: u32) -> Result<Vec<u8>, HostError> {
        let mut payload = Vec::with_capacity(length as usize);
        for _ in 0..length {
            payload.push(self.read_byte()?);
        }
        let expected = self.checksum();
        let got = self.read_u32_le_unchecked()?;
        if expected != got {
            return Err(HostError::ChecksumMismatch { expected, got });
        }
        Ok(payload)
    }

    /// Like `read_u32_le` but does not fold the bytes into the running
    /// checksum — used only for reading the trailing checksum word
    /// itself, which is not part of its own tally.
    fn read_u32_le_unchecked(&mut self) -> Result<u32, HostError> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf).map_err(|_| HostError::LinkClosed)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// Build a response frame: command word, payload length, payload,
/// then a trailing checksum that sums only the payload bytes.
pub fn build_response_frame(command: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + payload.len());
    out.extend_from_slice(&command.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    let sum: u32 = payload.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
    out.extend_from_slice(&sum.to_le_bytes());
    out
}

/// Send a response frame over `port`.
pub fn send_response(port: &mut dyn Write, command: u32, payload: &[u8]) -> Result<(), HostError> {
    let frame = build_response_frame(command, payload);
    port.write_all(&frame)?;
    Ok(())
}

/// Build the BOOT image wire format: start marker, byte length, the
/// program words, and a trailing checksum that sums every payload
/// word (not byte — matching the original tool, which summed 32-bit
/// words here rather than bytes as the OPEN/CLOSE frames do).
pub fn build_boot_image(words: &[u32]) -> Vec<u8> {
    let byte_len = (words.len() as u32) * 4;
    let mut out = Vec::with_capacity(8 + words.len() * 4 + 4);
    out.extend_from_slice(&BOOT_START_MARKER.to_le_bytes());
    out.extend_from_slice(&byte_len.to_le_bytes());
    let mut sum: u32 = 0;
    for &w in words {
        out.extend_from_slice(&w.to_le_bytes());
        sum = sum.wrapping_add(w);
    }
    out.extend_from_slice(&sum.to_le_bytes());
    out
}

/// Parse an OPEN request payload: 32-bit LE mode, then a
/// NUL-terminated filename.
pub fn parse_open_payload(payload: &[u8]) -> Option<(OpenMode, String)> {
    if payload.len() < 5 {
        return None;
    }
    let mode_raw = u32::from_le_bytes(payload[0..4].try_into().ok()?);
    let mode = OpenMode::from_u32(mode_raw)?;
    let name_bytes = &payload[4..];
    let nul = name_bytes.iter().position(|&b| b == 0)?;
    let name = std::str::from_utf8(&name_bytes[..nul]).ok()?.to_string();
    Some((mode, name))
}

/// Having just seen `ESCAPE_BYTE` on the wire, read the three
/// remaining bytes and assemble the 32-bit little-endian command word
/// (with the escape byte as its low byte). Resets the running
/// checksum to start counting from the escape byte, per the framing
/// rule that the tally covers "every received byte since the start of
/// the current command, including the initial 0xB0".
pub fn read_command_word<R: Read>(reader: &mut ChecksumReader<R>) -> Result<u32, HostError> {
    reader.reset(ESCAPE_BYTE);
    let b1 = reader.read_byte()? as u32;
    let b2 = reader.read_byte()? as u32;
    let b3 = reader.read_byte()? as u32;
    Ok((ESCAPE_BYTE as u32) | (b1 << 8) | (b2 << 16) | (b3 << 24))
}

/// The reply byte stream the host types while NOT in command mode:
/// every received byte is rendered to stdout, verbatim.
pub fn echo_byte(byte: u8) {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(&[byte]);
    let _ = stdout.flush();
}
