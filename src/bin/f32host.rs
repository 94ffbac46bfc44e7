//! `f32host`: the serial-port companion that boots an F32 target and
//! services its file-open requests over the framed protocol.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use f32sys::error::HostError;
use f32sys::logging;
use f32sys::protocol::{
    self, ChecksumReader, OpenMode, CMD_BOOT, CMD_CLOSE, CMD_OPEN, CMD_READ, CMD_WRITE, ESCAPE_BYTE,
    REPLY_OPEN_ERR, REPLY_OPEN_OK,
};

/// Matches the original tool's fixed baud rate.
const DEFAULT_BAUD: u32 = 2_000_000;

#[derive(Parser, Debug)]
#[command(name = "f32host", about = "F32 serial host companion")]
struct Args {
    /// Serial device path (e.g. /dev/ttyUSB0, COM3).
    #[arg(short = 'p', long = "port")]
    port: String,

    /// Baud rate.
    #[arg(short = 'b', long = "baud", default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// ASCII hex boot image to send on BOOT.
    #[arg(long = "boot-image", default_value = "asm.hex")]
    boot_image: String,

    /// Optional file to mirror every boot-image byte into, for later
    /// UART-replay in the simulator.
    #[arg(long = "dump")]
    dump: Option<String>,
}

fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let args = Args::parse();

    let port = serialport::new(&args.port, args.baud)
        .timeout(Duration::from_millis(500))
        .open()
        .map_err(HostError::from)?;
    let mut writer = port.try_clone().map_err(HostError::from)?;
    let mut reader = ChecksumReader::new(port);

    let mut dump_file = match &args.dump {
        Some(path) => Some(File::create(path)?),
        None => None,
    };

    info!(port = %args.port, baud = args.baud, "host companion listening");

    // Files opened by the target over the session. CLOSE is a
    // reserved, unimplemented command (matching the original tool at
    // the time this was distilled), so entries simply accumulate; the
    // handle returned to the target is this table's index.
    let mut open_files: Vec<File> = Vec::new();

    loop {
        let byte = match reader.read_byte() {
            Ok(b) => b,
            Err(HostError::LinkClosed) => {
                warn!("serial link closed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if byte == ESCAPE_BYTE {
            if let Err(e) = command_mode(&mut reader, writer.as_mut(), &args, &mut dump_file, &mut open_files) {
                error!(error = %e, "command mode failed");
            }
        } else {
            protocol::echo_byte(byte);
        }
    }
}

fn command_mode(
    reader: &mut ChecksumReader<Box<dyn serialport::SerialPort>>,
    writer: &mut dyn serialport::SerialPort,
    args: &Args,
    dump_file: &mut Option<File>,
    open_files: &mut Vec<File>,
) -> Result<(), HostError> {
    let command = protocol::read_command_word(reader)?;
    match command {
        CMD_BOOT => send_boot_image(&args.boot_image, writer, dump_file),
        CMD_OPEN => handle_open(reader, writer, open_files),
        CMD_CLOSE | CMD_READ | CMD_WRITE => {
            warn!(command = format_args!("{command:#010x}"), "reserved command recognized but not implemented");
            Ok(())
        }
        other => {
            warn!(command = format_args!("{other:#010x}"), "unknown command");
            Ok(())
        }
    }
}

fn send_boot_image(
    path: &str,
    writer: &mut dyn serialport::SerialPort,
    dump_file: &mut Option<File>,
) -> Result<(), HostError> {
    let text = fs::read_to_string(path)?;
    let mut words = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let word = u32::from_str_radix(line.trim_start_matches("0x"), 16).map_err(|_| {
            HostError::MalformedBootImage {
                path: path.to_string(),
                line: lineno + 1,
            }
        })?;
        words.push(word);
    }
    let image = protocol::build_boot_image(&words);
    writer.write_all(&image)?;
    if let Some(dump) = dump_file {
        for w in &words {
            writeln!(dump, "{w:08x}")?;
        }
    }
    info!(path, words = words.len(), "sent boot image");
    Ok(())
}

fn handle_open(
    reader: &mut ChecksumReader<Box<dyn serialport::SerialPort>>,
    writer: &mut dyn serialport::SerialPort,
    open_files: &mut Vec<File>,
) -> Result<(), HostError> {
    let length = reader.read_u32_le()?;
    let payload = reader.read_payload_and_verify(length)?;
    let Some((mode, filename)) = protocol::parse_open_payload(&payload) else {
        protocol::send_response(writer, REPLY_OPEN_ERR, &22u32.to_le_bytes())?; // EINVAL
        return Ok(());
    };

    let mut open_opts = OpenOptions::new();
    match mode {
        OpenMode::Read => {
            open_opts.read(true);
        }
        OpenMode::Write => {
            open_opts.write(true).create(true).truncate(true);
        }
        OpenMode::Append => {
            open_opts.append(true).create(true);
        }
    }

    match open_opts.open(&filename) {
        Ok(file) => {
            open_files.push(file);
            let handle = (open_files.len() - 1) as u32;
            protocol::send_response(writer, REPLY_OPEN_OK, &handle.to_le_bytes())?;
            info!(filename, mode = ?mode, "opened file");
        }
        Err(e) => {
            let errno = e.raw_os_error().unwrap_or(-1) as u32;
            protocol::send_response(writer, REPLY_OPEN_ERR, &errno.to_le_bytes())?;
            warn!(filename, error = %e, "open failed");
        }
    }
    Ok(())
}
