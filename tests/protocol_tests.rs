//! Integration tests for the host framing protocol against real byte
//! streams (`std::io::Cursor`), exercising the escape-byte command-mode
//! transition end to end rather than just the individual helpers.

use std::io::Cursor;

use f32sys::protocol::{
    self, ChecksumReader, OpenMode, CMD_OPEN, ESCAPE_BYTE,
};

#[test]
fn reading_an_escaped_command_word_resets_the_checksum_to_the_escape_byte() {
    // CMD_OPEN = 0x0101_02B0 little-endian on the wire: B0 02 01 01
    let bytes = vec![ESCAPE_BYTE, 0x02, 0x01, 0x01];
    let mut reader = ChecksumReader::new(Cursor::new(bytes));
    let first = reader.read_byte().unwrap();
    assert_eq!(first, ESCAPE_BYTE);

    let command = protocol::read_command_word(&mut reader).unwrap();
    assert_eq!(command, CMD_OPEN);
    assert_eq!(reader.checksum(), ESCAPE_BYTE as u32 + 0x02 + 0x01 + 0x01);
}

#[test]
fn open_request_payload_round_trips_through_checksum_reader() {
    let mut payload = 1u32.to_le_bytes().to_vec(); // OpenMode::Write
    payload.extend_from_slice(b"out.bin\0");
    let length_bytes = (payload.len() as u32).to_le_bytes();

    // The running checksum covers every byte read through the reader
    // since the start of the command, which includes the length field
    // read ahead of the payload by `read_u32_le` below — not just the
    // payload bytes.
    let checksum: u32 = length_bytes
        .iter()
        .chain(payload.iter())
        .fold(0u32, |acc, &b| acc.wrapping_add(b as u32));

    let mut frame = length_bytes.to_vec();
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&checksum.to_le_bytes());

    let mut reader = ChecksumReader::new(Cursor::new(frame));
    let length = reader.read_u32_le().unwrap();
    let read_back = reader.read_payload_and_verify(length).unwrap();
    let (mode, name) = protocol::parse_open_payload(&read_back).unwrap();
    assert_eq!(mode, OpenMode::Write);
    assert_eq!(name, "out.bin");
}

#[test]
fn corrupted_trailing_checksum_is_rejected() {
    let payload = b"hi\0".to_vec();
    let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // deliberately wrong

    let mut reader = ChecksumReader::new(Cursor::new(frame));
    let length = reader.read_u32_le().unwrap();
    assert!(reader.read_payload_and_verify(length).is_err());
}

#[test]
fn boot_image_wire_format_starts_with_the_marker_and_byte_length() {
    let words = vec![0x1000_0000u32, 0x2000_0000, 0x3000_0000];
    let image = protocol::build_boot_image(&words);

    let marker = u32::from_le_bytes(image[0..4].try_into().unwrap());
    let byte_len = u32::from_le_bytes(image[4..8].try_into().unwrap());
    assert_eq!(marker, protocol::BOOT_START_MARKER);
    assert_eq!(byte_len, 12);
    assert_eq!(image.len(), 8 + 12 + 4);

    let trailing = u32::from_le_bytes(image[image.len() - 4..].try_into().unwrap());
    let expected: u32 = words.iter().fold(0u32, |acc, &w| acc.wrapping_add(w));
    assert_eq!(trailing, expected);
}

#[test]
fn response_frame_echoes_the_command_and_length_before_the_payload() {
    let payload = 7u32.to_le_bytes();
    let frame = protocol::build_response_frame(protocol::REPLY_OPEN_OK, &payload);
    let command = u32::from_le_bytes(frame[0..4].try_into().unwrap());
    let length = u32::from_le_bytes(frame[4..8].try_into().unwrap());
    assert_eq!(command, protocol::REPLY_OPEN_OK);
    assert_eq!(length, 4);
    assert_eq!(&frame[8..12], &payload);
}
