//! # Handshake Frames
//!
//! Every transfer starts with a 12-byte request announcing the payload and
//! color mode. The panel answers with a 10-byte response.
//!
//! ## Request
//!
//! ```text
//! ┌────┬────┬────┬──────┬──────┬─────────┬───────┬─────────┬─────┬────┬────┬────┐
//! │ AA │ 55 │ E1 │ lenH │ lenL │ 2nd flg │ model │ 1st flg │ sum │ FF │ 0D │ 0A │
//! └────┴────┴────┴──────┴──────┴─────────┴───────┴─────────┴─────┴────┴────┴────┘
//!   0    1    2     3      4        5        6        7       8    9   10   11
//! ```
//!
//! `len` is `W*H/8` split big-endian; `sum` is the byte sum of `[0..8]`
//! modulo 256.
//!
//! ## Response
//!
//! ```text
//! ┌────┬────┬────┬───┬───┬───┬───┬───┬─────┬────┐
//! │ A0 │ 50 │ F1 │ . │ . │ . │ . │ . │ sum │ FF │
//! └────┴────┴────┴───┴───┴───┴───┴───┴─────┴────┘
//! ```

use thiserror::Error;

use crate::display::{ColorMode, DisplayConfig};

/// Length of a handshake request
pub const REQUEST_LEN: usize = 12;

/// Length of a handshake response
pub const RESPONSE_LEN: usize = 10;

/// First bytes of every request
pub const REQUEST_MAGIC: [u8; 3] = [0xAA, 0x55, 0xE1];
const RESPONSE_MAGIC: [u8; 3] = [0xA0, 0x50, 0xF1];
const TRAILER: u8 = 0xFF;

/// Why a handshake response was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeMismatch {
    #[error("wrong length: expected 10 bytes, got {0}")]
    WrongLength(usize),

    #[error("1st byte mismatch: expected 0xA0, got {0:#04X}")]
    FirstByte(u8),

    #[error("2nd byte mismatch: expected 0x50, got {0:#04X}")]
    SecondByte(u8),

    #[error("3rd byte mismatch (connection): expected 0xF1, got {0:#04X}")]
    Connection(u8),

    #[error("10th byte mismatch: expected 0xFF, got {0:#04X}")]
    Trailer(u8),

    #[error("9th byte mismatch (checksum): expected {expected:#04X}, got {actual:#04X}")]
    Checksum { expected: u8, actual: u8 },
}

/// Byte sum of the first eight bytes, modulo 256.
pub fn checksum(frame: &[u8]) -> u8 {
    frame
        .iter()
        .take(8)
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Build the request for a transfer in `mode`.
pub fn request(display: &DisplayConfig, mode: ColorMode) -> [u8; REQUEST_LEN] {
    // The length field always describes one 1-bit plane.
    let len = display.plane_len() as u16;
    let [len_hi, len_lo] = len.to_be_bytes();

    let mut frame = [
        REQUEST_MAGIC[0],
        REQUEST_MAGIC[1],
        REQUEST_MAGIC[2],
        len_hi,
        len_lo,
        mode.secondary_flag(),
        display.model_id,
        mode.primary_flag(),
        0,
        TRAILER,
        0x0D,
        0x0A,
    ];
    frame[8] = checksum(&frame);
    frame
}

/// Check a response frame. The first failing check is reported.
pub fn validate_response(response: &[u8]) -> Result<(), HandshakeMismatch> {
    if response.len() != RESPONSE_LEN {
        return Err(HandshakeMismatch::WrongLength(response.len()));
    }
    if response[0] != RESPONSE_MAGIC[0] {
        return Err(HandshakeMismatch::FirstByte(response[0]));
    }
    if response[1] != RESPONSE_MAGIC[1] {
        return Err(HandshakeMismatch::SecondByte(response[1]));
    }
    if response[2] != RESPONSE_MAGIC[2] {
        return Err(HandshakeMismatch::Connection(response[2]));
    }
    if response[9] != TRAILER {
        return Err(HandshakeMismatch::Trailer(response[9]));
    }

    let expected = checksum(response);
    if response[8] != expected {
        return Err(HandshakeMismatch::Checksum {
            expected,
            actual: response[8],
        });
    }

    Ok(())
}

/// Well-formed response frame, as a panel would send it.
pub fn response() -> [u8; RESPONSE_LEN] {
    let mut frame = [
        RESPONSE_MAGIC[0],
        RESPONSE_MAGIC[1],
        RESPONSE_MAGIC[2],
        0,
        0,
        0,
        0,
        0,
        0,
        TRAILER,
    ];
    frame[8] = checksum(&frame);
    frame
}

/// Render device bytes for logs: printable ASCII kept, the rest as `.`.
pub fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout_bw() {
        let frame = request(&DisplayConfig::IL075, ColorMode::Bw);
        // 48000 = 0xBB80
        assert_eq!(&frame[..8], &[0xAA, 0x55, 0xE1, 0xBB, 0x80, 0x00, 0xC4, 0x00]);
        assert_eq!(&frame[9..], &[0xFF, 0x0D, 0x0A]);
    }

    #[test]
    fn test_request_flags() {
        let bwr = request(&DisplayConfig::IL075, ColorMode::Bwr);
        assert_eq!((bwr[5], bwr[7]), (0x00, 0x01));

        let bwry = request(&DisplayConfig::IL075, ColorMode::Bwry);
        assert_eq!((bwry[5], bwry[7]), (0x04, 0x00));

        // Length field is the same in every mode
        assert_eq!(&bwry[3..5], &[0xBB, 0x80]);
    }

    #[test]
    fn test_request_checksum_law() {
        for mode in [ColorMode::Bw, ColorMode::Bwr, ColorMode::Bwry] {
            let frame = request(&DisplayConfig::IL075, mode);
            let sum: u32 = frame[..8].iter().map(|&b| u32::from(b)).sum();
            assert_eq!(frame[8], (sum % 256) as u8);
        }
    }

    #[test]
    fn test_valid_response() {
        let frame = [0xA0, 0x50, 0xF1, 0, 0, 0, 0, 0, 0xE1, 0xFF];
        assert_eq!(validate_response(&frame), Ok(()));
        assert_eq!(response(), frame);
    }

    #[test]
    fn test_response_checksum_mismatch() {
        for bad in [0x00u8, 0xE0, 0xE2, 0xFF] {
            let frame = [0xA0, 0x50, 0xF1, 0, 0, 0, 0, 0, bad, 0xFF];
            assert_eq!(
                validate_response(&frame),
                Err(HandshakeMismatch::Checksum {
                    expected: 0xE1,
                    actual: bad
                })
            );
        }
    }

    #[test]
    fn test_response_checksum_covers_payload_bytes() {
        let mut frame = [0xA0, 0x50, 0xF1, 1, 2, 3, 4, 5, 0, 0xFF];
        frame[8] = checksum(&frame);
        assert_eq!(frame[8], 0xF0);
        assert!(validate_response(&frame).is_ok());
    }

    #[test]
    fn test_response_distinct_diagnostics() {
        let good = response();

        assert_eq!(
            validate_response(&good[..9]),
            Err(HandshakeMismatch::WrongLength(9))
        );
        assert_eq!(validate_response(&[]), Err(HandshakeMismatch::WrongLength(0)));

        let mut f = good;
        f[0] = 0xA1;
        assert_eq!(validate_response(&f), Err(HandshakeMismatch::FirstByte(0xA1)));

        let mut f = good;
        f[1] = 0x51;
        assert_eq!(validate_response(&f), Err(HandshakeMismatch::SecondByte(0x51)));

        let mut f = good;
        f[2] = 0xF0;
        assert_eq!(validate_response(&f), Err(HandshakeMismatch::Connection(0xF0)));

        let mut f = good;
        f[9] = 0x00;
        assert_eq!(validate_response(&f), Err(HandshakeMismatch::Trailer(0x00)));
    }

    #[test]
    fn test_printable() {
        assert_eq!(printable(b"bytes=48000\r\n"), "bytes=48000..");
        assert_eq!(printable(&[0xA0, 0x41, 0x7F]), ".A.");
    }
}
