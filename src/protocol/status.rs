//! Device status line parsing.
//!
//! After a transfer the panel may report how many payload bytes it counted,
//! as one text line of the form `<label>=<count>`, e.g. `bytes=48000\r\n`.

use crate::error::PaperlinkError;

/// Parse a `label=count` line and return the count.
///
/// Surrounding whitespace and line terminators are ignored. The label may
/// be anything without `=`; the count must be plain decimal digits.
pub fn parse_status_line(line: &[u8]) -> Result<usize, PaperlinkError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| malformed(line, "not valid UTF-8"))?
        .trim();

    let (_, count) = text
        .split_once('=')
        .ok_or_else(|| malformed(line, "missing '='"))?;
    if count.contains('=') {
        return Err(malformed(line, "more than one '='"));
    }

    let count = count.trim();
    if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(line, "count is not a decimal number"));
    }

    count
        .parse()
        .map_err(|e| malformed(line, &format!("unable to read bytes count: {}", e)))
}

/// Compare a reported count with the payload length.
pub fn verify_count(line: &[u8], expected: usize) -> Result<(), PaperlinkError> {
    let received = parse_status_line(line)?;
    if received != expected {
        return Err(PaperlinkError::VerificationMismatch { expected, received });
    }
    Ok(())
}

fn malformed(line: &[u8], reason: &str) -> PaperlinkError {
    PaperlinkError::Validation(format!(
        "malformed status line \"{}\": {}",
        super::handshake::printable(line),
        reason
    ))
}
