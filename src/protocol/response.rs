//! Hand-written memcached ASCII response parser
//!
//! Two-phase parsing for retrievals:
//! 1. Parse the `VALUE <key> <flags> <bytes>` line (up to \r\n)
//! 2. Read the data block and the terminating `END`

use crate::ProtocolError;
use bytes::Bytes;

/// Parsed server response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// VALUE block followed by END
    Value { flags: u32, data: Bytes },
    /// END with no VALUE block (miss)
    End,
    Stored,
    NotStored,
    Exists,
    Deleted,
    NotFound,
    Version(String),
    /// ERROR: unknown command
    Error,
    ClientError(String),
    ServerError(String),
}

/// Result of parsing
#[derive(Debug)]
pub enum ParseResult {
    /// Response fully parsed, with the number of bytes consumed
    Complete(Response, usize),
    /// Need more data to complete parsing
    NeedMoreData,
    /// Parse error
    Error(ProtocolError),
}

/// Parse one response from the front of `buf`
pub fn parse(buf: &[u8]) -> ParseResult {
    let line_end = match find_crlf(buf) {
        Some(pos) => pos,
        None => return ParseResult::NeedMoreData,
    };

    let line = &buf[..line_end];
    let consumed = line_end + 2;

    let (word, rest) = match memchr::memchr(b' ', line) {
        Some(pos) => (&line[..pos], &line[pos + 1..]),
        None => (line, &[][..]),
    };

    let response = match word {
        b"VALUE" => return parse_value(rest, buf, consumed),
        b"END" => Response::End,
        b"STORED" => Response::Stored,
        b"NOT_STORED" => Response::NotStored,
        b"EXISTS" => Response::Exists,
        b"DELETED" => Response::Deleted,
        b"NOT_FOUND" => Response::NotFound,
        b"VERSION" => Response::Version(lossy(rest)),
        b"ERROR" => Response::Error,
        b"CLIENT_ERROR" => Response::ClientError(lossy(rest)),
        b"SERVER_ERROR" => Response::ServerError(lossy(rest)),
        _ => {
            return ParseResult::Error(ProtocolError::UnexpectedResponse(lossy(line)));
        }
    };

    ParseResult::Complete(response, consumed)
}

/// Parse `<key> <flags> <bytes>[ <cas>]`, then the data block and END
fn parse_value(header: &[u8], buf: &[u8], line_consumed: usize) -> ParseResult {
    let mut parts = header.split(|&b| b == b' ').filter(|p| !p.is_empty());

    if parts.next().is_none() {
        return ParseResult::Error(ProtocolError::UnexpectedResponse(
            "VALUE without key".to_string(),
        ));
    }

    let flags = match parts.next().and_then(parse_u32) {
        Some(f) => f,
        None => return ParseResult::Error(ProtocolError::InvalidFlags),
    };

    let bytes = match parts.next().and_then(parse_usize) {
        Some(b) => b,
        None => return ParseResult::Error(ProtocolError::InvalidBytesLength),
    };

    // The length comes from the server and may be arbitrarily large
    let data_start = line_consumed;
    let (data_end, total_needed) = match data_start
        .checked_add(bytes)
        .and_then(|end| Some((end, end.checked_add(2 + END.len())?)))
    {
        Some(bounds) => bounds,
        None => return ParseResult::Error(ProtocolError::InvalidBytesLength),
    };

    if buf.len() < total_needed {
        return ParseResult::NeedMoreData;
    }

    // Verify trailing \r\n after the data block
    if buf[data_end] != b'\r' || buf[data_end + 1] != b'\n' {
        return ParseResult::Error(ProtocolError::UnexpectedData);
    }

    // Single-key gets only ever carry one VALUE block
    if &buf[data_end + 2..total_needed] != END {
        return ParseResult::Error(ProtocolError::UnexpectedData);
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
    ParseResult::Complete(Response::Value { flags, data }, total_needed)
}

const END: &[u8] = b"END\r\n";

/// Find \r\n in buffer using SIMD-accelerated search
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    memchr::memmem::find(buf, b"\r\n")
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

/// Parse bytes as u32
fn parse_u32(bytes: &[u8]) -> Option<u32> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Parse bytes as usize
fn parse_usize(bytes: &[u8]) -> Option<usize> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
