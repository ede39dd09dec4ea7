//! Memcached ASCII protocol request types and encoder

use crate::ProtocolError;
use bytes::BytesMut;
use itoa::Buffer;

/// Maximum key length (memcached spec)
pub const MAX_KEY_LENGTH: usize = 250;

/// Request sent to a memcached server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// get <key>
    Get { key: &'a [u8] },

    /// set <key> <flags> <exptime> <bytes>
    Set {
        key: &'a [u8],
        flags: u32,
        exptime: u32,
        data: &'a [u8],
    },

    /// delete <key>
    Delete { key: &'a [u8] },

    /// version
    Version,
}

impl Command<'_> {
    /// Key carried by this command, if any
    fn key(&self) -> Option<&[u8]> {
        match self {
            Command::Get { key } | Command::Set { key, .. } | Command::Delete { key } => Some(*key),
            Command::Version => None,
        }
    }

    /// Check the key and append the wire form of the command to `buf`
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if let Some(key) = self.key() {
            check_key(key)?;
        }

        match self {
            Command::Get { key } => {
                buf.extend_from_slice(b"get ");
                buf.extend_from_slice(key);
            }
            Command::Set {
                key,
                flags,
                exptime,
                data,
            } => {
                let mut itoa_buf = Buffer::new();
                buf.extend_from_slice(b"set ");
                buf.extend_from_slice(key);
                buf.extend_from_slice(b" ");
                buf.extend_from_slice(itoa_buf.format(*flags).as_bytes());
                buf.extend_from_slice(b" ");
                buf.extend_from_slice(itoa_buf.format(*exptime).as_bytes());
                buf.extend_from_slice(b" ");
                buf.extend_from_slice(itoa_buf.format(data.len()).as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
            }
            Command::Delete { key } => {
                buf.extend_from_slice(b"delete ");
                buf.extend_from_slice(key);
            }
            Command::Version => {
                buf.extend_from_slice(b"version");
            }
        }
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// Check if a key is valid
pub fn is_valid_key(key: &[u8]) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    // Keys cannot contain control characters or whitespace
    key.iter().all(|&b| b > 32 && b < 127)
}

fn check_key(key: &[u8]) -> Result<(), ProtocolError> {
    if is_valid_key(key) {
        Ok(())
    } else if key.len() > MAX_KEY_LENGTH {
        Err(ProtocolError::KeyTooLong)
    } else {
        Err(ProtocolError::InvalidKey(
            String::from_utf8_lossy(key).to_string(),
        ))
    }
}
