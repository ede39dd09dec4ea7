//! Error types for mcstash

use thiserror::Error;

/// Main error type for mcstash
#[derive(Error, Debug)]
pub enum McStashError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed opening memcached connection: {0}")]
    Connection(#[source] ClientError),

    #[error("Connection not started")]
    NotStarted,

    #[error("Invalid segment name: {0}")]
    Segment(#[from] SegmentError),

    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Errors surfaced by the memcached client or server, passed through unchanged
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Segment name validation failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    #[error("Empty string")]
    Empty,

    #[error("Includes null character")]
    NullCharacter,

    #[error("Includes space character")]
    Whitespace,
}

/// Stored payload could not be turned back into an envelope
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Not parseable, or parsed to an empty/falsy value
    #[error("Bad envelope content")]
    BadContent,

    /// Parsed, but `item` or `stored` is missing or unusable
    #[error("Incorrect envelope structure")]
    IncorrectStructure,
}

/// Errors from the underlying memcached client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("SERVER_ERROR {0}")]
    Server(String),

    #[error("CLIENT_ERROR {0}")]
    ClientRejected(String),

    #[error("Server does not recognise the command")]
    UnknownCommand,

    #[error("Item not stored")]
    NotStored,

    #[error("Server {0} is marked as dead")]
    ServerDead(String),

    #[error("Client has been closed")]
    Closed,
}

/// Protocol encoding and response parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key too long (max 250 bytes)")]
    KeyTooLong,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid flags")]
    InvalidFlags,

    #[error("Invalid bytes length")]
    InvalidBytesLength,

    #[error("Unexpected data")]
    UnexpectedData,
}

pub type Result<T> = std::result::Result<T, McStashError>;
