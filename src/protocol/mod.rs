//! Memcached ASCII protocol, client side

pub mod command;
pub mod response;

pub use command::{Command, MAX_KEY_LENGTH, is_valid_key};
pub use response::{ParseResult, Response, parse};
