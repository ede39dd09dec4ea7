//! A single TCP connection to a memcached server

use crate::error::ClientError;
use crate::protocol::{ParseResult, Response, parse};
use bytes::BytesMut;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

const READ_BUFFER_SIZE: usize = 8192;

/// Connected socket with its own read buffer
pub(crate) struct Socket {
    stream: TcpStream,
    read_buf: BytesMut,
    last_used: Instant,
}

impl Socket {
    /// Open a connection to `location` (`host:port`)
    pub(crate) async fn connect(location: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(location).await?;

        // Disable Nagle's algorithm for lower latency
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        debug!("Opened connection to {}", location);

        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            last_used: Instant::now(),
        })
    }

    /// Time since the last completed request
    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Write an encoded request and read exactly one response
    pub(crate) async fn round_trip(&mut self, request: &[u8]) -> Result<Response, ClientError> {
        self.stream.write_all(request).await?;

        loop {
            match parse(&self.read_buf) {
                ParseResult::Complete(response, consumed) => {
                    let _ = self.read_buf.split_to(consumed);
                    self.last_used = Instant::now();
                    trace!("Response: {:?}", response);
                    return Ok(response);
                }
                ParseResult::NeedMoreData => {
                    let n = self.stream.read_buf(&mut self.read_buf).await?;
                    if n == 0 {
                        return Err(ClientError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed by server",
                        )));
                    }
                }
                ParseResult::Error(e) => return Err(e.into()),
            }
        }
    }
}
