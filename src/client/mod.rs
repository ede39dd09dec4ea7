//! Pooled memcached ASCII client for a single server
//!
//! Sockets are opened lazily on first use, so constructing a [`Client`]
//! never touches the network and an unreachable server only shows up as an
//! error on the first request.

mod socket;

use crate::config::ClientSettings;
use crate::error::{ClientError, ProtocolError};
use crate::protocol::{Command, Response};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use socket::Socket;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failure accounting for the server
#[derive(Debug, Default)]
struct Health {
    consecutive_failures: u32,
    dead_until: Option<Instant>,
}

/// Memcached client with a bounded socket pool
pub struct Client {
    location: String,
    settings: ClientSettings,
    idle: Arc<Mutex<Vec<Socket>>>,
    slots: Semaphore,
    health: Mutex<Health>,
    cancel_token: CancellationToken,
}

impl Client {
    /// Create a client for `location`.
    ///
    /// When `idle_ms` is non-zero a background task reaps idle sockets, so
    /// this must be called from within a Tokio runtime.
    pub fn new(location: &str, settings: ClientSettings) -> Self {
        let idle = Arc::new(Mutex::new(Vec::new()));
        let cancel_token = CancellationToken::new();

        if settings.idle_ms > 0 {
            spawn_reaper(
                Arc::clone(&idle),
                Duration::from_millis(settings.idle_ms),
                cancel_token.clone(),
            );
        }

        Self {
            location: location.to_string(),
            slots: Semaphore::new(settings.pool_size.max(1)),
            settings,
            idle,
            health: Mutex::new(Health::default()),
            cancel_token,
        }
    }

    /// Fetch a value; a miss is `Ok(None)`
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, ClientError> {
        match self.request(&Command::Get { key: key.as_bytes() }).await? {
            Response::Value { data, .. } => Ok(Some(data)),
            Response::End => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    /// Store a value with an expiration time in seconds
    pub async fn set(&self, key: &str, value: &[u8], exptime: u32) -> Result<(), ClientError> {
        let cmd = Command::Set {
            key: key.as_bytes(),
            flags: 0,
            exptime,
            data: value,
        };
        match self.request(&cmd).await? {
            Response::Stored => Ok(()),
            Response::NotStored => Err(ClientError::NotStored),
            other => Err(unexpected(other)),
        }
    }

    /// Delete a key; returns whether the key existed
    pub async fn delete(&self, key: &str) -> Result<bool, ClientError> {
        match self.request(&Command::Delete { key: key.as_bytes() }).await? {
            Response::Deleted => Ok(true),
            Response::NotFound => Ok(false),
            other => Err(unexpected(other)),
        }
    }

    /// Server version string
    pub async fn version(&self) -> Result<String, ClientError> {
        match self.request(&Command::Version).await? {
            Response::Version(version) => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Close all sockets. Later requests fail with [`ClientError::Closed`].
    pub fn end(&self) {
        self.cancel_token.cancel();
        self.slots.close();
        let closed = std::mem::take(&mut *self.idle.lock()).len();
        debug!("Closed client for {} ({} idle sockets)", self.location, closed);
    }

    /// Returns true once `end` has been called
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn request(&self, cmd: &Command<'_>) -> Result<Response, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        // Bad keys are rejected before any socket is touched
        let mut buf = BytesMut::new();
        cmd.encode(&mut buf)?;

        self.check_alive()?;

        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| ClientError::Closed)?;

        let mut socket = match self.checkout() {
            Some(socket) => socket,
            None => self.connect().await?,
        };

        match self.with_timeout(socket.round_trip(&buf)).await {
            Ok(Ok(response)) => {
                self.record_success();
                self.checkin(socket);
                Ok(response)
            }
            // The socket is dropped: its stream position is unknown
            Ok(Err(e)) => {
                self.record_failure();
                Err(e)
            }
            Err(timeout) => {
                self.record_failure();
                Err(timeout)
            }
        }
    }

    /// Open a new socket, retrying up to `retries` extra times
    async fn connect(&self) -> Result<Socket, ClientError> {
        let mut last_error = None;

        for attempt in 0..=self.settings.retries {
            match self.with_timeout(Socket::connect(&self.location)).await {
                Ok(Ok(socket)) => return Ok(socket),
                Ok(Err(e)) => {
                    debug!(
                        "Connect attempt {} to {} failed: {}",
                        attempt + 1,
                        self.location,
                        e
                    );
                    last_error = Some(ClientError::Io(e));
                }
                Err(timeout) => {
                    debug!(
                        "Connect attempt {} to {} timed out",
                        attempt + 1,
                        self.location
                    );
                    last_error = Some(timeout);
                }
            }
        }

        self.record_failure();
        Err(last_error.unwrap_or(ClientError::Closed))
    }

    async fn with_timeout<F: Future>(&self, fut: F) -> Result<F::Output, ClientError> {
        if self.settings.timeout_ms == 0 {
            return Ok(fut.await);
        }
        tokio::time::timeout(Duration::from_millis(self.settings.timeout_ms), fut)
            .await
            .map_err(|_| ClientError::Timeout(self.settings.timeout_ms))
    }

    fn checkout(&self) -> Option<Socket> {
        let mut idle = self.idle.lock();
        if self.settings.idle_ms > 0 {
            let max_idle = Duration::from_millis(self.settings.idle_ms);
            idle.retain(|socket| socket.idle_for() < max_idle);
        }
        idle.pop()
    }

    fn checkin(&self, socket: Socket) {
        if !self.is_closed() {
            self.idle.lock().push(socket);
        }
    }

    fn check_alive(&self) -> Result<(), ClientError> {
        let mut health = self.health.lock();
        match health.dead_until {
            Some(until) if Instant::now() < until => {
                Err(ClientError::ServerDead(self.location.clone()))
            }
            Some(_) => {
                info!("Retrying server {} after dead period", self.location);
                health.dead_until = None;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn record_success(&self) {
        self.health.lock().consecutive_failures = 0;
    }

    fn record_failure(&self) {
        let mut health = self.health.lock();
        health.consecutive_failures += 1;
        if health.consecutive_failures > self.settings.failures {
            warn!(
                "Marking server {} as dead for {}ms after {} consecutive failures",
                self.location, self.settings.retry_ms, health.consecutive_failures
            );
            health.consecutive_failures = 0;
            health.dead_until = Some(Instant::now() + Duration::from_millis(self.settings.retry_ms));
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Map a response that does not belong to the request
fn unexpected(response: Response) -> ClientError {
    match response {
        Response::ServerError(msg) => ClientError::Server(msg),
        Response::ClientError(msg) => ClientError::ClientRejected(msg),
        Response::Error => ClientError::UnknownCommand,
        other => ProtocolError::UnexpectedResponse(format!("{other:?}")).into(),
    }
}

/// Periodically close sockets idle for longer than `max_idle`
fn spawn_reaper(idle: Arc<Mutex<Vec<Socket>>>, max_idle: Duration, cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(max_idle);
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = interval.tick() => {
                    let mut sockets = idle.lock();
                    let before = sockets.len();
                    sockets.retain(|socket| socket.idle_for() < max_idle);
                    let reaped = before - sockets.len();
                    if reaped > 0 {
                        debug!("Closed {} idle sockets", reaped);
                    }
                }
            }
        }
    });
}
