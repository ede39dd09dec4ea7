//! In-process fake memcached server speaking the ASCII protocol

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Default)]
struct State {
    items: HashMap<String, (Vec<u8>, u32)>,
    log: Vec<String>,
    server_error: Option<String>,
    reply_delay: Option<Duration>,
}

pub struct FakeMemcached {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    connections: Arc<AtomicUsize>,
    accept_loop: JoinHandle<()>,
}

impl FakeMemcached {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State::default()));

        let connections = Arc::new(AtomicUsize::new(0));

        let shared = Arc::clone(&state);
        let accepted = Arc::clone(&connections);
        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, Arc::clone(&shared)));
            }
        });

        Self {
            addr,
            state,
            connections,
            accept_loop,
        }
    }

    /// Number of TCP connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Hold every following reply for `delay`
    pub fn delay_replies(&self, delay: Duration) {
        self.state.lock().unwrap().reply_delay = Some(delay);
    }

    pub fn location(&self) -> String {
        self.addr.to_string()
    }

    /// Command lines received so far, without data blocks
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub fn count_verb(&self, verb: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }

    pub fn insert_raw(&self, key: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .items
            .insert(key.to_string(), (data.to_vec(), 0));
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .items
            .get(key)
            .map(|(data, _)| data.clone())
    }

    pub fn exptime(&self, key: &str) -> Option<u32> {
        self.state.lock().unwrap().items.get(key).map(|(_, e)| *e)
    }

    /// Answer every following command with SERVER_ERROR <msg>
    pub fn fail_with(&self, msg: &str) {
        self.state.lock().unwrap().server_error = Some(msg.to_string());
    }
}

impl Drop for FakeMemcached {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

/// Accepts connections and reads from them, but never replies
pub struct SilentServer {
    addr: SocketAddr,
    accept_loop: JoinHandle<()>,
}

impl SilentServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_loop = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut sink = [0u8; 1024];
                    while let Ok(n) = stream.read(&mut sink).await {
                        if n == 0 {
                            return;
                        }
                    }
                });
            }
        });

        Self { addr, accept_loop }
    }

    pub fn location(&self) -> String {
        self.addr.to_string()
    }
}

impl Drop for SilentServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

/// A location nothing is listening on
pub async fn unused_location() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

async fn serve(stream: TcpStream, state: Arc<Mutex<State>>) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        let command = line.trim_end_matches("\r\n").to_string();
        let parts: Vec<&str> = command.split(' ').collect();

        let data = if parts[0] == "set" {
            let bytes: usize = parts.get(4).and_then(|b| b.parse().ok()).unwrap_or(0);
            let mut block = vec![0; bytes + 2];
            if reader.read_exact(&mut block).await.is_err() {
                return;
            }
            block.truncate(bytes);
            Some(block)
        } else {
            None
        };

        let reply = respond(&state, &command, &parts, data);
        let delay = state.lock().unwrap().reply_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if write.write_all(&reply).await.is_err() {
            return;
        }
    }
}

fn respond(state: &Mutex<State>, command: &str, parts: &[&str], data: Option<Vec<u8>>) -> Vec<u8> {
    let mut state = state.lock().unwrap();
    state.log.push(command.to_string());

    if let Some(msg) = &state.server_error {
        return format!("SERVER_ERROR {msg}\r\n").into_bytes();
    }

    match (parts[0], parts.get(1)) {
        ("get", Some(key)) => match state.items.get(*key) {
            Some((value, _)) => {
                let mut reply = format!("VALUE {key} 0 {}\r\n", value.len()).into_bytes();
                reply.extend_from_slice(value);
                reply.extend_from_slice(b"\r\nEND\r\n");
                reply
            }
            None => b"END\r\n".to_vec(),
        },
        ("set", Some(key)) => {
            let exptime = parts.get(3).and_then(|e| e.parse().ok()).unwrap_or(0);
            state
                .items
                .insert((*key).to_string(), (data.unwrap_or_default(), exptime));
            b"STORED\r\n".to_vec()
        }
        ("delete", Some(key)) => match state.items.remove(*key) {
            Some(_) => b"DELETED\r\n".to_vec(),
            None => b"NOT_FOUND\r\n".to_vec(),
        },
        ("version", None) => b"VERSION 1.6.21-fake\r\n".to_vec(),
        _ => b"ERROR\r\n".to_vec(),
    }
}
