//! mcstash - command line access to a memcached-backed cache
//!
//! Usage:
//!
//! ```text
//! mcstash [--config <file>] get  <segment> <id>
//! mcstash [--config <file>] set  <segment> <id> <json> [ttl_ms]
//! mcstash [--config <file>] drop <segment> <id>
//! ```
//!
//! Without `--config`, options come from `MCSTASH_*` environment variables.

use anyhow::{Context, bail};
use mcstash::{CacheKey, Connection, Options};
use serde_json::Value;
use tokio::runtime::Builder;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_TTL_MS: u64 = 60_000;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    // Load configuration
    let options = if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            bail!("--config requires a file path");
        }
        let path = args.remove(1);
        args.remove(0);
        info!("Loading configuration from {}", path);
        Options::from_file(&path)?
    } else {
        Options::from_env()
    };

    debug!("Options: {:?}", options);

    let runtime = Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(run(options, args))
}

async fn run(options: Options, args: Vec<String>) -> anyhow::Result<()> {
    let (command, segment, id) = match args.as_slice() {
        [command, segment, id, ..] => (command.as_str(), segment, id),
        _ => bail!("usage: mcstash [--config <file>] <get|set|drop> <segment> <id> [json] [ttl_ms]"),
    };

    let conn = Connection::new(options)?;
    conn.validate_segment_name(segment)
        .with_context(|| format!("invalid segment {segment:?}"))?;
    conn.start().await?;

    let key = CacheKey::new(segment.as_str(), id.as_str());
    let result = execute(&conn, command, &key, &args[3..]).await;

    conn.stop();
    result
}

async fn execute(conn: &Connection, command: &str, key: &CacheKey, rest: &[String]) -> anyhow::Result<()> {
    match command {
        "get" => match conn.get::<Value>(key).await? {
            Some(envelope) => println!("{}", serde_json::to_string_pretty(&envelope)?),
            None => println!("(miss)"),
        },
        "set" => {
            let raw = rest.first().context("set requires a JSON value")?;
            let value: Value = serde_json::from_str(raw).context("value is not valid JSON")?;
            let ttl = match rest.get(1) {
                Some(ttl) => ttl.parse().context("ttl_ms must be an integer")?,
                None => DEFAULT_TTL_MS,
            };
            conn.set(key, &value, ttl).await?;
            println!("STORED");
        }
        "drop" => {
            conn.drop(key).await?;
            println!("DELETED");
        }
        other => bail!("unknown command {other:?}"),
    }
    Ok(())
}
