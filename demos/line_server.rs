//! # Example: Line Server
//!
//! Acknowledges every newline-terminated message with `Received <message>`.
//!
//! ```text
//! cargo run --example line_server -- 127.0.0.1:6666
//! printf 'ping\npong\n' | nc 127.0.0.1 6666
//! ```
//!
//! Stop it with Ctrl-C (or SIGTERM/SIGHUP/SIGQUIT): the listener stops
//! accepting, open connections are drained, and the process exits cleanly.
//! Pass `upper` as the second argument to shout the payload back instead.

use std::sync::Arc;
use std::time::Duration;

use connvisor::{Acknowledge, Config, FrameHandler, Server, Subscribe};
#[cfg(feature = "logging")]
use connvisor::LogWriter;

fn shout(frame: &[u8]) -> Vec<u8> {
    frame.to_ascii_uppercase()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("connvisor=debug,info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let cfg = Config {
        listen_addr: args.next().unwrap_or_else(|| "127.0.0.1:6666".into()),
        grace: Duration::from_secs(10),
        drain_grace: Duration::from_secs(5),
        ..Config::default()
    };
    let handler: Arc<dyn FrameHandler> = match args.next().as_deref() {
        Some("upper") => Arc::new(shout),
        _ => Arc::new(Acknowledge),
    };

    let mut subs: Vec<Arc<dyn Subscribe>> = Vec::new();
    #[cfg(feature = "logging")]
    subs.push(Arc::new(LogWriter::default()));

    let server = Server::builder(cfg).with_subscribers(subs).build();
    server.run(handler).await?;

    tracing::info!("bye");
    Ok(())
}
