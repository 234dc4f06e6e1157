//! Shared resource sink
//!
//! Logs every critical section notification it receives. It never replies
//! and does not check who is inside.

use std::net::SocketAddr;

use clap::Parser;
use dmutex::{MAX_DATAGRAM_SIZE, Message};
use dmutex_node::NodeError;
use dmutex_node::args::parse_addr;
use error_stack::{Report, ResultExt};
use tokio::net::UdpSocket;
use tracing::{info, warn};

/// Shared resource sink
#[derive(Parser, Debug)]
#[command(name = "dmutex-resource")]
#[command(about = "Log critical section notifications from dmutex processes")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:10001", value_parser = parse_addr)]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Report<NodeError>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let socket = UdpSocket::bind(args.bind)
        .await
        .change_context(NodeError)
        .attach_with(|| format!("cannot bind {}", args.bind))?;
    info!(addr = %args.bind, "resource listening");

    let mut buf = vec![0; MAX_DATAGRAM_SIZE];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(error) => {
                warn!(%error, "receive failed");
                continue;
            }
        };

        match Message::decode(&buf[..len]) {
            Ok(message) => info!(
                %peer,
                kind = %message.kind,
                from = %message.from,
                clock = %message.clock,
                text = message.text.as_deref().unwrap_or(""),
                "notification"
            ),
            Err(error) => warn!(%peer, ?error, "discarding undecodable datagram"),
        }
    }
}
