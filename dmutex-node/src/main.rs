//! One process of a Ricart-Agrawala group.
//!
//! Type `x` and Enter to request the critical section, or this process's ID
//! for a local event.

use std::sync::Arc;

use clap::Parser;
use dmutex::{MutexCoordinator, MutexCore, run_dispatch, run_triggers};
use dmutex_node::{Args, NodeError, UdpTransport, input};
use error_stack::Report;
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Report<NodeError>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let id = args.process_id()?;
    let transport = UdpTransport::bind(args.own_addr()?, args.peer_addrs()?).await?;
    let notifier = transport.notifier(args.resource);
    info!(
        %id,
        addr = %transport.local_addr()?,
        processes = args.group_size(),
        resource = %args.resource,
        "process listening"
    );

    let coordinator = Arc::new(MutexCoordinator::new(
        MutexCore::new(id, args.all_ids()),
        transport,
        notifier,
        args.coordinator_config(),
    ));

    let dispatch = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { run_dispatch(&coordinator).await })
    };

    let stdin = BufReader::new(tokio::io::stdin());
    run_triggers(Arc::clone(&coordinator), input::triggers(stdin, id)).await;

    info!("input closed, still answering peers");
    dispatch
        .await
        .map_err(|e| Report::new(NodeError).attach(format!("dispatch task failed: {e}")))?;
    Ok(())
}
