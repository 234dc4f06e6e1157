//! Command-line arguments for `dmutex-node`.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::Parser;
use dmutex::{CoordinatorConfig, ProcessId};
use error_stack::Report;

use crate::error::NodeError;

/// A process taking part in distributed mutual exclusion
#[derive(Parser, Debug, Clone)]
#[command(name = "dmutex-node")]
#[command(about = "Run one process of a Ricart-Agrawala group over UDP")]
pub struct Args {
    /// This process's identity, 1-based index into ADDRS
    pub id: u64,

    /// Every process's address in identity order (`:port` means localhost)
    #[arg(required = true, value_parser = parse_addr)]
    pub addrs: Vec<SocketAddr>,

    /// Where critical section notifications are sent
    #[arg(short, long, default_value = "127.0.0.1:10001", value_parser = parse_addr)]
    pub resource: SocketAddr,

    /// How long the critical section is held, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub hold_ms: u64,

    /// Warn about missing replies after this many milliseconds (0 disables)
    #[arg(long, default_value_t = 5000)]
    pub stall_warning_ms: u64,
}

/// Parse `host:port`, accepting a bare `:port` for `127.0.0.1:port`.
///
/// # Errors
///
/// Returns a message when the address does not resolve.
pub fn parse_addr(s: &str) -> Result<SocketAddr, String> {
    if let Some(port) = s.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|e| format!("invalid port {port:?}: {e}"))?;
        return Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)));
    }
    if let Ok(addr) = s.parse() {
        return Ok(addr);
    }
    s.to_socket_addrs()
        .map_err(|e| format!("cannot resolve {s:?}: {e}"))?
        .next()
        .ok_or_else(|| format!("{s:?} resolved to no addresses"))
}

impl Args {
    /// Number of processes in the group.
    #[must_use]
    pub fn group_size(&self) -> u64 {
        self.addrs.len() as u64
    }

    /// # Errors
    ///
    /// Fails when the ID is outside `1..=ADDRS`.
    pub fn process_id(&self) -> Result<ProcessId, Report<NodeError>> {
        if (1..=self.group_size()).contains(&self.id) {
            Ok(ProcessId(self.id))
        } else {
            Err(Report::new(NodeError).attach(format!(
                "process id {} out of range 1..={}",
                self.id,
                self.group_size()
            )))
        }
    }

    /// All identities, in address order.
    #[must_use]
    pub fn all_ids(&self) -> Vec<ProcessId> {
        (1..=self.group_size()).map(ProcessId).collect()
    }

    /// # Errors
    ///
    /// Fails when the ID is out of range.
    pub fn own_addr(&self) -> Result<SocketAddr, Report<NodeError>> {
        let id = self.process_id()?;
        Ok(self.addrs[index(id)])
    }

    /// Addresses of every other process.
    ///
    /// # Errors
    ///
    /// Fails when the ID is out of range.
    pub fn peer_addrs(&self) -> Result<HashMap<ProcessId, SocketAddr>, Report<NodeError>> {
        let id = self.process_id()?;
        Ok(self
            .all_ids()
            .into_iter()
            .filter(|&peer| peer != id)
            .map(|peer| (peer, self.addrs[index(peer)]))
            .collect())
    }

    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let stall_warning =
            (self.stall_warning_ms > 0).then(|| Duration::from_millis(self.stall_warning_ms));
        CoordinatorConfig::default()
            .with_hold(Duration::from_millis(self.hold_ms))
            .with_stall_warning(stall_warning)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn index(id: ProcessId) -> usize {
    (id.0 - 1) as usize
}
