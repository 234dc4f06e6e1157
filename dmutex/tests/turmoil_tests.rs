//! Turmoil-based simulation tests
//!
//! Every process is a simulated host with a real UDP socket, so datagrams
//! see latency, reordering across links and held links.

use std::{
    collections::HashMap,
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use dmutex::{
    CoordinatorConfig, Grant, MAX_DATAGRAM_SIZE, Message, MessageKind, MutexCoordinator,
    MutexCore, Phase, ProcessId, ResourceNotifier, Transport, TransportError, Trigger,
    run_dispatch, run_triggers,
};
use error_stack::{Report, ResultExt};
use futures::stream;
use turmoil::Builder;
use turmoil::net::UdpSocket;

/// Initialize tracing for tests. Call at the start of each test.
/// Uses RUST_LOG env var for filtering (defaults to "debug" for this crate).
fn init_tracing() -> impl Sized {
    use tracing::Dispatch;
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dmutex=debug")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_test_writer()
        .finish();

    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_default(&dispatch)
}

const PORT: u16 = 9999;

fn host_name(id: ProcessId) -> String {
    format!("process-{}", id.0)
}

fn ids(n: u64) -> Vec<ProcessId> {
    (1..=n).map(ProcessId).collect()
}

// --- Turmoil UDP transport ---

struct TurmoilTransport {
    socket: UdpSocket,
    peers: HashMap<ProcessId, SocketAddr>,
}

impl TurmoilTransport {
    async fn bind(peers: &[ProcessId]) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, PORT)).await?;
        let peers = peers
            .iter()
            .map(|&id| (id, SocketAddr::new(turmoil::lookup(host_name(id)), PORT)))
            .collect();
        Ok(Self { socket, peers })
    }
}

impl Transport for TurmoilTransport {
    async fn send(&self, to: ProcessId, payload: Vec<u8>) -> Result<(), Report<TransportError>> {
        let Some(addr) = self.peers.get(&to) else {
            return Err(Report::new(TransportError).attach(format!("unknown peer {to}")));
        };
        self.socket
            .send_to(&payload, *addr)
            .await
            .change_context(TransportError)?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Report<TransportError>> {
        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        let (len, _from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .change_context(TransportError)?;
        buf.truncate(len);
        Ok(Some(buf))
    }
}

// --- Shared bookkeeping ---

#[derive(Default)]
struct Observed {
    bound: AtomicUsize,
    done: AtomicUsize,
    inside: AtomicUsize,
    max_inside: AtomicUsize,
    entries: Mutex<Vec<ProcessId>>,
    /// Senders of every critical section notification
    notified: Mutex<Vec<ProcessId>>,
}

impl Observed {
    async fn wait_for(counter: &AtomicUsize, n: usize) {
        while counter.load(Ordering::SeqCst) < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

/// Stands in for the resource sink.
struct EntryLog(Arc<Observed>);

impl ResourceNotifier for EntryLog {
    async fn notify(&self, notification: &Message) -> Result<(), Report<TransportError>> {
        assert_eq!(notification.kind, MessageKind::CriticalSection);
        self.0.notified.lock().unwrap().push(notification.from);
        Ok(())
    }
}

type Node = Arc<MutexCoordinator<TurmoilTransport, EntryLog>>;

/// Bind, wait for every peer to bind, then start the dispatch loop.
async fn start_node(id: ProcessId, n: u64, observed: &Arc<Observed>) -> io::Result<Node> {
    let all = ids(n);
    let peers: Vec<ProcessId> = all.iter().copied().filter(|&p| p != id).collect();
    let transport = TurmoilTransport::bind(&peers).await?;

    observed.bound.fetch_add(1, Ordering::SeqCst);
    Observed::wait_for(&observed.bound, all.len()).await;

    let node = Arc::new(MutexCoordinator::new(
        MutexCore::new(id, all),
        transport,
        EntryLog(Arc::clone(observed)),
        CoordinatorConfig::default()
            .with_hold(Duration::from_millis(10))
            .with_stall_warning(Some(Duration::from_secs(1))),
    ));
    let dispatch = Arc::clone(&node);
    tokio::spawn(async move { run_dispatch(&dispatch).await });
    Ok(node)
}

/// Keep the socket open until every process is done, so late requests
/// still get their replies.
async fn finish(node: &Node, n: u64, observed: &Observed) {
    assert_eq!(node.snapshot().phase, Phase::Idle);
    observed.done.fetch_add(1, Ordering::SeqCst);
    Observed::wait_for(&observed.done, n as usize).await;
}

async fn occupy(node: &Node, observed: &Observed) -> io::Result<()> {
    let grant = node
        .request()
        .await
        .map_err(|e| io::Error::other(format!("{e:?}")))?;
    assert!(matches!(grant, Grant::Entered { .. }), "{grant:?}");

    let now = observed.inside.fetch_add(1, Ordering::SeqCst) + 1;
    observed.max_inside.fetch_max(now, Ordering::SeqCst);
    observed.entries.lock().unwrap().push(node.id());
    tokio::time::sleep(Duration::from_millis(5)).await;
    observed.inside.fetch_sub(1, Ordering::SeqCst);

    assert!(node.release().await);
    Ok(())
}

fn spawn_process(
    sim: &mut turmoil::Sim<'_>,
    id: ProcessId,
    n: u64,
    rounds: usize,
    observed: Arc<Observed>,
) {
    sim.client(host_name(id), async move {
        let node = start_node(id, n, &observed).await?;
        for _ in 0..rounds {
            occupy(&node, &observed).await?;
        }
        finish(&node, n, &observed).await;
        Ok(())
    });
}

#[test]
fn turmoil_three_processes() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .build();

    let observed = Arc::new(Observed::default());
    for id in ids(3) {
        spawn_process(&mut sim, id, 3, 1, Arc::clone(&observed));
    }

    sim.run().unwrap();

    assert_eq!(observed.max_inside.load(Ordering::SeqCst), 1);
    let mut entries = observed.entries.lock().unwrap().clone();
    entries.sort();
    assert_eq!(entries, ids(3));
    assert_eq!(observed.notified.lock().unwrap().len(), 3);
}

#[test]
fn turmoil_repeated_contention_with_latency() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(60))
        .min_message_latency(Duration::from_millis(1))
        .max_message_latency(Duration::from_millis(20))
        .build();

    let observed = Arc::new(Observed::default());
    for id in ids(5) {
        spawn_process(&mut sim, id, 5, 4, Arc::clone(&observed));
    }

    sim.run().unwrap();

    assert_eq!(observed.max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(observed.entries.lock().unwrap().len(), 20);
}

#[test]
fn turmoil_held_link_delays_but_preserves_exclusion() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(60))
        .build();

    let observed = Arc::new(Observed::default());
    for id in ids(3) {
        spawn_process(&mut sim, id, 3, 2, Arc::clone(&observed));
    }

    // P3's replies to P1 are held for a while: P1 stalls until the link is
    // released, and nobody is ever inside together.
    sim.client("slow-link", async move {
        turmoil::hold("process-3", "process-1");
        tokio::time::sleep(Duration::from_secs(3)).await;
        turmoil::release("process-3", "process-1");
        Ok(())
    });

    sim.run().unwrap();

    assert_eq!(observed.max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(observed.entries.lock().unwrap().len(), 6);
}

#[test]
fn turmoil_triggers_drive_the_section() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .build();

    let observed = Arc::new(Observed::default());
    for id in ids(2) {
        let observed = Arc::clone(&observed);
        sim.client(host_name(id), async move {
            let node = start_node(id, 2, &observed).await?;
            run_triggers(
                Arc::clone(&node),
                stream::iter([Trigger::LocalTick, Trigger::RequestCs, Trigger::LocalTick]),
            )
            .await;
            // Every trigger ticked the clock at least once
            assert!(node.snapshot().clock.0 >= 3);
            finish(&node, 2, &observed).await;
            Ok(())
        });
    }

    sim.run().unwrap();
    assert_eq!(observed.done.load(Ordering::SeqCst), 2);

    // Each RequestCs trigger entered the section exactly once
    let mut notified = observed.notified.lock().unwrap().clone();
    notified.sort();
    assert_eq!(notified, ids(2));
}
