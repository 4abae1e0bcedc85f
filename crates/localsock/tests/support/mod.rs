//! Scripted in-memory provider for endpoint tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use localsock::{
    BackoffConfig, Connection, Listener, PermissionLayer, ProviderError, ProviderResult,
    SocketProvider, TransportEndpoint, TransportEndpointBuilder,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const INITIAL_DELAY: Duration = Duration::from_millis(10);
pub const MAX_DELAY: Duration = Duration::from_millis(40);

#[derive(Debug)]
pub struct MockConnection {
    pub id: usize,
    pub unnamed: bool,
}

impl Connection for MockConnection {
    fn local_address(&self) -> Option<String> {
        (!self.unnamed).then(|| format!("mock-conn-{}", self.id))
    }
}

/// Observations shared between the provider, its listener and the test.
#[derive(Debug, Default)]
pub struct Probe {
    pub accept_times: Mutex<Vec<Instant>>,
    pub listen_calls: Mutex<Vec<(String, usize)>>,
    pub close_calls: AtomicUsize,
    pub unref: AtomicBool,
}

impl Probe {
    pub fn accept_count(&self) -> usize {
        self.accept_times.lock().len()
    }

    pub fn accept_gaps(&self) -> Vec<Duration> {
        let times = self.accept_times.lock();
        times.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }
}

/// Feeds accept outcomes to the listener in order.
#[derive(Debug, Clone)]
pub struct Script {
    sender: mpsc::UnboundedSender<ProviderResult<MockConnection>>,
    next_id: Arc<AtomicUsize>,
}

impl Script {
    pub fn connection(&self) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(Ok(MockConnection { id, unnamed: false }));
    }

    pub fn failure(&self, kind: io::ErrorKind) {
        let _ = self
            .sender
            .send(Err(ProviderError::Io(io::Error::new(kind, "scripted failure"))));
    }
}

#[derive(Debug)]
pub struct MockListener {
    address: String,
    script: tokio::sync::Mutex<mpsc::UnboundedReceiver<ProviderResult<MockConnection>>>,
    probe: Arc<Probe>,
    closed: AtomicBool,
}

#[async_trait]
impl Listener for MockListener {
    type Connection = MockConnection;

    async fn accept(&self) -> ProviderResult<MockConnection> {
        self.probe.accept_times.lock().push(Instant::now());
        let mut script = self.script.lock().await;
        script.recv().await.unwrap_or(Err(ProviderError::ListenerClosed))
    }

    fn close(&self) -> ProviderResult<()> {
        self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ProviderError::ListenerClosed);
        }
        Ok(())
    }

    fn local_address(&self) -> String {
        self.address.clone()
    }

    fn ref_handle(&self) {
        self.probe.unref.store(false, Ordering::SeqCst);
    }

    fn unref_handle(&self) {
        self.probe.unref.store(true, Ordering::SeqCst);
    }

    fn has_ref(&self) -> bool {
        !self.probe.unref.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockProvider {
    probe: Arc<Probe>,
    script: Mutex<Option<mpsc::UnboundedReceiver<ProviderResult<MockConnection>>>>,
    listen_failures: Mutex<VecDeque<io::ErrorKind>>,
    connect_failures: Mutex<VecDeque<io::ErrorKind>>,
    unnamed_connects: AtomicBool,
}

impl MockProvider {
    pub fn new() -> (Self, Script, Arc<Probe>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let probe = Arc::new(Probe::default());
        let provider = Self {
            probe: probe.clone(),
            script: Mutex::new(Some(receiver)),
            listen_failures: Mutex::new(VecDeque::new()),
            connect_failures: Mutex::new(VecDeque::new()),
            unnamed_connects: AtomicBool::new(false),
        };
        let script = Script {
            sender,
            next_id: Arc::new(AtomicUsize::new(0)),
        };
        (provider, script, probe)
    }

    pub fn fail_next_listen(&self, kind: io::ErrorKind) {
        self.listen_failures.lock().push_back(kind);
    }

    pub fn fail_next_connect(&self, kind: io::ErrorKind) {
        self.connect_failures.lock().push_back(kind);
    }

    /// Connections from `connect` report no local address, like Unix clients.
    pub fn unnamed_connects(&self) {
        self.unnamed_connects.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SocketProvider for MockProvider {
    type Connection = MockConnection;
    type Listener = MockListener;

    async fn connect(&self, address: &str) -> ProviderResult<MockConnection> {
        if let Some(kind) = self.connect_failures.lock().pop_front() {
            return Err(ProviderError::Io(io::Error::new(kind, address.to_string())));
        }
        Ok(MockConnection {
            id: usize::MAX,
            unnamed: self.unnamed_connects.load(Ordering::SeqCst),
        })
    }

    fn listen(&self, address: &str, backlog: usize) -> ProviderResult<MockListener> {
        if let Some(kind) = self.listen_failures.lock().pop_front() {
            return Err(ProviderError::Io(io::Error::new(kind, address.to_string())));
        }
        self.probe
            .listen_calls
            .lock()
            .push((address.to_string(), backlog));
        let script = self
            .script
            .lock()
            .take()
            .ok_or_else(|| ProviderError::Io(io::Error::other("listener already scripted")))?;
        Ok(MockListener {
            address: format!("resolved:{address}"),
            script: tokio::sync::Mutex::new(script),
            probe: self.probe.clone(),
            closed: AtomicBool::new(false),
        })
    }
}

/// Records every chmod call.
#[derive(Debug, Clone, Default)]
pub struct RecordingPermissions {
    pub calls: Arc<Mutex<Vec<(String, u32)>>>,
    pub fail: bool,
}

impl PermissionLayer for RecordingPermissions {
    fn chmod(&self, path: &str, mode: u32) -> io::Result<()> {
        self.calls.lock().push((path.to_string(), mode));
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        }
        Ok(())
    }
}

pub fn test_backoff() -> BackoffConfig {
    BackoffConfig {
        initial_delay: INITIAL_DELAY,
        max_delay: MAX_DELAY,
    }
}

pub fn server() -> (TransportEndpoint<MockProvider>, Script, Arc<Probe>) {
    let (provider, script, probe) = MockProvider::new();
    let endpoint = TransportEndpointBuilder::new_server(provider)
        .backoff(test_backoff())
        .permissions(RecordingPermissions::default())
        .build();
    (endpoint, script, probe)
}

/// Lets spawned tasks run until `condition` holds, advancing paused time in small steps.
pub async fn settle_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
