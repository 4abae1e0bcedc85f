//! Transport endpoint façade: bind, connect, listen, fchmod, ref/unref, close.

use std::sync::Arc;

use localsock_traits::{
    BacklogStrategy, BackoffConfig, ConnectionHandle, EndpointConfig, EndpointError,
    EndpointMetrics, EndpointMetricsSnapshot, EndpointResult, EndpointRole, EndpointState,
    ErrorCode, ListenDisposition, Listener, PermissionLayer, ProviderError, SocketMode,
    SocketProvider,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accept::AcceptLoop;
use crate::backoff::AcceptBackoff;
use crate::dispatch::{Incoming, invoke_guarded};
use crate::permissions::FsPermissions;
use crate::registry::ConnectionRegistry;

/// Upper bound on the delivery channel capacity for very large backlogs.
pub const MAX_DELIVERY_CAPACITY: usize = 1 << 16;

/// Endpoint state shared with the accept loop (parking_lot mutex, never held across await).
#[derive(Debug)]
pub(crate) struct Shared<P: SocketProvider> {
    pub(crate) state: EndpointState,
    pub(crate) address: Option<String>,
    pub(crate) backlog: Option<usize>,
    pub(crate) pending_instances: usize,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) backoff: AcceptBackoff,
    pub(crate) listener: Option<Arc<P::Listener>>,
    pub(crate) connection: Option<ConnectionHandle<P::Connection>>,
    pub(crate) incoming: Option<Incoming<P::Connection>>,
}

/// A stream-style local socket endpoint in the client, server or IPC role.
#[derive(Debug)]
pub struct TransportEndpoint<P: SocketProvider> {
    role: EndpointRole,
    ipc: bool,
    provider: P,
    permissions: Arc<dyn PermissionLayer>,
    config: EndpointConfig,
    shared: Arc<Mutex<Shared<P>>>,
    shutdown: CancellationToken,
    metrics: Arc<EndpointMetrics>,
}

impl<P: SocketProvider> TransportEndpoint<P> {
    /// Create an idle endpoint.
    pub fn new(
        role: EndpointRole,
        provider: P,
        permissions: Arc<dyn PermissionLayer>,
        config: EndpointConfig,
    ) -> Self {
        let shared = Shared {
            state: EndpointState::Idle,
            address: None,
            backlog: None,
            pending_instances: config.pending_instances,
            registry: ConnectionRegistry::new(),
            backoff: AcceptBackoff::new(config.backoff),
            listener: None,
            connection: None,
            incoming: None,
        };
        Self {
            role,
            ipc: role.is_ipc(),
            provider,
            permissions,
            config,
            shared: Arc::new(Mutex::new(shared)),
            shutdown: CancellationToken::new(),
            metrics: Arc::new(EndpointMetrics::new()),
        }
    }

    /// Records the address a later `connect` or `listen` will use.
    ///
    /// No OS resource is opened. Returns `EINVAL` once the endpoint is closed
    /// or its listener exists.
    pub fn bind(&self, name: impl Into<String>) -> ErrorCode {
        let mut shared = self.shared.lock();
        if shared.state.is_closed() || shared.listener.is_some() {
            return ErrorCode::Einval;
        }
        shared.address = Some(name.into());
        if shared.state == EndpointState::Idle {
            shared.state = EndpointState::Bound;
        }
        ErrorCode::Ok
    }

    /// Connects to `address` and reports the outcome to `after_connect`.
    ///
    /// The endpoint address becomes the connection's local address when the
    /// platform reports one; otherwise it is left as it was.
    ///
    /// `after_connect` is called exactly once with `token` and the mapped
    /// code. A panic inside it is caught and logged.
    pub async fn connect<T, F>(&self, address: impl Into<String>, token: T, after_connect: F)
    where
        F: FnOnce(T, ErrorCode),
    {
        let address = address.into();
        let code = self.establish(&address).await;
        invoke_guarded("after_connect", move || after_connect(token, code));
    }

    async fn establish(&self, address: &str) -> ErrorCode {
        if self.state().is_closed() {
            return ErrorCode::Einval;
        }

        info!("Connecting to local socket at {}", address);
        let connection = match self.provider.connect(address).await {
            Ok(connection) => connection,
            Err(e) => {
                EndpointMetrics::incr(&self.metrics.failed_connects);
                let code = ErrorCode::for_connect(&e);
                warn!("Failed to connect to local socket {}: {} ({})", address, e, code);
                return code;
            }
        };

        let handle = ConnectionHandle::new(self.role, connection);
        let mut shared = self.shared.lock();
        if shared.state.is_closed() {
            debug!("Endpoint closed while connecting, dropping connection");
            return ErrorCode::Econnaborted;
        }
        // Unnamed client sockets keep the bound name, never the peer path.
        if let Some(local) = handle.local_address() {
            shared.address = Some(local.to_string());
        }
        shared.connection = Some(handle);
        if shared.state == EndpointState::Idle {
            shared.state = EndpointState::Bound;
        }
        EndpointMetrics::incr(&self.metrics.connects);
        info!("Successfully connected to local socket {}", address);
        ErrorCode::Ok
    }

    /// Opens the listener at the bound address and starts the accept loop.
    ///
    /// Non-fatal failures are returned as codes without starting the loop.
    /// A permission failure is raised as [`EndpointError::PermissionDenied`].
    pub fn listen(&self, requested_backlog: usize) -> EndpointResult<ErrorCode> {
        let mut shared = self.shared.lock();
        if shared.state.is_closed() {
            return Err(EndpointError::Closed);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| EndpointError::NoRuntime)?;
        if shared.state.is_listening() {
            warn!("Endpoint is already listening");
            return Ok(ErrorCode::Einval);
        }
        let Some(address) = shared.address.clone() else {
            warn!("Cannot listen on an endpoint without a bound address");
            return Ok(ErrorCode::Einval);
        };

        let backlog = self
            .config
            .backlog_strategy
            .effective_backlog(requested_backlog, shared.pending_instances);

        let listener = match self.provider.listen(&address, backlog) {
            Ok(listener) => Arc::new(listener),
            Err(e) => {
                return match ErrorCode::for_listen(&e) {
                    ListenDisposition::Report(code) => {
                        warn!("Failed to listen on {}: {} ({})", address, e, code);
                        Ok(code)
                    }
                    ListenDisposition::Raise => {
                        Err(EndpointError::PermissionDenied { address, source: e })
                    }
                };
            }
        };

        let (sender, receiver) = mpsc::channel(backlog.clamp(1, MAX_DELIVERY_CAPACITY));
        shared.address = Some(listener.local_address());
        shared.backlog = Some(backlog);
        shared.listener = Some(Arc::clone(&listener));
        shared.incoming = Some(Incoming::new(receiver, self.shutdown.clone()));
        shared.state = EndpointState::Listening;
        drop(shared);

        let accept_loop = AcceptLoop {
            shared: Arc::clone(&self.shared),
            listener,
            sender,
            shutdown: self.shutdown.clone(),
            metrics: Arc::clone(&self.metrics),
            backlog,
            ipc: self.ipc,
        };
        runtime.spawn(accept_loop.run());

        info!(backlog, "Listening on local socket {}", address);
        Ok(ErrorCode::Ok)
    }

    /// Takes the receiving side of the delivery channel.
    ///
    /// Available once per successful `listen`.
    pub fn incoming(&self) -> Option<Incoming<P::Connection>> {
        self.shared.lock().incoming.take()
    }

    /// Sets the backlog used by [`BacklogStrategy::PendingInstances`].
    ///
    /// Takes effect on the next `listen`; an already computed backlog is kept.
    pub fn set_pending_instances(&self, instances: usize) {
        self.shared.lock().pending_instances = instances;
    }

    /// Grants other processes access to the bound socket path.
    ///
    /// `mode` must be [`SocketMode::READABLE`], [`SocketMode::WRITABLE`] or
    /// their union; anything else returns `EINVAL` without touching the
    /// filesystem.
    pub fn fchmod(&self, mode: u32) -> ErrorCode {
        let Some(mode) = SocketMode::from_bits(mode) else {
            return ErrorCode::Einval;
        };
        let Some(address) = self.address() else {
            return ErrorCode::Einval;
        };

        match self.permissions.chmod(&address, mode.posix_mode()) {
            Ok(()) => ErrorCode::Ok,
            Err(e) => {
                warn!("Failed to change permissions of {}: {}", address, e);
                ErrorCode::for_chmod(&e)
            }
        }
    }

    /// Lets the pending accept keep the host run loop alive. No-op without a listener.
    pub fn ref_handle(&self) {
        if let Some(listener) = &self.shared.lock().listener {
            listener.ref_handle();
        }
    }

    /// Stops the pending accept from keeping the host run loop alive. No-op without a listener.
    pub fn unref_handle(&self) {
        if let Some(listener) = &self.shared.lock().listener {
            listener.unref_handle();
        }
    }

    /// Closes the endpoint. Further calls are no-ops.
    ///
    /// An accept already in flight is not aborted; its result is discarded
    /// when it settles.
    pub fn close(&self) {
        let listener = {
            let mut shared = self.shared.lock();
            if shared.state.is_closed() {
                return;
            }
            shared.state = EndpointState::Closed;
            shared.address = None;
            shared.backlog = None;
            shared.registry.clear();
            shared.backoff.reset();
            shared.connection = None;
            shared.incoming = None;
            self.shutdown.cancel();
            shared.listener.take()
        };

        if self.role == EndpointRole::Server
            && let Some(listener) = listener
        {
            match listener.close() {
                Ok(()) | Err(ProviderError::ListenerClosed) => {}
                Err(e) => debug!("Ignoring listener close failure: {}", e),
            }
        }
        info!(role = %self.role, "Endpoint closed");
    }

    /// Reports that a delivered connection has been closed by its owner.
    pub fn release_connection(&self) {
        self.shared.lock().registry.release();
    }

    /// Takes the connection attached by a successful `connect`.
    pub fn take_connection(&self) -> Option<ConnectionHandle<P::Connection>> {
        self.shared.lock().connection.take()
    }

    /// The endpoint's role.
    pub fn role(&self) -> EndpointRole {
        self.role
    }

    /// Whether this endpoint carries control messages.
    pub fn is_ipc(&self) -> bool {
        self.ipc
    }

    /// The current lifecycle state.
    pub fn state(&self) -> EndpointState {
        self.shared.lock().state
    }

    /// The recorded or resolved address.
    pub fn address(&self) -> Option<String> {
        self.shared.lock().address.clone()
    }

    /// The effective backlog of the running `listen`.
    pub fn backlog(&self) -> Option<usize> {
        self.shared.lock().backlog
    }

    /// Number of connections currently registered.
    pub fn connection_count(&self) -> usize {
        self.shared.lock().registry.count()
    }

    /// The most recent backoff delay, `None` when reset.
    pub fn current_backoff(&self) -> Option<std::time::Duration> {
        self.shared.lock().backoff.current()
    }

    /// Whether the listener currently keeps the run loop alive.
    pub fn has_ref(&self) -> bool {
        self.shared
            .lock()
            .listener
            .as_ref()
            .is_some_and(|listener| listener.has_ref())
    }

    /// The endpoint configuration.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// A snapshot of the endpoint counters.
    pub fn metrics(&self) -> EndpointMetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<P: SocketProvider> Drop for TransportEndpoint<P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`TransportEndpoint`].
#[derive(Debug)]
pub struct TransportEndpointBuilder<P> {
    role: EndpointRole,
    ipc: Option<bool>,
    provider: P,
    permissions: Option<Arc<dyn PermissionLayer>>,
    config: EndpointConfig,
}

impl<P: SocketProvider> TransportEndpointBuilder<P> {
    fn with_role(role: EndpointRole, provider: P) -> Self {
        Self {
            role,
            ipc: None,
            provider,
            permissions: None,
            config: EndpointConfig::default(),
        }
    }

    /// Builder for a listening endpoint.
    pub fn new_server(provider: P) -> Self {
        Self::with_role(EndpointRole::Server, provider)
    }

    /// Builder for a client socket.
    pub fn new_client(provider: P) -> Self {
        Self::with_role(EndpointRole::Socket, provider)
    }

    /// Builder for an IPC socket.
    pub fn new_ipc(provider: P) -> Self {
        Self::with_role(EndpointRole::Ipc, provider)
    }

    /// Mark the endpoint, and connections it accepts, as carrying control messages.
    #[must_use]
    pub fn ipc(mut self, ipc: bool) -> Self {
        self.ipc = Some(ipc);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Set accept backoff timing.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Set the backlog strategy.
    #[must_use]
    pub fn backlog_strategy(mut self, strategy: BacklogStrategy) -> Self {
        self.config.backlog_strategy = strategy;
        self
    }

    /// Set the pending instances constant.
    #[must_use]
    pub fn pending_instances(mut self, instances: usize) -> Self {
        self.config.pending_instances = instances;
        self
    }

    /// Set the permission layer used by `fchmod`.
    #[must_use]
    pub fn permissions(mut self, permissions: impl PermissionLayer) -> Self {
        self.permissions = Some(Arc::new(permissions));
        self
    }

    /// Build the endpoint.
    pub fn build(self) -> TransportEndpoint<P> {
        let permissions = self
            .permissions
            .unwrap_or_else(|| Arc::new(FsPermissions::new()));
        let mut endpoint = TransportEndpoint::new(self.role, self.provider, permissions, self.config);
        if let Some(ipc) = self.ipc {
            endpoint.ipc = ipc;
        }
        endpoint
    }
}
