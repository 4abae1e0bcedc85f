//! The accept loop driving a listening endpoint.

use std::sync::Arc;

use localsock_traits::{
    ConnectionEvent, ConnectionHandle, EndpointMetrics, EndpointState, ErrorCode, Listener,
    ProviderResult, SocketProvider,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::endpoint::Shared;

/// What the next cycle of the loop does.
enum Cycle {
    Accept,
    Throttle,
    Stop,
}

/// How a settled accept is handled.
enum Settled<C> {
    Deliver(ConnectionEvent<C>),
    Retry(ConnectionEvent<C>),
    Stop,
}

/// One accept loop per `listen` call, run as a single spawned task.
///
/// The loop never issues overlapping accepts, and it re-checks the endpoint
/// state each time an accept or a backoff sleep settles.
pub(crate) struct AcceptLoop<P: SocketProvider> {
    pub(crate) shared: Arc<Mutex<Shared<P>>>,
    pub(crate) listener: Arc<P::Listener>,
    pub(crate) sender: mpsc::Sender<ConnectionEvent<P::Connection>>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) metrics: Arc<EndpointMetrics>,
    pub(crate) backlog: usize,
    pub(crate) ipc: bool,
}

impl<P: SocketProvider> AcceptLoop<P> {
    pub(crate) async fn run(self) {
        debug!(backlog = self.backlog, "Accept loop started");
        loop {
            match self.begin_cycle() {
                Cycle::Stop => break,
                Cycle::Throttle => {
                    if !self.back_off().await {
                        break;
                    }
                    continue;
                }
                Cycle::Accept => {}
            }

            let result = self.listener.accept().await;

            match self.settle(result) {
                Settled::Stop => break,
                Settled::Deliver(event) => {
                    if !self.deliver(event).await {
                        break;
                    }
                }
                Settled::Retry(event) => {
                    if !self.deliver(event).await || !self.back_off().await {
                        break;
                    }
                }
            }
        }
        debug!("Accept loop stopped");
    }

    fn begin_cycle(&self) -> Cycle {
        let mut shared = self.shared.lock();
        if shared.state.is_closed() {
            return Cycle::Stop;
        }
        if shared.registry.is_over(self.backlog) {
            warn!(
                count = shared.registry.count(),
                backlog = self.backlog,
                "Connection count over backlog, throttling accept"
            );
            EndpointMetrics::incr(&self.metrics.throttled);
            return Cycle::Throttle;
        }
        shared.state = EndpointState::Accepting;
        Cycle::Accept
    }

    fn settle(&self, result: ProviderResult<P::Connection>) -> Settled<P::Connection> {
        let mut shared = self.shared.lock();
        if shared.state.is_closed() {
            debug!("Discarding accept result after close");
            return Settled::Stop;
        }

        match result {
            Ok(connection) => {
                shared.backoff.reset();
                shared.state = EndpointState::Listening;
                let handle = ConnectionHandle::accepted(self.ipc, connection);
                Settled::Deliver(ConnectionEvent::accepted(handle))
            }
            Err(e) => {
                let code = ErrorCode::for_accept(&e);
                EndpointMetrics::incr(&self.metrics.accept_failures);
                warn!("Failed to accept local socket connection: {} ({})", e, code);
                Settled::Retry(ConnectionEvent::failed(code))
            }
        }
    }

    /// Hands `event` to the consumer, registering a delivered connection.
    ///
    /// Returns `false` if the endpoint closed while waiting for channel
    /// capacity or the receiver is gone.
    async fn deliver(&self, event: ConnectionEvent<P::Connection>) -> bool {
        let permit = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return false,
            permit = self.sender.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    debug!("Connection receiver dropped, stopping accept loop");
                    return false;
                }
            },
        };

        let mut shared = self.shared.lock();
        if shared.state.is_closed() {
            debug!("Discarding accept result after close");
            return false;
        }
        if event.handle.is_some() {
            let count = shared.registry.register();
            EndpointMetrics::incr(&self.metrics.accepted);
            debug!(count, "Accepted local socket connection");
        }
        permit.send(event);
        true
    }

    /// Sleeps for the next backoff delay. Returns `false` if the endpoint
    /// closed before or during the wait.
    async fn back_off(&self) -> bool {
        let delay = {
            let mut shared = self.shared.lock();
            if shared.state.is_closed() {
                return false;
            }
            shared.state = EndpointState::Backoff;
            shared.backoff.next_delay()
        };
        EndpointMetrics::incr(&self.metrics.backoffs);
        debug!(?delay, "Backing off accept loop");

        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => false,
            () = tokio::time::sleep(delay) => !self.shared.lock().state.is_closed(),
        }
    }
}
