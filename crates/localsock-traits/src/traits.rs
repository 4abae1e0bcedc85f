//! Collaborator traits the endpoint delegates its I/O to.

use std::fmt::Debug;
use std::io;

use async_trait::async_trait;

use crate::error::ProviderResult;

/// A connected stream, produced by `connect` or by a listener's `accept`.
pub trait Connection: Send + Debug + 'static {
    /// The resolved local address of the connection, if the platform reports one.
    fn local_address(&self) -> Option<String>;
}

/// A passive listener opened by a [`SocketProvider`].
#[async_trait]
pub trait Listener: Send + Sync + Debug + 'static {
    /// The connection type produced by `accept`.
    type Connection: Connection;

    /// Waits for the next inbound connection.
    ///
    /// Once the listener is closed, pending and future calls resolve with
    /// `ProviderError::ListenerClosed`.
    async fn accept(&self) -> ProviderResult<Self::Connection>;

    /// Closes the listener.
    ///
    /// Closing an already closed listener returns `ProviderError::ListenerClosed`.
    fn close(&self) -> ProviderResult<()>;

    /// The resolved address the listener is bound to.
    fn local_address(&self) -> String;

    /// Lets a pending accept keep the host run loop alive.
    fn ref_handle(&self);

    /// Stops a pending accept from keeping the host run loop alive.
    fn unref_handle(&self);

    /// Whether the listener currently keeps the run loop alive.
    fn has_ref(&self) -> bool {
        true
    }
}

/// Opens OS-level stream sockets or pipes.
#[async_trait]
pub trait SocketProvider: Send + Sync + Debug + 'static {
    /// The connection type produced by `connect` and by the listener.
    type Connection: Connection;

    /// The listener type produced by `listen`.
    type Listener: Listener<Connection = Self::Connection>;

    /// Establishes a connection to `address`.
    async fn connect(&self, address: &str) -> ProviderResult<Self::Connection>;

    /// Opens a passive listener at `address`.
    ///
    /// `backlog` is the effective backlog computed by the endpoint; providers
    /// that cannot negotiate a queue depth may ignore it.
    fn listen(&self, address: &str, backlog: usize) -> ProviderResult<Self::Listener>;
}

/// Applies filesystem permissions to a bound socket path.
pub trait PermissionLayer: Send + Sync + Debug + 'static {
    /// Synchronously sets the permission bits of `path` to `mode`.
    fn chmod(&self, path: &str, mode: u32) -> io::Result<()>;
}
