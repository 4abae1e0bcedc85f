//! Unix domain socket provider built on tokio.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use localsock_traits::{Connection, Listener, ProviderError, ProviderResult, SocketProvider};
use serde::{Deserialize, Serialize};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Unix socket provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnixConfig {
    /// Remove a leftover socket file at the listen path before binding
    pub remove_stale_socket: bool,
    /// Remove the socket file when the listener is closed
    pub cleanup_on_close: bool,
}

impl Default for UnixConfig {
    fn default() -> Self {
        Self {
            remove_stale_socket: false,
            cleanup_on_close: true,
        }
    }
}

/// Opens Unix domain sockets with tokio.
#[derive(Debug, Clone, Default)]
pub struct UnixSocketProvider {
    config: UnixConfig,
}

impl UnixSocketProvider {
    /// Create a provider with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with a custom configuration
    #[must_use]
    pub fn with_config(config: UnixConfig) -> Self {
        Self { config }
    }

    /// The provider configuration
    pub fn config(&self) -> &UnixConfig {
        &self.config
    }
}

#[async_trait]
impl SocketProvider for UnixSocketProvider {
    type Connection = UnixConnection;
    type Listener = UnixSocketListener;

    async fn connect(&self, address: &str) -> ProviderResult<UnixConnection> {
        let stream = UnixStream::connect(address).await?;
        Ok(UnixConnection::from_stream(stream))
    }

    fn listen(&self, address: &str, _backlog: usize) -> ProviderResult<UnixSocketListener> {
        let path = PathBuf::from(address);
        if self.config.remove_stale_socket && is_socket(&path) {
            debug!("Removing stale socket file at {:?}", path);
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        info!("Bound Unix socket listener at {:?}", path);

        Ok(UnixSocketListener {
            listener,
            path,
            shutdown: CancellationToken::new(),
            referenced: AtomicBool::new(true),
            cleanup_on_close: self.config.cleanup_on_close,
        })
    }
}

fn is_socket(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_socket())
}

/// A connected Unix domain socket.
#[derive(Debug)]
pub struct UnixConnection {
    stream: UnixStream,
    local_address: Option<String>,
}

impl UnixConnection {
    fn from_stream(stream: UnixStream) -> Self {
        let local_address = stream
            .local_addr()
            .ok()
            .and_then(|addr| addr.as_pathname().map(|path| path.display().to_string()));
        Self {
            stream,
            local_address,
        }
    }

    /// Get a reference to the underlying stream
    pub fn get_ref(&self) -> &UnixStream {
        &self.stream
    }

    /// Get a mutable reference to the underlying stream
    pub fn get_mut(&mut self) -> &mut UnixStream {
        &mut self.stream
    }

    /// Consume the connection, returning the underlying stream
    pub fn into_inner(self) -> UnixStream {
        self.stream
    }
}

impl Connection for UnixConnection {
    fn local_address(&self) -> Option<String> {
        self.local_address.clone()
    }
}

/// A listening Unix domain socket whose pending accept is woken by `close`.
///
/// `ref_handle` and `unref_handle` only toggle the flag reported by
/// `has_ref`. Tokio has no per-handle liveness control, so an unreferenced
/// listener does not let the runtime exit while its accept is pending.
#[derive(Debug)]
pub struct UnixSocketListener {
    listener: UnixListener,
    path: PathBuf,
    shutdown: CancellationToken,
    referenced: AtomicBool,
    cleanup_on_close: bool,
}

impl UnixSocketListener {
    /// The socket path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Listener for UnixSocketListener {
    type Connection = UnixConnection;

    async fn accept(&self) -> ProviderResult<UnixConnection> {
        if self.shutdown.is_cancelled() {
            return Err(ProviderError::ListenerClosed);
        }
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(ProviderError::ListenerClosed),
            accepted = self.listener.accept() => {
                let (stream, _addr) = accepted?;
                Ok(UnixConnection::from_stream(stream))
            }
        }
    }

    fn close(&self) -> ProviderResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(ProviderError::ListenerClosed);
        }
        self.shutdown.cancel();

        if self.cleanup_on_close
            && let Err(e) = std::fs::remove_file(&self.path)
        {
            debug!("Failed to remove socket file {:?}: {}", self.path, e);
        }
        Ok(())
    }

    fn local_address(&self) -> String {
        self.listener
            .local_addr()
            .ok()
            .and_then(|addr| addr.as_pathname().map(|path| path.display().to_string()))
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Advisory only; see the type docs.
    fn ref_handle(&self) {
        self.referenced.store(true, Ordering::Relaxed);
    }

    /// Advisory only; the runtime keeps running the pending accept.
    fn unref_handle(&self) {
        self.referenced.store(false, Ordering::Relaxed);
    }

    fn has_ref(&self) -> bool {
        self.referenced.load(Ordering::Relaxed)
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        // Already-closed listeners report ListenerClosed here.
        let _ = self.close();
    }
}
