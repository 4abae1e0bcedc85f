//! # localsock
//!
//! Connection-oriented transport endpoint for stream-style local sockets.
//!
//! This crate provides:
//!
//! - **Server Mode**: `bind` + `listen` start an accept loop that delivers
//!   connections through a bounded channel sized to the backlog
//! - **Client Mode**: `connect` with a completion callback
//! - **IPC Endpoints**: accepted connections inherit the endpoint's IPC flag
//! - **Accept Backoff**: transient accept failures back off exponentially and
//!   reset on the next success
//! - **Portable Errors**: provider failures map onto a closed [`ErrorCode`] set
//! - **Idempotent Teardown**: `close` is safe with an accept in flight
//!
//! ## Quick Start
//!
//! ### Server Mode
//!
//! ```rust,ignore
//! use localsock::{TransportEndpointBuilder, UnixSocketProvider, spawn_dispatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = TransportEndpointBuilder::new_server(UnixSocketProvider::new()).build();
//!     endpoint.bind("/tmp/my-endpoint.sock");
//!     endpoint.listen(511)?;
//!
//!     let incoming = endpoint.incoming().expect("listening");
//!     spawn_dispatcher(incoming, |code, handle| {
//!         println!("{code}: {:?}", handle.map(|h| h.role()));
//!     });
//!     Ok(())
//! }
//! ```
//!
//! ### Client Mode
//!
//! ```rust,ignore
//! use localsock::{TransportEndpointBuilder, UnixSocketProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let endpoint = TransportEndpointBuilder::new_client(UnixSocketProvider::new()).build();
//!     endpoint
//!         .connect("/tmp/my-endpoint.sock", 1u32, |token, code| {
//!             println!("connect #{token}: {code}");
//!         })
//!         .await;
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_panics_doc
)]

mod accept;
mod backoff;
mod dispatch;
mod endpoint;
mod permissions;
mod registry;
#[cfg(unix)]
mod unix;

pub use backoff::AcceptBackoff;
pub use dispatch::{Incoming, spawn_dispatcher};
pub use endpoint::{MAX_DELIVERY_CAPACITY, TransportEndpoint, TransportEndpointBuilder};
pub use permissions::FsPermissions;
pub use registry::ConnectionRegistry;
#[cfg(unix)]
pub use unix::{UnixConfig, UnixConnection, UnixSocketListener, UnixSocketProvider};

/// An endpoint over tokio Unix domain sockets.
#[cfg(unix)]
pub type UnixEndpoint = TransportEndpoint<UnixSocketProvider>;

// Re-export foundation types for convenience
pub use localsock_traits::{
    BacklogStrategy, BackoffConfig, Connection, ConnectionEvent, ConnectionHandle,
    EndpointConfig, EndpointError, EndpointMetricsSnapshot, EndpointResult, EndpointRole,
    EndpointState, ErrorCode, Listener, PermissionLayer, ProviderError, ProviderResult,
    SocketMode, SocketProvider,
};
