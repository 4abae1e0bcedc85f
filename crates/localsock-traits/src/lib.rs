//! # localsock traits
//!
//! Foundation types for the localsock transport endpoint. Providers of
//! OS sockets and consumers of accepted connections depend on this crate.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`SocketProvider`], [`Listener`], [`Connection`], [`PermissionLayer`]
//! - **Types**: [`EndpointRole`], [`EndpointState`], [`SocketMode`]
//! - **Errors**: [`ErrorCode`], [`ProviderError`], [`EndpointError`]
//! - **Config**: [`EndpointConfig`], [`BackoffConfig`], [`BacklogStrategy`]
//! - **Events**: [`ConnectionHandle`], [`ConnectionEvent`]
//! - **Metrics**: [`EndpointMetrics`], [`EndpointMetricsSnapshot`]
//!
//! ## Usage
//!
//! A provider implements [`SocketProvider`] and its [`Listener`]:
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use localsock_traits::{ProviderResult, SocketProvider};
//!
//! #[derive(Debug)]
//! struct MyProvider;
//!
//! #[async_trait]
//! impl SocketProvider for MyProvider {
//!     type Connection = MyConnection;
//!     type Listener = MyListener;
//!     // ...
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
    clippy::must_use_candidate
)]

mod config;
mod error;
mod events;
mod metrics;
mod traits;
mod types;

// Re-export all public items
pub use config::{BacklogStrategy, BackoffConfig, DEFAULT_PENDING_INSTANCES, EndpointConfig};
pub use error::{
    EndpointError, EndpointResult, ErrorCode, ListenDisposition, ProviderError, ProviderResult,
};
pub use events::{ConnectionEvent, ConnectionHandle};
pub use metrics::{EndpointMetrics, EndpointMetricsSnapshot};
pub use traits::{Connection, Listener, PermissionLayer, SocketProvider};
pub use types::{EndpointRole, EndpointState, SocketMode};
