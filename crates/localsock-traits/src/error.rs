//! Portable error codes and the error types shared by endpoints and providers.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A specialized `Result` type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A specialized `Result` type for endpoint operations that can fail fatally.
pub type EndpointResult<T> = std::result::Result<T, EndpointError>;

/// Portable error codes reported to endpoint consumers.
///
/// The set is closed so callers can match exhaustively. Raw values follow the
/// libuv convention of negated errno numbers, with `Ok` as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The operation succeeded.
    Ok,
    /// No such file or directory.
    Enoent,
    /// Permission denied.
    Eacces,
    /// Address already in use.
    Eaddrinuse,
    /// Address not available.
    Eaddrnotavail,
    /// Connection refused.
    Econnrefused,
    /// Connection aborted before it could be accepted.
    Econnaborted,
    /// Invalid argument.
    Einval,
    /// Any failure without a more specific portable code.
    Unknown,
}

impl ErrorCode {
    /// Returns the symbolic name of the code (`"ENOENT"`, `"OK"`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Enoent => "ENOENT",
            Self::Eacces => "EACCES",
            Self::Eaddrinuse => "EADDRINUSE",
            Self::Eaddrnotavail => "EADDRNOTAVAIL",
            Self::Econnrefused => "ECONNREFUSED",
            Self::Econnaborted => "ECONNABORTED",
            Self::Einval => "EINVAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns the raw numeric code.
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Enoent => -2,
            Self::Eacces => -13,
            Self::Einval => -22,
            Self::Eaddrinuse => -98,
            Self::Eaddrnotavail => -99,
            Self::Econnaborted => -103,
            Self::Econnrefused => -111,
            Self::Unknown => -4094,
        }
    }

    /// Returns `true` for [`ErrorCode::Ok`].
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Maps a client connect failure.
    ///
    /// Anything other than a missing path or a permission problem is reported
    /// as a refused connection.
    pub fn for_connect(err: &ProviderError) -> Self {
        match err.kind() {
            Some(io::ErrorKind::NotFound) => Self::Enoent,
            Some(io::ErrorKind::PermissionDenied) => Self::Eacces,
            _ => Self::Econnrefused,
        }
    }

    /// Classifies a listen failure.
    ///
    /// Permission failures cannot be represented as a return code and must be
    /// raised to the caller.
    pub fn for_listen(err: &ProviderError) -> ListenDisposition {
        match err.kind() {
            Some(io::ErrorKind::AddrInUse) => ListenDisposition::Report(Self::Eaddrinuse),
            Some(io::ErrorKind::AddrNotAvailable) => ListenDisposition::Report(Self::Eaddrnotavail),
            Some(io::ErrorKind::PermissionDenied) => ListenDisposition::Raise,
            _ => ListenDisposition::Report(Self::Unknown),
        }
    }

    /// Maps a transient accept failure.
    pub fn for_accept(err: &ProviderError) -> Self {
        match err.kind() {
            Some(io::ErrorKind::ConnectionAborted) => Self::Econnaborted,
            Some(io::ErrorKind::PermissionDenied) => Self::Eacces,
            _ => Self::Unknown,
        }
    }

    /// Maps a permission-layer failure. Every such failure is `Unknown`.
    pub fn for_chmod(_err: &io::Error) -> Self {
        Self::Unknown
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of mapping a listen failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenDisposition {
    /// Return the code from `listen` without starting the accept loop.
    Report(ErrorCode),
    /// Propagate the failure to the caller as an [`EndpointError`].
    Raise,
}

/// Errors reported by a socket provider.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    /// The listener was closed; pending and future accepts fail with this.
    #[error("Listener closed")]
    ListenerClosed,

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProviderError {
    /// Returns the I/O error kind, if this error carries one.
    pub fn kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io(err) => Some(err.kind()),
            Self::ListenerClosed => None,
        }
    }

    /// Returns `true` if this error reports a closed listener.
    pub fn is_listener_closed(&self) -> bool {
        matches!(self, Self::ListenerClosed)
    }
}

/// Fatal endpoint errors that cannot be expressed as an [`ErrorCode`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EndpointError {
    /// Opening the listener was refused by the operating system.
    #[error("Permission denied while listening on {address}: {source}")]
    PermissionDenied {
        /// The address the endpoint tried to listen on
        address: String,
        /// The provider failure
        #[source]
        source: ProviderError,
    },

    /// The endpoint has been closed.
    #[error("Endpoint is closed")]
    Closed,

    /// The accept loop needs a tokio runtime and none is running.
    #[error("No tokio runtime available to drive the accept loop")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err(kind: io::ErrorKind) -> ProviderError {
        ProviderError::Io(io::Error::new(kind, "test"))
    }

    #[test]
    fn test_connect_mapping() {
        assert_eq!(
            ErrorCode::for_connect(&io_err(io::ErrorKind::NotFound)),
            ErrorCode::Enoent
        );
        assert_eq!(
            ErrorCode::for_connect(&io_err(io::ErrorKind::PermissionDenied)),
            ErrorCode::Eacces
        );
        assert_eq!(
            ErrorCode::for_connect(&io_err(io::ErrorKind::ConnectionRefused)),
            ErrorCode::Econnrefused
        );
        assert_eq!(
            ErrorCode::for_connect(&io_err(io::ErrorKind::TimedOut)),
            ErrorCode::Econnrefused
        );
        assert_eq!(
            ErrorCode::for_connect(&ProviderError::ListenerClosed),
            ErrorCode::Econnrefused
        );
    }

    #[test]
    fn test_listen_mapping() {
        assert_eq!(
            ErrorCode::for_listen(&io_err(io::ErrorKind::AddrInUse)),
            ListenDisposition::Report(ErrorCode::Eaddrinuse)
        );
        assert_eq!(
            ErrorCode::for_listen(&io_err(io::ErrorKind::AddrNotAvailable)),
            ListenDisposition::Report(ErrorCode::Eaddrnotavail)
        );
        assert_eq!(
            ErrorCode::for_listen(&io_err(io::ErrorKind::PermissionDenied)),
            ListenDisposition::Raise
        );
        assert_eq!(
            ErrorCode::for_listen(&io_err(io::ErrorKind::Other)),
            ListenDisposition::Report(ErrorCode::Unknown)
        );
    }

    #[test]
    fn test_accept_mapping_is_total() {
        assert_eq!(
            ErrorCode::for_accept(&io_err(io::ErrorKind::ConnectionAborted)),
            ErrorCode::Econnaborted
        );
        assert_eq!(
            ErrorCode::for_accept(&io_err(io::ErrorKind::OutOfMemory)),
            ErrorCode::Unknown
        );
        assert_eq!(
            ErrorCode::for_accept(&ProviderError::ListenerClosed),
            ErrorCode::Unknown
        );
    }

    #[test]
    fn test_error_code_display_and_raw() {
        assert_eq!(ErrorCode::Ok.to_string(), "OK");
        assert_eq!(ErrorCode::Enoent.to_string(), "ENOENT");
        assert_eq!(ErrorCode::Ok.as_raw(), 0);
        assert!(ErrorCode::Einval.as_raw() < 0);
        assert!(ErrorCode::Ok.is_ok());
        assert!(!ErrorCode::Unknown.is_ok());
    }

    #[test]
    fn test_error_code_serde_names() {
        let json = serde_json::to_string(&ErrorCode::Eaddrinuse).unwrap();
        assert_eq!(json, "\"EADDRINUSE\"");
    }

    #[test]
    fn test_provider_error_kind() {
        assert_eq!(
            io_err(io::ErrorKind::NotFound).kind(),
            Some(io::ErrorKind::NotFound)
        );
        assert!(ProviderError::ListenerClosed.is_listener_closed());
        assert!(ProviderError::ListenerClosed.kind().is_none());
    }
}
