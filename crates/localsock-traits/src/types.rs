//! Core endpoint types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The role an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    /// A client-facing or duplex stream socket.
    Socket,
    /// A listening endpoint that accepts connections.
    Server,
    /// A duplex socket that also carries out-of-band control messages.
    Ipc,
}

impl EndpointRole {
    /// Returns `true` if this role carries control messages alongside stream data.
    pub const fn is_ipc(self) -> bool {
        matches!(self, Self::Ipc)
    }

    /// The role given to connections accepted by an endpoint of this role.
    ///
    /// Accepted connections are always duplex sockets; they inherit the IPC
    /// flag of the listening endpoint.
    pub const fn accepted(ipc: bool) -> Self {
        if ipc { Self::Ipc } else { Self::Socket }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket => write!(f, "socket"),
            Self::Server => write!(f, "server"),
            Self::Ipc => write!(f, "ipc"),
        }
    }
}

/// Lifecycle state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointState {
    /// Freshly created, no address recorded.
    Idle,
    /// An address is recorded (by `bind` or a completed `connect`).
    Bound,
    /// The listener is open and the accept loop has been started.
    Listening,
    /// The accept loop is awaiting the next inbound connection.
    Accepting,
    /// The accept loop is waiting out a retry delay.
    Backoff,
    /// Terminal. No further accepts or retries are scheduled.
    Closed,
}

impl EndpointState {
    /// Returns `true` once the endpoint has been closed.
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` while an accept loop is running.
    pub const fn is_listening(self) -> bool {
        matches!(self, Self::Listening | Self::Accepting | Self::Backoff)
    }
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Bound => write!(f, "bound"),
            Self::Listening => write!(f, "listening"),
            Self::Accepting => write!(f, "accepting"),
            Self::Backoff => write!(f, "backoff"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Access granted to other processes through `fchmod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketMode {
    /// Read access for user, group and others.
    Readable,
    /// Write access for user, group and others.
    Writable,
    /// Read and write access for user, group and others.
    ReadWrite,
}

impl SocketMode {
    /// Bit value of [`SocketMode::Readable`].
    pub const READABLE: u32 = 0b0100;
    /// Bit value of [`SocketMode::Writable`].
    pub const WRITABLE: u32 = 0b1000;

    /// Parses a mode from its bit representation.
    ///
    /// Only `READABLE`, `WRITABLE` and their union are accepted.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            Self::READABLE => Some(Self::Readable),
            Self::WRITABLE => Some(Self::Writable),
            b if b == Self::READABLE | Self::WRITABLE => Some(Self::ReadWrite),
            _ => None,
        }
    }

    /// POSIX permission bits for this mode.
    pub const fn posix_mode(self) -> u32 {
        match self {
            Self::Readable => 0o444,
            Self::Writable => 0o222,
            Self::ReadWrite => 0o666,
        }
    }
}
