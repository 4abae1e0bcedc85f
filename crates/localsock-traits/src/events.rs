//! Connection handles and accept-loop delivery events.

use crate::error::ErrorCode;
use crate::traits::Connection;
use crate::types::EndpointRole;

/// One accepted or connected connection, owned by the consumer once delivered.
#[derive(Debug)]
pub struct ConnectionHandle<C> {
    role: EndpointRole,
    local_address: Option<String>,
    connection: C,
}

impl<C: Connection> ConnectionHandle<C> {
    /// Wraps a connection with an explicit role.
    pub fn new(role: EndpointRole, connection: C) -> Self {
        let local_address = connection.local_address();
        Self {
            role,
            local_address,
            connection,
        }
    }

    /// Wraps a connection accepted by a listener.
    ///
    /// The handle is a duplex socket carrying the listener's IPC flag.
    pub fn accepted(ipc: bool, connection: C) -> Self {
        Self::new(EndpointRole::accepted(ipc), connection)
    }
}

impl<C> ConnectionHandle<C> {
    /// The role of this connection.
    pub fn role(&self) -> EndpointRole {
        self.role
    }

    /// Whether this connection carries control messages.
    pub fn is_ipc(&self) -> bool {
        self.role.is_ipc()
    }

    /// The resolved local address, captured when the handle was created.
    pub fn local_address(&self) -> Option<&str> {
        self.local_address.as_deref()
    }

    /// Borrows the underlying connection.
    pub fn get_ref(&self) -> &C {
        &self.connection
    }

    /// Mutably borrows the underlying connection.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Consumes the handle, returning the underlying connection.
    pub fn into_inner(self) -> C {
        self.connection
    }
}

/// One accept-loop outcome: a delivered connection or a reported failure.
#[derive(Debug)]
pub struct ConnectionEvent<C> {
    /// `Ok` for a delivered connection, otherwise the mapped failure.
    pub code: ErrorCode,
    /// Present only when `code` is `Ok`.
    pub handle: Option<ConnectionHandle<C>>,
}

impl<C> ConnectionEvent<C> {
    /// A successfully accepted connection.
    pub fn accepted(handle: ConnectionHandle<C>) -> Self {
        Self {
            code: ErrorCode::Ok,
            handle: Some(handle),
        }
    }

    /// A reported accept failure.
    pub fn failed(code: ErrorCode) -> Self {
        Self { code, handle: None }
    }

    /// Splits the event into its code and optional handle.
    pub fn into_parts(self) -> (ErrorCode, Option<ConnectionHandle<C>>) {
        (self.code, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeConnection;

    impl Connection for FakeConnection {
        fn local_address(&self) -> Option<String> {
            Some("/tmp/fake.sock".to_string())
        }
    }

    #[test]
    fn test_accepted_handle_role() {
        let handle = ConnectionHandle::accepted(true, FakeConnection);
        assert_eq!(handle.role(), EndpointRole::Ipc);
        assert!(handle.is_ipc());
        assert_eq!(handle.local_address(), Some("/tmp/fake.sock"));

        let handle = ConnectionHandle::accepted(false, FakeConnection);
        assert_eq!(handle.role(), EndpointRole::Socket);
    }

    #[test]
    fn test_event_constructors() {
        let event = ConnectionEvent::accepted(ConnectionHandle::accepted(false, FakeConnection));
        assert_eq!(event.code, ErrorCode::Ok);
        assert!(event.handle.is_some());

        let (code, handle) = ConnectionEvent::<FakeConnection>::failed(ErrorCode::Unknown).into_parts();
        assert_eq!(code, ErrorCode::Unknown);
        assert!(handle.is_none());
    }
}
