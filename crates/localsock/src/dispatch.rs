//! Delivery of accept-loop events to consumers.
//!
//! The accept loop pushes [`ConnectionEvent`]s into a bounded channel sized to
//! the endpoint's backlog. Consumers either drain [`Incoming`] themselves or
//! hand it to [`spawn_dispatcher`] together with a callback.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures::Stream;
use localsock_traits::{ConnectionEvent, ConnectionHandle, ErrorCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Receiving side of an endpoint's delivery channel.
///
/// Yields nothing once the endpoint is closed, including events that were
/// buffered before the close.
#[derive(Debug)]
pub struct Incoming<C> {
    receiver: mpsc::Receiver<ConnectionEvent<C>>,
    shutdown: CancellationToken,
}

impl<C> Incoming<C> {
    pub(crate) fn new(
        receiver: mpsc::Receiver<ConnectionEvent<C>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { receiver, shutdown }
    }

    /// Waits for the next accept-loop outcome.
    ///
    /// Returns `None` once the endpoint has been closed.
    pub async fn recv(&mut self) -> Option<ConnectionEvent<C>> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            event = self.receiver.recv() => event,
        }
    }

    /// Whether the owning endpoint has been closed.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Converts into a [`Stream`] of events.
    pub fn into_stream(self) -> impl Stream<Item = ConnectionEvent<C>> {
        futures::stream::unfold(self, |mut incoming| async move {
            incoming.recv().await.map(|event| (event, incoming))
        })
    }
}

/// Drains `incoming` on a new task, calling `on_connection` for every event.
///
/// A panic inside `on_connection` is caught and logged; the dispatcher keeps
/// draining. The task ends when the endpoint is closed.
pub fn spawn_dispatcher<C, F>(mut incoming: Incoming<C>, mut on_connection: F) -> JoinHandle<()>
where
    C: Send + 'static,
    F: FnMut(ErrorCode, Option<ConnectionHandle<C>>) + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = incoming.recv().await {
            let (code, handle) = event.into_parts();
            invoke_guarded("on_connection", || on_connection(code, handle));
        }
        debug!("Connection dispatcher finished");
    })
}

/// Runs a consumer callback, discarding any panic it raises.
pub(crate) fn invoke_guarded<F: FnOnce()>(callback: &'static str, f: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        error!(
            callback,
            "Discarding panic from consumer callback: {}",
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_guarded_swallows_panic() {
        let mut ran = false;
        invoke_guarded("test", || ran = true);
        assert!(ran);
        invoke_guarded("test", || panic!("consumer bug"));
    }

    #[test]
    fn test_panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_incoming_stops_after_shutdown() {
        let (tx, rx) = mpsc::channel::<ConnectionEvent<()>>(4);
        let shutdown = CancellationToken::new();
        let mut incoming = Incoming::new(rx, shutdown.clone());

        tx.send(ConnectionEvent::failed(ErrorCode::Unknown))
            .await
            .unwrap();
        tx.send(ConnectionEvent::failed(ErrorCode::Unknown))
            .await
            .unwrap();

        let event = incoming.recv().await.unwrap();
        assert_eq!(event.code, ErrorCode::Unknown);

        shutdown.cancel();
        assert!(incoming.is_closed());
        assert!(incoming.recv().await.is_none());
    }
}
