//! Live-connection bookkeeping for a listening endpoint.

/// Counts connections delivered by the accept loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionRegistry {
    count: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one delivered connection and returns the new count.
    pub fn register(&mut self) -> usize {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Records one closed connection and returns the new count.
    pub fn release(&mut self) -> usize {
        self.count = self.count.saturating_sub(1);
        self.count
    }

    /// Current number of registered connections.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the accept loop must throttle.
    ///
    /// The comparison is strict: a registry holding exactly `backlog`
    /// connections still admits one more.
    pub fn is_over(&self, backlog: usize) -> bool {
        self.count > backlog
    }

    /// Forgets every registered connection.
    pub fn clear(&mut self) {
        self.count = 0;
    }
}
