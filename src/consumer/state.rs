//! Per-loop connection state.

use std::fmt;

use tokio::sync::watch;

/// Lifecycle of one topic consumer loop.
///
/// `Connecting` may be re-entered any number of times while the broker is
/// unavailable. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Consuming,
    Stopped,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Consuming => "consuming",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes a loop's state to any number of observers.
#[derive(Debug)]
pub(crate) struct StateCell {
    sender: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(ConnectionState::Disconnected);
        Self { sender }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.sender.borrow()
    }

    /// Moves to `next` unless the loop has already stopped.
    pub(crate) fn set(&self, next: ConnectionState) {
        self.sender.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let cell = StateCell::new();
        cell.set(ConnectionState::Consuming);
        cell.set(ConnectionState::Stopped);
        cell.set(ConnectionState::Connecting);
        assert_eq!(cell.get(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_observers_see_transitions() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();

        cell.set(ConnectionState::Connecting);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
    }
}
