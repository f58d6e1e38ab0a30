//! Hub error types.

use thiserror::Error;

/// Failure reported by a transport half.
///
/// Every variant is handled the same way by the pumps: the affected
/// connection is torn down and nothing else is disturbed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport was already closed (by the peer or locally).
    #[error("connection closed")]
    Closed,
    /// Read or write failed at the I/O layer.
    #[error("transport I/O error: {0}")]
    Io(String),
    /// The peer violated the framing protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Failure talking to the hub dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HubError {
    /// The dispatcher loop has exited (shutdown) and accepts no more events.
    #[error("hub dispatcher is not running")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        assert_eq!(TransportError::Closed.to_string(), "connection closed");
        assert_eq!(
            TransportError::Io("broken pipe".into()).to_string(),
            "transport I/O error: broken pipe"
        );
        assert!(
            TransportError::Protocol("bad opcode".into())
                .to_string()
                .contains("bad opcode")
        );
    }

    #[test]
    fn hub_error_display() {
        assert_eq!(HubError::Stopped.to_string(), "hub dispatcher is not running");
    }
}
