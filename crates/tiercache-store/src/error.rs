//! Error types for remote store operations.

/// Errors that can occur when talking to the remote store.
///
/// Transport-level failures (`Connection`, `Command`) cause the backend to
/// transition to disconnected; once disconnected, every operation returns
/// `Disconnected` until the instance is recreated.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a connection to the remote store.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// A command failed at the transport or protocol level.
    #[error("Command error: {message}")]
    Command {
        /// Description of the command failure.
        message: String,
    },

    /// The backend already transitioned to disconnected; the call was a no-op.
    #[error("Store is disconnected")]
    Disconnected,

    /// A cached value could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Returns `true` if this error reports an already-disconnected backend.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Returns `true` if this is a transport-level failure (the kind that
    /// trips the one-way disconnect).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Command { .. })
    }
}
