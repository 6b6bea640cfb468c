//! Server error types.

use std::fmt;

use crate::coordinator::CoordinatorError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, unreadable TLS
    /// material, bad TLS config).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Transport/network error (bind failure, connection failure).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    /// Check error message for details.
    Transport(String),

    /// Wire encoding failed for an outbound message.
    ///
    /// Fatal for that connection only; the server keeps serving others.
    Protocol(String),

    /// Fatal coordinator failure.
    ///
    /// Currently only id-space exhaustion. The process should halt
    /// loudly rather than keep running with corrupt admission behavior.
    Coordinator(CoordinatorError),

    /// Internal error (unexpected state, logic bug).
    ///
    /// Should never happen in a correct implementation. Report as issue.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Coordinator(err) => write!(f, "coordinator error: {err}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Coordinator(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CoordinatorError> for ServerError {
    fn from(err: CoordinatorError) -> Self {
        Self::Coordinator(err)
    }
}

impl From<roster_proto::ProtocolError> for ServerError {
    fn from(err: roster_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ServerError::Config("bad bind address".to_string());
        assert_eq!(err.to_string(), "configuration error: bad bind address");

        let err = ServerError::from(CoordinatorError::IdSpaceExhausted { limit: 4 });
        assert_eq!(err.to_string(), "coordinator error: session id space exhausted: all 4 ids in use");
    }
}
