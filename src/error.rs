//! Error types for the simulation core and the sync protocol.

use thiserror::Error;

/// Errors a server endpoint can reject a request with.
///
/// Each variant maps to one HTTP status so the transport layer can stay
/// dumb about semantics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    /// Malformed or semantically invalid request (bad payload, locked
    /// content, negative snapshot values, already-owned item, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The player cannot afford the requested purchase.
    #[error("insufficient {currency}: need {needed}, have {available}")]
    InsufficientResources {
        currency: &'static str,
        needed: u64,
        available: u64,
    },

    /// The referenced entity does not exist (unknown item, empty inventory
    /// slot, unknown machine type).
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or invalid session token.
    #[error("unauthorized")]
    Unauthorized,

    /// Transient server-side failure. Safe to retry.
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code this error is reported with.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation(_) | ApiError::InsufficientResources { .. } => 400,
            ApiError::Unauthorized => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Internal(_) => 500,
        }
    }
}

/// Failure to deliver a request at all (the request may or may not have
/// reached the server).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("network unreachable: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
}

/// Errors surfaced to the session by the sync layer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The request never completed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The server rejected the mutation. The local prediction must be
    /// rolled back.
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server response could not be interpreted. Client and server
    /// state can no longer be assumed consistent; a full reload is the
    /// only safe recovery.
    #[error("client desynchronized: {0}")]
    Desync(String),
}

impl SyncError {
    /// Whether the failure is a transient one worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::Rejected { status, .. } => *status >= 500,
            SyncError::Desync(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Validation("bad".into()).status(), 400);
        assert_eq!(
            ApiError::InsufficientResources {
                currency: "scrap",
                needed: 100,
                available: 5
            }
            .status(),
            400
        );
        assert_eq!(ApiError::Unauthorized.status(), 401);
        assert_eq!(ApiError::NotFound("item 7".into()).status(), 404);
        assert_eq!(ApiError::Internal("db".into()).status(), 500);
    }

    #[test]
    fn insufficient_resources_display() {
        let err = ApiError::InsufficientResources {
            currency: "scrap",
            needed: 500,
            available: 120,
        };
        let s = err.to_string();
        assert!(s.contains("scrap"));
        assert!(s.contains("500"));
        assert!(s.contains("120"));
    }

    #[test]
    fn transient_classification() {
        assert!(SyncError::Transport(TransportError::Timeout).is_transient());
        assert!(SyncError::Rejected {
            status: 503,
            message: "busy".into()
        }
        .is_transient());
        assert!(!SyncError::Rejected {
            status: 400,
            message: "no".into()
        }
        .is_transient());
        assert!(!SyncError::Desync("garbled body".into()).is_transient());
    }
}
