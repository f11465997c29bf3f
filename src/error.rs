//! Status codes and the error taxonomy seen by callers.
//!
//! Callers only ever observe three kinds of failure:
//! - [`CallError::NotAllowed`]: the circuit breaker refused to attempt the call
//! - [`CallError::NoConnectionAvailable`]: every connection is fused or the set is empty
//! - [`CallError::Backend`]: the backend answered with a non-OK status (passed through unchanged)

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

/// Canonical RPC status codes reported by the transport.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }
}

impl From<u8> for Code {
    fn from(val: u8) -> Self {
        match val {
            0 => Code::Ok,
            1 => Code::Cancelled,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-OK result reported by the transport for a single call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(Code::ResourceExhausted, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }
}

/// Every connection in the set is fused, or the set is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no connection available")]
pub struct NoConnectionAvailable;

/// The circuit breaker for a target is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker open for {target}")]
pub struct NotAllowed {
    pub target: String,
}

/// Error returned to callers of the interceptor chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Refused by the circuit breaker; the backend was never asked.
    #[error(transparent)]
    NotAllowed(#[from] NotAllowed),

    /// No selectable connection; the transport was never invoked.
    #[error(transparent)]
    NoConnectionAvailable(#[from] NoConnectionAvailable),

    /// The backend answered with this status.
    #[error("backend {peer} returned {status}")]
    Backend { peer: SocketAddr, status: Status },
}

impl CallError {
    /// Status code reported to observers.
    ///
    /// Local refusals are reported as `Unavailable`; use [`CallError::is_breaker_open`]
    /// to tell them apart from a backend that said no.
    pub fn code(&self) -> Code {
        match self {
            CallError::NotAllowed(_) | CallError::NoConnectionAvailable(_) => Code::Unavailable,
            CallError::Backend { status, .. } => status.code,
        }
    }

    /// Peer that served the call, if one was selected.
    pub fn peer(&self) -> Option<SocketAddr> {
        match self {
            CallError::Backend { peer, .. } => Some(*peer),
            _ => None,
        }
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, CallError::NotAllowed(_))
    }

    /// The backend status, if the call actually reached a backend.
    pub fn status(&self) -> Option<&Status> {
        match self {
            CallError::Backend { status, .. } => Some(status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trips_through_u8() {
        for raw in 0u8..=16 {
            assert_eq!(Code::from(raw) as u8, raw);
        }
        assert_eq!(Code::from(200), Code::Unknown);
    }

    #[test]
    fn test_local_refusals_are_distinct() {
        let open = CallError::from(NotAllowed { target: "comment".into() });
        assert!(open.is_breaker_open());
        assert_eq!(open.peer(), None);
        assert_eq!(open.to_string(), "circuit breaker open for comment");

        let empty = CallError::from(NoConnectionAvailable);
        assert!(!empty.is_breaker_open());
        assert_eq!(empty.code(), Code::Unavailable);
    }

    #[test]
    fn test_backend_error_passes_status_through() {
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let err = CallError::Backend {
            peer,
            status: Status::new(Code::NotFound, "no such comment"),
        };
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(err.peer(), Some(peer));
        assert_eq!(err.status().map(|s| s.message.as_str()), Some("no such comment"));
    }
}
