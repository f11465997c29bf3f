//! Passive health checking (call outcome classification).
//!
//! # Responsibilities
//! - Turn the result of a finished call into a health signal
//! - Decide what the picker and the circuit breaker do with that signal
//!
//! # Design Decisions
//! - Only `Unavailable` fuses a connection
//! - `ResourceExhausted` lowers pick probability but never fuses
//! - Cancelled and deadline-exceeded calls say nothing about the backend
//! - Client-side errors (bad argument, not found, ...) mean the backend answered

use crate::error::{CallError, Code, Status};

/// Health signal derived from one finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The backend answered.
    Success,
    /// Cancelled or timed out by the caller; not a health signal.
    Ignored,
    /// Backend unreachable; fuse the connection.
    Unavailable,
    /// Backend saturated; make it less attractive without excluding it.
    Overloaded,
    /// Backend-side fault that does not warrant fusing.
    Failure,
}

impl Outcome {
    pub fn from_code(code: Code) -> Self {
        match code {
            Code::Ok
            | Code::InvalidArgument
            | Code::NotFound
            | Code::AlreadyExists
            | Code::PermissionDenied
            | Code::FailedPrecondition
            | Code::Aborted
            | Code::OutOfRange
            | Code::Unimplemented
            | Code::Unauthenticated => Outcome::Success,
            Code::Cancelled | Code::DeadlineExceeded => Outcome::Ignored,
            Code::Unavailable => Outcome::Unavailable,
            Code::ResourceExhausted => Outcome::Overloaded,
            Code::Internal | Code::Unknown | Code::DataLoss => Outcome::Failure,
        }
    }

    /// Classify a transport result.
    pub fn from_result<T>(result: &Result<T, Status>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(status) => Self::from_code(status.code),
        }
    }

    /// Classify a result as seen by the breaker interceptor.
    ///
    /// Local refusals never reached a backend. The fuse that emptied the
    /// connection set was already recorded as `Unavailable`.
    pub fn from_call<T>(result: &Result<T, CallError>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(CallError::Backend { status, .. }) => Self::from_code(status.code),
            Err(CallError::NoConnectionAvailable(_) | CallError::NotAllowed(_)) => Outcome::Ignored,
        }
    }

    /// What the circuit breaker records: `Some(true)` success, `Some(false)`
    /// failure, `None` excluded from the window.
    pub fn breaker_signal(&self) -> Option<bool> {
        match self {
            Outcome::Success => Some(true),
            Outcome::Ignored => None,
            Outcome::Unavailable | Outcome::Overloaded | Outcome::Failure => Some(false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Ignored => "ignored",
            Outcome::Unavailable => "unavailable",
            Outcome::Overloaded => "overloaded",
            Outcome::Failure => "failure",
        }
    }
}
