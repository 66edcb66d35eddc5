//! Error types and result alias.
//!
//! Every fallible path in the engine reports one of a small set of error
//! kinds. `Retry` deserves a note: it is the would-block signal of the
//! event entry points, telling the host's event loop to come back when
//! the descriptor is ready, and is not a failure.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Framing or DER violation: unexpected top tag, length overflow,
    /// message id out of range, protocolOp tag out of range.
    #[error("malformed message: {0}")]
    Malformed(&'static str),
    /// No stage installed, opcode rejected by policy, unknown extended
    /// OID, or empty callback slot.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// A pool refused an allocation.
    #[error("pool allocation failed")]
    OutOfMemory,
    /// Nothing to do right now; retry on the next readiness event.
    #[error("operation would block")]
    Retry,
    /// The transport failed underneath us.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The library was used before it was set up: no allocator installed,
    /// invalid open parameters, endpoint already closed.
    #[error("precondition violated: {0}")]
    Precondition(&'static str),
}

/// The flat kind of an [`Error`], for hosts that route on category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Malformed,
    Unsupported,
    OutOfMemory,
    Retry,
    Io,
    Precondition,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Malformed(_) => ErrorKind::Malformed,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::OutOfMemory => ErrorKind::OutOfMemory,
            Error::Retry => ErrorKind::Retry,
            Error::Io(_) => ErrorKind::Io,
            Error::Precondition(_) => ErrorKind::Precondition,
        }
    }
}

impl From<derwalk::WalkError> for Error {
    fn from(e: derwalk::WalkError) -> Error {
        use derwalk::WalkError::*;
        Error::Malformed(match e {
            Mismatch => "element does not match the expected structure",
            Trailing => "trailing octets after the structure",
            MissingField => "a required field is absent",
            Program => "walk program and field array disagree",
        })
    }
}
