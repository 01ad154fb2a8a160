//! Error types for jack-fifo

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::fifo::Role;

/// Result type for jack-fifo operations
pub type Result<T> = std::result::Result<T, FifoError>;

/// Errors that can occur on a FIFO channel
#[derive(Debug, Error)]
pub enum FifoError {
    /// Built path does not fit the platform path limit
    #[error("FIFO name too long: max {max} bytes, got {got}")]
    NameTooLong { max: usize, got: usize },

    /// A name component cannot be used in a FIFO identity
    #[error("Invalid FIFO name component '{component}': {reason}")]
    InvalidName {
        component: String,
        reason: &'static str,
    },

    /// Operation on a channel that is not open
    #[error("FIFO {op} on '{}': already deallocated", .name.display())]
    AlreadyDisconnected { name: PathBuf, op: &'static str },

    /// Something other than a FIFO occupies the identity path
    #[error("FIFO '{}' already exists, but is not a FIFO", .name.display())]
    NamespaceConflict { name: PathBuf },

    /// Failed to create (or inspect) the named FIFO
    #[error("Cannot create inter-client FIFO '{}': {source}", .name.display())]
    CreationFailed {
        name: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to open the named FIFO
    #[error("Cannot open FIFO '{}': {source}", .name.display())]
    OpenFailed {
        name: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A token read or write failed at the OS level
    #[error("FIFO {op} on '{}' failed: {source}", .name.display())]
    Io {
        name: PathBuf,
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// A token read or write moved the wrong number of bytes
    #[error("FIFO {op} on '{}' moved {got} bytes, expected {expected}", .name.display())]
    ShortTransfer {
        name: PathBuf,
        op: &'static str,
        expected: usize,
        got: usize,
    },

    /// Readiness polling failed for a reason other than interruption
    #[error("FIFO poll on '{}' failed: {source}", .name.display())]
    PollError {
        name: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bounded wait elapsed without a token
    #[error("FIFO timed wait on '{}' expired after {timeout:?} (revents 0x{revents:x})", .name.display())]
    Timeout {
        name: PathBuf,
        timeout: Duration,
        revents: i32,
    },

    /// Operation reserved for the other role
    #[error("FIFO {op} is not permitted for the {role:?} role")]
    WrongRole { op: &'static str, role: Role },

    /// Channel already bound to a different identity
    #[error("FIFO is bound to '{}', refusing to switch to '{}'", .current.display(), .requested.display())]
    IdentityMismatch { current: PathBuf, requested: PathBuf },
}

/// Fieldless classification of a [`FifoError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NameTooLong,
    InvalidName,
    AlreadyDisconnected,
    NamespaceConflict,
    CreationFailed,
    OpenFailed,
    Io,
    ShortTransfer,
    PollError,
    Timeout,
    WrongRole,
    IdentityMismatch,
}

impl FifoError {
    /// Class of this error, without its payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            FifoError::NameTooLong { .. } => ErrorKind::NameTooLong,
            FifoError::InvalidName { .. } => ErrorKind::InvalidName,
            FifoError::AlreadyDisconnected { .. } => ErrorKind::AlreadyDisconnected,
            FifoError::NamespaceConflict { .. } => ErrorKind::NamespaceConflict,
            FifoError::CreationFailed { .. } => ErrorKind::CreationFailed,
            FifoError::OpenFailed { .. } => ErrorKind::OpenFailed,
            FifoError::Io { .. } => ErrorKind::Io,
            FifoError::ShortTransfer { .. } => ErrorKind::ShortTransfer,
            FifoError::PollError { .. } => ErrorKind::PollError,
            FifoError::Timeout { .. } => ErrorKind::Timeout,
            FifoError::WrongRole { .. } => ErrorKind::WrongRole,
            FifoError::IdentityMismatch { .. } => ErrorKind::IdentityMismatch,
        }
    }
}
