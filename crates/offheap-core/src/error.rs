//! Error taxonomy for native memory operations.
//!
//! Every fallible operation in the workspace returns [`MemoryError`]. The
//! variants are grouped into five [`ErrorKind`]s so callers can tell a
//! threading bug from a lifetime bug from a plain argument error without
//! matching on every variant.

use std::error::Error;
use std::fmt;

use crate::id::ScopeId;

/// Coarse classification of a [`MemoryError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A layout, carrier, size or offset did not match what the operation
    /// requires. Always a caller error.
    ArgumentMismatch,
    /// An arena or the system allocator could not satisfy a request.
    CapacityExhausted,
    /// Access through a region, cursor or scope whose scope is closed.
    Liveness,
    /// A confined resource was touched from a thread that does not own it.
    Ownership,
    /// The operation hit an implementation limit or is not supported by
    /// this kind of scope or list.
    Unsupported,
}

/// Errors raised by scopes, regions, allocators and variadic lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryError {
    /// A layout's byte size does not match the size the carrier or address
    /// width requires.
    LayoutMismatch {
        /// Size required by the carrier.
        expected: u64,
        /// Size declared by the layout.
        actual: u64,
    },
    /// An argument is malformed (zero or non-power-of-two alignment, wrong
    /// layout shape, size overflow, invalid config).
    InvalidArgument {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// An access or slice falls outside a region's bounds.
    OutOfBounds {
        /// Requested offset within the region.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Size of the region.
        size: u64,
    },
    /// The allocator cannot serve a request of this size.
    OutOfMemory {
        /// Bytes requested.
        requested: u64,
        /// Bytes the allocator could still offer (0 for the system allocator).
        available: u64,
    },
    /// The owning scope has already been closed.
    AlreadyClosed {
        /// The closed scope.
        scope: ScopeId,
    },
    /// A confined scope was accessed from a thread other than its owner.
    WrongThread {
        /// The confined scope.
        scope: ScopeId,
    },
    /// The scope kind (global or implicit) has no explicit close point.
    ScopeNotClosable {
        /// The scope that rejected `close()`.
        scope: ScopeId,
    },
    /// The scope cannot be closed while guards from `acquire()` are live.
    ScopeAcquired {
        /// The scope that rejected `close()`.
        scope: ScopeId,
        /// Number of outstanding guards.
        count: usize,
    },
    /// An implementation limit was hit (unmodelled address width, reads
    /// from the empty variadic list).
    Unsupported {
        /// Description of the unsupported configuration.
        reason: String,
    },
}

impl MemoryError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LayoutMismatch { .. } | Self::InvalidArgument { .. } | Self::OutOfBounds { .. } => {
                ErrorKind::ArgumentMismatch
            }
            Self::OutOfMemory { .. } => ErrorKind::CapacityExhausted,
            Self::AlreadyClosed { .. } => ErrorKind::Liveness,
            Self::WrongThread { .. } => ErrorKind::Ownership,
            Self::ScopeNotClosable { .. } | Self::ScopeAcquired { .. } | Self::Unsupported { .. } => {
                ErrorKind::Unsupported
            }
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LayoutMismatch { expected, actual } => {
                write!(f, "layout size mismatch: {actual} != {expected}")
            }
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::OutOfBounds { offset, len, size } => {
                write!(
                    f,
                    "out of bounds access: offset {offset} length {len} on region of {size} bytes"
                )
            }
            Self::OutOfMemory {
                requested,
                available,
            } => {
                write!(
                    f,
                    "out of memory: requested {requested} bytes, {available} bytes available"
                )
            }
            Self::AlreadyClosed { scope } => write!(f, "scope {scope} is already closed"),
            Self::WrongThread { scope } => {
                write!(f, "scope {scope} accessed outside of its owner thread")
            }
            Self::ScopeNotClosable { scope } => write!(f, "scope {scope} cannot be closed"),
            Self::ScopeAcquired { scope, count } => {
                write!(f, "scope {scope} is acquired by {count} guard(s)")
            }
            Self::Unsupported { reason } => write!(f, "unsupported: {reason}"),
        }
    }
}

impl Error for MemoryError {}
