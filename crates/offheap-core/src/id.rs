//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`ScopeId`] allocation.
static SCOPE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-process identifier of a resource scope.
///
/// Allocated from a monotonic atomic counter, so two scopes never share an
/// id even if one is dropped and another created in its place. Errors carry
/// the id of the scope they concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u64);

impl ScopeId {
    /// Allocate a fresh, unique scope id. Thread-safe.
    pub fn next() -> Self {
        Self(SCOPE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
