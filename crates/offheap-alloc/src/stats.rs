//! Arena allocation counters.

/// Snapshot of an arena's allocation counters.
///
/// Counters are updated under the arena's serialization point, so a
/// snapshot is always internally consistent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Backing blocks obtained for bump allocation (excludes dedicated blocks).
    pub blocks_allocated: u64,
    /// Blocks obtained for a single oversized request.
    pub dedicated_blocks: u64,
    /// Bytes handed out to callers, excluding alignment padding.
    pub bytes_served: u64,
    /// Bytes obtained from the scope across all blocks.
    pub bytes_reserved: u64,
    /// Requests that failed with an error.
    pub failed_requests: u64,
}

impl ArenaStats {
    pub(crate) fn record_block(&mut self, size: u64) {
        self.blocks_allocated += 1;
        self.bytes_reserved += size;
    }

    pub(crate) fn record_dedicated(&mut self, size: u64) {
        self.dedicated_blocks += 1;
        self.bytes_reserved += size;
        self.bytes_served += size;
    }

    pub(crate) fn record_served(&mut self, size: u64) {
        self.bytes_served += size;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_requests += 1;
    }
}
