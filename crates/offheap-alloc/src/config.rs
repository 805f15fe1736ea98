//! Arena configuration parameters.

use offheap_core::MemoryError;

/// Configuration for arena allocators.
///
/// Validated by every arena constructor; immutable after the arena is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Size of each backing block of an unbounded arena, in bytes.
    ///
    /// Default: 4096. Requests larger than this get a dedicated block.
    /// Must be non-zero.
    pub block_size: u64,

    /// Alignment every backing block is requested with, in bytes.
    ///
    /// Default: 16. Requests with an alignment up to this value never need
    /// leading padding in a fresh block. Must be a power of two.
    pub block_alignment: u64,
}

impl ArenaConfig {
    /// Default block size: one 4 KiB page.
    pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

    /// Default block alignment.
    pub const DEFAULT_BLOCK_ALIGNMENT: u64 = 16;

    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            block_alignment: Self::DEFAULT_BLOCK_ALIGNMENT,
        }
    }

    /// Set the block size.
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the block alignment.
    pub fn with_block_alignment(mut self, block_alignment: u64) -> Self {
        self.block_alignment = block_alignment;
        self
    }

    /// Check every field against its documented constraint.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.block_size == 0 {
            return Err(MemoryError::InvalidArgument {
                reason: "block_size must be non-zero".into(),
            });
        }
        if !self.block_alignment.is_power_of_two() {
            return Err(MemoryError::InvalidArgument {
                reason: format!(
                    "block_alignment must be a power of two (got {})",
                    self.block_alignment
                ),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
