//! Recycling allocator over one caller-supplied region.

use offheap_core::{MemoryError, Region};

use crate::allocator::SegmentAllocator;

/// Hands out the first `size` bytes of the same region on every call.
///
/// Alignment is ignored and every returned region starts at offset 0, so
/// each allocation overwrites the contents of the previous one. Useful for
/// scratch buffers that are consumed before the next allocation.
///
/// The bookkeeping is trivially thread-safe, but concurrent callers receive
/// aliasing regions and race on their contents. That hazard is part of the
/// contract: no locking is added around it.
#[derive(Clone, Debug)]
pub struct PrefixAllocator {
    region: Region,
}

impl PrefixAllocator {
    /// Recycle `region` for every allocation.
    pub fn new(region: Region) -> Self {
        Self { region }
    }

    /// The recycled region.
    pub fn region(&self) -> &Region {
        &self.region
    }
}

impl SegmentAllocator for PrefixAllocator {
    fn allocate(&self, size: u64, _align: u64) -> Result<Region, MemoryError> {
        if size > self.region.byte_size() {
            return Err(MemoryError::OutOfMemory {
                requested: size,
                available: self.region.byte_size(),
            });
        }
        self.region.slice(0, size)
    }
}

/// A recycling allocator over `region`.
pub fn prefix(region: Region) -> PrefixAllocator {
    PrefixAllocator::new(region)
}
