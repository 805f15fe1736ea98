//! Low-level native block allocation.
//!
//! The only module in `offheap-core` that calls the system allocator. Each
//! [`RawBlock`] owns one zero-initialised allocation and frees it on drop.

#![allow(unsafe_code)]

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::MemoryError;

/// One zero-initialised allocation from the system allocator.
pub(crate) struct RawBlock {
    ptr: NonNull<u8>,
    layout: Layout,
    /// Requested size; `layout.size()` is at least 1 even for empty blocks.
    size: u64,
}

// SAFETY: a RawBlock is a uniquely owned heap allocation with no interior
// references; moving or sharing the owner across threads is sound.
unsafe impl Send for RawBlock {}
// SAFETY: RawBlock exposes no mutation through `&self`.
unsafe impl Sync for RawBlock {}

impl RawBlock {
    /// Allocate `size` zeroed bytes aligned to `align`.
    ///
    /// `align` must be a non-zero power of two. Returns `OutOfMemory` when
    /// the system allocator fails.
    pub(crate) fn allocate(size: u64, align: u64) -> Result<Self, MemoryError> {
        if !align.is_power_of_two() {
            return Err(MemoryError::invalid(format!(
                "alignment must be a power of two (got {align})"
            )));
        }
        let too_large = || MemoryError::OutOfMemory {
            requested: size,
            available: 0,
        };
        let bytes = usize::try_from(size).map_err(|_| too_large())?;
        let align = usize::try_from(align).map_err(|_| too_large())?;
        let layout = Layout::from_size_align(bytes.max(1), align).map_err(|_| too_large())?;
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(too_large)?;
        Ok(Self { ptr, layout, size })
    }

    /// Base address of the block.
    pub(crate) fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Requested size in bytes.
    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    /// Whether `[addr, addr + len)` lies inside this block.
    pub(crate) fn contains(&self, addr: usize, len: u64) -> bool {
        let base = self.addr() as u64;
        let addr = addr as u64;
        addr >= base && len <= self.size && addr - base <= self.size - len
    }
}

impl Drop for RawBlock {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by alloc_zeroed with this exact layout
        // and is freed exactly once.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
