//! Allocators that delegate straight to native allocation.
//!
//! None of these pool memory: every request is one native block. They
//! differ only in which scope owns the block.

use offheap_core::{MemoryError, Region, ResourceScope, ScopeKind};

use crate::allocator::{check_request, SegmentAllocator};

/// Allocates every request under one fixed scope.
#[derive(Clone, Debug)]
pub struct ScopedAllocator {
    scope: ResourceScope,
}

impl ScopedAllocator {
    /// Allocate under `scope`.
    pub fn new(scope: &ResourceScope) -> Self {
        Self {
            scope: scope.clone(),
        }
    }

    /// The scope every region is allocated under.
    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }
}

impl SegmentAllocator for ScopedAllocator {
    fn allocate(&self, size: u64, align: u64) -> Result<Region, MemoryError> {
        self.scope.allocate(size, align)
    }
}

/// Allocates every request under a fresh scope of its own.
///
/// The region keeps its scope reachable, so the memory is released when
/// the last region (or slice) pointing into it is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MallocAllocator {
    kind: ScopeKind,
}

impl MallocAllocator {
    /// Fresh confined scope per allocation, owned by the calling thread.
    pub fn confined() -> Self {
        Self {
            kind: ScopeKind::Confined,
        }
    }

    /// Fresh shared scope per allocation.
    pub fn shared() -> Self {
        Self {
            kind: ScopeKind::Shared,
        }
    }

    /// Fresh implicit scope per allocation.
    pub fn implicit() -> Self {
        Self {
            kind: ScopeKind::Implicit,
        }
    }

    fn new_scope(self) -> ResourceScope {
        match self.kind {
            ScopeKind::Confined => ResourceScope::confined(),
            ScopeKind::Shared => ResourceScope::shared(),
            ScopeKind::Implicit | ScopeKind::Global => ResourceScope::implicit(),
        }
    }
}

impl SegmentAllocator for MallocAllocator {
    fn allocate(&self, size: u64, align: u64) -> Result<Region, MemoryError> {
        check_request(size, align)?;
        self.new_scope().allocate_native(size, align)
    }
}

/// Allocates under `scope`.
pub fn scoped(scope: &ResourceScope) -> ScopedAllocator {
    ScopedAllocator::new(scope)
}

/// Each allocation gets its own confined scope.
pub fn malloc_confined() -> MallocAllocator {
    MallocAllocator::confined()
}

/// Each allocation gets its own shared scope.
pub fn malloc_shared() -> MallocAllocator {
    MallocAllocator::shared()
}

/// Each allocation gets its own implicit scope.
pub fn implicit() -> MallocAllocator {
    MallocAllocator::implicit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocateExt;
    use offheap_core::{ErrorKind, MemoryLayout};

    #[test]
    fn scoped_allocations_die_with_the_scope() {
        let scope = ResourceScope::confined();
        let alloc = scoped(&scope);
        let a = alloc.allocate(8, 8).unwrap();
        let b = alloc.allocate(8, 8).unwrap();
        assert!(a.belongs_to(&scope) && b.belongs_to(&scope));
        assert_eq!(scope.block_count(), 2);
        scope.close().unwrap();
        assert_eq!(a.fill(0).unwrap_err().kind(), ErrorKind::Liveness);
    }

    #[test]
    fn malloc_gives_each_region_its_own_scope() {
        let alloc = malloc_shared();
        let a = alloc.allocate(8, 8).unwrap();
        let b = alloc.allocate(8, 8).unwrap();
        assert_ne!(a.scope_id(), b.scope_id());
    }

    #[test]
    fn malloc_confined_regions_stay_on_their_thread() {
        let region = malloc_confined().allocate(8, 8).unwrap();
        let err = std::thread::spawn(move || region.fill(1))
            .join()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ownership);
    }

    #[test]
    fn implicit_regions_are_usable_until_dropped() {
        let long = MemoryLayout::native_value(8).unwrap();
        let region = implicit().allocate_value(&long, 123i64).unwrap();
        let slice = region.slice(0, 8).unwrap();
        drop(region);
        assert_eq!(slice.get::<i64>(&long, 0).unwrap(), 123);
    }

    #[test]
    fn scoped_rejects_bad_alignment() {
        let scope = ResourceScope::shared();
        assert!(scoped(&scope).allocate(8, 5).is_err());
        assert!(implicit().allocate(8, 5).is_err());
    }
}
