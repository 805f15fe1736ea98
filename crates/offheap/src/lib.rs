//! Offheap: scoped native memory, segment allocators and variadic argument
//! lists for native interop.
//!
//! This is the facade crate re-exporting the public API of the offheap
//! sub-crates. Depending on `offheap` alone is enough for most users.
//!
//! # Quick start
//!
//! ```rust
//! use offheap::prelude::*;
//! use offheap::valist::win64::{C_INT, C_LONG_LONG, C_POINTER};
//!
//! let scope = ResourceScope::confined();
//!
//! // Bump-allocate a few values from an arena owned by the scope.
//! let arena = arena_unbounded(&scope).unwrap();
//! let answer = arena.allocate_value(&C_INT, 42i32).unwrap();
//! assert_eq!(answer.get::<i32>(&C_INT, 0).unwrap(), 42);
//!
//! // Marshal a Win64 variadic argument list and walk it back.
//! let mut list = VaList::<Win64>::make(&scope, |b| {
//!     b.varg_from_int(&C_INT, 7)?
//!         .varg_from_long(&C_LONG_LONG, 99)?
//!         .varg_from_address(&C_POINTER, answer.address())?;
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(list.varg_as_int(&C_INT).unwrap(), 7);
//! assert_eq!(list.varg_as_long(&C_LONG_LONG).unwrap(), 99);
//! assert_eq!(list.varg_as_address(&C_POINTER).unwrap(), answer.address());
//!
//! // Closing the scope frees everything and invalidates every view.
//! scope.close().unwrap();
//! assert!(answer.get::<i32>(&C_INT, 0).is_err());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`memory`] | `offheap-core` | Scopes, regions, layouts, carriers, errors |
//! | [`allocators`] | `offheap-alloc` | `SegmentAllocator`, arenas, prefix and scoped allocators |
//! | [`valist`] | `offheap-valist` | ABI policies, variadic list builder and cursor |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Scopes, regions, layouts and the error taxonomy (`offheap-core`).
///
/// [`memory::ResourceScope`] owns native memory; [`memory::Region`] is a
/// checked view into it.
pub use offheap_core as memory;

/// Segment allocators (`offheap-alloc`).
///
/// The [`allocators::SegmentAllocator`] trait plus its implementations:
/// [`allocators::Arena`], [`allocators::PrefixAllocator`], [`allocators::ScopedAllocator`]
/// and [`allocators::MallocAllocator`].
pub use offheap_alloc as allocators;

/// Variadic argument lists (`offheap-valist`).
///
/// [`valist::VaListBuilder`] writes a list, [`valist::VaList`] reads one,
/// both for a [`valist::VaAbi`] policy such as [`valist::Win64`].
pub use offheap_valist as valist;

/// Common imports for typical offheap usage.
///
/// ```rust
/// use offheap::prelude::*;
/// ```
pub mod prelude {
    // Scopes and memory
    pub use offheap_core::{
        ByteOrder, Carrier, MemoryAddress, MemoryLayout, Region, ResourceScope, ScopeGuard, ScopeKind,
    };

    // Errors
    pub use offheap_core::{ErrorKind, MemoryError};

    // Allocators
    pub use offheap_alloc::{
        arena_bounded, arena_unbounded, implicit, malloc_confined, malloc_shared, prefix, scoped, AllocateExt,
        ArenaAllocator, ArenaConfig, SegmentAllocator,
    };

    // Variadic lists
    pub use offheap_valist::{VaAbi, VaList, VaListBuilder, Win64};
}
