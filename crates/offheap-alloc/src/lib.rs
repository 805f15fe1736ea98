//! Segment allocators over scoped native memory.
//!
//! Every allocator implements the single-method [`SegmentAllocator`]
//! contract; typed allocate-and-initialise helpers come from
//! [`AllocateExt`].
//!
//! ```text
//! SegmentAllocator
//! ├── ResourceScope / ScopedAllocator   one native block per request
//! ├── MallocAllocator                   one fresh scope per request
//! ├── Arena<S: ArenaSync>               bump allocation, bounded | unbounded
//! │   ├── ConfinedArena  (RefCell, owner-checked)
//! │   └── SharedArena    (Mutex, linearizable block replacement)
//! └── PrefixAllocator                   offset 0 of one region, every time
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod arena;
pub mod config;
pub mod prefix;
pub mod scoped;
pub mod stats;
pub mod sync;

pub use allocator::{AllocateExt, SegmentAllocator};
pub use arena::{arena_bounded, arena_unbounded, Arena, ArenaAllocator, ConfinedArena, SharedArena};
pub use config::ArenaConfig;
pub use prefix::{prefix, PrefixAllocator};
pub use scoped::{implicit, malloc_confined, malloc_shared, scoped, MallocAllocator, ScopedAllocator};
pub use stats::ArenaStats;
pub use sync::{ArenaSync, Confined, Shared};
