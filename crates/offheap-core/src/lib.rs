//! Scopes, regions and layouts for off-heap native memory.
//!
//! This is the leaf crate of the workspace. It owns the raw allocation
//! primitive and the lifetime model every allocator and variadic list is
//! built on:
//!
//! ```text
//! ResourceScope (confined | shared | implicit | global)
//! ├── native blocks (RawBlock, freed on close)
//! ├── close actions (run newest-first, exactly once)
//! └── Region → ScopeRef (liveness + ownership checks on every access)
//! ```
//!
//! The raw allocation and region access `unsafe` code lives here, confined
//! to `raw.rs` and `region.rs`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod error;
pub mod id;
pub mod layout;
mod raw;
pub mod region;
pub mod scope;
pub mod value;

pub use error::{ErrorKind, MemoryError};
pub use id::ScopeId;
pub use layout::{ByteOrder, LayoutShape, MemoryLayout};
pub use region::Region;
pub use scope::{ResourceScope, ScopeGuard, ScopeKind, ScopeRef};
pub use value::{AddressWidth, Carrier, MemoryAddress, Primitive};
