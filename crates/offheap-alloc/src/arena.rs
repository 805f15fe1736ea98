//! Bump-pointer arenas over scope-owned blocks.
//!
//! One state machine covers both capacity policies:
//!
//! - **Bounded**: a single block of fixed capacity, obtained on first use.
//!   A request that does not fit the remaining space fails with
//!   `OutOfMemory`; the arena never grows.
//! - **Unbounded**: a current block of `block_size` bytes, obtained on first
//!   use. A request that fits the remaining space is bumped from it. A
//!   request larger than `block_size` gets a dedicated block of exactly its
//!   size and leaves the current block untouched. Anything else retires the
//!   current block, installs a fresh one and retries once.
//!
//! Alignment is applied to the absolute address of the cursor before
//! measuring remaining space. Blocks are never freed by the arena; retired
//! blocks stay owned by the scope until it closes.
//!
//! The thread-access axis is the [`ArenaSync`] parameter: see
//! [`ConfinedArena`] and [`SharedArena`].

use offheap_core::{MemoryError, Region, ResourceScope, ScopeKind};

use crate::allocator::{check_request, SegmentAllocator};
use crate::config::ArenaConfig;
use crate::stats::ArenaStats;
use crate::sync::{ArenaSync, Confined, Shared};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Capacity {
    Bounded(u64),
    Unbounded { block_size: u64 },
}

/// Cursor state shared by every arena variant.
///
/// Only reachable through an [`ArenaSync`] strategy.
pub struct ArenaState {
    capacity: Capacity,
    block_alignment: u64,
    /// Block currently bumped from; `None` until first use.
    block: Option<Region>,
    /// Next free offset within `block`.
    offset: u64,
    stats: ArenaStats,
}

impl ArenaState {
    fn new(capacity: Capacity, config: &ArenaConfig) -> Self {
        Self {
            capacity,
            block_alignment: config.block_alignment,
            block: None,
            offset: 0,
            stats: ArenaStats::default(),
        }
    }

    fn allocate(&mut self, scope: &ResourceScope, size: u64, align: u64) -> Result<Region, MemoryError> {
        let result = match self.capacity {
            Capacity::Bounded(capacity) => self.allocate_bounded(scope, capacity, size, align),
            Capacity::Unbounded { block_size } => {
                self.allocate_unbounded(scope, block_size, size, align)
            }
        };
        if result.is_err() {
            self.stats.record_failure();
        }
        result
    }

    fn allocate_bounded(
        &mut self,
        scope: &ResourceScope,
        capacity: u64,
        size: u64,
        align: u64,
    ) -> Result<Region, MemoryError> {
        let block = match &self.block {
            Some(block) => block.clone(),
            None => {
                let block = scope.allocate_native(capacity, self.block_alignment)?;
                self.stats.record_block(capacity);
                self.block = Some(block.clone());
                block
            }
        };
        match fit(&block, self.offset, size, align) {
            Some(start) => self.bump(&block, start, size),
            None => Err(MemoryError::OutOfMemory {
                requested: size,
                available: capacity - self.offset,
            }),
        }
    }

    fn allocate_unbounded(
        &mut self,
        scope: &ResourceScope,
        block_size: u64,
        size: u64,
        align: u64,
    ) -> Result<Region, MemoryError> {
        if let Some(block) = self.block.clone() {
            if let Some(start) = fit(&block, self.offset, size, align) {
                return self.bump(&block, start, size);
            }
        }

        let block_align = self.block_alignment.max(align);
        if size > block_size {
            let dedicated = scope.allocate_native(size, block_align)?;
            self.stats.record_dedicated(size);
            return Ok(dedicated);
        }

        let block = scope.allocate_native(block_size, block_align)?;
        self.stats.record_block(block_size);
        self.block = Some(block.clone());
        self.offset = 0;
        match fit(&block, 0, size, align) {
            Some(start) => self.bump(&block, start, size),
            None => Err(MemoryError::OutOfMemory {
                requested: size,
                available: block_size,
            }),
        }
    }

    fn bump(&mut self, block: &Region, start: u64, size: u64) -> Result<Region, MemoryError> {
        let region = block.slice(start, size)?;
        self.offset = start + size;
        self.stats.record_served(size);
        Ok(region)
    }

    fn remaining(&self) -> u64 {
        self.block
            .as_ref()
            .map_or(0, |block| block.byte_size() - self.offset)
    }
}

/// Offset at which `size` bytes aligned to `align` fit in `block` after
/// `offset`, if they do.
fn fit(block: &Region, offset: u64, size: u64, align: u64) -> Option<u64> {
    let base = block.address().to_raw();
    let cursor = base.checked_add(offset)?;
    let aligned = cursor.checked_add(align - 1)? & !(align - 1);
    let start = aligned - base;
    let end = start.checked_add(size)?;
    (end <= block.byte_size()).then_some(start)
}

/// A bump-pointer arena parameterized over its synchronization strategy.
pub struct Arena<S: ArenaSync> {
    scope: ResourceScope,
    sync: S,
}

/// Arena for single-writer use. Calls from a thread that does not own the
/// scope fail with `WrongThread`.
pub type ConfinedArena = Arena<Confined>;

/// Arena safe for concurrent `allocate` calls.
pub type SharedArena = Arena<Shared>;

impl<S: ArenaSync> Arena<S> {
    /// A bounded arena of `capacity` bytes under `scope`.
    pub fn bounded(capacity: u64, scope: &ResourceScope) -> Result<Self, MemoryError> {
        Self::bounded_with_config(capacity, scope, ArenaConfig::default())
    }

    /// A bounded arena with a custom config. Only `block_alignment` applies.
    pub fn bounded_with_config(
        capacity: u64,
        scope: &ResourceScope,
        config: ArenaConfig,
    ) -> Result<Self, MemoryError> {
        Self::build(Capacity::Bounded(capacity), scope, config)
    }

    /// An unbounded arena with the default block size under `scope`.
    pub fn unbounded(scope: &ResourceScope) -> Result<Self, MemoryError> {
        Self::unbounded_with_config(scope, ArenaConfig::default())
    }

    /// An unbounded arena with a custom config.
    pub fn unbounded_with_config(scope: &ResourceScope, config: ArenaConfig) -> Result<Self, MemoryError> {
        let capacity = Capacity::Unbounded {
            block_size: config.block_size,
        };
        Self::build(capacity, scope, config)
    }

    fn build(capacity: Capacity, scope: &ResourceScope, config: ArenaConfig) -> Result<Self, MemoryError> {
        config.validate()?;
        scope.check_valid_state()?;
        Ok(Self {
            scope: scope.clone(),
            sync: S::new(ArenaState::new(capacity, &config)),
        })
    }

    /// The scope every block is allocated under.
    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    /// Snapshot of the allocation counters.
    pub fn stats(&self) -> ArenaStats {
        self.sync.with_state(|state| state.stats)
    }

    /// Bytes left after the cursor in the current block (0 before first use).
    pub fn remaining(&self) -> u64 {
        self.sync.with_state(|state| state.remaining())
    }

    /// Whether this arena never grows.
    pub fn is_bounded(&self) -> bool {
        self.sync
            .with_state(|state| matches!(state.capacity, Capacity::Bounded(_)))
    }
}

impl<S: ArenaSync> SegmentAllocator for Arena<S> {
    fn allocate(&self, size: u64, align: u64) -> Result<Region, MemoryError> {
        check_request(size, align)?;
        self.scope.check_valid_state()?;
        self.sync
            .with_state(|state| state.allocate(&self.scope, size, align))
    }
}

/// An arena whose variant is picked from the scope: confined scopes get a
/// [`ConfinedArena`], every other scope a [`SharedArena`].
pub enum ArenaAllocator {
    /// Single-writer arena over a confined scope.
    Confined(ConfinedArena),
    /// Concurrent arena over a shared, implicit or global scope.
    Shared(SharedArena),
}

impl ArenaAllocator {
    /// A bounded arena of `capacity` bytes.
    pub fn bounded(capacity: u64, scope: &ResourceScope) -> Result<Self, MemoryError> {
        if scope.kind() == ScopeKind::Confined {
            Ok(Self::Confined(Arena::bounded(capacity, scope)?))
        } else {
            Ok(Self::Shared(Arena::bounded(capacity, scope)?))
        }
    }

    /// An unbounded arena with the default block size.
    pub fn unbounded(scope: &ResourceScope) -> Result<Self, MemoryError> {
        Self::unbounded_with_config(scope, ArenaConfig::default())
    }

    /// An unbounded arena with a custom config.
    pub fn unbounded_with_config(scope: &ResourceScope, config: ArenaConfig) -> Result<Self, MemoryError> {
        if scope.kind() == ScopeKind::Confined {
            Ok(Self::Confined(Arena::unbounded_with_config(scope, config)?))
        } else {
            Ok(Self::Shared(Arena::unbounded_with_config(scope, config)?))
        }
    }

    /// Snapshot of the allocation counters.
    pub fn stats(&self) -> ArenaStats {
        match self {
            Self::Confined(arena) => arena.stats(),
            Self::Shared(arena) => arena.stats(),
        }
    }
}

impl SegmentAllocator for ArenaAllocator {
    fn allocate(&self, size: u64, align: u64) -> Result<Region, MemoryError> {
        match self {
            Self::Confined(arena) => arena.allocate(size, align),
            Self::Shared(arena) => arena.allocate(size, align),
        }
    }
}

/// A bounded arena of `capacity` bytes, variant chosen by the scope kind.
pub fn arena_bounded(capacity: u64, scope: &ResourceScope) -> Result<ArenaAllocator, MemoryError> {
    ArenaAllocator::bounded(capacity, scope)
}

/// An unbounded arena, variant chosen by the scope kind.
pub fn arena_unbounded(scope: &ResourceScope) -> Result<ArenaAllocator, MemoryError> {
    ArenaAllocator::unbounded(scope)
}
