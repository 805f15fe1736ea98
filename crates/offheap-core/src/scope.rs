//! Resource scopes: lifetime and thread-confinement domains.
//!
//! A [`ResourceScope`] owns native blocks and cleanup actions. Regions carry
//! a [`ScopeRef`] back to their scope and check it on every access, so once
//! the scope is closed every region allocated under it fails with
//! [`MemoryError::AlreadyClosed`].
//!
//! # Scope kinds
//!
//! | kind | owner | `close()` | reclaimed |
//! |---|---|---|---|
//! | confined | creating thread | owner only | on close, or when last handle drops |
//! | shared | none | any thread | on close, or when last handle drops |
//! | implicit | none | rejected | when last handle drops |
//! | global | none | rejected | never |
//!
//! # State word
//!
//! Liveness and acquisition share one atomic word: a value `>= 0` means
//! alive with that many outstanding [`ScopeGuard`]s, [`CLOSED`] means closed.
//! `close()` succeeds only by swapping `0 -> CLOSED`, which makes close and
//! acquire linearizable without a lock.
//!
//! Every region read or write pins the scope through the same counter for
//! the duration of the copy, so a `close()` racing an access on another
//! thread fails with [`MemoryError::ScopeAcquired`] instead of freeing
//! memory that is being copied.
//!
//! Closing is not synchronised against allocations racing on other threads;
//! callers must not allocate from a shared scope while closing it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

use smallvec::SmallVec;

use crate::error::MemoryError;
use crate::id::ScopeId;
use crate::raw::RawBlock;
use crate::region::Region;

const CLOSED: isize = -1;

type CloseAction = Box<dyn FnOnce() + Send + 'static>;

/// How a scope is accessed and reclaimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Single owner thread, explicit close.
    Confined,
    /// Any thread, explicit close.
    Shared,
    /// Any thread, reclaimed when unreachable.
    Implicit,
    /// Any thread, never reclaimed.
    Global,
}

#[derive(Default)]
struct Resources {
    /// Native blocks keyed by base address.
    blocks: BTreeMap<usize, RawBlock>,
    /// Close actions in registration order.
    actions: SmallVec<[CloseAction; 2]>,
}

impl Resources {
    /// Run close actions newest-first, then free every block.
    fn release(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
        self.blocks.clear();
    }

    /// Whether `[addr, addr + len)` lies inside one block.
    fn owns(&self, addr: usize, len: u64) -> bool {
        self.blocks
            .range(..=addr)
            .next_back()
            .is_some_and(|(_, block)| block.contains(addr, len))
    }
}

struct ScopeState {
    id: ScopeId,
    kind: ScopeKind,
    owner: Option<ThreadId>,
    state: AtomicIsize,
    resources: Mutex<Resources>,
}

impl ScopeState {
    fn new(kind: ScopeKind) -> Self {
        let owner = match kind {
            ScopeKind::Confined => Some(thread::current().id()),
            _ => None,
        };
        Self {
            id: ScopeId::next(),
            kind,
            owner,
            state: AtomicIsize::new(0),
            resources: Mutex::new(Resources::default()),
        }
    }

    fn is_alive(&self) -> bool {
        self.state.load(Ordering::Acquire) != CLOSED
    }

    fn check_owner(&self) -> Result<(), MemoryError> {
        match self.owner {
            Some(owner) if owner != thread::current().id() => {
                Err(MemoryError::WrongThread { scope: self.id })
            }
            _ => Ok(()),
        }
    }

    fn check_valid_state(&self) -> Result<(), MemoryError> {
        self.check_owner()?;
        if !self.is_alive() {
            return Err(MemoryError::AlreadyClosed { scope: self.id });
        }
        Ok(())
    }

    /// Bump the acquire count unless the scope is closed.
    fn try_acquire(&self) -> Result<(), MemoryError> {
        self.check_owner()?;
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current == CLOSED {
                return Err(MemoryError::AlreadyClosed { scope: self.id });
            }
            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    /// Resource bookkeeping never leaves the lists half-updated, so a
    /// poisoned lock is still consistent.
    fn resources(&self) -> MutexGuard<'_, Resources> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        // Closed scopes released everything already; this covers scopes
        // that were never closed explicitly.
        let resources = self
            .resources
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        resources.release();
    }
}

/// A lifetime and thread-confinement domain for native memory.
///
/// Cloning a scope yields another handle to the same domain. Closing any
/// handle closes the domain for all of them.
#[derive(Clone)]
pub struct ResourceScope {
    state: Arc<ScopeState>,
}

impl ResourceScope {
    /// A scope owned by the calling thread.
    pub fn confined() -> Self {
        Self::with_kind(ScopeKind::Confined)
    }

    /// A scope usable and closable from any thread.
    pub fn shared() -> Self {
        Self::with_kind(ScopeKind::Shared)
    }

    /// A scope with no explicit close point, reclaimed once the last handle
    /// and the last region allocated under it are dropped.
    pub fn implicit() -> Self {
        Self::with_kind(ScopeKind::Implicit)
    }

    /// The process-wide scope that never closes.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<ResourceScope> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Self::with_kind(ScopeKind::Global))
            .clone()
    }

    fn with_kind(kind: ScopeKind) -> Self {
        Self {
            state: Arc::new(ScopeState::new(kind)),
        }
    }

    /// Unique id of this scope.
    pub fn id(&self) -> ScopeId {
        self.state.id
    }

    /// The scope kind.
    pub fn kind(&self) -> ScopeKind {
        self.state.kind
    }

    /// The owner thread of a confined scope, `None` otherwise.
    pub fn owner(&self) -> Option<ThreadId> {
        self.state.owner
    }

    /// Whether the scope has not been closed.
    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Whether the scope is reclaimed implicitly rather than closed.
    pub fn is_implicit(&self) -> bool {
        self.state.kind == ScopeKind::Implicit
    }

    /// Fail unless the scope is alive and, if confined, called from its owner.
    ///
    /// Ownership is checked before liveness.
    pub fn check_valid_state(&self) -> Result<(), MemoryError> {
        self.state.check_valid_state()
    }

    /// Close the scope, running close actions newest-first and freeing
    /// every block allocated under it.
    ///
    /// Fails with `WrongThread` from a non-owner thread, `ScopeNotClosable`
    /// for implicit and global scopes, `ScopeAcquired` while guards are live
    /// and `AlreadyClosed` on the second call.
    pub fn close(&self) -> Result<(), MemoryError> {
        let state = &self.state;
        state.check_owner()?;
        if matches!(state.kind, ScopeKind::Implicit | ScopeKind::Global) {
            return Err(MemoryError::ScopeNotClosable { scope: state.id });
        }
        match state
            .state
            .compare_exchange(0, CLOSED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(CLOSED) => return Err(MemoryError::AlreadyClosed { scope: state.id }),
            Err(count) => {
                return Err(MemoryError::ScopeAcquired {
                    scope: state.id,
                    count: count as usize,
                })
            }
        }
        let mut released = std::mem::take(&mut *state.resources());
        released.release();
        Ok(())
    }

    /// Register an action to run exactly once when the scope is closed or
    /// reclaimed. Actions run in reverse registration order.
    pub fn add_close_action<F>(&self, action: F) -> Result<(), MemoryError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.check_valid_state()?;
        self.state.resources().actions.push(Box::new(action));
        Ok(())
    }

    /// Keep the scope open until the returned guard is dropped.
    pub fn acquire(&self) -> Result<ScopeGuard, MemoryError> {
        ScopeGuard::new(&self.state)
    }

    /// Allocate `size` zeroed bytes of native memory owned by this scope.
    ///
    /// This is the raw allocation primitive every allocator bottoms out in.
    /// `align` must be a non-zero power of two.
    pub fn allocate_native(&self, size: u64, align: u64) -> Result<Region, MemoryError> {
        self.check_valid_state()?;
        let block = RawBlock::allocate(size, align)?;
        let addr = block.addr();
        self.state.resources().blocks.insert(addr, block);
        Ok(Region::from_raw(addr, size, self.scope_ref()))
    }

    /// A region over `[addr, addr + len)` if that range lies inside a block
    /// owned by this scope.
    pub fn resolve(&self, addr: u64, len: u64) -> Result<Option<Region>, MemoryError> {
        self.check_valid_state()?;
        let Ok(addr) = usize::try_from(addr) else {
            return Ok(None);
        };
        let owned = self.state.resources().owns(addr, len);
        Ok(owned.then(|| Region::from_raw(addr, len, self.scope_ref())))
    }

    /// Native bytes currently owned by this scope.
    pub fn memory_bytes(&self) -> u64 {
        self.state.resources().blocks.values().map(RawBlock::size).sum()
    }

    /// Number of native blocks currently owned by this scope.
    pub fn block_count(&self) -> usize {
        self.state.resources().blocks.len()
    }

    pub(crate) fn scope_ref(&self) -> ScopeRef {
        ScopeRef {
            state: Arc::clone(&self.state),
        }
    }
}

impl fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceScope")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl PartialEq for ResourceScope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for ResourceScope {}

/// A region's link back to its scope.
///
/// Answers liveness and ownership queries and pins the scope open for an
/// access; it cannot close the scope or register actions on it.
///
/// The link is strong. A scope that is never closed stays reachable, and
/// keeps its blocks, until its last handle and its last region are
/// dropped. Implicit scopes and the per-allocation scopes of the malloc
/// allocators rely on this. Explicit scopes are still released
/// deterministically by `close()`, after which every region fails with
/// `AlreadyClosed` whatever links remain.
#[derive(Clone)]
pub struct ScopeRef {
    state: Arc<ScopeState>,
}

impl ScopeRef {
    /// Id of the referenced scope.
    pub fn id(&self) -> ScopeId {
        self.state.id
    }

    /// Whether the referenced scope is alive.
    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Same check as [`ResourceScope::check_valid_state`].
    pub fn check_valid_state(&self) -> Result<(), MemoryError> {
        self.state.check_valid_state()
    }

    /// Keep the scope open until the returned guard is dropped.
    ///
    /// Same checks and counter as [`ResourceScope::acquire`].
    pub fn acquire(&self) -> Result<ScopeGuard, MemoryError> {
        ScopeGuard::new(&self.state)
    }

    /// Whether this references the same scope as `scope`.
    pub fn is(&self, scope: &ResourceScope) -> bool {
        Arc::ptr_eq(&self.state, &scope.state)
    }
}

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeRef({})", self.state.id)
    }
}

/// Keeps a scope open while alive. Returned by [`ResourceScope::acquire`].
#[must_use]
pub struct ScopeGuard {
    state: Arc<ScopeState>,
}

impl ScopeGuard {
    fn new(state: &Arc<ScopeState>) -> Result<Self, MemoryError> {
        state.try_acquire()?;
        Ok(Self {
            state: Arc::clone(state),
        })
    }

    /// Id of the acquired scope.
    pub fn scope_id(&self) -> ScopeId {
        self.state.id
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.state.state.fetch_sub(1, Ordering::AcqRel);
    }
}
