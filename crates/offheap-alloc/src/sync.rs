//! Synchronization strategies for arenas.
//!
//! An arena is one state machine ([`ArenaState`]) behind one of two cells:
//! [`Confined`] for single-writer use, [`Shared`] for concurrent use. The
//! strategy is the only thing that differs between the confined and shared
//! variants of every arena.

use std::cell::RefCell;
use std::sync::{Mutex, PoisonError};

use crate::arena::ArenaState;

mod private {
    pub trait Sealed {}
}

/// How an arena serializes access to its cursor. Sealed.
pub trait ArenaSync: private::Sealed {
    /// Wrap the initial state.
    fn new(state: ArenaState) -> Self;

    /// Run `f` with exclusive access to the state.
    fn with_state<R>(&self, f: impl FnOnce(&mut ArenaState) -> R) -> R;
}

/// Single-writer strategy: a plain read-modify-write of the cursor.
///
/// `RefCell` makes the arena `!Sync`, so it cannot be shared between
/// threads; moving it to another thread is caught by the scope's owner check.
pub struct Confined {
    state: RefCell<ArenaState>,
}

impl private::Sealed for Confined {}

impl ArenaSync for Confined {
    fn new(state: ArenaState) -> Self {
        Self {
            state: RefCell::new(state),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ArenaState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }
}

/// Concurrent strategy: cursor advance and block replacement run under one
/// lock, so callers never receive overlapping slices and exactly one thread
/// installs each replacement block.
pub struct Shared {
    state: Mutex<ArenaState>,
}

impl private::Sealed for Shared {}

impl ArenaSync for Shared {
    fn new(state: ArenaState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ArenaState) -> R) -> R {
        // The state is only mutated after every fallible step has
        // succeeded, so a poisoned lock still guards a consistent cursor.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}
