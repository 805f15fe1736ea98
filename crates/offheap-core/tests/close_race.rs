//! Region accesses racing `close()` on a shared scope.
//!
//! Each round starts a worker that hammers one large region while the main
//! thread closes the scope. Closing must either wait out an in-flight copy
//! (`ScopeAcquired`) or win, after which every access fails with
//! `AlreadyClosed`. Memory is never freed under a running copy.

use std::sync::{Arc, Barrier};
use std::thread;

use offheap_core::{ErrorKind, MemoryError, Region, ResourceScope};

const ROUNDS: usize = 50;
const REGION_BYTES: u64 = 4 << 20;
const PATTERN: u8 = 0xab;

/// Close `scope`, retrying while accesses hold it open.
fn close_when_idle(scope: &ResourceScope) {
    loop {
        match scope.close() {
            Ok(()) => return,
            Err(MemoryError::ScopeAcquired { .. }) => thread::yield_now(),
            Err(other) => panic!("unexpected close failure: {other}"),
        }
    }
}

/// Run `access` on a worker until it fails, closing the scope meanwhile.
/// Returns the number of accesses that completed.
fn race<F>(scope: &ResourceScope, region: &Region, mut access: F) -> usize
where
    F: FnMut(&Region) -> Result<(), MemoryError> + Send + 'static,
{
    let barrier = Arc::new(Barrier::new(2));
    let worker = {
        let region = region.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let mut completed = 0;
            loop {
                match access(&region) {
                    Ok(()) => completed += 1,
                    Err(err) => {
                        assert_eq!(err.kind(), ErrorKind::Liveness, "{err}");
                        return completed;
                    }
                }
            }
        })
    };
    barrier.wait();
    close_when_idle(scope);
    let completed = worker.join().unwrap();
    assert!(!scope.is_alive());
    assert_eq!(scope.memory_bytes(), 0);
    completed
}

#[test]
fn close_racing_reads_never_frees_memory_in_use() {
    for _ in 0..ROUNDS {
        let scope = ResourceScope::shared();
        let region = scope.allocate_native(REGION_BYTES, 16).unwrap();
        region.fill(PATTERN).unwrap();
        race(&scope, &region, |region| {
            let bytes = region.to_vec()?;
            assert!(bytes.iter().all(|&b| b == PATTERN));
            Ok(())
        });
    }
}

#[test]
fn close_racing_writes_never_frees_memory_in_use() {
    for round in 0..ROUNDS {
        let scope = ResourceScope::shared();
        let region = scope.allocate_native(REGION_BYTES, 16).unwrap();
        race(&scope, &region, move |region| region.fill(round as u8));
    }
}

#[test]
fn close_racing_cross_scope_copies_leaves_the_other_scope_intact() {
    for _ in 0..ROUNDS {
        let source_scope = ResourceScope::shared();
        let target_scope = ResourceScope::shared();
        let source = source_scope.allocate_native(REGION_BYTES, 16).unwrap();
        source.fill(PATTERN).unwrap();
        let target = target_scope.allocate_native(REGION_BYTES, 16).unwrap();

        let sink = target.clone();
        race(&source_scope, &source, move |source| sink.copy_from(source));

        assert!(target_scope.is_alive());
        assert!(target.to_vec().unwrap().iter().all(|&b| b == 0 || b == PATTERN));
        target_scope.close().unwrap();
    }
}

#[test]
fn pinned_scope_reports_acquire_count() {
    let scope = ResourceScope::shared();
    let region = scope.allocate_native(64, 8).unwrap();
    let guard = scope.acquire().unwrap();
    let err = scope.close().unwrap_err();
    assert_eq!(
        err,
        MemoryError::ScopeAcquired {
            scope: scope.id(),
            count: 1
        }
    );
    assert_eq!(region.to_vec().unwrap(), vec![0; 64]);
    drop(guard);
    scope.close().unwrap();
    assert_eq!(region.to_vec().unwrap_err().kind(), ErrorKind::Liveness);
}
