//! Integration test: shared arenas under concurrent allocation.
//!
//! Worker threads allocate random sizes from one shared arena and report
//! every region back over a channel. Regions must be pairwise disjoint,
//! aligned as requested, and writable without clobbering each other.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use offheap_alloc::{ArenaConfig, SegmentAllocator, SharedArena};
use offheap_core::{MemoryError, Region, ResourceScope};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const THREADS: u64 = 8;
const ALLOCS_PER_THREAD: usize = 500;

fn spans(regions: &[Region]) -> Vec<(u64, u64)> {
    let mut spans: Vec<(u64, u64)> = regions
        .iter()
        .filter(|r| r.byte_size() > 0)
        .map(|r| {
            let start = r.address().to_raw();
            (start, start + r.byte_size())
        })
        .collect();
    spans.sort_unstable();
    spans
}

#[test]
fn concurrent_unbounded_allocations_never_overlap() {
    let scope = ResourceScope::shared();
    let config = ArenaConfig::new().with_block_size(1024);
    let arena = Arc::new(SharedArena::unbounded_with_config(&scope, config).unwrap());
    let (tx, rx) = unbounded::<(u64, Region)>();

    let workers: Vec<_> = (0..THREADS)
        .map(|seed| {
            let arena = Arc::clone(&arena);
            let tx = tx.clone();
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                for _ in 0..ALLOCS_PER_THREAD {
                    // Mostly small requests, occasionally one past the block size.
                    let size = 1 + rng.next_u64() % 1500;
                    let align = 1u64 << (rng.next_u64() % 4);
                    let region = arena.allocate(size, align).unwrap();
                    assert_eq!(region.address().to_raw() % align, 0);
                    tx.send((seed, region)).unwrap();
                }
            })
        })
        .collect();
    drop(tx);
    for w in workers {
        w.join().unwrap();
    }

    let received: Vec<(u64, Region)> = rx.iter().collect();
    assert_eq!(received.len(), (THREADS as usize) * ALLOCS_PER_THREAD);

    let regions: Vec<Region> = received.iter().map(|(_, r)| r.clone()).collect();
    for pair in spans(&regions).windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "regions overlap: {:#x}..{:#x} and {:#x}..{:#x}",
            pair[0].0,
            pair[0].1,
            pair[1].0,
            pair[1].1
        );
    }

    // Tag each region with its worker id and verify nobody clobbered it.
    for (seed, region) in &received {
        region.fill(*seed as u8).unwrap();
    }
    for (seed, region) in &received {
        assert!(region.to_vec().unwrap().iter().all(|&b| b == *seed as u8));
    }

    let stats = arena.stats();
    assert_eq!(stats.failed_requests, 0);
    assert_eq!(
        stats.bytes_served,
        regions.iter().map(Region::byte_size).sum::<u64>()
    );
    assert!(stats.dedicated_blocks > 0);
}

#[test]
fn concurrent_bounded_allocations_respect_capacity() {
    const CAPACITY: u64 = 4096;
    let scope = ResourceScope::shared();
    let arena = Arc::new(SharedArena::bounded(CAPACITY, &scope).unwrap());
    let (tx, rx) = unbounded::<Result<Region, MemoryError>>();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let arena = Arc::clone(&arena);
            let tx = tx.clone();
            thread::spawn(move || {
                for _ in 0..64 {
                    tx.send(arena.allocate(16, 16)).unwrap();
                }
            })
        })
        .collect();
    drop(tx);
    for w in workers {
        w.join().unwrap();
    }

    let (ok, failed): (Vec<_>, Vec<_>) = rx.iter().partition(Result::is_ok);
    let regions: Vec<Region> = ok.into_iter().map(Result::unwrap).collect();
    assert_eq!(regions.len() as u64, CAPACITY / 16);
    assert_eq!(failed.len() as u64, THREADS * 64 - CAPACITY / 16);
    assert!(failed
        .iter()
        .all(|r| matches!(r, Err(MemoryError::OutOfMemory { .. }))));

    let spans = spans(&regions);
    for pair in spans.windows(2) {
        assert!(pair[0].1 <= pair[1].0);
    }
    assert_eq!(scope.block_count(), 1);
}

#[test]
fn closing_scope_invalidates_regions_from_every_thread() {
    let scope = ResourceScope::shared();
    let arena = Arc::new(SharedArena::unbounded(&scope).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let arena = Arc::clone(&arena);
            thread::spawn(move || arena.allocate(32, 8).unwrap())
        })
        .collect();
    let regions: Vec<Region> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    scope.close().unwrap();
    for region in regions {
        let err = thread::spawn(move || region.to_vec())
            .join()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, MemoryError::AlreadyClosed { .. }));
    }
}
