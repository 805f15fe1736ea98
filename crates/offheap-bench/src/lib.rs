//! Workload profiles for the offheap benchmarks.
//!
//! - [`request_mix`]: deterministic `(size, align)` allocation requests
//! - [`SMALL_MIX`] / [`LARGE_MIX`]: the size ranges the benches use

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Requests that always fit an arena's default block.
pub const SMALL_MIX: RequestRange = RequestRange {
    min_size: 1,
    max_size: 256,
    max_align_log2: 4,
};

/// Requests of which roughly half exceed the default block size.
pub const LARGE_MIX: RequestRange = RequestRange {
    min_size: 512,
    max_size: 8192,
    max_align_log2: 6,
};

/// Bounds for generated allocation requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestRange {
    /// Smallest size, inclusive.
    pub min_size: u64,
    /// Largest size, inclusive.
    pub max_size: u64,
    /// Largest alignment as a power of two exponent, inclusive.
    pub max_align_log2: u32,
}

/// Generate `count` deterministic `(size, align)` requests within `range`.
pub fn request_mix(count: usize, range: RequestRange, seed: u64) -> Vec<(u64, u64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let span = range.max_size - range.min_size + 1;
    (0..count)
        .map(|_| {
            let size = range.min_size + rng.next_u64() % span;
            let align = 1u64 << (rng.next_u32() % (range.max_align_log2 + 1));
            (size, align)
        })
        .collect()
}

/// Total bytes requested by `requests`, ignoring alignment padding.
pub fn total_bytes(requests: &[(u64, u64)]) -> u64 {
    requests.iter().map(|&(size, _)| size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_mix_is_deterministic() {
        assert_eq!(request_mix(100, SMALL_MIX, 42), request_mix(100, SMALL_MIX, 42));
        assert_ne!(request_mix(100, SMALL_MIX, 42), request_mix(100, SMALL_MIX, 43));
    }

    #[test]
    fn request_mix_respects_range() {
        for (size, align) in request_mix(1000, LARGE_MIX, 7) {
            assert!((LARGE_MIX.min_size..=LARGE_MIX.max_size).contains(&size));
            assert!(align.is_power_of_two());
            assert!(align <= 1 << LARGE_MIX.max_align_log2);
        }
    }

    #[test]
    fn total_bytes_sums_sizes() {
        assert_eq!(total_bytes(&[(3, 1), (5, 8)]), 8);
    }
}
