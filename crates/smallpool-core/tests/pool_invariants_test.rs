#![allow(unsafe_code)]

use serde_json::json;
use smallpool_core::size_class::{class_index, round_up};
use smallpool_core::{
    AllocError, LibcSystem, NUM_SIZE_CLASSES, PoolAllocator, PoolConfig, PoolLogLevel,
    SMALL_OBJECT_THRESHOLD, SystemAllocator,
};
use std::collections::HashMap;
use std::ptr::NonNull;

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn gen_range(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

/// libc backend that can be told to fail, and records what it handed out.
#[derive(Debug, Default)]
struct FlakySystem {
    inner: LibcSystem,
    fail: bool,
    allocations: Vec<(usize, usize)>,
    deallocations: Vec<(usize, usize)>,
}

impl SystemAllocator for FlakySystem {
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if self.fail {
            return None;
        }
        let ptr = self.inner.allocate(size)?;
        self.allocations.push((ptr.as_ptr() as usize, size));
        Some(ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize) {
        self.deallocations.push((ptr.as_ptr() as usize, size));
        unsafe { self.inner.deallocate(ptr, size) };
    }
}

fn traced_pool() -> PoolAllocator<FlakySystem> {
    PoolAllocator::new(
        FlakySystem::default(),
        PoolConfig::quiet().with_log_level(Some(PoolLogLevel::Trace)),
    )
}

fn assert_disjoint(spans: &mut [(usize, usize)]) {
    spans.sort_unstable();
    for pair in spans.windows(2) {
        let (a, a_len) = pair[0];
        let (b, _) = pair[1];
        assert!(
            a + a_len <= b,
            "block {:#x}+{} overlaps block {:#x}",
            a,
            a_len,
            b
        );
    }
}

#[test]
fn immediate_release_is_reused() {
    let mut pool = traced_pool();
    for n in [1usize, 8, 100, 129, 300, 700, 1500, 4096] {
        let p = pool.allocate(n).unwrap();
        unsafe { pool.deallocate(p, n) };
        let q = pool.allocate(n).unwrap();
        assert_eq!(p, q, "no LIFO reuse for size {}", n);
        unsafe { pool.deallocate(q, n) };
    }
}

#[test]
fn large_requests_pass_through_to_system() {
    let mut pool = traced_pool();
    let size = SMALL_OBJECT_THRESHOLD + 1;
    let ptr = pool.allocate(size).unwrap();
    unsafe { ptr.as_ptr().write_bytes(0x7F, size) };

    assert_eq!(
        pool.system().allocations,
        vec![(ptr.as_ptr() as usize, size)]
    );
    assert_eq!(pool.total_acquired(), 0);

    unsafe { pool.deallocate(ptr, size) };
    assert_eq!(
        pool.system().deallocations,
        vec![(ptr.as_ptr() as usize, size)]
    );
    assert!((0..NUM_SIZE_CLASSES).all(|c| pool.free_count(c) == 0));
}

#[test]
fn large_request_failure_is_reported() {
    let mut pool = traced_pool();
    pool.system_mut().fail = true;
    let err = pool.allocate(SMALL_OBJECT_THRESHOLD * 2).unwrap_err();
    assert_eq!(
        err,
        AllocError::OutOfMemory {
            requested: SMALL_OBJECT_THRESHOLD * 2
        }
    );
}

#[test]
fn arena_growth_never_aliases_live_blocks() {
    let mut pool = traced_pool();
    let size = 40;
    let slot = round_up(size);
    let mut live = Vec::new();

    while pool.system().allocations.len() < 3 {
        live.push(pool.allocate(size).unwrap());
        assert!(live.len() < 1_000_000, "arena never grew");
    }
    // A few more after the third region so it is in use too.
    for _ in 0..25 {
        live.push(pool.allocate(size).unwrap());
    }

    let regions = pool.system().allocations.clone();
    assert!(regions.len() >= 3);
    // Later regions are biased by history and must not shrink.
    assert!(regions.windows(2).all(|w| w[1].1 >= w[0].1));

    let mut spans: Vec<(usize, usize)> = live
        .iter()
        .map(|p| (p.as_ptr() as usize, slot))
        .collect();
    assert_disjoint(&mut spans);

    for &(addr, _) in &spans {
        assert!(
            regions
                .iter()
                .any(|&(base, len)| addr >= base && addr + slot <= base + len),
            "block {:#x} lies outside every arena region",
            addr
        );
    }

    let logs = pool.drain_lifecycle_logs();
    assert!(logs.iter().filter(|r| r.event == "arena_grow").count() >= 3);
}

#[test]
fn mixed_sizes_never_alias() {
    let mut pool = traced_pool();
    let mut rng = XorShift64::new(0xC0FF_EE00_1234_5678);
    let mut spans = Vec::new();
    for _ in 0..3_000 {
        let n = rng.gen_range(1, SMALL_OBJECT_THRESHOLD);
        let ptr = pool.allocate(n).unwrap();
        spans.push((ptr.as_ptr() as usize, round_up(n)));
    }
    assert_disjoint(&mut spans);
}

#[test]
fn scavenges_larger_class_when_system_fails() {
    let mut pool = traced_pool();
    let big = SMALL_OBJECT_THRESHOLD;
    let big_class = class_index(big);

    // First refill: one region, ten 4096-byte slots, nine left on the list.
    let mut held = vec![pool.allocate(big).unwrap()];
    for _ in 0..9 {
        held.push(pool.allocate(big).unwrap());
    }
    assert_eq!(pool.free_count(big_class), 0);
    // Second refill drains the rest of the region exactly.
    held.push(pool.allocate(big).unwrap());
    assert_eq!(pool.pool_available(), 0);
    assert_eq!(pool.free_count(big_class), 9);
    let acquired = pool.total_acquired();

    pool.system_mut().fail = true;
    let small = pool.allocate(8).expect("scavenged node should back the arena");
    unsafe { small.as_ptr().write_bytes(0x11, 8) };

    assert_eq!(pool.free_count(big_class), 8);
    assert_eq!(pool.total_acquired(), acquired);
    assert_eq!(pool.pool_available(), big - 8 * 10);
    assert_eq!(pool.free_count(class_index(8)), 9);

    let logs = pool.drain_lifecycle_logs();
    assert!(logs.iter().any(|r| r.event == "system_alloc_failed"));
    assert!(
        logs.iter()
            .any(|r| r.event == "scavenge" && r.class == Some(big_class))
    );
    assert!(!logs.iter().any(|r| r.event == "out_of_memory"));
}

#[test]
fn exhaustion_without_spare_nodes_is_out_of_memory() {
    let mut pool = traced_pool();
    pool.system_mut().fail = true;
    let err = pool.allocate(64).unwrap_err();
    assert!(matches!(err, AllocError::OutOfMemory { .. }));
    assert_eq!(pool.pool_available(), 0);

    let logs = pool.drain_lifecycle_logs();
    assert!(
        logs.iter()
            .any(|r| r.level == PoolLogLevel::Error && r.event == "out_of_memory")
    );

    // The failure is not sticky once the system recovers.
    pool.system_mut().fail = false;
    assert!(pool.allocate(64).is_ok());
}

#[test]
fn reallocate_does_not_preserve_contents() {
    let mut pool = traced_pool();

    // Park a zeroed 64-byte block at the head of its list.
    let parked = pool.allocate(64).unwrap();
    unsafe {
        parked.as_ptr().write_bytes(0, 64);
        pool.deallocate(parked, 64);
    }

    let p = pool.allocate(16).unwrap();
    unsafe { p.as_ptr().write_bytes(0xAB, 16) };
    let q = unsafe { pool.reallocate(p, 16, 64) }.unwrap();

    assert_eq!(q, parked);
    assert_ne!(q, p);
    // Bytes past the free-list link are the parked zeros, not the 0xAB data.
    let tail = unsafe { std::slice::from_raw_parts(q.as_ptr().add(8), 56) };
    assert!(tail.iter().all(|&b| b == 0));
    unsafe { q.as_ptr().write_bytes(0xCD, 64) };
}

#[test]
fn reallocate_across_threshold() {
    let mut pool = traced_pool();
    let p = pool.allocate(100).unwrap();
    let big = unsafe { pool.reallocate(p, 100, 10_000) }.unwrap();
    assert_eq!(pool.system().allocations.last(), Some(&(big.as_ptr() as usize, 10_000)));
    let back = unsafe { pool.reallocate(big, 10_000, 100) }.unwrap();
    assert_eq!(back, p);
    assert_eq!(
        pool.system().deallocations,
        vec![(big.as_ptr() as usize, 10_000)]
    );
}

#[test]
fn deterministic_sequences_hold_invariants() {
    const SEEDS: [u64; 4] = [1, 2, 3, 4];
    const STEPS: usize = 4_000;

    let mut summaries = Vec::new();
    for seed in SEEDS {
        let mut pool = PoolAllocator::new(FlakySystem::default(), PoolConfig::quiet());
        let mut rng = XorShift64::new(seed);
        // addr -> (requested size, fill byte)
        let mut live: HashMap<usize, (usize, u8)> = HashMap::new();
        let mut last_acquired = 0;

        for step in 0..STEPS {
            let op = rng.gen_range(0, 9);
            if op < 5 || live.is_empty() {
                let n = if rng.gen_range(0, 19) == 0 {
                    rng.gen_range(SMALL_OBJECT_THRESHOLD + 1, 3 * SMALL_OBJECT_THRESHOLD)
                } else {
                    rng.gen_range(1, SMALL_OBJECT_THRESHOLD)
                };
                let ptr = pool.allocate(n).unwrap();
                let fill = (step % 251) as u8;
                unsafe { ptr.as_ptr().write_bytes(fill, n) };
                assert!(
                    live.insert(ptr.as_ptr() as usize, (n, fill)).is_none(),
                    "seed {} step {}: live block handed out again",
                    seed,
                    step
                );
            } else {
                let keys: Vec<usize> = live.keys().copied().collect();
                let addr = keys[rng.gen_range(0, keys.len() - 1)];
                let (n, fill) = live.remove(&addr).unwrap();
                let ptr = NonNull::new(addr as *mut u8).unwrap();
                let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), n) };
                assert!(
                    bytes.iter().all(|&b| b == fill),
                    "seed {} step {}: block {:#x} was overwritten while live",
                    seed,
                    step,
                    addr
                );
                if op < 8 {
                    unsafe { pool.deallocate(ptr, n) };
                } else {
                    let new_n = rng.gen_range(1, 2 * SMALL_OBJECT_THRESHOLD);
                    let moved = unsafe { pool.reallocate(ptr, n, new_n) }.unwrap();
                    unsafe { moved.as_ptr().write_bytes(fill, new_n) };
                    assert!(live.insert(moved.as_ptr() as usize, (new_n, fill)).is_none());
                }
            }

            assert!(pool.total_acquired() >= last_acquired);
            last_acquired = pool.total_acquired();
        }

        summaries.push(json!({
            "seed": seed,
            "steps": STEPS,
            "live": live.len(),
            "total_acquired": pool.total_acquired(),
            "regions": pool.system().allocations.len(),
        }));
    }

    let report = serde_json::to_string(&summaries).unwrap();
    assert!(report.contains("\"total_acquired\""));
    assert_eq!(summaries.len(), SEEDS.len());
}
