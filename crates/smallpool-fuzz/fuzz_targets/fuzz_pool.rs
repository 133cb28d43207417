#![no_main]
use libfuzzer_sys::fuzz_target;
use smallpool_core::{LibcSystem, PoolAllocator, PoolConfig, SharedPool};
use std::ptr::NonNull;
use std::sync::LazyLock;

// One pool for the whole campaign: arena regions are never released, so a
// pool per input would read as a leak.
static POOL: LazyLock<SharedPool> =
    LazyLock::new(|| SharedPool::new(PoolAllocator::new(LibcSystem, PoolConfig::quiet())));

// Interprets the input as allocate/deallocate/reallocate operations and
// checks that live blocks keep their contents.
fuzz_target!(|data: &[u8]| {
    POOL.with_pool(|pool| {
        let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

        for (i, chunk) in data.chunks_exact(4).enumerate() {
            let op = chunk[0] % 3;
            let size = (u16::from_le_bytes([chunk[1], chunk[2]]) as usize) % 9000;
            let fill = chunk[3];

            match op {
                0 => {
                    let ptr = pool.allocate(size).expect("allocate");
                    unsafe { ptr.as_ptr().write_bytes(fill, size) };
                    live.push((ptr, size, fill));
                }
                1 if !live.is_empty() => {
                    let (ptr, n, expected) = live.swap_remove(i % live.len());
                    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), n) };
                    assert!(bytes.iter().all(|&b| b == expected));
                    unsafe { pool.deallocate(ptr, n) };
                }
                2 if !live.is_empty() => {
                    let idx = i % live.len();
                    let (ptr, n, _) = live[idx];
                    let moved = unsafe { pool.reallocate(ptr, n, size) }.expect("reallocate");
                    unsafe { moved.as_ptr().write_bytes(fill, size) };
                    live[idx] = (moved, size, fill);
                }
                _ => {}
            }
        }

        for (ptr, n, _) in live {
            unsafe { pool.deallocate(ptr, n) };
        }
    });
});
