//! Growing memory pool that slots are carved from.
//!
//! The arena owns one contiguous span `[cursor, limit)` of not-yet-carved
//! bytes. When a request no longer fits, the leftover span is salvaged onto
//! a free list and the arena is replenished: first by a fresh region from
//! the system allocator, then, if that fails, by repurposing a free node
//! from a class at least as large as the request. Only when both fail does
//! the request end in [`AllocError::OutOfMemory`].
//!
//! Regions are never returned to the system allocator.

#![allow(unsafe_code)]

use std::ptr::{self, NonNull};

use crate::config::{GROWTH_HISTORY_SHIFT, NUM_SIZE_CLASSES, REFILL_BATCH, SMALL_OBJECT_THRESHOLD};
use crate::error::{AllocError, Result};
use crate::free_list::FreeListBank;
use crate::log::{LifecycleLog, PoolLogLevel};
use crate::size_class;
use crate::system::SystemAllocator;

/// A run of `count` contiguous slots starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: NonNull<u8>,
    pub count: usize,
}

/// Carving state of the pool.
#[derive(Debug)]
pub struct Arena {
    /// First uncarved byte.
    cursor: *mut u8,
    /// One past the last uncarved byte.
    limit: *mut u8,
    /// Bytes obtained from the system allocator over the arena's lifetime.
    total_acquired: usize,
}

impl Arena {
    /// Creates an arena with an empty span.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cursor: ptr::null_mut(),
            limit: ptr::null_mut(),
            total_acquired: 0,
        }
    }

    /// Bytes still available to carve.
    #[must_use]
    pub fn available(&self) -> usize {
        self.limit as usize - self.cursor as usize
    }

    /// Bytes obtained from the system allocator so far. Never decreases.
    #[must_use]
    pub fn total_acquired(&self) -> usize {
        self.total_acquired
    }

    /// Size of the next growth request for a carve needing `requested_bytes`.
    #[must_use]
    pub fn growth_request(&self, requested_bytes: usize) -> usize {
        2 * requested_bytes + size_class::round_up(self.total_acquired >> GROWTH_HISTORY_SHIFT)
    }

    /// Carves up to `requested` slots of `slot_size` bytes.
    ///
    /// Serves the full batch when it fits, otherwise as many whole slots as
    /// fit. When not even one slot fits, the arena is replenished once
    /// (grow, else scavenge) and the carve is retried once.
    ///
    /// `slot_size` must be a class slot size, i.e. a `round_up` result.
    pub fn chunk_alloc<S: SystemAllocator>(
        &mut self,
        slot_size: usize,
        requested: usize,
        bank: &mut FreeListBank,
        system: &mut S,
        log: &mut LifecycleLog,
    ) -> Result<Chunk> {
        debug_assert!(slot_size > 0 && requested > 0);
        debug_assert!(
            slot_size <= SMALL_OBJECT_THRESHOLD && size_class::round_up(slot_size) == slot_size,
            "{slot_size} is not a slot size"
        );
        if let Some(chunk) = self.carve(slot_size, requested) {
            return Ok(chunk);
        }

        self.salvage_remainder(bank, log);
        self.replenish(slot_size, slot_size * requested, bank, system, log)?;

        // A fresh region holds at least twice the batch and a scavenged node
        // holds at least one slot, so this carve cannot come up empty.
        self.carve(slot_size, requested)
            .ok_or(AllocError::OutOfMemory {
                requested: slot_size * requested,
            })
    }

    /// Carves a batch for `slot_size`, returns the first slot and links the
    /// rest into the class's free list.
    pub fn refill<S: SystemAllocator>(
        &mut self,
        slot_size: usize,
        bank: &mut FreeListBank,
        system: &mut S,
        log: &mut LifecycleLog,
    ) -> Result<NonNull<u8>> {
        let chunk = self.chunk_alloc(slot_size, REFILL_BATCH, bank, system, log)?;
        let class = size_class::class_index(slot_size);

        // Reverse order so the list pops in ascending address order.
        for i in (1..chunk.count).rev() {
            // SAFETY: slot `i` lies inside the carved chunk, which this
            // arena owns and has not handed out.
            unsafe {
                let block = chunk.start.add(i * slot_size);
                bank.push(class, block);
            }
        }

        log.record(
            PoolLogLevel::Trace,
            "refill",
            "refill",
            Some(slot_size),
            Some(class),
            if chunk.count == 1 { "single" } else { "batch" },
            self.total_acquired,
            || format!("served={} requested={}", chunk.count, REFILL_BATCH),
        );
        Ok(chunk.start)
    }

    fn carve(&mut self, slot_size: usize, requested: usize) -> Option<Chunk> {
        let available = self.available();
        let count = if available >= slot_size * requested {
            requested
        } else if available >= slot_size {
            available / slot_size
        } else {
            return None;
        };
        let start = NonNull::new(self.cursor)?;
        // SAFETY: `count * slot_size <= available`, so the new cursor stays
        // within `[cursor, limit]` of the current region.
        self.cursor = unsafe { self.cursor.add(count * slot_size) };
        Some(Chunk { start, count })
    }

    /// Pushes the leftover span onto the largest class it can fully back,
    /// then empties the span.
    fn salvage_remainder(&mut self, bank: &mut FreeListBank, log: &mut LifecycleLog) {
        let remaining = self.available();
        if remaining > 0 {
            if let (Some(class), Some(block)) =
                (size_class::floor_class(remaining), NonNull::new(self.cursor))
            {
                // SAFETY: the leftover span is uncarved, owned by the arena,
                // 8-aligned, and at least `slot_size(class)` bytes long.
                unsafe { bank.push(class, block) };
                log.record(
                    PoolLogLevel::Debug,
                    "chunk_alloc",
                    "salvage_remainder",
                    Some(remaining),
                    Some(class),
                    "salvaged",
                    self.total_acquired,
                    || format!("slot_size={}", size_class::slot_size(class)),
                );
            }
        }
        self.cursor = self.limit;
    }

    fn replenish<S: SystemAllocator>(
        &mut self,
        slot_size: usize,
        requested_bytes: usize,
        bank: &mut FreeListBank,
        system: &mut S,
        log: &mut LifecycleLog,
    ) -> Result<()> {
        let bytes_to_get = self.growth_request(requested_bytes);
        if let Some(region) = system.allocate(bytes_to_get) {
            self.install(region, bytes_to_get);
            self.total_acquired += bytes_to_get;
            log.record(
                PoolLogLevel::Info,
                "chunk_alloc",
                "arena_grow",
                Some(bytes_to_get),
                None,
                "success",
                self.total_acquired,
                || format!("requested_bytes={}", requested_bytes),
            );
            return Ok(());
        }

        log.record(
            PoolLogLevel::Warn,
            "chunk_alloc",
            "system_alloc_failed",
            Some(bytes_to_get),
            None,
            "fallback_scavenge",
            self.total_acquired,
            || format!("requested_bytes={}", requested_bytes),
        );

        for class in size_class::class_index(slot_size)..NUM_SIZE_CLASSES {
            if let Some(node) = bank.pop(class) {
                let span = size_class::slot_size(class);
                self.install(node, span);
                log.record(
                    PoolLogLevel::Warn,
                    "chunk_alloc",
                    "scavenge",
                    Some(slot_size),
                    Some(class),
                    "recovered",
                    self.total_acquired,
                    || format!("span={}", span),
                );
                return Ok(());
            }
        }

        self.cursor = self.limit;
        log.record(
            PoolLogLevel::Error,
            "chunk_alloc",
            "out_of_memory",
            Some(requested_bytes),
            Some(size_class::class_index(slot_size)),
            "oom",
            self.total_acquired,
            || format!("growth_request={}", bytes_to_get),
        );
        Err(AllocError::OutOfMemory {
            requested: requested_bytes,
        })
    }

    fn install(&mut self, start: NonNull<u8>, len: usize) {
        self.cursor = start.as_ptr();
        // SAFETY: `start` heads a block of at least `len` bytes owned by the arena.
        self.limit = unsafe { self.cursor.add(len) };
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
