//! Public allocation entry points.
//!
//! Requests above [`SMALL_OBJECT_THRESHOLD`] go straight to the system
//! allocator. Smaller requests are served from the size-class free lists,
//! refilled in batches from the arena on a miss.
//!
//! No header is stored with a block: callers pass the original request size
//! back on release.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::arena::Arena;
use crate::config::{PoolConfig, SMALL_OBJECT_THRESHOLD};
use crate::error::{AllocError, Result};
use crate::free_list::FreeListBank;
use crate::log::{LifecycleLog, PoolLogLevel, PoolLogRecord};
use crate::size_class;
use crate::system::{LibcSystem, SystemAllocator};

/// Small-object allocator context: free lists, arena and system backend.
///
/// Not synchronized. Use one instance per execution context, or wrap it in
/// a [`SharedPool`](crate::SharedPool).
///
/// Memory acquired for the arena is never released, including on drop;
/// blocks still held by callers stay valid for the life of the process.
pub struct PoolAllocator<S: SystemAllocator = LibcSystem> {
    bank: FreeListBank,
    arena: Arena,
    system: S,
    log: LifecycleLog,
}

// SAFETY: the raw pointers inside the bank and arena refer only to memory
// this pool acquired and exclusively manages; moving the pool to another
// thread moves that ownership with it.
unsafe impl<S: SystemAllocator + Send> Send for PoolAllocator<S> {}

impl PoolAllocator<LibcSystem> {
    /// Creates a pool backed by `malloc`/`free`, configured from the environment.
    #[must_use]
    pub fn with_libc() -> Self {
        Self::new(LibcSystem, PoolConfig::from_env())
    }
}

impl Default for PoolAllocator<LibcSystem> {
    fn default() -> Self {
        Self::with_libc()
    }
}

impl<S: SystemAllocator> PoolAllocator<S> {
    /// Creates an empty pool over `system`.
    pub fn new(system: S, config: PoolConfig) -> Self {
        Self {
            bank: FreeListBank::new(),
            arena: Arena::new(),
            system,
            log: LifecycleLog::new(config.log_level),
        }
    }

    /// Allocates a block usable for `size` bytes.
    ///
    /// Small blocks are at least 8-byte aligned and span the full slot size
    /// of their class.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>> {
        if size > SMALL_OBJECT_THRESHOLD {
            let Some(ptr) = self.system.allocate(size) else {
                self.log.record(
                    PoolLogLevel::Error,
                    "allocate",
                    "pass_through",
                    Some(size),
                    None,
                    "oom",
                    self.arena.total_acquired(),
                    || "system_allocator_returned_null".to_string(),
                );
                return Err(AllocError::OutOfMemory { requested: size });
            };
            self.log.record(
                PoolLogLevel::Trace,
                "allocate",
                "pass_through",
                Some(size),
                None,
                "success",
                self.arena.total_acquired(),
                String::new,
            );
            return Ok(ptr);
        }

        let class = size_class::class_index(size);
        if let Some(block) = self.bank.pop(class) {
            self.log.record(
                PoolLogLevel::Trace,
                "allocate",
                "free_list_hit",
                Some(size),
                Some(class),
                "success",
                self.arena.total_acquired(),
                String::new,
            );
            return Ok(block);
        }

        self.arena.refill(
            size_class::round_up(size.max(1)),
            &mut self.bank,
            &mut self.system,
            &mut self.log,
        )
    }

    /// Returns a block to the pool.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`allocate`](Self::allocate) (or
    /// [`reallocate`](Self::reallocate)) on this pool with exactly `size`,
    /// must not have been released since, and must not be used afterwards.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize) {
        if size > SMALL_OBJECT_THRESHOLD {
            // SAFETY: large blocks come straight from `self.system.allocate(size)`.
            unsafe { self.system.deallocate(ptr, size) };
            self.log.record(
                PoolLogLevel::Trace,
                "deallocate",
                "pass_through",
                Some(size),
                None,
                "released",
                self.arena.total_acquired(),
                String::new,
            );
            return;
        }

        let class = size_class::class_index(size);
        // SAFETY: caller guarantees `ptr` is a dead block of this class.
        unsafe { self.bank.push(class, ptr) };
    }

    /// Releases `ptr` under `old_size`, then allocates `new_size`.
    ///
    /// Contents are not copied: the returned block may hold anything,
    /// including free-list links. Copy out what you need first.
    ///
    /// # Safety
    ///
    /// Same contract as [`deallocate`](Self::deallocate) for `ptr` and
    /// `old_size`.
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>> {
        // SAFETY: forwarded from the caller's contract.
        unsafe { self.deallocate(ptr, old_size) };
        self.allocate(new_size)
    }

    /// Bytes obtained from the system allocator for the arena so far.
    #[must_use]
    pub fn total_acquired(&self) -> usize {
        self.arena.total_acquired()
    }

    /// Uncarved bytes left in the current arena span.
    #[must_use]
    pub fn pool_available(&self) -> usize {
        self.arena.available()
    }

    /// Number of free blocks waiting on `class`'s list.
    #[must_use]
    pub fn free_count(&self, class: usize) -> usize {
        self.bank.len(class)
    }

    /// Shared access to the system backend.
    pub fn system(&self) -> &S {
        &self.system
    }

    /// Exclusive access to the system backend.
    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    /// Returns a view of retained lifecycle records.
    #[must_use]
    pub fn lifecycle_logs(&self) -> &[PoolLogRecord] {
        self.log.records()
    }

    /// Drains retained lifecycle records.
    pub fn drain_lifecycle_logs(&mut self) -> Vec<PoolLogRecord> {
        self.log.drain()
    }
}
