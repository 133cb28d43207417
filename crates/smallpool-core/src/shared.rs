//! Mutex-serialized handle over a [`PoolAllocator`].
//!
//! The pool itself takes no locks. `SharedPool` is the external
//! serialization for callers that share one pool between threads.

#![allow(unsafe_code)]

use parking_lot::Mutex;
use std::ptr::NonNull;

use crate::error::Result;
use crate::pool::PoolAllocator;
use crate::system::{LibcSystem, SystemAllocator};

/// Thread-safe handle over one [`PoolAllocator`].
pub struct SharedPool<S: SystemAllocator = LibcSystem> {
    inner: Mutex<PoolAllocator<S>>,
}

impl<S: SystemAllocator> SharedPool<S> {
    /// Wraps `pool`.
    pub fn new(pool: PoolAllocator<S>) -> Self {
        Self {
            inner: Mutex::new(pool),
        }
    }

    /// See [`PoolAllocator::allocate`].
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        self.inner.lock().allocate(size)
    }

    /// See [`PoolAllocator::deallocate`].
    ///
    /// # Safety
    ///
    /// Same contract as [`PoolAllocator::deallocate`].
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: forwarded from the caller's contract.
        unsafe { self.inner.lock().deallocate(ptr, size) }
    }

    /// See [`PoolAllocator::reallocate`].
    ///
    /// # Safety
    ///
    /// Same contract as [`PoolAllocator::reallocate`].
    pub unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>> {
        // SAFETY: forwarded from the caller's contract.
        unsafe { self.inner.lock().reallocate(ptr, old_size, new_size) }
    }

    /// Runs `f` with the pool locked.
    pub fn with_pool<R>(&self, f: impl FnOnce(&mut PoolAllocator<S>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Unwraps the pool.
    pub fn into_inner(self) -> PoolAllocator<S> {
        self.inner.into_inner()
    }
}

impl Default for SharedPool<LibcSystem> {
    fn default() -> Self {
        Self::new(PoolAllocator::with_libc())
    }
}
