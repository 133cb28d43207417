//! System allocator backend.
//!
//! The pool obtains arena regions and serves large requests through a
//! [`SystemAllocator`]. [`LibcSystem`] forwards to `malloc`/`free`.

#![allow(unsafe_code)]

use std::ptr::NonNull;

/// Source of raw memory behind the pool.
pub trait SystemAllocator {
    /// Allocates `size` bytes aligned to at least 8. `None` signals failure.
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>>;

    /// Releases a block obtained from [`SystemAllocator::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate(size)` on this backend and must not
    /// be used afterwards.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize);
}

/// `malloc`/`free` from the platform C library.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcSystem;

impl SystemAllocator for LibcSystem {
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: malloc has no preconditions; a null return is mapped to None.
        NonNull::new(unsafe { libc::malloc(size) }.cast::<u8>())
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, _size: usize) {
        // SAFETY: caller guarantees `ptr` came from `malloc` and is dead.
        unsafe { libc::free(ptr.as_ptr().cast()) };
    }
}
