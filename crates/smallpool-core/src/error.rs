//! Allocation error type.

use thiserror::Error;

/// Errors surfaced by the pool.
///
/// Passing a mismatched size or a foreign pointer to `deallocate` is not
/// reported here: there is no stored ground truth to check it against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AllocError {
    /// The system allocator could not supply `requested` bytes and no free
    /// list could be repurposed as pool space.
    #[error("out of memory: unable to obtain {requested} bytes")]
    OutOfMemory { requested: usize },
}

pub type Result<T> = std::result::Result<T, AllocError>;
