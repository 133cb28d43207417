//! # smallpool-core
//!
//! Small-object sub-allocator sitting in front of the system allocator.
//!
//! - Requests up to 4096 bytes are bucketed into 56 size classes, each with
//!   an intrusive LIFO free list.
//! - Free lists are refilled in batches carved from a growing arena.
//! - Larger requests pass straight through to the system allocator.
//!
//! Callers return blocks with the size they requested; no per-block header
//! is stored. Unsafe code is confined to the modules that touch raw memory.
//!
//! The carving arena is crate-internal; only whole slot sizes ever reach it.
//!
//! ```compile_fail
//! use smallpool_core::arena::Arena;
//! ```

#![deny(unsafe_code)]

pub(crate) mod arena;
pub mod config;
pub mod error;
pub mod free_list;
pub mod log;
pub mod pool;
pub mod shared;
pub mod size_class;
pub mod system;

pub use config::{NUM_SIZE_CLASSES, PoolConfig, SMALL_OBJECT_THRESHOLD};
pub use error::{AllocError, Result};
pub use log::{PoolLogLevel, PoolLogRecord};
pub use pool::PoolAllocator;
pub use shared::SharedPool;
pub use system::{LibcSystem, SystemAllocator};
