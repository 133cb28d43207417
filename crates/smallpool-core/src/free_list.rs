//! Intrusive free lists, one per size class.
//!
//! A free block stores the link to the next free block of its class in its
//! first word. While handed out, the same bytes belong to the caller and
//! are never read. [`FreeNode::link`] and [`FreeNode::unlink`] are the only
//! places that reinterpret block memory as a node.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::config::NUM_SIZE_CLASSES;

/// View of a free block: the link to the next free block of the same class.
#[repr(C)]
#[derive(Debug)]
pub struct FreeNode {
    next: Option<NonNull<FreeNode>>,
}

impl FreeNode {
    /// Turns a returned block into a node pointing at `next`.
    ///
    /// # Safety
    ///
    /// `block` must be valid for writes of `size_of::<FreeNode>()` bytes,
    /// aligned for a pointer, and not in use by anyone else.
    unsafe fn link(block: NonNull<u8>, next: Option<NonNull<FreeNode>>) -> NonNull<FreeNode> {
        let node = block.cast::<FreeNode>();
        debug_assert!(node.as_ptr().is_aligned());
        // SAFETY: caller guarantees the block is writable, aligned and unused.
        unsafe { node.as_ptr().write(FreeNode { next }) };
        node
    }

    /// Reads the link out of a node and hands the block back as raw memory.
    ///
    /// # Safety
    ///
    /// `node` must have been produced by [`FreeNode::link`] and not handed
    /// out since.
    unsafe fn unlink(node: NonNull<FreeNode>) -> (NonNull<u8>, Option<NonNull<FreeNode>>) {
        // SAFETY: caller guarantees `node` is a live link written by `link`.
        let next = unsafe { node.as_ptr().read().next };
        (node.cast::<u8>(), next)
    }
}

/// One LIFO free list head per size class.
#[derive(Debug)]
pub struct FreeListBank {
    heads: [Option<NonNull<FreeNode>>; NUM_SIZE_CLASSES],
}

impl FreeListBank {
    /// Creates a bank with every list empty.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            heads: [None; NUM_SIZE_CLASSES],
        }
    }

    /// Links `block` in as the new head of `class`'s list.
    ///
    /// # Safety
    ///
    /// `block` must be at least `slot_size(class)` bytes, pointer-aligned,
    /// owned by this pool, and not referenced by anyone else until it is
    /// popped again.
    pub unsafe fn push(&mut self, class: usize, block: NonNull<u8>) {
        // SAFETY: forwarded from the caller's contract.
        let node = unsafe { FreeNode::link(block, self.heads[class]) };
        self.heads[class] = Some(node);
    }

    /// Removes and returns the head of `class`'s list.
    pub fn pop(&mut self, class: usize) -> Option<NonNull<u8>> {
        let head = self.heads[class]?;
        // SAFETY: every head was installed by `push`, whose contract keeps
        // the node untouched while it sits on the list.
        let (block, next) = unsafe { FreeNode::unlink(head) };
        self.heads[class] = next;
        Some(block)
    }

    /// Returns true if `class`'s list has no nodes.
    #[must_use]
    pub fn is_empty(&self, class: usize) -> bool {
        self.heads[class].is_none()
    }

    /// Counts the nodes on `class`'s list by walking it.
    #[must_use]
    pub fn len(&self, class: usize) -> usize {
        let mut count = 0;
        let mut cursor = self.heads[class];
        while let Some(node) = cursor {
            // SAFETY: see `pop`; walking reads links without unlinking.
            cursor = unsafe { node.as_ref().next };
            count += 1;
        }
        count
    }
}

impl Default for FreeListBank {
    fn default() -> Self {
        Self::new()
    }
}
