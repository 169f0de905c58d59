//! Chunked bags: the unit of cross-thread work transfer.
//!
//! Items are accumulated in fixed-capacity chunks. Each thread owns a
//! producer chunk per bag and fills it LIFO for cache locality; a full chunk
//! is published to the bag's shared chunk stack, from which any thread may
//! detach it. Publishing whole chunks amortizes the cost of cross-thread
//! synchronization over `CAP` items.
//!
//! The shared stack is a Treiber-style list of boxed chunk nodes. `pop`
//! detaches the entire list with a single `swap`, keeps the head node, and
//! re-publishes the remainder; because detached nodes are exclusively owned
//! there is no ABA window.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::exec::per_thread::PerThread;
use crate::sched::Item;

/// A fixed-capacity LIFO block of items. Owner-only.
pub struct Chunk<const CAP: usize> {
    items: [Item; CAP],
    len: usize,
}

impl<const CAP: usize> Chunk<CAP> {
    /// Creates an empty chunk.
    pub fn new() -> Self {
        Self {
            items: [Item::new(0, 0); CAP],
            len: 0,
        }
    }

    /// Number of items held.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the chunk holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the chunk is at capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == CAP
    }

    /// Appends an item.
    ///
    /// # Panics
    ///
    /// Panics if the chunk is full.
    #[inline]
    pub fn push(&mut self, item: Item) {
        assert!(self.len < CAP, "push into a full chunk");
        self.items[self.len] = item;
        self.len += 1;
    }

    /// Removes the most recently pushed item.
    #[inline]
    pub fn pop(&mut self) -> Option<Item> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.items[self.len])
    }
}

impl<const CAP: usize> Default for Chunk<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// A chunk with an intrusive next pointer for the shared stack.
pub struct ChunkNode<const CAP: usize> {
    /// The payload.
    pub chunk: Chunk<CAP>,
    next: *mut ChunkNode<CAP>,
}

impl<const CAP: usize> ChunkNode<CAP> {
    /// Allocates an empty, unlinked node.
    pub fn boxed() -> Box<Self> {
        Box::new(Self {
            chunk: Chunk::new(),
            next: ptr::null_mut(),
        })
    }
}

// SAFETY: `next` is an owned intrusive link, only non-null while the node
// is resident in a `ChunkStack`; a detached or producer-slot node never
// aliases another thread's memory through it.
unsafe impl<const CAP: usize> Send for ChunkNode<CAP> {}

/// A lock-free stack of published chunks. Multi-producer, multi-consumer.
pub struct ChunkStack<const CAP: usize> {
    head: AtomicPtr<ChunkNode<CAP>>,
}

// SAFETY: the raw pointers form a heap-allocated list handed between threads
// only through the atomic head; ownership of a node transfers on a
// successful swap/CAS and is never shared.
unsafe impl<const CAP: usize> Send for ChunkStack<CAP> {}
unsafe impl<const CAP: usize> Sync for ChunkStack<CAP> {}

impl<const CAP: usize> ChunkStack<CAP> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Whether the stack currently has no published chunks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Publishes a chunk.
    pub fn push(&self, node: Box<ChunkNode<CAP>>) {
        let ptr = Box::into_raw(node);
        loop {
            let cur = self.head.load(Ordering::Relaxed);
            // SAFETY: `ptr` is owned by this call until the CAS succeeds.
            unsafe { (*ptr).next = cur };
            if self
                .head
                .compare_exchange_weak(cur, ptr, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Detaches one published chunk, if any.
    ///
    /// Internally detaches the whole list, keeps the head node and
    /// re-publishes the rest, so a concurrent `pop` may transiently observe
    /// an empty stack while another thread holds the remainder.
    pub fn pop(&self) -> Option<Box<ChunkNode<CAP>>> {
        let head = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        if head.is_null() {
            return None;
        }
        // SAFETY: the swap transferred exclusive ownership of the list.
        let mut first = unsafe { Box::from_raw(head) };
        let rest = first.next;
        first.next = ptr::null_mut();
        if !rest.is_null() {
            // SAFETY: the remainder is still exclusively owned; walk to its
            // tail and splice the segment back in with one CAS loop.
            unsafe {
                let mut tail = rest;
                while !(*tail).next.is_null() {
                    tail = (*tail).next;
                }
                loop {
                    let cur = self.head.load(Ordering::Relaxed);
                    (*tail).next = cur;
                    if self
                        .head
                        .compare_exchange_weak(cur, rest, Ordering::Release, Ordering::Relaxed)
                        .is_ok()
                    {
                        break;
                    }
                }
            }
        }
        Some(first)
    }
}

impl<const CAP: usize> Default for ChunkStack<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> Drop for ChunkStack<CAP> {
    fn drop(&mut self) {
        let mut cur = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        while !cur.is_null() {
            // SAFETY: drop has exclusive access; every node was Box-allocated.
            let node = unsafe { Box::from_raw(cur) };
            cur = node.next;
        }
    }
}

/// A per-bucket bag: per-thread producer chunks plus a shared stack.
pub struct Bag<const CAP: usize> {
    producers: PerThread<Option<Box<ChunkNode<CAP>>>>,
    shared: ChunkStack<CAP>,
}

impl<const CAP: usize> Bag<CAP> {
    /// Creates a bag for `threads` workers.
    pub fn new(threads: usize) -> Self {
        Self {
            producers: PerThread::new(threads, |_| None),
            shared: ChunkStack::new(),
        }
    }

    /// Appends to the calling worker's producer chunk, publishing it to the
    /// shared stack when it fills up.
    pub fn push_local(&self, tid: usize, item: Item) {
        // SAFETY: slot `tid` belongs to the calling worker.
        let slot = unsafe { self.producers.get(tid) };
        match slot {
            Some(node) if !node.chunk.is_full() => node.chunk.push(item),
            _ => {
                if let Some(full) = slot.take() {
                    self.shared.push(full);
                }
                let mut node = ChunkNode::boxed();
                node.chunk.push(item);
                *slot = Some(node);
            }
        }
    }

    /// Pops from the calling worker's producer chunk (LIFO).
    pub fn pop_local(&self, tid: usize) -> Option<Item> {
        // SAFETY: slot `tid` belongs to the calling worker.
        let slot = unsafe { self.producers.get(tid) };
        slot.as_mut().and_then(|node| node.chunk.pop())
    }

    /// Adopts a published chunk as the worker's producer chunk and pops from
    /// it. Only called when the producer chunk is exhausted.
    pub fn steal(&self, tid: usize) -> Option<Item> {
        let node = self.shared.pop()?;
        // SAFETY: slot `tid` belongs to the calling worker.
        let slot = unsafe { self.producers.get(tid) };
        debug_assert!(slot.as_ref().map_or(true, |n| n.chunk.is_empty()));
        *slot = Some(node);
        slot.as_mut().unwrap().chunk.pop()
    }

    /// Local pop, then steal.
    #[inline]
    pub fn pop_any(&self, tid: usize) -> Option<Item> {
        self.pop_local(tid).or_else(|| self.steal(tid))
    }
}
