//! Owner-indexed per-thread storage.
//!
//! Schedulers and the driver keep mutable per-thread state (producer chunks,
//! cursors, RNGs, statistics) in a fixed array indexed by worker id. Slot
//! `tid` is only ever touched by worker `tid`; the driver assigns ids at
//! spawn time and never migrates them. `CachePadded` keeps neighboring slots
//! off each other's cache lines.

use core::cell::UnsafeCell;

use crossbeam_utils::CachePadded;

/// A fixed array of per-worker slots with interior mutability.
pub struct PerThread<T> {
    slots: Box<[CachePadded<UnsafeCell<T>>]>,
}

// SAFETY: each slot is only accessed by the worker whose id it is indexed
// by (the contract of `get`), so no two threads touch the same `UnsafeCell`.
unsafe impl<T: Send> Sync for PerThread<T> {}

impl<T> PerThread<T> {
    /// Creates `threads` slots, initializing slot `i` with `init(i)`.
    pub fn new(threads: usize, mut init: impl FnMut(usize) -> T) -> Self {
        let slots = (0..threads)
            .map(|i| CachePadded::new(UnsafeCell::new(init(i))))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slot of worker `tid`.
    ///
    /// # Safety
    ///
    /// Only the worker with id `tid` may call this, and the returned
    /// reference must not outlive the worker's exclusive use of the slot.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get(&self, tid: usize) -> &mut T {
        // SAFETY: single-owner discipline per the function contract.
        unsafe { &mut *self.slots[tid].get() }
    }

    /// Consumes the storage and returns the slot values.
    pub fn into_values(self) -> Vec<T> {
        Vec::from(self.slots)
            .into_iter()
            .map(|padded| padded.into_inner().into_inner())
            .collect()
    }
}
