// core/bounded.rs
// Fixed-capacity ordered sequence with an explicit push-or-reject contract

use crate::error::CapacityExceeded;
use serde::{Serialize, Serializer};
use std::ops::Deref;

/// Ordered sequence holding at most `N` items.
///
/// Pushing into a full sequence never truncates or overwrites: the caller
/// gets `CapacityExceeded` back and decides what to discard (for audit
/// records, the whole record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bounded<T, const N: usize> {
    items: heapless::Vec<T, N>,
}

impl<T, const N: usize> Bounded<T, N> {
    pub const CAPACITY: usize = N;

    pub const fn new() -> Self {
        Self {
            items: heapless::Vec::new(),
        }
    }

    pub fn try_push(&mut self, item: T) -> Result<(), CapacityExceeded> {
        self.items
            .push(item)
            .map_err(|_| CapacityExceeded { capacity: N })
    }

    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: PartialEq, const N: usize> Bounded<T, N> {
    /// Push `item` unless an equal item is already present.
    /// Returns `Ok(true)` if the item was added.
    pub fn try_insert_unique(&mut self, item: T) -> Result<bool, CapacityExceeded> {
        if self.items.contains(&item) {
            return Ok(false);
        }
        self.try_push(item).map(|_| true)
    }
}

impl<T, const N: usize> Default for Bounded<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Deref for Bounded<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a Bounded<T, N> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize, const N: usize> Serialize for Bounded<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}
