//! Fixed-capacity, length-aware sequence.
//!
//! Replaces the "array of N slots + separate count" layout: the length is the
//! number of live entries, there are no stale trailing slots, and growing
//! past `N` is reported instead of writing out of bounds.

use std::ops::Deref;

use crate::error::EventError;

/// Overflow of a [`BoundedVec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError {
    /// Declared capacity.
    pub capacity: usize,
    /// Length that was requested.
    pub requested: usize,
}

impl CapacityError {
    /// Attach the name of the overflowing field.
    pub fn for_field(self, field: &'static str) -> EventError {
        EventError::CapacityExceeded { field, capacity: self.capacity, requested: self.requested }
    }
}

/// A vector holding at most `N` elements.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedVec<T, const N: usize> {
    items: Vec<T>,
}

impl<T, const N: usize> Default for BoundedVec<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> BoundedVec<T, N> {
    /// Maximum number of elements.
    pub const CAPACITY: usize = N;

    /// Empty sequence. Allocates lazily.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append one element.
    pub fn push(&mut self, value: T) -> Result<(), CapacityError> {
        if self.items.len() >= N {
            return Err(CapacityError { capacity: N, requested: self.items.len() + 1 });
        }
        self.items.push(value);
        Ok(())
    }

    /// Append every element of `values`, or nothing if the result would overflow.
    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<(), CapacityError>
    where
        T: Clone,
    {
        let requested = self.items.len() + values.len();
        if requested > N {
            return Err(CapacityError { capacity: N, requested });
        }
        self.items.extend_from_slice(values);
        Ok(())
    }

    /// Grow or shrink to `len`, filling new slots with `T::default()`.
    pub fn resize_default(&mut self, len: usize) -> Result<(), CapacityError>
    where
        T: Default + Clone,
    {
        if len > N {
            return Err(CapacityError { capacity: N, requested: len });
        }
        self.items.resize(len, T::default());
        Ok(())
    }

    /// Remove every element, keeping the allocation.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// `true` when no further element fits.
    pub fn is_full(&self) -> bool {
        self.items.len() == N
    }

    /// Mutable view of the live elements.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<T, const N: usize> Deref for BoundedVec<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a BoundedVec<T, N> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T, const N: usize> TryFrom<Vec<T>> for BoundedVec<T, N> {
    type Error = CapacityError;

    fn try_from(items: Vec<T>) -> Result<Self, Self::Error> {
        if items.len() > N {
            return Err(CapacityError { capacity: N, requested: items.len() });
        }
        Ok(Self { items })
    }
}
