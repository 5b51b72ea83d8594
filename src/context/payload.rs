//! # Type-keyed payload map.
//!
//! [`PayloadMap`] stores at most one value per type. Insertion order is irrelevant.
//!
//! ## Example
//! ```rust
//! use recvisor::PayloadMap;
//!
//! #[derive(Debug, PartialEq)]
//! struct RetryCount(u32);
//!
//! let mut payloads = PayloadMap::new();
//! payloads.get_or_add(|| RetryCount(0)).0 += 1;
//! payloads.get_or_add(|| RetryCount(0)).0 += 1;
//! assert_eq!(payloads.get::<RetryCount>(), Some(&RetryCount(2)));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Map from a value's type to that value.
#[derive(Default)]
pub struct PayloadMap {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PayloadMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload of type `T`, if present.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the payload of type `T`, if present.
    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// True if a payload of type `T` is present.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Inserts `value`, returning the previous payload of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.entries
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|prev| prev.downcast::<T>().ok())
            .map(|prev| *prev)
    }

    /// Returns the payload of type `T`, inserting the factory result if absent.
    pub fn get_or_add<T, F>(&mut self, factory: F) -> &mut T
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let slot = self
            .entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(factory()));
        match slot.downcast_mut::<T>() {
            Some(v) => v,
            None => unreachable!("payload slot holds the type it is keyed by"),
        }
    }

    /// Inserts `add()` if absent, otherwise replaces the value with `update(existing)`.
    pub fn add_or_update<T, A, U>(&mut self, add: A, update: U) -> &mut T
    where
        T: Any + Send + Sync,
        A: FnOnce() -> T,
        U: FnOnce(T) -> T,
    {
        let next = match self.remove::<T>() {
            Some(existing) => update(existing),
            None => add(),
        };
        self.get_or_add(|| next)
    }

    /// Removes and returns the payload of type `T`.
    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Number of payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no payloads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PayloadMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadMap")
            .field("len", &self.entries.len())
            .finish()
    }
}
