//! Container crate
//!
//! Ordered in-memory buffers that enforce a capacity policy and hand every
//! evicted or discarded item to a release callback.
//!
//! Three policies are available:
//! - unbounded: never full, never evicts.
//! - head-bounded: keeps the first `capacity` items; once full, `add` rejects.
//! - tail-bounded: keeps the last `capacity` items; `add` on a full container
//!   evicts and releases the oldest item first.
//!
//! A container owns its items from `add` until they are either released or
//! handed out by [`Container::items`]. Items still held when the container is
//! dropped are released.

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("container capacity must be positive, got {0}")]
    InvalidCapacity(usize),
}

/// Callback invoked for items the container gives up.
pub type ReleaseFn<T> = Box<dyn FnMut(T) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Unbounded,
    Head(usize),
    Tail(usize),
}

pub struct Container<T> {
    items: VecDeque<T>,
    bound: Bound,
    release: ReleaseFn<T>,
}

impl<T> Container<T> {
    pub fn unbounded(release: impl FnMut(T) + Send + 'static) -> Self {
        Self { items: VecDeque::new(), bound: Bound::Unbounded, release: Box::new(release) }
    }

    pub fn head(
        capacity: usize,
        release: impl FnMut(T) + Send + 'static,
    ) -> Result<Self, ContainerError> {
        if capacity == 0 {
            return Err(ContainerError::InvalidCapacity(capacity));
        }
        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            bound: Bound::Head(capacity),
            release: Box::new(release),
        })
    }

    pub fn tail(
        capacity: usize,
        release: impl FnMut(T) + Send + 'static,
    ) -> Result<Self, ContainerError> {
        if capacity == 0 {
            return Err(ContainerError::InvalidCapacity(capacity));
        }
        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            bound: Bound::Tail(capacity),
            release: Box::new(release),
        })
    }

    pub fn bound(&self) -> Bound {
        self.bound
    }

    /// Adds an item.
    ///
    /// Returns `false` when a full head-bounded container rejects the item.
    /// The rejected item is handed to the release callback, so callers should
    /// check [`Container::is_full`] before producing one.
    pub fn add(&mut self, item: T) -> bool {
        match self.bound {
            Bound::Unbounded => {
                self.items.push_back(item);
                true
            }
            Bound::Head(capacity) => {
                if self.items.len() >= capacity {
                    (self.release)(item);
                    return false;
                }
                self.items.push_back(item);
                true
            }
            Bound::Tail(capacity) => {
                if self.items.len() >= capacity {
                    if let Some(oldest) = self.items.pop_front() {
                        trace!(capacity, "evicting oldest item from tail container");
                        (self.release)(oldest);
                    }
                }
                self.items.push_back(item);
                true
            }
        }
    }

    /// Only a head-bounded container can become full; a tail-bounded one
    /// always accepts by evicting.
    pub fn is_full(&self) -> bool {
        match self.bound {
            Bound::Head(capacity) => self.items.len() >= capacity,
            Bound::Unbounded | Bound::Tail(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Hands all retained items to the caller in insertion order. The caller
    /// becomes responsible for releasing them.
    pub fn items(mut self) -> Vec<T> {
        std::mem::take(&mut self.items).into_iter().collect()
    }
}

impl<T> Drop for Container<T> {
    fn drop(&mut self) {
        for item in self.items.drain(..) {
            (self.release)(item);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bound", &self.bound)
            .field("items", &self.items)
            .finish()
    }
}
