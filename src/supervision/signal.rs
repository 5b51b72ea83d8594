//! # One-shot signal.
//!
//! [`Signal`] is set once by its owner and awaited by any number of observers.
//! Later `set` calls are no-ops.

use std::fmt;
use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;

/// One-shot latch carrying a value.
pub struct Signal<T> {
    value: OnceLock<T>,
    latch: CancellationToken,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            value: OnceLock::new(),
            latch: CancellationToken::new(),
        }
    }
}

impl<T: Clone + Send + Sync> Signal<T> {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal, waking all waiters.
    ///
    /// Returns `true` only for the call that actually set it.
    pub fn set(&self, value: T) -> bool {
        if self.value.set(value).is_ok() {
            self.latch.cancel();
            true
        } else {
            false
        }
    }

    /// True once the signal has been set.
    pub fn is_set(&self) -> bool {
        self.value.get().is_some()
    }

    /// Returns the value if the signal has been set.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Waits until the signal is set and returns its value.
    pub async fn wait(&self) -> T {
        loop {
            if let Some(v) = self.value.get() {
                return v.clone();
            }
            self.latch.cancelled().await;
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.value.get())
            .finish()
    }
}
