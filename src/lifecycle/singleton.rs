//! Process-wide instance slots.
//!
//! Each long-lived component exposes a `global()` factory backed by one of
//! these slots. The slot hands out `Arc` handles; `reset` detaches the
//! current instance so tests can start from a clean one.

use std::sync::{Arc, Mutex};

/// A lazily-filled, resettable slot holding at most one instance.
pub struct Singleton<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Singleton<T> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the current instance, creating it with `init` if the slot is empty.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> Arc<T> {
        let mut slot = self.slot.lock().expect("singleton mutex poisoned");
        slot.get_or_insert_with(|| Arc::new(init())).clone()
    }

    /// Fallible variant of [`Singleton::get_or_init`]; the slot stays empty on error.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        let mut slot = self.slot.lock().expect("singleton mutex poisoned");
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        let instance = Arc::new(init()?);
        *slot = Some(instance.clone());
        Ok(instance)
    }

    /// The current instance, if any.
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.lock().expect("singleton mutex poisoned").clone()
    }

    /// Detach and return the current instance.
    pub fn reset(&self) -> Option<Arc<T>> {
        self.slot.lock().expect("singleton mutex poisoned").take()
    }
}

impl<T> Default for Singleton<T> {
    fn default() -> Self {
        Self::new()
    }
}
