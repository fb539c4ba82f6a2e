//! Callback registry.
//!
//! Timers refer to their work by a string id registered up front, so a
//! persisted timer can be re-bound to code after a restart.

use std::collections::HashMap;
use std::fmt;

use super::entry::TimerHandle;
use super::scheduler::TimerScheduler;

/// Work executed when a timer fires. It receives the scheduler so it can
/// cancel itself or schedule follow-ups.
pub type TimerCallback = Box<dyn FnMut(&mut TimerScheduler, TimerHandle)>;

#[derive(Default)]
pub struct CallbackRegistry {
    /// `None` marks a callback that is lent out while it runs.
    callbacks: HashMap<String, Option<TimerCallback>>,
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.callbacks.keys().collect();
        ids.sort();
        f.debug_struct("CallbackRegistry").field("ids", &ids).finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `id` to `callback`, replacing any previous binding.
    pub fn register<F>(&mut self, id: impl Into<String>, callback: F)
    where
        F: FnMut(&mut TimerScheduler, TimerHandle) + 'static,
    {
        self.callbacks.insert(id.into(), Some(Box::new(callback)));
    }

    /// Binds `id` to a callback that needs no context.
    pub fn register_fn<F>(&mut self, id: impl Into<String>, mut callback: F)
    where
        F: FnMut() + 'static,
    {
        self.register(id, move |_: &mut TimerScheduler, _: TimerHandle| callback());
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        self.callbacks.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.callbacks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Lends a callback out for the duration of a call, leaving its slot
    /// registered.
    pub(crate) fn take(&mut self, id: &str) -> Option<TimerCallback> {
        self.callbacks.get_mut(id)?.take()
    }

    /// Returns a lent callback to its slot. Dropped if the id was
    /// unregistered meanwhile; a newer binding is kept.
    pub(crate) fn give_back(&mut self, id: &str, callback: TimerCallback) {
        if let Some(slot) = self.callbacks.get_mut(id) {
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }
}
