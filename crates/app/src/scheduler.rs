//! Keyed, cancel-and-replace delayed tasks.
//!
//! [`TaskSlots`] lives inside its owner's mutex-guarded state. Scheduling
//! under a key aborts whatever was pending under it. A woken task must
//! [`TaskSlots::claim`] its slot under the owner's lock before acting: a
//! failed claim means it was superseded or cancelled, and it must return
//! without side effects.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one scheduled task among all tasks ever scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskToken(u64);

impl TaskToken {
    fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct Slot {
    token: TaskToken,
    handle: JoinHandle<()>,
}

/// At most one pending delayed task per key.
#[derive(Debug)]
pub struct TaskSlots<K> {
    slots: HashMap<K, Slot>,
}

impl<K> Default for TaskSlots<K> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> TaskSlots<K> {
    /// Run `task(token)` after `delay`, replacing any task pending under `key`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn schedule<F, Fut>(&mut self, key: K, delay: Duration, task: F) -> TaskToken
    where
        F: FnOnce(TaskToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = TaskToken::next();
        let work = task(token);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        if let Some(previous) = self.slots.insert(key, Slot { token, handle }) {
            previous.handle.abort();
        }
        token
    }

    /// Take ownership of the slot for `key` if `token` still holds it.
    ///
    /// Returns `false` when the task was superseded or cancelled.
    pub fn claim(&mut self, key: &K, token: TaskToken) -> bool {
        match self.slots.get(key) {
            Some(slot) if slot.token == token => {
                self.slots.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Abort the task pending under `key`, returning whether one was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.slots.remove(key).is_some_and(|slot| {
            slot.handle.abort();
            true
        })
    }

    /// Abort every pending task whose key matches `predicate`.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&K) -> bool) {
        self.slots.retain(|key, slot| {
            if predicate(key) {
                slot.handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Abort every pending task.
    pub fn cancel_all(&mut self) {
        self.cancel_where(|_| true);
    }

    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
