use crate::router::Handler;
use crate::ChatId;
use std::collections::HashMap;
use std::sync::Mutex;

/// A pending one-question dialogue: the next plain-text message from the
/// recipient is stored under `key`, then `hook` runs with that message.
#[derive(Clone)]
pub struct PendingWait {
    pub key: String,
    pub hook: Handler,
}

/// At most one pending wait per recipient.
///
/// Arming a new wait silently replaces the previous one; a replaced hook
/// never runs. Waits have no expiry, they live until consumed or
/// cancelled.
#[derive(Default)]
pub struct WaitTable {
    inner: Mutex<HashMap<ChatId, PendingWait>>,
}

impl WaitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a wait for `id`, replacing any previous one.
    pub fn wait(&self, id: ChatId, key: &str, hook: Handler) {
        self.inner.lock().unwrap().insert(
            id,
            PendingWait {
                key: key.to_string(),
                hook,
            },
        );
    }

    /// Disarms the wait for `id`. Returns `true` when one was pending.
    pub fn cancel(&self, id: ChatId) -> bool {
        self.inner.lock().unwrap().remove(&id).is_some()
    }

    pub fn is_waiting(&self, id: ChatId) -> bool {
        self.inner.lock().unwrap().contains_key(&id)
    }

    /// Removes and returns the pending wait for `id`.
    pub fn take(&self, id: ChatId) -> Option<PendingWait> {
        self.inner.lock().unwrap().remove(&id)
    }
}
