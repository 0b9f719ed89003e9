use crate::ChatId;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

/// A registered notification recipient with its conversation attributes.
///
/// Attributes are the answers captured by pending waits, keyed by the
/// wait's attribute name. They live exactly as long as the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub id: ChatId,
    pub attributes: HashMap<String, String>,
}

/// Thread-safe set of recipients.
///
/// Reads hand out clones and snapshots, so no lock is ever held across
/// an await point.
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: RwLock<HashMap<ChatId, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id`. Returns `true` when the recipient was newly
    /// added; re-subscribing is a no-op that keeps existing attributes.
    pub fn subscribe(&self, id: ChatId) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Subscriber {
                    id,
                    attributes: HashMap::new(),
                });
                true
            }
        }
    }

    /// Removes `id` and its attributes. Returns `true` when it was
    /// registered.
    pub fn unsubscribe(&self, id: ChatId) -> bool {
        self.inner.write().unwrap().remove(&id).is_some()
    }

    pub fn is_subscribed(&self, id: ChatId) -> bool {
        self.inner.read().unwrap().contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn get(&self, id: ChatId) -> Option<Subscriber> {
        self.inner.read().unwrap().get(&id).cloned()
    }

    /// Stores a conversation attribute for `id`. Returns `false` when
    /// the recipient is not registered.
    pub fn set_attribute(&self, id: ChatId, key: &str, value: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.get_mut(&id) {
            Some(subscriber) => {
                subscriber
                    .attributes
                    .insert(key.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    /// Snapshot of recipient ids for fan-out; broadcasts iterate this,
    /// never the live map.
    pub fn chat_ids(&self) -> Vec<ChatId> {
        self.inner.read().unwrap().keys().copied().collect()
    }
}
