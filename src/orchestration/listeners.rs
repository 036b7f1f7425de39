//! Registry of native event subscriptions.
//!
//! Subscriptions are keyed globally ("internal": adapter-wide events) or per
//! peripheral ("public": characteristic-value streams). Removal unsubscribes
//! exactly once; removing a missing key is a no-op. Setting over an existing
//! key does NOT unsubscribe the old entry; callers that want reset-then-
//! register semantics remove explicitly first.

use std::collections::HashMap;

use tokio::task::JoinHandle;

use crate::domain::models::PeripheralId;

/// Which native event a subscription is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKey {
    Discover,
    Disconnect,
    AdapterState,
    CharacteristicValue,
}

enum Cleanup {
    Closure(Box<dyn FnOnce() + Send>),
    Task(JoinHandle<()>),
}

/// A live native subscription. Unsubscribing aborts the backing dispatch
/// task (or runs the unsubscribe closure). Dropping without unsubscribing
/// detaches the task instead of stopping it.
pub struct Subscription {
    cleanup: Option<Cleanup>,
}

impl Subscription {
    pub fn from_fn(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cleanup: Some(Cleanup::Closure(Box::new(unsubscribe))),
        }
    }

    pub fn from_task(handle: JoinHandle<()>) -> Self {
        Self {
            cleanup: Some(Cleanup::Task(handle)),
        }
    }

    fn unsubscribe(mut self) {
        match self.cleanup.take() {
            Some(Cleanup::Closure(f)) => f(),
            Some(Cleanup::Task(handle)) => handle.abort(),
            None => {}
        }
    }
}

/// Two-level subscription map, lifetime = application session.
#[derive(Default)]
pub struct ListenerRegistry {
    internal: HashMap<ListenerKey, Subscription>,
    public: HashMap<PeripheralId, HashMap<ListenerKey, Subscription>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_internal(&mut self, key: ListenerKey, subscription: Subscription) {
        self.internal.insert(key, subscription);
    }

    pub fn set_public(&mut self, id: PeripheralId, key: ListenerKey, subscription: Subscription) {
        self.public.entry(id).or_default().insert(key, subscription);
    }

    pub fn has_internal(&self, key: ListenerKey) -> bool {
        self.internal.contains_key(&key)
    }

    pub fn has_public(&self, id: &PeripheralId, key: ListenerKey) -> bool {
        self.public
            .get(id)
            .map_or(false, |subs| subs.contains_key(&key))
    }

    pub fn remove_internal(&mut self, key: ListenerKey) {
        if let Some(subscription) = self.internal.remove(&key) {
            subscription.unsubscribe();
        }
    }

    pub fn remove_public(&mut self, id: &PeripheralId, key: ListenerKey) {
        let Some(subs) = self.public.get_mut(id) else {
            return;
        };
        if let Some(subscription) = subs.remove(&key) {
            subscription.unsubscribe();
        }
        if subs.is_empty() {
            self.public.remove(id);
        }
    }

    pub fn remove_all_for_peripheral(&mut self, id: &PeripheralId) {
        if let Some(subs) = self.public.remove(id) {
            for (_, subscription) in subs {
                subscription.unsubscribe();
            }
        }
    }

    /// Full teardown: every internal and every per-peripheral subscription.
    pub fn remove_all(&mut self) {
        for (_, subscription) in self.internal.drain() {
            subscription.unsubscribe();
        }
        for (_, subs) in self.public.drain() {
            for (_, subscription) in subs {
                subscription.unsubscribe();
            }
        }
    }
}
