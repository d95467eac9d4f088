//! Ordered, synchronous observer list.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::schema::SettingsValue;

/// Callback run after every committed change, with the new value.
pub type Observer = Arc<dyn Fn(&SettingsValue) + Send + Sync>;

/// Handle returned by [`Subscribers::add`], used to remove the observer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

static SUBSCRIPTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    fn next() -> Self {
        Self(SUBSCRIPTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Observers of one store, kept in registration order.
#[derive(Default)]
pub struct Subscribers {
    entries: RwLock<Vec<(SubscriptionId, Observer)>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer at the end of the list.
    pub fn add(&self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.entries.write().push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(eid, _)| *eid != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Call every observer, in registration order.
    ///
    /// The list is snapshotted first, so observers may subscribe,
    /// unsubscribe or read the store without deadlocking.
    pub fn notify(&self, value: &SettingsValue) {
        let snapshot: Vec<Observer> = self.entries.read().iter().map(|(_, o)| o.clone()).collect();
        for observer in snapshot {
            observer(value);
        }
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers").field("len", &self.len()).finish()
    }
}
