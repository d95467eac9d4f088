//! The synchronized settings store.
//!
//! Holds one current [`SettingsValue`] and keeps it consistent with the
//! value the background context holds under the same channel key.
//!
//! # Flow
//!
//! - Local mutation ([`save`](SyncedStore::save), [`reset`](SyncedStore::reset)):
//!   replace the value, notify observers, queue one outbound send.
//! - Inbound message ([`handle_inbound`](SyncedStore::handle_inbound)):
//!   validate, compare with the current value, and only if it differs
//!   replace it (which again notifies observers and queues a send).
//!
//! Every commit, whatever its origin, queues exactly one send of the whole
//! value, in commit order. The comparator on the inbound path is what stops
//! echo loops: a value that comes back from the channel equal to what the
//! store already holds is dropped without a commit, so a re-sent value dies
//! out at the next receiver that already holds it.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;

use super::config::{LocalValidation, StoreConfig};
use super::observer::{Subscribers, SubscriptionId};
use super::outbound::OutboundQueue;
use crate::channel::{Channel, ChannelAdapter};
use crate::compare;
use crate::error::Result;
use crate::schema::{SettingsValue, Validation};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// What the inbound handler did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Failed validation; state untouched.
    Rejected,
    /// Equal to the current value; state untouched.
    Unchanged,
    /// Replaced the current value.
    Applied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Save,
    Reset,
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Save => "save",
            Self::Reset => "reset",
            Self::Remote => "remote",
        })
    }
}

#[derive(Debug)]
struct StoreState {
    current: Arc<SettingsValue>,
    revision: u64,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Settings store mirrored with a background context over a [`Channel`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use settings_sync::channel::MemoryChannel;
/// use settings_sync::schema::SettingsValue;
/// use settings_sync::store::{StoreConfig, SyncedStore};
///
/// let channel = Arc::new(MemoryChannel::new());
/// let store = SyncedStore::open(StoreConfig::default(), channel.clone());
///
/// store.save(SettingsValue::empty().with("bugzillaApiKey", "abc")).unwrap();
/// store.flush_outbound().unwrap();
///
/// assert_eq!(store.current().get("bugzillaApiKey"), Some("abc"));
/// assert_eq!(channel.put_count("SettingsStore"), 1);
/// ```
pub struct SyncedStore {
    config: StoreConfig,
    adapter: ChannelAdapter,
    state: RwLock<StoreState>,
    subscribers: Subscribers,
    outbound: OutboundQueue,
}

impl SyncedStore {
    /// Create a store holding `{}`. It does not receive inbound messages
    /// until [`connect`](Self::connect) is called.
    pub fn new(config: StoreConfig, channel: Arc<dyn Channel>) -> Self {
        let adapter = ChannelAdapter::new(channel, config.key.clone(), config.wire_format);
        Self {
            config,
            adapter,
            state: RwLock::new(StoreState {
                current: Arc::new(SettingsValue::empty()),
                revision: 0,
            }),
            subscribers: Subscribers::new(),
            outbound: OutboundQueue::new(),
        }
    }

    /// Create a store and connect it to its channel.
    pub fn open(config: StoreConfig, channel: Arc<dyn Channel>) -> Arc<Self> {
        let store = Arc::new(Self::new(config, channel));
        store.connect();
        store
    }

    /// Register the inbound handler on the channel under this store's key.
    ///
    /// The channel only holds a weak reference; messages arriving after the
    /// store is dropped are ignored.
    pub fn connect(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.adapter.listen(Arc::new(move |payload: Value| {
            if let Some(store) = weak.upgrade() {
                store.handle_inbound(payload);
            }
        }));
        log::debug!("[SyncedStore] {} listening on channel", self.key());
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Snapshot of the current value.
    ///
    /// The snapshot is immutable; changes go through [`save`](Self::save).
    pub fn current(&self) -> Arc<SettingsValue> {
        self.state.read().current.clone()
    }

    /// Number of commits since creation.
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Replace the current value wholesale.
    ///
    /// Under [`LocalValidation::Strict`] a value the schema rejects returns
    /// [`StoreError::Validation`](crate::error::StoreError::Validation) and
    /// leaves the store untouched. Under [`LocalValidation::Trusted`] the
    /// value is stored as given.
    pub fn save(&self, settings: SettingsValue) -> Result<()> {
        if self.config.local_validation == LocalValidation::Strict {
            self.config.schema.check(&settings)?;
        }
        self.commit(settings, Origin::Save);
        Ok(())
    }

    /// Replace the current value with the canonical empty value.
    pub fn reset(&self) {
        self.commit(SettingsValue::empty(), Origin::Reset);
    }

    /// Apply a message received from the channel.
    ///
    /// Never fails: invalid payloads are dropped, and so are payloads equal
    /// to the current value.
    pub fn handle_inbound(&self, payload: Value) -> InboundOutcome {
        let candidate = match self.adapter.decode(&self.config.schema, &payload) {
            Validation::Valid(v) => v,
            Validation::Invalid(e) => {
                log::debug!("[SyncedStore] {}: dropping inbound value: {e}", self.key());
                return InboundOutcome::Rejected;
            }
        };

        let committed = {
            let mut state = self.state.write();
            if compare::equal(&state.current, &candidate) {
                None
            } else {
                Some(self.commit_locked(&mut state, candidate))
            }
        };

        match committed {
            None => {
                log::trace!("[SyncedStore] {}: inbound value unchanged", self.key());
                InboundOutcome::Unchanged
            }
            Some(snapshot) => {
                self.after_commit(&snapshot, Origin::Remote);
                InboundOutcome::Applied
            }
        }
    }

    /// Register an observer called synchronously after every commit.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&SettingsValue) + Send + Sync + 'static,
    {
        self.subscribers.add(Arc::new(observer))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// Send every queued value to the channel, in commit order.
    ///
    /// Returns the number of values sent. If the channel fails, the error is
    /// returned and the unsent values stay queued.
    pub fn flush_outbound(&self) -> Result<usize> {
        let sent = self.outbound.flush(|value| self.adapter.send(value))?;
        Ok(sent)
    }

    /// Number of values waiting to be sent.
    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }

    pub(crate) fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    fn commit(&self, value: SettingsValue, origin: Origin) {
        let snapshot = {
            let mut state = self.state.write();
            self.commit_locked(&mut state, value)
        };
        self.after_commit(&snapshot, origin);
    }

    // Queued under the state lock so the send order equals the commit order.
    fn commit_locked(&self, state: &mut StoreState, value: SettingsValue) -> Arc<SettingsValue> {
        let snapshot = Arc::new(value);
        state.current = snapshot.clone();
        state.revision += 1;
        self.outbound.push(snapshot.clone());
        snapshot
    }

    fn after_commit(&self, snapshot: &Arc<SettingsValue>, origin: Origin) {
        log::trace!("[SyncedStore] {}: committed ({origin})", self.key());
        self.subscribers.notify(snapshot);
    }
}

impl fmt::Debug for SyncedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedStore")
            .field("key", &self.config.key)
            .field("revision", &self.revision())
            .field("pending_outbound", &self.pending_outbound())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::error::StoreError;
    use crate::schema::settings::SETTINGS_STORE_KEY;
    use crate::schema::{Schema, TextRule, UnknownFields};
    use crate::store::config::WireFormat;
    use parking_lot::Mutex;
    use serde_json::json;

    fn setup() -> (Arc<MemoryChannel>, Arc<SyncedStore>) {
        setup_with(StoreConfig::default())
    }

    fn setup_with(config: StoreConfig) -> (Arc<MemoryChannel>, Arc<SyncedStore>) {
        let channel = Arc::new(MemoryChannel::new());
        let store = SyncedStore::open(config, channel.clone());
        (channel, store)
    }

    fn key(v: &str) -> SettingsValue {
        SettingsValue::empty().with("bugzillaApiKey", v)
    }

    #[test]
    fn test_starts_empty() {
        let (channel, store) = setup();
        assert_eq!(*store.current(), SettingsValue::empty());
        assert_eq!(store.revision(), 0);
        assert_eq!(store.flush_outbound().unwrap(), 0);
        assert_eq!(channel.put_count(SETTINGS_STORE_KEY), 0);
    }

    #[test]
    fn test_save_updates_and_sends_once() {
        let (channel, store) = setup();
        store.save(key("abc")).unwrap();
        assert_eq!(*store.current(), key("abc"));

        // Nothing leaves before the tick.
        assert_eq!(channel.put_count(SETTINGS_STORE_KEY), 0);
        assert_eq!(store.pending_outbound(), 1);

        assert_eq!(store.flush_outbound().unwrap(), 1);
        assert_eq!(
            channel.history(SETTINGS_STORE_KEY),
            vec![json!({"bugzillaApiKey": "abc"})]
        );
    }

    #[test]
    fn test_inbound_equal_to_current_sends_nothing() {
        let (channel, store) = setup();
        store.save(key("abc")).unwrap();
        store.flush_outbound().unwrap();

        let outcome = store.handle_inbound(json!({"bugzillaApiKey": "abc"}));
        assert_eq!(outcome, InboundOutcome::Unchanged);
        assert_eq!(store.pending_outbound(), 0);
        assert_eq!(store.flush_outbound().unwrap(), 0);
        assert_eq!(channel.put_count(SETTINGS_STORE_KEY), 1);
    }

    #[test]
    fn test_inbound_on_empty_store_equal_to_empty_is_unchanged() {
        let (_, store) = setup();
        assert_eq!(store.handle_inbound(json!({})), InboundOutcome::Unchanged);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_invalid_inbound_is_dropped() {
        let (channel, store) = setup();
        store.save(key("before")).unwrap();
        store.flush_outbound().unwrap();

        for bad in [
            json!({"bugzillaApiKey": 123}),
            json!({"bugzillaApiKey": null}),
            json!(["bugzillaApiKey"]),
            json!("abc"),
            json!(null),
        ] {
            assert_eq!(store.handle_inbound(bad), InboundOutcome::Rejected);
        }

        assert_eq!(*store.current(), key("before"));
        assert_eq!(store.flush_outbound().unwrap(), 0);
        assert_eq!(channel.put_count(SETTINGS_STORE_KEY), 1);
    }

    #[test]
    fn test_echo_is_absorbed() {
        let (channel, store) = setup();
        store.save(key("A")).unwrap();
        store.flush_outbound().unwrap();

        assert_eq!(store.handle_inbound(json!({"bugzillaApiKey": "A"})), InboundOutcome::Unchanged);
        store.flush_outbound().unwrap();

        assert_eq!(channel.put_count(SETTINGS_STORE_KEY), 1);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_echo_before_flush_is_absorbed() {
        let (channel, store) = setup();
        store.save(key("A")).unwrap();
        assert_eq!(store.handle_inbound(key("A").to_json()), InboundOutcome::Unchanged);
        assert_eq!(store.flush_outbound().unwrap(), 1);
        assert_eq!(channel.put_count(SETTINGS_STORE_KEY), 1);
    }

    #[test]
    fn test_remote_change_applies_and_is_resent() {
        let (channel, store) = setup();
        channel.deliver(SETTINGS_STORE_KEY, json!({"bugzillaApiKey": "remote"}));
        assert_eq!(*store.current(), key("remote"));
        assert_eq!(store.flush_outbound().unwrap(), 1);
        assert_eq!(channel.last(SETTINGS_STORE_KEY), Some(json!({"bugzillaApiKey": "remote"})));
    }

    #[test]
    fn test_remote_change_strips_unknown_fields() {
        let (_, store) = setup();
        let outcome = store.handle_inbound(json!({"bugzillaApiKey": "k", "newerSetting": "x"}));
        assert_eq!(outcome, InboundOutcome::Applied);
        assert_eq!(*store.current(), key("k"));
    }

    #[test]
    fn test_remote_change_with_unknown_fields_rejected_when_configured() {
        let (_, store) = setup_with(StoreConfig::default().unknown_fields(UnknownFields::Reject));
        let outcome = store.handle_inbound(json!({"bugzillaApiKey": "k", "newerSetting": "x"}));
        assert_eq!(outcome, InboundOutcome::Rejected);
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_reset_canonicalizes_and_sends_empty() {
        let (channel, store) = setup();
        store.save(key("abc").with("other", "x")).unwrap();
        store.flush_outbound().unwrap();

        store.reset();
        assert_eq!(*store.current(), SettingsValue::empty());
        assert_eq!(store.flush_outbound().unwrap(), 1);
        assert_eq!(channel.last(SETTINGS_STORE_KEY), Some(json!({})));
    }

    #[test]
    fn test_sends_preserve_order_without_coalescing() {
        let (channel, store) = setup();
        store.save(key("A")).unwrap();
        store.save(key("B")).unwrap();
        store.save(key("B")).unwrap();
        assert_eq!(store.flush_outbound().unwrap(), 3);
        assert_eq!(
            channel.history(SETTINGS_STORE_KEY),
            vec![
                json!({"bugzillaApiKey": "A"}),
                json!({"bugzillaApiKey": "B"}),
                json!({"bugzillaApiKey": "B"}),
            ]
        );
    }

    #[test]
    fn test_trusted_save_accepts_schema_violations() {
        let schema = Schema::new().field("bugzillaApiKey", TextRule::exact_or_empty(32));
        let (channel, store) = setup_with(StoreConfig::with_key("SettingsStore", schema));
        store.save(key("short")).unwrap();
        store.flush_outbound().unwrap();
        assert_eq!(channel.last("SettingsStore"), Some(json!({"bugzillaApiKey": "short"})));
    }

    #[test]
    fn test_strict_save_rejects_and_keeps_state() {
        let schema = Schema::new().field("bugzillaApiKey", TextRule::exact_or_empty(32));
        let config = StoreConfig::with_key("SettingsStore", schema).strict();
        let (channel, store) = setup_with(config);

        let err = store.save(key("short")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.current().is_empty());
        assert_eq!(store.revision(), 0);
        assert_eq!(store.flush_outbound().unwrap(), 0);
        assert_eq!(channel.put_count("SettingsStore"), 0);

        store.save(key("")).unwrap();
        store.save(key(&"x".repeat(32))).unwrap();
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_observers_see_every_commit_in_order() {
        let (_, store) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            store.subscribe(move |v: &SettingsValue| {
                seen.lock().push((tag, v.get("bugzillaApiKey").map(str::to_string)));
            });
        }

        store.save(key("A")).unwrap();
        store.handle_inbound(json!({"bugzillaApiKey": "A"}));
        store.handle_inbound(json!({"bugzillaApiKey": "B"}));
        store.reset();

        assert_eq!(
            *seen.lock(),
            vec![
                ("first", Some("A".to_string())),
                ("second", Some("A".to_string())),
                ("first", Some("B".to_string())),
                ("second", Some("B".to_string())),
                ("first", None),
                ("second", None),
            ]
        );
    }

    #[test]
    fn test_observer_can_read_store() {
        let (_, store) = setup();
        let seen = Arc::new(Mutex::new(None));
        let (s, sink) = (Arc::downgrade(&store), seen.clone());
        store.subscribe(move |_: &SettingsValue| {
            if let Some(store) = s.upgrade() {
                *sink.lock() = Some(store.revision());
            }
        });
        store.save(key("A")).unwrap();
        assert_eq!(*seen.lock(), Some(1));
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let (_, store) = setup();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let id = store.subscribe(move |_: &SettingsValue| *c.lock() += 1);
        store.save(key("A")).unwrap();
        assert!(store.unsubscribe(id));
        store.save(key("B")).unwrap();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_two_contexts_converge() {
        let hub = Arc::new(MemoryChannel::new());
        let first = SyncedStore::open(StoreConfig::default(), hub.client());
        let second = SyncedStore::open(StoreConfig::default(), hub.client());

        first.save(key("shared")).unwrap();
        first.flush_outbound().unwrap();
        assert_eq!(*second.current(), key("shared"));

        // The second context re-sends what it applied; the first absorbs it.
        assert_eq!(second.flush_outbound().unwrap(), 1);
        assert_eq!(first.pending_outbound(), 0);
        assert_eq!(first.revision(), 1);
        assert_eq!(hub.put_count(SETTINGS_STORE_KEY), 2);
    }

    #[test]
    fn test_inbound_then_save_sends_both_in_order() {
        let (channel, store) = setup();
        assert_eq!(store.handle_inbound(json!({"bugzillaApiKey": "A"})), InboundOutcome::Applied);
        store.save(key("B")).unwrap();

        assert_eq!(store.revision(), 2);
        assert_eq!(store.flush_outbound().unwrap(), 2);
        assert_eq!(
            channel.history(SETTINGS_STORE_KEY),
            vec![json!({"bugzillaApiKey": "A"}), json!({"bugzillaApiKey": "B"})]
        );
    }

    #[test]
    fn test_background_write_reaches_foreground() {
        let hub = Arc::new(MemoryChannel::new());
        let store = SyncedStore::open(StoreConfig::default(), hub.client());
        hub.put(SETTINGS_STORE_KEY, json!({"bugzillaApiKey": "from-worker"})).unwrap();
        assert_eq!(*store.current(), key("from-worker"));
    }

    #[test]
    fn test_enveloped_wire_format() {
        let (channel, store) = setup_with(StoreConfig::default().wire_format(WireFormat::Enveloped));
        store.save(key("abc")).unwrap();
        store.flush_outbound().unwrap();
        assert_eq!(
            channel.last(SETTINGS_STORE_KEY),
            Some(json!({"settings": {"bugzillaApiKey": "abc"}}))
        );

        assert_eq!(store.handle_inbound(json!({"bugzillaApiKey": "x"})), InboundOutcome::Rejected);
        assert_eq!(
            store.handle_inbound(json!({"settings": {"bugzillaApiKey": "x"}})),
            InboundOutcome::Applied
        );
    }

    #[test]
    fn test_channel_failure_surfaces_and_keeps_queue() {
        let (channel, store) = setup();
        store.save(key("A")).unwrap();
        store.save(key("B")).unwrap();

        channel.fail_next_put("worker unavailable");
        let err = store.flush_outbound().unwrap_err();
        assert!(matches!(err, StoreError::Channel(_)));
        assert_eq!(*store.current(), key("B"));
        assert_eq!(store.pending_outbound(), 2);

        assert_eq!(store.flush_outbound().unwrap(), 2);
        assert_eq!(channel.put_count(SETTINGS_STORE_KEY), 2);
    }

    #[test]
    fn test_closed_channel_error() {
        let (channel, store) = setup();
        channel.close();
        store.save(key("A")).unwrap();
        assert!(store.flush_outbound().is_err());
        assert_eq!(*store.current(), key("A"));
    }

    #[test]
    fn test_dropped_store_ignores_messages() {
        let channel = Arc::new(MemoryChannel::new());
        let store = SyncedStore::open(StoreConfig::default(), channel.clone());
        drop(store);
        channel.deliver(SETTINGS_STORE_KEY, json!({"bugzillaApiKey": "late"}));
    }

    #[test]
    fn test_round_trip_of_current_value() {
        let (_, store) = setup();
        store.save(key("abc").with("ignored", "x")).unwrap();
        let wire = serde_json::to_value(&*store.current()).unwrap();
        let back = store.config().schema.validate(&wire).ok().unwrap();
        // Trusted save kept the unknown field; validation strips it.
        assert_eq!(back, key("abc"));

        store.save(key("abc")).unwrap();
        let wire = serde_json::to_value(&*store.current()).unwrap();
        assert_eq!(store.config().schema.validate(&wire).ok(), Some(key("abc")));
    }
}
