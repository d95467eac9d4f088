//! Deferred outbound propagation.
//!
//! A commit only enqueues its value; the send to the channel happens on the
//! next tick, either when the owner calls
//! [`SyncedStore::flush_outbound`](super::SyncedStore::flush_outbound) or
//! when an [`OutboundPump`] task wakes up. Every commit is sent exactly
//! once, in commit order, whatever its origin. Nothing is coalesced.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::SyncedStore;
use crate::error::ChannelError;
use crate::schema::SettingsValue;

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// FIFO of committed values waiting to be sent.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: Mutex<VecDeque<Arc<SettingsValue>>>,
    flushing: Mutex<()>,
    notify: Notify,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a committed value and wake the pump, if any.
    pub fn push(&self, value: Arc<SettingsValue>) {
        self.pending.lock().push_back(value);
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Wait until something has been pushed.
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    /// Hand every queued value to `send`, oldest first, and return how many
    /// this call sent.
    ///
    /// Values pushed while the flush runs (for example by an inbound update
    /// delivered synchronously from inside `send`) are handled by the same
    /// flush. Only one flush drains at a time: a nested or concurrent call
    /// leaves the work to the one already running. The running flush checks
    /// the queue again after giving up the drain, so a value pushed just as
    /// it finished is not left behind. On failure the failed value is put
    /// back at the front and the error is returned.
    pub fn flush<F>(&self, mut send: F) -> Result<usize, ChannelError>
    where
        F: FnMut(&SettingsValue) -> Result<(), ChannelError>,
    {
        let mut sent = 0;
        loop {
            let Some(guard) = self.flushing.try_lock() else {
                return Ok(sent);
            };
            sent += self.drain(&mut send)?;
            drop(guard);
            if self.is_empty() {
                return Ok(sent);
            }
        }
    }

    fn drain<F>(&self, send: &mut F) -> Result<usize, ChannelError>
    where
        F: FnMut(&SettingsValue) -> Result<(), ChannelError>,
    {
        let mut sent = 0;
        loop {
            let next = self.pending.lock().pop_front();
            let Some(value) = next else {
                return Ok(sent);
            };
            if let Err(e) = send(&value) {
                self.pending.lock().push_front(value);
                return Err(e);
            }
            sent += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Pump
// ---------------------------------------------------------------------------

/// Background task that flushes a store whenever it commits.
///
/// Needs a running Tokio runtime. The task stops when the pump is dropped
/// or [`stop`](Self::stop) is called.
#[derive(Debug)]
pub struct OutboundPump {
    handle: JoinHandle<()>,
}

impl OutboundPump {
    pub fn spawn(store: Arc<SyncedStore>) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                store.outbound().notified().await;
                match store.flush_outbound() {
                    Ok(0) => {}
                    Ok(n) => log::trace!("[OutboundPump] {}: sent {n} value(s)", store.key()),
                    Err(e) => log::warn!("[OutboundPump] {}: send failed: {e}", store.key()),
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for OutboundPump {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
