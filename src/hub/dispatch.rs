//! MessageHub implementation

use crate::core::sync::recover_poison;
use crate::message::{Message, MSG_STATE_CHANGED};
use crate::queue::MessageSink;
use crate::state::StateStore;
use std::sync::{Arc, Mutex, Weak};

/// Invoked after a subscriber has been connected and replayed, so the hub's
/// owner can react (welcome messages, per-client setup).
pub type ConnectCallback = Arc<dyn Fn(&Arc<MessageSink>) + Send + Sync>;

struct HubInner {
    /// Unowned subscriber references; owners must disconnect before drop.
    subscribers: Vec<Weak<MessageSink>>,
    snapshot: StateStore,
    on_connect: Option<ConnectCallback>,
}

/// Broadcast/selective-routing dispatcher over a set of subscriber sinks.
///
/// One hub-wide lock guards the subscriber array and the snapshot; it is
/// held across the connect-time replay (that is what linearizes replay
/// against concurrent publishes) but never across the fan-out of a publish,
/// so one slow subscriber cannot block delivery to the others.
pub struct MessageHub {
    label: String,
    inner: Mutex<HubInner>,
    endpoint: Arc<MessageSink>,
}

impl MessageHub {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new_cyclic(|hub: &Weak<MessageHub>| {
            let publisher = Weak::clone(hub);
            let endpoint = MessageSink::direct(&format!("{label}:publish"), move |message: &Message| {
                if let Some(hub) = publisher.upgrade() {
                    hub.publish(message.clone());
                }
            })
            .shared();
            Self {
                label: label.to_string(),
                inner: Mutex::new(HubInner {
                    subscribers: Vec::new(),
                    snapshot: StateStore::new(),
                    on_connect: None,
                }),
                endpoint,
            }
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The hub's own publish endpoint: a synchronous sink that feeds
    /// straight into [`publish`](Self::publish). Components hand this to
    /// their state store as the emission target.
    pub fn sink(&self) -> &Arc<MessageSink> {
        &self.endpoint
    }

    pub fn set_connect_callback(&self, callback: impl Fn(&Arc<MessageSink>) + Send + Sync + 'static) {
        recover_poison(self.inner.lock()).on_connect = Some(Arc::new(callback));
    }

    pub fn subscriber_count(&self) -> usize {
        recover_poison(self.inner.lock())
            .subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Register a subscriber and, before returning, replay the entire
    /// current state snapshot into it. The hub lock spans the snapshot read
    /// and the array append: the subscriber sees each state value exactly
    /// once, either in the replay or as a live update, never both and never
    /// neither. The connect callback runs after the lock is released.
    pub fn connect(&self, sink: &Arc<MessageSink>) {
        let callback = {
            let mut inner = recover_poison(self.inner.lock());
            inner.subscribers.push(Arc::downgrade(sink));
            sink.mark_connected(true);
            if !inner.snapshot.is_empty() {
                inner.snapshot.apply(sink, MSG_STATE_CHANGED);
            }
            inner.on_connect.clone()
        };
        log::debug!("hub '{}': connected sink '{}'", self.label, sink.label());
        if let Some(callback) = callback {
            callback(sink);
        }
    }

    /// Remove a subscriber. Disconnecting a sink that was never connected is
    /// a lifecycle bug in the caller; it is logged loudly and otherwise
    /// ignored.
    pub fn disconnect(&self, sink: &Arc<MessageSink>) {
        let mut inner = recover_poison(self.inner.lock());
        let before = inner.subscribers.len();
        inner
            .subscribers
            .retain(|weak| weak.as_ptr() != Arc::as_ptr(sink));
        if inner.subscribers.len() == before {
            log::warn!(
                "hub '{}': disconnect of sink '{}' which is not connected",
                self.label,
                sink.label()
            );
        } else {
            sink.mark_connected(false);
            log::debug!("hub '{}': disconnected sink '{}'", self.label, sink.label());
        }
    }

    /// Dispatch one message. State changes are folded into the snapshot
    /// first (under the hub lock, so a concurrent connect replays them).
    /// A client-tagged message goes to the first subscriber registered for
    /// that id — client ids are assumed unique, so delivery is at most one —
    /// everything else is copied to every subscriber. Fan-out happens after
    /// the lock is dropped.
    pub fn publish(&self, message: Message) {
        let targets: Vec<Arc<MessageSink>> = {
            let mut inner = recover_poison(self.inner.lock());
            if message.is_state_change() {
                inner.snapshot.absorb(&message);
            }

            let before = inner.subscribers.len();
            inner.subscribers.retain(|weak| weak.strong_count() > 0);
            let pruned = before - inner.subscribers.len();
            if pruned > 0 {
                log::warn!(
                    "hub '{}': pruned {pruned} subscriber sink(s) dropped while connected",
                    self.label
                );
            }

            match &message.header.client_id {
                Some(client_id) => inner
                    .subscribers
                    .iter()
                    .filter_map(Weak::upgrade)
                    .find(|sink| sink.accepts_client(client_id))
                    .into_iter()
                    .collect(),
                None => inner
                    .subscribers
                    .iter()
                    .filter_map(Weak::upgrade)
                    .collect(),
            }
        };

        for sink in &targets {
            sink.post(message.clone());
        }
    }

    /// Copy of the current state snapshot, for seeding a remote store.
    pub fn snapshot(&self) -> StateStore {
        recover_poison(self.inner.lock()).snapshot.clone()
    }
}

impl Drop for MessageHub {
    fn drop(&mut self) {
        let inner = recover_poison(self.inner.lock());
        let live = inner
            .subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count();
        if live > 0 {
            log::warn!(
                "hub '{}' destroyed with {live} subscriber(s) still connected",
                self.label
            );
        }
    }
}

impl std::fmt::Debug for MessageHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHub")
            .field("label", &self.label)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
