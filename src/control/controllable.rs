//! Bidirectional control handle and the synchronous call bridge

use crate::core::sync::recover_poison;
use crate::hub::MessageHub;
use crate::message::Message;
use crate::queue::MessageSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

/// How often `call_function` re-polls its reply sink.
const CALL_POLL_INTERVAL: Duration = Duration::from_millis(1);

type PumpCallback = Arc<dyn Fn() + Send + Sync>;

/// A component's standard handle: commands flow into the sink, events and
/// state flow out of the hub.
///
/// The observer sink is this party's own inbound event endpoint; `connect`
/// wires a remote party's observer into this component's event hub and
/// records the hub on the remote side so it can later `disconnect` itself.
pub struct Controllable {
    label: String,
    commands: Arc<MessageSink>,
    events: Arc<MessageHub>,
    observer: Arc<MessageSink>,
    /// Hub our observer is currently wired into, if any.
    observing: Mutex<Option<Arc<MessageHub>>>,
    /// Liveness pump for components not driven by their own thread.
    pump: RwLock<Option<PumpCallback>>,
    next_function_id: AtomicU64,
}

impl Controllable {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            commands: MessageSink::queued(&format!("{label}:commands")).shared(),
            events: MessageHub::new(&format!("{label}:events")),
            observer: MessageSink::queued(&format!("{label}:observer")).shared(),
            observing: Mutex::new(None),
            pump: RwLock::new(None),
            next_function_id: AtomicU64::new(1),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Inbound command sink; the owning component drains this.
    pub fn commands(&self) -> &Arc<MessageSink> {
        &self.commands
    }

    /// Outbound event hub; observers connect their sinks here.
    pub fn events(&self) -> &Arc<MessageHub> {
        &self.events
    }

    /// This party's own event-observing sink.
    pub fn observer(&self) -> &Arc<MessageSink> {
        &self.observer
    }

    /// Submit a command for the owning component to process.
    pub fn submit(&self, command: Message) {
        self.commands.post(command);
    }

    /// Wire `other`'s observer sink into this component's event hub and
    /// record the hub on `other` for its later [`disconnect`](Self::disconnect).
    pub fn connect(&self, other: &Controllable) {
        self.events.connect(other.observer());
        let mut observing = recover_poison(other.observing.lock());
        if observing.is_some() {
            log::warn!(
                "controllable '{}': observer already connected to a hub, rewiring",
                other.label
            );
        }
        *observing = Some(Arc::clone(&self.events));
    }

    /// Detach this party's observer from whichever hub it is wired into.
    pub fn disconnect(&self) {
        match recover_poison(self.observing.lock()).take() {
            Some(hub) => hub.disconnect(&self.observer),
            None => log::warn!(
                "controllable '{}': disconnect without a connected hub",
                self.label
            ),
        }
    }

    /// Register a callback invoked on every `call_function` poll iteration.
    /// Components whose liveness depends on a periodic ping and are not
    /// driven by their own thread need this to keep processing while a
    /// caller blocks on them.
    pub fn set_pump(&self, pump: impl Fn() + Send + Sync + 'static) {
        *recover_poison(self.pump.write()) = Some(Arc::new(pump));
    }

    /// Synchronous request/reply over the asynchronous substrate.
    ///
    /// Posts `request` into the command sink, then polls a temporary sink
    /// connected to the event hub until a reply tagged with the matching
    /// function id and the `last` flag arrives, or `timeout` elapses
    /// (`None`). The request message is inert if never consumed, so a
    /// timeout leaves no partial state behind; the callee is not cancelled.
    pub fn call_function(&self, mut request: Message, timeout: Duration) -> Option<Message> {
        let function_id = request.header.function_id.unwrap_or_else(|| {
            self.next_function_id.fetch_add(1, Ordering::Relaxed)
        });
        request.header.function_id = Some(function_id);

        let replies = MessageSink::queued(&format!("{}:call-{function_id}", self.label)).shared();
        self.events.connect(&replies);
        self.commands.post(request);

        let deadline = Instant::now() + timeout;
        let reply = loop {
            let mut matched = None;
            while let Some(message) = replies.try_next() {
                if message.header.function_id == Some(function_id) && message.header.last {
                    matched = Some(message);
                    break;
                }
                // Snapshot replay and unrelated events land here too; they
                // are simply discarded from the temporary sink.
            }
            if matched.is_some() {
                break matched;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "controllable '{}': call {function_id} timed out after {timeout:?}",
                    self.label
                );
                break None;
            }
            if let Some(pump) = recover_poison(self.pump.read()).clone() {
                pump();
            }
            thread::sleep(CALL_POLL_INTERVAL);
        };

        self.events.disconnect(&replies);
        reply
    }

    /// Answer a `call_function` request: tags `reply` with the request's
    /// function id, marks it terminal, and publishes it on the event hub.
    pub fn reply(&self, request: &Message, mut reply: Message) {
        reply.header.function_id = request.header.function_id;
        reply.header.last = true;
        self.events.publish(reply);
    }
}

impl std::fmt::Debug for Controllable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controllable")
            .field("label", &self.label)
            .field("pending_commands", &self.commands.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn connect_routes_events_to_the_observer() {
        let player = Controllable::new("player");
        let frontend = Controllable::new("frontend");

        player.connect(&frontend);
        player.events().publish(Message::new(3, 1));
        assert_eq!(frontend.observer().pending(), 1);

        frontend.disconnect();
        player.events().publish(Message::new(3, 2));
        assert_eq!(frontend.observer().pending(), 1, "no delivery after disconnect");
    }

    #[test]
    fn disconnect_without_connection_is_non_fatal() {
        let lonely = Controllable::new("lonely");
        lonely.disconnect();
    }

    #[test]
    fn call_function_round_trip() {
        let player = Arc::new(Controllable::new("player"));
        let component = Arc::clone(&player);

        // Component thread: drain commands, answer the seek request.
        let worker = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(2);
            while Instant::now() < deadline {
                if let Some(request) = component.commands().try_next() {
                    let reply = Message::new(request.namespace, request.id).with_arg(Value::Int(1));
                    component.reply(&request, reply);
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
        });

        let reply = player.call_function(Message::new(3, 7), Duration::from_secs(2));
        worker.join().unwrap();

        let reply = reply.expect("component replied before the deadline");
        assert_eq!(reply.id, 7);
        assert!(reply.header.last);
        assert_eq!(reply.arg(0).and_then(Value::as_int), Some(1));
        // The temporary reply sink must be gone again.
        assert_eq!(player.events().subscriber_count(), 0);
    }

    #[test]
    fn call_function_times_out_without_a_responder() {
        let player = Controllable::new("player");
        let started = Instant::now();
        let reply = player.call_function(Message::new(3, 7), Duration::from_millis(50));
        assert!(reply.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(player.events().subscriber_count(), 0);
    }

    #[test]
    fn call_function_drives_the_pump_while_waiting() {
        let player = Controllable::new("player");
        let pumped = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pumped);
        player.set_pump(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let _ = player.call_function(Message::new(3, 7), Duration::from_millis(30));
        assert!(
            pumped.load(Ordering::SeqCst) > 0,
            "pump must run while the call waits"
        );
    }

    #[test]
    fn replies_for_other_calls_are_ignored() {
        let player = Arc::new(Controllable::new("player"));
        let component = Arc::clone(&player);

        let worker = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(2);
            while Instant::now() < deadline {
                if let Some(request) = component.commands().try_next() {
                    // An unrelated, non-terminal event first.
                    component.events().publish(Message::new(9, 9));
                    // A stale reply for some other function id.
                    let mut stale = Message::new(request.namespace, request.id);
                    stale.header.function_id = Some(u64::MAX);
                    stale.header.last = true;
                    component.events().publish(stale);
                    // The real answer.
                    component.reply(&request, Message::new(request.namespace, request.id));
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
        });

        let reply = player.call_function(Message::new(3, 7), Duration::from_secs(2));
        worker.join().unwrap();
        let reply = reply.expect("matching reply should be found");
        assert!(reply.header.function_id.is_some());
        assert_ne!(reply.header.function_id, Some(u64::MAX));
    }
}
