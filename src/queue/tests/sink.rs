//! Sink behaviour tests

use crate::message::Message;
use crate::queue::{MessageSink, QueueError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn queued_sink_defers_until_run_pending() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let sink = MessageSink::queued("worker").with_handler(move |message: &Message| {
        recorder.lock().unwrap().push(message.id);
    });

    sink.post(Message::new(1, 10));
    sink.post(Message::new(1, 20));
    assert_eq!(sink.pending(), 2);
    assert!(seen.lock().unwrap().is_empty(), "delivery must be deferred");

    assert_eq!(sink.run_pending().unwrap(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![10, 20]);
    assert_eq!(sink.run_pending().unwrap(), 0, "0 means the caller may sleep");
}

#[test]
fn direct_sink_delivers_on_the_callers_stack() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let sink = MessageSink::direct("inline", move |_: &Message| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    sink.post(Message::new(1, 1));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no queue, no deferral");
    assert_eq!(sink.pending(), 0);
}

#[test]
fn direct_sink_has_no_iteration() {
    let sink = MessageSink::direct("inline", |_: &Message| {});
    assert!(matches!(
        sink.run_pending(),
        Err(QueueError::NotQueued { .. })
    ));
    assert!(sink.lock_write().is_err());
    assert_eq!(sink.try_next(), None);
    assert_eq!(sink.next_blocking(), None);
}

#[test]
fn run_pending_without_handler_is_an_error() {
    let sink = MessageSink::queued("orphan");
    sink.post(Message::new(1, 1));
    assert!(matches!(
        sink.run_pending(),
        Err(QueueError::NoHandler { .. })
    ));
    // The message stays pending for a later handler.
    assert_eq!(sink.pending(), 1);
}

#[test]
fn client_identity_matching() {
    let sink = MessageSink::queued("remote")
        .with_client_id("client-7")
        .with_client_id("client-8");
    assert!(sink.accepts_client("client-7"));
    assert!(sink.accepts_client("client-8"));
    assert!(!sink.accepts_client("client-9"));
}

#[test]
fn in_place_population_through_lock_write() {
    let sink = MessageSink::queued("producer");
    {
        let mut slot = sink.lock_write().unwrap();
        slot.namespace = 4;
        slot.id = 44;
        slot.args.push(7i64.into());
        slot.commit();
    }
    assert_eq!(sink.peek(), Some((44, 4)));
    let message = sink.try_next().unwrap();
    assert_eq!(message.namespace, 4);
}
