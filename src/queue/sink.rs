//! Message sink: the endpoint handle around a queue or a direct handler

use crate::core::sync::recover_poison;
use crate::message::Message;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::ring::{MessageQueue, WriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Handler seam for message consumption.
///
/// Implemented blanket-style for closures so components can register either
/// a plain `Fn(&Message)` or a richer type carrying its own state.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &Message);
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) + Send + Sync,
{
    fn handle(&self, message: &Message) {
        self(message)
    }
}

/// Producer/consumer-facing endpoint.
///
/// An asynchronous sink owns a [`MessageQueue`]; producers write through
/// `lock_write`/`post` and the owning component drains with `run_pending`
/// on its own thread. A synchronous sink has no queue: `post` invokes the
/// handler inline, delivery and processing share the caller's stack frame.
///
/// A sink may carry opaque client-id strings; a hub uses these to route a
/// message tagged with a target client id to the matching sink instead of
/// broadcasting. Sinks registered with a hub must be disconnected before
/// they are dropped.
pub struct MessageSink {
    label: String,
    queue: Option<MessageQueue>,
    handler: RwLock<Option<Arc<dyn MessageHandler>>>,
    client_ids: Vec<String>,
    connected: AtomicBool,
}

impl MessageSink {
    /// Asynchronous sink backed by a queue.
    pub fn queued(label: &str) -> Self {
        Self {
            label: label.to_string(),
            queue: Some(MessageQueue::new()),
            handler: RwLock::new(None),
            client_ids: Vec::new(),
            connected: AtomicBool::new(false),
        }
    }

    /// Synchronous sink: `post` calls `handler` on the producer's thread.
    pub fn direct(label: &str, handler: impl MessageHandler + 'static) -> Self {
        Self {
            label: label.to_string(),
            queue: None,
            handler: RwLock::new(Some(Arc::new(handler))),
            client_ids: Vec::new(),
            connected: AtomicBool::new(false),
        }
    }

    pub fn with_handler(self, handler: impl MessageHandler + 'static) -> Self {
        self.set_handler(handler);
        self
    }

    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.client_ids.push(client_id.to_string());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_handler(&self, handler: impl MessageHandler + 'static) {
        *recover_poison(self.handler.write()) = Some(Arc::new(handler));
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    pub fn client_ids(&self) -> &[String] {
        &self.client_ids
    }

    pub fn accepts_client(&self, client_id: &str) -> bool {
        self.client_ids.iter().any(|id| id == client_id)
    }

    /// Acquire the queue's write slot for in-place population; commit the
    /// returned guard to make the message visible to the reader.
    pub fn lock_write(&self) -> QueueResult<WriteGuard<'_>> {
        match &self.queue {
            Some(queue) => Ok(queue.lock_write()),
            None => Err(QueueError::NotQueued {
                label: self.label.clone(),
            }),
        }
    }

    /// Submit one message: copied into the queue for an asynchronous sink,
    /// handled inline for a synchronous one.
    pub fn post(&self, message: Message) {
        match &self.queue {
            Some(queue) => {
                let mut slot = queue.lock_write();
                *slot = message;
                slot.commit();
            }
            None => {
                let handler = recover_poison(self.handler.read()).clone();
                match handler {
                    Some(handler) => handler.handle(&message),
                    None => log::warn!(
                        "sink '{}': dropping message {}/{}, synchronous sink without handler",
                        self.label,
                        message.namespace,
                        message.id
                    ),
                }
            }
        }
    }

    /// Drain every currently-ready message into the registered handler.
    /// Returns the number processed; 0 tells the caller it may sleep.
    pub fn run_pending(&self) -> QueueResult<usize> {
        let queue = self.queue.as_ref().ok_or_else(|| QueueError::NotQueued {
            label: self.label.clone(),
        })?;
        let handler = recover_poison(self.handler.read())
            .clone()
            .ok_or_else(|| QueueError::NoHandler {
                label: self.label.clone(),
            })?;

        let mut processed = 0;
        while let Some(message) = queue.try_read() {
            handler.handle(&message);
            processed += 1;
        }
        Ok(processed)
    }

    /// Non-blocking take of the next pending message, for components that
    /// poll the queue themselves instead of registering a handler.
    pub fn try_next(&self) -> Option<Message> {
        self.queue.as_ref()?.try_read()
    }

    /// Blocking take of the next message. `None` for synchronous sinks,
    /// which never hold pending messages.
    pub fn next_blocking(&self) -> Option<Message> {
        Some(self.queue.as_ref()?.read())
    }

    /// Non-destructive probe of the oldest pending message's (id, namespace).
    pub fn peek(&self) -> Option<(u32, u32)> {
        self.queue.as_ref()?.peek()
    }

    /// Number of pending messages (always 0 for synchronous sinks).
    pub fn pending(&self) -> usize {
        self.queue.as_ref().map_or(0, MessageQueue::len)
    }

    /// Hub bookkeeping: flips the connected flag, returning its old value.
    pub(crate) fn mark_connected(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::AcqRel)
    }
}

impl Drop for MessageSink {
    fn drop(&mut self) {
        // Dropping while registered means a hub now holds a dead reference;
        // the hub prunes it, but the owner's lifecycle is buggy.
        if self.connected.load(Ordering::Acquire) {
            log::warn!(
                "sink '{}' dropped while still connected to a hub; disconnect it first",
                self.label
            );
        }
    }
}

impl std::fmt::Debug for MessageSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSink")
            .field("label", &self.label)
            .field("queued", &self.queue.is_some())
            .field("client_ids", &self.client_ids)
            .field("pending", &self.pending())
            .finish()
    }
}
