//! Slot-ring queue with merge-on-write coalescing
//!
//! Two locks with distinct jobs: the write lock serializes producers over
//! the scratch slot they populate in place, and the chain lock guards ring
//! maintenance (commit, consume, recycle). A reader blocked on a slot's
//! rendezvous holds neither, so it never stalls a writer.
//!
//! Invariants: the ring always holds at least two allocated slots; a slot is
//! recycled to the tail only after its message has been consumed; a merge is
//! only ever attempted against the single most recent committed-but-unread
//! slot, so coalescing can never resurrect a stale value past a newer one.

use crate::core::sync::recover_poison;
use crate::message::{Coalesce, Message};
use crate::sync::Rendezvous;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Slot {
    message: Mutex<Message>,
    produced: Rendezvous,
}

#[derive(Debug)]
struct Chain {
    /// Ring of slots. `[0..committed)` are committed and unread, front
    /// oldest; the remainder are free and reused for the next commits.
    ring: VecDeque<Arc<Slot>>,
    committed: usize,
}

/// Single-consumer, serialized-multi-producer queue of reusable slots.
///
/// Effectively unbounded: slots are grown lazily and never block a
/// producer. Merge-on-write keeps the effective depth small for bursty
/// same-key traffic without an explicit backpressure mechanism.
#[derive(Debug)]
pub struct MessageQueue {
    write: Mutex<Message>,
    chain: Mutex<Chain>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        let mut ring = VecDeque::with_capacity(4);
        // Two slots minimum: one for the reader to park on, one spare, so a
        // producer never waits on allocation.
        ring.push_back(Arc::new(Slot::default()));
        ring.push_back(Arc::new(Slot::default()));
        Self {
            write: Mutex::new(Message::default()),
            chain: Mutex::new(Chain { ring, committed: 0 }),
        }
    }

    /// Acquire the write lock and hand out the current write slot for
    /// in-place population. Never fails and never blocks on slot count.
    /// Dropping the guard without committing discards the draft.
    pub fn lock_write(&self) -> WriteGuard<'_> {
        WriteGuard {
            queue: self,
            scratch: recover_poison(self.write.lock()),
            committed: false,
        }
    }

    /// Blocking read: parks on the oldest unread slot's rendezvous, then
    /// takes the message out and recycles the slot to the tail of the ring.
    pub fn read(&self) -> Message {
        let slot = self.front_slot();
        slot.produced.wait();
        self.consume(&slot)
    }

    /// Blocking read with a deadline; `None` when nothing was produced
    /// within `timeout`.
    pub fn read_timeout(&self, timeout: std::time::Duration) -> Option<Message> {
        let slot = self.front_slot();
        if !slot.produced.wait_timeout(timeout) {
            return None;
        }
        Some(self.consume(&slot))
    }

    /// Non-blocking read.
    pub fn try_read(&self) -> Option<Message> {
        let slot = self.front_slot();
        if !slot.produced.try_wait() {
            return None;
        }
        Some(self.consume(&slot))
    }

    /// Non-destructive readiness probe: the (id, namespace) of the oldest
    /// unread message, if one is committed.
    pub fn peek(&self) -> Option<(u32, u32)> {
        let chain = recover_poison(self.chain.lock());
        if chain.committed == 0 {
            return None;
        }
        let message = recover_poison(chain.ring[0].message.lock());
        Some((message.id, message.namespace))
    }

    /// Number of committed, unread messages.
    pub fn len(&self) -> usize {
        recover_poison(self.chain.lock()).committed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn front_slot(&self) -> Arc<Slot> {
        let chain = recover_poison(self.chain.lock());
        Arc::clone(&chain.ring[0])
    }

    /// Commit the scratch message: merge into the newest committed slot if
    /// the message kind allows it, otherwise move it into the next free slot
    /// and post that slot's rendezvous exactly once.
    fn commit(&self, scratch: &mut Message) {
        let message = std::mem::take(scratch);
        let mut chain = recover_poison(self.chain.lock());

        if chain.committed > 0 {
            let newest = &chain.ring[chain.committed - 1];
            // If the reader already consumed this slot's signal it is being
            // read right now; the rendezvous being down tells us so, and the
            // merge attempt may still rewrite the payload the reader is
            // about to take, which only ever makes it more recent.
            let mut pending = recover_poison(newest.message.lock());
            if pending.try_merge(&message) {
                return;
            }
        }

        if chain.committed == chain.ring.len() {
            chain.ring.push_back(Arc::new(Slot::default()));
        }
        let slot = &chain.ring[chain.committed];
        *recover_poison(slot.message.lock()) = message;
        slot.produced.post();
        chain.committed += 1;
    }

    /// Take the front slot's message and recycle the slot to the tail.
    /// Only ever called after the slot's rendezvous has been consumed, which
    /// is what serializes this against the next read.
    fn consume(&self, slot: &Arc<Slot>) -> Message {
        let mut chain = recover_poison(self.chain.lock());
        let message = std::mem::take(&mut *recover_poison(slot.message.lock()));
        slot.produced.reset();
        if let Some(front) = chain.ring.pop_front() {
            chain.ring.push_back(front);
        }
        chain.committed = chain.committed.saturating_sub(1);
        message
    }
}

/// Write-side handle over the current write slot.
///
/// Derefs to the [`Message`] being populated; [`commit`](Self::commit)
/// performs the merge-or-append described on [`MessageQueue`].
pub struct WriteGuard<'a> {
    queue: &'a MessageQueue,
    scratch: MutexGuard<'a, Message>,
    committed: bool,
}

impl WriteGuard<'_> {
    pub fn commit(mut self) {
        self.queue.commit(&mut self.scratch);
        self.committed = true;
    }
}

impl Deref for WriteGuard<'_> {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.scratch
    }
}

impl DerefMut for WriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.scratch
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        // An abandoned draft must not leak into the next producer's slot.
        if !self.committed {
            self.scratch.reset();
        }
    }
}
