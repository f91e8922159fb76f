//! Nested dictionary of observable state

use crate::message::{Message, Value};
use crate::queue::MessageSink;
use std::collections::BTreeMap;

type ContextMap<T> = BTreeMap<String, BTreeMap<String, T>>;

/// Dictionary of contexts, each a dictionary of variable name -> value,
/// with an optional parallel table of (min, max) ranges keyed the same way.
///
/// Owned by the component whose state it represents; the hub holds its own
/// copy as a snapshot, rebuilt from the change messages that pass through
/// it. All mutators take `&mut self`: the owner provides the locking (the
/// hub's snapshot sits behind the hub lock, a component's store behind its
/// own state).
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    contexts: ContextMap<Value>,
    ranges: ContextMap<(f64, f64)>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.values().all(BTreeMap::is_empty)
    }

    /// Number of leaves across all contexts.
    pub fn len(&self) -> usize {
        self.contexts.values().map(BTreeMap::len).sum()
    }

    pub fn get(&self, context: &str, var: &str) -> Option<&Value> {
        self.contexts.get(context)?.get(var)
    }

    /// Constrain a numeric variable; subsequent writes are clamped into
    /// `[min, max]`.
    pub fn set_range(&mut self, context: &str, var: &str, min: f64, max: f64) {
        self.ranges
            .entry(context.to_string())
            .or_default()
            .insert(var.to_string(), (min, max));
    }

    pub fn range(&self, context: &str, var: &str) -> Option<(f64, f64)> {
        self.ranges.get(context)?.get(var).copied()
    }

    /// Write a (context, var) slot, clamping against the range table, and
    /// emit a change message through `emit_via` tagged with `id` and `last`.
    /// A write that does not change the stored value emits nothing.
    /// Returns whether the value changed.
    pub fn set(
        &mut self,
        context: &str,
        var: &str,
        value: impl Into<Value>,
        emit_via: &MessageSink,
        id: u32,
        last: bool,
    ) -> bool {
        let value = self.clamp(context, var, value.into());
        if self.get(context, var) == Some(&value) {
            return false;
        }
        self.write(context, var, value.clone());
        emit_via.post(Self::change_message(context, var, value, id, last));
        true
    }

    /// Flip an integer flag (0 <-> non-zero; a missing variable becomes 1),
    /// with the same emission as `set`.
    pub fn toggle(
        &mut self,
        context: &str,
        var: &str,
        emit_via: &MessageSink,
        id: u32,
        last: bool,
    ) -> bool {
        let next = match self.get(context, var) {
            None | Some(Value::Int(0)) => 1,
            Some(Value::Int(_)) => 0,
            Some(other) => {
                log::warn!(
                    "state store: toggle on non-integer variable {context}.{var} ({other:?})"
                );
                return false;
            }
        };
        self.set(context, var, Value::Int(next), emit_via, id, last)
    }

    /// Add `delta` to a numeric variable, clamp against the range table and
    /// emit like `set`. Preserves the variable's numeric kind.
    pub fn add_clamped(
        &mut self,
        context: &str,
        var: &str,
        delta: f64,
        emit_via: &MessageSink,
        id: u32,
        last: bool,
    ) -> bool {
        let next = match self.get(context, var) {
            Some(Value::Int(current)) => Value::Int((*current as f64 + delta) as i64),
            Some(Value::Float(current)) => Value::Float(current + delta),
            Some(other) => {
                log::warn!("state store: add on non-numeric variable {context}.{var} ({other:?})");
                return false;
            }
            None => {
                log::warn!("state store: add on missing variable {context}.{var}");
                return false;
            }
        };
        self.set(context, var, next, emit_via, id, last)
    }

    /// Deep-merge another store's values (and ranges) into this one, without
    /// emitting per-leaf changes. Used to seed a store from a remote
    /// snapshot.
    pub fn merge(&mut self, src: &StateStore) {
        for (context, vars) in &src.contexts {
            let dst = self.contexts.entry(context.clone()).or_default();
            for (var, value) in vars {
                dst.insert(var.clone(), value.clone());
            }
        }
        for (context, vars) in &src.ranges {
            let dst = self.ranges.entry(context.clone()).or_default();
            for (var, range) in vars {
                dst.insert(var.clone(), *range);
            }
        }
    }

    /// Walk the whole store and emit one change message per leaf, tagged
    /// with `id` and marked terminal. This is the hub's replay-on-connect,
    /// exposed standalone for manual resynchronization.
    pub fn apply(&self, sink: &MessageSink, id: u32) {
        for (context, vars) in &self.contexts {
            for (var, value) in vars {
                sink.post(Self::change_message(context, var, value.clone(), id, true));
            }
        }
    }

    /// Fold a state-change message back into the tree. Returns false (with
    /// a warning) for messages that do not carry a well-formed change.
    pub fn absorb(&mut self, message: &Message) -> bool {
        if !message.is_state_change() {
            return false;
        }
        let context = match message.header.context.as_deref() {
            Some(context) => context,
            None => return false,
        };
        match (message.arg(0), message.arg(1)) {
            (Some(Value::Str(var)), Some(value)) => {
                let var = var.clone();
                let value = value.clone();
                self.write(context, &var, value);
                true
            }
            _ => {
                log::warn!(
                    "state store: malformed state change {}/{} for context '{context}'",
                    message.namespace,
                    message.id
                );
                false
            }
        }
    }

    fn clamp(&self, context: &str, var: &str, value: Value) -> Value {
        match self.range(context, var) {
            Some((min, max)) => value.clamped(min, max),
            None => value,
        }
    }

    fn write(&mut self, context: &str, var: &str, value: Value) {
        self.contexts
            .entry(context.to_string())
            .or_default()
            .insert(var.to_string(), value);
    }

    fn change_message(context: &str, var: &str, value: Value, id: u32, last: bool) -> Message {
        let mut message = Message::state_change(context, var, value, last);
        message.id = id;
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MSG_STATE_CHANGED;

    fn drain(sink: &MessageSink) -> Vec<Message> {
        std::iter::from_fn(|| sink.try_next()).collect()
    }

    #[test]
    fn set_emits_change_with_context_and_var() {
        let sink = MessageSink::queued("observer");
        let mut store = StateStore::new();

        assert!(store.set("player", "volume", 0.8, &sink, MSG_STATE_CHANGED, true));
        assert_eq!(store.get("player", "volume"), Some(&Value::Float(0.8)));

        let emitted = drain(&sink);
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_state_change());
        assert_eq!(emitted[0].header.context.as_deref(), Some("player"));
        assert_eq!(emitted[0].arg(0).and_then(Value::as_str), Some("volume"));
        assert_eq!(emitted[0].arg(1).and_then(Value::as_f64), Some(0.8));
    }

    #[test]
    fn identical_write_is_suppressed() {
        let sink = MessageSink::queued("observer");
        let mut store = StateStore::new();

        assert!(store.set("player", "volume", 0.8, &sink, MSG_STATE_CHANGED, true));
        assert!(!store.set("player", "volume", 0.8, &sink, MSG_STATE_CHANGED, true));
        assert_eq!(drain(&sink).len(), 1, "no-op writes must not re-emit");
    }

    #[test]
    fn writes_are_clamped_to_the_range_table() {
        let sink = MessageSink::queued("observer");
        let mut store = StateStore::new();
        store.set_range("player", "volume", 0.0, 1.0);

        store.set("player", "volume", 3.5, &sink, MSG_STATE_CHANGED, true);
        assert_eq!(store.get("player", "volume"), Some(&Value::Float(1.0)));

        // A second out-of-range write clamps to the same value: suppressed.
        assert!(!store.set("player", "volume", 2.0, &sink, MSG_STATE_CHANGED, true));
        assert_eq!(drain(&sink).len(), 1);
    }

    #[test]
    fn toggle_flips_and_creates() {
        let sink = MessageSink::queued("observer");
        let mut store = StateStore::new();

        assert!(store.toggle("player", "muted", &sink, MSG_STATE_CHANGED, true));
        assert_eq!(store.get("player", "muted"), Some(&Value::Int(1)));
        assert!(store.toggle("player", "muted", &sink, MSG_STATE_CHANGED, true));
        assert_eq!(store.get("player", "muted"), Some(&Value::Int(0)));

        store.set("player", "title", "x", &sink, MSG_STATE_CHANGED, true);
        assert!(!store.toggle("player", "title", &sink, MSG_STATE_CHANGED, true));
    }

    #[test]
    fn add_clamped_respects_bounds_and_kind() {
        let sink = MessageSink::queued("observer");
        let mut store = StateStore::new();
        store.set_range("player", "volume", 0.0, 1.0);
        store.set("player", "volume", 0.9, &sink, MSG_STATE_CHANGED, true);

        assert!(store.add_clamped("player", "volume", 0.5, &sink, MSG_STATE_CHANGED, true));
        assert_eq!(store.get("player", "volume"), Some(&Value::Float(1.0)));

        store.set("player", "track", 3i64, &sink, MSG_STATE_CHANGED, true);
        assert!(store.add_clamped("player", "track", 1.0, &sink, MSG_STATE_CHANGED, true));
        assert_eq!(store.get("player", "track"), Some(&Value::Int(4)));

        assert!(!store.add_clamped("player", "missing", 1.0, &sink, MSG_STATE_CHANGED, true));
    }

    #[test]
    fn merge_copies_without_emitting() {
        let sink = MessageSink::queued("observer");
        let mut remote = StateStore::new();
        remote.set("db", "tracks", 120i64, &sink, MSG_STATE_CHANGED, true);
        remote.set_range("db", "tracks", 0.0, 100_000.0);
        let _ = drain(&sink);

        let mut local = StateStore::new();
        local.merge(&remote);
        assert_eq!(local.get("db", "tracks"), Some(&Value::Int(120)));
        assert_eq!(local.range("db", "tracks"), Some((0.0, 100_000.0)));
        assert_eq!(drain(&sink).len(), 0, "merge must be silent");
    }

    #[test]
    fn apply_replays_every_leaf_exactly_once() {
        let silent = MessageSink::queued("silent");
        let mut store = StateStore::new();
        store.set("player", "volume", 0.8, &silent, MSG_STATE_CHANGED, true);
        store.set("player", "position", 42i64, &silent, MSG_STATE_CHANGED, true);
        store.set("db", "tracks", 120i64, &silent, MSG_STATE_CHANGED, true);

        let sink = MessageSink::queued("late-subscriber");
        store.apply(&sink, MSG_STATE_CHANGED);

        let replayed = drain(&sink);
        assert_eq!(replayed.len(), 3);
        assert!(replayed.iter().all(|m| m.header.last));

        let mut observed = StateStore::new();
        for message in &replayed {
            assert!(observed.absorb(message));
        }
        assert_eq!(observed.get("player", "volume"), Some(&Value::Float(0.8)));
        assert_eq!(observed.get("player", "position"), Some(&Value::Int(42)));
        assert_eq!(observed.get("db", "tracks"), Some(&Value::Int(120)));
    }

    #[test]
    fn absorb_ignores_non_state_traffic() {
        let mut store = StateStore::new();
        assert!(!store.absorb(&Message::new(6, 2).with_arg("not state")));
        assert!(store.is_empty());
    }
}
