//! Message and header structures

use crate::message::Value;
use serde::{Deserialize, Serialize};

/// Reserved namespace for state-change traffic emitted by the state store.
pub const STATE_NAMESPACE: u32 = 0;

/// Conventional operation id for a state-change message. Emitters may tag
/// state changes with their own id; the namespace plus argument shape is
/// what marks a message as a state change, not this id.
pub const MSG_STATE_CHANGED: u32 = 1;

/// Routing and correlation metadata attached to every message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// State context the message refers to (for state changes).
    pub context: Option<String>,
    /// Affinity tag: when set, a hub delivers to at most one subscriber
    /// registered for this client id instead of broadcasting.
    pub client_id: Option<String>,
    /// Correlation id for request/reply over `call_function`.
    pub function_id: Option<u64>,
    /// Terminality flag. Producers using burst semantics clear it on
    /// intermediate updates; every other emission is self-terminal.
    pub last: bool,
}

/// A self-describing, copyable unit of data flowing through the bus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub namespace: u32,
    pub id: u32,
    pub header: MessageHeader,
    pub args: Vec<Value>,
}

impl Message {
    pub fn new(namespace: u32, id: u32) -> Self {
        Self {
            namespace,
            id,
            header: MessageHeader::default(),
            args: Vec::new(),
        }
    }

    /// Build a state-change message: `args = [variable name, value]`, the
    /// context in the header.
    pub fn state_change(context: &str, var: &str, value: Value, last: bool) -> Self {
        Self {
            namespace: STATE_NAMESPACE,
            id: MSG_STATE_CHANGED,
            header: MessageHeader {
                context: Some(context.to_string()),
                last,
                ..MessageHeader::default()
            },
            args: vec![Value::Str(var.to_string()), value],
        }
    }

    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.header.context = Some(context.to_string());
        self
    }

    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.header.client_id = Some(client_id.to_string());
        self
    }

    pub fn with_last(mut self, last: bool) -> Self {
        self.header.last = last;
        self
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Whether this message carries a state change a hub should fold into
    /// its snapshot: reserved namespace, a context, and `[name, value]` args.
    pub fn is_state_change(&self) -> bool {
        self.namespace == STATE_NAMESPACE
            && self.header.context.is_some()
            && self.args.len() >= 2
            && matches!(self.args.first(), Some(Value::Str(_)))
    }

    /// Clear the message for slot reuse.
    pub fn reset(&mut self) {
        *self = Message::default();
    }
}

/// Type-aware coalescing of supersede-able updates.
///
/// `try_merge` is attempted by a queue against the single most recent
/// committed-but-unread slot; returning true means the older message has
/// been replaced in place and the newer one must not be enqueued separately.
pub trait Coalesce {
    fn try_merge(&mut self, newer: &Message) -> bool;
}

impl Coalesce for Message {
    /// Same namespace + id + context (+ client affinity) means the newer
    /// payload supersedes this one wholesale. State changes additionally key
    /// on the variable name in the first argument, so an update to one
    /// variable never swallows the pending update of another. Anything else
    /// refuses, and the two stay separate queue entries.
    fn try_merge(&mut self, newer: &Message) -> bool {
        if self.is_state_change()
            && newer.is_state_change()
            && self.args.first() != newer.args.first()
        {
            return false;
        }
        if self.namespace == newer.namespace
            && self.id == newer.id
            && self.header.context == newer.header.context
            && self.header.client_id == newer.header.client_id
        {
            self.args = newer.args.clone();
            self.header.function_id = newer.header.function_id;
            self.header.last = newer.header.last;
            true
        } else {
            false
        }
    }
}
