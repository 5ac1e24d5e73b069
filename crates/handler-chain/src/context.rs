use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Property key under which [`PropertyContext`] mirrors the outbound flag.
pub const MESSAGE_OUTBOUND_PROPERTY: &str = "message.outbound";

/// Which handler class a context is handed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// Protocol-agnostic view (payload only)
    Logical,
    /// Protocol-aware view (envelope, headers)
    Protocol,
}

/// The mutable message capability handed to every handler call.
///
/// The chain only relies on the outbound flag; named properties belong to
/// the handlers and the binding that supplied the context.
pub trait MessageContext {
    fn kind(&self) -> ContextKind;

    fn is_outbound(&self) -> bool;

    fn set_outbound(&mut self, outbound: bool);

    fn get(&self, key: &str) -> Option<&Value>;

    /// Store a property, returning the previous value.
    fn put(&mut self, key: String, value: Value) -> Option<Value>;

    fn remove(&mut self, key: &str) -> Option<Value>;
}

/// Property-map backed [`MessageContext`].
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyContext {
    kind: ContextKind,
    properties: HashMap<String, Value>,
}

impl PropertyContext {
    pub fn new(kind: ContextKind) -> Self {
        let mut properties = HashMap::new();
        properties.insert(MESSAGE_OUTBOUND_PROPERTY.to_string(), Value::Bool(true));
        Self { kind, properties }
    }

    /// Context handed to logical handlers.
    pub fn logical() -> Self {
        Self::new(ContextKind::Logical)
    }

    /// Context handed to protocol handlers.
    pub fn protocol() -> Self {
        Self::new(ContextKind::Protocol)
    }

    /// Builder-style property insertion.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }
}

impl MessageContext for PropertyContext {
    fn kind(&self) -> ContextKind {
        self.kind
    }

    fn is_outbound(&self) -> bool {
        self.properties
            .get(MESSAGE_OUTBOUND_PROPERTY)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    fn set_outbound(&mut self, outbound: bool) {
        self.properties
            .insert(MESSAGE_OUTBOUND_PROPERTY.to_string(), Value::Bool(outbound));
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    fn put(&mut self, key: String, value: Value) -> Option<Value> {
        self.properties.insert(key, value)
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }
}
