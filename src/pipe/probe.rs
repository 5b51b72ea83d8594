//! # Diagnostics probe.
//!
//! [`Pipe::probe`](crate::Pipe::probe) walks the chain and lets every filter
//! describe itself in a [`ProbeScope`]. Probing never touches a context.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Description of one filter (or a nested sub-pipe).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeScope {
    /// Filter or scope name.
    pub name: String,
    /// Key/value facts reported by the filter.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    /// Nested scopes (e.g. sub-pipes of a fan-out filter).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ProbeScope>,
}

impl ProbeScope {
    /// Creates an empty scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Records a property.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a recorded property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Appends a nested scope and returns it for further description.
    pub fn create_scope(&mut self, name: impl Into<String>) -> &mut ProbeScope {
        self.children.push(ProbeScope::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }
}

/// Result of probing a whole pipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeResult {
    /// One scope per filter, in chain order.
    pub filters: Vec<ProbeScope>,
}

impl ProbeResult {
    /// Renders the result as JSON.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Finds the first top-level filter scope with `name`.
    pub fn find(&self, name: &str) -> Option<&ProbeScope> {
        self.filters.iter().find(|s| s.name == name)
    }
}
