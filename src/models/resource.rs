//! Resource model.
//!
//! A resource (machine, line, cell) processes one activity at a time.
//! Capacity rules beyond that live outside the dispatching core.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Object identity of a resource.
pub type ResourceId = i64;

/// A resource that activities are dispatched onto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique object identity.
    pub id: ResourceId,
    /// Human-readable name.
    pub name: String,
    /// Domain-specific metadata.
    pub attributes: HashMap<String, String>,
}

impl Resource {
    /// Creates a new resource.
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            name: String::new(),
            attributes: HashMap::new(),
        }
    }

    /// Sets the resource name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_builder() {
        let r = Resource::new(4)
            .with_name("Press 4")
            .with_attribute("hall", "B");
        assert_eq!(r.id, 4);
        assert_eq!(r.name, "Press 4");
        assert_eq!(r.attributes.get("hall").map(String::as_str), Some("B"));
    }
}
