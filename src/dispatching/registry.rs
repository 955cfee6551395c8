//! Explicit registry of rule elements.
//!
//! Constructed by the caller and handed to
//! [`CompositeCalculator::initialize`](super::CompositeCalculator::initialize),
//! which takes ownership. There is no global lookup.

use super::RuleElement;

/// An ordered set of rule elements. Evaluation order = registration order.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn RuleElement>>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule.
    pub fn register<R: RuleElement + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    /// Registers an already boxed rule.
    pub fn register_boxed(&mut self, rule: Box<dyn RuleElement>) {
        self.rules.push(rule);
    }

    /// Builder-style registration.
    pub fn with_rule<R: RuleElement + 'static>(mut self, rule: R) -> Self {
        self.register(rule);
        self
    }

    /// Finds a rule by key.
    pub fn get(&self, key: &str) -> Option<&dyn RuleElement> {
        self.rules
            .iter()
            .find(|r| r.key() == key)
            .map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.key())
    }

    pub(crate) fn into_rules(self) -> Vec<Box<dyn RuleElement>> {
        self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::rules;

    #[test]
    fn test_registry_order_and_lookup() {
        let registry = RuleRegistry::new()
            .with_rule(rules::Priority)
            .with_rule(rules::WaitingTime);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.keys().collect::<Vec<_>>(),
            vec![rules::Priority::KEY, rules::WaitingTime::KEY]
        );
        assert!(registry.get(rules::WaitingTime::KEY).is_some());
        assert!(registry.get("missing").is_none());
    }
}
